//! Clock tree bring-up and peripheral clock gating for STM32H7 series
//! microcontrollers.
//!
//! The [`rcc`] module brings the clock tree up once, on the Cortex-M7,
//! from an immutable [`rcc::Config`] descriptor: oscillators, PLLs,
//! voltage scaling, flash latency, bus prescalers and the system clock
//! switch. Afterwards both cores may gate peripheral clocks through
//! [`rcc::rec::PeripheralREC`], which serialises every register update
//! with a hardware semaphore (see [`hsem`]).
//!
//! All register traffic goes through the [`mmio::Mmio`] capability, and
//! every hardware poll through [`mmio::Wait`], so the whole crate can be
//! exercised on the host against a simulated device.
#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

pub mod hsem;
pub mod mmio;
pub mod pwr;
pub mod rcc;
pub mod time;

#[cfg(test)]
mod mock;

pub use crate::mmio::{Mmio, Spin, Volatile, Wait};
pub use crate::rcc::{CoreId, Error};

/// Commonly used traits
pub mod prelude {
    pub use crate::time::U32Ext as _stm32h7xx_clocks_time_U32Ext;
}
