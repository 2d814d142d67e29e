//! Peripheral Reset and Enable Control (REC)
//!
//! Gates the kernel clock of individual peripherals. The Cortex-M7
//! reaches the enable registers at the common `RCC_xxxENR` addresses,
//! the Cortex-M4 at 0x60 above them. Both land in the same
//! `RCC_C1_xxxENR` register, so every read-modify-write happens under
//! the RCC hardware semaphore.
//!
//! ```no_run
//! use stm32h7xx_clocks::rcc::{rec, Config, CoreId, Family, Rcc};
//! use stm32h7xx_clocks::Volatile;
//!
//! let mmio = unsafe { Volatile::steal() };
//! let ccdr = Rcc::new(mmio, CoreId::Cm4, Config::new(Family::Rm0399))
//!     .attach()
//!     .unwrap();
//!
//! ccdr.peripheral.enable(rec::SPI1).unwrap();
//! ccdr.peripheral.disable(rec::SPI1).unwrap();
//! ```

use super::regs::RCC;
use super::{CoreId, Error, Family};
use crate::hsem::{Hsem, RCC_SEMID};
use crate::mmio::Mmio;

/// Busses with a clock enable register
///
/// The discriminant is the offset of the Cortex-M7 enable register from
/// the RCC base.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum Bus {
    /// AHB3
    Ahb3 = 0x0D4,
    /// AHB1
    Ahb1 = 0x0D8,
    /// AHB2
    Ahb2 = 0x0DC,
    /// AHB4
    Ahb4 = 0x0E0,
    /// APB3
    Apb3 = 0x0E4,
    /// APB1, low word
    Apb1L = 0x0E8,
    /// APB1, high word
    Apb1H = 0x0EC,
    /// APB2
    Apb2 = 0x0F0,
    /// APB4
    Apb4 = 0x0F4,
}

impl Bus {
    /// All busses, in register order
    pub const ALL: [Bus; 9] = [
        Bus::Ahb3,
        Bus::Ahb1,
        Bus::Ahb2,
        Bus::Ahb4,
        Bus::Apb3,
        Bus::Apb1L,
        Bus::Apb1H,
        Bus::Apb2,
        Bus::Apb4,
    ];

    /// Offset of the Cortex-M7 enable register
    pub const fn offset(self) -> u32 {
        self as u32
    }

    /// Bus identified by an enable register offset
    pub fn from_offset(offset: u32) -> Result<Bus, Error> {
        Bus::ALL
            .iter()
            .copied()
            .find(|bus| bus.offset() == offset)
            .ok_or(Error::Unsupported)
    }
}

/// A peripheral clock gate: bus register offset and enable bit(s)
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PeripheralId {
    /// Enable register offset, see [`Bus`]
    pub bus: u32,
    /// Enable bit mask within that register
    pub enr: u32,
}

impl PeripheralId {
    /// Gate `enr` on `bus`
    pub const fn new(bus: Bus, enr: u32) -> Self {
        PeripheralId {
            bus: bus.offset(),
            enr,
        }
    }
}

macro_rules! peripherals {
    ($($bus:ident: [$($NAME:ident: $bit:literal),+]),+) => {
        $($(
            #[doc = concat!("Clock gate of ", stringify!($NAME))]
            pub const $NAME: PeripheralId = PeripheralId::new(Bus::$bus, 1 << $bit);
        )+)+
    };
}

peripherals! {
    Ahb3: [MDMA: 0, DMA2D: 4, FMC: 12, QSPI: 14, SDMMC1: 16],
    Ahb1: [DMA1: 0, DMA2: 1, ADC12: 5, ETH1MAC: 15, USB1OTG: 25],
    Ahb2: [DCMI: 0, CRYPT: 4, HASH: 5, RNG: 6, SDMMC2: 9],
    Ahb4: [GPIOA: 0, GPIOB: 1, GPIOC: 2, GPIOD: 3, GPIOE: 4, GPIOF: 5,
           GPIOG: 6, GPIOH: 7, GPIOI: 8, GPIOJ: 9, GPIOK: 10, CRC: 19,
           BDMA: 21, ADC3: 24, HSEM: 25],
    Apb3: [LTDC: 3, WWDG1: 6],
    Apb1L: [TIM2: 0, TIM3: 1, TIM4: 2, SPI2: 14, SPI3: 15, USART2: 17,
            USART3: 18, I2C1: 21, I2C2: 22, I2C3: 23],
    Apb1H: [FDCAN: 8],
    Apb2: [TIM1: 0, TIM8: 1, USART1: 4, USART6: 5, SPI1: 12, SPI4: 13, SAI1: 22],
    Apb4: [SYSCFG: 1, LPUART1: 3, SPI6: 5, I2C4: 7, RTCAPB: 16]
}

/// Clock gate of the hardware semaphore block
///
/// AHB4 on most parts. RM0455 parts moved it to AHB2.
pub const fn hsem(family: Family) -> PeripheralId {
    match family {
        Family::Rm0455 => PeripheralId::new(Bus::Ahb2, 1 << 2),
        _ => HSEM,
    }
}

/// Peripheral clock gating for one core
pub struct PeripheralREC<M> {
    mmio: M,
    core: CoreId,
    retries: u32,
}

impl<M: Mmio> PeripheralREC<M> {
    pub(crate) fn new(mmio: M, core: CoreId, retries: u32) -> Self {
        PeripheralREC {
            mmio,
            core,
            retries,
        }
    }

    /// Core whose enable registers this controls
    pub fn core(&self) -> CoreId {
        self.core
    }

    /// Enable the peripheral clock
    pub fn enable(&self, id: PeripheralId) -> Result<(), Error> {
        self.update(id, |r| r | id.enr)?;
        log::trace!("{:?}: clock enabled {:?}", self.core, id);
        Ok(())
    }

    /// Disable the peripheral clock
    pub fn disable(&self, id: PeripheralId) -> Result<(), Error> {
        self.update(id, |r| r & !id.enr)?;
        log::trace!("{:?}: clock disabled {:?}", self.core, id);
        Ok(())
    }

    /// True when every bit of the gate is set in this core's register
    pub fn is_enabled(&self, id: PeripheralId) -> Result<bool, Error> {
        let addr = self.register(id)?;
        Ok(self.mmio.read(addr) & id.enr == id.enr)
    }

    fn register(&self, id: PeripheralId) -> Result<u32, Error> {
        let bus = Bus::from_offset(id.bus)?;
        Ok(RCC + bus.offset() + self.core.enr_offset())
    }

    fn update<F>(&self, id: PeripheralId, f: F) -> Result<(), Error>
    where
        F: FnOnce(u32) -> u32,
    {
        let addr = self.register(id)?;

        let _lock = Hsem::new(&self.mmio, self.core).lock(RCC_SEMID, self.retries)?;
        self.mmio.modify(addr, f);
        Ok(())
    }
}
