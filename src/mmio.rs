//! Memory mapped register access and hardware polling
//!
//! Every register read or write in this crate goes through [`Mmio`], and
//! every "spin until the hardware sets a flag" loop goes through
//! [`Wait`]. On the target these are [`Volatile`] and [`Spin`]; on the
//! host they are replaced by a simulated device.

use core::marker::PhantomData;

use tock_registers::fields::{Field, FieldValue};
use tock_registers::{LocalRegisterCopy, RegisterLongName};
use void::{ResultVoidExt, Void};

use crate::rcc::{Error, PllUnit, Source};

/// Access to 32-bit memory mapped registers
///
/// Addresses are absolute. The methods take `&self`: the register
/// blocks are shared with the other core and with hardware, so there is
/// nothing to borrow exclusively.
pub trait Mmio {
    /// Read the register at `addr`
    fn read(&self, addr: u32) -> u32;

    /// Write `value` to the register at `addr`
    fn write(&self, addr: u32, value: u32);

    /// Read-modify-write. Not atomic: callers that share the register
    /// with the other core must hold the RCC semaphore.
    fn modify<F>(&self, addr: u32, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let value = self.read(addr);
        self.write(addr, f(value));
    }
}

impl<'a, M: Mmio> Mmio for &'a M {
    fn read(&self, addr: u32) -> u32 {
        (**self).read(addr)
    }

    fn write(&self, addr: u32, value: u32) {
        (**self).write(addr, value)
    }
}

/// Volatile access to the real device
#[derive(Clone, Copy, Debug)]
pub struct Volatile {
    _private: (),
}

impl Volatile {
    /// Create a handle to the device registers
    ///
    /// # Safety
    ///
    /// Only sound on an STM32H7, where every address used by this crate
    /// is a valid, aligned device register.
    pub const unsafe fn steal() -> Self {
        Volatile { _private: () }
    }
}

impl Mmio for Volatile {
    fn read(&self, addr: u32) -> u32 {
        // unsafe: see `steal`
        unsafe { core::ptr::read_volatile(addr as usize as *const u32) }
    }

    fn write(&self, addr: u32, value: u32) {
        // unsafe: see `steal`
        unsafe { core::ptr::write_volatile(addr as usize as *mut u32, value) }
    }
}

/// Hardware condition that bring-up waits on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flag {
    /// Oscillator ready
    Ready(Source),
    /// HSI divider update acknowledged
    HsiDivider,
    /// PLL locked
    PllLock(PllUnit),
    /// Power supply configuration active
    SupplyReady,
    /// Voltage scaling applied
    VoltageReady,
    /// Flash latency read back
    FlashLatency,
    /// Prescaler value read back
    Prescaler,
    /// System clock switch confirmed
    SwitchConfirmed,
}

/// Wait for a hardware condition
///
/// `poll` returns `Ok(())` once the condition holds and
/// `Err(nb::Error::WouldBlock)` until then.
pub trait Wait {
    /// Block until `poll` succeeds
    ///
    /// An implementation may give up and return [`Error::Stalled`]. The
    /// hardware gives no such guarantee: [`Spin`] never returns early.
    fn wait<F>(&mut self, flag: Flag, poll: F) -> Result<(), Error>
    where
        F: FnMut() -> nb::Result<(), Void>;
}

/// Busy-wait, with no timeout
#[derive(Clone, Copy, Debug, Default)]
pub struct Spin;

impl Wait for Spin {
    fn wait<F>(&mut self, _flag: Flag, mut poll: F) -> Result<(), Error>
    where
        F: FnMut() -> nb::Result<(), Void>,
    {
        nb::block!(poll()).void_unwrap();
        Ok(())
    }
}

/// A register at a fixed address, with a `register_bitfields!` layout
pub(crate) struct Reg<R> {
    pub addr: u32,
    layout: PhantomData<R>,
}

impl<R> Reg<R> {
    pub const fn at(addr: u32) -> Self {
        Reg {
            addr,
            layout: PhantomData,
        }
    }
}

impl<R> Clone for Reg<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for Reg<R> {}

/// Typed access to the registers in `rcc::regs`
pub(crate) trait RegisterAccess: Mmio {
    /// Read the register into a local copy
    fn fetch<R: RegisterLongName>(&self, reg: Reg<R>) -> LocalRegisterCopy<u32, R> {
        LocalRegisterCopy::new(self.read(reg.addr))
    }

    /// Read-modify-write of the fields in `value`
    fn update<R: RegisterLongName>(&self, reg: Reg<R>, value: FieldValue<u32, R>) {
        self.modify(reg.addr, |r| value.modify(r))
    }
}

impl<M: Mmio + ?Sized> RegisterAccess for M {}

/// Poll closure that completes once `field` reads as set
pub(crate) fn is_set<'a, M: Mmio, R: RegisterLongName>(
    mmio: &'a M,
    reg: Reg<R>,
    field: Field<u32, R>,
) -> impl FnMut() -> nb::Result<(), Void> + 'a
where
    R: 'a,
{
    move || {
        if mmio.fetch(reg).is_set(field) {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

/// Poll closure that completes once `field` reads `value`
pub(crate) fn field_is<'a, M: Mmio, R: RegisterLongName>(
    mmio: &'a M,
    reg: Reg<R>,
    field: Field<u32, R>,
    value: u32,
) -> impl FnMut() -> nb::Result<(), Void> + 'a
where
    R: 'a,
{
    move || {
        if mmio.fetch(reg).read(field) == value {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}
