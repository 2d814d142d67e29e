//! Hardware semaphore (HSEM)
//!
//! The HSEM block arbitrates between bus masters: a semaphore taken by
//! one core cannot be taken or released by the other. The RCC registers
//! shared by both cores are only modified while holding [`RCC_SEMID`].
//!
//! Locking uses the 1-step procedure: reading `HSEM_RLRx` takes the
//! semaphore if it is free and returns its new state, so a single read
//! both attempts the lock and reports whether this core now owns it.
//!
//! See RM0399 section 11 "Hardware semaphore (HSEM)" (p 510).

use crate::mmio::Mmio;
use crate::rcc::{CoreId, Error};

/// HSEM base address
pub const HSEM: u32 = 0x5802_6400;

/// Semaphore guarding the RCC registers
pub const RCC_SEMID: u8 = 3;

/// Number of semaphores
pub const SEMAPHORES: u8 = 32;

const R_LOCK: u32 = 1 << 31;
const R_COREID_SHIFT: u32 = 8;

/// Address of the write/read register `HSEM_Rx`
pub(crate) const fn r(id: u8) -> u32 {
    HSEM + 4 * id as u32
}

/// Address of the read lock register `HSEM_RLRx`
pub(crate) const fn rlr(id: u8) -> u32 {
    HSEM + 0x80 + 4 * id as u32
}

/// Hardware semaphores as seen from one core
pub struct Hsem<'a, M> {
    mmio: &'a M,
    core: CoreId,
}

impl<'a, M: Mmio> Hsem<'a, M> {
    /// Use the semaphores from `core`
    pub fn new(mmio: &'a M, core: CoreId) -> Self {
        Hsem { mmio, core }
    }

    /// Value of `HSEM_RLRx` when this core holds the semaphore
    fn owned(&self) -> u32 {
        R_LOCK | (self.core.hsem_id() << R_COREID_SHIFT)
    }

    /// Make one attempt at taking semaphore `id`
    pub fn try_lock(&self, id: u8) -> Option<HsemGuard<'a, M>> {
        debug_assert!(id < SEMAPHORES);

        if self.mmio.read(rlr(id)) == self.owned() {
            Some(HsemGuard {
                mmio: self.mmio,
                core: self.core,
                id,
            })
        } else {
            None
        }
    }

    /// Take semaphore `id`, trying at most `retries` times
    ///
    /// Fails with [`Error::Busy`] once the attempts are used up. The
    /// semaphore is released when the returned guard is dropped.
    pub fn lock(&self, id: u8, retries: u32) -> Result<HsemGuard<'a, M>, Error> {
        let mut attempts = 0;
        loop {
            if let Some(guard) = self.try_lock(id) {
                log::trace!("{:?}: semaphore {} taken", self.core, id);
                return Ok(guard);
            }

            attempts += 1;
            if attempts >= retries {
                log::trace!(
                    "{:?}: semaphore {} busy after {} attempts",
                    self.core,
                    id,
                    attempts
                );
                return Err(Error::Busy);
            }
            core::hint::spin_loop();
        }
    }
}

/// A taken hardware semaphore, released on drop
pub struct HsemGuard<'a, M: Mmio> {
    mmio: &'a M,
    core: CoreId,
    id: u8,
}

impl<'a, M: Mmio> HsemGuard<'a, M> {
    /// Semaphore number
    pub fn id(&self) -> u8 {
        self.id
    }
}

impl<'a, M: Mmio> Drop for HsemGuard<'a, M> {
    fn drop(&mut self) {
        // LOCK clear, own COREID, PROCID 0
        self.mmio
            .write(r(self.id), self.core.hsem_id() << R_COREID_SHIFT);
        log::trace!("{:?}: semaphore {} released", self.core, self.id);
    }
}
