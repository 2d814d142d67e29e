//! Oscillators
//!
//! Starts every declared source and waits for it to report stable.
//! Sources are never stopped here: the reset state leaves HSI running
//! and bring-up only ever adds to it.

use tock_registers::fields::Field;
use tock_registers::RegisterLongName;

use super::regs::*;
use super::{Config, Error, Source};
use crate::mmio::{is_set, Flag, Mmio, Reg, RegisterAccess, Wait};
use crate::pwr;

/// Start every enabled source, in [`Source::ALL`] order
pub(crate) fn start_sources<M: Mmio, W: Wait>(
    mmio: &M,
    waiter: &mut W,
    config: &Config,
) -> Result<(), Error> {
    for &source in Source::ALL.iter() {
        let osc = config.source(source);
        if !osc.enabled {
            continue;
        }

        match source {
            Source::Hse => start(
                mmio,
                waiter,
                source,
                RCC_CR,
                CR::HSEON,
                CR::HSERDY,
                Some((CR::HSEBYP, osc.bypass)),
            )?,
            Source::Hsi => {
                start(mmio, waiter, source, RCC_CR, CR::HSION, CR::HSIRDY, None)?;

                let div = config.hsi_div.bits();
                mmio.update(RCC_CR, CR::HSIDIV.val(div));
                waiter.wait(Flag::HsiDivider, is_set(mmio, RCC_CR, CR::HSIDIVF))?;
            }
            Source::Csi => {
                start(mmio, waiter, source, RCC_CR, CR::CSION, CR::CSIRDY, None)?
            }
            Source::Hsi48 => start(
                mmio,
                waiter,
                source,
                RCC_CR,
                CR::HSI48ON,
                CR::HSI48RDY,
                None,
            )?,
            Source::Lsi => {
                start(mmio, waiter, source, RCC_CSR, CSR::LSION, CSR::LSIRDY, None)?
            }
            Source::Lse => {
                // LSE lives in the backup domain
                pwr::enable_backup_access(mmio);
                start(
                    mmio,
                    waiter,
                    source,
                    RCC_BDCR,
                    BDCR::LSEON,
                    BDCR::LSERDY,
                    Some((BDCR::LSEBYP, osc.bypass)),
                )?
            }
        }

        log::debug!("{:?} ready, {} Hz", source, osc.freq);
    }
    Ok(())
}

/// Switch one oscillator on and wait for its ready flag
fn start<M: Mmio, W: Wait, R: RegisterLongName>(
    mmio: &M,
    waiter: &mut W,
    source: Source,
    reg: Reg<R>,
    on: Field<u32, R>,
    rdy: Field<u32, R>,
    bypass: Option<(Field<u32, R>, bool)>,
) -> Result<(), Error> {
    if let Some((field, bypassed)) = bypass {
        // Only writable while the oscillator is off
        if !mmio.fetch(reg).is_set(on) {
            mmio.update(reg, field.val(bypassed as u32));
        }
    }

    mmio.update(reg, on.val(1));
    waiter.wait(Flag::Ready(source), is_set(mmio, reg, rdy))
}
