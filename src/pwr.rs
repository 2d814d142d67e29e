//! Power configuration
//!
//! Supply configuration, voltage scaling and backup domain write
//! access. These are only touched during clock bring-up: voltage scale 0
//! is requested before the clock tree is switched, and relaxed again
//! once the final frequencies are known.
//!
//! See RM0399 section 7.4 "Power supply" (p 283) and Table 35 "Voltage
//! scaling" for the supported combinations.

use tock_registers::fields::FieldValue;

use crate::mmio::{is_set, Flag, Mmio, RegisterAccess, Wait};
use crate::rcc::rec::{self, Bus};
use crate::rcc::regs::*;
use crate::rcc::{Error, Family};

/// Voltage Scale
///
/// Represents the voltage range feeding the CPU core. The maximum core
/// clock frequency depends on this value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum VoltageScale {
    /// VOS 0 range VCORE 1.26V - 1.40V
    Scale0,
    /// VOS 1 range VCORE 1.15V - 1.26V
    Scale1,
    /// VOS 2 range VCORE 1.05V - 1.15V
    Scale2,
    /// VOS 3 range VCORE 0.95V - 1.05V
    Scale3,
}

impl VoltageScale {
    /// Highest regulator output, headroom for any frequency
    pub const MAX: VoltageScale = VoltageScale::Scale0;

    /// D3CR.VOS encoding, and whether the overdrive bit completes it
    fn bits(self, family: Family) -> (u32, bool) {
        use VoltageScale::*;
        match (family, self) {
            (Family::Rm0455, Scale0) => (0b11, false),
            (Family::Rm0455, Scale1) => (0b10, false),
            (Family::Rm0455, Scale2) => (0b01, false),
            (Family::Rm0455, Scale3) => (0b00, false),
            (Family::Rm0468, Scale0) => (0b00, false),
            (_, Scale0) => (0b11, true),
            (_, Scale1) => (0b11, false),
            (_, Scale2) => (0b10, false),
            (_, Scale3) => (0b01, false),
        }
    }
}

/// Power supply configuration
///
/// Must match the way the board feeds VCORE. The first write after reset
/// is latched by hardware.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SupplyConfig {
    /// Internal LDO regulator
    Ldo,
    /// VCORE supplied externally, regulator bypassed
    Bypass,
    /// SMPS step-down converter feeds VCORE directly
    DirectSmps,
    /// SMPS 1.8V output feeds the LDO
    Smps1V8FeedsLdo,
    /// SMPS 2.5V output feeds the LDO
    Smps2V5FeedsLdo,
}

impl SupplyConfig {
    /// Every supply bit of PWR_CR3, SMPSEXTHP left clear
    fn value(self) -> FieldValue<u32, CR3::Register> {
        use CR3::SDLEVEL::{Reset, V1_8, V2_5};

        let (bypass, ldo, smps, level) = match self {
            SupplyConfig::Ldo => (0, 1, 0, Reset),
            SupplyConfig::Bypass => (1, 0, 0, Reset),
            SupplyConfig::DirectSmps => (0, 0, 1, Reset),
            SupplyConfig::Smps1V8FeedsLdo => (0, 1, 1, V1_8),
            SupplyConfig::Smps2V5FeedsLdo => (0, 1, 1, V2_5),
        };
        CR3::BYPASS.val(bypass)
            + CR3::LDOEN.val(ldo)
            + CR3::SDEN.val(smps)
            + CR3::SMPSEXTHP::CLEAR
            + level
    }
}

/// Apply the supply configuration and wait until it is active
pub(crate) fn set_supply<M: Mmio, W: Wait>(
    mmio: &M,
    waiter: &mut W,
    supply: SupplyConfig,
) -> Result<(), Error> {
    mmio.update(PWR_CR3, supply.value());
    waiter.wait(
        Flag::SupplyReady,
        is_set(mmio, PWR_CSR1, CSR1::ACTVOSRDY),
    )
}

/// Change the voltage scale and wait for the regulator to settle
pub(crate) fn set_voltage<M: Mmio, W: Wait>(
    mmio: &M,
    waiter: &mut W,
    family: Family,
    vos: VoltageScale,
) -> Result<(), Error> {
    let (bits, overdrive) = vos.bits(family);

    // Leaving overdrive: drop it before lowering VOS
    if !overdrive && family.has_overdrive() {
        if mmio.fetch(SYSCFG_PWRCR).is_set(PWRCR::ODEN) {
            mmio.update(SYSCFG_PWRCR, PWRCR::ODEN::CLEAR);
            waiter.wait(Flag::VoltageReady, is_set(mmio, PWR_D3CR, D3CR::VOSRDY))?;
        }
    }

    mmio.update(PWR_D3CR, D3CR::VOS.val(bits));
    waiter.wait(Flag::VoltageReady, is_set(mmio, PWR_D3CR, D3CR::VOSRDY))?;

    if overdrive {
        // The overdrive control lives in SYSCFG, which needs its clock
        let syscfg = rec::SYSCFG;
        mmio.modify(RCC + Bus::Apb4.offset(), |r| r | syscfg.enr);
        mmio.update(SYSCFG_PWRCR, PWRCR::ODEN::SET);
        waiter.wait(Flag::VoltageReady, is_set(mmio, PWR_D3CR, D3CR::VOSRDY))?;
    }

    log::debug!("voltage scale {:?}", vos);
    Ok(())
}

/// Enable write access to the backup domain
///
/// Idempotent: returns without writing if access is already enabled.
pub(crate) fn enable_backup_access<M: Mmio>(mmio: &M) {
    if !mmio.fetch(PWR_CR1).is_set(CR1::DBP) {
        mmio.update(PWR_CR1, CR1::DBP::SET);
        log::debug!("backup domain write access enabled");
    }
}
