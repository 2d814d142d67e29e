//! Phase Locked Loop Configuration

use tock_registers::fields::Field;

use super::regs::PLLCKSELR::PLLSRC;
use super::regs::*;
use super::{Config, Error, Source};
use crate::mmio::{is_set, Flag, Mmio, Reg, RegisterAccess, Wait};

/// PLL units
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PllUnit {
    /// PLL1, can drive `sys_ck`
    Pll1,
    /// PLL2
    Pll2,
    /// PLL3
    Pll3,
}

/// Register layout of one PLL unit
struct PllRegs {
    divm: Field<u32, PLLCKSELR::Register>,
    fracen: Field<u32, PLLCFGR::Register>,
    vcosel: Field<u32, PLLCFGR::Register>,
    rge: Field<u32, PLLCFGR::Register>,
    /// DIVPxEN, DIVQxEN, DIVRxEN
    diven: [Field<u32, PLLCFGR::Register>; 3],
    divr: Reg<PLLDIVR::Register>,
    on: Field<u32, CR::Register>,
    rdy: Field<u32, CR::Register>,
}

static PLL_REGS: [PllRegs; 3] = [
    PllRegs {
        divm: PLLCKSELR::DIVM1,
        fracen: PLLCFGR::PLL1FRACEN,
        vcosel: PLLCFGR::PLL1VCOSEL,
        rge: PLLCFGR::PLL1RGE,
        diven: [PLLCFGR::DIVP1EN, PLLCFGR::DIVQ1EN, PLLCFGR::DIVR1EN],
        divr: RCC_PLL1DIVR,
        on: CR::PLL1ON,
        rdy: CR::PLL1RDY,
    },
    PllRegs {
        divm: PLLCKSELR::DIVM2,
        fracen: PLLCFGR::PLL2FRACEN,
        vcosel: PLLCFGR::PLL2VCOSEL,
        rge: PLLCFGR::PLL2RGE,
        diven: [PLLCFGR::DIVP2EN, PLLCFGR::DIVQ2EN, PLLCFGR::DIVR2EN],
        divr: RCC_PLL2DIVR,
        on: CR::PLL2ON,
        rdy: CR::PLL2RDY,
    },
    PllRegs {
        divm: PLLCKSELR::DIVM3,
        fracen: PLLCFGR::PLL3FRACEN,
        vcosel: PLLCFGR::PLL3VCOSEL,
        rge: PLLCFGR::PLL3RGE,
        diven: [PLLCFGR::DIVP3EN, PLLCFGR::DIVQ3EN, PLLCFGR::DIVR3EN],
        divr: RCC_PLL3DIVR,
        on: CR::PLL3ON,
        rdy: CR::PLL3RDY,
    },
];

impl PllUnit {
    /// All units, in configuration order
    pub const ALL: [PllUnit; 3] = [PllUnit::Pll1, PllUnit::Pll2, PllUnit::Pll3];

    pub(crate) const fn index(self) -> usize {
        self as usize
    }

    fn regs(self) -> &'static PllRegs {
        &PLL_REGS[self.index()]
    }
}

/// Configuration of a Phase Locked Loop (PLL)
///
/// `ref_ck = pll_src / m`, `vco_ck = ref_ck * n`, and each enabled output
/// is `vco_ck` divided by its own divider.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PllConfig {
    pub(crate) enabled: bool,
    pub(crate) m: u8,
    pub(crate) n: u16,
    pub(crate) p: Option<u8>,
    pub(crate) q: Option<u8>,
    pub(crate) r: Option<u8>,
}

impl PllConfig {
    /// Started during bring-up
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Input divider
    pub fn m(&self) -> u8 {
        self.m
    }

    /// Feedback multiplier
    pub fn n(&self) -> u16 {
        self.n
    }

    /// Output dividers, `None` for disabled outputs
    pub fn dividers(&self) -> (Option<u8>, Option<u8>, Option<u8>) {
        (self.p, self.q, self.r)
    }
}

/// PLL reference (phase detector input) frequency range
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VcoInputRange {
    /// 1 to 2 MHz
    Range1,
    /// above 2 to 4 MHz
    Range2,
    /// above 4 to 8 MHz
    Range4,
    /// above 8 to 16 MHz
    Range8,
}

/// VCO output frequency range
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VcoOutputRange {
    /// VCOH, 192 to 960 MHz
    Wide,
    /// VCOL, 150 to 420 MHz
    Medium,
}

impl VcoInputRange {
    /// Range containing `ref_ck`. Upper bounds are inclusive: exactly
    /// 2 MHz is in [`Range1`](VcoInputRange::Range1).
    pub fn new(ref_ck: u32) -> Result<Self, Error> {
        match ref_ck {
            1_000_000..=2_000_000 => Ok(VcoInputRange::Range1),
            2_000_001..=4_000_000 => Ok(VcoInputRange::Range2),
            4_000_001..=8_000_000 => Ok(VcoInputRange::Range4),
            8_000_001..=16_000_000 => Ok(VcoInputRange::Range8),
            _ => Err(Error::Range { vco_in: ref_ck }),
        }
    }

    /// VCO output range used with this input range
    pub fn output_range(self) -> VcoOutputRange {
        match self {
            VcoInputRange::Range1 => VcoOutputRange::Medium,
            _ => VcoOutputRange::Wide,
        }
    }

    fn bits(self) -> u32 {
        match self {
            VcoInputRange::Range1 => 0b00,
            VcoInputRange::Range2 => 0b01,
            VcoInputRange::Range4 => 0b10,
            VcoInputRange::Range8 => 0b11,
        }
    }
}

impl VcoOutputRange {
    fn bits(self) -> u32 {
        match self {
            VcoOutputRange::Wide => 0,
            VcoOutputRange::Medium => 1,
        }
    }
}

/// Select the PLL source and start every enabled PLL
///
/// Units are configured in order, each one locked before the next is
/// touched. On error the units already started keep running.
pub(crate) fn setup_plls<M: Mmio, W: Wait>(
    mmio: &M,
    waiter: &mut W,
    config: &Config,
) -> Result<(), Error> {
    if !config.pll.iter().any(|pll| pll.enabled) {
        mmio.update(RCC_PLLCKSELR, PLLSRC::Off);
        return Ok(());
    }

    let (src, pllsrc) = match config.pll_src {
        Some(Source::Hsi) => (Source::Hsi, PLLSRC::Hsi),
        Some(Source::Csi) => (Source::Csi, PLLSRC::Csi),
        Some(Source::Hse) => (Source::Hse, PLLSRC::Hse),
        _ => return Err(Error::Unsupported),
    };
    let src_ck = config.source_freq(src).ok_or(Error::Unsupported)?;
    mmio.update(RCC_PLLCKSELR, pllsrc);

    for &unit in PllUnit::ALL.iter() {
        let pll = config.pll(unit);
        if pll.enabled {
            setup_pll(mmio, waiter, unit, pll, src_ck)?;
        }
    }
    Ok(())
}

fn setup_pll<M: Mmio, W: Wait>(
    mmio: &M,
    waiter: &mut W,
    unit: PllUnit,
    pll: &PllConfig,
    src_ck: u32,
) -> Result<(), Error> {
    let regs = unit.regs();
    if pll.m == 0 {
        return Err(Error::InvalidDivider);
    }

    let ref_ck = src_ck / u32::from(pll.m);
    let input = VcoInputRange::new(ref_ck)?;
    let output = input.output_range();

    mmio.update(RCC_PLLCKSELR, regs.divm.val(u32::from(pll.m)));

    let outputs = [pll.p, pll.q, pll.r];
    let mut cfgr = regs.rge.val(input.bits())
        + regs.vcosel.val(output.bits())
        + regs.fracen.val(0);
    for (div, &en) in outputs.iter().zip(regs.diven.iter()) {
        cfgr = cfgr + en.val(div.is_some() as u32);
    }
    mmio.update(RCC_PLLCFGR, cfgr);

    // Dividers are programmed as value - 1
    let field = |div: Option<u8>| u32::from(div.unwrap_or(1).max(1)) - 1;
    mmio.update(
        regs.divr,
        PLLDIVR::DIVN.val(u32::from(pll.n).max(1) - 1)
            + PLLDIVR::DIVP.val(field(pll.p))
            + PLLDIVR::DIVQ.val(field(pll.q))
            + PLLDIVR::DIVR.val(field(pll.r)),
    );

    mmio.update(RCC_CR, regs.on.val(1));
    waiter.wait(Flag::PllLock(unit), is_set(mmio, RCC_CR, regs.rdy))?;

    log::debug!(
        "{:?}: ref_ck {} Hz ({:?}, {:?}) m {} n {} p {:?} q {:?} r {:?}",
        unit,
        ref_ck,
        input,
        output,
        pll.m,
        pll.n,
        pll.p,
        pll.q,
        pll.r
    );
    Ok(())
}

/// Read back the P output of PLL1 from the hardware, for the clock
/// currently driving `sys_ck`
pub(crate) fn pll1_p_ck<M: Mmio>(mmio: &M, hsi_ck: u32, hse_ck: u32) -> u32 {
    let regs = PllUnit::Pll1.regs();
    let cksel = mmio.fetch(RCC_PLLCKSELR);
    let src = match cksel.read_as_enum(PLLSRC) {
        Some(PLLSRC::Value::Hsi) => hsi_ck,
        Some(PLLSRC::Value::Csi) => super::CSI,
        Some(PLLSRC::Value::Hse) => hse_ck,
        _ => return 0,
    };
    let divr = mmio.fetch(regs.divr);
    super::pll_output(
        src,
        cksel.read(regs.divm),
        divr.read(PLLDIVR::DIVN) + 1,
        divr.read(PLLDIVR::DIVP) + 1,
    )
    .unwrap_or(0)
}
