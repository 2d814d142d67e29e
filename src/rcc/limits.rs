//! Datasheet limits and configuration checking
//!
//! Every limit is a lookup in a table keyed by [`Family`]. The checker
//! only does arithmetic: it never touches the hardware, so a rejected
//! descriptor is rejected before bring-up starts.

use super::core_clocks::{hpre_bits, ppre_bits, PllClocks};
use super::{
    pll_output, Clock, Config, CoreClocks, Error, PllUnit, Source,
    SysClkSource,
};
use crate::pwr::VoltageScale;
use crate::time::Hertz;

/// STM32H7 family, by reference manual
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Family {
    /// RM0433: STM32H742, H743/753 and H750
    Rm0433,
    /// RM0399: STM32H745/755 and H747/757, dual core
    Rm0399,
    /// RM0468: STM32H723/733, H725/735 and H730
    Rm0468,
    /// RM0455: STM32H7A3/7B3 and H7B0
    Rm0455,
    /// Any other part, with conservative limits
    Generic,
}

/// Maximum frequencies
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Ceilings {
    /// System clock
    pub sys_ck: Hertz,
    /// AXI and AHB clocks
    pub hclk: Hertz,
    /// Every APB clock
    pub pclk: Hertz,
}

const fn ceilings(sys_ck: u32, hclk: u32, pclk: u32) -> Ceilings {
    Ceilings {
        sys_ck: Hertz(sys_ck),
        hclk: Hertz(hclk),
        pclk: Hertz(pclk),
    }
}

/// Maximum frequencies per voltage scale, RM0433 Table 122
const VOS_CEILINGS_RM0433: [(VoltageScale, Ceilings); 4] = [
    (
        VoltageScale::Scale3,
        ceilings(200_000_000, 100_000_000, 50_000_000),
    ),
    (
        VoltageScale::Scale2,
        ceilings(300_000_000, 150_000_000, 75_000_000),
    ),
    (
        VoltageScale::Scale1,
        ceilings(400_000_000, 200_000_000, 100_000_000),
    ),
    (
        VoltageScale::Scale0,
        ceilings(480_000_000, 240_000_000, 120_000_000),
    ),
];

impl Family {
    /// Maximum frequencies at the highest voltage scale
    pub const fn ceilings(self) -> Ceilings {
        match self {
            Family::Rm0433 | Family::Rm0399 => {
                ceilings(480_000_000, 240_000_000, 120_000_000)
            }
            Family::Rm0468 => ceilings(550_000_000, 275_000_000, 137_500_000),
            Family::Rm0455 => ceilings(280_000_000, 280_000_000, 140_000_000),
            Family::Generic => ceilings(280_000_000, 140_000_000, 70_000_000),
        }
    }

    /// Scale 0 is reached through the SYSCFG overdrive bit
    pub(crate) const fn has_overdrive(self) -> bool {
        match self {
            Family::Rm0433 | Family::Rm0399 | Family::Generic => true,
            Family::Rm0468 | Family::Rm0455 => false,
        }
    }

    /// Ceilings per voltage scale, lowest scale first. Empty when the
    /// family has no table.
    fn voltage_ceilings(self) -> &'static [(VoltageScale, Ceilings)] {
        match self {
            Family::Rm0433 | Family::Rm0399 => &VOS_CEILINGS_RM0433,
            _ => &[],
        }
    }
}

impl Ceilings {
    fn admit(&self, clocks: &CoreClocks) -> bool {
        clocks.sys_ck <= self.sys_ck
            && clocks.hclk <= self.hclk
            && [clocks.pclk1, clocks.pclk2, clocks.pclk3, clocks.pclk4]
                .iter()
                .all(|pclk| *pclk <= self.pclk)
    }
}

/// Lowest voltage scale that supports `clocks`
///
/// Families without a voltage scale table stay at
/// [`VoltageScale::MAX`].
pub(crate) fn optimal_voltage(
    family: Family,
    clocks: &CoreClocks,
) -> VoltageScale {
    family
        .voltage_ceilings()
        .iter()
        .find(|(_, ceilings)| ceilings.admit(clocks))
        .map(|&(vos, _)| vos)
        .unwrap_or(VoltageScale::MAX)
}

fn pll_dividers(
    unit: PllUnit,
    m: u8,
    n: u16,
    divs: [Option<u8>; 3],
) -> Result<(), Error> {
    if !(1..=63).contains(&m) || !(4..=512).contains(&n) {
        return Err(Error::InvalidDivider);
    }
    // A running PLL with every output gated drives nothing
    if divs.iter().all(Option::is_none) {
        return Err(Error::InvalidDivider);
    }
    for div in divs.iter().flatten() {
        if !(1..=128).contains(div) {
            return Err(Error::InvalidDivider);
        }
    }
    // PLL1 P only supports even ratios
    match (unit, divs[0]) {
        (PllUnit::Pll1, Some(p)) if p % 2 != 0 => Err(Error::InvalidDivider),
        _ => Ok(()),
    }
}

/// Frequency feeding the PLLs
fn pll_source_freq(config: &Config) -> Result<u32, Error> {
    match config.pll_src {
        Some(src @ Source::Hsi)
        | Some(src @ Source::Csi)
        | Some(src @ Source::Hse) => {
            config.source_freq(src).ok_or(Error::Unsupported)
        }
        _ => Err(Error::Unsupported),
    }
}

fn pll_clocks(config: &Config) -> Result<[PllClocks; 3], Error> {
    let mut clocks = [PllClocks::default(); 3];

    for &unit in PllUnit::ALL.iter() {
        let pll = config.pll(unit);
        if !pll.enabled {
            continue;
        }
        let divs = [pll.p, pll.q, pll.r];
        pll_dividers(unit, pll.m, pll.n, divs)?;

        let src = pll_source_freq(config)?;
        let out = |div: Option<u8>| -> Result<Option<Hertz>, Error> {
            div.map(|d| {
                pll_output(src, pll.m.into(), pll.n.into(), d.into()).map(Hertz)
            })
            .transpose()
        };
        clocks[unit.index()] = PllClocks {
            p_ck: out(pll.p)?,
            q_ck: out(pll.q)?,
            r_ck: out(pll.r)?,
        };
    }
    Ok(clocks)
}

/// Check `config` and compute every clock of the tree
pub(crate) fn check(config: &Config) -> Result<CoreClocks, Error> {
    let chain = config.prescalers;

    if chain.d1cpre != 1 {
        return Err(Error::CorePrescaler(chain.d1cpre));
    }
    hpre_bits(chain.hpre).ok_or(Error::InvalidDivider)?;
    for &ratio in &[chain.d1ppre, chain.d2ppre1, chain.d2ppre2, chain.d3ppre] {
        ppre_bits(ratio).ok_or(Error::InvalidDivider)?;
    }

    let pll = pll_clocks(config)?;

    let sys_ck = match config.sys_src {
        Some(SysClkSource::Hsi) => config.source_freq(Source::Hsi),
        Some(SysClkSource::Csi) => config.source_freq(Source::Csi),
        Some(SysClkSource::Hse) => config.source_freq(Source::Hse),
        Some(SysClkSource::Pll1) => pll[0].p_ck.map(|ck| ck.0),
        None => None,
    }
    .ok_or(Error::Unsupported)?;

    if let Some(expected) = config.sys_ck {
        if expected != sys_ck {
            return Err(Error::SysClkMismatch {
                expected: Hertz(expected),
                actual: Hertz(sys_ck),
            });
        }
    }

    let c_ck = sys_ck / u32::from(chain.d1cpre);
    let hclk = c_ck / u32::from(chain.hpre);
    let pclk = |ratio: u16| Hertz(hclk / u32::from(ratio));

    let source = |s| config.source_freq(s).map(Hertz);
    let clocks = CoreClocks {
        sys_ck: Hertz(sys_ck),
        c_ck: Hertz(c_ck),
        hclk: Hertz(hclk),
        pclk1: pclk(chain.d2ppre1),
        pclk2: pclk(chain.d2ppre2),
        pclk3: pclk(chain.d1ppre),
        pclk4: pclk(chain.d3ppre),
        hse_ck: source(Source::Hse),
        hsi_ck: source(Source::Hsi),
        csi_ck: source(Source::Csi),
        hsi48_ck: source(Source::Hsi48),
        lsi_ck: source(Source::Lsi),
        lse_ck: source(Source::Lse),
        pll,
        chain,
    };

    let max = config.family.ceilings();
    let limits = [
        (Clock::SysCk, clocks.sys_ck, max.sys_ck),
        (Clock::Hclk, clocks.hclk, max.hclk),
        (Clock::Pclk1, clocks.pclk1, max.pclk),
        (Clock::Pclk2, clocks.pclk2, max.pclk),
        (Clock::Pclk3, clocks.pclk3, max.pclk),
        (Clock::Pclk4, clocks.pclk4, max.pclk),
    ];
    for &(clock, freq, max) in limits.iter() {
        if freq > max {
            return Err(Error::CeilingExceeded { clock, freq, max });
        }
    }

    Ok(clocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;

    fn pll1_at(family: Family, n: u16) -> Config {
        // 25 MHz / 5 = 5 MHz reference
        Config::new(family)
            .use_hse(25.mhz())
            .pll_source(Source::Hse)
            .pll1(5, n)
            .pll1_p(2)
            .sys_ck_src(SysClkSource::Pll1)
            .hpre(2)
            .d1ppre(2)
            .d2ppre1(2)
            .d2ppre2(2)
            .d3ppre(2)
    }

    #[test]
    fn family_ceilings() {
        for &(family, sys_ck) in &[
            (Family::Rm0433, 480),
            (Family::Rm0399, 480),
            (Family::Rm0468, 550),
            (Family::Rm0455, 280),
            (Family::Generic, 280),
        ] {
            let max = family.ceilings();
            println!("{:?}: {} / {} / {}", family, max.sys_ck, max.hclk, max.pclk);
            assert_eq!(max.sys_ck.0, sys_ck * 1_000_000);
        }
        assert_eq!(Family::Rm0468.ceilings().pclk.0, 137_500_000);
        assert_eq!(Family::Rm0455.ceilings().hclk.0, 280_000_000);
        assert_eq!(Family::Generic.ceilings().pclk.0, 70_000_000);
    }

    #[test]
    fn sys_ck_ceiling_depends_on_family() {
        // 25 / 5 * 220 / 2 = 550 MHz
        assert_eq!(
            check(&pll1_at(Family::Rm0433, 220)),
            Err(Error::CeilingExceeded {
                clock: Clock::SysCk,
                freq: Hertz(550_000_000),
                max: Hertz(480_000_000),
            })
        );

        let clocks = check(&pll1_at(Family::Rm0468, 220)).unwrap();
        assert_eq!(clocks.sys_ck().0, 550_000_000);
        assert_eq!(clocks.hclk().0, 275_000_000);
        assert_eq!(clocks.pclk1().0, 137_500_000);
    }

    #[test]
    fn bus_ceilings() {
        // 25 / 5 * 224 / 2 = 560 MHz
        assert!(matches!(
            check(&pll1_at(Family::Rm0455, 224)),
            Err(Error::CeilingExceeded {
                clock: Clock::SysCk,
                ..
            })
        ));

        let config = pll1_at(Family::Rm0433, 192).hpre(1);
        assert_eq!(
            check(&config),
            Err(Error::CeilingExceeded {
                clock: Clock::Hclk,
                freq: Hertz(480_000_000),
                max: Hertz(240_000_000),
            })
        );

        let config = pll1_at(Family::Rm0433, 192).d3ppre(1);
        assert_eq!(
            check(&config),
            Err(Error::CeilingExceeded {
                clock: Clock::Pclk4,
                freq: Hertz(240_000_000),
                max: Hertz(120_000_000),
            })
        );
    }

    #[test]
    fn core_prescaler_must_be_one() {
        let config = pll1_at(Family::Rm0399, 192).d1cpre(2);
        assert_eq!(check(&config), Err(Error::CorePrescaler(2)));
    }

    #[test]
    fn unsupported_prescaler_ratios() {
        assert_eq!(
            check(&pll1_at(Family::Rm0433, 192).hpre(32)),
            Err(Error::InvalidDivider)
        );
        assert_eq!(
            check(&pll1_at(Family::Rm0433, 192).d2ppre1(3)),
            Err(Error::InvalidDivider)
        );
    }

    #[test]
    fn pll_divider_ranges() {
        let base = Config::new(Family::Rm0433)
            .pll_source(Source::Hsi)
            .sys_ck_src(SysClkSource::Hsi);

        for config in [
            base.clone().pll2(0, 100).pll2_p(2),
            base.clone().pll2(64, 100).pll2_p(2),
            base.clone().pll2(32, 3).pll2_p(2),
            base.clone().pll2(32, 513).pll2_p(2),
            base.clone().pll2(32, 100).pll2_q(0),
            base.clone().pll2(32, 100).pll2_r(129),
            base.clone().pll1(32, 100).pll1_p(3),
            // Enabled, but no output
            base.clone().pll2(32, 100),
        ]
        .iter()
        {
            assert_eq!(check(config), Err(Error::InvalidDivider), "{:?}", config);
        }

        // Odd dividers are fine on PLL2 P
        let clocks = check(&base.pll2(32, 100).pll2_p(3)).unwrap();
        assert_eq!(clocks.pll2_p_ck(), Some(Hertz(66_666_666)));
        assert_eq!(clocks.pll2_q_ck(), None);
    }

    #[test]
    fn pll_needs_a_pll_source() {
        let config = Config::new(Family::Rm0433).pll3(4, 100).pll3_q(2);
        assert_eq!(check(&config), Err(Error::Unsupported));

        let config = config.pll_source(Source::Hsi48);
        assert_eq!(check(&config), Err(Error::Unsupported));

        let config = config.pll_source(Source::Csi);
        assert_eq!(check(&config), Err(Error::Unsupported));

        // 4 MHz / 4 * 100 / 2 = 50 MHz
        let clocks = check(&config.enable_csi()).unwrap();
        assert_eq!(
            clocks.pll_outputs(PllUnit::Pll3),
            (None, Some(Hertz(50_000_000)), None)
        );
    }

    #[test]
    fn sys_ck_source_must_be_running() {
        let config = Config::new(Family::Rm0433).sys_ck_src(SysClkSource::Csi);
        assert_eq!(check(&config), Err(Error::Unsupported));

        let config = Config::new(Family::Rm0433).sys_ck_src(SysClkSource::Hse);
        assert_eq!(check(&config), Err(Error::Unsupported));

        // PLL1 without a P output
        let config = Config::new(Family::Rm0433)
            .pll_source(Source::Hsi)
            .pll1(32, 100)
            .pll1_q(2)
            .sys_ck_src(SysClkSource::Pll1);
        assert_eq!(check(&config), Err(Error::Unsupported));

        let config = Config::new(Family::Generic)
            .enable_csi()
            .sys_ck_src(SysClkSource::Csi);
        let clocks = check(&config).unwrap();
        assert_eq!(clocks.sys_ck().0, 4_000_000);
        assert_eq!(clocks.hsi_ck(), Some(Hertz(64_000_000)));
    }

    #[test]
    fn declared_sys_ck_must_match() {
        let config = pll1_at(Family::Rm0399, 192).sys_ck(400.mhz());
        assert_eq!(
            check(&config),
            Err(Error::SysClkMismatch {
                expected: Hertz(400_000_000),
                actual: Hertz(480_000_000),
            })
        );
        assert!(check(&config.sys_ck(480.mhz())).is_ok());
    }

    #[test]
    fn lowest_voltage_scale() {
        for &(n, vos) in &[
            (192, VoltageScale::Scale0), // 480 MHz
            (160, VoltageScale::Scale1), // 400 MHz
            (120, VoltageScale::Scale2), // 300 MHz
            (80, VoltageScale::Scale3),  // 200 MHz
        ] {
            let clocks = check(&pll1_at(Family::Rm0433, n)).unwrap();
            println!("{} MHz => {:?}", clocks.sys_ck().0 / 1_000_000, vos);
            assert_eq!(optimal_voltage(Family::Rm0433, &clocks), vos);
        }

        // No table: stay at the maximum
        let clocks = check(&Config::new(Family::Rm0468)).unwrap();
        assert_eq!(optimal_voltage(Family::Rm0468, &clocks), VoltageScale::MAX);

        // 64 MHz APB clocks are over the VOS3 limit
        let clocks = check(&Config::new(Family::Rm0399)).unwrap();
        assert_eq!(optimal_voltage(Family::Rm0399, &clocks), VoltageScale::Scale2);
        let config = Config::new(Family::Rm0399)
            .d1ppre(2)
            .d2ppre1(2)
            .d2ppre2(2)
            .d3ppre(2);
        let clocks = check(&config).unwrap();
        assert_eq!(optimal_voltage(Family::Rm0399, &clocks), VoltageScale::Scale3);
    }
}
