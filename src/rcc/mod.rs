//! Reset and Clock Control
//!
//! This module brings up the clock tree of the STM32H7: it starts the
//! oscillators, configures the PLLs, sets the voltage scale and flash
//! latency, presets the bus prescalers and switches `sys_ck` to its
//! final source. Afterwards it gates the clocks of individual
//! peripherals from either core.
//!
//! See Fig 46 "Core and bus clock generation" in Reference Manual
//! RM0433 for information (p 336).
//!
//! HSI is 64 MHz.
//! CSI is 4 MHz.
//! HSI48 is 48MHz.
//!
//! # Usage
//!
//! Unlike a best-effort solver, nothing here is computed: the
//! [`Config`] descriptor names every source, every PLL divider and
//! every prescaler ratio. The descriptor is checked against the
//! datasheet limits of the selected [`Family`] before any register is
//! written, so an impossible tree is rejected up front.
//!
//! ```
//! use stm32h7xx_clocks::prelude::*;
//! use stm32h7xx_clocks::rcc::{Config, Family, SysClkSource, Source};
//!
//! let config = Config::new(Family::Rm0399)
//!     .use_hse(25.mhz()) // XTAL X1
//!     .pll_source(Source::Hse)
//!     .pll1(5, 192) // 5 MHz reference, 960 MHz VCO
//!     .pll1_p(2)
//!     .pll1_q(4)
//!     .sys_ck_src(SysClkSource::Pll1)
//!     .hpre(2)
//!     .d1ppre(2)
//!     .d2ppre1(2)
//!     .d2ppre2(2)
//!     .d3ppre(2);
//!
//! let clocks = config.check().unwrap();
//! assert_eq!(clocks.sys_ck().0, 480_000_000);
//! assert_eq!(clocks.hclk().0, 240_000_000);
//! assert_eq!(clocks.pclk1().0, 120_000_000);
//! ```
//!
//! The `freeze` method runs the bring-up sequence on the Cortex-M7 and
//! returns a [Core Clocks Distribution and Reset (CCDR)](struct.Ccdr.html)
//! object. The Cortex-M4 never configures the tree; it calls `attach`
//! with the same descriptor to obtain the same view of it.
//!
//! ```no_run
//! use stm32h7xx_clocks::rcc::{rec, Config, CoreId, Family, Rcc};
//! use stm32h7xx_clocks::{Spin, Volatile};
//!
//! let mmio = unsafe { Volatile::steal() };
//! let ccdr = Rcc::new(mmio, CoreId::Cm7, Config::new(Family::Rm0399))
//!     .freeze(&mut Spin)
//!     .unwrap();
//!
//! // Enable the clock to a peripheral
//! ccdr.peripheral.enable(rec::USART1).unwrap();
//!
//! // Kernel clock of the bus it sits on
//! let rate = ccdr.clocks.query_rate(rec::USART1).unwrap();
//! ```
//!
#![deny(missing_docs)]

use core::fmt;

use crate::hsem::{Hsem, RCC_SEMID};
use crate::mmio::{Flag, Mmio, Wait};
use crate::pwr::SupplyConfig;
use crate::time::Hertz;

mod core_clocks;
mod limits;
mod osc;
mod pll;
pub mod rec;
pub(crate) mod regs;
mod sequencer;

pub use core_clocks::{derive, pll_output, CoreClocks, PrescalerChain};
pub use limits::{Ceilings, Family};
pub use pll::{PllConfig, PllUnit, VcoInputRange, VcoOutputRange};
pub use rec::{Bus, PeripheralId, PeripheralREC};
pub use sequencer::State;

/// HSI oscillator frequency, before HSIDIV
pub const HSI: u32 = 64_000_000; // Hz
/// CSI oscillator frequency
pub const CSI: u32 = 4_000_000; // Hz
/// HSI48 oscillator frequency
pub const HSI48: u32 = 48_000_000; // Hz
/// LSI oscillator frequency
pub const LSI: u32 = 32_000; // Hz
/// Usual LSE crystal frequency
pub const LSE: u32 = 32_768; // Hz

/// Default number of attempts made to take the RCC semaphore
pub const HSEM_DEFAULT_RETRY: u32 = 0xF_FFFF;

/// Clock control errors
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Unknown bus or peripheral, or no usable source selected for the
    /// system clock or a PLL
    Unsupported,
    /// PLL reference frequency outside every VCO input range
    Range {
        /// Frequency at the PLL phase detector input, in Hz
        vco_in: u32,
    },
    /// A clock exceeds the datasheet maximum for this family
    CeilingExceeded {
        /// Which clock
        clock: Clock,
        /// Computed frequency
        freq: Hertz,
        /// Family maximum
        max: Hertz,
    },
    /// The system to core prescaler (D1CPRE) must be 1
    CorePrescaler(u16),
    /// A divider or multiplier outside the values the hardware accepts
    InvalidDivider,
    /// The computed system clock differs from the one declared
    SysClkMismatch {
        /// Declared `sys_ck`
        expected: Hertz,
        /// `sys_ck` produced by the descriptor
        actual: Hertz,
    },
    /// The RCC semaphore could not be taken within the retry budget
    Busy,
    /// A hardware flag never came up
    Stalled(Flag),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Unsupported => f.write_str("unsupported clock or peripheral"),
            Error::Range { vco_in } => {
                write!(f, "PLL reference {} Hz outside VCO input ranges", vco_in)
            }
            Error::CeilingExceeded { clock, freq, max } => {
                write!(f, "{:?} at {} exceeds {}", clock, freq, max)
            }
            Error::CorePrescaler(ratio) => {
                write!(f, "core prescaler {} not supported, must be 1", ratio)
            }
            Error::InvalidDivider => f.write_str("invalid divider"),
            Error::SysClkMismatch { expected, actual } => {
                write!(f, "sys_ck is {}, expected {}", actual, expected)
            }
            Error::Busy => f.write_str("RCC semaphore busy"),
            Error::Stalled(flag) => write!(f, "stalled waiting for {:?}", flag),
        }
    }
}

/// Clocks checked against a ceiling
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Clock {
    /// CPU clock, `sys_d1cpre_ck`
    SysCk,
    /// AXI and AHB clock
    Hclk,
    /// APB1
    Pclk1,
    /// APB2
    Pclk2,
    /// APB3
    Pclk3,
    /// APB4
    Pclk4,
}

/// Core executing the calling code
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CoreId {
    /// Cortex-M7, runs clock bring-up. The only core on single core parts.
    Cm7,
    /// Cortex-M4 of dual core parts
    Cm4,
}

impl CoreId {
    /// Offset of this core's view of the clock enable registers
    pub const fn enr_offset(self) -> u32 {
        match self {
            CoreId::Cm7 => 0,
            CoreId::Cm4 => 0x60,
        }
    }

    /// COREID reported by the hardware semaphore block
    pub const fn hsem_id(self) -> u32 {
        match self {
            CoreId::Cm7 => 3,
            CoreId::Cm4 => 1,
        }
    }

    /// Identify the running core from the CPUID part number
    #[cfg(all(target_arch = "arm", target_os = "none"))]
    pub fn current() -> Self {
        // unsafe: read-only access to an always present system register
        let cpuid = unsafe { (*cortex_m::peripheral::CPUID::PTR).base.read() };
        match (cpuid >> 4) & 0xFFF {
            0xC24 => CoreId::Cm4,
            _ => CoreId::Cm7,
        }
    }
}

/// Clock sources
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// High speed external oscillator
    Hse,
    /// 64 MHz high speed internal oscillator
    Hsi,
    /// 4 MHz low power internal oscillator
    Csi,
    /// 48 MHz internal oscillator
    Hsi48,
    /// 32 kHz low speed internal oscillator
    Lsi,
    /// Low speed external oscillator, in the backup domain
    Lse,
}

impl Source {
    /// Bring-up order
    pub const ALL: [Source; 6] = [
        Source::Hse,
        Source::Hsi,
        Source::Csi,
        Source::Hsi48,
        Source::Lsi,
        Source::Lse,
    ];

    const fn index(self) -> usize {
        self as usize
    }
}

/// System clock source
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SysClkSource {
    /// HSI, after HSIDIV
    Hsi,
    /// CSI
    Csi,
    /// HSE
    Hse,
    /// PLL1 P output
    Pll1,
}

impl SysClkSource {
    /// RCC_CFGR.SW / SWS encoding
    pub(crate) const fn bits(self) -> u32 {
        use regs::CFGR::SW::Value;

        let sw = match self {
            SysClkSource::Hsi => Value::Hsi,
            SysClkSource::Csi => Value::Csi,
            SysClkSource::Hse => Value::Hse,
            SysClkSource::Pll1 => Value::Pll1,
        };
        sw as u32
    }
}

/// HSI output divider
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HsiDiv {
    /// 64 MHz
    Div1,
    /// 32 MHz
    Div2,
    /// 16 MHz
    Div4,
    /// 8 MHz
    Div8,
}

impl HsiDiv {
    pub(crate) const fn bits(self) -> u32 {
        self as u32
    }

    /// Division ratio
    pub const fn ratio(self) -> u32 {
        1 << (self as u32)
    }
}

/// Declared state of one oscillator
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OscConfig {
    /// Started during bring-up
    pub enabled: bool,
    /// Frequency at the oscillator output, before any divider
    pub freq: u32,
    /// External clock fed directly, crystal driver bypassed
    pub bypass: bool,
}

/// Configuration of the clock tree
///
/// An immutable descriptor of every source, PLL and prescaler. Built
/// with the methods below and checked with [`Config::check`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub(crate) family: Family,
    pub(crate) supply: SupplyConfig,
    pub(crate) sources: [OscConfig; 6],
    pub(crate) hsi_div: HsiDiv,
    pub(crate) pll_src: Option<Source>,
    pub(crate) pll: [PllConfig; 3],
    pub(crate) sys_src: Option<SysClkSource>,
    pub(crate) sys_ck: Option<u32>,
    pub(crate) prescalers: PrescalerChain,
    pub(crate) hsem_retries: u32,
}

macro_rules! pll_setters {
    ($($pll:ident: $idx:literal),+) => {
        paste::paste! {
            $(
                #[doc = "Enable PLL" $idx " with input divider `m` and multiplier `n`"]
                pub fn $pll(mut self, m: u8, n: u16) -> Self {
                    let pll = &mut self.pll[$idx - 1];
                    pll.enabled = true;
                    pll.m = m;
                    pll.n = n;
                    self
                }

                #[doc = "Enable the P output of PLL" $idx " with divider `p`"]
                pub fn [<$pll _p>](mut self, p: u8) -> Self {
                    self.pll[$idx - 1].p = Some(p);
                    self
                }

                #[doc = "Enable the Q output of PLL" $idx " with divider `q`"]
                pub fn [<$pll _q>](mut self, q: u8) -> Self {
                    self.pll[$idx - 1].q = Some(q);
                    self
                }

                #[doc = "Enable the R output of PLL" $idx " with divider `r`"]
                pub fn [<$pll _r>](mut self, r: u8) -> Self {
                    self.pll[$idx - 1].r = Some(r);
                    self
                }
            )+
        }
    };
}

macro_rules! prescaler_setters {
    ($($stage:ident: $doc:literal),+) => {
        $(
            #[doc = $doc]
            pub fn $stage(mut self, ratio: u16) -> Self {
                self.prescalers.$stage = ratio;
                self
            }
        )+
    };
}

impl Config {
    /// The reset state: HSI at 64 MHz drives everything, all prescalers
    /// are 1.
    pub fn new(family: Family) -> Self {
        let osc = |enabled, freq| OscConfig {
            enabled,
            freq,
            bypass: false,
        };
        Config {
            family,
            supply: SupplyConfig::Ldo,
            sources: [
                osc(false, 0),
                osc(true, HSI),
                osc(false, CSI),
                osc(false, HSI48),
                osc(false, LSI),
                osc(false, LSE),
            ],
            hsi_div: HsiDiv::Div1,
            pll_src: None,
            pll: [PllConfig::default(); 3],
            sys_src: Some(SysClkSource::Hsi),
            sys_ck: None,
            prescalers: PrescalerChain::default(),
            hsem_retries: HSEM_DEFAULT_RETRY,
        }
    }

    /// Uses HSE (external oscillator) instead of HSI (internal RC
    /// oscillator) as the clock source.
    pub fn use_hse<T>(mut self, freq: T) -> Self
    where
        T: Into<Hertz>,
    {
        let hse = &mut self.sources[Source::Hse.index()];
        hse.enabled = true;
        hse.freq = freq.into().0;
        self
    }

    /// Use an external clock signal rather than a crystal oscillator,
    /// bypassing the XTAL driver.
    pub fn bypass_hse(mut self) -> Self {
        self.sources[Source::Hse.index()].bypass = true;
        self
    }

    /// Set the HSI output divider
    pub fn hsi_div(mut self, div: HsiDiv) -> Self {
        self.hsi_div = div;
        self
    }

    /// Do not start HSI during bring-up
    pub fn disable_hsi(mut self) -> Self {
        self.sources[Source::Hsi.index()].enabled = false;
        self
    }

    /// Start CSI
    pub fn enable_csi(mut self) -> Self {
        self.sources[Source::Csi.index()].enabled = true;
        self
    }

    /// Start HSI48
    pub fn enable_hsi48(mut self) -> Self {
        self.sources[Source::Hsi48.index()].enabled = true;
        self
    }

    /// Start LSI
    pub fn enable_lsi(mut self) -> Self {
        self.sources[Source::Lsi.index()].enabled = true;
        self
    }

    /// Start LSE with a crystal of the given frequency
    pub fn use_lse<T>(mut self, freq: T) -> Self
    where
        T: Into<Hertz>,
    {
        let lse = &mut self.sources[Source::Lse.index()];
        lse.enabled = true;
        lse.freq = freq.into().0;
        self
    }

    /// Feed LSE from an external clock signal
    pub fn bypass_lse(mut self) -> Self {
        self.sources[Source::Lse.index()].bypass = true;
        self
    }

    /// Input of all PLLs. Must be HSI, CSI or HSE.
    pub fn pll_source(mut self, source: Source) -> Self {
        self.pll_src = Some(source);
        self
    }

    pll_setters! { pll1: 1, pll2: 2, pll3: 3 }

    /// Select the system clock source
    pub fn sys_ck_src(mut self, source: SysClkSource) -> Self {
        self.sys_src = Some(source);
        self
    }

    /// Declare the expected system clock. The descriptor is rejected
    /// if it produces anything else.
    pub fn sys_ck<T>(mut self, freq: T) -> Self
    where
        T: Into<Hertz>,
    {
        self.sys_ck = Some(freq.into().0);
        self
    }

    prescaler_setters! {
        d1cpre: "System to CPU clock prescaler. Only 1 is supported.",
        hpre: "CPU clock to AXI/AHB prescaler",
        d1ppre: "AHB to APB3 prescaler",
        d2ppre1: "AHB to APB1 prescaler",
        d2ppre2: "AHB to APB2 prescaler",
        d3ppre: "AHB to APB4 prescaler"
    }

    /// Power supply configuration of the board
    pub fn supply(mut self, supply: SupplyConfig) -> Self {
        self.supply = supply;
        self
    }

    /// Attempts made to take the RCC semaphore before giving up
    pub fn hsem_retries(mut self, retries: u32) -> Self {
        self.hsem_retries = retries;
        self
    }

    /// Hardware family
    pub fn family(&self) -> Family {
        self.family
    }

    /// Declared state of a source
    pub fn source(&self, source: Source) -> &OscConfig {
        &self.sources[source.index()]
    }

    /// Configuration of one PLL
    pub fn pll(&self, unit: PllUnit) -> &PllConfig {
        &self.pll[unit.index()]
    }

    /// Output frequency of an enabled source, after any divider
    pub fn source_freq(&self, source: Source) -> Option<u32> {
        let osc = self.source(source);
        if !osc.enabled {
            return None;
        }
        match source {
            Source::Hsi => Some(derive(osc.freq, self.hsi_div.ratio())),
            _ => Some(osc.freq),
        }
    }

    /// Validate the descriptor against the family limits and compute
    /// every resulting clock. No hardware is touched.
    pub fn check(&self) -> Result<CoreClocks, Error> {
        limits::check(self)
    }
}

/// Clock control for one core
///
/// Owns the register access capability until it is handed to the
/// [`Ccdr`] returned by [`freeze`](Rcc::freeze) or
/// [`attach`](Rcc::attach).
pub struct Rcc<M> {
    config: Config,
    core: CoreId,
    mmio: M,
}

/// Core Clock Distribution and Reset (CCDR)
///
/// Generated when the RCC is frozen. The configuration of the Sys_Ck
/// `sys_ck`, CPU Clock `c_ck`, AXI peripheral clock `aclk`, AHB
/// clocks `hclk`, APB clocks `pclkN` and PLL outputs `pllN_X_ck` are
/// frozen. Peripheral clocks may still be gated through `peripheral`.
pub struct Ccdr<M> {
    /// A record of the frozen core clock frequencies
    pub clocks: CoreClocks,

    /// Peripheral clock gating for this core
    pub peripheral: PeripheralREC<M>,
}

impl<M: Mmio> Rcc<M> {
    /// Take control of the RCC from `core`
    pub fn new(mmio: M, core: CoreId, config: Config) -> Self {
        Rcc { config, core, mmio }
    }

    /// The descriptor this RCC was created with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bring the clock tree up, once, from the Cortex-M7
    ///
    /// The descriptor is checked first; a rejected descriptor leaves
    /// the hardware untouched. The RCC semaphore is held for the whole
    /// sequence. A failure part way through leaves already started
    /// oscillators and PLLs running.
    pub fn freeze<W: Wait>(self, waiter: &mut W) -> Result<Ccdr<M>, Error> {
        if self.core != CoreId::Cm7 {
            return Err(Error::Unsupported);
        }

        let clocks = self.config.check()?;

        // The semaphore block needs its clock before it can be used
        let hsem = rec::hsem(self.config.family);
        self.mmio.modify(
            regs::RCC + hsem.bus + self.core.enr_offset(),
            |r| r | hsem.enr,
        );

        {
            let _lock = Hsem::new(&self.mmio, self.core)
                .lock(RCC_SEMID, self.config.hsem_retries)?;

            sequencer::Sequencer::new(&self.mmio, waiter, &self.config, &clocks)
                .run()?;
        }

        log::debug!(
            "sys_ck {} hclk {} pclk1 {} pclk2 {} pclk3 {} pclk4 {}",
            clocks.sys_ck(),
            clocks.hclk(),
            clocks.pclk1(),
            clocks.pclk2(),
            clocks.pclk3(),
            clocks.pclk4()
        );

        Ok(Ccdr {
            clocks,
            peripheral: PeripheralREC::new(
                self.mmio,
                self.core,
                self.config.hsem_retries,
            ),
        })
    }

    /// Use a clock tree brought up by the Cortex-M7
    ///
    /// Nothing is written. The descriptor must be the one the Cortex-M7
    /// froze.
    pub fn attach(self) -> Result<Ccdr<M>, Error> {
        let clocks = self.config.check()?;

        Ok(Ccdr {
            clocks,
            peripheral: PeripheralREC::new(
                self.mmio,
                self.core,
                self.config.hsem_retries,
            ),
        })
    }
}

impl<M: Mmio> Ccdr<M> {
    /// Frequency of the bus clock feeding a peripheral
    pub fn query_rate(&self, id: PeripheralId) -> Result<Hertz, Error> {
        self.clocks.query_rate(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Soc, Timeout};
    use crate::prelude::*;

    fn h747_480mhz() -> Config {
        Config::new(Family::Rm0399)
            .use_hse(25.mhz())
            .pll_source(Source::Hse)
            .pll1(5, 192)
            .pll1_p(2)
            .pll1_q(4)
            .sys_ck_src(SysClkSource::Pll1)
            .sys_ck(480.mhz())
            .hpre(2)
            .d1ppre(2)
            .d2ppre1(2)
            .d2ppre2(2)
            .d3ppre(2)
    }

    #[test]
    fn freeze_then_gate_from_both_cores() {
        let soc = Soc::new();

        let ccdr = Rcc::new(soc.core(CoreId::Cm7), CoreId::Cm7, h747_480mhz())
            .freeze(&mut Timeout::default())
            .unwrap();
        let cm4 = Rcc::new(soc.core(CoreId::Cm4), CoreId::Cm4, h747_480mhz())
            .attach()
            .unwrap();

        assert_eq!(ccdr.clocks.sys_ck().0, 480_000_000);
        assert_eq!(cm4.clocks, ccdr.clocks);
        assert_eq!(ccdr.query_rate(rec::USART1).unwrap().0, 120_000_000);
        assert_eq!(cm4.query_rate(rec::GPIOA).unwrap().0, 240_000_000);

        ccdr.peripheral.enable(rec::USART1).unwrap();
        cm4.peripheral.enable(rec::FDCAN).unwrap();

        // Both cores gate through the same enable registers
        let apb2 = regs::RCC + Bus::Apb2.offset();
        assert_ne!(soc.peek(apb2) & rec::USART1.enr, 0);
        assert_eq!(soc.peek(apb2), soc.peek(apb2 + 0x60));
        assert_ne!(soc.peek(regs::RCC + Bus::Apb1H.offset()) & rec::FDCAN.enr, 0);
        assert!(cm4.peripheral.is_enabled(rec::USART1).unwrap());

        // Bring-up released the semaphore
        assert!(soc.hsem_owner(RCC_SEMID).is_none());
    }

    #[test]
    fn freeze_refused_on_cm4() {
        let soc = Soc::new();

        let result = Rcc::new(soc.core(CoreId::Cm4), CoreId::Cm4, h747_480mhz())
            .freeze(&mut Timeout::default());

        assert_eq!(result.err(), Some(Error::Unsupported));
        assert_eq!(soc.write_count(), 0);
    }

    #[test]
    fn rejected_config_touches_nothing() {
        let soc = Soc::new();
        // 550 MHz is beyond the RM0399 ceiling
        let config = h747_480mhz().pll1(5, 220).sys_ck(550.mhz());

        let result = Rcc::new(soc.core(CoreId::Cm7), CoreId::Cm7, config)
            .freeze(&mut Timeout::default());

        match result {
            Err(Error::CeilingExceeded { clock, .. }) => {
                assert_eq!(clock, Clock::SysCk)
            }
            _ => panic!("expected ceiling rejection"),
        }
        assert_eq!(soc.write_count(), 0);

        // 240 MHz on APB4
        let config = h747_480mhz().d3ppre(1);

        let result = Rcc::new(soc.core(CoreId::Cm7), CoreId::Cm7, config)
            .freeze(&mut Timeout::default());

        match result {
            Err(Error::CeilingExceeded { clock, .. }) => {
                assert_eq!(clock, Clock::Pclk4)
            }
            _ => panic!("expected ceiling rejection"),
        }
        assert_eq!(soc.write_count(), 0);
    }

    #[test]
    fn semaphore_clock_follows_family() {
        let ahb2 = regs::RCC + Bus::Ahb2.offset();
        let ahb4 = regs::RCC + Bus::Ahb4.offset();

        let soc = Soc::new();
        Rcc::new(soc.core(CoreId::Cm7), CoreId::Cm7, Config::new(Family::Rm0455))
            .freeze(&mut Timeout::default())
            .unwrap();
        println!("AHB2ENR {:#010x} AHB4ENR {:#010x}", soc.peek(ahb2), soc.peek(ahb4));
        assert_eq!(soc.peek(ahb2), rec::hsem(Family::Rm0455).enr);
        assert_eq!(soc.peek(ahb4) & rec::HSEM.enr, 0);

        let soc = Soc::new();
        Rcc::new(soc.core(CoreId::Cm7), CoreId::Cm7, h747_480mhz())
            .freeze(&mut Timeout::default())
            .unwrap();
        assert_eq!(soc.peek(ahb4) & rec::HSEM.enr, rec::HSEM.enr);
        assert_eq!(soc.peek(ahb2), 0);
    }

    #[test]
    fn freeze_busy_when_other_core_holds_semaphore() {
        let soc = Soc::new();
        let m4 = soc.core(CoreId::Cm4);
        let guard = Hsem::new(&m4, CoreId::Cm4).lock(RCC_SEMID, 1).unwrap();

        let result = Rcc::new(
            soc.core(CoreId::Cm7),
            CoreId::Cm7,
            h747_480mhz().hsem_retries(16),
        )
        .freeze(&mut Timeout::default());

        assert_eq!(result.err(), Some(Error::Busy));
        // Only the semaphore clock enable was written
        assert!(!regs::CR::HSEON.is_set(soc.peek(regs::RCC_CR.addr)));
        drop(guard);
    }

    #[test]
    fn semaphore_released_after_failed_bring_up() {
        let soc = Soc::new();
        // 25 MHz / 1 is above every VCO input range
        let config = Config::new(Family::Rm0468)
            .use_hse(25.mhz())
            .pll_source(Source::Hse)
            .pll1(1, 40)
            .pll1_p(2)
            .sys_ck_src(SysClkSource::Pll1)
            .hpre(2)
            .d1ppre(2)
            .d2ppre1(2)
            .d2ppre2(2)
            .d3ppre(2);

        let result = Rcc::new(soc.core(CoreId::Cm7), CoreId::Cm7, config)
            .freeze(&mut Timeout::default());

        assert_eq!(
            result.err(),
            Some(Error::Range {
                vco_in: 25_000_000
            })
        );
        assert!(soc.hsem_owner(RCC_SEMID).is_none());
    }

    #[test]
    fn error_display() {
        assert_eq!(
            Error::Range { vco_in: 500_000 }.to_string(),
            "PLL reference 500000 Hz outside VCO input ranges"
        );
        assert_eq!(Error::Busy.to_string(), "RCC semaphore busy");
    }
}
