//! Frequencies of the frozen clock tree

use super::rec::{Bus, PeripheralId};
use super::{Error, PllUnit};
use crate::time::Hertz;

/// Frequency after an integer divider. Fractions of a hertz are dropped.
///
/// `divisor` must not be zero; prescaler ratios are validated before
/// they reach this function.
pub const fn derive(base: u32, divisor: u32) -> u32 {
    base / divisor
}

/// Output frequency of a PLL: `(src * n) / (m * div)`, rounded down
///
/// Fails when `m` or `div` is zero, or when the result does not fit in
/// 32 bits.
pub fn pll_output(src: u32, m: u32, n: u32, div: u32) -> Result<u32, Error> {
    if m == 0 || div == 0 {
        return Err(Error::InvalidDivider);
    }
    let out = (u64::from(src) * u64::from(n)) / (u64::from(m) * u64::from(div));
    cast::u32(out).map_err(|_| Error::InvalidDivider)
}

/// Integer ratios of the prescaler chain
///
/// `sys_ck` -> D1CPRE -> `c_ck` -> HPRE -> `hclk` -> D1PPRE / D2PPRE1 /
/// D2PPRE2 / D3PPRE -> `pclk3` / `pclk1` / `pclk2` / `pclk4`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PrescalerChain {
    /// System to CPU
    pub d1cpre: u16,
    /// CPU to AXI/AHB
    pub hpre: u16,
    /// AHB to APB3
    pub d1ppre: u16,
    /// AHB to APB1
    pub d2ppre1: u16,
    /// AHB to APB2
    pub d2ppre2: u16,
    /// AHB to APB4
    pub d3ppre: u16,
}

impl Default for PrescalerChain {
    fn default() -> Self {
        PrescalerChain {
            d1cpre: 1,
            hpre: 1,
            d1ppre: 1,
            d2ppre1: 1,
            d2ppre2: 1,
            d3ppre: 1,
        }
    }
}

impl PrescalerChain {
    /// Ratio between `hclk` and the clock of `bus`
    pub fn bus_ratio(&self, bus: Bus) -> u16 {
        match bus {
            Bus::Ahb1 | Bus::Ahb2 | Bus::Ahb3 | Bus::Ahb4 => 1,
            Bus::Apb1L | Bus::Apb1H => self.d2ppre1,
            Bus::Apb2 => self.d2ppre2,
            Bus::Apb3 => self.d1ppre,
            Bus::Apb4 => self.d3ppre,
        }
    }
}

/// D1CPRE / HPRE encoding
pub(crate) fn hpre_bits(ratio: u16) -> Option<u32> {
    Some(match ratio {
        1 => 0b0000,
        2 => 0b1000,
        4 => 0b1001,
        8 => 0b1010,
        16 => 0b1011,
        64 => 0b1100,
        128 => 0b1101,
        256 => 0b1110,
        512 => 0b1111,
        _ => return None,
    })
}

/// D1PPRE / D2PPREx / D3PPRE encoding
pub(crate) fn ppre_bits(ratio: u16) -> Option<u32> {
    Some(match ratio {
        1 => 0b000,
        2 => 0b100,
        4 => 0b101,
        8 => 0b110,
        16 => 0b111,
        _ => return None,
    })
}

/// Decode D1CPRE / HPRE
pub(crate) fn hpre_ratio(bits: u32) -> u32 {
    match bits {
        0b1000..=0b1011 => 2 << (bits - 0b1000),
        0b1100..=0b1111 => 64 << (bits - 0b1100),
        _ => 1,
    }
}

/// P, Q and R outputs of one PLL
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct PllClocks {
    pub p_ck: Option<Hertz>,
    pub q_ck: Option<Hertz>,
    pub r_ck: Option<Hertz>,
}

/// Frozen core clock frequencies
///
/// The existence of this value indicates that the core clock
/// configuration can no longer be changed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoreClocks {
    pub(crate) sys_ck: Hertz,
    pub(crate) c_ck: Hertz,
    pub(crate) hclk: Hertz,
    pub(crate) pclk1: Hertz,
    pub(crate) pclk2: Hertz,
    pub(crate) pclk3: Hertz,
    pub(crate) pclk4: Hertz,
    pub(crate) hse_ck: Option<Hertz>,
    pub(crate) hsi_ck: Option<Hertz>,
    pub(crate) csi_ck: Option<Hertz>,
    pub(crate) hsi48_ck: Option<Hertz>,
    pub(crate) lsi_ck: Option<Hertz>,
    pub(crate) lse_ck: Option<Hertz>,
    pub(crate) pll: [PllClocks; 3],
    pub(crate) chain: PrescalerChain,
}

macro_rules! getters {
    ($($name:ident: $doc:literal),+) => {
        $(
            #[doc = $doc]
            pub fn $name(&self) -> Hertz {
                self.$name
            }
        )+
    };
}

macro_rules! optional_getters {
    ($($name:ident: $doc:literal),+) => {
        $(
            #[doc = $doc]
            pub fn $name(&self) -> Option<Hertz> {
                self.$name
            }
        )+
    };
}

macro_rules! pll_getters {
    ($($pll:ident: $idx:literal),+) => {
        paste::paste! {
            $(
                #[doc = "Returns `" $pll "_p_ck` if PLL" $idx " P output is enabled"]
                pub fn [<$pll _p_ck>](&self) -> Option<Hertz> {
                    self.pll[$idx - 1].p_ck
                }

                #[doc = "Returns `" $pll "_q_ck` if PLL" $idx " Q output is enabled"]
                pub fn [<$pll _q_ck>](&self) -> Option<Hertz> {
                    self.pll[$idx - 1].q_ck
                }

                #[doc = "Returns `" $pll "_r_ck` if PLL" $idx " R output is enabled"]
                pub fn [<$pll _r_ck>](&self) -> Option<Hertz> {
                    self.pll[$idx - 1].r_ck
                }
            )+
        }
    };
}

impl CoreClocks {
    getters! {
        sys_ck: "Returns the system (core) frequency",
        c_ck: "Returns the CPU frequency, `sys_ck` after D1CPRE",
        hclk: "Returns the frequency of the AHB and AXI busses",
        pclk1: "Returns the frequency of the APB1",
        pclk2: "Returns the frequency of the APB2",
        pclk3: "Returns the frequency of the APB3",
        pclk4: "Returns the frequency of the APB4"
    }

    optional_getters! {
        hse_ck: "Returns `hse_ck` if HSE was started",
        hsi_ck: "Returns `hsi_ck`, after HSIDIV, if HSI was started",
        csi_ck: "Returns `csi_ck` if CSI was started",
        hsi48_ck: "Returns `hsi48_ck` if HSI48 was started",
        lsi_ck: "Returns `lsi_ck` if LSI was started",
        lse_ck: "Returns `lse_ck` if LSE was started"
    }

    pll_getters! { pll1: 1, pll2: 2, pll3: 3 }

    /// Returns the output of a PLL as `(p, q, r)`
    pub fn pll_outputs(
        &self,
        unit: PllUnit,
    ) -> (Option<Hertz>, Option<Hertz>, Option<Hertz>) {
        let pll = &self.pll[unit.index()];
        (pll.p_ck, pll.q_ck, pll.r_ck)
    }

    /// Returns the prescaler ratios the tree was frozen with
    pub fn prescalers(&self) -> &PrescalerChain {
        &self.chain
    }

    /// Frequency of the bus clock feeding a peripheral
    ///
    /// Walks the prescaler chain from `c_ck`. No hardware is read.
    pub fn query_rate(&self, id: PeripheralId) -> Result<Hertz, Error> {
        let bus = Bus::from_offset(id.bus)?;
        let hclk = derive(self.c_ck.0, u32::from(self.chain.hpre));
        Ok(Hertz(derive(hclk, u32::from(self.chain.bus_ratio(bus)))))
    }
}
