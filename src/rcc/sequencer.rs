//! Clock tree bring-up sequence
//!
//! A single forward pass through [`State`]. Flash latency moves to the
//! side of the system clock switch given by the direction of the change:
//! raised before switching when `hclk` goes up, lowered after the switch
//! is confirmed otherwise. The voltage scale is held at its maximum
//! until the new clocks are running.

use super::core_clocks::{hpre_bits, hpre_ratio, ppre_bits};
use super::limits::optimal_voltage;
use super::regs::*;
use super::{osc, pll, Config, CoreClocks, Error, Source};
use crate::mmio::{field_is, Flag, Mmio, RegisterAccess, Wait};
use crate::pwr::{self, VoltageScale};

/// Bring-up progress
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// Starting the declared oscillators
    SourcesEnabling,
    /// Starting the enabled PLLs
    PllConfiguring,
    /// Supply configured, voltage scale at its maximum
    VoltageScalePrepared,
    /// Bus prescalers programmed for the new tree
    PrescalersPreset,
    /// Flash latency raised ahead of a faster `hclk`
    LatencyRaised,
    /// Switching `sys_ck` to its new source
    SourceSwitching,
    /// Flash latency lowered after the switch
    LatencyLowered,
    /// Voltage scale relaxed for the final frequencies
    VoltageScaleOptimized,
    /// Bring-up complete
    Done,
    /// Bring-up stopped. Hardware already configured stays as it is.
    Failed(Error),
}

/// Flash wait states and programming delay for `hclk` at `vos`
///
/// See RM0433 Table 13. FLASH recommended number of wait states and
/// programming delay
pub(crate) fn flash_latency(hclk: u32, vos: VoltageScale) -> (u32, u32) {
    let hclk_mhz = hclk / 1_000_000;

    match vos {
        VoltageScale::Scale0 | VoltageScale::Scale1 => match hclk_mhz {
            0..=69 => (0, 0),
            70..=139 => (1, 1),
            140..=184 => (2, 1),
            185..=209 => (2, 2),
            210..=224 => (3, 2),
            225..=240 if vos == VoltageScale::Scale0 => (4, 2),
            _ => (7, 3),
        },
        VoltageScale::Scale2 => match hclk_mhz {
            0..=54 => (0, 0),
            55..=109 => (1, 1),
            110..=164 => (2, 1),
            165..=224 => (3, 2),
            225 => (4, 2),
            _ => (7, 3),
        },
        VoltageScale::Scale3 => match hclk_mhz {
            0..=44 => (0, 0),
            45..=89 => (1, 1),
            90..=134 => (2, 1),
            135..=179 => (3, 2),
            180..=224 => (4, 2),
            _ => (7, 3),
        },
    }
}

pub(crate) struct Sequencer<'a, M, W> {
    mmio: &'a M,
    waiter: &'a mut W,
    config: &'a Config,
    clocks: &'a CoreClocks,
    state: State,
    /// `hclk` before the switch, through the new AHB prescaler
    previous_hclk: u32,
    /// Voltage scale once bring-up is done
    vos: VoltageScale,
}

impl<'a, M: Mmio, W: Wait> Sequencer<'a, M, W> {
    pub fn new(
        mmio: &'a M,
        waiter: &'a mut W,
        config: &'a Config,
        clocks: &'a CoreClocks,
    ) -> Self {
        Sequencer {
            mmio,
            waiter,
            config,
            clocks,
            state: State::SourcesEnabling,
            previous_hclk: 0,
            vos: optimal_voltage(config.family, clocks),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Run to completion
    pub fn run(mut self) -> Result<(), Error> {
        while !matches!(self.step(), State::Done | State::Failed(_)) {}

        match self.state() {
            State::Failed(e) => Err(e),
            _ => Ok(()),
        }
    }

    /// Perform the work of the current state and move to the next one
    pub fn step(&mut self) -> State {
        let from = self.state;
        let next = match self.advance(from) {
            Ok(next) => next,
            Err(e) => State::Failed(e),
        };
        if next != from {
            log::debug!("{:?} -> {:?}", from, next);
        }
        self.state = next;
        next
    }

    fn advance(&mut self, state: State) -> Result<State, Error> {
        let hclk = self.clocks.hclk().0;

        Ok(match state {
            State::SourcesEnabling => {
                osc::start_sources(self.mmio, self.waiter, self.config)?;
                State::PllConfiguring
            }
            State::PllConfiguring => {
                pll::setup_plls(self.mmio, self.waiter, self.config)?;
                State::VoltageScalePrepared
            }
            State::VoltageScalePrepared => {
                pwr::set_supply(self.mmio, self.waiter, self.config.supply)?;
                pwr::set_voltage(
                    self.mmio,
                    self.waiter,
                    self.config.family,
                    VoltageScale::MAX,
                )?;
                State::PrescalersPreset
            }
            State::PrescalersPreset => {
                self.set_prescalers()?;
                self.previous_hclk = self.active_hclk();
                log::debug!("hclk {} Hz -> {} Hz", self.previous_hclk, hclk);

                if hclk > self.previous_hclk {
                    State::LatencyRaised
                } else {
                    State::SourceSwitching
                }
            }
            State::LatencyRaised => {
                self.set_latency()?;
                State::SourceSwitching
            }
            State::SourceSwitching => {
                self.switch_sys_ck()?;
                if hclk <= self.previous_hclk {
                    State::LatencyLowered
                } else {
                    State::VoltageScaleOptimized
                }
            }
            State::LatencyLowered => {
                self.set_latency()?;
                State::VoltageScaleOptimized
            }
            State::VoltageScaleOptimized => {
                if self.vos != VoltageScale::MAX {
                    pwr::set_voltage(
                        self.mmio,
                        self.waiter,
                        self.config.family,
                        self.vos,
                    )?;
                }
                State::Done
            }
            State::Done | State::Failed(_) => state,
        })
    }

    /// `hclk` produced by the running `sys_ck` source through the AHB
    /// prescaler, as read back from the hardware
    fn active_hclk(&self) -> u32 {
        use CFGR::SWS::Value as Sws;

        let hsi_ck = super::HSI >> self.mmio.fetch(RCC_CR).read(CR::HSIDIV);
        let hse_ck = self.config.source_freq(Source::Hse).unwrap_or(0);

        let sys_ck = match self.mmio.fetch(RCC_CFGR).read_as_enum(CFGR::SWS) {
            Some(Sws::Hsi) => hsi_ck,
            Some(Sws::Csi) => super::CSI,
            Some(Sws::Hse) => hse_ck,
            Some(Sws::Pll1) => pll::pll1_p_ck(self.mmio, hsi_ck, hse_ck),
            None => 0,
        };
        let hpre = self.mmio.fetch(RCC_D1CFGR).read(D1CFGR::HPRE);
        sys_ck / hpre_ratio(hpre)
    }

    fn set_prescalers(&mut self) -> Result<(), Error> {
        let chain = &self.config.prescalers;
        let d1cpre = hpre_bits(chain.d1cpre).ok_or(Error::InvalidDivider)?;
        let hpre = hpre_bits(chain.hpre).ok_or(Error::InvalidDivider)?;
        let ppre = |ratio| ppre_bits(ratio).ok_or(Error::InvalidDivider);
        let (d1ppre, d2ppre1, d2ppre2, d3ppre) = (
            ppre(chain.d1ppre)?,
            ppre(chain.d2ppre1)?,
            ppre(chain.d2ppre2)?,
            ppre(chain.d3ppre)?,
        );

        self.mmio.update(
            RCC_D1CFGR,
            D1CFGR::D1CPRE.val(d1cpre)
                + D1CFGR::HPRE.val(hpre)
                + D1CFGR::D1PPRE.val(d1ppre),
        );
        self.mmio.update(
            RCC_D2CFGR,
            D2CFGR::D2PPRE1.val(d2ppre1) + D2CFGR::D2PPRE2.val(d2ppre2),
        );
        self.mmio.update(RCC_D3CFGR, D3CFGR::D3PPRE.val(d3ppre));

        self.waiter.wait(
            Flag::Prescaler,
            field_is(self.mmio, RCC_D1CFGR, D1CFGR::HPRE, hpre),
        )
    }

    fn set_latency(&mut self) -> Result<(), Error> {
        let (wait_states, progr_delay) =
            flash_latency(self.clocks.hclk().0, self.vos);

        self.mmio.update(
            FLASH_ACR,
            ACR::LATENCY.val(wait_states) + ACR::WRHIGHFREQ.val(progr_delay),
        );
        self.waiter.wait(
            Flag::FlashLatency,
            field_is(self.mmio, FLASH_ACR, ACR::LATENCY, wait_states),
        )?;

        log::debug!(
            "flash latency {} wait states, programming delay {}",
            wait_states,
            progr_delay
        );
        Ok(())
    }

    fn switch_sys_ck(&mut self) -> Result<(), Error> {
        let sw = self.config.sys_src.ok_or(Error::Unsupported)?.bits();

        self.mmio.update(RCC_CFGR, CFGR::SW.val(sw));
        self.waiter.wait(
            Flag::SwitchConfirmed,
            field_is(self.mmio, RCC_CFGR, CFGR::SWS, sw),
        )
    }
}
