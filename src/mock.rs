//! Simulated STM32H7 for host tests
//!
//! Models just enough of RCC, PWR, FLASH, SYSCFG and HSEM: enable bits
//! raise their ready flags, `SW` is mirrored into `SWS`, the backup
//! domain ignores writes until `DBP` is set, and `HSEM_RLRx` reads take
//! the semaphore for the reading core. Flags can be made to stick, and
//! every write is logged.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tock_registers::fields::Field;
use tock_registers::RegisterLongName;
use void::Void;

use crate::hsem::{self, HSEM};
use crate::mmio::{Flag, Mmio, Reg, Wait};
use crate::rcc::regs::*;
use crate::rcc::{CoreId, Error};

/// One logged register write
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Access {
    addr: u32,
    value: u32,
}

/// Bits of `field` in place
fn bits<R: RegisterLongName>(field: Field<u32, R>) -> u32 {
    field.mask << field.shift
}

#[derive(Default)]
struct State {
    regs: BTreeMap<u32, u32>,
    writes: Vec<Access>,
    reads: BTreeMap<u32, usize>,
    stuck: Vec<(u32, u32)>,
}

impl State {
    fn get(&self, addr: u32) -> u32 {
        self.regs.get(&addr).copied().unwrap_or(0)
    }

    fn is_stuck(&self, addr: u32, mask: u32) -> bool {
        self.stuck.iter().any(|&(a, m)| a == addr && m & mask != 0)
    }

    fn flag(&self, reg: u32, addr: u32, mask: u32, on: bool) -> u32 {
        if on && !self.is_stuck(addr, mask) {
            reg | mask
        } else {
            reg & !mask
        }
    }

    fn write(&mut self, addr: u32, value: u32) {
        self.writes.push(Access { addr, value });

        let value = match addr {
            a if a == RCC_CR.addr => {
                let mut v = value;
                for &(on, rdy) in [
                    (CR::HSEON, CR::HSERDY),
                    (CR::HSION, CR::HSIRDY),
                    (CR::CSION, CR::CSIRDY),
                    (CR::HSI48ON, CR::HSI48RDY),
                    (CR::PLL1ON, CR::PLL1RDY),
                    (CR::PLL2ON, CR::PLL2RDY),
                    (CR::PLL3ON, CR::PLL3RDY),
                ]
                .iter()
                {
                    v = self.flag(v, addr, bits(rdy), on.is_set(value));
                }
                self.flag(v, addr, bits(CR::HSIDIVF), true)
            }
            a if a == RCC_CFGR.addr => {
                let sws = if self.is_stuck(addr, bits(CFGR::SWS)) {
                    CFGR::SWS.read(self.get(addr))
                } else {
                    CFGR::SW.read(value)
                };
                CFGR::SWS.val(sws).modify(value)
            }
            a if a == RCC_CSR.addr => {
                self.flag(value, addr, bits(CSR::LSIRDY), CSR::LSION.is_set(value))
            }
            a if a == RCC_BDCR.addr => {
                if !CR1::DBP.is_set(self.get(PWR_CR1.addr)) {
                    // Write protected
                    return;
                }
                self.flag(value, addr, bits(BDCR::LSERDY), BDCR::LSEON.is_set(value))
            }
            a if a == PWR_CR3.addr => {
                let csr1 = PWR_CSR1.addr;
                let v = self.flag(self.get(csr1), csr1, bits(CSR1::ACTVOSRDY), true);
                self.regs.insert(csr1, v);
                value
            }
            a if a == PWR_D3CR.addr => self.flag(value, addr, bits(D3CR::VOSRDY), true),
            a if a == SYSCFG_PWRCR.addr => {
                let d3cr = PWR_D3CR.addr;
                let v = self.flag(self.get(d3cr), d3cr, bits(D3CR::VOSRDY), true);
                self.regs.insert(d3cr, v);
                value
            }
            a if (HSEM..HSEM + 0x80).contains(&a) => {
                let current = self.get(a);
                let owner = (current >> 8) & 0xF;
                if value >> 31 == 0 && (value >> 8) & 0xF == owner {
                    0
                } else {
                    current
                }
            }
            _ => value,
        };
        self.regs.insert(physical(addr), value);
    }

    fn read(&mut self, core: CoreId, addr: u32) -> u32 {
        *self.reads.entry(addr).or_insert(0) += 1;

        if (HSEM + 0x80..HSEM + 0x100).contains(&addr) {
            let r = addr - 0x80;
            if self.get(r) >> 31 == 0 {
                self.regs.insert(r, (1 << 31) | (core.hsem_id() << 8));
            }
            return self.get(r);
        }
        self.get(physical(addr))
    }
}

/// The Cortex-M7 accesses its `RCC_C1_xxxENR` registers through the
/// common `RCC_xxxENR` addresses, the Cortex-M4 drivers address them
/// directly at +0x60. Both land in the same physical register.
fn physical(addr: u32) -> u32 {
    if (RCC + 0x0D4..=RCC + 0x0F4).contains(&addr) {
        addr + 0x60
    } else {
        addr
    }
}

/// Simulated device, shared by both cores
#[derive(Clone)]
pub(crate) struct Soc {
    state: Arc<Mutex<State>>,
}

impl Soc {
    /// Device just out of reset: HSI drives everything, flash latency
    /// at its maximum, VOS3.
    pub fn new() -> Self {
        let mut state = State::default();
        for &(addr, value) in [
            (
                RCC_CR.addr,
                (CR::HSION::SET + CR::HSIRDY::SET + CR::HSIDIVF::SET).modify(0),
            ),
            (RCC_PLLCKSELR.addr, 0x0202_0200),
            (RCC_PLL1DIVR.addr, 0x0101_0280),
            (RCC_PLL2DIVR.addr, 0x0101_0280),
            (RCC_PLL3DIVR.addr, 0x0101_0280),
            (
                PWR_D3CR.addr,
                (D3CR::VOS.val(0b01) + D3CR::VOSRDY::SET).modify(0),
            ),
            (FLASH_ACR.addr, 0x37),
        ]
        .iter()
        {
            state.regs.insert(addr, value);
        }
        Soc {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Register access as seen from `core`
    pub fn core(&self, core: CoreId) -> CoreView {
        CoreView {
            soc: self.clone(),
            core,
        }
    }

    /// Never raise `field` in `reg`
    pub fn stick<R: RegisterLongName>(&self, reg: Reg<R>, field: Field<u32, R>) {
        self.lock().stuck.push((reg.addr, bits(field)));
    }

    /// Read without side effects or logging
    pub fn peek(&self, addr: u32) -> u32 {
        self.lock().get(physical(addr))
    }

    /// Write without side effects or logging
    pub fn poke(&self, addr: u32, value: u32) {
        self.lock().regs.insert(physical(addr), value);
    }

    /// Every register value
    pub fn snapshot(&self) -> BTreeMap<u32, u32> {
        self.lock().regs.clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    pub fn writes_to(&self, addr: u32) -> usize {
        self.lock().writes.iter().filter(|w| w.addr == addr).count()
    }

    pub fn reads_of(&self, addr: u32) -> usize {
        self.lock().reads.get(&addr).copied().unwrap_or(0)
    }

    /// Index of the first logged write to `addr` matching `pred`
    pub fn first_write<F>(&self, addr: u32, pred: F) -> Option<usize>
    where
        F: Fn(u32) -> bool,
    {
        self.lock()
            .writes
            .iter()
            .position(|w| w.addr == addr && pred(w.value))
    }

    /// Core holding semaphore `id`
    pub fn hsem_owner(&self, id: u8) -> Option<CoreId> {
        let r = self.peek(hsem::r(id));
        if r >> 31 == 0 {
            return None;
        }
        match (r >> 8) & 0xF {
            3 => Some(CoreId::Cm7),
            1 => Some(CoreId::Cm4),
            other => panic!("unknown COREID {}", other),
        }
    }
}

/// One core's access to the simulated device
#[derive(Clone)]
pub(crate) struct CoreView {
    soc: Soc,
    core: CoreId,
}

impl Mmio for CoreView {
    fn read(&self, addr: u32) -> u32 {
        self.soc.lock().read(self.core, addr)
    }

    fn write(&self, addr: u32, value: u32) {
        self.soc.lock().write(addr, value)
    }
}

/// Waits a bounded number of polls, then reports the flag as stalled
pub(crate) struct Timeout {
    budget: u32,
    /// Flags that came up, in order
    pub seen: Vec<Flag>,
}

impl Timeout {
    pub fn new(budget: u32) -> Self {
        Timeout {
            budget,
            seen: Vec::new(),
        }
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Timeout::new(64)
    }
}

impl Wait for Timeout {
    fn wait<F>(&mut self, flag: Flag, mut poll: F) -> Result<(), Error>
    where
        F: FnMut() -> nb::Result<(), Void>,
    {
        for _ in 0..self.budget {
            match poll() {
                Ok(()) => {
                    self.seen.push(flag);
                    return Ok(());
                }
                Err(nb::Error::WouldBlock) => {}
                Err(nb::Error::Other(never)) => match never {},
            }
        }
        Err(Error::Stalled(flag))
    }
}
