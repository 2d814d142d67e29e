//! RCC, PWR, FLASH and SYSCFG register map
//!
//! See RM0399 section 9.7 "RCC register description" (p 394).

use tock_registers::register_bitfields;

use crate::mmio::Reg;

pub(crate) const RCC: u32 = 0x5802_4400;
pub(crate) const PWR: u32 = 0x5802_4800;
pub(crate) const FLASH: u32 = 0x5200_2000;
pub(crate) const SYSCFG: u32 = 0x5800_0400;

register_bitfields![u32,
    pub(crate) CR [
        HSION OFFSET(0) NUMBITS(1) [],
        HSIRDY OFFSET(2) NUMBITS(1) [],
        HSIDIV OFFSET(3) NUMBITS(2) [],
        HSIDIVF OFFSET(5) NUMBITS(1) [],
        CSION OFFSET(7) NUMBITS(1) [],
        CSIRDY OFFSET(8) NUMBITS(1) [],
        HSI48ON OFFSET(12) NUMBITS(1) [],
        HSI48RDY OFFSET(13) NUMBITS(1) [],
        HSEON OFFSET(16) NUMBITS(1) [],
        HSERDY OFFSET(17) NUMBITS(1) [],
        HSEBYP OFFSET(18) NUMBITS(1) [],
        PLL1ON OFFSET(24) NUMBITS(1) [],
        PLL1RDY OFFSET(25) NUMBITS(1) [],
        PLL2ON OFFSET(26) NUMBITS(1) [],
        PLL2RDY OFFSET(27) NUMBITS(1) [],
        PLL3ON OFFSET(28) NUMBITS(1) [],
        PLL3RDY OFFSET(29) NUMBITS(1) []
    ],
    pub(crate) CFGR [
        /// System clock switch
        SW OFFSET(0) NUMBITS(3) [
            Hsi = 0b000,
            Csi = 0b001,
            Hse = 0b010,
            Pll1 = 0b011
        ],
        /// System clock switch status
        SWS OFFSET(3) NUMBITS(3) [
            Hsi = 0b000,
            Csi = 0b001,
            Hse = 0b010,
            Pll1 = 0b011
        ]
    ],
    pub(crate) D1CFGR [
        HPRE OFFSET(0) NUMBITS(4) [],
        D1PPRE OFFSET(4) NUMBITS(3) [],
        D1CPRE OFFSET(8) NUMBITS(4) []
    ],
    pub(crate) D2CFGR [
        D2PPRE1 OFFSET(4) NUMBITS(3) [],
        D2PPRE2 OFFSET(8) NUMBITS(3) []
    ],
    pub(crate) D3CFGR [
        D3PPRE OFFSET(4) NUMBITS(3) []
    ],
    pub(crate) PLLCKSELR [
        PLLSRC OFFSET(0) NUMBITS(2) [
            Hsi = 0b00,
            Csi = 0b01,
            Hse = 0b10,
            Off = 0b11
        ],
        DIVM1 OFFSET(4) NUMBITS(6) [],
        DIVM2 OFFSET(12) NUMBITS(6) [],
        DIVM3 OFFSET(20) NUMBITS(6) []
    ],
    pub(crate) PLLCFGR [
        PLL1FRACEN OFFSET(0) NUMBITS(1) [],
        PLL1VCOSEL OFFSET(1) NUMBITS(1) [],
        PLL1RGE OFFSET(2) NUMBITS(2) [],
        PLL2FRACEN OFFSET(4) NUMBITS(1) [],
        PLL2VCOSEL OFFSET(5) NUMBITS(1) [],
        PLL2RGE OFFSET(6) NUMBITS(2) [],
        PLL3FRACEN OFFSET(8) NUMBITS(1) [],
        PLL3VCOSEL OFFSET(9) NUMBITS(1) [],
        PLL3RGE OFFSET(10) NUMBITS(2) [],
        DIVP1EN OFFSET(16) NUMBITS(1) [],
        DIVQ1EN OFFSET(17) NUMBITS(1) [],
        DIVR1EN OFFSET(18) NUMBITS(1) [],
        DIVP2EN OFFSET(19) NUMBITS(1) [],
        DIVQ2EN OFFSET(20) NUMBITS(1) [],
        DIVR2EN OFFSET(21) NUMBITS(1) [],
        DIVP3EN OFFSET(22) NUMBITS(1) [],
        DIVQ3EN OFFSET(23) NUMBITS(1) [],
        DIVR3EN OFFSET(24) NUMBITS(1) []
    ],
    // Shared by RCC_PLL1DIVR, RCC_PLL2DIVR and RCC_PLL3DIVR
    pub(crate) PLLDIVR [
        DIVN OFFSET(0) NUMBITS(9) [],
        DIVP OFFSET(9) NUMBITS(7) [],
        DIVQ OFFSET(16) NUMBITS(7) [],
        DIVR OFFSET(24) NUMBITS(7) []
    ],
    pub(crate) BDCR [
        LSEON OFFSET(0) NUMBITS(1) [],
        LSERDY OFFSET(1) NUMBITS(1) [],
        LSEBYP OFFSET(2) NUMBITS(1) []
    ],
    pub(crate) CSR [
        LSION OFFSET(0) NUMBITS(1) [],
        LSIRDY OFFSET(1) NUMBITS(1) []
    ],
    pub(crate) CR1 [
        /// Disable backup domain write protection
        DBP OFFSET(8) NUMBITS(1) []
    ],
    pub(crate) CSR1 [
        ACTVOSRDY OFFSET(13) NUMBITS(1) []
    ],
    pub(crate) CR3 [
        BYPASS OFFSET(0) NUMBITS(1) [],
        LDOEN OFFSET(1) NUMBITS(1) [],
        SDEN OFFSET(2) NUMBITS(1) [],
        SMPSEXTHP OFFSET(3) NUMBITS(1) [],
        /// SMPS step-down converter output level
        SDLEVEL OFFSET(4) NUMBITS(2) [
            Reset = 0b00,
            V1_8 = 0b01,
            V2_5 = 0b10
        ]
    ],
    pub(crate) D3CR [
        VOSRDY OFFSET(13) NUMBITS(1) [],
        VOS OFFSET(14) NUMBITS(2) []
    ],
    pub(crate) PWRCR [
        /// Overdrive, completes VOS0 on RM0433 and RM0399
        ODEN OFFSET(0) NUMBITS(1) []
    ],
    pub(crate) ACR [
        LATENCY OFFSET(0) NUMBITS(4) [],
        WRHIGHFREQ OFFSET(4) NUMBITS(2) []
    ]
];

pub(crate) const RCC_CR: Reg<CR::Register> = Reg::at(RCC + 0x000);
pub(crate) const RCC_CFGR: Reg<CFGR::Register> = Reg::at(RCC + 0x010);
pub(crate) const RCC_D1CFGR: Reg<D1CFGR::Register> = Reg::at(RCC + 0x018);
pub(crate) const RCC_D2CFGR: Reg<D2CFGR::Register> = Reg::at(RCC + 0x01C);
pub(crate) const RCC_D3CFGR: Reg<D3CFGR::Register> = Reg::at(RCC + 0x020);
pub(crate) const RCC_PLLCKSELR: Reg<PLLCKSELR::Register> = Reg::at(RCC + 0x028);
pub(crate) const RCC_PLLCFGR: Reg<PLLCFGR::Register> = Reg::at(RCC + 0x02C);
pub(crate) const RCC_PLL1DIVR: Reg<PLLDIVR::Register> = Reg::at(RCC + 0x030);
pub(crate) const RCC_PLL2DIVR: Reg<PLLDIVR::Register> = Reg::at(RCC + 0x038);
pub(crate) const RCC_PLL3DIVR: Reg<PLLDIVR::Register> = Reg::at(RCC + 0x040);
pub(crate) const RCC_BDCR: Reg<BDCR::Register> = Reg::at(RCC + 0x070);
pub(crate) const RCC_CSR: Reg<CSR::Register> = Reg::at(RCC + 0x074);

pub(crate) const PWR_CR1: Reg<CR1::Register> = Reg::at(PWR + 0x00);
pub(crate) const PWR_CSR1: Reg<CSR1::Register> = Reg::at(PWR + 0x04);
pub(crate) const PWR_CR3: Reg<CR3::Register> = Reg::at(PWR + 0x0C);
pub(crate) const PWR_D3CR: Reg<D3CR::Register> = Reg::at(PWR + 0x18);

pub(crate) const SYSCFG_PWRCR: Reg<PWRCR::Register> = Reg::at(SYSCFG + 0x2C);

pub(crate) const FLASH_ACR: Reg<ACR::Register> = Reg::at(FLASH + 0x00);
