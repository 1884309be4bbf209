// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! MSP430 JTAG instructions, identifiers and shift formats
//!
//! TI's SLAU320 documents the instruction values LSB first.  sbwprobe shifts
//! everything MSB first, so the values here are the bit-reversed forms of
//! the documented ones (e.g. `CNTRL_SIG_16BIT` is documented as 0x13).

use core::fmt;
use static_assertions::{const_assert, const_assert_eq};

/// JTAG identification value for 430X architecture devices
pub const JTAG_ID_430X: u8 = 0x89;

/// JTAG identification value for 430Xv2 architecture devices
pub const JTAG_ID_430XV2: u8 = 0x91;

/// JTAG identification value for 430Xv2 FR4xx/FR2xx devices
pub const JTAG_ID_FR4XX: u8 = 0x98;

/// JTAG identification value for 430Xv2 FR59xx devices
pub const JTAG_ID_FR59XX: u8 = 0x99;

/// Mask of the 20-bit address space
pub const ADDRESS_MASK: u32 = 0x000F_FFFF;

/// A JTAG instruction, loaded into the TAP's instruction register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction(u8);

impl Instruction {
    /// Set the JTAG control signal register
    pub const CNTRL_SIG_16BIT: Self = Self(0xC8);

    /// Read out the JTAG control signal register
    pub const CNTRL_SIG_CAPTURE: Self = Self(0x28);

    /// Release the CPU from JTAG control
    pub const CNTRL_SIG_RELEASE: Self = Self(0xA8);

    /// Prepare for JTAG fuse blow
    pub const PREPARE_BLOW: Self = Self(0x44);

    /// Perform JTAG fuse blow
    pub const EX_BLOW: Self = Self(0x24);

    /// Set the MDB to a specific 16-bit value with the next 16-bit data
    /// access
    pub const DATA_16BIT: Self = Self(0x82);

    /// Set the MDB to a specific 16-bit value (RAM only)
    pub const DATA_QUICK: Self = Self(0xC2);

    /// Set the MAB to a specific value.  Used with 20-bit data accesses on
    /// 430X and 430Xv2 devices.
    pub const ADDR_16BIT: Self = Self(0xC1);

    /// Read out the MAB on the next 16/20-bit data access
    pub const ADDR_CAPTURE: Self = Self(0x21);

    /// Set the MDB and write it to the address currently on the MAB
    pub const DATA_TO_ADDR: Self = Self(0xA1);

    /// TDI is shifted straight through to TDO
    pub const BYPASS: Self = Self(0xFF);

    /// Read out the MDB
    pub const DATA_CAPTURE: Self = Self(0x42);

    /// Read the device's CoreIP identifier
    pub const COREIP_ID: Self = Self(0xE8);

    /// Read the pointer to the device's Device ID information
    pub const DEVICE_ID: Self = Self(0xE1);

    /// Request a JTAG mailbox exchange
    pub const JMB_EXCHANGE: Self = Self(0x86);

    /// Test register (5xx)
    pub const TEST_REG: Self = Self(0x54);

    /// 3V test register (5xx)
    pub const TEST_3V_REG: Self = Self(0xF4);

    pub const fn new(value: u8) -> Self {
        Instruction(value)
    }

    pub const fn raw(&self) -> u8 {
        self.0
    }

    /// Returns the instruction's name, if it is one sbwprobe knows about.
    pub fn name(&self) -> &'static str {
        match *self {
            Self::CNTRL_SIG_16BIT => "CNTRL_SIG_16BIT",
            Self::CNTRL_SIG_CAPTURE => "CNTRL_SIG_CAPTURE",
            Self::CNTRL_SIG_RELEASE => "CNTRL_SIG_RELEASE",
            Self::PREPARE_BLOW => "PREPARE_BLOW",
            Self::EX_BLOW => "EX_BLOW",
            Self::DATA_16BIT => "DATA_16BIT",
            Self::DATA_QUICK => "DATA_QUICK",
            Self::ADDR_16BIT => "ADDR_16BIT",
            Self::ADDR_CAPTURE => "ADDR_CAPTURE",
            Self::DATA_TO_ADDR => "DATA_TO_ADDR",
            Self::BYPASS => "BYPASS",
            Self::DATA_CAPTURE => "DATA_CAPTURE",
            Self::COREIP_ID => "COREIP_ID",
            Self::DEVICE_ID => "DEVICE_ID",
            Self::JMB_EXCHANGE => "JMB_EXCHANGE",
            Self::TEST_REG => "TEST_REG",
            Self::TEST_3V_REG => "TEST_3V_REG",
            _ => "unknown",
        }
    }
}

impl From<u8> for Instruction {
    fn from(value: u8) -> Self {
        Instruction(value)
    }
}

impl From<Instruction> for u8 {
    fn from(value: Instruction) -> u8 {
        value.0
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.0)
    }
}

/// The JTAG identifier returned by a device whenever its instruction
/// register is captured.  Identifies the CPU architecture, which determines
/// some of the device specific handling required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JtagId {
    /// 430X architecture, 0x89
    Msp430X,

    /// 430Xv2 architecture, 0x91
    Msp430Xv2,

    /// 430Xv2 FR4xx/FR2xx, 0x98
    Fr4xx,

    /// 430Xv2 FR59xx, 0x99
    Fr59xx,

    /// Anything else - including 0xFF, which is usually what is read back
    /// when there is no target attached.
    Unknown(u8),
}

impl JtagId {
    pub fn from_byte(value: u8) -> Self {
        match value {
            JTAG_ID_430X => JtagId::Msp430X,
            JTAG_ID_430XV2 => JtagId::Msp430Xv2,
            JTAG_ID_FR4XX => JtagId::Fr4xx,
            JTAG_ID_FR59XX => JtagId::Fr59xx,
            other => JtagId::Unknown(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            JtagId::Msp430X => JTAG_ID_430X,
            JtagId::Msp430Xv2 => JTAG_ID_430XV2,
            JtagId::Fr4xx => JTAG_ID_FR4XX,
            JtagId::Fr59xx => JTAG_ID_FR59XX,
            JtagId::Unknown(value) => value,
        }
    }

    /// Whether sbwprobe supports connecting to devices with this ID.  Only
    /// 430Xv2 parts are supported.
    pub fn is_supported(&self) -> bool {
        matches!(self, JtagId::Msp430Xv2 | JtagId::Fr4xx | JtagId::Fr59xx)
    }

    /// Address of the watchdog timer control register, which must be held
    /// after a power-on reset.
    pub fn wdt_control_address(&self) -> u32 {
        match self {
            JtagId::Fr4xx => 0x01CC,
            _ => 0x015C,
        }
    }

    /// Whether the test memory locations need initializing after a reset to
    /// keep the PC and MAB consistent.
    pub fn initializes_test_memory(&self) -> bool {
        matches!(self, JtagId::Msp430Xv2 | JtagId::Fr59xx)
    }

    pub fn description(&self) -> &'static str {
        match self {
            JtagId::Msp430X => "MSP430X",
            JtagId::Msp430Xv2 => "MSP430Xv2",
            JtagId::Fr4xx => "MSP430Xv2 FR4xx/FR2xx",
            JtagId::Fr59xx => "MSP430Xv2 FR59xx",
            JtagId::Unknown(_) => "Unknown",
        }
    }
}

impl From<u8> for JtagId {
    fn from(value: u8) -> Self {
        Self::from_byte(value)
    }
}

impl fmt::Display for JtagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X} {}", self.to_byte(), self.description())
    }
}

/// The number of bits shifted through a JTAG register in a single access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShiftFormat {
    /// Instruction register
    Byte = 8,

    /// Data register, most accesses
    Word = 16,

    /// Address register.  Values read back are scrambled - see
    /// [`descramble_address()`].
    Addr = 20,

    Long = 32,
}

impl ShiftFormat {
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// The first bit shifted (the format is shifted MSB first).
    pub const fn msb(self) -> u32 {
        1 << (self.bits() - 1)
    }

    pub const fn mask(self) -> u32 {
        match self {
            ShiftFormat::Long => u32::MAX,
            _ => (1 << self.bits()) - 1,
        }
    }

    /// Convert a bit count to a `ShiftFormat`
    ///
    /// Returns:
    /// - `Some(ShiftFormat)`: If the bit count is a supported format.
    /// - `None`: Otherwise.
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(ShiftFormat::Byte),
            16 => Some(ShiftFormat::Word),
            20 => Some(ShiftFormat::Addr),
            32 => Some(ShiftFormat::Long),
            _ => None,
        }
    }
}

/// Turns a value shifted out of a 20-bit register into an address.
///
/// The device shifts the top nibble out last, so the low 4 bits received
/// are actually address bits 19:16.
pub const fn descramble_address(raw: u32) -> u32 {
    (raw << 16).wrapping_add(raw >> 4) & ADDRESS_MASK
}

/// The inverse of [`descramble_address()`] - what a device shifts out for a
/// given address.
pub const fn scramble_address(address: u32) -> u32 {
    ((address & 0xFFFF) << 4) | ((address >> 16) & 0xF)
}

const_assert_eq!(descramble_address(0x0_0201), 0x1_0020);
const_assert_eq!(descramble_address(scramble_address(0xA_BCDE)), 0xA_BCDE);
const_assert!(ShiftFormat::Addr.msb() == 0x0008_0000);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descramble_known_pairs() {
        assert_eq!(descramble_address(0x0_0201), 0x1_0020);
        assert_eq!(descramble_address(0x1_2340), 0x0_1234);
        assert_eq!(descramble_address(0x0_0000), 0);
        // Bits above 20 never leak into the result
        assert!(descramble_address(0xFFFF_FFFF) <= ADDRESS_MASK);
    }

    #[test]
    fn scramble_is_inverse() {
        for addr in [0x0_0000, 0x0_0200, 0x1_C400, 0xF_FFFE, 0x0_1234] {
            assert_eq!(descramble_address(scramble_address(addr)), addr);
        }
    }

    #[test]
    fn shift_format_bits() {
        assert_eq!(ShiftFormat::from_bits(8), Some(ShiftFormat::Byte));
        assert_eq!(ShiftFormat::from_bits(20), Some(ShiftFormat::Addr));
        assert_eq!(ShiftFormat::from_bits(12), None);
        assert_eq!(ShiftFormat::from_bits(0), None);
        assert_eq!(ShiftFormat::Word.msb(), 0x8000);
        assert_eq!(ShiftFormat::Long.msb(), 0x8000_0000);
        assert_eq!(ShiftFormat::Long.mask(), u32::MAX);
        assert_eq!(ShiftFormat::Addr.mask(), ADDRESS_MASK);
    }

    #[test]
    fn jtag_id_families() {
        assert!(!JtagId::from_byte(0x89).is_supported());
        assert!(JtagId::from_byte(0x91).is_supported());
        assert!(JtagId::from_byte(0x98).is_supported());
        assert!(JtagId::from_byte(0x99).is_supported());
        assert!(!JtagId::from_byte(0xFF).is_supported());

        assert_eq!(JtagId::Fr4xx.wdt_control_address(), 0x01CC);
        assert_eq!(JtagId::Msp430Xv2.wdt_control_address(), 0x015C);
        assert_eq!(JtagId::Unknown(0x12).wdt_control_address(), 0x015C);

        assert!(JtagId::Msp430Xv2.initializes_test_memory());
        assert!(JtagId::Fr59xx.initializes_test_memory());
        assert!(!JtagId::Fr4xx.initializes_test_memory());

        assert_eq!(JtagId::from_byte(0x42).to_byte(), 0x42);
    }

    #[test]
    fn instruction_values() {
        // Reversed from SLAU320's documented 0x13, 0x14 and 0x15
        assert_eq!(Instruction::CNTRL_SIG_16BIT.raw(), 0x13u8.reverse_bits());
        assert_eq!(Instruction::CNTRL_SIG_CAPTURE.raw(), 0x14u8.reverse_bits());
        assert_eq!(Instruction::CNTRL_SIG_RELEASE.raw(), 0x15u8.reverse_bits());
        assert_eq!(Instruction::new(0x86).name(), "JMB_EXCHANGE");
        assert_eq!(Instruction::new(0x00).name(), "unknown");
    }
}
