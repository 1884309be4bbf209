// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! MSP430 CPU and device level definitions
//!
//! Opcodes and addresses sbwprobe feeds to the CPU while it is under JTAG
//! control, and the CoreIP and Device ID registers.

use crate::jtag::{Instruction, ShiftFormat, descramble_address};
use crate::register::{ReadableRegister, RegisterDescriptor};
use crate::register_data_r;

/// Program counter register number
pub const PC: u8 = 0;

/// Address loaded into the PC after a power-on reset, before the device's
/// own reset vector is used
pub const SAFE_PC: u16 = 0x0004;

/// `NOP` (`MOV #0, R3`)
pub const NOP: u16 = 0x4303;

/// `JMP $`
pub const JMP_SELF: u16 = 0x3FFF;

/// Watchdog control value: password plus HOLD
pub const WDT_HOLD: u16 = 0x5A80;

/// Test memory locations initialized after reset on some families
pub const TEST_MEMORY: [u32; 2] = [0x0006, 0x0008];

/// Returns the first word of a `MOVA #imm20, Rn` instruction.  The second
/// word is the low 16 bits of `data`.
pub const fn mova_imm20(reg: u8, data: u32) -> u16 {
    (0x0080 | (reg as u16 & 0x000F)) + ((data >> 8) & 0x0F00) as u16
}

/// COREIP_ID descriptor
pub struct CoreIpRegister;

impl RegisterDescriptor for CoreIpRegister {
    const INSTRUCTION: Instruction = Instruction::COREIP_ID;
    const FORMAT: ShiftFormat = ShiftFormat::Word;
    type Value = CoreIp;
}

impl ReadableRegister for CoreIpRegister {}

/// CoreIP identifier.  Zero means the device did not respond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoreIp(u16);

register_data_r!(CoreIp, u16, 4);

impl CoreIp {
    pub const fn new(value: u16) -> Self {
        CoreIp(value)
    }

    pub fn value(&self) -> u16 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

/// DEVICE_ID descriptor
///
/// Captured through the 20-bit address path, so the value read has to be
/// descrambled - see [`DeviceId`].
pub struct DeviceIdRegister;

impl RegisterDescriptor for DeviceIdRegister {
    const INSTRUCTION: Instruction = Instruction::DEVICE_ID;
    const FORMAT: ShiftFormat = ShiftFormat::Addr;
    type Value = DeviceId;
}

impl ReadableRegister for DeviceIdRegister {
    fn from_raw(data: u32) -> DeviceId {
        DeviceId(descramble_address(data))
    }
}

/// Device ID pointer - the address of the device's ID information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceId(u32);

impl DeviceId {
    pub const fn new(value: u32) -> Self {
        DeviceId(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for DeviceId {
    fn from(value: u32) -> Self {
        DeviceId(value)
    }
}

impl From<DeviceId> for u32 {
    fn from(value: DeviceId) -> u32 {
        value.0
    }
}

impl core::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "0x{:05X}", self.0)
    }
}
