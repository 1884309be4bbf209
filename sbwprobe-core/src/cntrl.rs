// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! MSP430 JTAG Control Signal Register
//!
//! The control signal register is how a debugger takes over the CPU.  It is
//! written with `CNTRL_SIG_16BIT` and read back with `CNTRL_SIG_CAPTURE`.

use crate::jtag::{Instruction, ShiftFormat};
use crate::register::{ReadableRegister, RegisterDescriptor, WritableRegister};
use crate::register_data_rw;

/// Value captured from the control signal register when the device's JTAG
/// access is protected.  The device echoes this instead of its real control
/// signal register contents.
pub const LOCKED_ECHO: u16 = 0x5555;

/// Value shifted in when checking for protection.
pub const LOCK_PROBE: u16 = 0xAAAA;

/// CNTRL_SIG_16BIT descriptor (write)
pub struct CntrlSig16BitRegister;

impl RegisterDescriptor for CntrlSig16BitRegister {
    const INSTRUCTION: Instruction = Instruction::CNTRL_SIG_16BIT;
    const FORMAT: ShiftFormat = ShiftFormat::Word;
    type Value = CntrlSig;
}

impl WritableRegister for CntrlSig16BitRegister {}

/// CNTRL_SIG_CAPTURE descriptor (read)
pub struct CntrlSigCaptureRegister;

impl RegisterDescriptor for CntrlSigCaptureRegister {
    const INSTRUCTION: Instruction = Instruction::CNTRL_SIG_CAPTURE;
    const FORMAT: ShiftFormat = ShiftFormat::Word;
    type Value = CntrlSig;
}

impl ReadableRegister for CntrlSigCaptureRegister {}

/// MSP430Xv2 JTAG control signal register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CntrlSig(u16);

register_data_rw!(CntrlSig, u16, 4);

impl CntrlSig {
    const READ: u16 = 1 << 0;
    const HALT_JTAG: u16 = 1 << 3;
    const BYTE: u16 = 1 << 4;
    const WAIT: u16 = 1 << 7;
    const INSTR_LOAD: u16 = 1 << 8;
    const TCE: u16 = 1 << 9;
    const TCE1: u16 = 1 << 10;
    const POR: u16 = 1 << 11;
    const RELEASE_LBYTE: u16 = 1 << 12;
    const TAGFUNCSAT: u16 = 1 << 13;

    /// At least one of these bits is set when captured if the CPU is idle
    /// under JTAG control.
    pub const JTAG_IDLE_MASK: u16 = Self::READ | Self::INSTR_LOAD | Self::TCE;

    /// Memory read, CPU held
    pub const READ_MEMORY: Self = Self(0x0501);

    /// Memory write, CPU held
    pub const WRITE_MEMORY: Self = Self(0x0500);

    /// Assert power-on reset
    pub const POR_ASSERT: Self = Self(0x0C01);

    /// Release power-on reset
    pub const POR_RELEASE: Self = Self(0x0401);

    /// Halt the CPU via JTAG
    pub const HALT: Self = Self(0x2409);

    /// First half of releasing the CPU from a halt
    pub const RELEASE_HALT: Self = Self(0x2C01);

    /// Second half of releasing the CPU from a halt
    pub const RELEASE_HALTED: Self = Self(0x2401);

    /// Put the CPU into JTAG mode, clocked by TCLK
    pub const JTAG_MODE: Self = Self(0x1501);

    /// Release the low byte, letting the device's own startup code run
    pub const RELEASE_LOW_BYTE: Self = Self(0x1400);

    pub const fn new(value: u16) -> Self {
        CntrlSig(value)
    }

    pub fn value(&self) -> u16 {
        self.0
    }

    /// Whether the captured value is the protection echo
    pub fn is_locked_echo(&self) -> bool {
        self.0 == LOCKED_ECHO
    }

    /// The CPU is idle under JTAG control - one of R/W, INSTR_LOAD or TCE
    /// is set.  A device which has dropped out of JTAG control reads back 0.
    pub fn is_jtag_idle(&self) -> bool {
        self.0 & Self::JTAG_IDLE_MASK != 0
    }

    /// Get TCE - the CPU has synchronized with TCLK
    pub fn synchronized(&self) -> bool {
        self.0 & Self::TCE != 0
    }

    /// Get R/W (1 = read)
    pub fn read(&self) -> bool {
        self.0 & Self::READ != 0
    }

    pub fn halt_jtag(&self) -> bool {
        self.0 & Self::HALT_JTAG != 0
    }

    pub fn byte(&self) -> bool {
        self.0 & Self::BYTE != 0
    }

    pub fn wait(&self) -> bool {
        self.0 & Self::WAIT != 0
    }

    pub fn instr_load(&self) -> bool {
        self.0 & Self::INSTR_LOAD != 0
    }

    pub fn tce1(&self) -> bool {
        self.0 & Self::TCE1 != 0
    }

    pub fn por(&self) -> bool {
        self.0 & Self::POR != 0
    }

    pub fn release_lbyte(&self) -> bool {
        self.0 & Self::RELEASE_LBYTE != 0
    }

    pub fn tagfuncsat(&self) -> bool {
        self.0 & Self::TAGFUNCSAT != 0
    }
}
