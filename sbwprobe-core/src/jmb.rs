// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! MSP430 JTAG Mailbox
//!
//! The mailbox is a pair of 16/32-bit channels between the debugger and
//! code running on the target, selected with `JMB_EXCHANGE`.  The same
//! 16-bit register is used both to read the mailbox status and to request
//! a transfer.

use crate::jtag::{Instruction, ShiftFormat};
use crate::register::{ReadableRegister, RegisterDescriptor, WritableRegister};
use crate::register_data_rw;

/// JMB_EXCHANGE descriptor
pub struct JmbExchangeRegister;

impl RegisterDescriptor for JmbExchangeRegister {
    const INSTRUCTION: Instruction = Instruction::JMB_EXCHANGE;
    const FORMAT: ShiftFormat = ShiftFormat::Word;
    type Value = JmbControl;
}

impl ReadableRegister for JmbExchangeRegister {}
impl WritableRegister for JmbExchangeRegister {}

/// Mailbox status (when captured) or transfer request (when written)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JmbControl(u16);

register_data_rw!(JmbControl, u16, 4);

impl JmbControl {
    /// Status: incoming channel 0 ready to be written by the debugger
    pub const IN0RDY: u16 = 0x0001;

    /// Status: outgoing channel 1 has data for the debugger
    pub const OUT1RDY: u16 = 0x0008;

    /// Request: debugger is about to write incoming data
    pub const INREQ: u16 = 0x0001;

    /// Request: debugger is about to read outgoing data
    pub const OUTREQ: u16 = 0x0004;

    /// Request modifier: 32-bit transfer
    pub const JMB32B: u16 = 0x0010;

    /// A 16-bit write request
    pub const WRITE_IN16: Self = Self(Self::INREQ);

    pub const fn new(value: u16) -> Self {
        JmbControl(value)
    }

    pub fn value(&self) -> u16 {
        self.0
    }

    pub fn in0rdy(&self) -> bool {
        self.0 & Self::IN0RDY != 0
    }

    pub fn out1rdy(&self) -> bool {
        self.0 & Self::OUT1RDY != 0
    }
}
