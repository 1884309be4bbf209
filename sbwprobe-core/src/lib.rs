// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! sbwprobe is a USB debug probe for MSP430 targets, speaking TI's Spy-Bi-Wire.
//!
//! sbwprobe-core - MSP430 JTAG protocol concepts used by sbwprobe.
//!
//! Designed to be used in conjunction with the `sbwprobe-sbw` library, which
//! implements the Spy-Bi-Wire transport, TAP controller and device control
//! on top of these definitions.
//!
//! Everything in here is part of the target's debug protocol rather than an
//! implementation choice, and must match what MSP430 devices expect bit for
//! bit:
//!
//! * [`jtag`] - JTAG instructions, family identifiers, shift formats and
//!   20-bit address scrambling.
//! * [`cntrl`] - the JTAG control signal register and the payloads used to
//!   drive it.
//! * [`jmb`] - the JTAG mailbox.
//! * [`mcu`] - CPU level constants, CoreIP and Device ID.
//! * [`register`] - traits used to give data registers strong types.
//!
//! This library is `no_std` compatible and does not require `alloc`.

#![no_std]

pub mod cntrl;
pub mod jmb;
pub mod jtag;
pub mod mcu;
pub mod register;

#[doc(inline)]
pub use crate::cntrl::CntrlSig;
#[doc(inline)]
pub use crate::jtag::{Instruction, JtagId, ShiftFormat};
