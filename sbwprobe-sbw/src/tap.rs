// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! MSP430 JTAG TAP Controller
//!
//! Drives the target's IEEE 1149.1 TAP state machine over SBW, tracking the
//! state it should be in.  Operations that are only valid from particular
//! states return [`SbwError::TapSequence`] rather than send a sequence the
//! target would misinterpret.
//!
//! All shifts are MSB first, and every shift ends back in Run-Test/Idle with
//! TCLK unchanged.

use core::fmt;
use core::result::Result;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use sbwprobe_core::jtag::{Instruction, ShiftFormat, descramble_address};
use sbwprobe_core::register::{ReadableRegister, WritableRegister};

use crate::SbwError;
use crate::protocol::{SbwLines, SbwProtocol, Transition};

// TMS high this many times reaches Test-Logic-Reset from any state
const RESET_TMS_HIGH_CLOCKS: usize = 6;

/// JTAG TAP controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapState {
    TestLogicReset,
    RunTestIdle,
    SelectDrScan,
    CaptureDr,
    ShiftDr,
    Exit1Dr,
    PauseDr,
    Exit2Dr,
    UpdateDr,
    SelectIrScan,
    CaptureIr,
    ShiftIr,
    Exit1Ir,
    PauseIr,
    Exit2Ir,
    UpdateIr,

    /// Not known - before the TAP has been reset
    Unknown,
}

impl TapState {
    /// The state the TAP moves to on a clock with the given TMS
    pub fn next(self, tms: bool) -> Self {
        use TapState::*;
        match (self, tms) {
            (TestLogicReset, false) => RunTestIdle,
            (TestLogicReset, true) => TestLogicReset,
            (RunTestIdle, false) => RunTestIdle,
            (RunTestIdle, true) => SelectDrScan,
            (SelectDrScan, false) => CaptureDr,
            (SelectDrScan, true) => SelectIrScan,
            (CaptureDr, false) => ShiftDr,
            (CaptureDr, true) => Exit1Dr,
            (ShiftDr, false) => ShiftDr,
            (ShiftDr, true) => Exit1Dr,
            (Exit1Dr, false) => PauseDr,
            (Exit1Dr, true) => UpdateDr,
            (PauseDr, false) => PauseDr,
            (PauseDr, true) => Exit2Dr,
            (Exit2Dr, false) => ShiftDr,
            (Exit2Dr, true) => UpdateDr,
            (UpdateDr, false) => RunTestIdle,
            (UpdateDr, true) => SelectDrScan,
            (SelectIrScan, false) => CaptureIr,
            (SelectIrScan, true) => TestLogicReset,
            (CaptureIr, false) => ShiftIr,
            (CaptureIr, true) => Exit1Ir,
            (ShiftIr, false) => ShiftIr,
            (ShiftIr, true) => Exit1Ir,
            (Exit1Ir, false) => PauseIr,
            (Exit1Ir, true) => UpdateIr,
            (PauseIr, false) => PauseIr,
            (PauseIr, true) => Exit2Ir,
            (Exit2Ir, false) => ShiftIr,
            (Exit2Ir, true) => UpdateIr,
            (UpdateIr, false) => RunTestIdle,
            (UpdateIr, true) => SelectDrScan,
            (Unknown, _) => Unknown,
        }
    }

    pub fn is_shift(&self) -> bool {
        matches!(self, TapState::ShiftDr | TapState::ShiftIr)
    }
}

impl fmt::Display for TapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// TAP controller object
///
/// Used by [`crate::SbwInterface`] to drive the target's TAP.  The TAP state
/// starts as [`TapState::Unknown`], and [`Self::reset()`] must be called
/// once the target has entered SBW mode before anything else.
#[derive(Debug)]
pub struct Tap<L: SbwLines> {
    protocol: SbwProtocol<L>,
    state: TapState,
}

impl<L: SbwLines> Tap<L> {
    pub fn new(protocol: SbwProtocol<L>) -> Self {
        Self {
            protocol,
            state: TapState::Unknown,
        }
    }

    pub fn state(&self) -> TapState {
        self.state
    }

    pub fn protocol(&self) -> &SbwProtocol<L> {
        &self.protocol
    }

    pub fn protocol_mut(&mut self) -> &mut SbwProtocol<L> {
        &mut self.protocol
    }

    /// Drive the lines.  The TAP state is unknown until reset.
    pub fn connect(&mut self) {
        self.protocol.connect();
        self.state = TapState::Unknown;
    }

    /// Release the lines.
    pub fn disconnect(&mut self) {
        self.protocol.disconnect();
        self.state = TapState::Unknown;
    }

    /// Send a single JTAG clock, tracking the TAP state.
    pub fn transition(&mut self, transition: Transition) {
        self.protocol.transition(transition);
        self.state = self.state.next(transition.tms());
    }

    fn transition_read(&mut self, transition: Transition) -> bool {
        let tdo = self.protocol.transition_read(transition);
        self.state = self.state.next(transition.tms());
        tdo
    }

    // A clock with TDI matching TCLK, so TCLK is left unchanged
    fn tclk_transition(&self, tms: bool) -> Transition {
        Transition::new(tms, self.protocol.tclk())
    }

    pub fn set_tclk(&mut self) {
        self.protocol.set_tclk();
    }

    pub fn clear_tclk(&mut self) {
        self.protocol.clear_tclk();
    }

    /// Pulse TCLK low then high
    pub fn clock_tclk(&mut self) {
        self.protocol.clear_tclk();
        self.protocol.set_tclk();
    }

    fn require(&self, state: TapState) -> Result<(), SbwError> {
        if self.state == state {
            Ok(())
        } else {
            debug!("Error: TAP in {}, expected {state}", self.state);
            Err(SbwError::TapSequence)
        }
    }

    /// Reset the TAP, from any state, leaving it in Run-Test/Idle.
    pub fn reset(&mut self) {
        trace!("Exec:  TAP reset");
        for _ in 0..RESET_TMS_HIGH_CLOCKS {
            self.protocol.transition(Transition::TmsHighTdiHigh);
        }
        self.state = TapState::TestLogicReset;
        self.transition(Transition::TmsLowTdiHigh);
    }

    // Shifts `bits` bits MSB first, without any descrambling.  The TAP must
    // be in Shift-IR or Shift-DR and is left in Run-Test/Idle.
    fn shift_bits(&mut self, format: ShiftFormat, data: u32) -> Result<u32, SbwError> {
        if !self.state.is_shift() {
            debug!("Error: TAP shift from {}", self.state);
            return Err(SbwError::TapSequence);
        }

        let bits = format.bits();
        let mut mask = format.msb();
        let mut tdo = 0u32;
        for ii in 0..bits {
            let last = ii == bits - 1;
            let tdi = data & mask != 0;
            let bit = self.transition_read(Transition::new(last, tdi));
            tdo = (tdo << 1) | bit as u32;
            mask >>= 1;
        }

        // Exit1 to Update, then Run-Test/Idle
        self.transition(Transition::TmsHighTdiHigh);
        let idle = self.tclk_transition(false);
        self.transition(idle);

        Ok(tdo)
    }

    /// Shift data through the currently selected register.  The TAP must be
    /// in Shift-IR or Shift-DR.
    ///
    /// Arguments:
    /// - `format`: The number of bits to shift.
    /// - `data`: The data to shift in.
    ///
    /// Returns:
    /// - `Ok(u32)`: The data shifted out.  20-bit values are descrambled.
    /// - `Err(SbwError::TapSequence)`: If the TAP isn't in a shift state.
    pub fn shift(&mut self, format: ShiftFormat, data: u32) -> Result<u32, SbwError> {
        let tdo = self.shift_bits(format, data)?;
        if format == ShiftFormat::Addr {
            Ok(descramble_address(tdo))
        } else {
            Ok(tdo)
        }
    }

    /// As [`Self::shift()`], taking a bit count.
    ///
    /// Returns:
    /// - `Ok(0)`: Without touching the lines, if `bits` isn't one of 8, 16, 20
    ///   or 32.
    pub fn shift_raw(&mut self, bits: u32, data: u32) -> Result<u32, SbwError> {
        match ShiftFormat::from_bits(bits) {
            Some(format) => self.shift(format, data),
            None => {
                debug!("Note:  Unsupported shift of {bits} bits");
                Ok(0)
            }
        }
    }

    /// Load an instruction.  The TAP must be in Run-Test/Idle.
    ///
    /// Returns:
    /// - `Ok(u8)`: The value captured in the instruction register, which is
    ///   the device's JTAG ID.
    /// - `Err(SbwError::TapSequence)`: If the TAP isn't in Run-Test/Idle.
    pub fn shift_ir(&mut self, instruction: Instruction) -> Result<u8, SbwError> {
        self.require(TapState::RunTestIdle)?;
        trace!("Exec:  IR {instruction}");

        let select_dr = self.tclk_transition(true);
        self.transition(select_dr);
        self.transition(Transition::TmsHighTdiHigh);
        self.transition(Transition::TmsLowTdiHigh);
        self.transition(Transition::TmsLowTdiHigh);

        self.shift_bits(ShiftFormat::Byte, instruction.raw() as u32)
            .map(|id| id as u8)
    }

    // Run-Test/Idle to Shift-DR
    fn enter_shift_dr(&mut self) -> Result<(), SbwError> {
        self.require(TapState::RunTestIdle)?;

        let select_dr = self.tclk_transition(true);
        self.transition(select_dr);
        self.transition(Transition::TmsLowTdiHigh);
        self.transition(Transition::TmsLowTdiHigh);
        Ok(())
    }

    fn shift_dr(&mut self, format: ShiftFormat, data: u32) -> Result<u32, SbwError> {
        self.enter_shift_dr()?;
        self.shift(format, data)
    }

    /// Shift 16 bits through the selected data register.  The TAP must be
    /// in Run-Test/Idle.
    pub fn shift_dr16(&mut self, data: u16) -> Result<u16, SbwError> {
        let tdo = self.shift_dr(ShiftFormat::Word, data as u32)? as u16;
        trace!("Value: DR16 0x{data:04X} -> 0x{tdo:04X}");
        Ok(tdo)
    }

    /// Shift a 20-bit address through the selected data register.  The
    /// value shifted out is descrambled.
    pub fn shift_dr20(&mut self, address: u32) -> Result<u32, SbwError> {
        let tdo = self.shift_dr(ShiftFormat::Addr, address)?;
        trace!("Value: DR20 0x{address:05X} -> 0x{tdo:05X}");
        Ok(tdo)
    }

    pub fn shift_dr32(&mut self, data: u32) -> Result<u32, SbwError> {
        self.shift_dr(ShiftFormat::Long, data)
    }

    /// Read a typed data register.  Loads the register's instruction, then
    /// shifts zeros through it.
    ///
    /// Arguments:
    /// - `register`: The register descriptor, e.g. `CoreIpRegister`.
    ///
    /// Returns:
    /// - `Ok(R::Value)`: The register contents.
    /// - `Err(SbwError::TapSequence)`: If the TAP isn't in Run-Test/Idle.
    pub fn read_register<R>(&mut self, _register: R) -> Result<R::Value, SbwError>
    where
        R: ReadableRegister,
        R::Value: From<u32>,
    {
        self.shift_ir(R::INSTRUCTION)?;
        self.enter_shift_dr()?;

        // Raw, as the descriptor knows whether the value is scrambled
        let raw = self.shift_bits(R::FORMAT, 0)?;
        Ok(R::from_raw(raw))
    }

    /// Write a typed data register.  Loads the register's instruction, then
    /// shifts the value in.
    pub fn write_register<R>(&mut self, _register: R, value: R::Value) -> Result<(), SbwError>
    where
        R: WritableRegister,
        R::Value: Into<u32>,
    {
        self.shift_ir(R::INSTRUCTION)?;
        self.shift_dr(R::FORMAT, R::to_raw(value)).map(|_| ())
    }
}
