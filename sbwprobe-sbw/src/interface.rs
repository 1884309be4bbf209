// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! MSP430 SBW Device Control Interface
//!
//! This module implements control of an MSP430Xv2 CPU over JTAG.  It
//! provides `SbwInterface` for memory access, reset, halt, release, register
//! set and the JTAG mailbox.
//!
//! Everything here assumes the target has already been connected to and
//! synchronized by [`DebugInterface`].

use core::result::Result;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use sbwprobe_core::cntrl::{CntrlSig, CntrlSig16BitRegister, CntrlSigCaptureRegister, LOCK_PROBE};
use sbwprobe_core::jmb::{JmbControl, JmbExchangeRegister};
use sbwprobe_core::jtag::{ADDRESS_MASK, Instruction, JtagId};
use sbwprobe_core::mcu::{
    CoreIp, CoreIpRegister, DeviceId, DeviceIdRegister, JMP_SELF, NOP, PC, SAFE_PC, TEST_MEMORY,
    WDT_HOLD, mova_imm20,
};

use crate::protocol::{SbwLines, SbwProtocol};
use crate::tap::Tap;
use crate::{SbwError, Settings};

#[doc(inline)]
pub use crate::debug::DebugInterface;

/// SBW device control object
///
/// This is used by [`DebugInterface`] to perform individual device control
/// operations on the target.  Most applications will prefer to use
/// [`DebugInterface`], and use [`DebugInterface::sbw_if()`] to reach this
/// once connected.
///
/// ```rust,ignore
/// let mut sbw_if = SbwInterface::new(SbwProtocol::new(lines, &settings), &settings);
/// ```
#[derive(Debug)]
pub struct SbwInterface<L: SbwLines> {
    tap: Tap<L>,
    settings: Settings,

    // Set by reset(), from the JTAG ID captured during it
    jtag_id: Option<JtagId>,
}

impl<L: SbwLines> SbwInterface<L> {
    /// Creates a new device control interface.
    ///
    /// Arguments:
    /// - `protocol`: The [`SbwProtocol`] instance to use.
    /// - `settings`: Poll and retry counts.
    pub fn new(protocol: SbwProtocol<L>, settings: &Settings) -> Self {
        Self {
            tap: Tap::new(protocol),
            settings: *settings,
            jtag_id: None,
        }
    }

    /// Creates a new device control interface from the probe's lines.
    pub fn from_lines(lines: L, settings: &Settings) -> Self {
        Self::new(SbwProtocol::new(lines, settings), settings)
    }

    pub fn tap(&self) -> &Tap<L> {
        &self.tap
    }

    /// Returns the TAP, for direct TAP access.
    pub fn tap_mut(&mut self) -> &mut Tap<L> {
        &mut self.tap
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The JTAG ID captured by the last [`Self::reset()`]
    pub fn jtag_id(&self) -> Option<JtagId> {
        self.jtag_id
    }

    pub(crate) fn clear_jtag_id(&mut self) {
        self.jtag_id = None;
    }

    // Checks the CPU is idle under JTAG control.  Leaves CNTRL_SIG_CAPTURE
    // selected.
    fn check_idle(&mut self) -> Result<(), SbwError> {
        let cntrl = self.tap.read_register(CntrlSigCaptureRegister)?;
        if cntrl.is_jtag_idle() {
            Ok(())
        } else {
            debug!("Error: CPU not idle, CNTRL_SIG 0x{:04X}", cntrl.value());
            Err(SbwError::NotIdle(cntrl.value()))
        }
    }

    /// Reads a 16-bit word from the target's memory.
    ///
    /// Arguments:
    /// - `addr`: The 20-bit address to read.  Must be even.
    ///
    /// Returns:
    /// - `Ok(u16)`: The word read.
    /// - `Err(SbwError::NotIdle)`: If the CPU isn't under JTAG control.
    pub fn read_word(&mut self, addr: u32) -> Result<u16, SbwError> {
        self.check_idle()?;

        self.tap.clear_tclk();
        self.tap
            .write_register(CntrlSig16BitRegister, CntrlSig::READ_MEMORY)?;
        self.tap.shift_ir(Instruction::ADDR_16BIT)?;
        self.tap.shift_dr20(addr)?;
        self.tap.shift_ir(Instruction::DATA_TO_ADDR)?;
        self.tap.set_tclk();
        self.tap.clear_tclk();
        let data = self.tap.shift_dr16(0)?;
        self.tap.set_tclk();
        self.tap.clear_tclk();
        self.tap.set_tclk();

        trace!("Value: 0x{addr:05X} = 0x{data:04X}");
        Ok(data)
    }

    /// Writes a 16-bit word to the target's memory.
    ///
    /// Arguments:
    /// - `addr`: The 20-bit address to write.  Must be even.
    /// - `data`: The word to write.
    pub fn write_word(&mut self, addr: u32, data: u16) -> Result<(), SbwError> {
        self.check_idle()?;

        self.tap.clear_tclk();
        self.tap
            .write_register(CntrlSig16BitRegister, CntrlSig::WRITE_MEMORY)?;
        self.tap.shift_ir(Instruction::ADDR_16BIT)?;
        self.tap.shift_dr20(addr)?;
        self.tap.set_tclk();
        self.tap.shift_ir(Instruction::DATA_TO_ADDR)?;
        self.tap.shift_dr16(data)?;
        self.tap.clear_tclk();
        self.tap
            .write_register(CntrlSig16BitRegister, CntrlSig::READ_MEMORY)?;
        self.tap.set_tclk();
        self.tap.clear_tclk();
        self.tap.set_tclk();

        trace!("Value: 0x{addr:05X} := 0x{data:04X}");
        Ok(())
    }

    /// Reads consecutive words from the target's memory.  Addresses wrap at
    /// the top of the 20-bit address space.
    ///
    /// Arguments:
    /// - `addr`: The address of the first word.
    /// - `buf`: Filled with the words read.
    ///
    /// Returns:
    /// - `Ok(())`: If all words were read.
    /// - `Err(SbwError)`: The error reading the first word that failed.
    ///   Earlier words in `buf` have been read.
    pub fn mem_read(&mut self, addr: u32, buf: &mut [u16]) -> Result<(), SbwError> {
        debug!("Exec:  Read {} words from 0x{addr:05X}", buf.len());
        for (ii, word) in buf.iter_mut().enumerate() {
            *word = self
                .read_word(word_address(addr, ii))
                .inspect_err(|e| debug!("Error: Read failed at word {ii}: {e}"))?;
        }
        Ok(())
    }

    /// Writes consecutive words to the target's memory.  Addresses wrap at
    /// the top of the 20-bit address space.
    ///
    /// Returns:
    /// - `Ok(())`: If all words were written.
    /// - `Err(SbwError)`: The error writing the first word that failed.
    ///   Earlier words have been written.
    pub fn mem_write(&mut self, addr: u32, data: &[u16]) -> Result<(), SbwError> {
        debug!("Exec:  Write {} words to 0x{addr:05X}", data.len());
        for (ii, word) in data.iter().enumerate() {
            self.write_word(word_address(addr, ii), *word)
                .inspect_err(|e| debug!("Error: Write failed at word {ii}: {e}"))?;
        }
        Ok(())
    }

    /// Performs a power-on reset of the CPU, leaving it halted under JTAG
    /// control with the watchdog held.
    ///
    /// Returns:
    /// - `Ok(JtagId)`: The JTAG ID captured during the reset.
    /// - `Err(SbwError)`: If the CPU isn't under JTAG control afterwards.
    pub fn reset(&mut self) -> Result<JtagId, SbwError> {
        debug!("Exec:  Device reset");
        self.tap.clock_tclk();

        self.tap.shift_ir(Instruction::CNTRL_SIG_16BIT)?;
        self.tap.shift_dr16(CntrlSig::POR_ASSERT.value())?;
        self.tap.shift_dr16(CntrlSig::POR_RELEASE.value())?;

        // Feed the CPU a safe PC, while it fetches the reset vector
        self.tap.shift_ir(Instruction::DATA_16BIT)?;
        self.tap.clock_tclk();
        self.tap.clock_tclk();
        self.tap.shift_dr16(SAFE_PC)?;
        self.tap.clock_tclk();
        self.tap.shift_ir(Instruction::DATA_CAPTURE)?;
        self.tap.clock_tclk();
        self.tap.clock_tclk();

        self.tap
            .write_register(CntrlSig16BitRegister, CntrlSig::READ_MEMORY)?;
        self.tap.clock_tclk();

        let jtag_id = JtagId::from_byte(self.tap.shift_ir(Instruction::CNTRL_SIG_CAPTURE)?);
        self.jtag_id = Some(jtag_id);

        self.write_word(jtag_id.wdt_control_address(), WDT_HOLD)?;
        if jtag_id.initializes_test_memory() {
            for addr in TEST_MEMORY {
                self.write_word(addr, JMP_SELF)?;
            }
        }

        self.check_idle()?;
        debug!("OK:    Device reset, JTAG ID {jtag_id}");
        Ok(jtag_id)
    }

    /// Halts the CPU.
    pub fn halt(&mut self) -> Result<(), SbwError> {
        debug!("Exec:  Halt");
        self.tap.shift_ir(Instruction::DATA_16BIT)?;
        self.tap.shift_dr16(JMP_SELF)?;
        self.tap.clear_tclk();
        self.tap
            .write_register(CntrlSig16BitRegister, CntrlSig::HALT)?;
        self.tap.set_tclk();
        Ok(())
    }

    /// Releases the CPU from a halt, to run freely.
    pub fn release(&mut self) -> Result<(), SbwError> {
        debug!("Exec:  Release");
        self.tap.clear_tclk();
        self.release_control()?;
        self.tap.set_tclk();
        Ok(())
    }

    /// Hands control of the CPU back from JTAG, without touching TCLK.
    pub fn release_control(&mut self) -> Result<(), SbwError> {
        self.tap.shift_ir(Instruction::CNTRL_SIG_16BIT)?;
        self.tap.shift_dr16(CntrlSig::RELEASE_HALT.value())?;
        self.tap.shift_dr16(CntrlSig::RELEASE_HALTED.value())?;
        self.tap.shift_ir(Instruction::CNTRL_SIG_RELEASE)?;
        Ok(())
    }

    /// Sets a CPU register, by feeding the CPU a `MOVA #imm20, Rn`.
    ///
    /// Arguments:
    /// - `reg`: The register number, 0-15.
    /// - `data`: The 20-bit value.
    pub fn set_register(&mut self, reg: u8, data: u32) -> Result<(), SbwError> {
        debug!("Exec:  Set R{reg} to 0x{data:05X}");
        let mova = mova_imm20(reg, data);

        self.check_idle()?;
        self.tap.clear_tclk();
        self.tap.shift_ir(Instruction::DATA_16BIT)?;
        self.tap.set_tclk();
        self.tap.shift_dr16(mova)?;
        self.tap.clear_tclk();
        self.tap
            .write_register(CntrlSig16BitRegister, CntrlSig::RELEASE_LOW_BYTE)?;
        self.tap.shift_ir(Instruction::DATA_16BIT)?;
        self.tap.clock_tclk();
        self.tap.shift_dr16((data & 0xFFFF) as u16)?;
        self.tap.clock_tclk();
        self.tap.shift_dr16(NOP)?;
        self.tap.clear_tclk();
        self.tap.shift_ir(Instruction::ADDR_CAPTURE)?;
        self.tap.shift_dr20(0)?;
        Ok(())
    }

    /// Sets the program counter.
    pub fn set_pc(&mut self, addr: u32) -> Result<(), SbwError> {
        self.set_register(PC, addr)
    }

    /// Reads the CoreIP ID.
    ///
    /// Returns:
    /// - `Ok(CoreIp)`: The CoreIP ID, which is never zero.
    /// - `Err(SbwError::NoCoreIp)`: If zero was read.
    pub fn core_ip_id(&mut self) -> Result<CoreIp, SbwError> {
        let core_ip = self.tap.read_register(CoreIpRegister)?;
        if core_ip.is_valid() {
            Ok(core_ip)
        } else {
            Err(SbwError::NoCoreIp)
        }
    }

    /// Reads the Device ID pointer.
    pub fn device_id(&mut self) -> Result<DeviceId, SbwError> {
        self.tap.read_register(DeviceIdRegister)
    }

    /// Sends a 16-bit word to the target through the JTAG mailbox.
    ///
    /// Returns:
    /// - `Ok(())`: Once the word has been sent.
    /// - `Err(SbwError::MailboxTimeout)`: If the mailbox didn't become ready.
    ///   Nothing was sent.
    pub fn write_mailbox_in16(&mut self, data: u16) -> Result<(), SbwError> {
        self.tap.shift_ir(Instruction::JMB_EXCHANGE)?;

        let polls = self.settings.mailbox_polls;
        let mut ready = false;
        for _ in 0..polls {
            if JmbControl::new(self.tap.shift_dr16(0)?).in0rdy() {
                ready = true;
                break;
            }
        }
        if !ready {
            debug!("Error: Mailbox not ready after {polls} polls");
            return Err(SbwError::MailboxTimeout);
        }

        self.tap.shift_dr16(JmbControl::WRITE_IN16.value())?;
        self.tap.shift_dr16(data)?;
        trace!("OK:    Mailbox 0x{data:04X}");
        Ok(())
    }

    /// Writes the mailbox request, as a typed register.  Used to abandon a
    /// transfer.
    pub fn write_mailbox_control(&mut self, control: JmbControl) -> Result<(), SbwError> {
        self.tap.write_register(JmbExchangeRegister, control)
    }

    /// Checks whether the target's JTAG access is protected.
    pub fn is_locked(&mut self) -> Result<bool, SbwError> {
        for attempt in 0..self.settings.lock_checks {
            self.tap.shift_ir(Instruction::CNTRL_SIG_CAPTURE)?;
            if CntrlSig::new(self.tap.shift_dr16(LOCK_PROBE)?).is_locked_echo() {
                debug!("Note:  Device locked, attempt {attempt}");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Erasing flash is not supported.
    pub fn erase(&mut self) -> Result<(), SbwError> {
        Err(SbwError::Unsupported)
    }
}

// Address of word `index` of a block starting at `base`, within the 20-bit
// address space
fn word_address(base: u32, index: usize) -> u32 {
    base.wrapping_add((index as u32).wrapping_mul(2)) & ADDRESS_MASK
}
