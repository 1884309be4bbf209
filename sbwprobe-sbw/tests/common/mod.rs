// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

// Wire level MSP430 simulator, used to test the SBW stack end to end.
//
// SimLines implements SbwLines.  The simulated target watches SBWTCK and
// SBWTDIO, detects the SBW entry sequence, decodes the TMS/TDI/TDO slots,
// and runs a JTAG TAP with just enough of an MSP430Xv2 behind it to model
// the control signal register, MAB/MDB, memory, the mailbox, protection,
// CoreIP/Device ID and TCLK sync.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use embassy_time::Duration;

use sbwprobe_core::cntrl::{CntrlSig, LOCKED_ECHO};
use sbwprobe_core::jmb::JmbControl;
use sbwprobe_core::jtag::{Instruction, scramble_address};
use sbwprobe_sbw::tap::TapState;
use sbwprobe_sbw::{DebugInterface, SbwLines, Settings};

// SBWTCK low for longer than this drops the target out of SBW mode
const SBW_TIMEOUT_US: u64 = 100;

// Bit 9 of the captured control signal register
const TCE: u16 = 0x0200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SbwMode {
    Off,
    Entering,
    Active,
}

#[derive(Debug)]
pub struct TargetSim {
    // Configuration, set by tests
    pub present: bool,
    pub jtag_id: u8,
    pub core_ip: u16,
    pub device_id: u32,
    pub locked: bool,
    pub locked_captures: VecDeque<bool>,
    pub sync_enabled: bool,
    pub fail_idle_after: Option<u32>,
    pub jmb_ready_after: u32,
    pub memory: BTreeMap<u32, u16>,
    pub test_reg: u32,

    // Observations
    pub entry_count: u32,
    pub cntrl_writes: Vec<u16>,
    pub data_writes: Vec<u16>,
    pub jmb_writes: Vec<u16>,
    pub jmb_captures: u32,
    pub releases: u32,

    // Line state
    pub tck: bool,
    pub tdio: bool,
    pub dir: bool,
    pub tck_driven: bool,
    pub tdio_driven: bool,
    low_us: u64,

    // SBW and JTAG state
    pub mode: SbwMode,
    slot: u8,
    tms: bool,
    tdi: bool,
    tdo: bool,
    pub state: TapState,
    pub ir: Instruction,
    ir_shift: u32,
    dr: u32,
    pub tclk: bool,

    // Device state
    pub cntrl: u16,
    pub synced: bool,
    pub mab: u32,
    pub mdb: u16,
}

impl Default for TargetSim {
    fn default() -> Self {
        Self {
            present: true,
            jtag_id: 0x91,
            core_ip: 0x4210,
            device_id: 0x1_A04C,
            locked: false,
            locked_captures: VecDeque::new(),
            sync_enabled: true,
            fail_idle_after: None,
            jmb_ready_after: 1,
            memory: BTreeMap::new(),
            test_reg: 0x0000_0001,

            entry_count: 0,
            cntrl_writes: Vec::new(),
            data_writes: Vec::new(),
            jmb_writes: Vec::new(),
            jmb_captures: 0,
            releases: 0,

            tck: false,
            tdio: false,
            dir: false,
            tck_driven: false,
            tdio_driven: false,
            low_us: 0,

            mode: SbwMode::Off,
            slot: 0,
            tms: false,
            tdi: false,
            tdo: false,
            state: TapState::TestLogicReset,
            ir: Instruction::BYPASS,
            ir_shift: 0,
            dr: 0,
            tclk: false,

            cntrl: 0,
            synced: false,
            mab: 0,
            mdb: 0,
        }
    }
}

impl TargetSim {
    pub fn with_id(jtag_id: u8) -> Self {
        Self {
            jtag_id,
            ..Default::default()
        }
    }

    /// Whether the probe has stopped driving all of the lines
    pub fn lines_released(&self) -> bool {
        !self.tck_driven && !self.tdio_driven && !self.dir
    }

    pub fn word(&self, addr: u32) -> u16 {
        self.memory.get(&addr).copied().unwrap_or(0)
    }

    fn set_tck(&mut self, high: bool) {
        let rising = high && !self.tck;
        let falling = !high && self.tck;
        self.tck = high;
        if rising {
            self.low_us = 0;
            self.rising_edge();
        } else if falling {
            self.falling_edge();
        }
    }

    fn release_tck(&mut self) {
        self.tck_driven = false;
        self.tck = false;
        self.mode = SbwMode::Off;
    }

    fn elapse(&mut self, us: u64) {
        if !self.tck {
            self.low_us += us;
            if self.low_us > SBW_TIMEOUT_US {
                self.mode = SbwMode::Off;
            }
        }
    }

    fn rising_edge(&mut self) {
        match self.mode {
            SbwMode::Off => {
                if self.tdio {
                    self.mode = SbwMode::Entering;
                }
            }
            SbwMode::Entering => {
                self.mode = SbwMode::Active;
                self.slot = 0;
                self.entry_count += 1;
            }
            SbwMode::Active => self.slot = (self.slot + 1) % 3,
        }
    }

    fn falling_edge(&mut self) {
        if self.mode != SbwMode::Active || !self.present {
            return;
        }
        match self.slot {
            0 => self.tms = self.tdio,
            1 => {
                self.tdi = self.tdio;
                self.clock();
            }
            _ => (),
        }
    }

    fn read_tdio(&self) -> bool {
        if self.present && self.mode == SbwMode::Active && self.slot == 2 {
            self.tdo
        } else {
            // Pulled up
            true
        }
    }

    // A JTAG clock: act on the current state, then move on
    fn clock(&mut self) {
        let tdi = self.tdi as u32;
        match self.state {
            TapState::CaptureIr => self.ir_shift = self.jtag_id as u32,
            TapState::ShiftIr => {
                self.tdo = self.ir_shift & 0x80 != 0;
                self.ir_shift = ((self.ir_shift << 1) | tdi) & 0xFF;
            }
            TapState::UpdateIr => {
                self.ir = Instruction::new(self.ir_shift as u8);
                if self.ir == Instruction::CNTRL_SIG_RELEASE {
                    self.releases += 1;
                }
            }
            TapState::CaptureDr => self.dr = self.capture_dr(),
            TapState::ShiftDr => {
                let width = self.dr_width();
                self.tdo = (self.dr >> (width - 1)) & 1 != 0;
                self.dr = ((self.dr << 1) | tdi) & (u32::MAX >> (32 - width));
            }
            TapState::UpdateDr => self.update_dr(),
            TapState::RunTestIdle if !self.tms => self.tclk = self.tdi,
            _ => (),
        }
        self.state = self.state.next(self.tms);
    }

    fn dr_width(&self) -> u32 {
        match self.ir {
            Instruction::ADDR_16BIT | Instruction::ADDR_CAPTURE | Instruction::DEVICE_ID => 20,
            Instruction::TEST_REG => 32,
            _ => 16,
        }
    }

    fn capture_dr(&mut self) -> u32 {
        match self.ir {
            Instruction::CNTRL_SIG_CAPTURE => self.capture_cntrl() as u32,
            Instruction::ADDR_16BIT | Instruction::ADDR_CAPTURE => scramble_address(self.mab),
            Instruction::DATA_TO_ADDR => {
                if CntrlSig::new(self.cntrl).read() {
                    self.word(self.mab) as u32
                } else {
                    0
                }
            }
            Instruction::DATA_16BIT | Instruction::DATA_CAPTURE => self.mdb as u32,
            Instruction::COREIP_ID => self.core_ip as u32,
            Instruction::TEST_REG => self.test_reg,
            Instruction::DEVICE_ID => scramble_address(self.device_id),
            Instruction::JMB_EXCHANGE => {
                self.jmb_captures += 1;
                if self.jmb_captures >= self.jmb_ready_after {
                    JmbControl::IN0RDY as u32
                } else {
                    0
                }
            }
            _ => 0,
        }
    }

    fn capture_cntrl(&mut self) -> u16 {
        let locked_now = self.locked_captures.pop_front().unwrap_or(false);
        if self.locked || locked_now {
            return LOCKED_ECHO;
        }

        match self.fail_idle_after {
            Some(0) => return 0,
            Some(remaining) => self.fail_idle_after = Some(remaining - 1),
            None => (),
        }

        if self.synced {
            self.cntrl | TCE
        } else {
            self.cntrl
        }
    }

    fn update_dr(&mut self) {
        match self.ir {
            Instruction::CNTRL_SIG_16BIT => {
                self.cntrl = self.dr as u16;
                self.cntrl_writes.push(self.cntrl);
                if self.cntrl == CntrlSig::JTAG_MODE.value() && self.sync_enabled {
                    self.synced = true;
                }
            }
            Instruction::ADDR_16BIT => self.mab = self.dr,
            Instruction::DATA_TO_ADDR => {
                if !CntrlSig::new(self.cntrl).read() {
                    self.memory.insert(self.mab, self.dr as u16);
                }
            }
            Instruction::DATA_16BIT => {
                self.mdb = self.dr as u16;
                self.data_writes.push(self.mdb);
            }
            Instruction::JMB_EXCHANGE => self.jmb_writes.push(self.dr as u16),
            Instruction::TEST_REG => self.test_reg = self.dr,
            _ => (),
        }
    }
}

/// SbwLines connected to a simulated target
#[derive(Debug, Clone)]
pub struct SimLines {
    pub sim: Rc<RefCell<TargetSim>>,
}

impl SimLines {
    pub fn new(sim: TargetSim) -> Self {
        Self {
            sim: Rc::new(RefCell::new(sim)),
        }
    }
}

impl SbwLines for SimLines {
    fn set_tck(&mut self, high: bool) {
        self.sim.borrow_mut().set_tck(high);
    }

    fn set_tdio(&mut self, high: bool) {
        self.sim.borrow_mut().tdio = high;
    }

    fn set_dir(&mut self, high: bool) {
        self.sim.borrow_mut().dir = high;
    }

    fn tdio_output(&mut self) {
        self.sim.borrow_mut().tdio_driven = true;
    }

    fn tdio_input(&mut self) {
        self.sim.borrow_mut().tdio_driven = false;
    }

    fn tck_output(&mut self) {
        self.sim.borrow_mut().tck_driven = true;
    }

    fn tck_input(&mut self) {
        self.sim.borrow_mut().release_tck();
    }

    fn read_tdio(&mut self) -> bool {
        self.sim.borrow().read_tdio()
    }

    fn delay_cycles(&mut self, _cycles: u32) {}

    fn delay_us(&mut self, us: u32) {
        self.sim.borrow_mut().elapse(us as u64);
    }

    async fn sleep(&mut self, duration: Duration) {
        self.sim.borrow_mut().elapse(duration.as_micros());
    }
}

/// Test settings - the defaults, with a short clock delay
pub fn settings() -> Settings {
    Settings {
        clock_delay_cycles: 1,
        ..Default::default()
    }
}

/// A debug interface to a simulated target, and a handle on the target
pub fn debug_if(sim: TargetSim) -> (DebugInterface<SimLines>, Rc<RefCell<TargetSim>>) {
    let lines = SimLines::new(sim);
    let handle = lines.sim.clone();
    (DebugInterface::from_lines(lines, &settings()), handle)
}

/// As [`debug_if()`], already connected
pub fn connected(sim: TargetSim) -> (DebugInterface<SimLines>, Rc<RefCell<TargetSim>>) {
    let (mut debug, handle) = debug_if(sim);
    embassy_futures::block_on(debug.connect()).expect("connect failed");
    (debug, handle)
}
