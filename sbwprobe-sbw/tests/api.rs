// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

// Host requests, from frame to response, against the simulated target

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{SimLines, TargetSim, debug_if};
use embassy_futures::block_on;
use sbwprobe_bin::{
    IoState, Op, REQUEST_FRAME_SIZE, REQ_READ, Response, ReturnCode, SwitchState,
};
use sbwprobe_sbw::SbwError;
use sbwprobe_sbw::api::{Api, ProbeIo, error_response};
use sbwprobe_sbw::debug::ConnectionState;
use sbwprobe_sbw::power::{EnableLine, SharedEnable};

#[derive(Default)]
struct Line {
    enabled: bool,
}

impl EnableLine for Line {
    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

// Board IO with real reference counted power, and pin 3 missing
struct MockIo {
    power: &'static SharedEnable<Line>,
    translator: &'static SharedEnable<Line>,
    host_power: bool,
    pins: [Option<IoState>; 4],
}

impl MockIo {
    fn new() -> Self {
        Self {
            power: Box::leak(Box::new(SharedEnable::new("power", Line::default()))),
            translator: Box::leak(Box::new(SharedEnable::new("translator", Line::default()))),
            host_power: false,
            pins: [None; 4],
        }
    }
}

impl ProbeIo for MockIo {
    fn programming_enable(&mut self) -> Result<(), SbwError> {
        self.power.acquire();
        self.translator.acquire();
        Ok(())
    }

    fn programming_disable(&mut self) -> Result<(), SbwError> {
        let translator = self.translator.release();
        let power = self.power.release();
        translator.and(power).map(|_| ())
    }

    fn target_power(&mut self, on: bool) -> Result<(), SbwError> {
        if on != self.host_power {
            self.host_power = on;
            if on {
                self.power.acquire();
            } else {
                self.power.release()?;
            }
        }
        Ok(())
    }

    fn bypass(&mut self, _on: bool) -> Result<(), SbwError> {
        Err(SbwError::Unsupported)
    }

    fn io_set(&mut self, pin: u8, state: IoState) -> Result<(), SbwError> {
        if pin == 3 {
            return Err(SbwError::Unsupported);
        }
        self.pins[pin as usize] = Some(state);
        Ok(())
    }

    fn io_get(&mut self, pin: u8) -> Result<bool, SbwError> {
        match self.pins[pin as usize] {
            Some(IoState::OutputHigh) => Ok(true),
            Some(_) => Ok(false),
            None => Err(SbwError::Unsupported),
        }
    }
}

fn api(sim: TargetSim) -> (Api<SimLines, MockIo>, Rc<RefCell<TargetSim>>) {
    let (debug, sim) = debug_if(sim);
    (Api::new(debug, MockIo::new()), sim)
}

// Handles a raw request frame the way the firmware does
fn request(api: &mut Api<SimLines, MockIo>, frame: &[u8; REQUEST_FRAME_SIZE]) -> Vec<u8> {
    match Op::from_frame(frame) {
        Ok(op) => block_on(api.handle(op)).to_bytes(),
        Err(e) => error_response(&e).to_bytes(),
    }
}

fn frame(opcode: u8, length: u8, address: u32) -> [u8; REQUEST_FRAME_SIZE] {
    let mut frame = [0u8; REQUEST_FRAME_SIZE];
    frame[0] = opcode;
    frame[1] = length;
    frame[2..6].copy_from_slice(&address.to_le_bytes());
    frame
}

#[test]
fn start_read_stop() {
    let mut sim = TargetSim::with_id(0x91);
    for (ii, word) in [0x1111, 0x2222, 0x3333, 0x4444].iter().enumerate() {
        sim.memory.insert(0x0200 + ii as u32 * 2, *word);
    }
    let (mut api, sim) = api(sim);

    assert_eq!(block_on(api.handle(Op::Start)), Response::ok());
    assert_eq!(api.debug().state(), ConnectionState::Connected);
    assert!(api.io().power.is_enabled());
    assert!(api.io().translator.is_enabled());

    let body = request(&mut api, &frame(REQ_READ, 4, 0x0200));
    assert_eq!(
        body,
        [0x00, 0x04, 0x11, 0x11, 0x22, 0x22, 0x33, 0x33, 0x44, 0x44]
    );

    assert_eq!(block_on(api.handle(Op::Stop)), Response::ok());
    assert_eq!(api.debug().state(), ConnectionState::Disconnected);
    assert!(sim.borrow().lines_released());
    assert!(!api.io().power.is_enabled());
    assert!(!api.io().translator.is_enabled());
    assert_eq!(api.binary_api_calls, 3);
}

#[test]
fn write_then_read() {
    let (mut api, sim) = api(TargetSim::default());
    block_on(api.handle(Op::Start));

    let data = vec![0xDEAD, 0xBEEF];
    assert_eq!(
        block_on(api.handle(Op::Write {
            address: 0x2400,
            data: data.clone()
        })),
        Response::ok()
    );
    assert_eq!(sim.borrow().word(0x2402), 0xBEEF);

    assert_eq!(
        block_on(api.handle(Op::Read {
            address: 0x2400,
            count: 2
        })),
        Response::ok_with_data(data)
    );
}

#[test]
fn halt_release_need_session() {
    let (mut api, _sim) = api(TargetSim::default());
    assert_eq!(block_on(api.handle(Op::Halt)), Response::error(ReturnCode::Generic));

    block_on(api.handle(Op::Start));
    assert_eq!(block_on(api.handle(Op::Halt)), Response::ok());
    assert_eq!(block_on(api.handle(Op::Release)), Response::ok());
}

#[test]
fn start_twice() {
    let (mut api, sim) = api(TargetSim::default());
    assert_eq!(block_on(api.handle(Op::Start)), Response::ok());
    assert_eq!(
        block_on(api.handle(Op::Start)),
        Response::error(ReturnCode::Generic)
    );
    assert_eq!(api.debug().state(), ConnectionState::Connected);
    assert_eq!(api.io().power.users(), 1);
    assert_eq!(sim.borrow().entry_count, 1);
}

#[test]
fn stop_without_session() {
    let (mut api, _sim) = api(TargetSim::default());
    assert_eq!(
        block_on(api.handle(Op::Stop)),
        Response::error(ReturnCode::Generic)
    );
    assert_eq!(api.io().power.users(), 0);
}

#[test]
fn failed_read_marks_session_failed() {
    let mut sim = TargetSim::default();
    sim.memory.insert(0x0200, 0xBEEF);
    sim.memory.insert(0x0202, 0x1234);
    let (mut api, sim) = api(sim);
    block_on(api.handle(Op::Start));

    // The first word is read, then the CPU stops responding.  The response
    // still holds all the requested words.
    sim.borrow_mut().fail_idle_after = Some(1);
    let body = request(&mut api, &frame(REQ_READ, 3, 0x0200));
    assert_eq!(body.len(), 2 + 3 * 2);
    assert_eq!(body, [0x01, 0x03, 0xEF, 0xBE, 0x00, 0x00, 0x00, 0x00]);
    assert_eq!(api.debug().state(), ConnectionState::Failed);

    // Only STOP is useful now
    assert_eq!(
        block_on(api.handle(Op::Read {
            address: 0x0200,
            count: 2,
        })),
        Response {
            rc: ReturnCode::Generic,
            data: Some(vec![0, 0])
        }
    );
    assert_eq!(block_on(api.handle(Op::Stop)), Response::ok());
    assert_eq!(api.debug().state(), ConnectionState::Disconnected);
}

#[test]
fn read_without_session_keeps_length() {
    let (mut api, _sim) = api(TargetSim::default());
    let body = request(&mut api, &frame(REQ_READ, 5, 0x0200));
    assert_eq!(body.len(), 2 + 5 * 2);
    assert_eq!(body[..2], [0x01, 0x05]);
    assert!(body[2..].iter().all(|byte| *byte == 0));
}

#[test]
fn read_write_top_of_memory() {
    let (mut api, sim) = api(TargetSim::default());
    block_on(api.handle(Op::Start));

    assert_eq!(
        block_on(api.handle(Op::Write {
            address: 0xFFFF_FFFE,
            data: vec![0xAA55, 0x55AA],
        })),
        Response::ok()
    );
    assert_eq!(sim.borrow().word(0xFFFFE), 0xAA55);
    assert_eq!(sim.borrow().word(0x00000), 0x55AA);

    let body = request(&mut api, &frame(REQ_READ, 2, 0xFFFF_FFFE));
    assert_eq!(body, [0x00, 0x02, 0x55, 0xAA, 0xAA, 0x55]);
    assert_eq!(api.debug().state(), ConnectionState::Connected);
}

#[test]
fn locked_target_start() {
    let mut sim = TargetSim::default();
    sim.locked = true;
    let (mut api, sim) = api(sim);

    assert_eq!(
        block_on(api.handle(Op::Start)),
        Response::error(ReturnCode::Generic)
    );
    assert_eq!(api.debug().state(), ConnectionState::Locked);

    assert_eq!(block_on(api.handle(Op::Stop)), Response::ok());
    assert!(sim.borrow().lines_released());
    assert_eq!(api.io().power.users(), 0);
}

#[test]
fn power_shared_with_session() {
    let (mut api, _sim) = api(TargetSim::default());
    let on = Op::Power {
        state: SwitchState::On,
    };
    let off = Op::Power {
        state: SwitchState::Off,
    };

    assert_eq!(block_on(api.handle(on)), Response::ok());
    assert!(api.io().power.is_enabled());
    block_on(api.handle(Op::Start));
    assert_eq!(api.io().power.users(), 2);

    // The session keeps the target powered
    assert_eq!(block_on(api.handle(off)), Response::ok());
    assert!(api.io().power.is_enabled());

    block_on(api.handle(Op::Stop));
    assert!(!api.io().power.is_enabled());
}

#[test]
fn probe_ios() {
    let (mut api, _sim) = api(TargetSim::default());
    assert_eq!(
        block_on(api.handle(Op::IoSet {
            pin: 1,
            state: IoState::OutputHigh
        })),
        Response::ok()
    );
    assert_eq!(
        block_on(api.handle(Op::IoGet { pin: 1 })).to_bytes(),
        [0x00, 0x01, 0x01, 0x00]
    );
    assert_eq!(
        block_on(api.handle(Op::IoSet {
            pin: 3,
            state: IoState::Input
        })),
        Response::error(ReturnCode::Unsupported)
    );
    assert_eq!(
        block_on(api.handle(Op::Bypass {
            state: SwitchState::On
        })),
        Response::error(ReturnCode::Unsupported)
    );
}

#[test]
fn undecodable_frames() {
    let (mut api, _sim) = api(TargetSim::default());
    assert_eq!(request(&mut api, &frame(0x20, 0, 0)), [0x02]);
    assert_eq!(request(&mut api, &frame(REQ_READ, 32, 0x0200)), [0x01]);
    assert_eq!(api.binary_api_calls, 0);
}
