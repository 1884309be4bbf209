// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

// SbwLines implementation recording everything done to the lines, for unit
// testing the protocol and TAP layers.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use embassy_time::Duration;

use crate::protocol::SbwLines;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineEvent {
    Tck(bool),
    Tdio(bool),
    Dir(bool),
    TdioOutput,
    TdioInput,
    TckOutput,
    TckInput,
    ReadTdio,
    Delay(u32),
    DelayUs(u32),
    Sleep(u64),
}

#[derive(Debug, Default)]
pub(crate) struct RecordingLines {
    pub events: Vec<LineEvent>,

    // Values returned by read_tdio, in order.  Reads low once exhausted.
    pub tdo: VecDeque<bool>,
}

impl RecordingLines {
    // Decodes the recorded events back into (TMS, TDI) pairs, using the
    // level of SBWTDIO at each falling SBWTCK edge.  The third falling edge
    // of each transition is the TDO slot, which is skipped.
    pub fn transitions(&self) -> Vec<(bool, bool)> {
        let mut tdio = false;
        let mut tck = true;
        let mut latched = Vec::new();
        for event in &self.events {
            match *event {
                LineEvent::Tdio(level) => tdio = level,
                LineEvent::Tck(level) => {
                    if tck && !level {
                        latched.push(tdio);
                    }
                    tck = level;
                }
                _ => (),
            }
        }
        latched
            .chunks_exact(3)
            .map(|slots| (slots[0], slots[1]))
            .collect()
    }
}

impl SbwLines for RecordingLines {
    fn set_tck(&mut self, high: bool) {
        self.events.push(LineEvent::Tck(high));
    }

    fn set_tdio(&mut self, high: bool) {
        self.events.push(LineEvent::Tdio(high));
    }

    fn set_dir(&mut self, high: bool) {
        self.events.push(LineEvent::Dir(high));
    }

    fn tdio_output(&mut self) {
        self.events.push(LineEvent::TdioOutput);
    }

    fn tdio_input(&mut self) {
        self.events.push(LineEvent::TdioInput);
    }

    fn tck_output(&mut self) {
        self.events.push(LineEvent::TckOutput);
    }

    fn tck_input(&mut self) {
        self.events.push(LineEvent::TckInput);
    }

    fn read_tdio(&mut self) -> bool {
        self.events.push(LineEvent::ReadTdio);
        self.tdo.pop_front().unwrap_or(false)
    }

    fn delay_cycles(&mut self, cycles: u32) {
        self.events.push(LineEvent::Delay(cycles));
    }

    fn delay_us(&mut self, us: u32) {
        self.events.push(LineEvent::DelayUs(us));
    }

    async fn sleep(&mut self, duration: Duration) {
        self.events.push(LineEvent::Sleep(duration.as_micros()));
    }
}
