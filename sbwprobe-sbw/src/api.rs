// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! sbwprobe-sbw - Host request handler
//!
//! Handles decoded host requests ([`Op`]s), driving the SBW stack and the
//! probe's board IO, and builds the [`Response`] to send back.
//!
//! Board IO - target power, the programming level translator, bypass and
//! the probe's general purpose IOs - is reached through the [`ProbeIo`]
//! trait, which the sbwprobe firmware implements.

use alloc::vec;
use alloc::vec::Vec;
use core::result::Result;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use sbwprobe_bin::{IoState, Op, ProtocolError, Response, ReturnCode};

use crate::SbwError;
use crate::debug::{ConnectionState, DebugInterface};
use crate::interface::SbwInterface;
use crate::protocol::SbwLines;

// Log every X API calls
const API_CALL_LOG_INTERVAL: usize = 1000;

/// The probe's board IO.
///
/// Capabilities a board doesn't have should return
/// `Err(SbwError::Unsupported)`.
pub trait ProbeIo {
    /// Powers the target and enables the programming level translator.
    /// Reference counted with [`Self::target_power()`].
    fn programming_enable(&mut self) -> Result<(), SbwError>;

    /// Undoes [`Self::programming_enable()`].
    fn programming_disable(&mut self) -> Result<(), SbwError>;

    /// Host control of target power.  Turning it off only removes power if
    /// no session also needs it.
    fn target_power(&mut self, on: bool) -> Result<(), SbwError>;

    fn bypass(&mut self, on: bool) -> Result<(), SbwError>;

    /// Sets a probe IO.
    ///
    /// Arguments:
    /// - `pin`: 0-3, already range checked.
    /// - `state`: Output low, output high or input.
    fn io_set(&mut self, pin: u8, state: IoState) -> Result<(), SbwError>;

    /// Reads a probe IO's level.
    fn io_get(&mut self, pin: u8) -> Result<bool, SbwError>;
}

/// Host request handler.
///
/// Owns the SBW stack and the board IO, and handles one request at a time.
///
/// ```rust,ignore
/// let mut api = Api::new(DebugInterface::from_lines(lines, &settings), board);
/// loop {
///     let op = ...;
///     let response = api.handle(op).await;
///     ...
/// }
/// ```
pub struct Api<L: SbwLines, P: ProbeIo> {
    debug: DebugInterface<L>,
    io: P,

    /// The number of API calls handled.
    pub binary_api_calls: usize,
}

impl<L: SbwLines, P: ProbeIo> Api<L, P> {
    pub fn new(debug: DebugInterface<L>, io: P) -> Self {
        Self {
            debug,
            io,
            binary_api_calls: 0,
        }
    }

    pub fn debug(&mut self) -> &mut DebugInterface<L> {
        &mut self.debug
    }

    pub fn io(&mut self) -> &mut P {
        &mut self.io
    }

    /// Handles a single request.
    ///
    /// Arguments:
    /// - `op`: The decoded request.
    ///
    /// Returns:
    /// - `Response`: To send to the host.  A READ response always carries
    ///   the requested number of words, even if it failed.  Words which
    ///   weren't read are zero.
    pub async fn handle(&mut self, op: Op) -> Response {
        trace!("Exec:  API {op:#}");
        let command = op.command();

        let mut data = None;
        let rc = match self.handle_op(op, &mut data).await {
            Ok(()) => ReturnCode::Ok,
            Err(e) => {
                warn!("Error: {command} failed: {e}");
                if e.requires_reset() && self.debug.state() == ConnectionState::Connected {
                    self.debug.mark_failed();
                }
                e.return_code()
            }
        };
        let response = Response { rc, data };

        self.binary_api_calls += 1;
        if self.binary_api_calls.is_multiple_of(API_CALL_LOG_INTERVAL) {
            info!("Note:  API handled {} calls so far", self.binary_api_calls);
        }

        trace!("OK:    API {command} -> {response}");
        response
    }

    // Handles a single operation, filling in `data` with any data words
    async fn handle_op(&mut self, op: Op, data: &mut Option<Vec<u16>>) -> Result<(), SbwError> {
        match op {
            Op::Start => {
                if self.debug.state() != ConnectionState::Disconnected {
                    return Err(SbwError::SessionActive);
                }
                self.io.programming_enable()?;
                self.debug.connect().await.map(|_| ())
            }
            Op::Stop => {
                if self.debug.state() == ConnectionState::Disconnected {
                    return Err(SbwError::NotConnected);
                }
                let disconnect = self.debug.disconnect().await;
                let disable = self.io.programming_disable();
                disconnect.and(disable)
            }
            Op::Halt => self.connected()?.halt(),
            Op::Release => self.connected()?.release(),
            Op::Write {
                address,
                data: words,
            } => self.connected()?.mem_write(address, &words),
            Op::Read { address, count } => {
                let buf = data.insert(vec![0u16; count as usize]);
                self.connected()?.mem_read(address, buf)
            }
            Op::Power { state } => self.io.target_power(state.is_on()),
            Op::IoSet { pin, state } => self.io.io_set(pin, state),
            Op::IoGet { pin } => {
                let level = self.io.io_get(pin)?;
                *data = Some(vec![level as u16]);
                Ok(())
            }
            Op::Bypass { state } => self.io.bypass(state.is_on()),
        }
    }

    fn connected(&mut self) -> Result<&mut SbwInterface<L>, SbwError> {
        if self.debug.is_connected() {
            Ok(self.debug.sbw_if())
        } else {
            debug!("Error: Not connected, {}", self.debug.state());
            Err(SbwError::NotConnected)
        }
    }
}

/// The response for a request which couldn't be decoded
pub fn error_response(e: &ProtocolError) -> Response {
    debug!("Error: Request not decoded: {e}");
    Response::from(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Settings;
    use crate::mock::RecordingLines;
    use embassy_futures::block_on;
    use sbwprobe_bin::{ReturnCode, SwitchState};

    #[derive(Default)]
    struct Io {
        enabled: u8,
        power: Option<bool>,
    }

    impl ProbeIo for Io {
        fn programming_enable(&mut self) -> Result<(), SbwError> {
            self.enabled += 1;
            Ok(())
        }

        fn programming_disable(&mut self) -> Result<(), SbwError> {
            self.enabled = self.enabled.checked_sub(1).ok_or(SbwError::NotAcquired)?;
            Ok(())
        }

        fn target_power(&mut self, on: bool) -> Result<(), SbwError> {
            self.power = Some(on);
            Ok(())
        }

        fn bypass(&mut self, _on: bool) -> Result<(), SbwError> {
            Err(SbwError::Unsupported)
        }

        fn io_set(&mut self, _pin: u8, _state: IoState) -> Result<(), SbwError> {
            Ok(())
        }

        fn io_get(&mut self, pin: u8) -> Result<bool, SbwError> {
            Ok(pin == 2)
        }
    }

    fn api() -> Api<RecordingLines, Io> {
        Api::new(
            DebugInterface::from_lines(RecordingLines::default(), &Settings::default()),
            Io::default(),
        )
    }

    #[test]
    fn session_ops_need_connection() {
        let mut api = api();
        for op in [Op::Halt, Op::Release, Op::Stop] {
            assert_eq!(block_on(api.handle(op)), Response::error(ReturnCode::Generic));
        }
        assert_eq!(
            block_on(api.handle(Op::Read {
                address: 0x1C00,
                count: 2
            })),
            Response {
                rc: ReturnCode::Generic,
                data: Some(vec![0, 0])
            }
        );
        assert!(api.debug().sbw().tap().protocol().lines().events.is_empty());
        assert_eq!(api.binary_api_calls, 4);
    }

    #[test]
    fn board_ops() {
        let mut api = api();
        assert_eq!(
            block_on(api.handle(Op::Power {
                state: SwitchState::On
            })),
            Response::ok()
        );
        assert_eq!(api.io().power, Some(true));

        assert_eq!(
            block_on(api.handle(Op::Bypass {
                state: SwitchState::On
            })),
            Response::error(ReturnCode::Unsupported)
        );
        assert_eq!(
            block_on(api.handle(Op::IoGet { pin: 2 })),
            Response::ok_with_data(vec![1])
        );
        assert_eq!(
            block_on(api.handle(Op::IoSet {
                pin: 1,
                state: IoState::Input
            })),
            Response::ok()
        );
    }

    #[test]
    fn failed_start_needs_stop() {
        let mut api = api();
        assert_eq!(block_on(api.handle(Op::Start)), Response::error(ReturnCode::Generic));
        assert_eq!(api.debug().state(), ConnectionState::Failed);
        assert_eq!(api.io().enabled, 1);

        // A second START is refused without touching the enable
        assert_eq!(block_on(api.handle(Op::Start)), Response::error(ReturnCode::Generic));
        assert_eq!(api.io().enabled, 1);

        assert_eq!(block_on(api.handle(Op::Stop)), Response::ok());
        assert_eq!(api.debug().state(), ConnectionState::Disconnected);
        assert_eq!(api.io().enabled, 0);
    }

    #[test]
    fn undecoded_requests() {
        assert_eq!(
            error_response(&ProtocolError::Command(0x0A)),
            Response::error(ReturnCode::UnknownRequest)
        );
        assert_eq!(
            error_response(&ProtocolError::Arg),
            Response::error(ReturnCode::Generic)
        );
    }
}
