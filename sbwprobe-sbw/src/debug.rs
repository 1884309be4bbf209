// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! SBW Debug Interface
//!
//! This module implements connecting to, synchronizing with and
//! disconnecting from an MSP430 over SBW.  It tracks the session's
//! [`ConnectionState`].
//!
//! Once connected, use [`DebugInterface::sbw_if()`] to reach the
//! [`SbwInterface`] for device control.

use core::fmt;
use core::result::Result;
use embassy_time::Duration;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use sbwprobe_core::cntrl::{CntrlSig, CntrlSig16BitRegister};
use sbwprobe_core::jtag::{Instruction, JtagId};
use sbwprobe_core::mcu::CoreIp;

use crate::interface::SbwInterface;
use crate::protocol::SbwLines;
use crate::tap::TapState;
use crate::{SbwError, Settings};

/// Time for the lines to settle after being driven or released
const SETTLE: Duration = Duration::from_millis(15);

/// Wait after a connect attempt reads an unsupported JTAG ID
const RETRY_BACKOFF: Duration = Duration::from_micros(500);

/// Delay between sync polls
const SYNC_POLL_US: u32 = 5;

/// State of the session with the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Entering,
    Reset,
    Identifying,
    Locked,
    Syncing,
    Connected,

    /// A fatal error occurred.  The session must be disconnected.
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Entering => "Entering SBW",
            ConnectionState::Reset => "TAP Reset",
            ConnectionState::Identifying => "Identifying",
            ConnectionState::Locked => "Locked",
            ConnectionState::Syncing => "Syncing",
            ConnectionState::Connected => "Connected",
            ConnectionState::Failed => "Failed",
        };
        write!(f, "{s}")
    }
}

/// MSP430 Debug Interface object
///
/// This is used by applications to start and end SBW sessions with an
/// MSP430.  The simplest way to create one is [`Self::from_lines()`]:
///
/// ```rust,ignore
/// use sbwprobe_sbw::{DebugInterface, Settings};
///
/// let mut debug = DebugInterface::from_lines(lines, &Settings::default());
/// debug.connect().await?;
///
/// let value = debug.sbw_if().read_word(0x1C00)?;
/// debug.disconnect().await?;
/// ```
#[derive(Debug)]
pub struct DebugInterface<L: SbwLines> {
    sbw: SbwInterface<L>,
    state: ConnectionState,
    jtag_id: Option<JtagId>,
    core_ip: Option<CoreIp>,
    settings: Settings,
}

impl<L: SbwLines> DebugInterface<L> {
    /// Creates a new `DebugInterface` with the given [`SbwInterface`].
    pub fn new(sbw: SbwInterface<L>) -> Self {
        let settings = *sbw.settings();
        Self {
            sbw,
            state: ConnectionState::Disconnected,
            jtag_id: None,
            core_ip: None,
            settings,
        }
    }

    /// Creates a new `DebugInterface` from the probe's lines.
    ///
    /// Arguments:
    /// - `lines`: The probe's SBW lines.  Not driven until [`Self::connect()`].
    /// - `settings`: Clock delay, poll and retry counts.
    pub fn from_lines(lines: L, settings: &Settings) -> Self {
        Self::new(SbwInterface::from_lines(lines, settings))
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The JTAG ID read when connecting
    pub fn jtag_id(&self) -> Option<JtagId> {
        self.jtag_id
    }

    /// The CoreIP ID read when connecting
    pub fn core_ip(&self) -> Option<CoreIp> {
        self.core_ip
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Returns the underlying [`SbwInterface`], for device control.
    pub fn sbw_if(&mut self) -> &mut SbwInterface<L> {
        &mut self.sbw
    }

    /// Returns the underlying [`SbwInterface`] without allowing control.
    pub fn sbw(&self) -> &SbwInterface<L> {
        &self.sbw
    }

    /// Marks the session as failed, following a fatal device error.  Only
    /// [`Self::disconnect()`] is useful afterwards.
    pub fn mark_failed(&mut self) {
        if self.state != ConnectionState::Disconnected {
            warn!("Note:  Session failed from {}", self.state);
            self.state = ConnectionState::Failed;
        }
    }

    /// Connects to the target.  Enters SBW mode, identifies the device,
    /// checks it isn't locked, then synchronizes and resets the CPU, leaving
    /// it halted under JTAG control.
    ///
    /// Returns:
    /// - `Ok(JtagId)`: The target's JTAG ID.  State is `Connected`.
    /// - `Err(SbwError::SessionActive)`: If not `Disconnected`.  Nothing is
    ///   done.
    /// - `Err(SbwError::Locked)`: If the target is protected.  State is
    ///   `Locked`.
    /// - `Err(SbwError)`: Any other failure.  State is `Failed`.
    pub async fn connect(&mut self) -> Result<JtagId, SbwError> {
        if self.state != ConnectionState::Disconnected {
            debug!("Error: Connect while {}", self.state);
            return Err(SbwError::SessionActive);
        }

        info!("Exec:  Connecting to target");
        match self.connect_inner().await {
            Ok(jtag_id) => {
                self.state = ConnectionState::Connected;
                info!("OK:    Connected, {jtag_id}");
                Ok(jtag_id)
            }
            Err(SbwError::Locked) => {
                self.state = ConnectionState::Locked;
                warn!("Error: Target is locked");
                Err(SbwError::Locked)
            }
            Err(e) => {
                self.state = ConnectionState::Failed;
                warn!("Error: Connect failed: {e}");
                Err(e)
            }
        }
    }

    async fn connect_inner(&mut self) -> Result<JtagId, SbwError> {
        let jtag_id = self.enter_and_identify().await?;
        self.jtag_id = Some(jtag_id);

        if self.sbw.is_locked()? {
            return Err(SbwError::Locked);
        }

        let core_ip = self.sbw.core_ip_id()?;
        debug!("Value: CoreIP ID {core_ip}");
        self.core_ip = Some(core_ip);

        self.state = ConnectionState::Syncing;
        self.sync()?;

        self.sbw.reset()?;
        Ok(jtag_id)
    }

    // Enters SBW mode and reads the JTAG ID, retrying until a supported ID
    // is read.  Each miss releases the lines before the next attempt.
    async fn enter_and_identify(&mut self) -> Result<JtagId, SbwError> {
        let mut last = JtagId::Unknown(0xFF);
        for attempt in 0..self.settings.connect_attempts {
            self.state = ConnectionState::Entering;
            self.sbw.tap_mut().connect();
            self.sbw.tap_mut().protocol_mut().sleep(SETTLE).await;
            self.sbw.tap_mut().protocol_mut().entry_sequence().await;

            self.state = ConnectionState::Reset;
            self.sbw.tap_mut().reset();

            self.state = ConnectionState::Identifying;
            let jtag_id = JtagId::from_byte(
                self.sbw
                    .tap_mut()
                    .shift_ir(Instruction::CNTRL_SIG_CAPTURE)?,
            );
            if jtag_id.is_supported() {
                debug!("OK:    JTAG ID {jtag_id}, attempt {attempt}");
                return Ok(jtag_id);
            }

            debug!("Note:  Unsupported JTAG ID {jtag_id}, attempt {attempt}");
            last = jtag_id;
            self.sbw.tap_mut().protocol_mut().sleep(RETRY_BACKOFF).await;
            self.sbw.tap_mut().disconnect();
        }

        Err(SbwError::UnknownDevice(last.to_byte()))
    }

    /// Synchronizes the CPU with TCLK, putting it under JTAG control.
    ///
    /// Returns:
    /// - `Ok(())`: Once the CPU is synchronized.
    /// - `Err(SbwError::UnknownDevice)`: If the JTAG ID re-read isn't
    ///   supported.
    /// - `Err(SbwError::SyncTimeout)`: If the CPU didn't synchronize.
    pub fn sync(&mut self) -> Result<(), SbwError> {
        debug!("Exec:  Sync");
        let tap = self.sbw.tap_mut();
        tap.write_register(CntrlSig16BitRegister, CntrlSig::JTAG_MODE)?;

        let jtag_id = JtagId::from_byte(tap.shift_ir(Instruction::CNTRL_SIG_CAPTURE)?);
        if !jtag_id.is_supported() {
            debug!("Error: JTAG ID changed to {jtag_id}");
            return Err(SbwError::UnknownDevice(jtag_id.to_byte()));
        }

        for _ in 0..self.settings.sync_polls {
            let cntrl = CntrlSig::new(tap.shift_dr16(0)?);
            if cntrl.synchronized() {
                debug!("OK:    Synchronized, CNTRL_SIG {cntrl}");
                return Ok(());
            }
            tap.protocol_mut().delay_us(SYNC_POLL_US);
        }

        debug!("Error: Sync timed out");
        Err(SbwError::SyncTimeout)
    }

    /// Disconnects from the target, handing the CPU back and releasing the
    /// lines.  The lines are always released and the state always ends
    /// `Disconnected`, even if handing the CPU back fails.
    ///
    /// Returns:
    /// - `Ok(())`: If everything succeeded.
    /// - `Err(SbwError)`: The error handing the CPU back.
    pub async fn disconnect(&mut self) -> Result<(), SbwError> {
        info!("Exec:  Disconnecting from {}", self.state);

        // There's nothing to hand back if the TAP was never reset
        let result = if self.sbw.tap().state() == TapState::Unknown {
            Ok(())
        } else {
            self.sbw
                .release_control()
                .inspect_err(|e| warn!("Error: Release failed: {e}"))
        };

        self.sbw.tap_mut().disconnect();
        self.sbw.tap_mut().protocol_mut().sleep(SETTLE).await;

        self.state = ConnectionState::Disconnected;
        self.jtag_id = None;
        self.core_ip = None;
        self.sbw.clear_jtag_id();
        info!("OK:    Disconnected");
        result
    }
}
