// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! sbwprobe-sbw library
//!
//! MSP430 Spy-Bi-Wire (SBW) implementation.
//!
//! Spy-Bi-Wire carries a 4-wire JTAG interface (TMS, TDI, TDO, TCK) over two
//! lines - SBWTCK and SBWTDIO - by time multiplexing TMS, TDI and TDO into
//! three slots per JTAG clock.  This library bit-bangs it.
//!
//! It is `no_std` and hardware agnostic.  The probe's lines are driven
//! through the [`SbwLines`] trait, which the sbwprobe firmware implements
//! using `esp-hal` GPIOs, and the integration tests implement with a
//! simulated target.  It requires an `alloc` implementation.
//!
//! The following diagram shows the key `sbwprobe-sbw` concepts.
//!
//! ```text
//!   sbwprobe firmware    |  api::Api  ==  USB  ==   Host tool
//! ----------------------
//!     DebugInterface      \
//! ----------------------   \
//!      SbwInterface         \
//! ----------------------     |--  SbwError
//!          Tap              /
//! ----------------------   /
//!      SbwProtocol        /                         e.g. MSP430FR5969
//! ----------------------                            -----------------
//!    SbwLines (GPIOs)    >======================<      SBW Target
//!                           SBWTCK/SBWTDIO/GND
//! ```
//!
//! * [`DebugInterface`] handles connecting to, synchronizing with and
//!   disconnecting from the target.
//! * [`SbwInterface`] provides device control - memory access, reset, halt,
//!   release, register set and the JTAG mailbox.
//! * [`Tap`] drives the target's JTAG TAP controller, shifting instructions
//!   and data.
//! * [`SbwProtocol`] implements the SBW wire protocol.
//!
//! Also included is the host request handler [`api::Api`], and
//! [`power::SharedEnable`] used to share enable lines between users.
//!
//! `sbwprobe-sbw` uses the [`sbwprobe_core`] library for the MSP430 JTAG
//! definitions, and [`sbwprobe_bin`] for the host protocol.

#![no_std]

pub mod api;
pub mod debug;
pub mod interface;
pub mod power;
pub mod protocol;
pub mod tap;

#[cfg(test)]
pub(crate) mod mock;

#[doc(inline)]
pub use crate::debug::DebugInterface;
#[doc(inline)]
pub use crate::interface::SbwInterface;
#[doc(inline)]
pub use crate::protocol::{SbwLines, SbwProtocol};
#[doc(inline)]
pub use crate::tap::Tap;

extern crate alloc;
use core::fmt;

use sbwprobe_bin::ReturnCode;

/// Core error type used by all sbwprobe-sbw objects
///
/// Methods are provided to make it easier to handle errors, by checking if
/// either a retry or reset is required:
///
/// - [`SbwError::requires_retry()`]
/// - [`SbwError::requires_reset()`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SbwError {
    /// The target's JTAG ID was not one sbwprobe supports, after all connect
    /// attempts.  The last ID read is included.  0xFF usually means there is
    /// no target, or it isn't powered.
    UnknownDevice(u8),

    /// The target's JTAG access is protected.
    Locked,

    /// The target returned a zero CoreIP ID.
    NoCoreIp,

    /// The CPU was not idle under JTAG control when an operation required it.
    /// The control signal register value captured is included.
    NotIdle(u16),

    /// The CPU did not synchronize with TCLK.
    SyncTimeout,

    /// The target did not make the JTAG mailbox ready in time.  The target's
    /// code may just be busy, so this can be retried.
    MailboxTimeout,

    /// A TAP operation was requested from a TAP state where it would send
    /// the wrong sequence.  Indicates the TAP is out of step with the
    /// target, and the session must be restarted.
    TapSequence,

    /// An operation requiring a connected target was requested without one.
    NotConnected,

    /// A session was started while one was already active.
    SessionActive,

    /// The host sent an unknown opcode.
    UnknownRequest(u8),

    /// The API was called incorrectly, or with invalid arguments.
    Api,

    /// A shared enable line was released more times than acquired.
    NotAcquired,

    /// The requested operation is not supported.
    Unsupported,
}

impl SbwError {
    /// Returns true if the error requires the session to be torn down (STOP)
    /// and restarted (START) to recover.
    pub fn requires_reset(&self) -> bool {
        matches!(
            self,
            SbwError::UnknownDevice(_)
                | SbwError::Locked
                | SbwError::NoCoreIp
                | SbwError::NotIdle(_)
                | SbwError::SyncTimeout
                | SbwError::TapSequence
        )
    }

    /// Returns true if the error is a transient error that can be retried.
    pub fn requires_retry(&self) -> bool {
        matches!(self, SbwError::MailboxTimeout)
    }

    /// Returns true if the error requires neither a reset nor a retry.
    /// Normally this means the API has been used incorrectly.
    pub fn requires_other(&self) -> bool {
        !self.requires_reset() && !self.requires_retry()
    }

    /// The return code reported to the host for this error
    pub fn return_code(&self) -> ReturnCode {
        match self {
            SbwError::UnknownRequest(_) => ReturnCode::UnknownRequest,
            SbwError::Unsupported => ReturnCode::Unsupported,
            _ => ReturnCode::Generic,
        }
    }
}

impl SbwError {
    /// Returns a string representation of the error.
    pub fn as_str(&self) -> &'static str {
        match self {
            SbwError::UnknownDevice(_) => "Unknown Device",
            SbwError::Locked => "Device Locked",
            SbwError::NoCoreIp => "No CoreIP ID",
            SbwError::NotIdle(_) => "CPU Not Idle",
            SbwError::SyncTimeout => "Sync Timeout",
            SbwError::MailboxTimeout => "Mailbox Timeout",
            SbwError::TapSequence => "TAP Sequence Error",
            SbwError::NotConnected => "Not Connected",
            SbwError::SessionActive => "Session Active",
            SbwError::UnknownRequest(_) => "Unknown Request",
            SbwError::Api => "API Error",
            SbwError::NotAcquired => "Not Acquired",
            SbwError::Unsupported => "Unsupported Operation",
        }
    }
}

impl fmt::Display for SbwError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SbwError::UnknownDevice(id) => write!(f, "{}: 0x{id:02X}", self.as_str()),
            SbwError::NotIdle(value) => write!(f, "{}: 0x{value:04X}", self.as_str()),
            SbwError::UnknownRequest(cmd) => write!(f, "{}: 0x{cmd:02X}", self.as_str()),
            _ => write!(f, "{}", self.as_str()),
        }
    }
}

/// Settings used by the SBW stack.  Set once, at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// CPU cycles between SBW edges.  250 gives a roughly 500kHz SBWTCK on
    /// a 160MHz ESP32-C3, once GPIO overheads are included.
    pub clock_delay_cycles: u32,

    /// Attempts at entering SBW mode and reading a supported JTAG ID
    pub connect_attempts: u32,

    /// Polls for the CPU synchronizing with TCLK
    pub sync_polls: u32,

    /// Polls for the JTAG mailbox becoming ready
    pub mailbox_polls: u32,

    /// Attempts at detecting JTAG protection
    pub lock_checks: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            clock_delay_cycles: 250,
            connect_attempts: 5,
            sync_polls: 50,
            mailbox_polls: 3000,
            lock_checks: 3,
        }
    }
}
