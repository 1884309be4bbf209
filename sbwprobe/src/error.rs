// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! sbwprobe - Error types

use core::fmt;

/// Failures of the host link.  SBW failures are reported to the host in
/// the response, so never reach here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// A request frame couldn't be read
    Read,
    /// A response couldn't be written
    Write,
}

impl LinkError {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkError::Read => "link read error",
            LinkError::Write => "link write error",
        }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
