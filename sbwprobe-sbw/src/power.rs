// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Shared Enable Lines
//!
//! Target power and the programming level translator are each controlled by
//! a single enable line, but may be wanted by more than one user at once -
//! for example the host turning target power on with POWER, while a session
//! also needs it.  [`SharedEnable`] reference counts its users, asserting
//! the line on the first acquire and de-asserting it only when the last user
//! releases it.
//!
//! `SharedEnable` can be held in a `static`, and used from any task.

use core::cell::RefCell;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::SbwError;

/// A single enable line, e.g. a GPIO driving a load switch
pub trait EnableLine {
    fn set_enabled(&mut self, enabled: bool);
}

#[derive(Debug)]
struct Shared<P> {
    line: P,
    users: u8,
}

/// Reference counted enable line
///
/// ```rust,ignore
/// static TARGET_POWER: SharedEnable<PowerPin> = SharedEnable::new("power", PowerPin::new());
///
/// TARGET_POWER.acquire();
/// ...
/// TARGET_POWER.release()?;
/// ```
pub struct SharedEnable<P: EnableLine> {
    name: &'static str,
    inner: Mutex<CriticalSectionRawMutex, RefCell<Shared<P>>>,
}

impl<P: EnableLine> SharedEnable<P> {
    /// Creates a shared enable line.  The line itself is not touched, and
    /// must start de-asserted.
    pub const fn new(name: &'static str, line: P) -> Self {
        Self {
            name,
            inner: Mutex::new(RefCell::new(Shared { line, users: 0 })),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Adds a user, asserting the line if it is the first.
    ///
    /// Returns:
    /// - `u8`: The number of users, including this one.
    pub fn acquire(&self) -> u8 {
        let users = self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            if inner.users == 0 {
                inner.line.set_enabled(true);
                debug!("OK:    {} enabled", self.name);
            }
            inner.users = inner.users.saturating_add(1);
            inner.users
        });
        trace!("Value: {} users {users}", self.name);
        users
    }

    /// Removes a user, de-asserting the line if it was the last.
    ///
    /// Returns:
    /// - `Ok(u8)`: The number of users remaining.
    /// - `Err(SbwError::NotAcquired)`: If there were no users.  The line is
    ///   left alone.
    pub fn release(&self) -> Result<u8, SbwError> {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            match inner.users {
                0 => {
                    warn!("Error: {} released without users", self.name);
                    Err(SbwError::NotAcquired)
                }
                1 => {
                    inner.users = 0;
                    inner.line.set_enabled(false);
                    debug!("OK:    {} disabled", self.name);
                    Ok(0)
                }
                _ => {
                    inner.users -= 1;
                    Ok(inner.users)
                }
            }
        })
    }

    pub fn users(&self) -> u8 {
        self.inner.lock(|inner| inner.borrow().users)
    }

    pub fn is_enabled(&self) -> bool {
        self.users() > 0
    }

    #[cfg(test)]
    fn with_line<R>(&self, f: impl FnOnce(&P) -> R) -> R {
        self.inner.lock(|inner| f(&inner.borrow().line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    #[derive(Default)]
    struct Line {
        changes: Vec<bool>,
    }

    impl EnableLine for Line {
        fn set_enabled(&mut self, enabled: bool) {
            self.changes.push(enabled);
        }
    }

    #[test]
    fn asserted_until_last_release() {
        let enable = SharedEnable::new("test", Line::default());
        assert!(!enable.is_enabled());

        assert_eq!(enable.acquire(), 1);
        assert_eq!(enable.acquire(), 2);
        assert_eq!(enable.with_line(|line| line.changes.clone()), vec![true]);

        assert_eq!(enable.release(), Ok(1));
        assert!(enable.is_enabled());
        assert_eq!(enable.release(), Ok(0));
        assert!(!enable.is_enabled());
        assert_eq!(
            enable.with_line(|line| line.changes.clone()),
            vec![true, false]
        );
    }

    #[test]
    fn release_without_acquire() {
        let enable = SharedEnable::new("test", Line::default());
        assert_eq!(enable.release(), Err(SbwError::NotAcquired));
        assert!(enable.with_line(|line| line.changes.is_empty()));

        enable.acquire();
        enable.release().unwrap();
        assert_eq!(enable.release(), Err(SbwError::NotAcquired));
        assert_eq!(enable.users(), 0);
    }

    #[test]
    fn usable_as_static() {
        struct Nothing;
        impl EnableLine for Nothing {
            fn set_enabled(&mut self, _enabled: bool) {}
        }
        static SHARED: SharedEnable<Nothing> = SharedEnable::new("static", Nothing);
        assert_eq!(SHARED.acquire(), 1);
        assert_eq!(SHARED.release(), Ok(0));
        assert_eq!(SHARED.name(), "static");
    }
}
