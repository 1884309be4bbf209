// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! MSP430 Spy-Bi-Wire Protocol Implementation
//!
//! This module implements the SBW wire protocol.  It provides the
//! `SbwProtocol` struct for low-level SBW operations, and the `SbwLines`
//! trait which abstracts the probe's physical lines.
//!
//! Each JTAG clock is sent as three SBW slots:
//!
//! ```text
//!             TMS slot      TDI slot      TDO slot
//! SBWTCK   ‾‾‾\_____/‾‾‾‾‾‾\_____/‾‾‾‾‾‾\_____/‾‾‾
//! SBWTDIO   <  TMS  >     <  TDI  >     < TDO (target) >
//! ```
//!
//! The target latches TMS and TDI on the falling edges, and drives TDO in
//! the third slot.  If SBWTCK is held low for more than ~7us the target
//! drops out of SBW mode, so every transition runs in a critical section.

use embassy_time::Duration;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::Settings;

#[doc(inline)]
pub use crate::interface::SbwInterface;
#[doc(inline)]
pub use crate::tap::Tap;

/// SBWTCK held low this long resets the target's SBW logic
const ENTRY_TCK_LOW: Duration = Duration::from_micros(800);

/// SBWTCK high after the reset
const ENTRY_TCK_HIGH: Duration = Duration::from_micros(50);

/// SBWTDIO (RST) and SBWTCK low before the entry pulse
const ENTRY_RST_LOW: Duration = Duration::from_millis(1);

/// Entry pulse phases, which must not be stretched
const ENTRY_PULSE_US: u32 = 5;

/// The probe's physical SBW lines.
///
/// Implemented by the sbwprobe firmware using GPIOs.  A direction line
/// switches an external level translator between the probe driving SBWTDIO
/// (high) and the target driving it (low).
///
/// `delay_cycles()` and `delay_us()` must busy wait, as they are called from
/// within critical sections.
pub trait SbwLines {
    fn set_tck(&mut self, high: bool);
    fn set_tdio(&mut self, high: bool);
    fn set_dir(&mut self, high: bool);
    fn tdio_output(&mut self);
    fn tdio_input(&mut self);
    fn tck_output(&mut self);
    fn tck_input(&mut self);
    fn read_tdio(&mut self) -> bool;
    fn delay_cycles(&mut self, cycles: u32);
    fn delay_us(&mut self, us: u32);

    /// Wait without blocking other tasks
    fn sleep(&mut self, duration: Duration) -> impl Future<Output = ()>;
}

/// A single JTAG clock, expressed as the TMS and TDI values sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    TmsLowTdiLow,
    TmsLowTdiHigh,
    TmsHighTdiLow,
    TmsHighTdiHigh,
}

impl Transition {
    pub const fn new(tms: bool, tdi: bool) -> Self {
        match (tms, tdi) {
            (false, false) => Transition::TmsLowTdiLow,
            (false, true) => Transition::TmsLowTdiHigh,
            (true, false) => Transition::TmsHighTdiLow,
            (true, true) => Transition::TmsHighTdiHigh,
        }
    }

    pub const fn tms(&self) -> bool {
        matches!(self, Transition::TmsHighTdiLow | Transition::TmsHighTdiHigh)
    }

    pub const fn tdi(&self) -> bool {
        matches!(self, Transition::TmsLowTdiHigh | Transition::TmsHighTdiHigh)
    }
}

/// SBW Protocol object
///
/// This is used by [`Tap`] to communicate with the target.  It owns the
/// probe's lines for as long as it exists, and mirrors the target's latched
/// TCLK, which determines how some slots must be sent.
///
/// ```rust,ignore
/// use sbwprobe_sbw::{SbwProtocol, Settings};
///
/// let lines = EspSbwLines::new(tck_pin, tdio_pin, dir_pin);
/// let sbw = SbwProtocol::new(lines, &Settings::default());
/// ```
#[derive(Debug)]
pub struct SbwProtocol<L: SbwLines> {
    lines: L,
    tclk: bool,
    delay: u32,
}

impl<L: SbwLines> SbwProtocol<L> {
    /// Create a new SBW protocol instance.  The lines are not touched until
    /// [`Self::connect()`].
    ///
    /// Arguments:
    /// - `lines`: The probe's SBW lines.
    /// - `settings`: Used for the clock delay.
    pub fn new(lines: L, settings: &Settings) -> Self {
        Self {
            lines,
            tclk: false,
            delay: settings.clock_delay_cycles,
        }
    }

    /// The last TCLK value sent to the target
    pub fn tclk(&self) -> bool {
        self.tclk
    }

    pub fn lines(&self) -> &L {
        &self.lines
    }

    pub fn lines_mut(&mut self) -> &mut L {
        &mut self.lines
    }

    /// Start driving the lines.  Leaves SBWTCK and SBWTDIO high.
    pub fn connect(&mut self) {
        self.lines.set_dir(true);
        self.lines.set_tdio(true);
        self.lines.tdio_output();
        self.lines.set_tck(true);
        self.lines.tck_output();
        self.tclk = false;
        debug!("SBW lines driven");
    }

    /// Stop driving the lines, leaving them as inputs.
    pub fn disconnect(&mut self) {
        self.lines.set_dir(false);
        self.lines.tdio_input();
        self.lines.tck_input();
        self.tclk = false;
        debug!("SBW lines released");
    }

    /// Send a single JTAG clock, ignoring TDO.
    pub fn transition(&mut self, transition: Transition) {
        critical_section::with(|_| {
            self.tms_slot(transition.tms());
            self.tdi_slot(transition.tdi());
            self.tdo_slot(false);
        });
    }

    /// Send a single JTAG clock, returning TDO.
    pub fn transition_read(&mut self, transition: Transition) -> bool {
        critical_section::with(|_| {
            self.tms_slot(transition.tms());
            self.tdi_slot(transition.tdi());
            self.tdo_slot(true)
        })
    }

    /// Raise TCLK.  Only meaningful in Run-Test/Idle.
    pub fn set_tclk(&mut self) {
        self.drive_tclk(true);
    }

    /// Lower TCLK.  Only meaningful in Run-Test/Idle.
    pub fn clear_tclk(&mut self) {
        self.drive_tclk(false);
    }

    // TCLK is latched from TDIO while SBWTCK is high, so if it is currently
    // high TDIO has to go high again before SBWTCK rises at the end of the
    // TMS slot, or TCLK would glitch low.
    fn drive_tclk(&mut self, tclk: bool) {
        critical_section::with(|_| {
            if self.tclk {
                self.tmsldh_slot();
            } else {
                self.tms_slot(false);
            }
            self.tdi_slot(tclk);
            self.tdo_slot(false);
            self.tclk = tclk;
        });
    }

    #[inline]
    fn delay(&mut self) {
        self.lines.delay_cycles(self.delay);
    }

    #[inline]
    fn tms_slot(&mut self, tms: bool) {
        self.lines.set_tdio(tms);
        self.delay();
        self.lines.set_tck(false);
        self.delay();
        self.lines.set_tck(true);
    }

    #[inline]
    fn tmsldh_slot(&mut self) {
        self.lines.set_tdio(false);
        self.delay();
        self.lines.set_tck(false);
        self.delay();
        self.lines.set_tdio(true);
        self.lines.set_tck(true);
    }

    #[inline]
    fn tdi_slot(&mut self, tdi: bool) {
        self.lines.set_tdio(tdi);
        self.delay();
        self.lines.set_tck(false);
        self.delay();
        self.lines.set_tck(true);
    }

    // Hands SBWTDIO to the target for the slot, then takes it back.  The
    // bit is sampled while SBWTCK is low, as the target stops driving it
    // once SBWTCK rises.
    #[inline]
    fn tdo_slot(&mut self, read: bool) -> bool {
        self.lines.set_dir(false);
        self.lines.tdio_input();
        self.delay();
        self.lines.set_tck(false);
        self.delay();
        let bit = if read {
            let bit = self.lines.read_tdio();
            self.delay();
            bit
        } else {
            false
        };
        self.lines.set_tck(true);
        self.lines.set_tdio(true);
        self.lines.set_dir(true);
        self.lines.tdio_output();
        self.delay();
        bit
    }

    /// Sequence which puts the target into SBW mode, leaving SBWTCK high.
    /// The lines must already be driven with [`Self::connect()`].
    pub(crate) async fn entry_sequence(&mut self) {
        trace!("Exec:  SBW entry sequence");
        self.lines.set_tck(false);
        self.lines.sleep(ENTRY_TCK_LOW).await;
        self.lines.set_tck(true);
        self.lines.sleep(ENTRY_TCK_HIGH).await;

        self.lines.set_tdio(false);
        self.lines.set_tck(false);
        self.lines.sleep(ENTRY_RST_LOW).await;

        // SBWTCK low must not be stretched here, or the target leaves SBW
        // mode again
        critical_section::with(|_| {
            self.lines.set_tdio(true);
            self.lines.delay_us(ENTRY_PULSE_US);
            self.lines.set_tck(true);
            self.lines.delay_us(ENTRY_PULSE_US);
            self.lines.set_tck(false);
            self.lines.delay_us(ENTRY_PULSE_US);
            self.lines.set_tck(true);
            self.lines.delay_us(ENTRY_PULSE_US);
        });
    }

    /// Wait without blocking other tasks
    pub async fn sleep(&mut self, duration: Duration) {
        self.lines.sleep(duration).await;
    }

    /// Busy wait
    pub fn delay_us(&mut self, us: u32) {
        self.lines.delay_us(us);
    }
}
