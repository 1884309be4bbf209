// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! sbwprobe - Board configuration
//!
//! The pin table lives in [`board_pins!`].  Change it there to suit the
//! board sbwprobe is running on.  Keep clear of GPIO18/19 (the USB
//! serial-JTAG peripheral, which carries the host link) and GPIO20/21
//! (UART0, which carries the logs).

use esp_hal::gpio::AnyPin;

use sbwprobe_bin::NUM_IO_PINS;
use sbwprobe_sbw::Settings;

/// Heap size for the application.  Only request and response buffers use
/// it.
pub const HEAP_SIZE: usize = 32 * 1024;

/// Number of requests to the SBW worker that can be queued.  There's a
/// single host link, so only one is ever outstanding.
pub const REQUEST_CHANNEL_SIZE: usize = 1;
static_assertions::const_assert!(REQUEST_CHANNEL_SIZE > 0);

/// The probe's pins, taken from the HAL's peripherals by [`board_pins!`].
pub(crate) struct Pins {
    /// SBWTCK
    pub sbw_tck: AnyPin<'static>,

    /// SBWTDIO
    pub sbw_tdio: AnyPin<'static>,

    /// Level translator direction for SBWTDIO.  High when the probe drives
    /// it.
    pub sbw_dir: AnyPin<'static>,

    /// Target power enable, active high
    pub power: AnyPin<'static>,

    /// Programming level translator enable, active high
    pub translator: AnyPin<'static>,

    /// Bypass enable, if the board has one
    pub bypass: Option<AnyPin<'static>>,

    /// Probe GPIOs 0-3
    pub io: [AnyPin<'static>; NUM_IO_PINS as usize],
}

/// Takes the probe's pins from `esp_hal::init()`'s peripherals.  Other
/// peripherals remain available afterwards.
///
/// ```rust,ignore
/// let peripherals = esp_hal::init(hal_config);
/// let pins = config::board_pins!(peripherals);
/// let usb = peripherals.USB_DEVICE;
/// ```
macro_rules! board_pins {
    ($p:ident) => {
        $crate::config::Pins {
            sbw_tck: $p.GPIO4.into(),
            sbw_tdio: $p.GPIO5.into(),
            sbw_dir: $p.GPIO6.into(),
            power: $p.GPIO7.into(),
            translator: $p.GPIO10.into(),
            bypass: None,
            io: [
                $p.GPIO0.into(),
                $p.GPIO1.into(),
                $p.GPIO2.into(),
                $p.GPIO3.into(),
            ],
        }
    };
}
pub(crate) use board_pins;

/// The SBW settings used at startup
pub fn settings() -> Settings {
    Settings::default()
}
