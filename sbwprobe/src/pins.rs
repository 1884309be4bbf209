// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! sbwprobe - ESP32-C3 GPIO implementation of the SBW lines

use embassy_time::{Duration, Timer};
use esp_hal::delay::Delay;
use esp_hal::gpio::{
    DriveMode, DriveStrength, Flex, InputConfig, InputPin, Level, Output, OutputConfig, OutputPin,
    Pull,
};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use sbwprobe_sbw::SbwLines;

/// SBWTCK, SBWTDIO and the level translator's direction pin, driven from
/// ESP32-C3 GPIOs.
///
/// SBWTCK and SBWTDIO are both [`Flex`] pins so they can be handed back to
/// the target (as inputs) when a session ends.  The direction pin is a plain
/// [`Output`], low (target drives SBWTDIO) when idle.
pub struct EspSbwLines {
    tck: Flex<'static>,
    tdio: Flex<'static>,
    dir: Output<'static>,
    delay: Delay,
}

impl EspSbwLines {
    /// Create the SBW lines.  All are left released - SBWTCK and SBWTDIO as
    /// inputs without pulls, and the direction low.
    ///
    /// Arguments:
    /// - `tck_pin`: SBWTCK.
    /// - `tdio_pin`: SBWTDIO.
    /// - `dir_pin`: The level translator's SBWTDIO direction control.
    pub fn new(
        tck_pin: impl InputPin + OutputPin + 'static,
        tdio_pin: impl InputPin + OutputPin + 'static,
        dir_pin: impl OutputPin + 'static,
    ) -> Self {
        let input_config = InputConfig::default().with_pull(Pull::None);
        let output_config = OutputConfig::default()
            .with_drive_strength(DriveStrength::_20mA)
            .with_drive_mode(DriveMode::PushPull);

        let mut tck = Flex::new(tck_pin);
        tck.apply_input_config(&input_config);
        tck.apply_output_config(&output_config);
        tck.set_input_enable(true);

        let mut tdio = Flex::new(tdio_pin);
        tdio.apply_input_config(&input_config);
        tdio.apply_output_config(&output_config);
        tdio.set_input_enable(true);

        let dir = Output::new(dir_pin, Level::Low, output_config);

        debug!("SBW lines created, SBWTCK and SBWTDIO inputs without pull, DIR low");

        Self {
            tck,
            tdio,
            dir,
            delay: Delay::new(),
        }
    }
}

impl SbwLines for EspSbwLines {
    #[inline]
    fn set_tck(&mut self, high: bool) {
        if high {
            self.tck.set_high();
        } else {
            self.tck.set_low();
        }
    }

    #[inline]
    fn set_tdio(&mut self, high: bool) {
        if high {
            self.tdio.set_high();
        } else {
            self.tdio.set_low();
        }
    }

    #[inline]
    fn set_dir(&mut self, high: bool) {
        if high {
            self.dir.set_high();
        } else {
            self.dir.set_low();
        }
    }

    #[inline]
    fn tdio_output(&mut self) {
        self.tdio.set_input_enable(false);
        self.tdio.set_output_enable(true);
    }

    #[inline]
    fn tdio_input(&mut self) {
        self.tdio.set_output_enable(false);
        self.tdio.set_input_enable(true);
    }

    #[inline]
    fn tck_output(&mut self) {
        self.tck.set_input_enable(false);
        self.tck.set_output_enable(true);
    }

    #[inline]
    fn tck_input(&mut self) {
        self.tck.set_output_enable(false);
        self.tck.set_input_enable(true);
    }

    #[inline]
    fn read_tdio(&mut self) -> bool {
        self.tdio.is_high()
    }

    #[inline]
    fn delay_cycles(&mut self, cycles: u32) {
        riscv::asm::delay(cycles);
    }

    fn delay_us(&mut self, us: u32) {
        self.delay.delay_micros(us);
    }

    async fn sleep(&mut self, duration: Duration) {
        Timer::after(duration).await;
    }
}
