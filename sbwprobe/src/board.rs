// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! sbwprobe - Board IO
//!
//! Target power, the programming level translator, bypass and the probe's
//! general purpose IOs.

use esp_hal::gpio::{AnyPin, Flex, InputConfig, Level, Output, OutputConfig, Pull};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use static_cell::make_static;

use sbwprobe_bin::{IoState, NUM_IO_PINS};
use sbwprobe_sbw::SbwError;
use sbwprobe_sbw::api::ProbeIo;
use sbwprobe_sbw::power::{EnableLine, SharedEnable};

/// An active high enable output
pub struct EnablePin(Output<'static>);

impl EnablePin {
    fn new(pin: AnyPin<'static>) -> Self {
        Self(Output::new(pin, Level::Low, OutputConfig::default()))
    }
}

impl EnableLine for EnablePin {
    fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            self.0.set_high();
        } else {
            self.0.set_low();
        }
    }
}

/// The probe's board IO.
///
/// Target power is shared between the host's POWER requests and SBW
/// sessions, so it stays on while either needs it.
pub struct Board {
    power: &'static SharedEnable<EnablePin>,
    translator: &'static SharedEnable<EnablePin>,
    bypass: Option<Output<'static>>,
    io: [Flex<'static>; NUM_IO_PINS as usize],

    // Whether the host has asked for target power
    host_power: bool,
}

impl Board {
    /// Create the board IO.  Everything starts off, and the probe IOs start
    /// as inputs.
    ///
    /// Must only be called once, as the shared enables are made static.
    pub fn new(
        power: AnyPin<'static>,
        translator: AnyPin<'static>,
        bypass: Option<AnyPin<'static>>,
        io: [AnyPin<'static>; NUM_IO_PINS as usize],
    ) -> Self {
        let power = make_static!(SharedEnable::new("power", EnablePin::new(power)));
        let translator = make_static!(SharedEnable::new(
            "translator",
            EnablePin::new(translator)
        ));
        let bypass = bypass.map(|pin| Output::new(pin, Level::Low, OutputConfig::default()));

        let input_config = InputConfig::default().with_pull(Pull::None);
        let io = io.map(|pin| {
            let mut pin = Flex::new(pin);
            pin.apply_input_config(&input_config);
            pin.set_input_enable(true);
            pin
        });

        Self {
            power,
            translator,
            bypass,
            io,
            host_power: false,
        }
    }

    fn io_pin(&mut self, pin: u8) -> Result<&mut Flex<'static>, SbwError> {
        self.io.get_mut(pin as usize).ok_or(SbwError::Api)
    }
}

impl ProbeIo for Board {
    fn programming_enable(&mut self) -> Result<(), SbwError> {
        self.power.acquire();
        self.translator.acquire();
        debug!("OK:    Programming enabled");
        Ok(())
    }

    fn programming_disable(&mut self) -> Result<(), SbwError> {
        let translator = self.translator.release();
        let power = self.power.release();
        debug!("OK:    Programming disabled");
        translator.and(power).map(|_| ())
    }

    fn target_power(&mut self, on: bool) -> Result<(), SbwError> {
        if on == self.host_power {
            return Ok(());
        }
        if on {
            self.power.acquire();
        } else {
            self.power.release()?;
        }
        self.host_power = on;
        info!(
            "Value: Target power {}",
            if self.power.is_enabled() { "on" } else { "off" }
        );
        Ok(())
    }

    fn bypass(&mut self, on: bool) -> Result<(), SbwError> {
        let pin = self.bypass.as_mut().ok_or(SbwError::Unsupported)?;
        if on {
            pin.set_high();
        } else {
            pin.set_low();
        }
        debug!("Value: Bypass {}", if on { "on" } else { "off" });
        Ok(())
    }

    fn io_set(&mut self, pin: u8, state: IoState) -> Result<(), SbwError> {
        let io = self.io_pin(pin)?;
        match state {
            IoState::OutputLow | IoState::OutputHigh => {
                if state == IoState::OutputHigh {
                    io.set_high();
                } else {
                    io.set_low();
                }
                io.set_output_enable(true);
            }
            IoState::Input => io.set_output_enable(false),
        }
        trace!("Value: IO {pin} {state:?}");
        Ok(())
    }

    fn io_get(&mut self, pin: u8) -> Result<bool, SbwError> {
        Ok(self.io_pin(pin)?.is_high())
    }
}
