// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! sbwprobe - MSP430 Spy-Bi-Wire probe firmware
//!
//! Receives requests from the host over the ESP32-C3's USB serial-JTAG
//! peripheral, and carries them out on the target over Spy-Bi-Wire.  Logs
//! are output on UART0.  Set `ESP_LOG` when building to change the log
//! level.
//!
//! To change other configuration, see `config.rs`:
//! - `board_pins!` holds the pin assignments.
//! - `HEAP_SIZE` is the size of the heap used by the application.
//! - `REQUEST_CHANNEL_SIZE` is the number of requests that can be queued for
//!   the SBW worker.
//! - `settings()` returns the SBW settings, including the SBWTCK speed and
//!   the various retry and poll limits.

#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![feature(type_alias_impl_trait)]
#![feature(impl_trait_in_assoc_type)]

extern crate alloc;
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_alloc as _;
use esp_backtrace as _;
use esp_hal::usb_serial_jtag::UsbSerialJtag;
use esp_hal::{clock::CpuClock, timer::timg::TimerGroup};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use static_cell::make_static;

mod board;
mod config;
mod error;
mod link;
mod pins;
mod target;

use board::Board;
use config::HEAP_SIZE;
use pins::EspSbwLines;

include!(concat!(env!("OUT_DIR"), "/built.rs"));
pub const SBWPROBE_BUILD_TIME: &str = env!("SBWPROBE_BUILD_TIME");
pub const SBWPROBE_BUILD_DATE: &str = env!("SBWPROBE_BUILD_DATE");
pub const AUTHOR: &str = "Piers Finlayson";
pub const AUTHOR_EMAIL: &str = "piers@piers.rocks";

// Creates app-descriptor required by the esp-idf bootloader, with our build
// time and date rather than esp-bootloader-esp-idf's.
esp_bootloader_esp_idf::esp_app_desc!(
    PKG_VERSION,
    PKG_NAME,
    SBWPROBE_BUILD_TIME,
    SBWPROBE_BUILD_DATE,
    esp_bootloader_esp_idf::ESP_IDF_COMPATIBLE_VERSION,
    esp_bootloader_esp_idf::MMU_PAGE_SIZE,
    0,
    u16::MAX
);

// How often main logs that it's still alive
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

// sbwprobe firmware's main function:
// - Set up the HAL, heap and embassy
// - Take the pins, and create the SBW lines and board IO
// - Start the SBW worker (`Target`) task
// - Start the host link task
// - Loop forever to prevent main from exiting.
#[esp_hal_embassy::main]
async fn main(spawner: Spawner) -> ! {
    // Set up the logger
    esp_println::logger::init_logger_from_env();

    info!("*** {PKG_NAME} v{PKG_VERSION} ***");
    info!("Value: Built {SBWPROBE_BUILD_DATE} {SBWPROBE_BUILD_TIME}");
    debug!("Value: {AUTHOR} <{AUTHOR_EMAIL}>");

    // Set up the HAL
    let hal_config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(hal_config);

    let clocks = esp_hal::clock::Clocks::get();
    info!(
        "Value: {} running at {}MHz",
        esp_hal::chip!(),
        clocks.cpu_clock.as_mhz()
    );

    // Set up the heap allocator
    esp_alloc::heap_allocator!(size: HEAP_SIZE);

    // Initialize embassy
    let timg1 = TimerGroup::new(peripherals.TIMG1);
    esp_hal_embassy::init(timg1.timer0);

    // Set up the SBW lines and board IO, and start the SBW worker
    let pins = config::board_pins!(peripherals);
    let settings = config::settings();
    let lines = EspSbwLines::new(pins.sbw_tck, pins.sbw_tdio, pins.sbw_dir);
    let board = Board::new(pins.power, pins.translator, pins.bypass, pins.io);
    let target = target::Target::new(lines, board, &settings);

    // Get the sender to send requests to the Target task
    let target_request_sender = target.request_sender();
    let target = make_static!(target);
    spawner.must_spawn(target::task(target));

    // Start the host link
    let usb = UsbSerialJtag::new(peripherals.USB_DEVICE).into_async();
    spawner.must_spawn(link::task(usb, target_request_sender));

    loop {
        Timer::after(HEARTBEAT_INTERVAL).await;
        trace!("Note:  Up {}s", embassy_time::Instant::now().as_secs());
    }
}
