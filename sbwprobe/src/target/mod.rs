// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! sbwprobe - SBW worker
//!
//! The worker task owns the SBW stack, via [`Api`], and handles requests
//! from the host link one at a time.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_sync::signal::Signal;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use static_cell::make_static;

use sbwprobe_bin::{Op, Response};
use sbwprobe_sbw::api::Api;
use sbwprobe_sbw::{DebugInterface, Settings};

use crate::board::Board;
use crate::config::REQUEST_CHANNEL_SIZE;
use crate::pins::EspSbwLines;

/// A request sent to the Target to get it to perform an operation
pub struct Request {
    pub op: Op,
    pub response_signal: &'static Signal<CriticalSectionRawMutex, Response>,
}

pub type RequestSender = Sender<'static, CriticalSectionRawMutex, Request, REQUEST_CHANNEL_SIZE>;
type RequestReceiver = Receiver<'static, CriticalSectionRawMutex, Request, REQUEST_CHANNEL_SIZE>;

/// The SBW target, and the queue of requests for it
pub struct Target {
    api: Api<EspSbwLines, Board>,
    request_receiver: RequestReceiver,
    request_sender: RequestSender,
}

impl Target {
    /// Create the Target.  Must only be called once, as the request channel
    /// is made static.
    pub fn new(lines: EspSbwLines, board: Board, settings: &Settings) -> Self {
        let channel = make_static!(Channel::new());
        let api = Api::new(DebugInterface::from_lines(lines, settings), board);
        Self {
            api,
            request_receiver: channel.receiver(),
            request_sender: channel.sender(),
        }
    }

    /// Get the sender used to queue requests for this Target.
    pub fn request_sender(&self) -> RequestSender {
        self.request_sender
    }

    async fn handle_request(&mut self, request: Request) {
        let response = self.api.handle(request.op).await;
        request.response_signal.signal(response);
    }
}

/// Task to run SBW operations
#[embassy_executor::task]
pub async fn task(target: &'static mut Target) -> ! {
    info!("Exec:  Target task started");
    loop {
        let request = target.request_receiver.receive().await;
        target.handle_request(request).await;
    }
}
