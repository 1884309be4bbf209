// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! sbwprobe - Host link
//!
//! The host sends fixed size request frames over the USB serial-JTAG
//! peripheral.  Each is decoded and queued for the SBW worker, and the
//! worker's response written back.  Frames which can't be decoded are
//! answered here, without involving the worker.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embedded_io_async::{Read, Write};
use esp_hal::Async;
use esp_hal::usb_serial_jtag::{UsbSerialJtag, UsbSerialJtagRx, UsbSerialJtagTx};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use static_cell::make_static;

use sbwprobe_bin::{AsyncReader, AsyncWriter, Op, ParseError, Response};
use sbwprobe_sbw::api::error_response;

use crate::error::LinkError;
use crate::target::{Request, RequestSender};

struct LinkReader(UsbSerialJtagRx<'static, Async>);

impl AsyncReader for LinkReader {
    type Error = LinkError;

    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        Read::read_exact(&mut self.0, buf)
            .await
            .map_err(|_| LinkError::Read)
    }
}

struct LinkWriter(UsbSerialJtagTx<'static, Async>);

impl AsyncWriter for LinkWriter {
    type Error = LinkError;

    async fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        Write::write_all(&mut self.0, buf)
            .await
            .map_err(|_| LinkError::Write)?;
        Write::flush(&mut self.0)
            .await
            .map_err(|_| LinkError::Write)
    }
}

/// Task serving the host link
#[embassy_executor::task]
pub async fn task(usb: UsbSerialJtag<'static, Async>, sender: RequestSender) -> ! {
    let (rx, tx) = usb.split();
    let mut reader = LinkReader(rx);
    let mut writer = LinkWriter(tx);
    let response_signal = make_static!(Signal::new());

    info!("Exec:  Host link started");
    loop {
        if let Err(e) = serve(&mut reader, &mut writer, sender, response_signal).await {
            warn!("Error: Host link {e}");
        }
    }
}

// Handles a single request frame
async fn serve(
    reader: &mut LinkReader,
    writer: &mut LinkWriter,
    sender: RequestSender,
    response_signal: &'static Signal<CriticalSectionRawMutex, Response>,
) -> Result<(), LinkError> {
    let response = match Op::async_recv(reader).await {
        Ok(op) => {
            response_signal.reset();
            sender.send(Request { op, response_signal }).await;
            response_signal.wait().await
        }
        Err(ParseError::Protocol(e)) => error_response(&e),
        Err(ParseError::Transport(e)) => return Err(e),
    };
    response.async_send(writer).await?;
    Ok(())
}
