// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! sbwprobe is a USB debug probe for MSP430 targets, speaking TI's Spy-Bi-Wire.
//!
//! sbwprobe-bin - sbwprobe's host protocol shared server/client constants and
//! types
//!
//! Every request is a fixed 64 byte frame:
//!
//! | Offset | Size | Field |
//! |---|---|---|
//! | 0 | 1 | opcode |
//! | 1 | 1 | length (in 16-bit words) |
//! | 2 | 4 | address, little endian |
//! | 6 | 58 | 29 data words, little endian |
//!
//! Responses are a return code byte, optionally followed by a length byte
//! and that many little endian 16-bit words.
//!
//! This crate is `no_std` and platform agnostic.

#![no_std]

extern crate alloc;
use alloc::vec::Vec;
use core::fmt;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

/// Size of a request frame, in bytes
pub const REQUEST_FRAME_SIZE: usize = 64;

/// Size of the request header (opcode, length, address), in bytes
pub const REQUEST_HEADER_SIZE: usize = 6;

/// Maximum number of data words carried by a request
pub const MAX_REQUEST_WORDS: usize = (REQUEST_FRAME_SIZE - REQUEST_HEADER_SIZE) / 2;

/// Maximum number of data words carried by a response
pub const MAX_RESPONSE_WORDS: usize = 31;

/// Number of general purpose probe IO pins addressable with IOSET/IOGET
pub const NUM_IO_PINS: u32 = 4;

/// Request opcodes
pub const REQ_START: u8 = 0x00;
pub const REQ_STOP: u8 = 0x01;
pub const REQ_HALT: u8 = 0x02;
pub const REQ_RELEASE: u8 = 0x03;
pub const REQ_WRITE: u8 = 0x04;
pub const REQ_READ: u8 = 0x05;
pub const REQ_POWER: u8 = 0x06;
pub const REQ_IOSET: u8 = 0x07;
pub const REQ_IOGET: u8 = 0x08;
pub const REQ_BYPASS: u8 = 0x09;

/// Response return codes
pub const RC_OK: u8 = 0x00;
pub const RC_ERR_GENERIC: u8 = 0x01;
pub const RC_ERR_UNKNOWN_REQUEST: u8 = 0x02;
pub const RC_ERR_UNSUPPORTED: u8 = 0x03;

/// Request opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Start = REQ_START,
    Stop = REQ_STOP,
    Halt = REQ_HALT,
    Release = REQ_RELEASE,
    Write = REQ_WRITE,
    Read = REQ_READ,
    Power = REQ_POWER,
    IoSet = REQ_IOSET,
    IoGet = REQ_IOGET,
    Bypass = REQ_BYPASS,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Start => write!(f, "Start"),
            Command::Stop => write!(f, "Stop"),
            Command::Halt => write!(f, "Halt"),
            Command::Release => write!(f, "Release"),
            Command::Write => write!(f, "Write"),
            Command::Read => write!(f, "Read"),
            Command::Power => write!(f, "Power"),
            Command::IoSet => write!(f, "IO Set"),
            Command::IoGet => write!(f, "IO Get"),
            Command::Bypass => write!(f, "Bypass"),
        }
    }
}

impl Command {
    /// Converts a Command to its byte representation
    ///
    /// Returns:
    /// - `u8`: The byte representation of the command.
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Convert an opcode byte to a `Command` enum variant
    ///
    /// Arguments:
    /// - `cmd`: The opcode byte to convert.
    ///
    /// Returns:
    /// - `Ok(Command)`: If the opcode is recognized.
    /// - `Err(ProtocolError::Command)`: If the opcode is not recognized.
    pub fn from_byte(cmd: u8) -> Result<Self, ProtocolError> {
        match cmd {
            REQ_START => Ok(Self::Start),
            REQ_STOP => Ok(Self::Stop),
            REQ_HALT => Ok(Self::Halt),
            REQ_RELEASE => Ok(Self::Release),
            REQ_WRITE => Ok(Self::Write),
            REQ_READ => Ok(Self::Read),
            REQ_POWER => Ok(Self::Power),
            REQ_IOSET => Ok(Self::IoSet),
            REQ_IOGET => Ok(Self::IoGet),
            REQ_BYPASS => Ok(Self::Bypass),
            _ => Err(ProtocolError::Command(cmd)),
        }
    }
}

/// Response return codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReturnCode {
    Ok = RC_OK,
    Generic = RC_ERR_GENERIC,
    UnknownRequest = RC_ERR_UNKNOWN_REQUEST,
    Unsupported = RC_ERR_UNSUPPORTED,
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnCode::Ok => write!(f, "OK"),
            ReturnCode::Generic => write!(f, "Error"),
            ReturnCode::UnknownRequest => write!(f, "Unknown Request"),
            ReturnCode::Unsupported => write!(f, "Unsupported"),
        }
    }
}

impl ReturnCode {
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Convert a return code byte to a `ReturnCode`
    ///
    /// Returns:
    /// - `Ok(ReturnCode)`: If the byte is a known return code.
    /// - `Err(ProtocolError::Arg)`: Otherwise.
    pub fn from_byte(rc: u8) -> Result<Self, ProtocolError> {
        match rc {
            RC_OK => Ok(Self::Ok),
            RC_ERR_GENERIC => Ok(Self::Generic),
            RC_ERR_UNKNOWN_REQUEST => Ok(Self::UnknownRequest),
            RC_ERR_UNSUPPORTED => Ok(Self::Unsupported),
            _ => {
                debug!("Invalid return code: {rc}");
                Err(ProtocolError::Arg)
            }
        }
    }
}

/// Target power, or bypass, state requested by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SwitchState {
    Off = 0,
    On = 1,
}

impl SwitchState {
    /// Convert from a request data word
    ///
    /// Arguments:
    /// - `word`: The first data word of the request.
    ///
    /// Returns:
    /// - `Ok(SwitchState)`: If the word is 0 or 1.
    /// - `Err(ProtocolError::Arg)`: Otherwise.
    pub fn from_word(word: u16) -> Result<Self, ProtocolError> {
        match word {
            0 => Ok(SwitchState::Off),
            1 => Ok(SwitchState::On),
            _ => {
                debug!("Invalid switch state: {word}");
                Err(ProtocolError::Arg)
            }
        }
    }

    pub fn is_on(&self) -> bool {
        *self == SwitchState::On
    }
}

/// Requested state of a probe IO pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum IoState {
    OutputLow = 0,
    OutputHigh = 1,
    Input = 2,
}

impl IoState {
    /// Convert from a request data word
    ///
    /// Returns:
    /// - `Ok(IoState)`: If the word is 0, 1 or 2.
    /// - `Err(ProtocolError::Arg)`: Otherwise.
    pub fn from_word(word: u16) -> Result<Self, ProtocolError> {
        match word {
            0 => Ok(IoState::OutputLow),
            1 => Ok(IoState::OutputHigh),
            2 => Ok(IoState::Input),
            _ => {
                debug!("Invalid IO state: {word}");
                Err(ProtocolError::Arg)
            }
        }
    }
}

/// Type used to represent errors that can occur in sending or receiving
/// requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Unknown opcode received
    Command(u8),

    /// Invalid argument provided
    Arg,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Command(cmd) => write!(f, "Unknown opcode 0x{cmd:02X}"),
            ProtocolError::Arg => write!(f, "Invalid argument"),
        }
    }
}

/// Type used to represent errors that can occur in parsing received
/// requests.
#[derive(Debug)]
pub enum ParseError<T> {
    Transport(T),
    Protocol(ProtocolError),
}

impl<T> From<ProtocolError> for ParseError<T> {
    fn from(e: ProtocolError) -> Self {
        ParseError::Protocol(e)
    }
}

impl<T> ParseError<T> {
    fn transport(e: T) -> Self {
        ParseError::Transport(e)
    }
}

/// Async reader trait for reading data from a stream
pub trait AsyncReader {
    type Error;
    fn read_exact(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<(), Self::Error>>;
}

/// Async writer trait for writing data to a stream
pub trait AsyncWriter {
    type Error;
    fn write_all(&mut self, buf: &[u8]) -> impl Future<Output = Result<(), Self::Error>>;
}

/// Sync writer trait for writing data to a stream
pub trait SyncWriter {
    type Error;
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error>;
}

/// A decoded host request
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Op {
    Start,
    Stop,
    Halt,
    Release,
    Write { address: u32, data: Vec<u16> },
    Read { address: u32, count: u8 },
    Power { state: SwitchState },
    IoSet { pin: u8, state: IoState },
    IoGet { pin: u8 },
    Bypass { state: SwitchState },
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            match self {
                Op::Start => write!(f, "Start"),
                Op::Stop => write!(f, "Stop"),
                Op::Halt => write!(f, "Halt"),
                Op::Release => write!(f, "Release"),
                Op::Write { address, data } => {
                    write!(f, "Write(address=0x{address:05X}, data={data:04X?})")
                }
                Op::Read { address, count } => {
                    write!(f, "Read(address=0x{address:05X}, count={count})")
                }
                Op::Power { state } => write!(f, "Power(state={state:?})"),
                Op::IoSet { pin, state } => write!(f, "IoSet(pin={pin}, state={state:?})"),
                Op::IoGet { pin } => write!(f, "IoGet(pin={pin})"),
                Op::Bypass { state } => write!(f, "Bypass(state={state:?})"),
            }
        } else {
            write!(f, "{}", self.command())
        }
    }
}

// Public Op methods
impl Op {
    /// Returns the opcode for this request
    pub fn command(&self) -> Command {
        match self {
            Op::Start => Command::Start,
            Op::Stop => Command::Stop,
            Op::Halt => Command::Halt,
            Op::Release => Command::Release,
            Op::Write { .. } => Command::Write,
            Op::Read { .. } => Command::Read,
            Op::Power { .. } => Command::Power,
            Op::IoSet { .. } => Command::IoSet,
            Op::IoGet { .. } => Command::IoGet,
            Op::Bypass { .. } => Command::Bypass,
        }
    }

    /// Used by the sbwprobe firmware to receive a complete request from the
    /// host.
    ///
    /// Arguments:
    /// - `reader`: A mutable reference to a reader that implements the
    ///   `AsyncReader` trait
    ///
    /// Returns:
    /// - `Ok(Self)`: If the request was successfully parsed.
    /// - `Err(ParseError<R::Error>)`: If there was an error reading or
    ///   parsing the request.  A protocol error means a whole frame was
    ///   consumed, so the stream is still in sync.
    pub async fn async_recv<R: AsyncReader>(reader: &mut R) -> Result<Self, ParseError<R::Error>> {
        let mut frame = [0u8; REQUEST_FRAME_SIZE];
        reader
            .read_exact(&mut frame)
            .await
            .inspect_err(|_| debug!("Failed to read request frame"))
            .map_err(ParseError::transport)?;
        let op = Self::from_frame(&frame)?;
        trace!("Received request: {op:#}");
        Ok(op)
    }

    /// Decode a request frame
    ///
    /// Arguments:
    /// - `frame`: The received request frame.
    ///
    /// Returns:
    /// - `Ok(Self)`: If the frame holds a valid request.
    /// - `Err(ProtocolError::Command)`: If the opcode is not recognized.
    /// - `Err(ProtocolError::Arg)`: If the arguments are not valid for the
    ///   opcode.
    pub fn from_frame(frame: &[u8; REQUEST_FRAME_SIZE]) -> Result<Self, ProtocolError> {
        let command = Command::from_byte(frame[0])?;
        let length = frame[1] as usize;
        let address = u32::from_le_bytes([frame[2], frame[3], frame[4], frame[5]]);

        match command {
            Command::Start => Ok(Op::Start),
            Command::Stop => Ok(Op::Stop),
            Command::Halt => Ok(Op::Halt),
            Command::Release => Ok(Op::Release),
            Command::Write => {
                if length > MAX_REQUEST_WORDS {
                    debug!("Write length too large: {length}");
                    return Err(ProtocolError::Arg);
                }
                let data = (0..length).map(|ii| Self::data_word(frame, ii)).collect();
                Ok(Op::Write { address, data })
            }
            Command::Read => {
                if length > MAX_RESPONSE_WORDS {
                    debug!("Read length too large: {length}");
                    return Err(ProtocolError::Arg);
                }
                Ok(Op::Read {
                    address,
                    count: length as u8,
                })
            }
            Command::Power => {
                let state = SwitchState::from_word(Self::first_word(frame, length)?)?;
                Ok(Op::Power { state })
            }
            Command::IoSet => {
                let pin = Self::parse_pin(address)?;
                let state = IoState::from_word(Self::first_word(frame, length)?)?;
                Ok(Op::IoSet { pin, state })
            }
            Command::IoGet => {
                let pin = Self::parse_pin(address)?;
                Ok(Op::IoGet { pin })
            }
            Command::Bypass => {
                let state = SwitchState::from_word(Self::first_word(frame, length)?)?;
                Ok(Op::Bypass { state })
            }
        }
    }

    /// Encode this request as a frame, as a host would send it
    pub fn to_frame(&self) -> [u8; REQUEST_FRAME_SIZE] {
        let mut frame = [0u8; REQUEST_FRAME_SIZE];
        frame[0] = self.command().to_byte();

        let (address, words): (u32, &[u16]) = match self {
            Op::Write { address, data } => (*address, data.as_slice()),
            Op::Read { address, count } => {
                frame[1] = *count;
                (*address, &[])
            }
            Op::Power { state } | Op::Bypass { state } => {
                Self::set_word(&mut frame, 0, *state as u16);
                frame[1] = 1;
                (0, &[])
            }
            Op::IoSet { pin, state } => {
                Self::set_word(&mut frame, 0, *state as u16);
                frame[1] = 1;
                (*pin as u32, &[])
            }
            Op::IoGet { pin } => (*pin as u32, &[]),
            Op::Start | Op::Stop | Op::Halt | Op::Release => (0, &[]),
        };

        frame[2..6].copy_from_slice(&address.to_le_bytes());
        if !words.is_empty() {
            let count = words.len().min(MAX_REQUEST_WORDS);
            frame[1] = count as u8;
            for (ii, word) in words.iter().take(count).enumerate() {
                Self::set_word(&mut frame, ii, *word);
            }
        }

        frame
    }

    /// Used by a host to send a request to the probe.
    ///
    /// Arguments:
    /// - `writer`: A mutable reference to a writer that implements the
    ///   `SyncWriter` trait
    ///
    /// Returns:
    /// - `Ok(())`: If the request was successfully sent.
    /// - `Err(W::Error)`: If there was an error sending the request.
    pub fn sync_send<W: SyncWriter>(&self, writer: &mut W) -> Result<(), W::Error> {
        writer.write_all(&self.to_frame())
    }
}

// Internal Op methods
impl Op {
    fn data_word(frame: &[u8; REQUEST_FRAME_SIZE], index: usize) -> u16 {
        let offset = REQUEST_HEADER_SIZE + index * 2;
        u16::from_le_bytes([frame[offset], frame[offset + 1]])
    }

    fn set_word(frame: &mut [u8; REQUEST_FRAME_SIZE], index: usize, word: u16) {
        let offset = REQUEST_HEADER_SIZE + index * 2;
        frame[offset..offset + 2].copy_from_slice(&word.to_le_bytes());
    }

    fn first_word(frame: &[u8; REQUEST_FRAME_SIZE], length: usize) -> Result<u16, ProtocolError> {
        if length < 1 {
            debug!("Missing state word");
            return Err(ProtocolError::Arg);
        }
        Ok(Self::data_word(frame, 0))
    }

    fn parse_pin(address: u32) -> Result<u8, ProtocolError> {
        if address >= NUM_IO_PINS {
            debug!("Invalid IO pin: {address}");
            return Err(ProtocolError::Arg);
        }
        Ok(address as u8)
    }
}

/// A response to a host request
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Response {
    pub rc: ReturnCode,

    /// Data words to return.  `None` sends just the return code, `Some`
    /// sends a length byte and the words, even if there are none.
    pub data: Option<Vec<u16>>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            rc: ReturnCode::Ok,
            data: None,
        }
    }

    pub fn ok_with_data(data: Vec<u16>) -> Self {
        Self {
            rc: ReturnCode::Ok,
            data: Some(data),
        }
    }

    pub fn error(rc: ReturnCode) -> Self {
        Self { rc, data: None }
    }

    /// Serialize the response, truncated to its meaningful length
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(2 + MAX_RESPONSE_WORDS * 2);
        bytes.push(self.rc.to_byte());
        if let Some(data) = &self.data {
            let count = data.len().min(MAX_RESPONSE_WORDS);
            bytes.push(count as u8);
            for word in data.iter().take(count) {
                bytes.extend_from_slice(&word.to_le_bytes());
            }
        }
        bytes
    }

    /// Parse a response, as a host would receive it
    ///
    /// Returns:
    /// - `Ok(Response)`: If the bytes hold a complete response.
    /// - `Err(ProtocolError::Arg)`: If the return code is unknown or the
    ///   data is truncated.
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (&rc, rest) = bytes.split_first().ok_or(ProtocolError::Arg)?;
        let rc = ReturnCode::from_byte(rc)?;

        let Some((&count, rest)) = rest.split_first() else {
            return Ok(Self::error(rc));
        };
        let count = count as usize;
        if count > MAX_RESPONSE_WORDS || rest.len() < count * 2 {
            debug!("Truncated response: {count} words, {} bytes", rest.len());
            return Err(ProtocolError::Arg);
        }
        let data = rest
            .chunks_exact(2)
            .take(count)
            .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
            .collect();
        Ok(Self { rc, data: Some(data) })
    }

    /// Used by the sbwprobe firmware to send a response to the host.
    pub async fn async_send<W: AsyncWriter>(&self, writer: &mut W) -> Result<(), W::Error> {
        writer.write_all(&self.to_bytes()).await
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            Some(data) => write!(f, "{} {data:04X?}", self.rc),
            None => write!(f, "{}", self.rc),
        }
    }
}

impl From<&ProtocolError> for Response {
    fn from(e: &ProtocolError) -> Self {
        match e {
            ProtocolError::Command(_) => Response::error(ReturnCode::UnknownRequest),
            ProtocolError::Arg => Response::error(ReturnCode::Generic),
        }
    }
}
