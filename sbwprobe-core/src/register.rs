// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! MSP430 JTAG Data Register Access Traits
//!
//! These are used to ensure strongly typed access to the data registers
//! selected by each JTAG instruction, using
//!
//! * `sbwprobe_sbw::tap::Tap::read_register`
//! * `sbwprobe_sbw::tap::Tap::write_register`
//!
//! Unless you are extending the device control support, it is unlikely that
//! you will need to use these traits directly.

use crate::jtag::{Instruction, ShiftFormat};

/// Base trait for all JTAG data register descriptors
pub trait RegisterDescriptor {
    /// The instruction which selects this data register
    const INSTRUCTION: Instruction;

    /// How many bits are shifted through the register per access
    const FORMAT: ShiftFormat;

    type Value;
}

/// Registers whose captured contents mean something
pub trait ReadableRegister: RegisterDescriptor {
    /// Convert raw shifted out data to register value
    fn from_raw(data: u32) -> Self::Value
    where
        Self::Value: From<u32>,
    {
        Self::Value::from(data)
    }
}

/// Registers that can be written
pub trait WritableRegister: RegisterDescriptor {
    /// Convert register value to raw data to shift in
    fn to_raw(value: Self::Value) -> u32
    where
        Self::Value: Into<u32>,
    {
        value.into()
    }
}

/// Generate a read-only register data type.  Data shifted out wider than the
/// inner type is truncated.
#[macro_export]
macro_rules! register_data_r {
    ($name:ident, $inner:ty, $digits:expr) => {
        impl From<$name> for u32 {
            fn from(value: $name) -> u32 {
                value.0 as u32
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                $name(value as $inner)
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "0x{:0width$X}", self.0, width = $digits)
            }
        }
    };
}

/// Generate a read-write register data type
#[macro_export]
macro_rules! register_data_rw {
    ($name:ident, $inner:ty, $digits:expr) => {
        $crate::register_data_r!($name, $inner, $digits);
    };
}

/// Generate a write-only register data type
#[macro_export]
macro_rules! register_data_w {
    ($name:ident, $inner:ty, $digits:expr) => {
        impl From<$name> for u32 {
            fn from(value: $name) -> u32 {
                value.0 as u32
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "0x{:0width$X}", self.0, width = $digits)
            }
        }
    };
}
