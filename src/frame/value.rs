// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::error::Error;
use byteorder::{BigEndian, ByteOrder};

/// Interpretation of the 2-byte wire form of a register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signedness {
    /// Signed 16 bit (`-32768..=32767`)
    Signed,
    /// Unsigned 16 bit (`0..=65535`)
    Unsigned,
}

/// A single coil or register datum.
///
/// A [`Value`] holds an integer ranging from `-32768` through `65535`,
/// i.e. anything that fits into 16 bits, signed or unsigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Value {
    value: i32,
}

impl Value {
    /// Smallest representable value.
    pub const MIN: i32 = i16::MIN as i32;
    /// Largest representable value.
    pub const MAX: i32 = u16::MAX as i32;

    /// Create a new [`Value`].
    ///
    /// Fails with [`Error::ValueOutOfRange`] if `value` lies outside
    /// `-32768..=65535`.
    pub fn new(value: i32) -> Result<Self, Error> {
        let mut v = Value { value: 0 };
        v.set(value)?;
        Ok(v)
    }

    /// Replace the stored value, applying the same range check as
    /// [`Value::new`].
    pub fn set(&mut self, value: i32) -> Result<(), Error> {
        if value < Self::MIN || value > Self::MAX {
            return Err(Error::ValueOutOfRange(value));
        }
        self.value = value;
        Ok(())
    }

    /// Get the stored value.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.value
    }

    /// Big-endian wire form, always 2 bytes.
    ///
    /// Negative values serialize as a two's-complement 16 bit pattern,
    /// non-negative values as an unsigned one.
    #[must_use]
    pub fn to_be_bytes(self) -> [u8; 2] {
        let mut buf = [0; 2];
        if self.value < 0 {
            BigEndian::write_i16(&mut buf, self.value as i16);
        } else {
            BigEndian::write_u16(&mut buf, self.value as u16);
        }
        buf
    }

    /// Decode a value from its 2-byte big-endian wire form.
    ///
    /// Fails with [`Error::ValueLength`] unless `bytes` is exactly 2 bytes
    /// long. The same bit pattern yields a different value depending on
    /// `signedness`.
    pub fn from_be_bytes(bytes: &[u8], signedness: Signedness) -> Result<Self, Error> {
        if bytes.len() != 2 {
            return Err(Error::ValueLength(bytes.len()));
        }
        let value = match signedness {
            Signedness::Signed => i32::from(BigEndian::read_i16(bytes)),
            Signedness::Unsigned => i32::from(BigEndian::read_u16(bytes)),
        };
        Ok(Value { value })
    }
}
