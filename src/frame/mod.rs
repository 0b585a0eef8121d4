// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;

mod value;

pub use self::value::*;
use thiserror::Error;

/// A Modbus function code supported by this server.
///
/// It is represented by an unsigned 8 bit integer on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCode {
    /// Modbus Function Code: `01` (`0x01`).
    ReadCoils,

    /// Modbus Function Code: `02` (`0x02`).
    ReadDiscreteInputs,

    /// Modbus Function Code: `03` (`0x03`).
    ReadHoldingRegisters,

    /// Modbus Function Code: `04` (`0x04`).
    ReadInputRegisters,

    /// Modbus Function Code: `05` (`0x05`).
    WriteSingleCoil,

    /// Modbus Function Code: `06` (`0x06`).
    WriteSingleRegister,

    /// Modbus Function Code: `16` (`0x10`).
    WriteMultipleRegisters,
}

impl FunctionCode {
    /// Create a new [`FunctionCode`] from its wire value.
    ///
    /// Returns `None` for any code this server does not implement.
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        let code = match value {
            0x01 => Self::ReadCoils,
            0x02 => Self::ReadDiscreteInputs,
            0x03 => Self::ReadHoldingRegisters,
            0x04 => Self::ReadInputRegisters,
            0x05 => Self::WriteSingleCoil,
            0x06 => Self::WriteSingleRegister,
            0x10 => Self::WriteMultipleRegisters,
            _ => return None,
        };
        Some(code)
    }

    /// Get the [`u8`] value of the current [`FunctionCode`].
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::ReadCoils => 0x01,
            Self::ReadDiscreteInputs => 0x02,
            Self::ReadHoldingRegisters => 0x03,
            Self::ReadInputRegisters => 0x04,
            Self::WriteSingleCoil => 0x05,
            Self::WriteSingleRegister => 0x06,
            Self::WriteMultipleRegisters => 0x10,
        }
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value().fmt(f)
    }
}

/// A server (slave) exception.
///
/// Implements [`std::error::Error`] so that business callbacks can return
/// it to select the exception code of the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Exception {
    #[error("Illegal function")]
    IllegalFunction = 0x01,
    #[error("Illegal data address")]
    IllegalDataAddress = 0x02,
    #[error("Illegal data value")]
    IllegalDataValue = 0x03,
    #[error("Server device failure")]
    ServerDeviceFailure = 0x04,
    #[error("Acknowledge")]
    Acknowledge = 0x05,
    #[error("Server device busy")]
    ServerDeviceBusy = 0x06,
    #[error("Negative acknowledge")]
    NegativeAcknowledge = 0x07,
    #[error("Memory parity error")]
    MemoryParityError = 0x08,
    #[error("Gateway path unavailable")]
    GatewayPathUnavailable = 0x0A,
    #[error("Gateway target device failed to respond")]
    GatewayTargetDevice = 0x0B,
}

impl Exception {
    /// The wire value of the exception code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// The MBAP header preceding every Modbus TCP message.
///
/// The header has 4 fields with a total wire length of 7 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Identifies a request/response transaction.
    pub transaction_id: u16,
    /// Always 0 for Modbus.
    pub protocol_id: u16,
    /// Number of bytes following the length field.
    pub length: u16,
    /// Identifies a slave behind the TCP endpoint.
    pub unit_id: u8,
}

/// A Modbus request.
///
/// Requests are only built by decoding a pre-framed byte buffer via
/// `Request::try_from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub hdr: Header,
    /// The raw function code as received. Unknown codes are kept so that
    /// the exception reply can echo them.
    pub function: u8,
    /// The payload following the function code.
    pub data: Vec<u8>,
}

/// A Modbus response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub hdr: Header,
    pub function: u8,
    pub data: Vec<u8>,
    pub(crate) exception: bool,
}

/// Write responses echo request bytes and carry no byte-count field.
///
/// Per the Modbus application protocol this covers both single-write
/// replies and the address + quantity reply of WriteMultipleRegisters.
pub(crate) const fn echo_shaped(function: u8) -> bool {
    matches!(
        FunctionCode::new(function),
        Some(
            FunctionCode::WriteSingleCoil
                | FunctionCode::WriteSingleRegister
                | FunctionCode::WriteMultipleRegisters
        )
    )
}

impl Response {
    /// Create a success response for a request.
    ///
    /// The header length is recomputed from `data`: the byte-counted
    /// read shape needs `data + 3` bytes after the length field, the
    /// echo-shaped write replies `data + 2`.
    #[must_use]
    pub fn new(req: &Request, data: Vec<u8>) -> Self {
        let mut hdr = req.hdr;
        hdr.length = if echo_shaped(req.function) {
            data.len() as u16 + 2
        } else {
            data.len() as u16 + 3
        };
        Response {
            hdr,
            function: req.function,
            data,
            exception: false,
        }
    }

    /// Create an exception response for a request.
    ///
    /// The reply echoes the request's function code with the high bit set
    /// and carries the exception code as its single data byte.
    #[must_use]
    pub fn exception(req: &Request, exception: Exception) -> Self {
        let mut hdr = req.hdr;
        hdr.length = 3;
        Response {
            hdr,
            function: req.function | 0x80,
            data: vec![exception.code()],
            exception: true,
        }
    }

    /// `true` if this is an exception response.
    #[must_use]
    pub const fn is_exception(&self) -> bool {
        self.exception
    }
}
