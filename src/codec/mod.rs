use crate::{error::Error, frame::*};
use byteorder::{BigEndian, ByteOrder};

type Result<T> = core::result::Result<T, Error>;

impl TryFrom<u8> for Exception {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        use crate::frame::Exception::*;
        let ex = match code {
            0x01 => IllegalFunction,
            0x02 => IllegalDataAddress,
            0x03 => IllegalDataValue,
            0x04 => ServerDeviceFailure,
            0x05 => Acknowledge,
            0x06 => ServerDeviceBusy,
            0x07 => NegativeAcknowledge,
            0x08 => MemoryParityError,
            0x0A => GatewayPathUnavailable,
            0x0B => GatewayTargetDevice,
            _ => {
                return Err(Error::ExceptionCode(code));
            }
        };
        Ok(ex)
    }
}

impl TryFrom<&[u8]> for Header {
    type Error = Error;

    /// Decode an MBAP header from exactly 7 bytes.
    fn try_from(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 7 {
            return Err(Error::HeaderLength(bytes.len()));
        }
        Ok(Header {
            transaction_id: BigEndian::read_u16(&bytes[0..2]),
            protocol_id: BigEndian::read_u16(&bytes[2..4]),
            length: BigEndian::read_u16(&bytes[4..6]),
            unit_id: bytes[6],
        })
    }
}

impl Header {
    /// Encode the header to its 7-byte wire form, the exact inverse of
    /// the decoding.
    #[must_use]
    pub fn encode(&self) -> [u8; 7] {
        let mut buf = [0; 7];
        BigEndian::write_u16(&mut buf[0..2], self.transaction_id);
        BigEndian::write_u16(&mut buf[2..4], self.protocol_id);
        BigEndian::write_u16(&mut buf[4..6], self.length);
        buf[6] = self.unit_id;
        buf
    }
}

impl TryFrom<&[u8]> for Request {
    type Error = Error;

    /// Decode a request from a buffer that has already been framed to the
    /// exact message length: 7 header bytes, the function code, and
    /// whatever payload remains.
    fn try_from(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 8 {
            return Err(Error::BufferSize(bytes.len()));
        }
        let hdr = Header::try_from(&bytes[0..7])?;
        Ok(Request {
            hdr,
            function: bytes[7],
            data: bytes[8..].to_vec(),
        })
    }
}

impl Response {
    /// Encode the response to its wire form.
    ///
    /// The one-byte count of the data length is only present when the
    /// response is neither an exception nor one of the echo-shaped write
    /// replies.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(9 + self.data.len());
        buf.extend_from_slice(&self.hdr.encode());
        buf.push(self.function);
        if !self.exception && !echo_shaped(self.function) {
            buf.push(self.data.len() as u8);
        }
        buf.extend_from_slice(&self.data);
        buf
    }
}
