use thiserror::Error;

/// modbus-tcp-server Error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// Value outside the range of a 16 bit register
    #[error("value {0} does not fit into 16 bits")]
    ValueOutOfRange(i32),
    /// Invalid MBAP header length
    #[error("invalid header length: {0}, expected 7")]
    HeaderLength(usize),
    /// Invalid register value length
    #[error("invalid value length: {0}, expected 2")]
    ValueLength(usize),
    /// Invalid buffer size
    #[error("invalid buffer size: {0}")]
    BufferSize(usize),
    /// Invalid exception code
    #[error("invalid exception code: 0x{0:0>2X}")]
    ExceptionCode(u8),
}
