use std::io;
use thiserror::Error;

/// The primary error type for the `iflo` library.
#[derive(Error, Debug)]
pub enum PumpError {
    #[error("no frame preamble found in {0} bytes")]
    NoPreamble(usize),

    #[error("checksum mismatch: computed {computed:#06x}, received {received:#06x}")]
    ChecksumMismatch { computed: u16, received: u16 },

    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("frame addressed to {actual:#04x}, this device is {expected:#04x}")]
    AddressMismatch { expected: u8, actual: u8 },

    #[error("unsupported command byte {0:#04x}")]
    UnsupportedCommand(u8),

    #[error("command rejected: pump is under local control")]
    PreconditionRejected,

    #[error("timed out waiting for pump response: {0}")]
    ResponseTimeout(#[from] tokio::time::error::Elapsed),

    #[error("encode buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
