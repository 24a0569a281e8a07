use std::io;

use thiserror::Error;

/// Errors that may occur when decoding a datastream or one of its structures.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("{0}")]
    IoError(#[from] io::Error),

    /// The buffer ended before a structure of the given size could be read.
    #[error("truncated {what}: need {expected} bytes, have {available}")]
    Truncated {
        what: &'static str,
        expected: usize,
        available: usize,
    },

    /// A declared length does not fit the bytes that surround it.
    #[error("invalid {what} length {declared} at offset {offset} ({remaining} bytes remaining)")]
    InvalidLength {
        what: &'static str,
        declared: usize,
        offset: usize,
        remaining: usize,
    },

    /// No datastream kind is registered for this server and request/reply id.
    #[error("unknown datastream 0x{request_id:04X} for server 0x{server_id:04X}")]
    UnknownDatastream { server_id: u16, request_id: u16 },

    #[error("{0}")]
    InvalidFormat(String),

    #[error("unsupported CCSID {0}")]
    UnsupportedCcsid(u16),

    #[error("conversion failed: {0}")]
    Conversion(String),

    #[error("datastream too large! Maximum is {max}, but got {got}")]
    TooLarge { max: usize, got: usize },
}

impl ReadError {
    pub(crate) fn truncated(what: &'static str, expected: usize, available: usize) -> ReadError {
        ReadError::Truncated {
            what,
            expected,
            available,
        }
    }
}
