//! Protocol error types.

use thiserror::Error;

use crate::status::DeviceStatus;

/// Errors that can occur while encoding commands or decoding replies.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// Reply structure or a fixed-width field could not be parsed.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Well-formed reply with a tag outside the known set.
    #[error("unrecognized reply tag {tag:?} in {frame:?}")]
    UnrecognizedReply {
        /// The two-character tag that was not recognized.
        tag: String,
        /// The full reply line.
        frame: String,
    },

    /// Fixed-size payload shorter than its contract.
    #[error("truncated payload: expected {expected} characters, got {actual}")]
    TruncatedPayload {
        /// Contracted payload length.
        expected: usize,
        /// Length actually received.
        actual: usize,
    },

    /// Caller-supplied value outside the allowed domain, rejected before any
    /// bytes reach the wire.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation attempted on a device class that does not support it.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Device reports zero pulses per unit, so step conversions are undefined.
    #[error("invalid calibration: device type {device_type} has zero pulses per unit")]
    InvalidCalibration {
        /// Type code of the offending device.
        device_type: u16,
    },

    /// Status reply carried a code outside the documented 0-13 range.
    #[error("unknown device error code {0}")]
    UnknownErrorCode(u8),

    /// Device reported a non-OK status.
    #[error("device reported {0}")]
    DeviceError(DeviceStatus),
}
