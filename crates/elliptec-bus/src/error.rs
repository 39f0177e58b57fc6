//! Session-level error types.

use thiserror::Error;

use elliptec_protocol::{BusAddress, DeviceStatus, ProtocolError};

/// Errors reported by the bus session.
#[derive(Error, Debug)]
pub enum BusError {
    /// No reply arrived within the configured bus deadline.
    #[error("communication timeout waiting for a reply")]
    CommTimeout,

    /// Transport-level I/O failure.
    #[error("transport i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding failure, or argument rejected before the wire.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Operation referenced an address with no discovered device.
    #[error("no device at address {0}")]
    DeviceNotFound(BusAddress),

    /// Address-change target already assigned.
    #[error("address {0} is already in use")]
    AddressInUse(BusAddress),

    /// Device answered with a non-OK status code.
    #[error("device {address} reported {status}")]
    Device {
        /// Address of the reporting device.
        address: BusAddress,
        /// The reported status.
        status: DeviceStatus,
    },

    /// A valid reply of the wrong kind for the command that was issued.
    #[error("expected {expected} reply, got {got}")]
    UnexpectedReply {
        /// What the command contract promises.
        expected: &'static str,
        /// Debug rendering of what arrived.
        got: String,
    },

    /// The transport is closed.
    #[error("transport is not open")]
    NotOpen,
}
