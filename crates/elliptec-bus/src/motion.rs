//! Closed-loop verification of motion commands.
//!
//! Moves are physical: the stage can stall, slip or land short, and the only
//! confirmation is the position it reports back. The session reissues a move
//! whose reported position deviates from the target beyond the class
//! tolerance, a bounded number of times, and reports non-convergence rather
//! than erroring when the retries run out.

use elliptec_protocol::{DeviceInfo, ProtocolError};

/// Accepted deviation for rotary stages, degrees.
pub const ROTARY_TOLERANCE_DEG: f64 = 0.1;

/// Accepted deviation for linear stages, millimeters.
pub const LINEAR_TOLERANCE_MM: f64 = 0.05;

/// Total attempts (first try included) before a move is reported as
/// non-converged.
pub const MAX_MOVE_ATTEMPTS: u8 = 5;

/// Result of a verified move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveOutcome {
    /// Whether the reported position landed within tolerance.
    pub converged: bool,
    /// Attempts actually issued, 1 to [`MAX_MOVE_ATTEMPTS`].
    pub attempts: u8,
    /// The commanded target (absolute position, or delta for relative
    /// moves), in the device's physical unit.
    pub target: f64,
    /// Last reported position, if any reply decoded to one.
    pub reached: Option<f64>,
}

/// The acceptance tolerance for a device, by class.
pub fn tolerance(device: &DeviceInfo) -> Result<f64, ProtocolError> {
    if device.is_rotary() {
        Ok(ROTARY_TOLERANCE_DEG)
    } else if device.is_linear() {
        Ok(LINEAR_TOLERANCE_MM)
    } else {
        Err(ProtocolError::UnsupportedOperation(format!(
            "device type {} does not support verified moves",
            device.device_type
        )))
    }
}

/// Whether `reached` is an acceptable landing for `target`.
pub fn within_tolerance(device: &DeviceInfo, target: f64, reached: f64) -> Result<bool, ProtocolError> {
    Ok((target - reached).abs() <= tolerance(device)?)
}
