//! Conversion between encoder steps and physical units.
//!
//! Rotary stages are calibrated in pulses per full turn, linear stages in
//! pulses per millimeter. Paddles use a fixed 0.33 degrees per step and do
//! not consult the per-device calibration.

use crate::constants::PADDLE_DEGREES_PER_STEP;
use crate::device::DeviceInfo;
use crate::error::ProtocolError;

fn pulses(device: &DeviceInfo) -> Result<f64, ProtocolError> {
    if device.pulses_per_unit == 0 {
        return Err(ProtocolError::InvalidCalibration {
            device_type: device.device_type,
        });
    }
    Ok(device.pulses_per_unit as f64)
}

/// Convert an angle in degrees to encoder steps for a rotary device.
pub fn degrees_to_steps(device: &DeviceInfo, degrees: f64) -> Result<i64, ProtocolError> {
    Ok((pulses(device)? * degrees / 360.0).round() as i64)
}

/// Convert a distance in millimeters to encoder steps for a linear device.
pub fn millimeters_to_steps(device: &DeviceInfo, millimeters: f64) -> Result<i64, ProtocolError> {
    Ok((pulses(device)? * millimeters).round() as i64)
}

/// Convert encoder steps to degrees for a rotary device.
pub fn steps_to_degrees(device: &DeviceInfo, steps: i64) -> Result<f64, ProtocolError> {
    Ok(360.0 * steps as f64 / pulses(device)?)
}

/// Convert encoder steps to millimeters for a linear device.
pub fn steps_to_millimeters(device: &DeviceInfo, steps: i64) -> Result<f64, ProtocolError> {
    Ok(steps as f64 / pulses(device)?)
}

/// Convert a physical position to steps, dispatching on the device class.
///
/// Rotary devices take degrees, linear devices millimeters; anything else is
/// an unsupported operation.
pub fn position_to_steps(device: &DeviceInfo, position: f64) -> Result<i64, ProtocolError> {
    if device.is_rotary() {
        degrees_to_steps(device, position)
    } else if device.is_linear() {
        millimeters_to_steps(device, position)
    } else {
        Err(ProtocolError::UnsupportedOperation(format!(
            "device type {} is neither rotary nor linear",
            device.device_type
        )))
    }
}

/// Convert reported steps to a physical position, dispatching on class.
pub fn steps_to_position(device: &DeviceInfo, steps: i64) -> Result<f64, ProtocolError> {
    if device.is_rotary() {
        steps_to_degrees(device, steps)
    } else if device.is_linear() {
        steps_to_millimeters(device, steps)
    } else {
        Err(ProtocolError::UnsupportedOperation(format!(
            "device type {} is neither rotary nor linear",
            device.device_type
        )))
    }
}

/// Convert a paddle angle in degrees to paddle steps.
pub fn paddle_degrees_to_steps(degrees: f64) -> i64 {
    (degrees / PADDLE_DEGREES_PER_STEP).round() as i64
}

/// Convert paddle steps to degrees.
pub fn paddle_steps_to_degrees(steps: i64) -> f64 {
    steps as f64 * PADDLE_DEGREES_PER_STEP
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::BusAddress;

    fn device(device_type: u16, pulses_per_unit: u64) -> DeviceInfo {
        DeviceInfo {
            address: BusAddress::new(0).unwrap(),
            device_type,
            serial: 1,
            year: 2023,
            firmware: 1,
            hardware: 1,
            travel: 360,
            pulses_per_unit,
        }
    }

    #[test]
    fn rotary_conversions_round_trip_within_one_step() {
        let dev = device(14, 143_360);
        for steps in [0i64, 1, -1, 398, 143_360, -71_680] {
            let deg = steps_to_degrees(&dev, steps).unwrap();
            let back = degrees_to_steps(&dev, deg).unwrap();
            assert!((back - steps).abs() <= 1, "steps={steps} back={back}");
        }
        assert_eq!(degrees_to_steps(&dev, 90.0).unwrap(), 35_840);
    }

    #[test]
    fn linear_conversions_round_trip_within_one_step() {
        let dev = device(17, 2048);
        for steps in [0i64, 7, -7, 2048, 61_440] {
            let mm = steps_to_millimeters(&dev, steps).unwrap();
            let back = millimeters_to_steps(&dev, mm).unwrap();
            assert!((back - steps).abs() <= 1);
        }
    }

    #[test]
    fn class_dispatch_rejects_paddles_and_piezos() {
        assert!(matches!(
            position_to_steps(&device(3, 100), 10.0),
            Err(ProtocolError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            steps_to_position(&device(5, 100), 10),
            Err(ProtocolError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn zero_calibration_is_rejected() {
        assert!(matches!(
            degrees_to_steps(&device(14, 0), 1.0),
            Err(ProtocolError::InvalidCalibration { device_type: 14 })
        ));
    }

    #[test]
    fn paddle_scale_is_fixed() {
        assert_eq!(paddle_degrees_to_steps(33.0), 100);
        assert_eq!(paddle_degrees_to_steps(-33.0), -100);
        assert!((paddle_steps_to_degrees(100) - 33.0).abs() < 1e-9);
    }
}
