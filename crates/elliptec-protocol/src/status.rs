//! Device status codes carried in `GS` replies.

use std::fmt;

use crate::error::ProtocolError;

/// Status reported by a device, code 0-13.
///
/// Codes 14-255 are reserved by the protocol; parsing one yields
/// [`ProtocolError::UnknownErrorCode`] rather than a variant, so every value
/// of this type maps to a documented condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceStatus {
    Ok = 0,
    CommunicationTimeout = 1,
    MechanicalTimeout = 2,
    CommandError = 3,
    ValueOutOfRange = 4,
    ModuleIsolated = 5,
    ModuleOutOfIsolation = 6,
    InitializationError = 7,
    ThermalError = 8,
    Busy = 9,
    SensorError = 10,
    MotorError = 11,
    OutOfRange = 12,
    OverCurrent = 13,
}

impl DeviceStatus {
    /// Decode a raw status code.
    pub fn from_code(code: u8) -> Result<Self, ProtocolError> {
        Ok(match code {
            0 => DeviceStatus::Ok,
            1 => DeviceStatus::CommunicationTimeout,
            2 => DeviceStatus::MechanicalTimeout,
            3 => DeviceStatus::CommandError,
            4 => DeviceStatus::ValueOutOfRange,
            5 => DeviceStatus::ModuleIsolated,
            6 => DeviceStatus::ModuleOutOfIsolation,
            7 => DeviceStatus::InitializationError,
            8 => DeviceStatus::ThermalError,
            9 => DeviceStatus::Busy,
            10 => DeviceStatus::SensorError,
            11 => DeviceStatus::MotorError,
            12 => DeviceStatus::OutOfRange,
            13 => DeviceStatus::OverCurrent,
            other => return Err(ProtocolError::UnknownErrorCode(other)),
        })
    }

    /// The raw wire code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether this is the no-error status.
    pub fn is_ok(self) -> bool {
        matches!(self, DeviceStatus::Ok)
    }

    /// Human-readable description from the protocol manual.
    pub fn description(self) -> &'static str {
        match self {
            DeviceStatus::Ok => "OK, no error",
            DeviceStatus::CommunicationTimeout => "Communication time out",
            DeviceStatus::MechanicalTimeout => "Mechanical time out",
            DeviceStatus::CommandError => "Command error or not supported",
            DeviceStatus::ValueOutOfRange => "Value out of range",
            DeviceStatus::ModuleIsolated => "Module isolated",
            DeviceStatus::ModuleOutOfIsolation => "Module out of isolation",
            DeviceStatus::InitializationError => "Initializing error",
            DeviceStatus::ThermalError => "Thermal error",
            DeviceStatus::Busy => "Busy",
            DeviceStatus::SensorError => {
                "Sensor error (may appear during self test; an error if it persists)"
            }
            DeviceStatus::MotorError => {
                "Motor error (may appear during self test; an error if it persists)"
            }
            DeviceStatus::OutOfRange => "Out of range (instructed to move beyond travel)",
            DeviceStatus::OverCurrent => "Over current error",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}: {}", self.code(), self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_documented_codes() {
        assert_eq!(DeviceStatus::from_code(0).unwrap(), DeviceStatus::Ok);
        assert_eq!(DeviceStatus::from_code(10).unwrap(), DeviceStatus::SensorError);
        assert_eq!(DeviceStatus::from_code(13).unwrap(), DeviceStatus::OverCurrent);
    }

    #[test]
    fn reserved_codes_are_errors() {
        assert!(matches!(
            DeviceStatus::from_code(14),
            Err(ProtocolError::UnknownErrorCode(14))
        ));
        assert!(matches!(
            DeviceStatus::from_code(0xFF),
            Err(ProtocolError::UnknownErrorCode(0xFF))
        ));
    }
}
