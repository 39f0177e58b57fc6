//! Device identity records and capability classification.

use std::fmt;

use crate::address::BusAddress;
use crate::constants::INFO_PAYLOAD_CHARS;
use crate::error::ProtocolError;
use crate::hex;

// Type-code membership tables. These sets are part of the protocol contract,
// not configuration.
const ROTARY_TYPES: &[u16] = &[8, 14, 18];
const LINEAR_TYPES: &[u16] = &[7, 10, 17, 20];
const INDEXED_TYPES: &[u16] = &[6, 9, 12];
const CLEANING_TYPES: &[u16] = &[14, 17, 18, 20];
const PADDLE_TYPES: &[u16] = &[3];
const PIEZO_TYPES: &[u16] = &[5];

/// Capability classes a device type can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Rotary stage, positions in degrees.
    Rotary,
    /// Linear stage, positions in millimeters.
    Linear,
    /// Union of rotary and linear: anything that takes step positions.
    LinRot,
    /// Indexed (discrete-position) stage.
    Indexed,
    /// Supports the clean-mechanics command.
    Cleaning,
    /// Polarization paddle with three rotating elements.
    Paddle,
    /// Bare piezo actuator (ELL5).
    Piezo,
}

/// Membership test of a device type code against a capability class.
pub fn classify(device_type: u16, capability: Capability) -> bool {
    match capability {
        Capability::Rotary => ROTARY_TYPES.contains(&device_type),
        Capability::Linear => LINEAR_TYPES.contains(&device_type),
        Capability::LinRot => {
            ROTARY_TYPES.contains(&device_type) || LINEAR_TYPES.contains(&device_type)
        }
        Capability::Indexed => INDEXED_TYPES.contains(&device_type),
        Capability::Cleaning => CLEANING_TYPES.contains(&device_type),
        Capability::Paddle => PADDLE_TYPES.contains(&device_type),
        Capability::Piezo => PIEZO_TYPES.contains(&device_type),
    }
}

/// Identity record of one device, decoded from an `IN` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Current bus address. Mutable via the change-address command.
    pub address: BusAddress,
    /// Stage model code; selects the capability class.
    pub device_type: u16,
    /// Unique serial number, stable across address changes.
    pub serial: u64,
    /// Manufacturing year.
    pub year: u16,
    /// Firmware revision.
    pub firmware: u8,
    /// Hardware revision.
    pub hardware: u8,
    /// Mechanical travel in raw units; meaning depends on device type.
    pub travel: u32,
    /// Encoder pulses per physical unit (degree turn or millimeter).
    /// Must be non-zero for the device to support motion commands.
    pub pulses_per_unit: u64,
}

impl DeviceInfo {
    /// Decode the 30-character identity payload of an `IN` reply.
    ///
    /// Layout: type 2 hex, serial 8 decimal, year 4 decimal, firmware
    /// 2 decimal, hardware 2 decimal, travel 4 hex, pulses 8 hex.
    pub fn parse(address: BusAddress, payload: &str) -> Result<Self, ProtocolError> {
        if payload.len() < INFO_PAYLOAD_CHARS {
            return Err(ProtocolError::TruncatedPayload {
                expected: INFO_PAYLOAD_CHARS,
                actual: payload.len(),
            });
        }
        let device_type = hex::hex_to_uint(&payload[0..2], 2)? as u16;
        let serial = parse_decimal(&payload[2..10], "serial number")?;
        let year = parse_decimal(&payload[10..14], "manufacture year")? as u16;
        let firmware = parse_decimal(&payload[14..16], "firmware revision")? as u8;
        let hardware = parse_decimal(&payload[16..18], "hardware revision")? as u8;
        let travel = hex::hex_to_uint(&payload[18..22], 4)? as u32;
        let pulses_per_unit = hex::hex_to_uint(&payload[22..30], 8)?;

        Ok(DeviceInfo {
            address,
            device_type,
            serial,
            year,
            firmware,
            hardware,
            travel,
            pulses_per_unit,
        })
    }

    /// Membership test against a capability class.
    pub fn has_capability(&self, capability: Capability) -> bool {
        classify(self.device_type, capability)
    }

    pub fn is_rotary(&self) -> bool {
        self.has_capability(Capability::Rotary)
    }

    pub fn is_linear(&self) -> bool {
        self.has_capability(Capability::Linear)
    }

    pub fn is_linrot(&self) -> bool {
        self.has_capability(Capability::LinRot)
    }

    pub fn is_indexed(&self) -> bool {
        self.has_capability(Capability::Indexed)
    }

    pub fn has_cleaning(&self) -> bool {
        self.has_capability(Capability::Cleaning)
    }

    pub fn is_paddle(&self) -> bool {
        self.has_capability(Capability::Paddle)
    }

    pub fn is_piezo(&self) -> bool {
        self.has_capability(Capability::Piezo)
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "device {} (type {}, serial {}, year {}, fw {}, hw {}, travel {}, {} pulses/unit)",
            self.address,
            self.device_type,
            self.serial,
            self.year,
            self.firmware,
            self.hardware,
            self.travel,
            self.pulses_per_unit
        )
    }
}

fn parse_decimal(field: &str, what: &str) -> Result<u64, ProtocolError> {
    field
        .parse::<u64>()
        .map_err(|_| ProtocolError::MalformedFrame(format!("non-decimal {what} field {field:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(id: u8) -> BusAddress {
        BusAddress::new(id).unwrap()
    }

    #[test]
    fn parses_an_ell14_identity_record() {
        // ELL14: type 0x0E, serial 11400516, year 2023, fw 17, hw 01,
        // travel 0x0168 = 360, pulses 0x00023000 = 143360.
        let info = DeviceInfo::parse(addr(2), "0E1140051620231701016800023000").unwrap();
        assert_eq!(info.device_type, 14);
        assert_eq!(info.serial, 11_400_516);
        assert_eq!(info.year, 2023);
        assert_eq!(info.firmware, 17);
        assert_eq!(info.hardware, 1);
        assert_eq!(info.travel, 360);
        assert_eq!(info.pulses_per_unit, 143_360);
        assert!(info.is_rotary());
        assert!(info.has_cleaning());
    }

    #[test]
    fn rejects_short_and_corrupt_records() {
        assert!(matches!(
            DeviceInfo::parse(addr(0), "0E11400516"),
            Err(ProtocolError::TruncatedPayload { .. })
        ));
        assert!(matches!(
            DeviceInfo::parse(addr(0), "0EX140051620231701016800023000"),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn classification_tables_match_the_protocol_contract() {
        // Type 8 (ELL8 rotary): rotary and linrot, nothing else.
        assert!(classify(8, Capability::Rotary));
        assert!(classify(8, Capability::LinRot));
        assert!(!classify(8, Capability::Linear));
        assert!(!classify(8, Capability::Paddle));
        assert!(!classify(8, Capability::Piezo));

        // Type 3 is paddle only; type 5 is piezo only.
        assert!(classify(3, Capability::Paddle));
        assert!(!classify(3, Capability::LinRot));
        assert!(classify(5, Capability::Piezo));
        assert!(!classify(5, Capability::LinRot));

        // Linear stage with cleaning support.
        assert!(classify(17, Capability::Linear));
        assert!(classify(17, Capability::Cleaning));
        assert!(!classify(17, Capability::Rotary));

        // Indexed stages.
        assert!(classify(6, Capability::Indexed));
        assert!(classify(9, Capability::Indexed));
        assert!(classify(12, Capability::Indexed));
    }
}
