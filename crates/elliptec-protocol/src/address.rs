//! Bus addresses.

use std::fmt;

use crate::error::ProtocolError;

/// A device address on the shared bus: a single hex digit, `0`-`F`.
///
/// Addresses are bus-unique at any instant but mutable via the
/// change-address command; device identity is carried by the serial number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BusAddress(u8);

impl BusAddress {
    /// Create an address from a raw motor id, which must be 0-15.
    pub fn new(id: u8) -> Result<Self, ProtocolError> {
        if id > 15 {
            return Err(ProtocolError::InvalidArgument(format!(
                "bus address must be 0-15, got {id}"
            )));
        }
        Ok(BusAddress(id))
    }

    /// Parse an address from its single-hex-digit wire form.
    pub fn from_hex_digit(c: char) -> Result<Self, ProtocolError> {
        let id = c
            .to_digit(16)
            .ok_or_else(|| ProtocolError::MalformedFrame(format!("invalid address digit {c:?}")))?;
        Ok(BusAddress(id as u8))
    }

    /// The raw id, 0-15.
    pub fn id(self) -> u8 {
        self.0
    }

    /// The single uppercase hex digit used on the wire.
    pub fn to_hex_digit(self) -> char {
        char::from_digit(self.0 as u32, 16)
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('0')
    }
}

impl fmt::Display for BusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex_digit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_full_nibble_range() {
        assert_eq!(BusAddress::new(0).unwrap().to_hex_digit(), '0');
        assert_eq!(BusAddress::new(10).unwrap().to_hex_digit(), 'A');
        assert_eq!(BusAddress::new(15).unwrap().to_hex_digit(), 'F');
        assert!(BusAddress::new(16).is_err());
    }

    #[test]
    fn parses_wire_digits_case_insensitively() {
        assert_eq!(BusAddress::from_hex_digit('3').unwrap().id(), 3);
        assert_eq!(BusAddress::from_hex_digit('b').unwrap().id(), 11);
        assert_eq!(BusAddress::from_hex_digit('B').unwrap().id(), 11);
        assert!(BusAddress::from_hex_digit('G').is_err());
    }
}
