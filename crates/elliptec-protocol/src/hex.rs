//! Fixed-width hex fields.
//!
//! Signed quantities travel on the wire as their 32-bit two's-complement
//! value rendered in uppercase hex. The width of a field is a minimum: a
//! negative value encoded into a 4-digit paddle field still produces the full
//! 8-digit two's-complement form, and decoding inverts either width.

use crate::error::ProtocolError;

const TWO_POW_32: i64 = 1 << 32;
const TWO_POW_31: u64 = 1 << 31;

/// Encode a signed step count as fixed-width uppercase hex.
///
/// Negative values are mapped to their 32-bit two's-complement
/// representation first. `width` is a minimum digit count, zero-padded.
pub fn step_to_hex(value: i64, width: usize) -> String {
    let mut v = value;
    if v < 0 {
        v += TWO_POW_32;
    }
    format!("{:0width$X}", v, width = width)
}

/// Decode a hex field into a signed step count.
///
/// The low 32 bits are interpreted as two's complement, exactly inverting
/// [`step_to_hex`] over the 32-bit range. Empty fields, non-hex characters
/// and fields longer than 8 digits are rejected.
pub fn hex_to_step(hex: &str) -> Result<i64, ProtocolError> {
    if hex.is_empty() || hex.len() > 8 {
        return Err(ProtocolError::MalformedFrame(format!(
            "hex step field has length {}, expected 1-8: {hex:?}",
            hex.len()
        )));
    }
    let raw = u64::from_str_radix(hex, 16)
        .map_err(|_| ProtocolError::MalformedFrame(format!("non-hex step field {hex:?}")))?;
    if raw >= TWO_POW_31 {
        Ok(raw as i64 - TWO_POW_32)
    } else {
        Ok(raw as i64)
    }
}

/// Encode an unsigned 16-bit value as 4 uppercase hex digits.
pub fn u16_to_hex(value: u16) -> String {
    format!("{:04X}", value)
}

/// Encode an unsigned 8-bit value as 2 uppercase hex digits.
pub fn u8_to_hex(value: u8) -> String {
    format!("{:02X}", value)
}

/// Decode an unsigned hex field of the given width.
pub fn hex_to_uint(hex: &str, width: usize) -> Result<u64, ProtocolError> {
    if hex.len() != width {
        return Err(ProtocolError::MalformedFrame(format!(
            "hex field {hex:?} has length {}, expected {width}",
            hex.len()
        )));
    }
    u64::from_str_radix(hex, 16)
        .map_err(|_| ProtocolError::MalformedFrame(format!("non-hex field {hex:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_positive_steps() {
        assert_eq!(step_to_hex(0, 8), "00000000");
        assert_eq!(step_to_hex(0x23000, 8), "00023000");
        assert_eq!(step_to_hex(0x3FF, 4), "03FF");
    }

    #[test]
    fn encodes_negative_steps_as_twos_complement() {
        assert_eq!(step_to_hex(-1, 8), "FFFFFFFF");
        assert_eq!(step_to_hex(-2, 8), "FFFFFFFE");
        // Width is a minimum: a negative paddle step still carries 8 digits.
        assert_eq!(step_to_hex(-3, 4), "FFFFFFFD");
    }

    #[test]
    fn decodes_signed_fields() {
        assert_eq!(hex_to_step("00000000").unwrap(), 0);
        assert_eq!(hex_to_step("FFFFFFFF").unwrap(), -1);
        assert_eq!(hex_to_step("7FFFFFFF").unwrap(), i32::MAX as i64);
        assert_eq!(hex_to_step("80000000").unwrap(), i32::MIN as i64);
    }

    #[test]
    fn round_trips_the_32_bit_range_boundaries() {
        for v in [
            i32::MIN as i64,
            i32::MIN as i64 + 1,
            -1,
            0,
            1,
            0x33333,
            i32::MAX as i64 - 1,
            i32::MAX as i64,
        ] {
            for width in [4usize, 8] {
                assert_eq!(hex_to_step(&step_to_hex(v, width)).unwrap(), v, "v={v} w={width}");
            }
        }
    }

    #[test]
    fn rejects_malformed_fields() {
        assert!(matches!(hex_to_step(""), Err(ProtocolError::MalformedFrame(_))));
        assert!(matches!(hex_to_step("GG"), Err(ProtocolError::MalformedFrame(_))));
        assert!(matches!(hex_to_step("123456789"), Err(ProtocolError::MalformedFrame(_))));
        assert!(matches!(hex_to_uint("0A0", 4), Err(ProtocolError::MalformedFrame(_))));
    }

    #[test]
    fn unsigned_helpers_use_fixed_widths() {
        assert_eq!(u16_to_hex(0x004E), "004E");
        assert_eq!(u8_to_hex(0x5A), "5A");
        assert_eq!(hex_to_uint("004E", 4).unwrap(), 0x4E);
    }
}
