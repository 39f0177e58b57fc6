//! Reply parsing.
//!
//! A reply line is `<address digit><2-char tag><payload>` with the CR+LF
//! terminator already stripped by the transport. The tag set is closed:
//! anything outside it is an [`ProtocolError::UnrecognizedReply`], and any
//! field that fails to parse is a [`ProtocolError::MalformedFrame`].

use log::trace;

use crate::address::BusAddress;
use crate::constants::*;
use crate::device::DeviceInfo;
use crate::error::ProtocolError;
use crate::hex;
use crate::status::DeviceStatus;

/// Drive parameters of one motor, from an `I1`/`I2`/`I3` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotorInfo {
    /// Replying device.
    pub address: BusAddress,
    /// Motor number, 1-3.
    pub motor: u8,
    /// Whether the control loop is enabled.
    pub loop_on: bool,
    /// Whether the motor is enabled.
    pub motor_on: bool,
    /// Raw motor current in counts (1.866 counts per mA).
    pub current: u16,
    /// PWM increase per millisecond while ramping up.
    pub ramp_up: u16,
    /// PWM decrease per millisecond while ramping down.
    pub ramp_down: u16,
    /// Forward drive period in clock counts.
    pub forward_period: u16,
    /// Backward drive period in clock counts.
    pub backward_period: u16,
}

impl MotorInfo {
    /// Motor current in milliamps.
    pub fn current_ma(&self) -> f64 {
        self.current as f64 / CURRENT_COUNTS_PER_MA
    }

    /// Forward drive frequency in Hz derived from the stored period.
    pub fn forward_frequency_hz(&self) -> f64 {
        DRIVE_CLOCK_HZ / self.forward_period as f64
    }

    /// Backward drive frequency in Hz derived from the stored period.
    pub fn backward_frequency_hz(&self) -> f64 {
        DRIVE_CLOCK_HZ / self.backward_period as f64
    }

    fn parse(address: BusAddress, motor: u8, payload: &str) -> Result<Self, ProtocolError> {
        if payload.len() < MOTOR_INFO_PAYLOAD_CHARS {
            return Err(ProtocolError::TruncatedPayload {
                expected: MOTOR_INFO_PAYLOAD_CHARS,
                actual: payload.len(),
            });
        }
        Ok(MotorInfo {
            address,
            motor,
            loop_on: parse_flag(&payload[0..1], "loop state")?,
            motor_on: parse_flag(&payload[1..2], "motor state")?,
            current: hex::hex_to_uint(&payload[2..6], 4)? as u16,
            ramp_up: hex::hex_to_uint(&payload[6..10], 4)? as u16,
            ramp_down: hex::hex_to_uint(&payload[10..14], 4)? as u16,
            forward_period: hex::hex_to_uint(&payload[14..18], 4)? as u16,
            backward_period: hex::hex_to_uint(&payload[18..22], 4)? as u16,
        })
    }
}

/// One point of a motor current curve: drive period and current counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurvePoint {
    /// Drive period, decimal counts.
    pub period: u8,
    /// Motor current in raw counts.
    pub current: u16,
}

impl CurvePoint {
    /// The current in milliamps.
    pub fn current_ma(&self) -> f64 {
        self.current as f64 / CURRENT_COUNTS_PER_MA
    }
}

/// A decoded reply from a device.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Identity record (`IN`).
    Info(DeviceInfo),

    /// Status code (`GS`).
    Status {
        /// Replying device.
        address: BusAddress,
        /// Decoded status.
        status: DeviceStatus,
    },

    /// Position reply (`PO`), signed encoder steps.
    Position {
        /// Replying device.
        address: BusAddress,
        /// Position in encoder steps.
        steps: i64,
    },

    /// Jog step size reply (`GJ`), signed encoder steps.
    JogStepSize {
        /// Replying device.
        address: BusAddress,
        /// Jog size in encoder steps.
        steps: i64,
    },

    /// Home offset reply (`HO`), signed encoder steps.
    HomeOffset {
        /// Replying device.
        address: BusAddress,
        /// Offset in encoder steps.
        steps: i64,
    },

    /// Velocity reply (`GV`), percent of full drive power.
    Velocity {
        /// Replying device.
        address: BusAddress,
        /// Velocity percentage.
        percent: u8,
    },

    /// Paddle position reply (`P1`/`P2`/`P3`).
    PaddlePosition {
        /// Replying device.
        address: BusAddress,
        /// Paddle number, 1-3.
        paddle: u8,
        /// Position in paddle steps (0.33 degrees each).
        steps: i64,
    },

    /// Motor drive parameters (`I1`/`I2`/`I3`).
    MotorInfo(MotorInfo),

    /// Current curve dump (`C1`/`C2`/`C3`).
    CurrentCurve {
        /// Replying device.
        address: BusAddress,
        /// Motor number, 1-3.
        motor: u8,
        /// The 87 scanned points.
        points: Vec<CurvePoint>,
    },
}

impl Response {
    /// Parse a full reply line.
    pub fn parse(line: &str) -> Result<Response, ProtocolError> {
        if line.len() < 3 || !line.is_ascii() {
            return Err(ProtocolError::MalformedFrame(format!(
                "reply too short or non-ascii: {line:?}"
            )));
        }
        let mut chars = line.chars();
        let address = BusAddress::from_hex_digit(
            chars.next().ok_or_else(|| ProtocolError::MalformedFrame(line.to_string()))?,
        )?;
        let tag = &line[1..3];
        let payload = &line[3..];
        trace!("reply from {address}: tag {tag} payload {payload:?}");

        match tag {
            "IN" => Ok(Response::Info(DeviceInfo::parse(address, payload)?)),
            "GS" => {
                let code = hex::hex_to_uint(payload, 2)? as u8;
                Ok(Response::Status {
                    address,
                    status: DeviceStatus::from_code(code)?,
                })
            }
            "PO" => Ok(Response::Position {
                address,
                steps: parse_step_payload(payload)?,
            }),
            "GJ" => Ok(Response::JogStepSize {
                address,
                steps: parse_step_payload(payload)?,
            }),
            "HO" => Ok(Response::HomeOffset {
                address,
                steps: parse_step_payload(payload)?,
            }),
            "GV" => Ok(Response::Velocity {
                address,
                percent: hex::hex_to_uint(payload, 2)? as u8,
            }),
            "P1" | "P2" | "P3" => Ok(Response::PaddlePosition {
                address,
                paddle: tag.as_bytes()[1] - b'0',
                steps: hex::hex_to_step(payload)?,
            }),
            "I1" | "I2" | "I3" => Ok(Response::MotorInfo(MotorInfo::parse(
                address,
                tag.as_bytes()[1] - b'0',
                payload,
            )?)),
            "C1" | "C2" | "C3" => Ok(Response::CurrentCurve {
                address,
                motor: tag.as_bytes()[1] - b'0',
                points: parse_curve_payload(payload)?,
            }),
            _ => Err(ProtocolError::UnrecognizedReply {
                tag: tag.to_string(),
                frame: line.to_string(),
            }),
        }
    }

    /// The address the reply came from.
    pub fn address(&self) -> BusAddress {
        match self {
            Response::Info(info) => info.address,
            Response::Status { address, .. }
            | Response::Position { address, .. }
            | Response::JogStepSize { address, .. }
            | Response::HomeOffset { address, .. }
            | Response::Velocity { address, .. }
            | Response::PaddlePosition { address, .. }
            | Response::CurrentCurve { address, .. } => *address,
            Response::MotorInfo(info) => info.address,
        }
    }
}

fn parse_step_payload(payload: &str) -> Result<i64, ProtocolError> {
    if payload.len() != STEP_HEX_WIDTH {
        return Err(ProtocolError::MalformedFrame(format!(
            "step payload {payload:?} has length {}, expected {STEP_HEX_WIDTH}",
            payload.len()
        )));
    }
    hex::hex_to_step(payload)
}

fn parse_curve_payload(payload: &str) -> Result<Vec<CurvePoint>, ProtocolError> {
    if payload.len() < CURVE_PAYLOAD_CHARS {
        return Err(ProtocolError::TruncatedPayload {
            expected: CURVE_PAYLOAD_CHARS,
            actual: payload.len(),
        });
    }
    let mut points = Vec::with_capacity(CURVE_POINTS);
    for i in 0..CURVE_POINTS {
        let chunk = &payload[i * CURVE_POINT_CHARS..(i + 1) * CURVE_POINT_CHARS];
        let period = parse_decimal(&chunk[0..2], "curve period")? as u8;
        let current = parse_decimal(&chunk[2..6], "curve current")? as u16;
        points.push(CurvePoint { period, current });
    }
    Ok(points)
}

fn parse_decimal(field: &str, what: &str) -> Result<u64, ProtocolError> {
    field
        .parse::<u64>()
        .map_err(|_| ProtocolError::MalformedFrame(format!("non-decimal {what} field {field:?}")))
}

fn parse_flag(field: &str, what: &str) -> Result<bool, ProtocolError> {
    match field {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(ProtocolError::MalformedFrame(format!(
            "invalid {what} flag {field:?}"
        ))),
    }
}
