//! Commands that can be sent to a device on the bus.
//!
//! Every command encodes as `<address><opcode>[<operand>]`. Arguments are
//! validated in [`Command::encode`] before anything can reach the wire;
//! violations yield [`ProtocolError::InvalidArgument`].

use crate::address::BusAddress;
use crate::constants::*;
use crate::error::ProtocolError;
use crate::hex;

/// Drive direction for motor frequency and paddle drive-time commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorDirection {
    Forward,
    Backward,
}

/// Homing direction for rotary stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HomeDirection {
    /// Clockwise, the protocol default (`0`).
    #[default]
    Clockwise,
    /// Counterclockwise (`1`).
    Counterclockwise,
}

/// Commands understood by the devices.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Query the identity record (`in`).
    GetInfo,

    /// Query drive parameters of one motor (`i1`/`i2`/`i3`).
    GetMotorInfo {
        /// Motor number, 1-3.
        motor: u8,
    },

    /// Set the drive frequency of one motor (`f<n>`/`b<n>`).
    SetMotorFrequency {
        /// Motor number, 1-3.
        motor: u8,
        /// Which drive direction the frequency applies to.
        direction: MotorDirection,
        /// Frequency in kHz, at most 78.
        frequency_khz: u16,
        /// Restore the factory frequency instead (operand `8FFF`).
        factory_reset: bool,
    },

    /// Run the resonant frequency search for one motor (`s<n>`).
    SearchMotorFrequency {
        /// Motor number, 1-3.
        motor: u8,
    },

    /// Scan the motor current curve (`c<n>`).
    ScanCurrentCurve {
        /// Motor number, 1-3.
        motor: u8,
    },

    /// Request the last scanned current curve (`C<n>`).
    GetCurrentCurve {
        /// Motor number, 1-3.
        motor: u8,
    },

    /// Isolate the device from the bus for a number of minutes (`is`).
    /// Elicits no reply.
    Isolate {
        /// Isolation time in minutes.
        minutes: u8,
    },

    /// Home the stage (`ho<dir>`).
    Home {
        /// Rotation direction for rotary stages.
        direction: HomeDirection,
    },

    /// Home a single paddle (`ho<n>`).
    PaddleHome {
        /// Paddle selector, 1-7.
        paddle: u8,
    },

    /// Move to an absolute step position (`ma`).
    MoveAbsolute {
        /// Target in encoder steps, 32-bit signed range.
        steps: i64,
    },

    /// Move by a relative step count (`mr`).
    MoveRelative {
        /// Delta in encoder steps, 32-bit signed range.
        steps: i64,
    },

    /// Query the home offset (`go`).
    GetHomeOffset,

    /// Set the home offset (`so`).
    SetHomeOffset {
        /// Offset in encoder steps.
        steps: i64,
    },

    /// Query the jog step size (`gj`).
    GetJogStepSize,

    /// Set the jog step size (`sj`).
    SetJogStepSize {
        /// Jog size in encoder steps.
        steps: i64,
    },

    /// Jog forward (`fw`).
    MoveForward,

    /// Jog backward (`bw`).
    MoveBackward,

    /// Stop any motion (`ms`).
    Stop,

    /// Query the position (`gp`).
    GetPosition,

    /// Query the velocity setting (`gv`).
    GetVelocity,

    /// Set the velocity as a percentage of full drive power (`sv`).
    SetVelocity {
        /// Percentage, at most 100.
        percent: u8,
    },

    /// Assign the device to a group address (`ga`).
    SetGroupAddress {
        /// Group address to join.
        group: BusAddress,
    },

    /// Drive one paddle for a time (`t<n>`).
    PaddleDriveTime {
        /// Paddle number, 1-3.
        paddle: u8,
        /// Drive time in milliseconds, at most 4095 (12 bits; the top
        /// nibble carries the direction flag).
        milliseconds: u16,
        /// Drive direction.
        direction: MotorDirection,
    },

    /// Move one paddle to an absolute angle step (`a<n>`).
    PaddleMoveAbsolute {
        /// Paddle number, 1-3.
        paddle: u8,
        /// Target in paddle steps (0.33 degrees each).
        steps: i64,
    },

    /// Move one paddle by a relative angle step (`r<n>`).
    PaddleMoveRelative {
        /// Paddle number, 1-3.
        paddle: u8,
        /// Delta in paddle steps (0.33 degrees each).
        steps: i64,
    },

    /// Persist user settings to device flash (`us`).
    SaveUserData,

    /// Run the motor optimization routine (`om`). Device-internal duration;
    /// issued under a disabled read timeout.
    OptimizeMotors,

    /// Run the mechanics cleaning routine (`cm`). Device-internal duration;
    /// issued under a disabled read timeout.
    CleanMechanics,

    /// Stop an optimize/clean routine (`st`).
    StopClean,

    /// Change the device's bus address (`ca`).
    ChangeAddress {
        /// The new address.
        new_address: BusAddress,
    },

    /// Query the status code (`gs`).
    GetStatus,

    /// Energize the piezo at a given frequency (`e1`), ELL5 only.
    Energize {
        /// Drive frequency in Hz, 230 Hz to 2 MHz.
        frequency_hz: f64,
    },

    /// Halt the piezo (`h1`), ELL5 only.
    Halt,
}

impl Command {
    /// Whether the device answers this command with a reply line.
    pub fn expects_reply(&self) -> bool {
        !matches!(self, Command::Isolate { .. })
    }

    /// Encode the command as a wire frame for the given address.
    ///
    /// All argument validation happens here, before any write.
    pub fn encode(&self, address: BusAddress) -> Result<String, ProtocolError> {
        let body = match self {
            Command::GetInfo => "in".to_string(),
            Command::GetMotorInfo { motor } => format!("i{}", motor_num(*motor)?),
            Command::SetMotorFrequency {
                motor,
                direction,
                frequency_khz,
                factory_reset,
            } => {
                let opcode = match direction {
                    MotorDirection::Forward => 'f',
                    MotorDirection::Backward => 'b',
                };
                let operand = if *factory_reset {
                    FACTORY_RESET_OPERAND.to_string()
                } else if *frequency_khz > MAX_MOTOR_FREQ_KHZ {
                    return Err(ProtocolError::InvalidArgument(format!(
                        "motor frequency must be at most {MAX_MOTOR_FREQ_KHZ} kHz, got {frequency_khz}"
                    )));
                } else {
                    // Top hex digit is the direction/flag nibble.
                    format!("8{:03X}", frequency_khz)
                };
                format!("{opcode}{}{operand}", motor_num(*motor)?)
            }
            Command::SearchMotorFrequency { motor } => format!("s{}", motor_num(*motor)?),
            Command::ScanCurrentCurve { motor } => format!("c{}", motor_num(*motor)?),
            Command::GetCurrentCurve { motor } => format!("C{}", motor_num(*motor)?),
            Command::Isolate { minutes } => format!("is{}", hex::u8_to_hex(*minutes)),
            Command::Home { direction } => {
                let dir = match direction {
                    HomeDirection::Clockwise => '0',
                    HomeDirection::Counterclockwise => '1',
                };
                format!("ho{dir}")
            }
            Command::PaddleHome { paddle } => {
                if !(1..=7).contains(paddle) {
                    return Err(ProtocolError::InvalidArgument(format!(
                        "paddle home selector must be 1-7, got {paddle}"
                    )));
                }
                format!("ho{paddle}")
            }
            Command::MoveAbsolute { steps } => format!("ma{}", step_operand(*steps)?),
            Command::MoveRelative { steps } => format!("mr{}", step_operand(*steps)?),
            Command::GetHomeOffset => "go".to_string(),
            Command::SetHomeOffset { steps } => format!("so{}", step_operand(*steps)?),
            Command::GetJogStepSize => "gj".to_string(),
            Command::SetJogStepSize { steps } => format!("sj{}", step_operand(*steps)?),
            Command::MoveForward => "fw".to_string(),
            Command::MoveBackward => "bw".to_string(),
            Command::Stop => "ms".to_string(),
            Command::GetPosition => "gp".to_string(),
            Command::GetVelocity => "gv".to_string(),
            Command::SetVelocity { percent } => {
                if *percent > MAX_VELOCITY_PERCENT {
                    return Err(ProtocolError::InvalidArgument(format!(
                        "velocity must be at most {MAX_VELOCITY_PERCENT} percent, got {percent}"
                    )));
                }
                format!("sv{}", hex::u8_to_hex(*percent))
            }
            Command::SetGroupAddress { group } => format!("ga{group}"),
            Command::PaddleDriveTime {
                paddle,
                milliseconds,
                direction,
            } => {
                if *milliseconds > MAX_DRIVE_TIME_MS {
                    return Err(ProtocolError::InvalidArgument(format!(
                        "drive time must be at most {MAX_DRIVE_TIME_MS} ms, got {milliseconds}"
                    )));
                }
                let operand = match direction {
                    MotorDirection::Forward => hex::u16_to_hex(*milliseconds),
                    // Direction flag lives in the top nibble.
                    MotorDirection::Backward => hex::u16_to_hex(0x8000 | *milliseconds),
                };
                format!("t{}{}", motor_num(*paddle)?, operand)
            }
            Command::PaddleMoveAbsolute { paddle, steps } => {
                format!("a{}{}", motor_num(*paddle)?, paddle_step_operand(*steps)?)
            }
            Command::PaddleMoveRelative { paddle, steps } => {
                format!("r{}{}", motor_num(*paddle)?, paddle_step_operand(*steps)?)
            }
            Command::SaveUserData => "us".to_string(),
            Command::OptimizeMotors => "om".to_string(),
            Command::CleanMechanics => "cm".to_string(),
            Command::StopClean => "st".to_string(),
            Command::ChangeAddress { new_address } => format!("ca{new_address}"),
            Command::GetStatus => "gs".to_string(),
            Command::Energize { frequency_hz } => {
                if !(ENERGIZE_MIN_HZ..=ENERGIZE_MAX_HZ).contains(frequency_hz) {
                    return Err(ProtocolError::InvalidArgument(format!(
                        "energize frequency must be {ENERGIZE_MIN_HZ} Hz to {ENERGIZE_MAX_HZ} Hz, got {frequency_hz}"
                    )));
                }
                let period = (DRIVE_CLOCK_HZ / frequency_hz).round() as u16;
                format!("e1{}", hex::u16_to_hex(period))
            }
            Command::Halt => "h1".to_string(),
        };
        Ok(format!("{address}{body}"))
    }
}

fn motor_num(motor: u8) -> Result<u8, ProtocolError> {
    if !(1..=3).contains(&motor) {
        return Err(ProtocolError::InvalidArgument(format!(
            "motor number must be 1, 2 or 3, got {motor}"
        )));
    }
    Ok(motor)
}

fn step_operand(steps: i64) -> Result<String, ProtocolError> {
    check_step_range(steps)?;
    Ok(hex::step_to_hex(steps, STEP_HEX_WIDTH))
}

fn paddle_step_operand(steps: i64) -> Result<String, ProtocolError> {
    check_step_range(steps)?;
    Ok(hex::step_to_hex(steps, PADDLE_HEX_WIDTH))
}

fn check_step_range(steps: i64) -> Result<(), ProtocolError> {
    if steps < i32::MIN as i64 || steps > i32::MAX as i64 {
        return Err(ProtocolError::InvalidArgument(format!(
            "step count {steps} outside the 32-bit wire range"
        )));
    }
    Ok(())
}
