//! Protocol constants shared across the crate.

/// Clock driving the resonant motors; drive periods are expressed as
/// `DRIVE_CLOCK_HZ / frequency` counts.
pub const DRIVE_CLOCK_HZ: f64 = 14_740_000.0;

/// Fixed angular resolution of one paddle step, in degrees.
pub const PADDLE_DEGREES_PER_STEP: f64 = 0.33;

/// Scale of the raw motor current readings, in counts per milliamp.
pub const CURRENT_COUNTS_PER_MA: f64 = 1.866;

/// Number of (period, current) points in a current-curve dump.
pub const CURVE_POINTS: usize = 87;

/// Characters per current-curve point: 2 decimal digits period plus
/// 4 decimal digits current.
pub const CURVE_POINT_CHARS: usize = 6;

/// Total payload length of a complete current-curve reply.
pub const CURVE_PAYLOAD_CHARS: usize = CURVE_POINTS * CURVE_POINT_CHARS;

/// Highest drive frequency accepted by the set-motor-frequency command, kHz.
pub const MAX_MOTOR_FREQ_KHZ: u16 = 78;

/// Operand that requests a factory reset of a motor's drive frequency.
pub const FACTORY_RESET_OPERAND: &str = "8FFF";

/// Valid range for the ELL5 energize frequency, Hz.
pub const ENERGIZE_MIN_HZ: f64 = 230.0;
pub const ENERGIZE_MAX_HZ: f64 = 2_000_000.0;

/// Velocity is a percentage of full drive power.
pub const MAX_VELOCITY_PERCENT: u8 = 100;

/// Hex field width for signed step operands on stage commands.
pub const STEP_HEX_WIDTH: usize = 8;

/// Hex field width for paddle step and drive-time operands.
pub const PADDLE_HEX_WIDTH: usize = 4;

/// Paddle drive times must fit in 12 bits; the top nibble carries the
/// direction flag.
pub const MAX_DRIVE_TIME_MS: u16 = 0x0FFF;

/// Length of the identity record payload in an `IN` reply.
pub const INFO_PAYLOAD_CHARS: usize = 30;

/// Length of the motor parameter payload in an `I1`/`I2`/`I3` reply.
pub const MOTOR_INFO_PAYLOAD_CHARS: usize = 22;
