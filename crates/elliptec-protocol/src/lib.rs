//! Elliptec bus wire protocol.
//!
//! This crate implements the command/response protocol spoken by Thorlabs
//! Elliptec resonant-piezo stages (rotary and linear stages, polarization
//! paddles, the ELL5 piezo actuator) on their shared serial bus. It is pure
//! protocol: no I/O happens here. The companion `elliptec-bus` crate drives a
//! transport with these types.
//!
//! # Protocol Overview
//!
//! The bus is a half-duplex ASCII line protocol at 9600 8N1:
//!
//! - **Commands** (host → device): `<address><opcode>[<operand>]`, where the
//!   address is a single hex digit (`0`-`F`), the opcode is two lowercase
//!   letters or a letter plus motor digit, and operands are fixed-width
//!   uppercase hex or decimal fields.
//! - **Replies** (device → host): `<address><tag><payload>` terminated with
//!   CR+LF. The two-character tag selects the payload layout.
//!
//! Signed quantities (positions, offsets, jog sizes) travel as the 32-bit
//! two's-complement value rendered in hex; see [`hex`].
//!
//! # Example
//!
//! ```
//! use elliptec_protocol::{BusAddress, Command, Response};
//!
//! let addr = BusAddress::new(2).unwrap();
//! let frame = Command::MoveAbsolute { steps: 0x23000 }.encode(addr).unwrap();
//! assert_eq!(frame, "2ma00023000");
//!
//! let reply = Response::parse("2PO00023000").unwrap();
//! assert!(matches!(reply, Response::Position { steps: 0x23000, .. }));
//! ```

mod address;
mod commands;
pub mod constants;
mod device;
mod error;
pub mod hex;
mod responses;
mod status;
pub mod units;

pub use address::*;
pub use commands::*;
pub use device::*;
pub use error::*;
pub use responses::*;
pub use status::*;
