//! Host-side driver for the Elliptec motion-control bus.
//!
//! Builds on [`elliptec_protocol`] to run the half-duplex request/response
//! discipline over a byte-stream transport: device discovery, the full
//! command surface, per-device position tracking and the closed-loop
//! verification of motion commands.
//!
//! The bus is strictly one outstanding request at a time; a [`BusSession`]
//! owns its transport and registry, so exclusive access falls out of Rust
//! ownership. Wrap the session in a mutex if multiple callers need it.
//!
//! # Example
//!
//! With the `serial` feature enabled, [`serial::SerialTransport::open`]
//! provides the physical transport; the example below scripts a mock one.
//!
//! ```
//! # fn main() -> Result<(), elliptec_bus::BusError> {
//! use elliptec_bus::{BusSession, SessionConfig};
//! use elliptec_bus::transport::MockTransport;
//!
//! let mut link = MockTransport::new();
//! link.push_reply("0IN0E1140051620231701016800023000");
//! link.push_reply("0PO00000000");
//!
//! let config = SessionConfig {
//!     motor_ids: vec![0],
//!     home_on_open: false,
//!     frequency_search_on_open: false,
//!     ..SessionConfig::default()
//! };
//! let mut bus = BusSession::open(link, config)?;
//! assert_eq!(bus.registry().len(), 1);
//!
//! let addr = bus.addresses()[0];
//! bus.transport_mut().push_reply("0PO00004600");
//! let outcome = bus.move_absolute(addr, 45.0)?;
//! assert!(outcome.converged);
//! # Ok(())
//! # }
//! ```

mod error;
mod motion;
mod registry;
mod session;
pub mod transport;

#[cfg(feature = "serial")]
pub mod serial;

pub use error::*;
pub use motion::*;
pub use registry::*;
pub use session::*;
