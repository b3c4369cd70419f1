//! Service Layer
//!
//! Couples the engine and the tracker and runs them.
//! The session is deterministic; the driver adds wall-clock time on top.

pub mod session;
pub mod driver;

pub use session::{RoundSession, SessionSnapshot};
pub use driver::{spawn, DriverCommand, DriverError, DriverHandle};
