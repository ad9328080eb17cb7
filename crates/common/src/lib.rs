//! Shared types for the WHOOP OAuth workspace

mod clock;
mod error;
mod secret;

pub use clock::{Clock, MockClock, SystemClock};
pub use error::{Error, Result};
pub use secret::Secret;
