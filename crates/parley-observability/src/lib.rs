//! Logging setup shared by the Parley front ends.

pub mod error;
pub mod logging;

pub use error::{ObservabilityError, Result};
pub use logging::{conversation_span, LogManager, LogTarget};
