pub mod logging;
pub mod message;
pub mod outcome;

pub use message::{Message, MessageError};
pub use outcome::DispatchOutcome;
pub use tracing;

/// Control signal broadcast to long-running tasks.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Shutdown,
}
