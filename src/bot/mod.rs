pub mod command;
pub mod destination;
pub mod events;
pub mod orchestrator;
pub mod parser;
pub mod user;

use chrono::{DateTime, Utc};

/// One inbound message from the platform. Immutable; consumed exactly once by
/// the parsing/matching pass that owns it.
#[derive(Debug, Clone)]
pub struct Message {
    /// Platform-specific sender user ID
    pub sender: String,
    /// Platform-specific conversation ID the message arrived in
    pub destination: String,
    /// The message text
    pub text: String,
    /// Arrival timestamp
    pub ts: DateTime<Utc>,
}

impl Message {
    pub fn new(
        sender: impl Into<String>,
        destination: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            destination: destination.into(),
            text: text.into(),
            ts: Utc::now(),
        }
    }
}
