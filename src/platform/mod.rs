pub mod slack;

#[cfg(test)]
pub mod testing;

use async_trait::async_trait;

use crate::bot::destination::Destination;
use crate::bot::user::User;
use crate::error::TransportError;

/// Handle to a conversation opened with a user.
///
/// Produced by `open_conversation`, consumed by later phases; opening a
/// conversation does not guarantee it is immediately usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationHandle {
    pub id: String,
}

impl ConversationHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Outbound message options.
#[derive(Debug, Clone)]
pub struct MessageOptions {
    /// Post as the bot user rather than an app identity
    pub as_user: bool,
}

impl Default for MessageOptions {
    fn default() -> Self {
        Self { as_user: true }
    }
}

/// Narrow platform contract the engine depends on.
///
/// Each operation is opaque remote work that succeeds, fails, or reports a
/// still-pending precondition (`TransportError::Pending`). Wire format and
/// authentication are the implementation's business.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(
        &self,
        destination: &Destination,
        text: &str,
        options: &MessageOptions,
    ) -> Result<(), TransportError>;

    async fn open_conversation(&self, user: &User) -> Result<ConversationHandle, TransportError>;

    /// Whether a previously opened conversation is usable yet.
    async fn conversation_ready(&self, handle: &ConversationHandle)
        -> Result<bool, TransportError>;
}
