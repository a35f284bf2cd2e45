use async_trait::async_trait;

use crate::bot::destination::{Destination, DestinationKind};
use crate::bot::user::User;
use crate::error::{StrategyError, TransportError};
use crate::platform::{ConversationHandle, MessageOptions, Transport};
use crate::strategy::{PhaseOutcome, Strategy};

const PHASES: &[&str] = &["getconversation", "waitconversation", "sendmessage"];

/// Delivers a message to a user's direct conversation.
///
/// Opening a DM is indirect: the conversation must be resolved first and may
/// not be usable the moment it is created, so delivery is three phases —
/// resolve the handle, wait for it to become usable, then post.
pub struct SendUserStrategy {
    target: User,
    text: String,
    options: MessageOptions,
    /// Handle produced by `getconversation`, read by the later phases
    conversation: Option<ConversationHandle>,
}

impl SendUserStrategy {
    pub fn new(target: User, text: String) -> Self {
        Self {
            target,
            text,
            options: MessageOptions::default(),
            conversation: None,
        }
    }

    fn remote(operation: &str, err: &TransportError) -> PhaseOutcome {
        PhaseOutcome::Failed(StrategyError::Remote {
            operation: operation.to_string(),
            reason: err.to_string(),
        })
    }
}

#[async_trait]
impl Strategy for SendUserStrategy {
    fn name(&self) -> &'static str {
        "send_user"
    }

    fn phases(&self) -> &'static [&'static str] {
        PHASES
    }

    async fn run_phase(&mut self, phase: &str, transport: &dyn Transport) -> PhaseOutcome {
        match phase {
            "getconversation" => match transport.open_conversation(&self.target).await {
                Ok(handle) => {
                    self.conversation = Some(handle);
                    PhaseOutcome::Complete
                }
                Err(TransportError::Pending(_)) => PhaseOutcome::Pending,
                Err(err) => Self::remote("open_conversation", &err),
            },
            "waitconversation" => {
                let Some(handle) = self.conversation.clone() else {
                    // Unreachable under the runner's ordering guarantee.
                    return PhaseOutcome::Failed(StrategyError::Remote {
                        operation: "conversation_ready".to_string(),
                        reason: "no conversation handle".to_string(),
                    });
                };
                match transport.conversation_ready(&handle).await {
                    Ok(true) => PhaseOutcome::Complete,
                    Ok(false) => PhaseOutcome::Pending,
                    Err(TransportError::Pending(_)) => PhaseOutcome::Pending,
                    Err(err) => Self::remote("conversation_ready", &err),
                }
            }
            "sendmessage" => {
                let Some(handle) = self.conversation.clone() else {
                    return PhaseOutcome::Failed(StrategyError::Remote {
                        operation: "send_message".to_string(),
                        reason: "no conversation handle".to_string(),
                    });
                };
                let destination =
                    Destination::new(handle.id, DestinationKind::Direct, self.target.name.clone());
                match transport
                    .send_message(&destination, &self.text, &self.options)
                    .await
                {
                    Ok(()) => PhaseOutcome::Complete,
                    Err(TransportError::Pending(_)) => PhaseOutcome::Pending,
                    Err(err) => Self::remote("send_message", &err),
                }
            }
            other => PhaseOutcome::Failed(StrategyError::Remote {
                operation: other.to_string(),
                reason: "unknown phase".to_string(),
            }),
        }
    }
}
