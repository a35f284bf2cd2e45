use tokio::sync::broadcast;

use crate::bot::command::CommandId;

/// Lifecycle milestones published to unrelated subsystems.
#[derive(Debug, Clone)]
pub enum BotEvent {
    /// The orchestrator is wired up and accepting inbound messages.
    ReadyToAcceptCommands,
    CommandAccepted {
        id: CommandId,
        selector: String,
    },
    CommandCompleted {
        id: CommandId,
        selector: String,
    },
    CommandFailed {
        id: CommandId,
        selector: String,
        reason: String,
    },
}

/// Process-wide publish/subscribe for lifecycle events.
///
/// Publishing never blocks and never fails the publisher: absent or lagging
/// subscribers are their own problem.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BotEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: BotEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BotEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_publish_without_subscribers_does_not_fail() {
        let bus = EventBus::new(4);
        bus.publish(BotEvent::ReadyToAcceptCommands);
    }

    #[tokio::test]
    async fn test_subscribers_see_published_events() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();

        let id = Uuid::new_v4();
        bus.publish(BotEvent::CommandAccepted {
            id,
            selector: "dm".to_string(),
        });

        match rx.recv().await.unwrap() {
            BotEvent::CommandAccepted { id: got, selector } => {
                assert_eq!(got, id);
                assert_eq!(selector, "dm");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
