//! Scripted transport for engine tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::bot::destination::Destination;
use crate::bot::user::User;
use crate::error::TransportError;
use crate::platform::{ConversationHandle, MessageOptions, Transport};

/// Transport whose per-operation outcomes are queued up front by a test.
///
/// Each call pops the next scripted result for that operation; an empty queue
/// means success (a handle named after the user for `open_conversation`).
/// Every invocation is recorded so tests can assert ordering and counts.
#[derive(Default)]
pub struct MockTransport {
    opens: Mutex<VecDeque<Result<ConversationHandle, TransportError>>>,
    readies: Mutex<VecDeque<Result<bool, TransportError>>>,
    sends: Mutex<VecDeque<Result<(), TransportError>>>,
    send_delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_open(&self, result: Result<ConversationHandle, TransportError>) {
        self.opens.lock().unwrap().push_back(result);
    }

    pub fn script_ready(&self, result: Result<bool, TransportError>) {
        self.readies.lock().unwrap().push_back(result);
    }

    pub fn script_send(&self, result: Result<(), TransportError>) {
        self.sends.lock().unwrap().push_back(result);
    }

    /// Make every `send_message` sleep before completing, to model a slow
    /// remote under a paused test clock.
    pub fn set_send_delay(&self, delay: Duration) {
        *self.send_delay.lock().unwrap() = Some(delay);
    }

    /// Invocation log, e.g. `["open:U1", "ready:DM-U1", "send:DM-U1:hi"]`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_message(
        &self,
        destination: &Destination,
        text: &str,
        _options: &MessageOptions,
    ) -> Result<(), TransportError> {
        let delay = *self.send_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.record(format!("send:{}:{}", destination.id, text));
        self.sends.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn open_conversation(&self, user: &User) -> Result<ConversationHandle, TransportError> {
        self.record(format!("open:{}", user.id));
        self.opens
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ConversationHandle::new(format!("DM-{}", user.id))))
    }

    async fn conversation_ready(
        &self,
        handle: &ConversationHandle,
    ) -> Result<bool, TransportError> {
        self.record(format!("ready:{}", handle.id));
        self.readies.lock().unwrap().pop_front().unwrap_or(Ok(true))
    }
}
