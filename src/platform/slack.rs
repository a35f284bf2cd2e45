use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bot::destination::{Destination, DestinationKind, Roster};
use crate::bot::user::User;
use crate::bot::Message;
use crate::config::SlackConfig;
use crate::error::TransportError;
use crate::platform::{ConversationHandle, MessageOptions, Transport};

/// Slack Web API client.
///
/// Covers the handful of endpoints the engine needs; every call goes through
/// the same envelope check (`ok` / `error` / `warning`) the platform wraps
/// its responses in.
pub struct SlackClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct AuthTest {
    user_id: String,
    user: String,
}

#[derive(Debug, Deserialize)]
struct MemberList {
    members: Vec<Member>,
}

#[derive(Debug, Deserialize)]
struct Member {
    id: String,
    name: String,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    deleted: bool,
}

#[derive(Debug, Deserialize)]
struct ChannelList {
    channels: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_group: bool,
    #[serde(default)]
    is_im: bool,
    #[serde(default)]
    is_member: bool,
    #[serde(default)]
    is_open: bool,
    /// Counterpart user for direct conversations
    #[serde(default)]
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConversationOpened {
    channel: OpenedChannel,
}

#[derive(Debug, Deserialize)]
struct OpenedChannel {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ConversationInfo {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct History {
    #[serde(default)]
    messages: Vec<HistoryMessage>,
}

#[derive(Debug, Deserialize)]
struct HistoryMessage {
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: String,
    ts: String,
    #[serde(default)]
    subtype: Option<String>,
}

/// Check Slack's response envelope, then decode the payload.
fn decode_envelope<T: DeserializeOwned>(
    method: &str,
    value: serde_json::Value,
) -> Result<T, TransportError> {
    let ok = value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false);
    if !ok {
        let reason = value
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown_error")
            .to_string();
        error!("{method} failed: {reason}");
        return Err(TransportError::Rejected(reason));
    }

    if let Some(warning) = value.get("warning").and_then(|v| v.as_str()) {
        warn!("{method}: {warning}");
    }

    Ok(serde_json::from_value(value)?)
}

/// Slack message timestamps are `"<secs>.<micros>"` strings.
fn parse_ts(ts: &str) -> DateTime<Utc> {
    let mut parts = ts.splitn(2, '.');
    let secs = parts.next().and_then(|s| s.parse::<i64>().ok()).unwrap_or(0);
    let micros = parts.next().and_then(|s| s.parse::<u32>().ok()).unwrap_or(0);
    Utc.timestamp_opt(secs, micros * 1_000)
        .single()
        .unwrap_or_else(Utc::now)
}

impl SlackClient {
    pub fn new(config: &SlackConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            token: config.api_token.clone(),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, String)],
    ) -> Result<T, TransportError> {
        debug!("GET {method}");
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Rejected(format!(
                "{method} returned HTTP {status}"
            )));
        }

        decode_envelope(method, response.json().await?)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, TransportError> {
        debug!("POST {method}");
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Rejected(format!(
                "{method} returned HTTP {status}"
            )));
        }

        decode_envelope(method, response.json().await?)
    }

    /// Resolve the bot's own platform identity.
    pub async fn bot_identity(&self) -> Result<User, TransportError> {
        let auth: AuthTest = self.call("auth.test", &[]).await?;
        info!("Authenticated as {} ({})", auth.user, auth.user_id);
        Ok(User::new(auth.user_id, auth.user))
    }

    /// Populate the roster from the workspace. Returns the conversation IDs
    /// the bot should listen on (joined channels plus open DMs).
    pub async fn load_roster(&self, roster: &Roster) -> Result<Vec<String>, TransportError> {
        let members: MemberList = self.call("users.list", &[]).await?;
        for member in members.members {
            if member.deleted {
                continue;
            }
            let mut user = User::new(member.id, member.name);
            user.real_name = member.real_name;
            roster.insert_user(user);
        }

        let channels: ChannelList = self
            .call(
                "conversations.list",
                &[
                    (
                        "types",
                        "public_channel,private_channel,im".to_string(),
                    ),
                    ("exclude_archived", "true".to_string()),
                ],
            )
            .await?;

        let mut listen = Vec::new();
        for channel in channels.channels {
            let kind = if channel.is_im {
                DestinationKind::Direct
            } else if channel.is_group {
                DestinationKind::Group
            } else {
                DestinationKind::Channel
            };

            // A DM has no name on the wire; label it with the counterpart.
            let name = if channel.name.is_empty() {
                channel.user.clone().unwrap_or_else(|| channel.id.clone())
            } else {
                channel.name.clone()
            };

            if channel.is_member || channel.is_im {
                listen.push(channel.id.clone());
            }
            roster.insert_destination(Destination::new(channel.id, kind, name));
        }

        Ok(listen)
    }

    async fn history(
        &self,
        channel: &str,
        oldest: &str,
    ) -> Result<Vec<HistoryMessage>, TransportError> {
        let history: History = self
            .call(
                "conversations.history",
                &[
                    ("channel", channel.to_string()),
                    ("oldest", oldest.to_string()),
                ],
            )
            .await?;
        // Slack returns newest first.
        let mut messages = history.messages;
        messages.reverse();
        Ok(messages)
    }

    /// Spawn one polling task per conversation, each pushing new messages
    /// into the engine. A conversation whose poll fails keeps its cursor and
    /// retries on the next tick, without holding up the others. Each task
    /// runs until the receiving side hangs up.
    pub fn spawn_listener(
        self: Arc<Self>,
        conversations: Vec<String>,
        tx: mpsc::Sender<Message>,
        interval: Duration,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let start = format!("{}.000000", Utc::now().timestamp());
        info!("Listening on {} conversations", conversations.len());

        conversations
            .into_iter()
            .map(|conversation| {
                let client = Arc::clone(&self);
                let tx = tx.clone();
                let mut oldest = start.clone();
                tokio::spawn(async move {
                    loop {
                        match client.history(&conversation, &oldest).await {
                            Ok(messages) => {
                                for raw in messages {
                                    oldest = raw.ts.clone();
                                    // Joins, topic changes and other system
                                    // messages carry a subtype; only plain
                                    // user messages are commands.
                                    if raw.subtype.is_some() {
                                        continue;
                                    }
                                    let Some(sender) = raw.user else { continue };
                                    let message = Message {
                                        sender,
                                        destination: conversation.clone(),
                                        text: raw.text,
                                        ts: parse_ts(&raw.ts),
                                    };
                                    if tx.send(message).await.is_err() {
                                        info!("engine hung up, stopping listener");
                                        return;
                                    }
                                }
                            }
                            Err(err) => {
                                warn!("history poll for {conversation} failed: {err}");
                            }
                        }
                        tokio::time::sleep(interval).await;
                    }
                })
            })
            .collect()
    }
}

#[async_trait]
impl Transport for SlackClient {
    async fn send_message(
        &self,
        destination: &Destination,
        text: &str,
        options: &MessageOptions,
    ) -> Result<(), TransportError> {
        let body = json!({
            "channel": destination.id,
            "text": text,
            "as_user": options.as_user,
        });
        let _: serde_json::Value = self.post("chat.postMessage", &body).await?;
        Ok(())
    }

    async fn open_conversation(&self, user: &User) -> Result<ConversationHandle, TransportError> {
        let body = json!({ "users": user.id });
        let opened: ConversationOpened = self.post("conversations.open", &body).await?;
        Ok(ConversationHandle::new(opened.channel.id))
    }

    async fn conversation_ready(
        &self,
        handle: &ConversationHandle,
    ) -> Result<bool, TransportError> {
        let info: ConversationInfo = self
            .call(
                "conversations.info",
                &[("channel", handle.id.clone())],
            )
            .await?;
        // Only DMs report open-ness; other conversation kinds are usable as
        // soon as they exist.
        Ok(!info.channel.is_im || info.channel.is_open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_error_is_rejected() {
        let value = json!({ "ok": false, "error": "channel_not_found" });
        let result: Result<serde_json::Value, _> = decode_envelope("conversations.info", value);
        match result {
            Err(TransportError::Rejected(reason)) => assert_eq!(reason, "channel_not_found"),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_envelope_ok_decodes_payload() {
        let value = json!({
            "ok": true,
            "warning": "superfluous_charset",
            "channel": { "id": "D123", "is_im": true, "is_open": true }
        });
        let info: ConversationInfo = decode_envelope("conversations.info", value).unwrap();
        assert_eq!(info.channel.id, "D123");
        assert!(info.channel.is_open);
    }

    #[test]
    fn test_parse_ts() {
        let ts = parse_ts("1500000000.000400");
        assert_eq!(ts.timestamp(), 1_500_000_000);
        assert_eq!(ts.timestamp_subsec_micros(), 400);
    }

    #[tokio::test]
    async fn test_listener_spawns_one_task_per_conversation() {
        // An unroutable endpoint: the tasks just poll and retry, which is
        // all this test needs them to do.
        let client = Arc::new(SlackClient::new(&SlackConfig {
            api_token: "xoxb-test".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
        }));
        let (tx, _rx) = mpsc::channel(8);

        let conversations = vec!["C1".to_string(), "C2".to_string(), "D1".to_string()];
        let handles = client.spawn_listener(conversations, tx, Duration::from_secs(60));

        assert_eq!(handles.len(), 3);
        for handle in handles {
            handle.abort();
        }
    }

    #[test]
    fn test_history_message_decoding_tolerates_subtypes() {
        let value = json!({
            "ok": true,
            "messages": [
                { "user": "U1", "text": "hello", "ts": "1500000000.000100" },
                { "subtype": "channel_join", "text": "joined", "ts": "1500000000.000200" }
            ]
        });
        let history: History = decode_envelope("conversations.history", value).unwrap();
        assert_eq!(history.messages.len(), 2);
        assert_eq!(history.messages[0].user.as_deref(), Some("U1"));
        assert_eq!(history.messages[1].subtype.as_deref(), Some("channel_join"));
    }
}
