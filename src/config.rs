use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub slack: SlackConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SlackConfig {
    pub api_token: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    /// Name the bot answers to in channels (besides a direct mention)
    #[serde(default = "default_bot_name")]
    pub name: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Re-poll cadence for pending strategy phases
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Wait budget for a pending phase unless overridden per phase
    #[serde(default = "default_max_wait_ms")]
    pub default_max_wait_ms: u64,
    /// Cadence of the inbound message poller
    #[serde(default = "default_inbound_poll_ms")]
    pub inbound_poll_ms: u64,
    /// Per-phase wait budget overrides, keyed by phase name
    #[serde(default)]
    pub phase_budget_ms: HashMap<String, u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            default_max_wait_ms: default_max_wait_ms(),
            inbound_poll_ms: default_inbound_poll_ms(),
            phase_budget_ms: HashMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn inbound_poll(&self) -> Duration {
        Duration::from_millis(self.inbound_poll_ms)
    }
}

fn default_base_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_bot_name() -> String {
    "chatbot".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_max_wait_ms() -> u64 {
    30_000
}

fn default_inbound_poll_ms() -> u64 {
    1_000
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        anyhow::ensure!(
            !config.slack.api_token.is_empty(),
            "slack.api_token must be set"
        );

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: Config = toml::from_str(
            r#"
            [slack]
            api_token = "xoxb-test"
            "#,
        )
        .unwrap();

        assert_eq!(config.slack.base_url, "https://slack.com/api");
        assert_eq!(config.bot.name, "chatbot");
        assert_eq!(config.engine.poll_interval_ms, 500);
        assert_eq!(config.engine.default_max_wait_ms, 30_000);
        assert!(config.engine.phase_budget_ms.is_empty());
    }

    #[test]
    fn test_phase_budget_overrides_parse() {
        let config: Config = toml::from_str(
            r#"
            [slack]
            api_token = "xoxb-test"

            [engine]
            poll_interval_ms = 250

            [engine.phase_budget_ms]
            waitconversation = 15000
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.poll_interval_ms, 250);
        assert_eq!(
            config.engine.phase_budget_ms.get("waitconversation"),
            Some(&15_000)
        );
    }

    #[test]
    fn test_missing_slack_section_is_an_error() {
        let result: std::result::Result<Config, _> = toml::from_str("[bot]\nname = \"x\"\n");
        assert!(result.is_err());
    }
}
