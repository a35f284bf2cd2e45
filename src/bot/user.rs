/// A chat participant. Loaded from the platform at startup; the engine only
/// reads identity, never mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Platform-specific user ID
    pub id: String,
    /// Handle / short name
    pub name: String,
    /// Display name, if the platform provides one
    pub real_name: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            real_name: None,
        }
    }
}

/// The bot's own identity. Used to drop self-authored messages and to tag
/// outgoing actions.
#[derive(Debug, Clone)]
pub struct BotUser {
    pub user: User,
    /// Name the bot answers to in channels; may differ from the platform
    /// identity when `[bot] name` is configured
    alias: String,
}

impl BotUser {
    pub fn new(user: User) -> Self {
        let alias = user.name.clone();
        Self { user, alias }
    }

    /// Identity with a configured trigger name on top of it.
    pub fn with_alias(user: User, alias: impl Into<String>) -> Self {
        Self {
            user,
            alias: alias.into(),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Whether the given sender ID is the bot itself.
    pub fn is_self(&self, user_id: &str) -> bool {
        self.user.id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_user_recognizes_itself() {
        let bot = BotUser::new(User::new("UBOT", "chatbot"));
        assert!(bot.is_self("UBOT"));
        assert!(!bot.is_self("U123"));
    }

    #[test]
    fn test_alias_defaults_to_platform_name() {
        let bot = BotUser::new(User::new("UBOT", "chatbot-app"));
        assert_eq!(bot.alias(), "chatbot-app");

        let bot = BotUser::with_alias(User::new("UBOT", "chatbot-app"), "opsbot");
        assert_eq!(bot.alias(), "opsbot");
        assert_eq!(bot.user.name, "chatbot-app");
    }
}
