use crate::bot::user::BotUser;
use crate::bot::Message;

/// Outcome of analyzing one message against one command.
///
/// `NoMatch` is a normal negative result, not an error: it tells the engine
/// to stop feeding this parser into that command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The message fully satisfied what the command needed.
    Matched,
    /// The message contributed, but the command still wants more input.
    Partial,
    /// Nothing in the message was relevant to the command.
    NoMatch,
}

/// Single-message analysis unit.
///
/// Created per inbound message and discarded after the matching pass. Holds
/// no cross-message state, so analyzing the same parser against many
/// candidate commands cannot cross-contaminate them.
#[derive(Debug, Clone)]
pub struct TextParser {
    message: Message,
    /// Whitespace tokens with any leading bot address stripped
    tokens: Vec<String>,
    /// Whether the message opened by addressing the bot
    addressed: bool,
}

impl TextParser {
    pub fn new(message: Message, bot: &BotUser) -> Self {
        let mut tokens: Vec<String> = message.text.split_whitespace().map(str::to_string).collect();

        let mut addressed = false;
        if let Some(first) = tokens.first() {
            let mentions_bot = mention_id(first).is_some_and(|id| id == bot.user.id);
            // The bot answers to its platform identity and to its configured
            // trigger name, which may differ.
            let plain = first.trim_end_matches(':');
            let names_bot = plain.eq_ignore_ascii_case(&bot.user.name)
                || plain.eq_ignore_ascii_case(bot.alias());
            if mentions_bot || names_bot {
                addressed = true;
                tokens.remove(0);
            }
        }

        Self {
            message,
            tokens,
            addressed,
        }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Whether the message opened with a bot mention or the bot's name.
    pub fn is_addressed(&self) -> bool {
        self.addressed
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Candidate command selector: the first content token, lowercased.
    pub fn selector(&self) -> Option<String> {
        self.tokens.first().map(|t| t.to_lowercase())
    }

    /// Tokens after the selector.
    pub fn args(&self) -> &[String] {
        self.tokens.get(1..).unwrap_or(&[])
    }
}

/// Extract the user ID from a `<@U123>` or `<@U123|name>` mention token.
pub fn mention_id(token: &str) -> Option<&str> {
    let inner = token.strip_prefix("<@")?.strip_suffix('>')?;
    inner.split('|').next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::user::User;

    fn bot() -> BotUser {
        BotUser::new(User::new("UBOT", "chatbot"))
    }

    #[test]
    fn test_selector_and_args() {
        let parser = TextParser::new(Message::new("U1", "C1", "echo hello world"), &bot());
        assert_eq!(parser.selector().as_deref(), Some("echo"));
        assert_eq!(parser.args(), ["hello", "world"]);
        assert!(!parser.is_addressed());
    }

    #[test]
    fn test_leading_mention_is_stripped() {
        let parser = TextParser::new(Message::new("U1", "C1", "<@UBOT> ping"), &bot());
        assert!(parser.is_addressed());
        assert_eq!(parser.selector().as_deref(), Some("ping"));
        assert!(parser.args().is_empty());
    }

    #[test]
    fn test_bot_name_address_is_stripped() {
        let parser = TextParser::new(Message::new("U1", "C1", "chatbot: echo hi"), &bot());
        assert!(parser.is_addressed());
        assert_eq!(parser.selector().as_deref(), Some("echo"));
        assert_eq!(parser.args(), ["hi"]);
    }

    #[test]
    fn test_configured_alias_addresses_the_bot() {
        let bot = BotUser::with_alias(User::new("UBOT", "chatbot-app"), "opsbot");

        let parser = TextParser::new(Message::new("U1", "C1", "opsbot: ping"), &bot);
        assert!(parser.is_addressed());
        assert_eq!(parser.selector().as_deref(), Some("ping"));

        // The platform identity still works alongside the alias.
        let parser = TextParser::new(Message::new("U1", "C1", "chatbot-app ping"), &bot);
        assert!(parser.is_addressed());

        let parser = TextParser::new(Message::new("U1", "C1", "someone ping"), &bot);
        assert!(!parser.is_addressed());
    }

    #[test]
    fn test_mention_of_someone_else_is_kept() {
        let parser = TextParser::new(Message::new("U1", "C1", "<@UOTHER> hello"), &bot());
        assert!(!parser.is_addressed());
        assert_eq!(parser.tokens().len(), 2);
    }

    #[test]
    fn test_mention_id_formats() {
        assert_eq!(mention_id("<@U123>"), Some("U123"));
        assert_eq!(mention_id("<@U123|alice>"), Some("U123"));
        assert_eq!(mention_id("hello"), None);
    }

    #[test]
    fn test_empty_message_has_no_selector() {
        let parser = TextParser::new(Message::new("U1", "C1", "   "), &bot());
        assert_eq!(parser.selector(), None);
        assert!(parser.args().is_empty());
    }
}
