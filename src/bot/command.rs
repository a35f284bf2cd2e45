use anyhow::{Context, Result};
use uuid::Uuid;

use crate::bot::destination::{Roster, UserDestination};
use crate::bot::parser::{mention_id, ParseOutcome, TextParser};
use crate::strategy::{send_user::SendUserStrategy, Strategy};

pub type CommandId = Uuid;

/// Lifecycle of a command instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    /// Still accumulating input
    Pending,
    /// Fully specified, awaiting execution
    Ready,
    /// Strategy attached and running
    Executing,
    Completed,
    Failed,
}

/// Forward-only state transition; anything else is ignored. A ready command
/// never regresses to pending.
fn advance_state(current: &mut CommandState, next: CommandState) {
    use CommandState::*;
    let forward = matches!(
        (*current, next),
        (Pending, Ready)
            | (Ready, Executing)
            | (Executing, Completed)
            | (Executing, Failed)
            | (Pending, Failed)
            | (Ready, Failed)
    );
    if forward {
        *current = next;
    }
}

/// One recognized or in-progress operation, bound to the user and destination
/// that invoked it.
pub trait Command: Send {
    fn id(&self) -> CommandId;

    /// The command's selector token (e.g. `dm`).
    fn selector(&self) -> &str;

    fn state(&self) -> CommandState;

    fn set_state(&mut self, next: CommandState);

    /// Monotonic readiness: once true, never false again.
    fn is_ready(&self) -> bool;

    /// Accumulate one parsed message, in arrival order. Must tolerate being
    /// called on an already-ready command.
    fn ingest(&mut self, parser: TextParser) -> ParseOutcome;

    fn user_destination(&self) -> &UserDestination;

    /// Reply text for commands whose whole effect is a message back to the
    /// originating destination.
    fn direct_reply(&self) -> Option<String> {
        None
    }

    /// The remote-effect plan for this command once ready. `None` means a
    /// direct reply suffices.
    fn build_strategy(&self, roster: &Roster) -> Result<Option<Box<dyn Strategy>>>;
}

/// A command that is fully specified at construction: fixed selector, fixed
/// reply, no further input needed.
pub struct SimpleCommand {
    id: CommandId,
    selector: String,
    reply: String,
    user_destination: UserDestination,
    state: CommandState,
}

impl SimpleCommand {
    pub fn new(
        selector: impl Into<String>,
        reply: impl Into<String>,
        user_destination: UserDestination,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            selector: selector.into(),
            reply: reply.into(),
            user_destination,
            state: CommandState::Ready,
        }
    }
}

impl Command for SimpleCommand {
    fn id(&self) -> CommandId {
        self.id
    }

    fn selector(&self) -> &str {
        &self.selector
    }

    fn state(&self) -> CommandState {
        self.state
    }

    fn set_state(&mut self, next: CommandState) {
        advance_state(&mut self.state, next);
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn ingest(&mut self, parser: TextParser) -> ParseOutcome {
        // Already fully specified; further fragments change nothing.
        if parser.selector().as_deref() == Some(self.selector.as_str()) {
            ParseOutcome::Matched
        } else {
            ParseOutcome::NoMatch
        }
    }

    fn user_destination(&self) -> &UserDestination {
        &self.user_destination
    }

    fn direct_reply(&self) -> Option<String> {
        Some(self.reply.clone())
    }

    fn build_strategy(&self, _roster: &Roster) -> Result<Option<Box<dyn Strategy>>> {
        Ok(None)
    }
}

/// A command collected across one or more messages: `dm <user> <text...>`.
///
/// Requires a UserDestination up front; the constructor signature leaves no
/// way to build a half-bound interactive command. The binding is immutable
/// for the command's lifetime.
pub struct InteractiveCommand {
    id: CommandId,
    selector: String,
    user_destination: UserDestination,
    /// Ingested parsers, in arrival order
    parsed: Vec<TextParser>,
    /// Target user: a `<@UID>` mention or a name, as typed
    target: Option<String>,
    /// Message body tokens collected so far
    body: Vec<String>,
    ready: bool,
    state: CommandState,
}

impl InteractiveCommand {
    pub fn new(selector: impl Into<String>, user_destination: UserDestination) -> Self {
        Self {
            id: Uuid::new_v4(),
            selector: selector.into(),
            user_destination,
            parsed: Vec::new(),
            target: None,
            body: Vec::new(),
            ready: false,
            state: CommandState::Pending,
        }
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn body(&self) -> String {
        self.body.join(" ")
    }

    /// Ingested fragments, in arrival order.
    pub fn parsed(&self) -> &[TextParser] {
        &self.parsed
    }
}

impl Command for InteractiveCommand {
    fn id(&self) -> CommandId {
        self.id
    }

    fn selector(&self) -> &str {
        &self.selector
    }

    fn state(&self) -> CommandState {
        self.state
    }

    fn set_state(&mut self, next: CommandState) {
        advance_state(&mut self.state, next);
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn ingest(&mut self, parser: TextParser) -> ParseOutcome {
        if self.ready {
            // Tolerated on a ready command: recorded, but readiness and
            // arguments never regress.
            self.parsed.push(parser);
            return ParseOutcome::Matched;
        }

        // The opening fragment repeats the selector; later ones are raw input.
        let mut tokens = parser.tokens().to_vec();
        if self.parsed.is_empty() && parser.selector().as_deref() == Some(self.selector.as_str()) {
            tokens.remove(0);
        }

        let mut contributed = false;
        let mut iter = tokens.into_iter();
        if self.target.is_none() {
            if let Some(target) = iter.next() {
                self.target = Some(target);
                contributed = true;
            }
        }
        for token in iter {
            self.body.push(token);
            contributed = true;
        }

        self.parsed.push(parser);

        if self.target.is_some() && !self.body.is_empty() {
            self.ready = true;
            advance_state(&mut self.state, CommandState::Ready);
        }

        if self.ready {
            ParseOutcome::Matched
        } else if contributed {
            ParseOutcome::Partial
        } else {
            ParseOutcome::NoMatch
        }
    }

    fn user_destination(&self) -> &UserDestination {
        &self.user_destination
    }

    fn build_strategy(&self, roster: &Roster) -> Result<Option<Box<dyn Strategy>>> {
        let raw = self
            .target
            .as_deref()
            .context("dm command has no target user")?;

        let user = match mention_id(raw) {
            Some(id) => roster.user(id),
            None => roster.user_named(raw),
        }
        .with_context(|| format!("unknown user: {raw}"))?;

        Ok(Some(Box::new(SendUserStrategy::new(user, self.body()))))
    }
}
