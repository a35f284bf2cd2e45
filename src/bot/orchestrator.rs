use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bot::command::{Command, CommandId, CommandState, InteractiveCommand, SimpleCommand};
use crate::bot::destination::{Destination, Roster, UserDestination};
use crate::bot::events::{BotEvent, EventBus};
use crate::bot::parser::TextParser;
use crate::bot::user::BotUser;
use crate::bot::Message;
use crate::config::EngineConfig;
use crate::error::StrategyError;
use crate::platform::{MessageOptions, Transport};
use crate::strategy::{DriveOutcome, Strategy, StrategyRunner};

/// Report sent back from a spawned strategy task.
struct StrategyReport {
    command_id: CommandId,
    selector: String,
    destination: Destination,
    result: Result<DriveOutcome, StrategyError>,
}

/// Bookkeeping for a command whose strategy is running.
struct InFlight {
    command: Box<dyn Command>,
    abandoned: Arc<AtomicBool>,
}

/// Owns the live commands and strategies: routes inbound messages into
/// matching commands, spawns one task per ready command's strategy, and
/// retires commands as their strategies report back.
///
/// Commands for different user-destinations never block one another; all
/// cross-task communication goes over channels.
pub struct Orchestrator {
    transport: Arc<dyn Transport>,
    roster: Arc<Roster>,
    bot_user: BotUser,
    events: EventBus,
    runner: Arc<StrategyRunner>,
    /// Interactive commands still accumulating input, keyed by
    /// UserDestination::key()
    pending: HashMap<String, Box<dyn Command>>,
    in_flight: HashMap<CommandId, InFlight>,
    report_tx: mpsc::Sender<StrategyReport>,
    report_rx: mpsc::Receiver<StrategyReport>,
}

impl Orchestrator {
    pub fn new(
        transport: Arc<dyn Transport>,
        roster: Arc<Roster>,
        bot_user: BotUser,
        events: EventBus,
        engine: &EngineConfig,
    ) -> Self {
        let (report_tx, report_rx) = mpsc::channel(32);
        Self {
            transport,
            roster,
            bot_user,
            events,
            runner: Arc::new(StrategyRunner::new(engine)),
            pending: HashMap::new(),
            in_flight: HashMap::new(),
            report_tx,
            report_rx,
        }
    }

    /// Event loop: one inbound message or one strategy report at a time.
    /// Returns when the inbound channel closes.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<Message>) -> Result<()> {
        self.events.publish(BotEvent::ReadyToAcceptCommands);
        info!("Ready to accept commands");

        loop {
            tokio::select! {
                maybe = inbound.recv() => match maybe {
                    Some(message) => self.handle_message(message),
                    None => break,
                },
                Some(report) = self.report_rx.recv() => self.handle_report(report),
            }
        }

        info!("Inbound channel closed, shutting down");
        Ok(())
    }

    fn handle_message(&mut self, message: Message) {
        // The bot's own messages are not commands.
        if self.bot_user.is_self(&message.sender) {
            return;
        }

        let Some(user) = self.roster.user(&message.sender) else {
            debug!("Message from unknown user {}, ignoring", message.sender);
            return;
        };
        let Some(destination) = self.roster.destination(&message.destination) else {
            debug!(
                "Message in unknown destination {}, ignoring",
                message.destination
            );
            return;
        };

        let ud = UserDestination::new(destination, user);
        let key = ud.key();
        let parser = TextParser::new(message, &self.bot_user);

        // A pending command for this user-destination gets first claim on the
        // message.
        if let Some(mut command) = self.pending.remove(&key) {
            let outcome = command.ingest(parser);
            debug!(
                "Fed `{}` for {}: {:?} (ready: {})",
                command.selector(),
                key,
                outcome,
                command.is_ready()
            );
            if command.is_ready() {
                self.execute(command);
            } else {
                self.pending.insert(key, command);
            }
            return;
        }

        // Otherwise try to recognize a new command. In channels the bot must
        // be addressed; DMs are implicitly addressed.
        let direct = ud.destination.kind == crate::bot::destination::DestinationKind::Direct;
        if !direct && !parser.is_addressed() {
            return;
        }

        let Some(mut command) = self.recognize(&parser, &ud) else {
            debug!("No command recognized in: {}", parser.message().text);
            return;
        };

        self.events.publish(BotEvent::CommandAccepted {
            id: command.id(),
            selector: command.selector().to_string(),
        });

        command.ingest(parser);
        if command.is_ready() {
            self.execute(command);
        } else {
            self.pending.insert(key, command);
        }
    }

    /// Built-in selector table.
    fn recognize(&self, parser: &TextParser, ud: &UserDestination) -> Option<Box<dyn Command>> {
        match parser.selector()?.as_str() {
            "ping" => Some(Box::new(SimpleCommand::new("ping", "pong", ud.clone()))),
            "echo" => Some(Box::new(SimpleCommand::new(
                "echo",
                parser.args().join(" "),
                ud.clone(),
            ))),
            "dm" => Some(Box::new(InteractiveCommand::new("dm", ud.clone()))),
            other => {
                debug!("Unrecognized selector: {other}");
                None
            }
        }
    }

    fn execute(&mut self, mut command: Box<dyn Command>) {
        command.set_state(CommandState::Executing);
        info!("Executing `{}` ({})", command.selector(), command.id());

        match command.build_strategy(&self.roster) {
            Ok(Some(strategy)) => self.spawn_strategy(command, strategy),
            // No multi-phase plan; a direct reply is the whole effect. It
            // still runs off this task so a slow remote cannot stall
            // commands from other destinations.
            Ok(None) => match command.direct_reply() {
                Some(reply) => self.spawn_reply(command, reply),
                None => {
                    command.set_state(CommandState::Completed);
                    self.events.publish(BotEvent::CommandCompleted {
                        id: command.id(),
                        selector: command.selector().to_string(),
                    });
                }
            },
            Err(err) => {
                warn!(
                    "Command `{}` could not build its strategy: {err:#}",
                    command.selector()
                );
                command.set_state(CommandState::Failed);
                self.events.publish(BotEvent::CommandFailed {
                    id: command.id(),
                    selector: command.selector().to_string(),
                    reason: format!("{err:#}"),
                });
                let destination = command.user_destination().destination.clone();
                let notice = format!("`{}` failed: {err:#}", command.selector());
                self.spawn_notice(destination, notice);
            }
        }
    }

    /// Deliver a direct reply on its own task; the outcome comes back over
    /// the report channel like any strategy result.
    fn spawn_reply(&mut self, command: Box<dyn Command>, reply: String) {
        let command_id = command.id();
        let selector = command.selector().to_string();
        let destination = command.user_destination().destination.clone();

        let transport = Arc::clone(&self.transport);
        let report_tx = self.report_tx.clone();
        let target = destination.clone();

        tokio::spawn(async move {
            let result = match transport
                .send_message(&target, &reply, &MessageOptions::default())
                .await
            {
                Ok(()) => Ok(DriveOutcome::Completed),
                Err(err) => Err(StrategyError::Remote {
                    operation: "send_message".to_string(),
                    reason: err.to_string(),
                }),
            };
            let _ = report_tx
                .send(StrategyReport {
                    command_id,
                    selector,
                    destination,
                    result,
                })
                .await;
        });

        self.in_flight.insert(
            command_id,
            InFlight {
                command,
                abandoned: Arc::new(AtomicBool::new(false)),
            },
        );
    }

    /// Best-effort notice back to where a command came from. Fire and
    /// forget: delivery failures are logged and not retried.
    fn spawn_notice(&self, destination: Destination, notice: String) {
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            if let Err(err) = transport
                .send_message(&destination, &notice, &MessageOptions::default())
                .await
            {
                warn!("Failure notice could not be delivered: {err}");
            }
        });
    }

    fn spawn_strategy(&mut self, command: Box<dyn Command>, mut strategy: Box<dyn Strategy>) {
        let abandoned = Arc::new(AtomicBool::new(false));
        let command_id = command.id();
        let selector = command.selector().to_string();
        let destination = command.user_destination().destination.clone();

        let runner = Arc::clone(&self.runner);
        let transport = Arc::clone(&self.transport);
        let flag = Arc::clone(&abandoned);
        let report_tx = self.report_tx.clone();

        tokio::spawn(async move {
            let result = runner
                .drive(strategy.as_mut(), transport.as_ref(), flag.as_ref())
                .await;
            let _ = report_tx
                .send(StrategyReport {
                    command_id,
                    selector,
                    destination,
                    result,
                })
                .await;
        });

        self.in_flight.insert(command_id, InFlight { command, abandoned });
    }

    fn handle_report(&mut self, report: StrategyReport) {
        let Some(mut entry) = self.in_flight.remove(&report.command_id) else {
            return;
        };

        match report.result {
            Ok(DriveOutcome::Completed) => {
                entry.command.set_state(CommandState::Completed);
                info!("Command `{}` completed", report.selector);
                self.events.publish(BotEvent::CommandCompleted {
                    id: report.command_id,
                    selector: report.selector,
                });
            }
            Ok(DriveOutcome::Abandoned) => {
                info!(
                    "Command `{}` abandoned mid-flight, result discarded",
                    report.selector
                );
            }
            Err(err) => {
                entry.command.set_state(CommandState::Failed);
                error!("Command `{}` failed: {err}", report.selector);
                self.events.publish(BotEvent::CommandFailed {
                    id: report.command_id,
                    selector: report.selector.clone(),
                    reason: err.to_string(),
                });
                let notice = format!("`{}` failed: {err}", report.selector);
                self.spawn_notice(report.destination, notice);
            }
        }
    }

    /// Abandon an in-flight command: its current phase finishes but the
    /// result is discarded and no further phases run. Pending commands for
    /// the same user-destination can be dropped with [`drop_pending`].
    ///
    /// [`drop_pending`]: Orchestrator::drop_pending
    pub fn abandon(&mut self, id: CommandId) {
        if let Some(entry) = self.in_flight.get(&id) {
            entry.abandoned.store(true, Ordering::Relaxed);
            info!("Command {id} marked abandoned");
        }
    }

    /// Drop a still-accumulating command, e.g. when its destination became
    /// invalid.
    pub fn drop_pending(&mut self, key: &str) {
        if self.pending.remove(key).is_some() {
            info!("Pending command for {key} dropped");
        }
    }
}
