pub mod send_user;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::StrategyError;
use crate::platform::Transport;

/// Result of driving one phase once.
#[derive(Debug)]
pub enum PhaseOutcome {
    /// The phase's remote operation succeeded; advance to the next phase.
    Complete,
    /// Remote precondition not yet met; re-poll this phase, leaving completed
    /// predecessors alone.
    Pending,
    /// The platform rejected the operation; abort the strategy, no retry.
    Failed(StrategyError),
}

/// How a driven strategy ended, short of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveOutcome {
    /// Every phase completed, in order.
    Completed,
    /// The owning command was abandoned mid-flight; the in-flight phase's
    /// result was discarded and no further phase ran.
    Abandoned,
}

/// An ordered plan of named phases fulfilling a command's remote side
/// effects. The phase list is fixed at construction; later phases may read
/// artifacts stored by earlier ones, never the reverse.
#[async_trait]
pub trait Strategy: Send {
    /// Name for logs.
    fn name(&self) -> &'static str;

    /// Ordered phase identifiers.
    fn phases(&self) -> &'static [&'static str];

    /// Execute one named phase against the accumulated context.
    async fn run_phase(&mut self, phase: &str, transport: &dyn Transport) -> PhaseOutcome;
}

/// Shared phase-advancement engine.
///
/// Phases run strictly in declared order; a phase starts only after its
/// predecessor completed. A pending phase is re-polled on a fixed interval
/// until its per-phase wait budget runs out, which aborts the strategy. A
/// failed phase aborts immediately. Completed phases are never re-run, and
/// committed remote effects are not rolled back.
pub struct StrategyRunner {
    poll_interval: Duration,
    default_max_wait: Duration,
    phase_budgets: HashMap<String, Duration>,
}

impl StrategyRunner {
    pub fn new(engine: &EngineConfig) -> Self {
        Self {
            poll_interval: engine.poll_interval(),
            default_max_wait: Duration::from_millis(engine.default_max_wait_ms),
            phase_budgets: engine
                .phase_budget_ms
                .iter()
                .map(|(phase, ms)| (phase.clone(), Duration::from_millis(*ms)))
                .collect(),
        }
    }

    fn budget_for(&self, phase: &str) -> Duration {
        self.phase_budgets
            .get(phase)
            .copied()
            .unwrap_or(self.default_max_wait)
    }

    /// Drive the strategy to a terminal state.
    ///
    /// The abandoned flag is checked between phase invocations only: an
    /// in-flight remote operation is allowed to finish, but its result is
    /// discarded and nothing further is scheduled.
    pub async fn drive(
        &self,
        strategy: &mut dyn Strategy,
        transport: &dyn Transport,
        abandoned: &AtomicBool,
    ) -> Result<DriveOutcome, StrategyError> {
        let name = strategy.name();

        for &phase in strategy.phases() {
            if abandoned.load(Ordering::Relaxed) {
                info!("{name}: abandoned before `{phase}`, stopping");
                return Ok(DriveOutcome::Abandoned);
            }

            let budget = self.budget_for(phase);
            let started = tokio::time::Instant::now();
            let mut attempts: u32 = 0;

            loop {
                attempts += 1;
                debug!("{name}: running `{phase}` (attempt {attempts})");

                match strategy.run_phase(phase, transport).await {
                    PhaseOutcome::Complete => {
                        info!("{name}: phase `{phase}` complete");
                        break;
                    }
                    PhaseOutcome::Pending => {
                        if abandoned.load(Ordering::Relaxed) {
                            info!("{name}: abandoned while `{phase}` pending, stopping");
                            return Ok(DriveOutcome::Abandoned);
                        }
                        if started.elapsed() + self.poll_interval > budget {
                            warn!(
                                "{name}: phase `{phase}` still pending after {attempts} attempts, giving up"
                            );
                            return Err(StrategyError::PolicyExhausted {
                                phase: phase.to_string(),
                                attempts,
                            });
                        }
                        tokio::time::sleep(self.poll_interval).await;
                    }
                    PhaseOutcome::Failed(err) => {
                        error!("{name}: phase `{phase}` failed: {err}");
                        return Err(err);
                    }
                }
            }
        }

        info!("{name}: all phases complete");
        Ok(DriveOutcome::Completed)
    }
}
