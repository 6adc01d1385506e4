//! Command execution against the shared store.
//!
//! Flow per command:
//!
//! 1. Resolve advisor orders through the interpreter (once, never retried)
//! 2. Read the latest snapshot and plan the command
//! 3. Commit the plan's patches behind its guards
//! 4. If a guard lost a race, re-read and re-plan (bounded retries)
//!
//! Failures come back as a [`CommandOutcome`], never as a panic or an
//! unhandled error: the submitter always gets a message.

use tracing::{debug, info, warn};

use crate::core::{Event, EventKind, GameId, PlayerId, RulesConfig};
use crate::error::{GameError, StoreError, ValidationError};
use crate::store::{Field, GameStore, Patch, Value};

use super::command::{Command, CommandOutcome};
use super::interpreter::{AdvisorInterpreter, Interpretation, InterpreterRequest};
use super::validator::{actor, plan_command};

/// Executes player commands for one game.
pub struct CommandExecutor<'a> {
    store: &'a dyn GameStore,
    game: &'a GameId,
    config: &'a RulesConfig,
    interpreter: &'a dyn AdvisorInterpreter,
}

impl<'a> CommandExecutor<'a> {
    /// Create an executor.
    pub fn new(
        store: &'a dyn GameStore,
        game: &'a GameId,
        config: &'a RulesConfig,
        interpreter: &'a dyn AdvisorInterpreter,
    ) -> Self {
        Self {
            store,
            game,
            config,
            interpreter,
        }
    }

    /// Submit a command and report the outcome.
    #[tracing::instrument(skip(self, command), fields(game = %self.game, command = %command.describe()))]
    pub fn submit(&self, uid: &PlayerId, command: Command, now: u64) -> CommandOutcome {
        match self.try_submit(uid, command, now) {
            Ok(message) => {
                info!(%uid, %message, "command accepted");
                CommandOutcome::accepted(message)
            }
            Err(GameError::Validation(err)) => {
                debug!(%uid, error = %err, "command rejected");
                CommandOutcome::rejected(err.to_string())
            }
            Err(err) => {
                warn!(%uid, error = %err, "command not applied");
                CommandOutcome::rejected(err.to_string())
            }
        }
    }

    /// Submit a command, surfacing the typed error.
    pub fn try_submit(&self, uid: &PlayerId, command: Command, now: u64) -> Result<String, GameError> {
        let (command, report) = match command {
            Command::AdvisorCommand { portfolio, text } => {
                let snapshot = self.store.read(self.game)?;
                let (_, nation) = actor(&snapshot, uid)?;
                let request = InterpreterRequest::for_nation(&snapshot, nation, portfolio, &text);

                match self.interpreter.interpret(&request)? {
                    Interpretation::Command(resolved) if resolved.is_canonical() => {
                        let report = Event::new(
                            snapshot.turn,
                            EventKind::AdvisorOrder,
                            format!("Your {portfolio} advisor will {}", resolved.describe()),
                        )
                        .about(nation.name.clone())
                        .private_to(uid.clone());
                        (resolved, Some(report))
                    }
                    Interpretation::Command(other) => {
                        return Err(ValidationError::AdvisorRefused(format!(
                            "the {portfolio} advisor answered with a non-executable order ({})",
                            other.describe()
                        ))
                        .into());
                    }
                    Interpretation::Invalid { explanation } => {
                        return Err(ValidationError::AdvisorRefused(explanation).into());
                    }
                }
            }
            other => (other, None),
        };

        let mut attempts = 0;
        loop {
            let snapshot = self.store.read(self.game)?;
            let mut plan = plan_command(&snapshot, self.config, uid, &command)?;
            plan.patches.push(Patch::set(
                Field::PlayerLastActive(uid.clone()),
                Value::Int(i64::try_from(now).unwrap_or(i64::MAX)),
            ));
            if let Some(report) = &report {
                plan.patches.push(Patch::event(report.clone()));
            }

            match self.store.batch_commit(self.game, &plan.guards, &plan.patches) {
                Ok(_) => return Ok(plan.message),
                Err(StoreError::GuardFailed(reason)) if attempts < self.config.conflict_retries => {
                    attempts += 1;
                    debug!(%uid, %reason, attempts, "command lost a race; re-reading");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
