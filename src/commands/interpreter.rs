//! Advisor interpreter contract.
//!
//! Advisor orders are free text. An external interpreter turns the text
//! into one canonical [`Command`] or explains why it cannot. The engine
//! only defines the request and response shapes; the interpretation
//! heuristics live outside this crate.

use serde::{Deserialize, Serialize};

use crate::core::{Portfolio, Snapshot, Territory};
use crate::error::CollaboratorError;

use super::command::Command;

/// What the interpreter is told about the order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpreterRequest {
    /// Advisor receiving the order.
    pub portfolio: Portfolio,
    /// The player's words.
    pub free_text: String,
    /// Owned territories and their neighbors, in id order.
    pub visible_territories: Vec<Territory>,
    /// Current treasury.
    pub resources: i64,
}

impl InterpreterRequest {
    /// Build the request for a player's nation.
    ///
    /// A nation sees its own territories and every territory adjacent to them.
    #[must_use]
    pub fn for_nation(snapshot: &Snapshot, nation: &crate::core::Nation, portfolio: Portfolio, text: &str) -> Self {
        let visible_territories = snapshot
            .territories
            .values()
            .filter(|t| {
                t.is_owned_by(&nation.name)
                    || snapshot
                        .territories_of(&nation.name)
                        .any(|own| own.is_adjacent(&t.id))
            })
            .cloned()
            .collect();

        Self {
            portfolio,
            free_text: text.to_string(),
            visible_territories,
            resources: nation.resources,
        }
    }

    /// Serialize for a JSON transport.
    pub fn to_json(&self) -> Result<String, CollaboratorError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// The interpreter's answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Interpretation {
    /// A canonical command to execute.
    Command(Command),
    /// The order could not be mapped.
    Invalid { explanation: String },
}

impl Interpretation {
    /// Parse a JSON response: a command object, or `{"action":"invalid",...}`.
    ///
    /// ```
    /// use nation_turns::commands::{Command, Interpretation};
    ///
    /// let answer = Interpretation::from_json(r#"{"action":"build_military","amount":5}"#).unwrap();
    /// assert_eq!(answer, Interpretation::Command(Command::BuildMilitary { amount: 5 }));
    ///
    /// let refusal = Interpretation::from_json(r#"{"action":"invalid","explanation":"which border?"}"#).unwrap();
    /// assert!(matches!(refusal, Interpretation::Invalid { .. }));
    /// ```
    pub fn from_json(json: &str) -> Result<Self, CollaboratorError> {
        let command: Command = serde_json::from_str(json)?;
        Ok(match command {
            Command::Invalid { explanation } => Interpretation::Invalid { explanation },
            other => Interpretation::Command(other),
        })
    }
}

/// Maps free-text advisor orders to commands.
pub trait AdvisorInterpreter: Send + Sync {
    /// Interpret one order.
    fn interpret(&self, request: &InterpreterRequest) -> Result<Interpretation, CollaboratorError>;
}

impl<F> AdvisorInterpreter for F
where
    F: Fn(&InterpreterRequest) -> Result<Interpretation, CollaboratorError> + Send + Sync,
{
    fn interpret(&self, request: &InterpreterRequest) -> Result<Interpretation, CollaboratorError> {
        self(request)
    }
}

/// Interpreter used when none is configured; always unavailable.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoInterpreter;

impl AdvisorInterpreter for NoInterpreter {
    fn interpret(&self, _request: &InterpreterRequest) -> Result<Interpretation, CollaboratorError> {
        Err(CollaboratorError::Unavailable("no advisor interpreter configured".to_string()))
    }
}
