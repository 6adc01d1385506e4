//! Player commands.
//!
//! Commands arrive from clients as `{ "action": ..., ...params }` objects.
//! They are parsed once into [`Command`] and dispatched by exhaustive
//! match; no handler ever branches on the action string.

use serde::{Deserialize, Serialize};

use crate::core::{CommandKind, Portfolio, Technology, TerritoryId};

/// A command submitted by a player.
///
/// ```
/// use nation_turns::commands::Command;
///
/// let cmd: Command = serde_json::from_str(
///     r#"{ "action": "move_troops", "from": "a1", "to": "a2", "amount": 3 }"#,
/// ).unwrap();
/// assert!(matches!(cmd, Command::MoveTroops { amount: 3, .. }));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    /// Queue an attack from an owned territory into an adjacent one.
    Attack { from: TerritoryId, to: TerritoryId },

    /// Raise troops at the capital.
    BuildMilitary { amount: i64 },

    /// Research the next level of a technology.
    Research { tech: Technology },

    /// Move troops between adjacent owned territories.
    MoveTroops {
        from: TerritoryId,
        to: TerritoryId,
        amount: i64,
    },

    /// Free-text order to an advisor, interpreted into one of the above.
    AdvisorCommand { portfolio: Portfolio, text: String },

    /// A command that could not be understood.
    Invalid { explanation: String },
}

impl Command {
    /// Loyalty table row for this command, if it mutates state directly.
    #[must_use]
    pub fn kind(&self) -> Option<CommandKind> {
        match self {
            Command::Attack { .. } => Some(CommandKind::Attack),
            Command::BuildMilitary { .. } => Some(CommandKind::BuildMilitary),
            Command::Research { .. } => Some(CommandKind::Research),
            Command::MoveTroops { .. } => Some(CommandKind::MoveTroops),
            Command::AdvisorCommand { .. } | Command::Invalid { .. } => None,
        }
    }

    /// Check if this is one of the four directly executable commands.
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        self.kind().is_some()
    }

    /// Short description used in logs and advisor reports.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Command::Attack { from, to } => format!("attack {to} from {from}"),
            Command::BuildMilitary { amount } => format!("raise {amount} troops"),
            Command::Research { tech } => format!("research {tech}"),
            Command::MoveTroops { from, to, amount } => format!("move {amount} troops from {from} to {to}"),
            Command::AdvisorCommand { portfolio, text } => format!("ask the {portfolio} advisor: {text}"),
            Command::Invalid { explanation } => format!("invalid ({explanation})"),
        }
    }
}

/// Result reported to the submitting client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// Whether the command was applied (or queued).
    pub success: bool,
    /// What happened, or which precondition failed.
    pub message: String,
}

impl CommandOutcome {
    /// A successful outcome.
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// A failed outcome.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
