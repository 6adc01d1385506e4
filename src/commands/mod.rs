//! Command validation and execution.
//!
//! ## Key Types
//!
//! - [`Command`]: the five canonical commands plus `Invalid`
//! - [`plan_command`]: precondition checks producing guarded patches
//! - [`CommandExecutor`]: commits plans to the store with bounded retries
//! - [`AdvisorInterpreter`]: external free-text to command mapping
//!
//! Attacks only enqueue a pending action. Every other command applies
//! immediately, because it touches fields no other player competes for.

pub mod command;
pub mod executor;
pub mod interpreter;
pub mod validator;

pub use command::{Command, CommandOutcome};
pub use executor::CommandExecutor;
pub use interpreter::{AdvisorInterpreter, Interpretation, InterpreterRequest, NoInterpreter};
pub use validator::{actor, loyalty_patches, military_cost, plan_command, research_cost, CommandPlan};
