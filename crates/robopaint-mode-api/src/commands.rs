//! Device command descriptors.
//!
//! Commands are opaque to the bridge: a bare identifier such as `"park"`
//! or a list `["move", 10, 20]`. They are forwarded to the host's command
//! buffer in order and never validated locally.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Empties the host command buffer.
pub const CLEAR: &str = "clear";
/// Resumes a paused buffer.
pub const RESUME: &str = "resume";
/// Parks the pen carriage.
pub const PARK: &str = "park";
/// Sets the status message shown by the host.
pub const STATUS: &str = "status";
/// Sets the progress indicator.
pub const PROGRESS: &str = "progress";
/// Drops commands still queued locally on the mode side of the buffer.
pub const LOCAL_CLEAR: &str = "localclear";

/// One command for the host command buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandDescriptor {
    /// Command without arguments.
    Bare(String),
    /// `[command, ...args]`.
    WithArgs(Vec<Value>),
}

impl CommandDescriptor {
    /// Creates a command without arguments.
    pub fn bare(command: impl Into<String>) -> Self {
        Self::Bare(command.into())
    }

    /// Creates a command with arguments.
    pub fn with_args(command: impl Into<String>, args: impl IntoIterator<Item = Value>) -> Self {
        let mut parts = vec![Value::String(command.into())];
        parts.extend(args);
        Self::WithArgs(parts)
    }

    /// Returns the command identifier, if the descriptor has one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Bare(name) => Some(name),
            Self::WithArgs(parts) => parts.first().and_then(Value::as_str),
        }
    }
}

impl From<&str> for CommandDescriptor {
    fn from(command: &str) -> Self {
        Self::bare(command)
    }
}

/// Ordered commands sent as one `cncserver-run` message.
///
/// Serialized as `[commands, priority]`. A priority batch is placed ahead
/// of everything already queued on the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(Vec<CommandDescriptor>, bool)", into = "(Vec<CommandDescriptor>, bool)")]
pub struct CommandBatch {
    pub commands: Vec<CommandDescriptor>,
    pub priority: bool,
}

impl CommandBatch {
    /// Creates a normal batch.
    #[must_use]
    pub fn new(commands: Vec<CommandDescriptor>) -> Self {
        Self {
            commands,
            priority: false,
        }
    }

    /// Creates a priority batch.
    #[must_use]
    pub fn priority(commands: Vec<CommandDescriptor>) -> Self {
        Self {
            commands,
            priority: true,
        }
    }

    /// The cancel sequence: clear, resume, park, status message, progress
    /// reset and local clear, as one priority batch.
    ///
    /// The local clear must stay last: anything queued behind it would be
    /// dropped before it executes.
    #[must_use]
    pub fn full_cancel(message: &str) -> Self {
        Self::priority(vec![
            CommandDescriptor::bare(CLEAR),
            CommandDescriptor::bare(RESUME),
            CommandDescriptor::bare(PARK),
            CommandDescriptor::with_args(STATUS, [Value::String(message.to_string())]),
            CommandDescriptor::with_args(PROGRESS, [Value::from(0), Value::from(1)]),
            CommandDescriptor::bare(LOCAL_CLEAR),
        ])
    }
}

impl From<(Vec<CommandDescriptor>, bool)> for CommandBatch {
    fn from((commands, priority): (Vec<CommandDescriptor>, bool)) -> Self {
        Self { commands, priority }
    }
}

impl From<CommandBatch> for (Vec<CommandDescriptor>, bool) {
    fn from(batch: CommandBatch) -> Self {
        (batch.commands, batch.priority)
    }
}
