//! # RoboPaint Mode API
//!
//! Types shared between a mode and the host: the mode descriptor read from
//! the mode's package, device command descriptors, and the IPC messages
//! exchanged over the host channel.

pub mod commands;
pub mod descriptor;
pub mod ipc;

pub use commands::{CommandBatch, CommandDescriptor};
pub use descriptor::{ModeDescriptor, ModeManifest, ModePackage, TranslationType};
pub use ipc::{CloseChannel, DeviceEvent, InboundEvent, IpcMessage, OutboundMessage};

use serde::{Deserialize, Serialize};

/// Lifecycle state of a mode relative to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeState {
    /// Booting: resources, settings and prerequisites are loading.
    Initializing,
    /// Booted and translated; accepting events.
    Ready,
    /// The device reported a full pause.
    Pausing,
    /// A close was requested and awaits acknowledgment.
    Closing,
    /// The close was acknowledged. No further transitions.
    Terminal,
}

impl ModeState {
    /// Returns whether the mode has started or finished closing.
    #[must_use]
    pub const fn is_closing(self) -> bool {
        matches!(self, Self::Closing | Self::Terminal)
    }
}

impl std::fmt::Display for ModeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Pausing => "pausing",
            Self::Closing => "closing",
            Self::Terminal => "terminal",
        };
        f.write_str(name)
    }
}
