//! IPC messages exchanged with the host process.
//!
//! Every message is a channel name plus a JSON payload. Inbound messages
//! are parsed into [`InboundEvent`]s; the bridge only ever sends
//! [`OutboundMessage`]s.

use crate::CommandBatch;
use robopaint_core::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Application-wide shutdown request.
pub const GLOBAL_CLOSE: &str = "globalclose";
/// The host is switching to another mode.
pub const MODE_CHANGE: &str = "modechange";
/// Device status events, payload `[eventName, data]`.
pub const CNCSERVER: &str = "cncserver";
/// Persisted settings were changed outside this mode.
pub const SETTINGS_UPDATE: &str = "settingsUpdate";
/// Outbound command batch.
pub const CNCSERVER_RUN: &str = "cncserver-run";
/// Outbound buffer flow-control request.
pub const PAUSE_TILL_EMPTY: &str = "pausetillempty";

/// Device event names carried on [`CNCSERVER`].
pub mod events {
    pub const PEN_UPDATE: &str = "penUpdate";
    pub const BUFFER_UPDATE: &str = "bufferUpdate";
    pub const FULLY_PAUSED: &str = "fullyPaused";
    pub const FULLY_RESUMED: &str = "fullyResumed";
    pub const CALLBACK_EVENT: &str = "callbackEvent";
    pub const LANG_CHANGE: &str = "langChange";
}

/// A raw IPC message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpcMessage {
    pub channel: String,
    #[serde(default)]
    pub payload: Value,
}

impl IpcMessage {
    /// Creates a message.
    pub fn new(channel: impl Into<String>, payload: Value) -> Self {
        Self {
            channel: channel.into(),
            payload,
        }
    }
}

/// The channel a close request arrived on. The acknowledgment goes back
/// on the same channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseChannel {
    GlobalClose,
    ModeChange,
}

impl CloseChannel {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GlobalClose => GLOBAL_CLOSE,
            Self::ModeChange => MODE_CHANGE,
        }
    }
}

impl std::fmt::Display for CloseChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A device status event.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    PenUpdate(Value),
    BufferUpdate(Value),
    FullyPaused(Value),
    FullyResumed(Value),
    CallbackEvent(Value),
    /// Any event name without a dedicated capability.
    Other { name: String, data: Value },
}

impl DeviceEvent {
    fn from_parts(name: String, data: Value) -> Self {
        match name.as_str() {
            events::PEN_UPDATE => Self::PenUpdate(data),
            events::BUFFER_UPDATE => Self::BufferUpdate(data),
            events::FULLY_PAUSED => Self::FullyPaused(data),
            events::FULLY_RESUMED => Self::FullyResumed(data),
            events::CALLBACK_EVENT => Self::CallbackEvent(data),
            _ => Self::Other { name, data },
        }
    }

    /// Returns the event name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::PenUpdate(_) => events::PEN_UPDATE,
            Self::BufferUpdate(_) => events::BUFFER_UPDATE,
            Self::FullyPaused(_) => events::FULLY_PAUSED,
            Self::FullyResumed(_) => events::FULLY_RESUMED,
            Self::CallbackEvent(_) => events::CALLBACK_EVENT,
            Self::Other { name, .. } => name,
        }
    }
}

/// A parsed inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Close handshake request.
    Close(CloseChannel),
    /// Device status event.
    Device(DeviceEvent),
    /// The host switched the UI language.
    LanguageChange(String),
    /// Reload settings from storage.
    SettingsUpdate,
}

impl InboundEvent {
    /// Parses a raw message.
    ///
    /// Unknown channels and `cncserver` payloads that are not
    /// `[eventName, data]` are malformed.
    pub fn parse(message: IpcMessage) -> BridgeResult<Self> {
        match message.channel.as_str() {
            GLOBAL_CLOSE => Ok(Self::Close(CloseChannel::GlobalClose)),
            MODE_CHANGE => Ok(Self::Close(CloseChannel::ModeChange)),
            SETTINGS_UPDATE => Ok(Self::SettingsUpdate),
            CNCSERVER => Self::parse_device(message.payload),
            other => Err(malformed(other, "unknown channel")),
        }
    }

    fn parse_device(payload: Value) -> BridgeResult<Self> {
        let Value::Array(parts) = payload else {
            return Err(malformed(CNCSERVER, "payload is not [eventName, data]"));
        };
        let mut parts = parts.into_iter();
        let name = match parts.next() {
            Some(Value::String(name)) => name,
            _ => return Err(malformed(CNCSERVER, "event name is not a string")),
        };
        let data = parts.next().unwrap_or(Value::Null);

        if name == events::LANG_CHANGE {
            return match data {
                Value::String(code) if !code.trim().is_empty() => Ok(Self::LanguageChange(code)),
                _ => Err(malformed(CNCSERVER, "langChange needs a language code")),
            };
        }
        Ok(Self::Device(DeviceEvent::from_parts(name, data)))
    }
}

fn malformed(channel: &str, message: &str) -> BridgeError {
    BridgeError::MalformedMessage {
        channel: channel.to_string(),
        message: message.to_string(),
    }
}

/// A message the bridge sends to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    /// Close acknowledgment, sent on the channel that requested the close.
    CloseAck(CloseChannel),
    /// Command batch for the host command buffer.
    Run(CommandBatch),
    /// Flow-control request: `true` starts holding until the buffer drains.
    PauseTillEmpty(bool),
}

impl OutboundMessage {
    /// Converts to the raw wire message.
    pub fn into_message(self) -> BridgeResult<IpcMessage> {
        Ok(match self {
            Self::CloseAck(channel) => IpcMessage::new(channel.as_str(), Value::Null),
            Self::Run(batch) => IpcMessage::new(CNCSERVER_RUN, serde_json::to_value(batch)?),
            Self::PauseTillEmpty(starting) => IpcMessage::new(PAUSE_TILL_EMPTY, Value::Bool(starting)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CommandDescriptor;
    use serde_json::json;

    fn parse(channel: &str, payload: Value) -> BridgeResult<InboundEvent> {
        InboundEvent::parse(IpcMessage::new(channel, payload))
    }

    #[test]
    fn test_parse_close_channels() {
        assert_eq!(parse("globalclose", Value::Null).unwrap(), InboundEvent::Close(CloseChannel::GlobalClose));
        assert_eq!(parse("modechange", json!("print")).unwrap(), InboundEvent::Close(CloseChannel::ModeChange));
        assert_eq!(parse("settingsUpdate", Value::Null).unwrap(), InboundEvent::SettingsUpdate);
    }

    #[test]
    fn test_parse_device_events() {
        let pen = parse("cncserver", json!(["penUpdate", {"x": 1}])).unwrap();
        assert_eq!(pen, InboundEvent::Device(DeviceEvent::PenUpdate(json!({"x": 1}))));

        let paused = parse("cncserver", json!(["fullyPaused"])).unwrap();
        assert_eq!(paused, InboundEvent::Device(DeviceEvent::FullyPaused(Value::Null)));

        let InboundEvent::Device(other) = parse("cncserver", json!(["toolChange", 3])).unwrap() else {
            panic!("expected a device event");
        };
        assert_eq!(other.name(), "toolChange");
        assert_eq!(other, DeviceEvent::Other { name: "toolChange".to_string(), data: json!(3) });
    }

    #[test]
    fn test_parse_language_change() {
        assert_eq!(
            parse("cncserver", json!(["langChange", "de"])).unwrap(),
            InboundEvent::LanguageChange("de".to_string())
        );
        assert!(parse("cncserver", json!(["langChange", 5])).is_err());
    }

    #[test]
    fn test_parse_malformed() {
        let err = parse("cncserver", json!({"name": "penUpdate"})).unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_MESSAGE");
        assert!(parse("cncserver", json!([1, 2])).is_err());
        assert!(parse("mystery", Value::Null).is_err());
    }

    #[test]
    fn test_outbound_wire_messages() {
        let ack = OutboundMessage::CloseAck(CloseChannel::ModeChange).into_message().unwrap();
        assert_eq!(ack, IpcMessage::new("modechange", Value::Null));

        let run = OutboundMessage::Run(CommandBatch::new(vec![CommandDescriptor::bare("park")]))
            .into_message()
            .unwrap();
        assert_eq!(run.channel, "cncserver-run");
        assert_eq!(run.payload, json!([["park"], false]));

        let pause = OutboundMessage::PauseTillEmpty(true).into_message().unwrap();
        assert_eq!(serde_json::to_value(&pause).unwrap(), json!({"channel": "pausetillempty", "payload": true}));
    }
}
