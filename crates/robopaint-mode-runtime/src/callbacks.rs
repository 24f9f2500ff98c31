//! Optional mode capabilities.

use crate::context::{ModeContext, Outgoing};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

/// Handler for a device event payload.
pub type EventHandler = Box<dyn FnMut(&mut ModeContext, &Value)>;
/// Handler without a payload.
pub type Hook = Box<dyn FnMut(&mut ModeContext)>;
/// Handler for a close request.
pub type CloseHandler = Box<dyn FnMut(&mut ModeContext, CloseAck)>;
/// Handler for device events without a dedicated capability.
pub type MessageHandler = Box<dyn FnMut(&mut ModeContext, &str, &Value)>;

/// One-shot acknowledgment of a close request.
///
/// Handed to `on_close`. The mode may fire it right away or keep it until
/// its cleanup is done; the close completes only when it fires. Firing
/// consumes the handle.
pub struct CloseAck {
    outgoing: Option<UnboundedSender<Outgoing>>,
}

impl CloseAck {
    pub(crate) fn new(outgoing: UnboundedSender<Outgoing>) -> Self {
        Self {
            outgoing: Some(outgoing),
        }
    }

    /// Acknowledges the close.
    pub fn ack(mut self) {
        if let Some(outgoing) = self.outgoing.take() {
            // A closed queue means the coordinator is gone; nobody is waiting.
            let _ = outgoing.send(Outgoing::CloseAcknowledged);
        }
    }
}

impl Drop for CloseAck {
    fn drop(&mut self) {
        if self.outgoing.is_some() {
            warn!("Close acknowledgment dropped without firing, close will never complete");
        }
    }
}

impl std::fmt::Debug for CloseAck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloseAck")
            .field("pending", &self.outgoing.is_some())
            .finish()
    }
}

/// The capabilities a mode chose to implement.
///
/// Every field is optional. A missing capability turns the matching event
/// into a no-op.
#[derive(Default)]
pub struct ModeCallbacks {
    pub on_close: Option<CloseHandler>,
    pub on_pen_update: Option<EventHandler>,
    pub on_buffer_update: Option<EventHandler>,
    pub on_fully_paused: Option<EventHandler>,
    pub on_fully_resumed: Option<EventHandler>,
    pub on_callback_event: Option<EventHandler>,
    pub on_message: Option<MessageHandler>,
    pub translate_complete: Option<Hook>,
    pub bind_controls: Option<Hook>,
    pub page_init_ready: Option<Hook>,
}

impl ModeCallbacks {
    /// Creates an empty capability set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_close(mut self, f: impl FnMut(&mut ModeContext, CloseAck) + 'static) -> Self {
        self.on_close = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_pen_update(mut self, f: impl FnMut(&mut ModeContext, &Value) + 'static) -> Self {
        self.on_pen_update = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_buffer_update(mut self, f: impl FnMut(&mut ModeContext, &Value) + 'static) -> Self {
        self.on_buffer_update = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_fully_paused(mut self, f: impl FnMut(&mut ModeContext, &Value) + 'static) -> Self {
        self.on_fully_paused = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_fully_resumed(mut self, f: impl FnMut(&mut ModeContext, &Value) + 'static) -> Self {
        self.on_fully_resumed = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_callback_event(mut self, f: impl FnMut(&mut ModeContext, &Value) + 'static) -> Self {
        self.on_callback_event = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_message(mut self, f: impl FnMut(&mut ModeContext, &str, &Value) + 'static) -> Self {
        self.on_message = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn translate_complete(mut self, f: impl FnMut(&mut ModeContext) + 'static) -> Self {
        self.translate_complete = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn bind_controls(mut self, f: impl FnMut(&mut ModeContext) + 'static) -> Self {
        self.bind_controls = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn page_init_ready(mut self, f: impl FnMut(&mut ModeContext) + 'static) -> Self {
        self.page_init_ready = Some(Box::new(f));
        self
    }

    /// Names of the capabilities present, for diagnostics.
    #[must_use]
    pub fn present(&self) -> Vec<&'static str> {
        [
            ("onClose", self.on_close.is_some()),
            ("onPenUpdate", self.on_pen_update.is_some()),
            ("onBufferUpdate", self.on_buffer_update.is_some()),
            ("onFullyPaused", self.on_fully_paused.is_some()),
            ("onFullyResumed", self.on_fully_resumed.is_some()),
            ("onCallbackEvent", self.on_callback_event.is_some()),
            ("onMessage", self.on_message.is_some()),
            ("translateComplete", self.translate_complete.is_some()),
            ("bindControls", self.bind_controls.is_some()),
            ("pageInitReady", self.page_init_ready.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
    }
}

impl std::fmt::Debug for ModeCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeCallbacks")
            .field("present", &self.present())
            .finish()
    }
}
