//! The per-mode context handed to every capability.
//!
//! One context is built at boot and owns everything a running mode touches:
//! its descriptor, its page, its settings and its translator. Outbound
//! messages are queued here and delivered by the coordinator in order.

use robopaint_core::BridgeResult;
use robopaint_dom::Document;
use robopaint_i18n::{TranslatePass, Translator};
use robopaint_mode_api::{CommandBatch, CommandDescriptor, ModeDescriptor, OutboundMessage};
use robopaint_settings::{BindingEntry, SharedSettings};
use serde_json::{Map, Value};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Status key shown by a cancel without an explicit message.
pub const CANCELLED_KEY: &str = "common.status.cancelled";

/// Items on the coordinator's outbound queue.
#[derive(Debug)]
pub(crate) enum Outgoing {
    Message(OutboundMessage),
    CloseAcknowledged,
}

/// Everything a mode needs, assembled at boot.
#[derive(Debug)]
pub struct ModeParts {
    pub descriptor: ModeDescriptor,
    pub document: Document,
    pub settings: SharedSettings,
    pub translator: Translator,
    /// Device capabilities fetched during boot.
    pub device: Value,
}

/// The running mode's view of the bridge.
pub struct ModeContext {
    descriptor: ModeDescriptor,
    document: Document,
    settings: SharedSettings,
    translator: Translator,
    device: Value,
    outgoing: UnboundedSender<Outgoing>,
}

impl ModeContext {
    pub(crate) fn new(parts: ModeParts, outgoing: UnboundedSender<Outgoing>) -> Self {
        Self {
            descriptor: parts.descriptor,
            document: parts.document,
            settings: parts.settings,
            translator: parts.translator,
            device: parts.device,
            outgoing,
        }
    }

    pub const fn descriptor(&self) -> &ModeDescriptor {
        &self.descriptor
    }

    pub const fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub const fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    /// Device capabilities reported by the host at boot.
    pub const fn device(&self) -> &Value {
        &self.device
    }

    pub fn language(&self) -> &str {
        self.translator.language()
    }

    // ============ Commands ============

    /// Queues commands for the host command buffer.
    ///
    /// Commands are forwarded in order and never validated.
    pub fn run<I, C>(&self, commands: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<CommandDescriptor>,
    {
        let batch = CommandBatch::new(commands.into_iter().map(Into::into).collect());
        self.send(OutboundMessage::Run(batch));
    }

    /// Queues one command.
    pub fn run_command(&self, command: impl Into<CommandDescriptor>) {
        self.run([command]);
    }

    /// Queues commands ahead of everything already buffered on the host.
    pub fn run_priority<I, C>(&self, commands: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<CommandDescriptor>,
    {
        let batch = CommandBatch::priority(commands.into_iter().map(Into::into).collect());
        self.send(OutboundMessage::Run(batch));
    }

    /// Stops the device and empties its buffer in one priority batch.
    ///
    /// Without a message the translated cancel status is shown.
    pub fn full_cancel(&self, message: Option<&str>) {
        let message = message.map_or_else(|| self.t(CANCELLED_KEY), str::to_string);
        self.send(OutboundMessage::Run(CommandBatch::full_cancel(&message)));
    }

    /// Asks the host to hold (`true`) or release (`false`) until the
    /// command buffer drains.
    pub fn pause_till_empty(&self, starting: bool) {
        self.send(OutboundMessage::PauseTillEmpty(starting));
    }

    fn send(&self, message: OutboundMessage) {
        if self.outgoing.send(Outgoing::Message(message)).is_err() {
            debug!(mode = %self.descriptor.id, "Coordinator gone, dropping outbound message");
        }
    }

    // ============ Settings ============

    /// Reloads settings from storage.
    pub fn load_settings(&self) {
        self.settings.borrow_mut().load();
    }

    /// Writes the in-memory settings to storage.
    pub fn save_settings(&self) -> BridgeResult<()> {
        self.settings.borrow().save()
    }

    /// Removes all settings, in memory and in storage.
    pub fn clear_settings(&self) -> BridgeResult<()> {
        self.settings.borrow_mut().clear()
    }

    /// Binds the page controls matched by `selectors` to settings.
    pub fn manage(&mut self, selectors: &[&str]) -> Vec<BindingEntry> {
        robopaint_settings::manage(&self.settings, &mut self.document, selectors)
    }

    // ============ Translation ============

    /// Translates a key.
    pub fn t(&self, key: &str) -> String {
        self.translator.t(key, &Map::new())
    }

    /// Translates a key, filling `{{name}}` and `__name__` placeholders.
    pub fn t_with(&self, key: &str, vars: &Map<String, Value>) -> String {
        self.translator.t(key, vars)
    }

    /// Re-applies translations to the page.
    pub fn translate(&mut self) -> TranslatePass {
        self.translator.translate(&mut self.document)
    }

    pub(crate) fn set_language(&mut self, language: String) {
        self.translator.set_language(language);
    }
}

impl std::fmt::Debug for ModeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeContext")
            .field("mode", &self.descriptor.id)
            .field("language", &self.translator.language())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use robopaint_core::ModeId;
    use robopaint_i18n::{ResourceTree, TranslationStrategy};
    use robopaint_mode_api::TranslationType;
    use robopaint_settings::{MemoryBackend, SettingsBackend, SettingsStore};
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    pub(crate) fn descriptor() -> ModeDescriptor {
        ModeDescriptor {
            id: ModeId::new("draw"),
            title: "Draw".to_string(),
            version: "1.0.0".to_string(),
            path: PathBuf::from("/modes/draw"),
            dependencies: Vec::new(),
            translation: TranslationType::Native,
            heavy_library: false,
        }
    }

    pub(crate) fn parts(resources: ResourceTree) -> ModeParts {
        parts_with(resources, Arc::new(MemoryBackend::new()))
    }

    pub(crate) fn parts_with(resources: ResourceTree, backend: Arc<dyn SettingsBackend>) -> ModeParts {
        let id = ModeId::new("draw");
        let mut store = SettingsStore::new(id.clone(), backend);
        store.load();
        ModeParts {
            descriptor: descriptor(),
            document: Document::new(),
            settings: store.shared(),
            translator: Translator::new(
                id,
                Arc::new(resources),
                TranslationStrategy::Native,
                "en-US",
                None,
            ),
            device: json!({"name": "WaterColorBot"}),
        }
    }

    fn runs(rx: &mut mpsc::UnboundedReceiver<Outgoing>) -> Vec<OutboundMessage> {
        let mut out = Vec::new();
        while let Ok(item) = rx.try_recv() {
            if let Outgoing::Message(message) = item {
                out.push(message);
            }
        }
        out
    }

    #[test]
    fn test_run_keeps_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = ModeContext::new(parts(ResourceTree::default()), tx);

        ctx.run(["up", "park"]);
        ctx.run_command(CommandDescriptor::with_args("move", [json!(1), json!(2)]));
        ctx.run_priority(["clear"]);
        ctx.pause_till_empty(true);

        let sent = runs(&mut rx);
        assert_eq!(sent.len(), 4);
        assert_eq!(
            sent[0],
            OutboundMessage::Run(CommandBatch::new(vec!["up".into(), "park".into()]))
        );
        assert!(matches!(&sent[2], OutboundMessage::Run(batch) if batch.priority));
        assert_eq!(sent[3], OutboundMessage::PauseTillEmpty(true));
    }

    #[test]
    fn test_full_cancel_defaults_to_translated_status() {
        let mut resources = ResourceTree::default();
        resources.insert_common("en-US", json!({"status": {"cancelled": "Cancelled"}}).as_object().cloned().unwrap_or_default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = ModeContext::new(parts(resources), tx);

        ctx.full_cancel(None);
        ctx.full_cancel(Some("done"));

        let sent = runs(&mut rx);
        assert_eq!(sent[0], OutboundMessage::Run(CommandBatch::full_cancel("Cancelled")));
        assert_eq!(sent[1], OutboundMessage::Run(CommandBatch::full_cancel("done")));
    }

    #[test]
    fn test_settings_passthrough() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut ctx = ModeContext::new(parts(ResourceTree::default()), tx);
        let body = ctx.document().body();
        ctx.document_mut().append_element(body, "input", &[("id", "speed"), ("type", "text"), ("value", "3")]);

        let bound = ctx.manage(&["#speed"]);

        assert_eq!(bound.len(), 1);
        assert_eq!(ctx.settings().borrow().get("speed"), Some(&json!("3")));
        ctx.clear_settings().unwrap();
        assert!(ctx.settings().borrow().values().is_empty());
    }
}
