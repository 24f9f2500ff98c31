//! Mode lifecycle coordinator.
//!
//! Owns the mode context and its capabilities, routes inbound host events
//! in arrival order and mediates the close handshake.
//!
//! ```text
//! Initializing ──start──▶ Ready ◀──fullyResumed── Pausing
//!                           │ └──────fullyPaused─────▲
//!                 close ────┴──▶ Closing ──ack──▶ Terminal
//! ```
//!
//! A close request moves any non-terminal state to `Closing`. With an
//! `on_close` capability the mode receives a [`CloseAck`] and the close
//! completes only when it fires; without one the close completes at once.
//! Further close requests while one is pending are coalesced: each distinct
//! channel is acknowledged once when the single ack fires.

use crate::callbacks::{CloseAck, ModeCallbacks};
use crate::context::{ModeContext, ModeParts, Outgoing};
use crate::transport::HostChannel;
use robopaint_core::BridgeResult;
use robopaint_i18n::TranslatePass;
use robopaint_mode_api::ipc::events;
use robopaint_mode_api::{CloseChannel, DeviceEvent, InboundEvent, IpcMessage, ModeState, OutboundMessage};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

enum Step {
    Outgoing(Outgoing),
    Inbound(BridgeResult<Option<IpcMessage>>),
}

/// Drives one mode against one host channel.
pub struct Coordinator<T> {
    ctx: ModeContext,
    callbacks: ModeCallbacks,
    transport: T,
    state: ModeState,
    pending_close: Vec<CloseChannel>,
    outgoing_tx: mpsc::UnboundedSender<Outgoing>,
    outgoing_rx: mpsc::UnboundedReceiver<Outgoing>,
}

impl<T: HostChannel> Coordinator<T> {
    /// Creates a coordinator in the `Initializing` state.
    pub fn new(parts: ModeParts, callbacks: ModeCallbacks, transport: T) -> Self {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        debug!(mode = %parts.descriptor.id, capabilities = ?callbacks.present(), "Coordinator created");
        Self {
            ctx: ModeContext::new(parts, outgoing_tx.clone()),
            callbacks,
            transport,
            state: ModeState::Initializing,
            pending_close: Vec::new(),
            outgoing_tx,
            outgoing_rx,
        }
    }

    pub const fn state(&self) -> ModeState {
        self.state
    }

    pub const fn context(&self) -> &ModeContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut ModeContext {
        &mut self.ctx
    }

    /// Marks the page ready, translates it, runs `bind_controls` and
    /// `page_init_ready`, and enters `Ready`.
    ///
    /// Only the first call has any effect. A close requested during boot
    /// is kept: the page still initializes but the state stays `Closing`.
    pub fn start(&mut self) {
        if self.ctx.document().is_ready() {
            debug!(mode = %self.ctx.descriptor().id, "Page already started");
            return;
        }

        self.ctx.document_mut().mark_ready();
        self.translate();
        if let Some(bind_controls) = self.callbacks.bind_controls.as_mut() {
            bind_controls(&mut self.ctx);
        }
        if let Some(page_init_ready) = self.callbacks.page_init_ready.as_mut() {
            page_init_ready(&mut self.ctx);
        }

        if self.state == ModeState::Initializing {
            self.transition(ModeState::Ready);
        }
    }

    /// Processes inbound messages until the close is acknowledged or the
    /// host hangs up. Returns the final state.
    pub async fn run(&mut self) -> BridgeResult<ModeState> {
        info!(mode = %self.ctx.descriptor().id, state = %self.state, "Mode running");

        loop {
            self.flush().await?;
            if self.state == ModeState::Terminal {
                break;
            }

            let step = tokio::select! {
                biased;
                Some(item) = self.outgoing_rx.recv() => Step::Outgoing(item),
                message = self.transport.recv() => Step::Inbound(message),
            };

            match step {
                Step::Outgoing(item) => self.deliver(item).await?,
                Step::Inbound(message) => match message? {
                    Some(message) => self.handle_message(message),
                    None => {
                        info!(mode = %self.ctx.descriptor().id, "Host channel closed");
                        break;
                    }
                },
            }
        }

        self.flush().await?;
        Ok(self.state)
    }

    /// Sends everything queued so far, in order.
    pub async fn flush(&mut self) -> BridgeResult<()> {
        while let Ok(item) = self.outgoing_rx.try_recv() {
            self.deliver(item).await?;
        }
        Ok(())
    }

    async fn deliver(&mut self, item: Outgoing) -> BridgeResult<()> {
        match item {
            Outgoing::Message(message) => self.transport.send(message.into_message()?).await,
            Outgoing::CloseAcknowledged => {
                self.complete_close();
                Ok(())
            }
        }
    }

    fn handle_message(&mut self, message: IpcMessage) {
        match InboundEvent::parse(message) {
            Ok(event) => self.dispatch(event),
            Err(e) => warn!(error = %e, "Dropping inbound message"),
        }
    }

    /// Handles one inbound event.
    pub fn dispatch(&mut self, event: InboundEvent) {
        if self.state == ModeState::Terminal {
            match event {
                InboundEvent::Close(channel) => {
                    debug!(%channel, "Close requested after termination, acknowledging");
                    self.queue(OutboundMessage::CloseAck(channel));
                }
                other => debug!(event = ?other, "Mode terminated, event dropped"),
            }
            return;
        }

        match event {
            InboundEvent::Close(channel) => self.request_close(channel),
            InboundEvent::Device(event) => self.dispatch_device(event),
            InboundEvent::LanguageChange(language) => self.change_language(language),
            InboundEvent::SettingsUpdate => {
                debug!(mode = %self.ctx.descriptor().id, "Reloading settings");
                self.ctx.load_settings();
            }
        }
    }

    fn dispatch_device(&mut self, event: DeviceEvent) {
        let callbacks = &mut self.callbacks;
        let (name, handler, data) = match event {
            DeviceEvent::PenUpdate(data) => (events::PEN_UPDATE, callbacks.on_pen_update.as_mut(), data),
            DeviceEvent::BufferUpdate(data) => (events::BUFFER_UPDATE, callbacks.on_buffer_update.as_mut(), data),
            DeviceEvent::FullyPaused(data) => {
                if self.state == ModeState::Ready {
                    info!(mode = %self.ctx.descriptor().id, "Device fully paused");
                    self.state = ModeState::Pausing;
                }
                (events::FULLY_PAUSED, callbacks.on_fully_paused.as_mut(), data)
            }
            DeviceEvent::FullyResumed(data) => {
                if self.state == ModeState::Pausing {
                    info!(mode = %self.ctx.descriptor().id, "Device resumed");
                    self.state = ModeState::Ready;
                }
                (events::FULLY_RESUMED, callbacks.on_fully_resumed.as_mut(), data)
            }
            DeviceEvent::CallbackEvent(data) => (events::CALLBACK_EVENT, callbacks.on_callback_event.as_mut(), data),
            DeviceEvent::Other { name, data } => {
                match callbacks.on_message.as_mut() {
                    Some(on_message) => on_message(&mut self.ctx, &name, &data),
                    None => debug!(event = %name, "No onMessage capability, event dropped"),
                }
                return;
            }
        };

        match handler {
            Some(handler) => handler(&mut self.ctx, &data),
            None => debug!(event = name, "Capability not present, event ignored"),
        }
    }

    fn change_language(&mut self, language: String) {
        info!(mode = %self.ctx.descriptor().id, language = %language, "Language changed");
        self.ctx.set_language(language);
        if self.ctx.document().is_ready() {
            self.translate();
        } else {
            debug!("Page not ready, translation waits for start");
        }
    }

    fn translate(&mut self) {
        if let TranslatePass::Applied(_) = self.ctx.translate() {
            if let Some(translate_complete) = self.callbacks.translate_complete.as_mut() {
                translate_complete(&mut self.ctx);
            }
        }
    }

    fn request_close(&mut self, channel: CloseChannel) {
        if self.state == ModeState::Closing {
            if self.pending_close.contains(&channel) {
                debug!(%channel, "Duplicate close request ignored");
            } else {
                debug!(%channel, "Close request joined the pending close");
                self.pending_close.push(channel);
            }
            return;
        }

        self.pending_close.push(channel);
        self.transition(ModeState::Closing);

        match self.callbacks.on_close.as_mut() {
            Some(on_close) => {
                debug!(%channel, "Waiting for the mode to acknowledge the close");
                on_close(&mut self.ctx, CloseAck::new(self.outgoing_tx.clone()));
            }
            None => self.complete_close(),
        }
    }

    fn complete_close(&mut self) {
        if self.state != ModeState::Closing {
            warn!(state = %self.state, "Close acknowledged with no close pending");
            return;
        }
        for channel in std::mem::take(&mut self.pending_close) {
            self.queue(OutboundMessage::CloseAck(channel));
        }
        self.transition(ModeState::Terminal);
    }

    fn queue(&self, message: OutboundMessage) {
        // The receiver lives in `self`, so the queue cannot be closed here.
        let _ = self.outgoing_tx.send(Outgoing::Message(message));
    }

    fn transition(&mut self, next: ModeState) {
        info!(mode = %self.ctx.descriptor().id, from = %self.state, to = %next, "Mode state changed");
        self.state = next;
    }
}

impl<T> std::fmt::Debug for Coordinator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("mode", &self.ctx.descriptor().id)
            .field("state", &self.state)
            .field("pending_close", &self.pending_close)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::parts_with;
    use crate::transport::LineTransport;
    use async_trait::async_trait;
    use robopaint_core::ModeId;
    use robopaint_i18n::ResourceTree;
    use robopaint_mode_api::CommandBatch;
    use robopaint_settings::{MemoryBackend, SettingsBackend, SettingsStore};
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;

    /// Replays queued inbound messages and records everything sent.
    #[derive(Default)]
    struct RecordingChannel {
        inbound: VecDeque<IpcMessage>,
        sent: Rc<RefCell<Vec<IpcMessage>>>,
    }

    #[async_trait(?Send)]
    impl HostChannel for RecordingChannel {
        async fn recv(&mut self) -> BridgeResult<Option<IpcMessage>> {
            Ok(self.inbound.pop_front())
        }

        async fn send(&mut self, message: IpcMessage) -> BridgeResult<()> {
            self.sent.borrow_mut().push(message);
            Ok(())
        }
    }

    type Recorded = Rc<RefCell<Vec<IpcMessage>>>;

    fn coordinator(callbacks: ModeCallbacks, inbound: Vec<IpcMessage>) -> (Coordinator<RecordingChannel>, Recorded) {
        coordinator_with(callbacks, inbound, Arc::new(MemoryBackend::new()))
    }

    fn coordinator_with(
        callbacks: ModeCallbacks,
        inbound: Vec<IpcMessage>,
        backend: Arc<dyn SettingsBackend>,
    ) -> (Coordinator<RecordingChannel>, Recorded) {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let channel = RecordingChannel {
            inbound: inbound.into(),
            sent: Rc::clone(&sent),
        };
        let mut resources = ResourceTree::default();
        resources.insert_common("en-US", json!({"hello": "Hi"}).as_object().cloned().unwrap_or_default());
        resources.insert_common("de", json!({"hello": "Hallo"}).as_object().cloned().unwrap_or_default());
        (Coordinator::new(parts_with(resources, backend), callbacks, channel), sent)
    }

    fn close(channel: &str) -> IpcMessage {
        IpcMessage::new(channel, Value::Null)
    }

    #[tokio::test]
    async fn test_close_without_on_close_acks_once() {
        let (mut c, sent) = coordinator(ModeCallbacks::new(), vec![close("globalclose")]);
        c.start();

        assert_eq!(c.run().await.unwrap(), ModeState::Terminal);
        assert_eq!(*sent.borrow(), vec![close("globalclose")]);
    }

    #[tokio::test]
    async fn test_undecodable_line_does_not_stop_the_mode() {
        let input: &[u8] = b"\xff\n{\"channel\":\"globalclose\"}\n";
        let (writer, mut host) = tokio::io::duplex(4096);
        let parts = parts_with(ResourceTree::default(), Arc::new(MemoryBackend::new()));
        let mut c = Coordinator::new(parts, ModeCallbacks::new(), LineTransport::new(input, writer));
        c.start();

        assert_eq!(c.run().await.unwrap(), ModeState::Terminal);
        drop(c);

        let mut written = String::new();
        host.read_to_string(&mut written).await.unwrap();
        assert_eq!(written, "{\"channel\":\"globalclose\",\"payload\":null}\n");
    }

    #[tokio::test]
    async fn test_deferred_ack_holds_the_close() {
        let held: Rc<RefCell<Option<CloseAck>>> = Rc::default();
        let slot = Rc::clone(&held);
        let callbacks = ModeCallbacks::new().on_close(move |_, ack| *slot.borrow_mut() = Some(ack));
        let (mut c, sent) = coordinator(callbacks, Vec::new());
        c.start();

        c.dispatch(InboundEvent::Close(CloseChannel::ModeChange));
        c.flush().await.unwrap();
        assert_eq!(c.state(), ModeState::Closing);
        assert!(sent.borrow().is_empty());

        held.borrow_mut().take().unwrap().ack();
        assert_eq!(c.run().await.unwrap(), ModeState::Terminal);
        assert_eq!(*sent.borrow(), vec![close("modechange")]);
    }

    #[tokio::test]
    async fn test_duplicate_close_requests_coalesce() {
        let held: Rc<RefCell<Option<CloseAck>>> = Rc::default();
        let slot = Rc::clone(&held);
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        let callbacks = ModeCallbacks::new().on_close(move |_, ack| {
            *counter.borrow_mut() += 1;
            *slot.borrow_mut() = Some(ack);
        });
        let (mut c, sent) = coordinator(callbacks, Vec::new());
        c.start();

        c.dispatch(InboundEvent::Close(CloseChannel::ModeChange));
        c.dispatch(InboundEvent::Close(CloseChannel::ModeChange));
        c.dispatch(InboundEvent::Close(CloseChannel::GlobalClose));
        held.borrow_mut().take().unwrap().ack();
        c.flush().await.unwrap();

        assert_eq!(*calls.borrow(), 1);
        assert_eq!(c.state(), ModeState::Terminal);
        assert_eq!(*sent.borrow(), vec![close("modechange"), close("globalclose")]);

        c.dispatch(InboundEvent::Close(CloseChannel::GlobalClose));
        c.flush().await.unwrap();
        assert_eq!(sent.borrow().len(), 3);
    }

    #[tokio::test]
    async fn test_commands_before_ack_are_sent_first() {
        let callbacks = ModeCallbacks::new().on_close(|ctx, ack| {
            ctx.full_cancel(Some("bye"));
            ack.ack();
        });
        let (mut c, sent) = coordinator(callbacks, vec![close("globalclose")]);
        c.start();

        c.run().await.unwrap();

        let sent = sent.borrow();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].channel, "cncserver-run");
        assert_eq!(sent[0].payload, serde_json::to_value(CommandBatch::full_cancel("bye")).unwrap());
        assert_eq!(sent[1], close("globalclose"));
    }

    #[tokio::test]
    async fn test_device_events_route_to_capabilities() {
        let seen = Rc::new(RefCell::new(Vec::<String>::new()));
        let (pen, msg) = (Rc::clone(&seen), Rc::clone(&seen));
        let callbacks = ModeCallbacks::new()
            .on_pen_update(move |_, data| pen.borrow_mut().push(format!("pen {data}")))
            .on_message(move |_, name, data| msg.borrow_mut().push(format!("{name} {data}")));
        let inbound = vec![
            IpcMessage::new("cncserver", json!(["penUpdate", {"state": 1}])),
            IpcMessage::new("cncserver", json!(["bufferUpdate", []])),
            IpcMessage::new("cncserver", json!(["toolChange", "water"])),
            IpcMessage::new("bogus", Value::Null),
        ];
        let (mut c, sent) = coordinator(callbacks, inbound);
        c.start();

        assert_eq!(c.run().await.unwrap(), ModeState::Ready);
        assert_eq!(*seen.borrow(), vec!["pen {\"state\":1}".to_string(), "toolChange \"water\"".to_string()]);
        assert!(sent.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_pause_tracking() {
        let (mut c, _sent) = coordinator(ModeCallbacks::new(), Vec::new());
        c.start();

        c.dispatch(InboundEvent::Device(DeviceEvent::FullyPaused(Value::Null)));
        assert_eq!(c.state(), ModeState::Pausing);
        c.dispatch(InboundEvent::Device(DeviceEvent::FullyResumed(Value::Null)));
        assert_eq!(c.state(), ModeState::Ready);
    }

    #[tokio::test]
    async fn test_language_change_retranslates() {
        let completed = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&completed);
        let callbacks = ModeCallbacks::new().translate_complete(move |_| *counter.borrow_mut() += 1);
        let (mut c, _sent) = coordinator(callbacks, Vec::new());
        let body = c.context().document().body();
        let p = c.context_mut().document_mut().append_element(body, "p", &[("data-i18n", "common.hello")]);

        c.dispatch(InboundEvent::LanguageChange("de".to_string()));
        assert_eq!(*completed.borrow(), 0);
        assert_eq!(c.context().document().direct_text(p), "");

        c.start();
        assert_eq!(c.context().document().direct_text(p), "Hallo");
        assert_eq!(*completed.borrow(), 1);

        c.dispatch(InboundEvent::LanguageChange("en-US".to_string()));
        assert_eq!(c.context().document().direct_text(p), "Hi");
        assert_eq!(*completed.borrow(), 2);
    }

    #[tokio::test]
    async fn test_start_runs_hooks_in_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let (a, b, d) = (Rc::clone(&order), Rc::clone(&order), Rc::clone(&order));
        let callbacks = ModeCallbacks::new()
            .translate_complete(move |_| a.borrow_mut().push("translateComplete"))
            .bind_controls(move |_| b.borrow_mut().push("bindControls"))
            .page_init_ready(move |_| d.borrow_mut().push("pageInitReady"));
        let (mut c, _sent) = coordinator(callbacks, Vec::new());

        c.start();
        c.start();

        assert_eq!(c.state(), ModeState::Ready);
        assert_eq!(*order.borrow(), vec!["translateComplete", "bindControls", "pageInitReady"]);
    }

    #[tokio::test]
    async fn test_settings_update_reloads() {
        let backend: Arc<dyn SettingsBackend> = Arc::new(MemoryBackend::new());
        let (mut c, _sent) = coordinator_with(ModeCallbacks::new(), Vec::new(), Arc::clone(&backend));
        c.start();
        let mut other_writer = SettingsStore::new(ModeId::new("draw"), backend);
        other_writer.set("speed", json!(4)).unwrap();
        assert_eq!(c.context().settings().borrow().get("speed"), None);

        c.dispatch(InboundEvent::SettingsUpdate);

        assert_eq!(c.context().settings().borrow().get("speed"), Some(&json!(4)));
    }
}
