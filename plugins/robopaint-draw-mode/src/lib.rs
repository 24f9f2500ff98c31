//! # RoboPaint Draw Mode
//!
//! Sample mode: a page with drawing controls and persisted settings that
//! streams paths to the robot and implements every mode capability.
//!
//! The mode package lives in `mode/` next to this crate.

use robopaint_dom::Document;
use robopaint_mode_api::CommandDescriptor;
use robopaint_mode_runtime::{CloseAck, ModeCallbacks, ModeContext};
use serde_json::{json, Map, Value};
use std::cell::{Ref, RefCell};
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, info};

/// Element ids on the draw page.
pub mod ids {
    pub const TITLE: &str = "title";
    pub const STATUS: &str = "status";
    pub const START: &str = "start";
    pub const PAUSE: &str = "pause";
    pub const CANCEL: &str = "cancel";
    pub const SPEED: &str = "speed";
    pub const AUTOPAINT: &str = "autopaint";
    pub const FILL: &str = "fill";
    pub const PEN: &str = "pen-state";
}

/// Selector for every control persisted in settings.
pub const SETTINGS_SELECTOR: &str = ".setting";

const MARKER: &str = "data-i18n";

/// Directory of the bundled mode package.
#[must_use]
pub fn mode_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("mode")
}

/// Builds the draw page.
#[must_use]
pub fn page() -> Document {
    let mut doc = Document::new();
    let body = doc.body();

    let title = doc.append_element(body, "h1", &[("id", ids::TITLE), (MARKER, "title")]);
    doc.append_text(title, "Draw");
    doc.append_element(body, "p", &[("id", ids::STATUS)]);

    let toolbar = doc.append_element(body, "div", &[("class", "toolbar")]);
    let start = doc.append_element(
        toolbar,
        "button",
        &[("id", ids::START), (MARKER, "buttons.start;[title]hints.start")],
    );
    doc.append_text(start, "Start drawing");
    doc.append_element(start, "img", &[("src", "images/pen.svg")]);
    let pause = doc.append_element(toolbar, "button", &[("id", ids::PAUSE), (MARKER, "buttons.pause")]);
    doc.append_text(pause, "Pause");
    // Empty marker: the text is the key.
    let cancel = doc.append_element(toolbar, "button", &[("id", ids::CANCEL), (MARKER, "")]);
    doc.append_text(cancel, "buttons.cancel");

    let form = doc.append_element(body, "form", &[("id", "settings")]);
    let label = doc.append_element(form, "label", &[(MARKER, "settings.speed")]);
    doc.append_text(label, "Drawing speed");
    doc.append_element(
        form,
        "input",
        &[("id", ids::SPEED), ("type", "text"), ("class", "setting"), ("value", "5")],
    );
    let label = doc.append_element(form, "label", &[(MARKER, "settings.autopaint")]);
    doc.append_text(label, "Refill paint automatically");
    doc.append_element(
        form,
        "input",
        &[("id", ids::AUTOPAINT), ("type", "checkbox"), ("class", "setting"), ("checked", "")],
    );
    let fill = doc.append_element(form, "div", &[("id", ids::FILL), ("class", "setting")]);
    for (value, checked) in [("none", false), ("hatch", true), ("solid", false)] {
        let option = doc.append_element(fill, "label", &[]);
        let mut attrs = vec![("type", "radio"), ("name", "fill"), ("value", value)];
        if checked {
            attrs.push(("checked", ""));
        }
        doc.append_element(option, "input", &attrs);
        let key = format!("common.fill.{value}");
        let text = doc.append_element(option, "span", &[(MARKER, key.as_str())]);
        doc.append_text(text, value);
    }

    doc.append_element(body, "span", &[("id", ids::PEN)]);
    doc
}

/// Reads the number of queued commands from a `bufferUpdate` payload.
///
/// The host sends either the buffer itself, a `{ "count": n }` summary or
/// a bare number.
#[must_use]
pub fn buffer_len(data: &Value) -> usize {
    match data {
        Value::Array(items) => items.len(),
        Value::Object(summary) => summary
            .get("count")
            .and_then(Value::as_u64)
            .map_or(0, |n| usize::try_from(n).unwrap_or(usize::MAX)),
        Value::Number(n) => n.as_u64().map_or(0, |n| usize::try_from(n).unwrap_or(usize::MAX)),
        _ => 0,
    }
}

/// Observable state of the draw mode.
#[derive(Debug, Default)]
pub struct DrawState {
    pub ready: bool,
    pub paused: bool,
    /// Commands still queued on the host.
    pub buffered: usize,
    /// Last pen report.
    pub pen: Value,
    pub translations: usize,
    pub callback_events: Vec<Value>,
    /// Device events the mode has no dedicated handler for.
    pub messages: Vec<String>,
    status: Status,
    pending_close: Option<CloseAck>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Status {
    #[default]
    Ready,
    Drawing(usize),
    Paused,
}

impl DrawState {
    /// Whether a close is waiting for the buffer to drain.
    #[must_use]
    pub const fn close_pending(&self) -> bool {
        self.pending_close.is_some()
    }
}

/// The draw mode.
#[derive(Debug, Clone, Default)]
pub struct DrawMode {
    state: Rc<RefCell<DrawState>>,
}

impl DrawMode {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Ref<'_, DrawState> {
        self.state.borrow()
    }

    /// Streams a path to the robot: pen up, travel to the first point, pen
    /// down, trace, pen up and park.
    pub fn draw_path(&self, ctx: &mut ModeContext, points: &[(f64, f64)]) {
        let Some(&(x, y)) = points.first() else {
            debug!("Empty path, nothing to draw");
            return;
        };

        let speed = ctx.settings().borrow().get(ids::SPEED).cloned().unwrap_or(json!("5"));
        let mut commands = vec![
            CommandDescriptor::with_args("speed", [speed]),
            CommandDescriptor::bare("up"),
            CommandDescriptor::with_args("move", [json!(x), json!(y)]),
            CommandDescriptor::bare("down"),
        ];
        commands.extend(
            points[1..]
                .iter()
                .map(|&(x, y)| CommandDescriptor::with_args("move", [json!(x), json!(y)])),
        );
        commands.push(CommandDescriptor::bare("up"));
        commands.push(CommandDescriptor::bare("park"));

        ctx.run(commands);
        ctx.pause_till_empty(true);
        self.state.borrow_mut().status = Status::Drawing(points.len());
        render_status(ctx, &self.state.borrow());
        info!(points = points.len(), "Path sent");
    }

    /// Pauses a running drawing or resumes a paused one.
    pub fn toggle_pause(&self, ctx: &mut ModeContext) {
        if self.state.borrow().paused {
            ctx.run_command("resume");
        } else {
            ctx.run_priority(["pause"]);
        }
    }

    /// Cancels the drawing.
    pub fn cancel(&self, ctx: &mut ModeContext) {
        ctx.full_cancel(None);
        self.state.borrow_mut().status = Status::Ready;
        render_status(ctx, &self.state.borrow());
    }

    /// The mode's capabilities.
    #[must_use]
    pub fn callbacks(&self) -> ModeCallbacks {
        let on_close = Rc::clone(&self.state);
        let on_pen = Rc::clone(&self.state);
        let on_buffer = Rc::clone(&self.state);
        let on_paused = Rc::clone(&self.state);
        let on_resumed = Rc::clone(&self.state);
        let on_callback = Rc::clone(&self.state);
        let on_message = Rc::clone(&self.state);
        let on_translated = Rc::clone(&self.state);
        let on_ready = Rc::clone(&self.state);

        ModeCallbacks::new()
            .on_close(move |ctx, ack| {
                let mut state = on_close.borrow_mut();
                if state.buffered == 0 {
                    ack.ack();
                    return;
                }
                info!(buffered = state.buffered, "Cancelling before close");
                let message = ctx.t("common.status.closing");
                ctx.full_cancel(Some(&message));
                state.pending_close = Some(ack);
            })
            .on_pen_update(move |ctx, data| {
                on_pen.borrow_mut().pen = data.clone();
                let label = data.get("state").map_or_else(String::new, Value::to_string);
                set_text(ctx, ids::PEN, &label);
            })
            .on_buffer_update(move |_, data| {
                let pending = {
                    let mut state = on_buffer.borrow_mut();
                    state.buffered = buffer_len(data);
                    if state.buffered == 0 {
                        state.pending_close.take()
                    } else {
                        None
                    }
                };
                if let Some(ack) = pending {
                    info!("Buffer drained, acknowledging close");
                    ack.ack();
                }
            })
            .on_fully_paused(move |ctx, _| {
                let mut state = on_paused.borrow_mut();
                state.paused = true;
                state.status = Status::Paused;
                set_marker(ctx, ids::PAUSE, "buttons.resume");
                render_status(ctx, &state);
            })
            .on_fully_resumed(move |ctx, _| {
                let mut state = on_resumed.borrow_mut();
                state.paused = false;
                state.status = Status::Ready;
                set_marker(ctx, ids::PAUSE, "buttons.pause");
                render_status(ctx, &state);
            })
            .on_callback_event(move |_, data| on_callback.borrow_mut().callback_events.push(data.clone()))
            .on_message(move |_, name, _| {
                debug!(event = name, "Unhandled device event");
                on_message.borrow_mut().messages.push(name.to_string());
            })
            .translate_complete(move |ctx| {
                let mut state = on_translated.borrow_mut();
                state.translations += 1;
                render_status(ctx, &state);
            })
            .bind_controls(|ctx| {
                let bound = ctx.manage(&[SETTINGS_SELECTOR]);
                debug!(controls = bound.len(), "Settings bound");
            })
            .page_init_ready(move |ctx| {
                let mut state = on_ready.borrow_mut();
                state.ready = true;
                render_status(ctx, &state);
                info!(language = ctx.language(), "Draw mode ready");
            })
    }
}

fn render_status(ctx: &mut ModeContext, state: &DrawState) {
    let text = match state.status {
        Status::Ready => ctx.t("status.ready"),
        Status::Paused => ctx.t("status.paused"),
        Status::Drawing(count) => {
            let mut vars = Map::new();
            vars.insert("count".to_string(), json!(count));
            ctx.t_with("status.drawing", &vars)
        }
    };
    set_text(ctx, ids::STATUS, &text);
}

fn set_text(ctx: &mut ModeContext, id: &str, text: &str) {
    if let Some(node) = ctx.document().get_element_by_id(id) {
        ctx.document_mut().set_direct_text(node, text);
    }
}

/// Points an element at another translation key and re-translates.
fn set_marker(ctx: &mut ModeContext, id: &str, key: &str) {
    if let Some(node) = ctx.document().get_element_by_id(id) {
        ctx.document_mut().set_attr(node, MARKER, key);
        ctx.translate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robopaint_dom::ControlKind;

    #[test]
    fn test_page_structure() {
        let doc = page();

        let speed = doc.get_element_by_id(ids::SPEED).unwrap();
        let autopaint = doc.get_element_by_id(ids::AUTOPAINT).unwrap();
        let fill = doc.get_element_by_id(ids::FILL).unwrap();
        assert_eq!(doc.control_kind(speed), ControlKind::Text);
        assert_eq!(doc.control_kind(autopaint), ControlKind::Checkbox);
        assert_eq!(doc.control_kind(fill), ControlKind::RadioGroup);
        assert_eq!(doc.control_value(fill), Some(json!("hatch")));
        assert_eq!(doc.select(SETTINGS_SELECTOR).unwrap(), vec![speed, autopaint, fill]);
        assert!(!doc.is_ready());
    }

    #[test]
    fn test_buffer_len_shapes() {
        assert_eq!(buffer_len(&json!([1, 2, 3])), 3);
        assert_eq!(buffer_len(&json!({"count": 7})), 7);
        assert_eq!(buffer_len(&json!(4)), 4);
        assert_eq!(buffer_len(&json!({})), 0);
        assert_eq!(buffer_len(&Value::Null), 0);
    }

    #[test]
    fn test_callbacks_cover_every_capability() {
        assert_eq!(DrawMode::new().callbacks().present().len(), 10);
    }
}
