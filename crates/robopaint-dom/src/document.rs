//! Element arena, text handling, form controls and change events.

use crate::selector::SelectorList;
use robopaint_core::BridgeResult;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Index of an element inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A child of an element: either a text node or another element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Element(NodeId),
}

/// An element and its own state.
#[derive(Debug, Clone)]
pub struct Element {
    tag: String,
    attrs: BTreeMap<String, String>,
    children: Vec<Node>,
    parent: Option<NodeId>,
    value: String,
    checked: bool,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
            parent: None,
            value: String::new(),
            checked: false,
        }
    }

    /// Returns the lower-cased tag name.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns an attribute value.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Returns the element identifier, if any.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.attr("id").filter(|id| !id.is_empty())
    }

    /// Checks the whitespace separated `class` attribute.
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    /// Returns the child nodes in order.
    #[must_use]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Returns the parent element.
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    fn input_type(&self) -> Option<&str> {
        (self.tag == "input").then(|| self.attr("type").unwrap_or("text"))
    }
}

/// How a form control exposes its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// Text-like control: text/number/range inputs, selects, textareas.
    Text,
    /// Checkbox; its value is the checked state.
    Checkbox,
    /// Container of radio inputs acting as one control.
    RadioGroup,
    /// Neither a scalar control nor a radio group.
    Incompatible,
}

type ChangeListener = Box<dyn FnMut(&Value)>;

struct ListenerEntry {
    slot: Option<&'static str>,
    listener: ChangeListener,
}

/// An in-memory document.
///
/// Elements live in an arena and are addressed by [`NodeId`]. The root is
/// the `body` element. Change listeners receive the control's current value
/// and have no access to the document itself.
pub struct Document {
    elements: Vec<Element>,
    root: NodeId,
    ready: bool,
    listeners: HashMap<NodeId, Vec<ListenerEntry>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates an empty, not yet ready document with a `body` root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            elements: vec![Element::new("body")],
            root: NodeId(0),
            ready: false,
            listeners: HashMap::new(),
        }
    }

    /// Returns the root `body` element.
    #[must_use]
    pub const fn body(&self) -> NodeId {
        self.root
    }

    /// Marks the document as fully parsed.
    pub fn mark_ready(&mut self) {
        if !self.ready {
            debug!("Document ready");
        }
        self.ready = true;
    }

    /// Returns whether the document is fully parsed.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    /// Returns an element.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this document.
    #[must_use]
    pub fn element(&self, id: NodeId) -> &Element {
        &self.elements[id.0]
    }

    fn element_mut(&mut self, id: NodeId) -> &mut Element {
        &mut self.elements[id.0]
    }

    // ============ Construction ============

    /// Creates a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.elements.push(Element::new(tag));
        NodeId(self.elements.len() - 1)
    }

    /// Appends `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.element_mut(child).parent = Some(parent);
        self.element_mut(parent).children.push(Node::Element(child));
    }

    /// Appends a text node to `parent`.
    pub fn append_text(&mut self, parent: NodeId, text: impl Into<String>) {
        self.element_mut(parent).children.push(Node::Text(text.into()));
    }

    /// Creates an element with attributes and appends it to `parent`.
    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = self.create_element(tag);
        for (name, value) in attrs {
            self.set_attr(id, name, *value);
        }
        self.append_child(parent, id);
        id
    }

    /// Sets an attribute. Setting `value` or `checked` on an input also
    /// initializes its live state, as an HTML parser would.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        let element = self.element_mut(id);
        match name {
            "value" if element.value.is_empty() => element.value.clone_from(&value),
            "checked" => element.checked = true,
            _ => {}
        }
        element.attrs.insert(name.to_string(), value);
    }

    // ============ Traversal ============

    /// Returns all elements below `id` in document order, `id` excluded.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_descendants(id, &mut out);
        out
    }

    fn collect_descendants(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for child in &self.element(id).children {
            if let Node::Element(child) = child {
                out.push(*child);
                self.collect_descendants(*child, out);
            }
        }
    }

    /// Returns the first attached element with the given identifier.
    #[must_use]
    pub fn get_element_by_id(&self, element_id: &str) -> Option<NodeId> {
        std::iter::once(self.root)
            .chain(self.descendants(self.root))
            .find(|id| self.element(*id).id() == Some(element_id))
    }

    /// Returns every attached element matching `selector`, in document order.
    pub fn select(&self, selector: &str) -> BridgeResult<Vec<NodeId>> {
        let selectors = SelectorList::parse(selector)?;
        Ok(self.select_parsed(&selectors))
    }

    /// Like [`Document::select`] with an already parsed selector.
    #[must_use]
    pub fn select_parsed(&self, selectors: &SelectorList) -> Vec<NodeId> {
        std::iter::once(self.root)
            .chain(self.descendants(self.root))
            .filter(|id| selectors.matches(self, *id))
            .collect()
    }

    /// Returns every attached element carrying attribute `name`.
    #[must_use]
    pub fn elements_with_attr(&self, name: &str) -> Vec<NodeId> {
        std::iter::once(self.root)
            .chain(self.descendants(self.root))
            .filter(|id| self.element(*id).attr(name).is_some())
            .collect()
    }

    // ============ Text ============

    /// Returns the concatenated direct text children of `id`, trimmed.
    #[must_use]
    pub fn direct_text(&self, id: NodeId) -> String {
        self.element(id)
            .children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                Node::Element(_) => None,
            })
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Returns all text below `id`, depth first.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in &self.element(id).children {
            match child {
                Node::Text(text) => out.push_str(text),
                Node::Element(child) => out.push_str(&self.text_content(*child)),
            }
        }
        out
    }

    /// Replaces the direct text of `id` without touching child elements.
    ///
    /// The first non-blank direct text node is rewritten in place. When the
    /// element has none, a text node is inserted before its first child.
    pub fn set_direct_text(&mut self, id: NodeId, text: &str) {
        let children = &mut self.element_mut(id).children;
        let slot = children
            .iter()
            .position(|node| matches!(node, Node::Text(t) if !t.trim().is_empty()));
        match slot {
            Some(index) => children[index] = Node::Text(text.to_string()),
            None => children.insert(0, Node::Text(text.to_string())),
        }
    }

    // ============ Form controls ============

    /// Classifies `id` as a form control.
    #[must_use]
    pub fn control_kind(&self, id: NodeId) -> ControlKind {
        let element = self.element(id);
        match (element.tag.as_str(), element.input_type()) {
            (_, Some("radio")) => ControlKind::Incompatible,
            (_, Some("checkbox")) => ControlKind::Checkbox,
            ("input" | "select" | "textarea", _) => ControlKind::Text,
            _ if !self.radio_options(id).is_empty() => ControlKind::RadioGroup,
            _ => ControlKind::Incompatible,
        }
    }

    /// Returns the radio inputs below `id`.
    #[must_use]
    pub fn radio_options(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|option| self.element(*option).input_type() == Some("radio"))
            .collect()
    }

    /// Returns the current value of a control.
    ///
    /// Checkboxes yield a boolean, text controls a string, radio groups the
    /// `value` of the checked option or `null` when nothing is selected.
    #[must_use]
    pub fn control_value(&self, id: NodeId) -> Option<Value> {
        match self.control_kind(id) {
            ControlKind::Text => Some(Value::String(self.element(id).value.clone())),
            ControlKind::Checkbox => Some(Value::Bool(self.element(id).checked)),
            ControlKind::RadioGroup => Some(
                self.radio_options(id)
                    .into_iter()
                    .find(|option| self.element(*option).checked)
                    .and_then(|option| self.element(option).attr("value"))
                    .map_or(Value::Null, |v| Value::String(v.to_string())),
            ),
            ControlKind::Incompatible => None,
        }
    }

    /// Sets a control value without firing change listeners.
    ///
    /// Returns `false` when the value does not fit the control, such as a
    /// radio value with no matching option.
    pub fn set_control_value(&mut self, id: NodeId, value: &Value) -> bool {
        match self.control_kind(id) {
            ControlKind::Text => {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                self.element_mut(id).value = text;
                true
            }
            ControlKind::Checkbox => {
                let checked = match value {
                    Value::Bool(b) => *b,
                    Value::String(s) => matches!(s.as_str(), "true" | "on" | "1"),
                    Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
                    _ => return false,
                };
                self.element_mut(id).checked = checked;
                true
            }
            ControlKind::RadioGroup => {
                let Value::String(wanted) = value else {
                    return false;
                };
                let options = self.radio_options(id);
                if !options.iter().any(|o| self.element(*o).attr("value") == Some(wanted.as_str())) {
                    return false;
                }
                for option in options {
                    let checked = self.element(option).attr("value") == Some(wanted.as_str());
                    self.element_mut(option).checked = checked;
                }
                true
            }
            ControlKind::Incompatible => false,
        }
    }

    // ============ Events ============

    /// Adds a change listener to `id`.
    pub fn on_change(&mut self, id: NodeId, listener: impl FnMut(&Value) + 'static) {
        self.listeners.entry(id).or_default().push(ListenerEntry {
            slot: None,
            listener: Box::new(listener),
        });
    }

    /// Installs a change listener in a named slot, replacing whatever was
    /// previously installed in that slot for `id`.
    pub fn set_change_listener(&mut self, id: NodeId, slot: &'static str, listener: impl FnMut(&Value) + 'static) {
        let entries = self.listeners.entry(id).or_default();
        let entry = ListenerEntry {
            slot: Some(slot),
            listener: Box::new(listener),
        };
        match entries.iter_mut().find(|e| e.slot == Some(slot)) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
    }

    /// Returns how many listeners are attached to `id`.
    #[must_use]
    pub fn listener_count(&self, id: NodeId) -> usize {
        self.listeners.get(&id).map_or(0, Vec::len)
    }

    /// Fires the change listeners of `id` with its current value.
    pub fn trigger_change(&mut self, id: NodeId) {
        let Some(value) = self.control_value(id) else {
            return;
        };
        let Some(mut entries) = self.listeners.remove(&id) else {
            return;
        };
        for entry in &mut entries {
            (entry.listener)(&value);
        }
        // Listeners registered while dispatching land behind the existing ones.
        if let Some(added) = self.listeners.remove(&id) {
            entries.extend(added);
        }
        self.listeners.insert(id, entries);
    }

    /// Simulates a user edit: sets the value, then fires change listeners.
    pub fn user_input(&mut self, id: NodeId, value: &Value) -> bool {
        if !self.set_control_value(id, value) {
            return false;
        }
        self.trigger_change(id);
        true
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("elements", &self.elements.len())
            .field("ready", &self.ready)
            .finish_non_exhaustive()
    }
}
