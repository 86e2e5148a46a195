//! Editor widget adapters.
//!
//! Rich-text and code editors are opaque third-party widgets. The adapter
//! mounts one widget per field instance under a binding id derived from a
//! random UUID (ids of the same field can coexist in repeatable groups, so the
//! field id is never used), and keeps the widget and the field value in step:
//!
//! - outward, either by polling the widget content on a fixed interval
//!   ([`SyncMode::Poll`]) or by listening to its change events
//!   ([`SyncMode::Events`]);
//! - inward, by pushing the field value into the widget whenever it reports
//!   that it (re)loaded its content.
//!
//! Polling stands in for change events the rich-text widget doesn't reliably
//! emit. It is a timer loop with a last-observed baseline so unchanged content
//! never produces a notification. Dropping the adapter stops the timer and
//! releases the widget binding.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::normalizer::{lock, FieldValue};

/// Unique binding between one adapter and one mounted widget.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EditorBinding {
    token: Uuid,
}

impl EditorBinding {
    pub fn generate() -> Self {
        Self {
            token: Uuid::new_v4(),
        }
    }

    pub fn token(&self) -> Uuid {
        self.token
    }

    /// Element id of the editing area.
    pub fn editor_id(&self) -> String {
        format!("editor-{}", self.token)
    }

    /// Element id of the toolbar container.
    pub fn toolbar_id(&self) -> String {
        format!("toolbar-{}", self.token)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorKind {
    RichText,
    Code { mode: Option<String> },
}

/// Lifecycle and content events emitted by a widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    /// The widget (re)loaded its content and may have reset it
    ContentLoaded,
    /// The user changed the content
    Changed(String),
}

pub type EditorEventHandler = Box<dyn Fn(EditorEvent) + Send + Sync>;

/// An opaque, already-initialized editor widget.
pub trait EditorWidget: Send + Sync {
    fn content(&self) -> String;
    fn set_content(&self, content: &str);
    fn subscribe(&self, handler: EditorEventHandler);
}

/// Creates and tears down widgets, keyed by binding.
pub trait EditorHost: Send + Sync {
    fn initialize(
        &self,
        binding: &EditorBinding,
        kind: &EditorKind,
        settings: Option<&Value>,
    ) -> Arc<dyn EditorWidget>;

    fn remove(&self, binding: &EditorBinding);
}

/// How widget content flows back into the field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Poll(Duration),
    Events,
}

/// A key press inside an editor region.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyPress {
    pub code: String,
    pub ctrl: bool,
    pub meta: bool,
}

impl KeyPress {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }
}

/// Whether an event should continue to ancestor handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Continue,
    Stop,
}

fn content_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Keeps one mounted widget and one field value in step.
pub struct EditorAdapter {
    binding: EditorBinding,
    host: Arc<dyn EditorHost>,
    widget: Arc<dyn EditorWidget>,
    poll: Option<JoinHandle<()>>,
}

impl EditorAdapter {
    /// Mount a widget for `value`. Called once per field instance.
    pub fn mount(
        host: Arc<dyn EditorHost>,
        kind: EditorKind,
        settings: Option<&Value>,
        value: Arc<FieldValue>,
        mode: SyncMode,
    ) -> Self {
        let binding = EditorBinding::generate();
        let widget = host.initialize(&binding, &kind, settings);
        let initial = content_of(&value.current());
        widget.set_content(&initial);
        debug!(binding = %binding.token(), ?kind, ?mode, "editor mounted");

        let weak: Weak<dyn EditorWidget> = Arc::downgrade(&widget);
        let events_value = value.clone();
        widget.subscribe(Box::new(move |event| match event {
            EditorEvent::ContentLoaded => {
                if let Some(widget) = weak.upgrade() {
                    widget.set_content(&content_of(&events_value.current()));
                }
            }
            EditorEvent::Changed(content) => {
                if mode == SyncMode::Events {
                    events_value.edit(Value::String(content));
                }
            }
        }));

        let poll = match mode {
            SyncMode::Poll(interval) => spawn_poll(widget.clone(), value, interval, initial),
            SyncMode::Events => None,
        };

        Self {
            binding,
            host,
            widget,
            poll,
        }
    }

    pub fn binding(&self) -> &EditorBinding {
        &self.binding
    }

    pub fn widget(&self) -> &Arc<dyn EditorWidget> {
        &self.widget
    }

    pub fn is_polling(&self) -> bool {
        self.poll.as_ref().is_some_and(|p| !p.is_finished())
    }

    /// Keep select-all inside the editor from reaching host-page shortcuts.
    pub fn handle_key(&self, key: &KeyPress) -> Propagation {
        if key.code == "KeyA" && (key.ctrl || key.meta) {
            Propagation::Stop
        } else {
            Propagation::Continue
        }
    }
}

fn spawn_poll(
    widget: Arc<dyn EditorWidget>,
    value: Arc<FieldValue>,
    interval: Duration,
    baseline: String,
) -> Option<JoinHandle<()>> {
    if tokio::runtime::Handle::try_current().is_err() {
        debug!("no runtime, editor content will not be polled");
        return None;
    }
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_observed = baseline;
        loop {
            ticker.tick().await;
            let content = widget.content();
            if content != last_observed {
                trace!(len = content.len(), "editor content changed");
                value.edit(Value::String(content.clone()));
                last_observed = content;
            }
        }
    }))
}

impl Drop for EditorAdapter {
    fn drop(&mut self) {
        if let Some(poll) = self.poll.take() {
            poll.abort();
        }
        self.host.remove(&self.binding);
        debug!(binding = %self.binding.token(), "editor unmounted");
    }
}

/// Widget that keeps its content in memory.
///
/// Used for headless rendering and in tests; [`MemoryWidget::type_text`] and
/// [`MemoryWidget::fire`] stand in for user input and widget lifecycle.
pub struct MemoryWidget {
    kind: EditorKind,
    content: Mutex<String>,
    handlers: Mutex<Vec<EditorEventHandler>>,
}

impl MemoryWidget {
    fn new(kind: EditorKind) -> Self {
        Self {
            kind,
            content: Mutex::new(String::new()),
            handlers: Mutex::new(Vec::new()),
        }
    }

    /// Simulate the user editing the content. Code widgets also emit `Changed`.
    pub fn type_text(&self, content: &str) {
        *lock(&self.content) = content.to_string();
        if matches!(self.kind, EditorKind::Code { .. }) {
            self.fire(EditorEvent::Changed(content.to_string()));
        }
    }

    pub fn fire(&self, event: EditorEvent) {
        for handler in lock(&self.handlers).iter() {
            handler(event.clone());
        }
    }
}

impl EditorWidget for MemoryWidget {
    fn content(&self) -> String {
        lock(&self.content).clone()
    }

    fn set_content(&self, content: &str) {
        *lock(&self.content) = content.to_string();
    }

    fn subscribe(&self, handler: EditorEventHandler) {
        lock(&self.handlers).push(handler);
    }
}

/// Host that creates [`MemoryWidget`]s and tracks which bindings are live.
#[derive(Default)]
pub struct MemoryEditorHost {
    widgets: Mutex<HashMap<EditorBinding, Arc<MemoryWidget>>>,
}

impl MemoryEditorHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn widget(&self, binding: &EditorBinding) -> Option<Arc<MemoryWidget>> {
        lock(&self.widgets).get(binding).cloned()
    }

    /// Widget whose editing area has the given element id.
    pub fn widget_by_element_id(&self, element_id: &str) -> Option<Arc<MemoryWidget>> {
        lock(&self.widgets)
            .iter()
            .find(|(binding, _)| binding.editor_id() == element_id)
            .map(|(_, widget)| widget.clone())
    }

    pub fn mounted(&self) -> usize {
        lock(&self.widgets).len()
    }
}

impl EditorHost for MemoryEditorHost {
    fn initialize(
        &self,
        binding: &EditorBinding,
        kind: &EditorKind,
        _settings: Option<&Value>,
    ) -> Arc<dyn EditorWidget> {
        let widget = Arc::new(MemoryWidget::new(kind.clone()));
        lock(&self.widgets).insert(binding.clone(), widget.clone());
        widget
    }

    fn remove(&self, binding: &EditorBinding) {
        lock(&self.widgets).remove(binding);
    }
}
