//! Value normalization and controlled/uncontrolled reconciliation.
//!
//! Two halves:
//!
//! - [`GeneratorRegistry`] derives a field's working value from the raw stored
//!   value by running it through the filter pipeline named by the descriptor's
//!   `generator`. Unknown generators pass the raw value through.
//! - [`ValueSync`] / [`FieldValue`] keep a field's local edit state apart from
//!   the value its owning form keeps re-supplying, and decide when the form
//!   needs to hear about a change.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, trace};

use crate::types::FieldDescriptor;

/// Callback invoked with a field's outward value.
pub type OnChange = Arc<dyn Fn(Value) + Send + Sync>;

/// One step of a generator pipeline: receives the previous output and the
/// full descriptor.
pub type GeneratorFilter = Arc<dyn Fn(Value, &FieldDescriptor) -> Value + Send + Sync>;

/// Name of the built-in generator that fills empty values with a UUID.
pub const UUID_GENERATOR: &str = "uuid";

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Structural value equality.
///
/// Object key order never matters; array order always does, and `5` is not
/// `"5"`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    a == b
}

/// Named filter pipelines applied to raw values.
#[derive(Default, Clone)]
pub struct GeneratorRegistry {
    filters: HashMap<String, Vec<GeneratorFilter>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `uuid` generator.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(UUID_GENERATOR, |raw, _| {
            let empty = match &raw {
                Value::Null => true,
                Value::String(s) => s.is_empty(),
                _ => false,
            };
            if empty {
                Value::String(uuid::Uuid::new_v4().to_string())
            } else {
                raw
            }
        });
        registry
    }

    /// Append a filter to the named pipeline. Filters run in registration order.
    pub fn register<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Fn(Value, &FieldDescriptor) -> Value + Send + Sync + 'static,
    {
        self.filters
            .entry(name.into())
            .or_default()
            .push(Arc::new(filter));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Run `raw` through the named pipeline. Unknown names return `raw`.
    pub fn apply(&self, name: &str, raw: Value, descriptor: &FieldDescriptor) -> Value {
        match self.filters.get(name) {
            Some(pipeline) => pipeline
                .iter()
                .fold(raw, |value, filter| filter(value, descriptor)),
            None => {
                trace!(generator = name, field = %descriptor.id, "no filters registered, passing through");
                raw
            }
        }
    }

    /// The working value for a descriptor.
    pub fn normalize(&self, descriptor: &FieldDescriptor) -> Value {
        match descriptor.generator.as_deref() {
            Some(name) => self.apply(name, descriptor.value.clone(), descriptor),
            None => descriptor.value.clone(),
        }
    }
}

impl std::fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.filters.keys().collect();
        names.sort();
        f.debug_struct("GeneratorRegistry")
            .field("generators", &names)
            .finish()
    }
}

/// Reconciles the value a parent keeps supplying with local edits.
///
/// The parent's value is only ever a baseline: it never overwrites local
/// state. A notification is due whenever local state differs from the last
/// value the parent knows about. A freshly supplied parent value counts as
/// known, so the parent is never told about a value it just supplied, and
/// never told twice about one edit. Reverting to an older parent value is a
/// change like any other.
#[derive(Debug, Clone)]
pub struct ValueSync {
    upstream: Value,
    current: Value,
    last_notified: Value,
}

impl ValueSync {
    pub fn new(initial: Value) -> Self {
        Self {
            upstream: initial.clone(),
            current: initial.clone(),
            last_notified: initial,
        }
    }

    pub fn current(&self) -> &Value {
        &self.current
    }

    pub fn upstream(&self) -> &Value {
        &self.upstream
    }

    /// Record the parent's latest value. Returns a pending notification, if any.
    pub fn receive_upstream(&mut self, value: Value) -> Option<Value> {
        if !values_equal(&self.upstream, &value) {
            self.last_notified = value.clone();
            self.upstream = value;
        }
        self.pending()
    }

    /// Apply a local edit. Returns the value to announce, if any.
    pub fn edit(&mut self, value: Value) -> Option<Value> {
        self.current = value;
        self.pending()
    }

    fn pending(&mut self) -> Option<Value> {
        if values_equal(&self.current, &self.last_notified) {
            return None;
        }
        self.last_notified = self.current.clone();
        Some(self.current.clone())
    }
}

/// Shared, notifying wrapper around [`ValueSync`].
///
/// Held behind an `Arc` so timers and fetch completions can edit the value of
/// the instance that owns them. `project` maps the stored shape to the shape
/// announced to the parent (for example a one-element list to its scalar).
pub struct FieldValue {
    sync: Mutex<ValueSync>,
    on_change: OnChange,
    project: fn(&Value) -> Value,
}

impl FieldValue {
    pub fn new(initial: Value, on_change: OnChange) -> Arc<Self> {
        Self::with_projection(initial, on_change, Value::clone)
    }

    pub fn with_projection(
        initial: Value,
        on_change: OnChange,
        project: fn(&Value) -> Value,
    ) -> Arc<Self> {
        Arc::new(Self {
            sync: Mutex::new(ValueSync::new(initial)),
            on_change,
            project,
        })
    }

    pub fn current(&self) -> Value {
        lock(&self.sync).current().clone()
    }

    pub fn receive_upstream(&self, value: Value) {
        let pending = lock(&self.sync).receive_upstream(value);
        self.announce(pending);
    }

    pub fn edit(&self, value: Value) {
        let pending = lock(&self.sync).edit(value);
        self.announce(pending);
    }

    fn announce(&self, pending: Option<Value>) {
        if let Some(value) = pending {
            let outward = (self.project)(&value);
            debug!(value = %outward, "field value changed");
            (self.on_change)(outward);
        }
    }
}

impl std::fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldValue")
            .field("sync", &*lock(&self.sync))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder() -> (OnChange, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let on_change: OnChange = Arc::new(move |v| sink.lock().unwrap().push(v));
        (on_change, seen)
    }

    #[test]
    fn test_values_equal_respects_array_order_not_key_order() {
        assert!(values_equal(&json!({"a": 1, "b": 2}), &json!({"b": 2, "a": 1})));
        assert!(!values_equal(&json!(["a", "b"]), &json!(["b", "a"])));
        assert!(!values_equal(&json!("5"), &json!(5)));
    }

    #[test]
    fn test_normalize_without_generator_passes_through() {
        let registry = GeneratorRegistry::with_defaults();
        let descriptor = FieldDescriptor::new("a", "text").with_value("raw");
        assert_eq!(registry.normalize(&descriptor), json!("raw"));
    }

    #[test]
    fn test_unknown_generator_is_passthrough() {
        let registry = GeneratorRegistry::new();
        let descriptor = FieldDescriptor::new("a", "text")
            .with_value(json!([1, 2]))
            .with_generator("does_not_exist");
        assert_eq!(registry.normalize(&descriptor), json!([1, 2]));
    }

    #[test]
    fn test_generator_pipeline_runs_in_order_with_descriptor() {
        let mut registry = GeneratorRegistry::new();
        registry.register("decorate", |v, d| json!(format!("{}:{}", d.id, v.as_str().unwrap_or(""))));
        registry.register("decorate", |v, _| json!(v.as_str().unwrap_or("").to_uppercase()));
        let descriptor = FieldDescriptor::new("sku", "text")
            .with_value("abc")
            .with_generator("decorate");
        assert_eq!(registry.normalize(&descriptor), json!("SKU:ABC"));
    }

    #[test]
    fn test_uuid_generator_fills_only_empty_values() {
        let registry = GeneratorRegistry::with_defaults();
        let empty = FieldDescriptor::new("key", "text").with_generator(UUID_GENERATOR);
        let generated = registry.normalize(&empty);
        assert_eq!(generated.as_str().map(str::len), Some(36));

        let kept = empty.clone().with_value("fixed");
        assert_eq!(registry.normalize(&kept), json!("fixed"));
    }

    #[test]
    fn test_reconciliation_never_echoes_or_resets() {
        let (on_change, seen) = recorder();
        let value = FieldValue::new(json!(["a", "b"]), on_change);

        value.receive_upstream(json!(["a", "b"]));
        assert!(seen.lock().unwrap().is_empty());

        value.edit(json!(["a", "b", "c"]));
        assert_eq!(*seen.lock().unwrap(), vec![json!(["a", "b", "c"])]);

        value.receive_upstream(json!(["a", "b"]));
        assert_eq!(value.current(), json!(["a", "b", "c"]));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_parent_adopting_edit_does_not_renotify() {
        let (on_change, seen) = recorder();
        let value = FieldValue::new(json!("one"), on_change);
        value.edit(json!("two"));
        value.receive_upstream(json!("two"));
        value.edit(json!("two"));
        assert_eq!(*seen.lock().unwrap(), vec![json!("two")]);

        value.edit(json!("one"));
        assert_eq!(*seen.lock().unwrap(), vec![json!("two"), json!("one")]);
    }

    #[test]
    fn test_revert_to_supplied_value_is_announced() {
        let (on_change, seen) = recorder();
        let value = FieldValue::new(json!("Brno"), on_change);
        value.edit(json!("Praha"));
        value.edit(json!("Brno"));
        value.receive_upstream(json!("Brno"));
        assert_eq!(*seen.lock().unwrap(), vec![json!("Praha"), json!("Brno")]);
    }

    #[test]
    fn test_new_upstream_differing_from_local_edit_reannounces_edit() {
        let mut sync = ValueSync::new(json!(1));
        assert_eq!(sync.edit(json!(2)), Some(json!(2)));
        assert_eq!(sync.receive_upstream(json!(3)), Some(json!(2)));
        assert_eq!(sync.receive_upstream(json!(3)), None);
        assert_eq!(sync.current(), &json!(2));
    }

    #[test]
    fn test_projection_shapes_outward_value() {
        let (on_change, seen) = recorder();
        let value = FieldValue::with_projection(json!([]), on_change, |v| {
            v.as_array()
                .and_then(|a| a.first().cloned())
                .unwrap_or(Value::Null)
        });
        value.edit(json!(["7"]));
        assert_eq!(*seen.lock().unwrap(), vec![json!("7")]);
        assert_eq!(value.current(), json!(["7"]));
    }
}
