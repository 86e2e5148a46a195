//! Ordered, de-duplicated selection of option identifiers.
//!
//! Identifiers are compared after string coercion, so `5` and `"5"` are the
//! same entry. The order is user-significant and is persisted as-is; display
//! order of selected items always follows it, not the order of fetch results.

use serde_json::Value;

use crate::error::{FieldsError, Result};
use crate::types::{value_key, FieldOption};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionList {
    ids: Vec<String>,
    multi: bool,
}

impl SelectionList {
    pub fn new(multi: bool) -> Self {
        Self {
            ids: Vec::new(),
            multi,
        }
    }

    /// Build from a stored value: a list, a single identifier, or null.
    ///
    /// Null and non-identifier entries are dropped. A single-select list keeps
    /// at most one entry.
    pub fn from_value(value: &Value, multi: bool) -> Self {
        let candidates: Vec<String> = match value {
            Value::Array(items) => items.iter().filter_map(value_key).collect(),
            other => value_key(other).into_iter().collect(),
        };
        let mut list = Self::new(multi);
        for id in candidates.into_iter().filter(|id| !id.is_empty()) {
            if !list.contains(&id) {
                list.ids.push(id);
            }
        }
        if !multi {
            list.ids.truncate(1);
        }
        list
    }

    pub fn is_multi(&self) -> bool {
        self.multi
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.ids.first().map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|existing| existing == id)
    }

    /// Add an identifier. Multi-select appends unless already present;
    /// single-select replaces the whole list. Returns whether anything changed.
    pub fn add(&mut self, item: &Value) -> bool {
        let Some(id) = value_key(item) else {
            return false;
        };
        if self.multi {
            if self.contains(&id) {
                return false;
            }
            self.ids.push(id);
            true
        } else {
            let changed = self.ids.len() != 1 || self.ids[0] != id;
            self.ids = vec![id];
            changed
        }
    }

    /// Remove every entry matching `id`. Absent ids are a no-op.
    pub fn remove(&mut self, id: &Value) -> bool {
        let Some(id) = value_key(id) else {
            return false;
        };
        let before = self.ids.len();
        self.ids.retain(|existing| *existing != id);
        before != self.ids.len()
    }

    /// Replace the order with `new_order`.
    ///
    /// Rejected with [`FieldsError::MalformedReorder`] when any element is not
    /// a plain identifier, which is what a drag in progress still hands over.
    /// Callers ignore that error; the list is left untouched.
    pub fn move_to(&mut self, new_order: &[Value]) -> Result<()> {
        if let Some(bad) = new_order
            .iter()
            .find(|v| matches!(v, Value::Object(_) | Value::Array(_) | Value::Null))
        {
            return Err(FieldsError::MalformedReorder {
                message: format!("expected plain identifiers, got {bad}"),
            });
        }
        let mut ids: Vec<String> = Vec::with_capacity(new_order.len());
        for id in new_order.iter().filter_map(value_key) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        self.ids = ids;
        Ok(())
    }

    /// Replace the selection wholesale from a stored-value shape.
    pub fn replace(&mut self, value: &Value) {
        *self = Self::from_value(value, self.multi);
    }

    /// The selection as a JSON list of string identifiers.
    pub fn to_value(&self) -> Value {
        Value::Array(self.ids.iter().cloned().map(Value::String).collect())
    }

    /// Options matching the selection, in selection order. Selected ids
    /// without a matching option are skipped.
    pub fn selected_options<'a>(&self, options: &'a [FieldOption]) -> Vec<&'a FieldOption> {
        self.ids
            .iter()
            .filter_map(|id| options.iter().find(|o| o.key() == *id))
            .collect()
    }

    /// Options not yet selected, in their original order.
    pub fn unselected_options<'a>(&self, options: &'a [FieldOption]) -> Vec<&'a FieldOption> {
        options.iter().filter(|o| !self.contains(&o.key())).collect()
    }
}
