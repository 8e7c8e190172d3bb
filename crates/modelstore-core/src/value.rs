//! Values held by models.
//!
//! A model value is one of:
//! - plain JSON data
//! - a list, array-like (`Vec`) or linked-like (`VecDeque`)
//! - a fault marker left behind by an update that failed

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;

use crate::error::UpdateError;

/// Storage used for lists created by list updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    #[default]
    Array,
    Linked,
}

/// A list value.
#[derive(Debug, Clone, PartialEq)]
pub enum List {
    Array(Vec<Json>),
    Linked(VecDeque<Json>),
}

impl List {
    /// Create an empty list of the given kind.
    pub fn new(kind: ListKind) -> Self {
        match kind {
            ListKind::Array => List::Array(Vec::new()),
            ListKind::Linked => List::Linked(VecDeque::new()),
        }
    }

    pub fn kind(&self) -> ListKind {
        match self {
            List::Array(_) => ListKind::Array,
            List::Linked(_) => ListKind::Linked,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            List::Array(items) => items.len(),
            List::Linked(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&Json> {
        match self {
            List::Array(items) => items.get(index),
            List::Linked(items) => items.get(index),
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &Json> + '_> {
        match self {
            List::Array(items) => Box::new(items.iter()),
            List::Linked(items) => Box::new(items.iter()),
        }
    }

    pub fn to_vec(&self) -> Vec<Json> {
        self.iter().cloned().collect()
    }

    /// Insert `items` at the back, keeping their order.
    pub fn push_back(&mut self, items: impl IntoIterator<Item = Json>) {
        match self {
            List::Array(list) => list.extend(items),
            List::Linked(list) => list.extend(items),
        }
    }

    /// Insert `items` at the front, keeping their order.
    pub fn push_front(&mut self, items: impl IntoIterator<Item = Json>) {
        match self {
            List::Array(list) => {
                list.splice(0..0, items);
            }
            List::Linked(list) => {
                let items: Vec<Json> = items.into_iter().collect();
                for item in items.into_iter().rev() {
                    list.push_front(item);
                }
            }
        }
    }

    /// Remove the element at `index`.
    pub fn remove(&mut self, index: usize) -> Result<Json, UpdateError> {
        let len = self.len();
        let removed = match self {
            List::Array(list) if index < len => Some(list.remove(index)),
            List::Linked(list) => list.remove(index),
            _ => None,
        };
        removed.ok_or(UpdateError::IndexOutOfRange { index, len })
    }

    /// Keep the elements for which `keep(index, element)` holds, where
    /// `index` is the position before any removal. Returns the number removed.
    pub fn retain_indexed(&mut self, mut keep: impl FnMut(usize, &Json) -> bool) -> usize {
        let before = self.len();
        let mut index = 0;
        let mut visit = |item: &Json| {
            let kept = keep(index, item);
            index += 1;
            kept
        };
        match self {
            List::Array(list) => list.retain(|item| visit(item)),
            List::Linked(list) => list.retain(|item| visit(item)),
        }
        before - self.len()
    }

    pub fn sort_by(&mut self, compare: impl FnMut(&Json, &Json) -> Ordering) {
        match self {
            List::Array(list) => list.sort_by(compare),
            List::Linked(list) => list.make_contiguous().sort_by(compare),
        }
    }

    /// Sort by natural order. All elements must be numbers, all strings, or
    /// all booleans.
    pub fn sort_natural(&mut self) -> Result<(), UpdateError> {
        self.check_comparable()?;
        self.sort_by(|a, b| compare_natural(a, b).unwrap_or(Ordering::Equal));
        Ok(())
    }

    /// Sort by reversed natural order, with the same element requirements
    /// as [`List::sort_natural`].
    pub fn sort_natural_descending(&mut self) -> Result<(), UpdateError> {
        self.check_comparable()?;
        self.sort_by(|a, b| compare_natural(b, a).unwrap_or(Ordering::Equal));
        Ok(())
    }

    fn check_comparable(&self) -> Result<(), UpdateError> {
        let mut items = self.iter();
        let Some(first) = items.next() else {
            return Ok(());
        };
        if items.all(|item| compare_natural(first, item).is_some()) {
            Ok(())
        } else {
            Err(UpdateError::NotComparable)
        }
    }

    pub fn to_json(&self) -> Json {
        Json::Array(self.to_vec())
    }
}

/// Natural ordering of two JSON values of the same scalar type.
pub fn compare_natural(a: &Json, b: &Json) -> Option<Ordering> {
    match (a, b) {
        (Json::Number(a), Json::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Json::String(a), Json::String(b)) => Some(a.cmp(b)),
        (Json::Bool(a), Json::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Marker stored in place of a value when the update writing it failed.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionEncountered {
    /// Description of the update that failed.
    pub cause: String,
    /// The captured error.
    pub error: UpdateError,
}

impl fmt::Display for ExceptionEncountered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.cause, self.error)
    }
}

/// The value held by a model.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Json(Json),
    List(List),
    Fault(ExceptionEncountered),
}

impl Value {
    pub fn null() -> Self {
        Value::Json(Json::Null)
    }

    pub fn as_json(&self) -> Option<&Json> {
        match self {
            Value::Json(json) => Some(json),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_json().and_then(Json::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_json().and_then(Json::as_f64)
    }

    /// Number of elements if this is a list or a JSON array.
    pub fn list_len(&self) -> Option<usize> {
        match self {
            Value::List(list) => Some(list.len()),
            Value::Json(Json::Array(items)) => Some(items.len()),
            _ => None,
        }
    }

    /// True if a failed update left this value behind.
    pub fn is_fault(&self) -> bool {
        matches!(self, Value::Fault(_))
    }

    pub fn fault(&self) -> Option<&ExceptionEncountered> {
        match self {
            Value::Fault(fault) => Some(fault),
            _ => None,
        }
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Json(Json::Null) => "null",
            Value::Json(Json::Bool(_)) => "boolean",
            Value::Json(Json::Number(_)) => "number",
            Value::Json(Json::String(_)) => "string",
            Value::Json(Json::Array(_)) => "array",
            Value::Json(Json::Object(_)) => "object",
            Value::List(_) => "list",
            Value::Fault(_) => "fault",
        }
    }

    /// JSON rendering. Faults render as `{"$fault": "<description>"}`.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Json(json) => json.clone(),
            Value::List(list) => list.to_json(),
            Value::Fault(fault) => serde_json::json!({ "$fault": fault.to_string() }),
        }
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        Value::Json(json)
    }
}

impl From<List> for Value {
    fn from(list: List) -> Self {
        Value::List(list)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Json(Json::from(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Json(Json::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Json(Json::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Json(Json::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Json(Json::Bool(b))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Json(Json::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Json(Json::String(s))
    }
}
