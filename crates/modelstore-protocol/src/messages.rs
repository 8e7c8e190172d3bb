//! Protocol message types.
//!
//! This module defines the JSON documents exchanged with a model store:
//! - Input: `UpdateRequest`, `Batch`, `Script`
//! - Output: `RunReport`, `ReadResult`
//!
//! Update requests are tagged by their `op` field.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use modelstore_core::{compare_natural, ListKind, Path, StoreConfig};

/// A single store operation.
///
/// # Example
/// ```json
/// {"op": "append", "path": "log.entries", "values": [1, 2]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum UpdateRequest {
    /// Set the value of a model.
    Set { path: Path, value: Json },

    /// Replace a model with a JSON subtree.
    SetModel {
        path: Path,
        #[serde(default)]
        model: Json,
    },

    Append {
        path: Path,
        values: Vec<Json>,
        #[serde(rename = "listKind", skip_serializing_if = "Option::is_none")]
        list_kind: Option<ListKind>,
    },

    Prepend {
        path: Path,
        values: Vec<Json>,
        #[serde(rename = "listKind", skip_serializing_if = "Option::is_none")]
        list_kind: Option<ListKind>,
    },

    RemoveIndex { path: Path, index: usize },

    /// Remove the list elements matching a predicate.
    RemoveWhere { path: Path, predicate: Predicate },

    /// Keep only the list elements matching a predicate.
    KeepWhere { path: Path, predicate: Predicate },

    RemoveEqualTo { path: Path, value: Json },

    /// Sort a list in natural order.
    Sort {
        path: Path,
        #[serde(default)]
        descending: bool,
    },

    Delete { path: Path },

    Move { from: Path, to: Path },

    /// Install a computed model.
    Compute {
        path: Path,
        formula: Formula,
        #[serde(skip_serializing_if = "Option::is_none")]
        cacheable: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        immediate: Option<bool>,
    },
}

impl UpdateRequest {
    /// The path the request writes to.
    pub fn path(&self) -> &Path {
        match self {
            UpdateRequest::Set { path, .. }
            | UpdateRequest::SetModel { path, .. }
            | UpdateRequest::Append { path, .. }
            | UpdateRequest::Prepend { path, .. }
            | UpdateRequest::RemoveIndex { path, .. }
            | UpdateRequest::RemoveWhere { path, .. }
            | UpdateRequest::KeepWhere { path, .. }
            | UpdateRequest::RemoveEqualTo { path, .. }
            | UpdateRequest::Sort { path, .. }
            | UpdateRequest::Delete { path }
            | UpdateRequest::Compute { path, .. } => path,
            UpdateRequest::Move { to, .. } => to,
        }
    }
}

/// Element predicate for filtering list updates.
///
/// Serialized externally tagged, e.g. `{"indexBelow": 3}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Predicate {
    /// Element position (before removal) is below the bound.
    IndexBelow(usize),
    IndexAtLeast(usize),
    Equals(Json),
    /// Element is a number greater than the bound.
    GreaterThan(f64),
    LessThan(f64),
}

impl Predicate {
    pub fn matches(&self, index: usize, item: &Json) -> bool {
        match self {
            Predicate::IndexBelow(bound) => index < *bound,
            Predicate::IndexAtLeast(bound) => index >= *bound,
            Predicate::Equals(value) => {
                item == value || compare_natural(item, value).is_some_and(|o| o.is_eq())
            }
            Predicate::GreaterThan(bound) => item.as_f64().is_some_and(|n| n > *bound),
            Predicate::LessThan(bound) => item.as_f64().is_some_and(|n| n < *bound),
        }
    }
}

/// Built-in compute functions for computed models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fn", rename_all = "camelCase")]
pub enum Formula {
    /// Sum of the input values plus an offset.
    Sum {
        inputs: Vec<Path>,
        #[serde(default)]
        offset: i64,
    },

    /// Product of the input values.
    Product { inputs: Vec<Path> },

    /// Number of elements in a list.
    Count { input: Path },
}

/// A group of requests applied together before one run loop pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub updates: Vec<UpdateRequest>,
}

/// A store session: configuration, paths to watch, batches to apply and
/// paths to read at the end.
///
/// # Example
/// ```json
/// {
///   "config": {"maxIterations": 100},
///   "watch": ["total.$"],
///   "batches": [{"updates": [{"op": "set", "path": "a", "value": 1}]}],
///   "reads": ["a", "total"]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub config: StoreConfig,

    /// Paths to attach logging observers to, with the usual marker
    /// semantics.
    #[serde(default)]
    pub watch: Vec<Path>,

    pub batches: Vec<Batch>,

    /// Values to read after the last batch.
    #[serde(default)]
    pub reads: Vec<Path>,
}

// ============================================================================
// Reports
// ============================================================================

/// A request the store refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    /// Position of the request in its batch.
    pub index: usize,
    pub error: String,
}

/// An observer failure captured by the run loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub observer: String,
    pub iteration: usize,
    pub error: String,
}

/// Outcome of applying one batch and running the loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Position of the batch in its script.
    pub batch: usize,

    /// Number of requests the store accepted.
    pub applied: usize,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<Rejection>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureRecord>,

    /// Time the run loop finished, RFC 3339.
    pub timestamp: String,
}

impl RunReport {
    /// Create an empty report stamped with the current time.
    pub fn new(batch: usize) -> Self {
        Self {
            batch,
            applied: 0,
            rejected: Vec::new(),
            failures: Vec::new(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.failures.is_empty()
    }
}

/// Value read at a path, or the error the read failed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResult {
    pub path: Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
