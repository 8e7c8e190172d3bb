//! Model updates.
//!
//! Every write to the store is described by a [`ModelUpdate`]: a target path
//! plus an operation. An update runs at most once. Running it goes through
//! [`ModelUpdate::process`], which never fails on behalf of the operation:
//! an operation error is recorded on the update and the target value is
//! replaced with a [`Value::Fault`] marker.
//!
//! After it has run, an update is shared (as [`UpdateRef`]) with every
//! observer it triggered, so observers can tell what kind of change they
//! are looking at.

use serde_json::Value as Json;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::error::{StoreError, UpdateError};
use crate::model::ModelSpec;
use crate::path::Path;
use crate::value::{ExceptionEncountered, List, ListKind, Value};

/// Shared handle to an update that has been handed to the store.
pub type UpdateRef = Rc<ModelUpdate>;

/// Predicate for filtering updates: `(index before removal, element)`.
pub type Predicate = Rc<dyn Fn(usize, &Json) -> bool>;

/// Ordering used by sort updates.
pub type Comparator = Rc<dyn Fn(&Json, &Json) -> Ordering>;

/// End of a list to insert at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum End {
    Front,
    Back,
}

/// The operation carried by an update.
#[derive(Clone)]
pub enum UpdateOp {
    SetValue(Value),
    SetModel(ModelSpec),
    Insert {
        end: End,
        items: Vec<Json>,
        kind: Option<ListKind>,
    },
    RemoveIndex(usize),
    RemoveMatching(Predicate),
    KeepMatching(Predicate),
    RemoveEqualTo(Json),
    Sort(Option<Comparator>),
    SortDescending,
    Cascade,
    ModelDeleted,
    Unknown,
}

impl fmt::Debug for UpdateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOp::SetValue(value) => f.debug_tuple("SetValue").field(value).finish(),
            UpdateOp::SetModel(spec) => f.debug_tuple("SetModel").field(spec).finish(),
            UpdateOp::Insert { end, items, kind } => f
                .debug_struct("Insert")
                .field("end", end)
                .field("items", items)
                .field("kind", kind)
                .finish(),
            UpdateOp::RemoveIndex(index) => f.debug_tuple("RemoveIndex").field(index).finish(),
            UpdateOp::RemoveMatching(_) => f.write_str("RemoveMatching(..)"),
            UpdateOp::KeepMatching(_) => f.write_str("KeepMatching(..)"),
            UpdateOp::RemoveEqualTo(value) => {
                f.debug_tuple("RemoveEqualTo").field(value).finish()
            }
            UpdateOp::Sort(Some(_)) => f.write_str("Sort(comparator)"),
            UpdateOp::Sort(None) => f.write_str("Sort"),
            UpdateOp::SortDescending => f.write_str("SortDescending"),
            UpdateOp::Cascade => f.write_str("Cascade"),
            UpdateOp::ModelDeleted => f.write_str("ModelDeleted"),
            UpdateOp::Unknown => f.write_str("Unknown"),
        }
    }
}

/// Kind of an update, for observers discriminating what they were sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    SetValue,
    SetModel,
    Append,
    Prepend,
    RemoveIndex,
    RemoveAllThatMatch,
    KeepAllThatMatch,
    RemoveAllEqualTo,
    Sort,
    Cascade,
    ModelDeleted,
    Unknown,
}

impl UpdateKind {
    /// Notification kinds carry no value change.
    pub fn is_notification(self) -> bool {
        matches!(
            self,
            UpdateKind::Cascade | UpdateKind::ModelDeleted | UpdateKind::Unknown
        )
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdateKind::SetValue => "setValue",
            UpdateKind::SetModel => "setModel",
            UpdateKind::Append => "append",
            UpdateKind::Prepend => "prepend",
            UpdateKind::RemoveIndex => "removeIndex",
            UpdateKind::RemoveAllThatMatch => "removeAllThatMatch",
            UpdateKind::KeepAllThatMatch => "keepAllThatMatch",
            UpdateKind::RemoveAllEqualTo => "removeAllEqualTo",
            UpdateKind::Sort => "sort",
            UpdateKind::Cascade => "cascade",
            UpdateKind::ModelDeleted => "modelDeleted",
            UpdateKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default)]
struct UpdateState {
    completed: bool,
    error: Option<UpdateError>,
    removed: Option<Json>,
    removed_count: usize,
}

/// A single-use request to change the model at `target`.
#[derive(Debug)]
pub struct ModelUpdate {
    target: Path,
    op: UpdateOp,
    state: RefCell<UpdateState>,
}

impl ModelUpdate {
    pub fn new(target: Path, op: UpdateOp) -> Self {
        Self {
            target,
            op,
            state: RefCell::new(UpdateState::default()),
        }
    }

    pub fn set_value(target: Path, value: impl Into<Value>) -> Self {
        Self::new(target, UpdateOp::SetValue(value.into()))
    }

    pub fn set_model(target: Path, spec: ModelSpec) -> Self {
        Self::new(target, UpdateOp::SetModel(spec))
    }

    pub fn append(target: Path, item: Json) -> Self {
        Self::append_all(target, vec![item])
    }

    pub fn append_all(target: Path, items: Vec<Json>) -> Self {
        Self::new(
            target,
            UpdateOp::Insert {
                end: End::Back,
                items,
                kind: None,
            },
        )
    }

    pub fn prepend(target: Path, item: Json) -> Self {
        Self::prepend_all(target, vec![item])
    }

    pub fn prepend_all(target: Path, items: Vec<Json>) -> Self {
        Self::new(
            target,
            UpdateOp::Insert {
                end: End::Front,
                items,
                kind: None,
            },
        )
    }

    /// Kind of list an insert creates when the target holds no value.
    /// Has no effect on other operations.
    pub fn with_list_kind(mut self, list_kind: ListKind) -> Self {
        if let UpdateOp::Insert { kind, .. } = &mut self.op {
            *kind = Some(list_kind);
        }
        self
    }

    pub fn remove_index(target: Path, index: usize) -> Self {
        Self::new(target, UpdateOp::RemoveIndex(index))
    }

    pub fn remove_all_that_match(
        target: Path,
        predicate: impl Fn(usize, &Json) -> bool + 'static,
    ) -> Self {
        Self::new(target, UpdateOp::RemoveMatching(Rc::new(predicate)))
    }

    pub fn keep_all_that_match(
        target: Path,
        predicate: impl Fn(usize, &Json) -> bool + 'static,
    ) -> Self {
        Self::new(target, UpdateOp::KeepMatching(Rc::new(predicate)))
    }

    pub fn remove_all_equal_to(target: Path, value: Json) -> Self {
        Self::new(target, UpdateOp::RemoveEqualTo(value))
    }

    /// Sort by natural order.
    pub fn sort(target: Path) -> Self {
        Self::new(target, UpdateOp::Sort(None))
    }

    /// Sort by reversed natural order.
    pub fn sort_descending(target: Path) -> Self {
        Self::new(target, UpdateOp::SortDescending)
    }

    pub fn sort_by(target: Path, compare: impl Fn(&Json, &Json) -> Ordering + 'static) -> Self {
        Self::new(target, UpdateOp::Sort(Some(Rc::new(compare))))
    }

    pub fn cascade(target: Path) -> Self {
        Self::new(target, UpdateOp::Cascade)
    }

    pub fn model_deleted(target: Path) -> Self {
        Self::new(target, UpdateOp::ModelDeleted)
    }

    pub fn unknown(target: Path) -> Self {
        Self::new(target, UpdateOp::Unknown)
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn op(&self) -> &UpdateOp {
        &self.op
    }

    pub fn kind(&self) -> UpdateKind {
        match &self.op {
            UpdateOp::SetValue(_) => UpdateKind::SetValue,
            UpdateOp::SetModel(_) => UpdateKind::SetModel,
            UpdateOp::Insert { end: End::Back, .. } => UpdateKind::Append,
            UpdateOp::Insert { end: End::Front, .. } => UpdateKind::Prepend,
            UpdateOp::RemoveIndex(_) => UpdateKind::RemoveIndex,
            UpdateOp::RemoveMatching(_) => UpdateKind::RemoveAllThatMatch,
            UpdateOp::KeepMatching(_) => UpdateKind::KeepAllThatMatch,
            UpdateOp::RemoveEqualTo(_) => UpdateKind::RemoveAllEqualTo,
            UpdateOp::Sort(_) | UpdateOp::SortDescending => UpdateKind::Sort,
            UpdateOp::Cascade => UpdateKind::Cascade,
            UpdateOp::ModelDeleted => UpdateKind::ModelDeleted,
            UpdateOp::Unknown => UpdateKind::Unknown,
        }
    }

    /// True once the update has run, successfully or not.
    pub fn is_completed(&self) -> bool {
        self.state.borrow().completed
    }

    /// The error captured while running, if any.
    pub fn error(&self) -> Option<UpdateError> {
        self.state.borrow().error.clone()
    }

    pub fn succeeded(&self) -> bool {
        let state = self.state.borrow();
        state.completed && state.error.is_none()
    }

    /// Element taken out by a `RemoveIndex` update.
    pub fn removed(&self) -> Option<Json> {
        self.state.borrow().removed.clone()
    }

    /// Number of elements taken out by a filtering update.
    pub fn removed_count(&self) -> usize {
        self.state.borrow().removed_count
    }

    /// Run the update against the value in `slot`.
    ///
    /// The slot receives the new value, or a fault marker if the operation
    /// failed. Fails only if the update has already run; the slot is left
    /// untouched in that case.
    pub fn process(
        &self,
        slot: &mut Option<Value>,
        default_kind: ListKind,
    ) -> Result<(), StoreError> {
        self.begin()?;
        let current = slot.take();
        match self.perform_update(current, default_kind) {
            Ok(next) => *slot = next,
            Err(error) => {
                tracing::warn!(target_path = %self.target, kind = %self.kind(), %error, "Update failed");
                *slot = Some(Value::Fault(ExceptionEncountered {
                    cause: format!("{} {}", self.kind(), self.target),
                    error: error.clone(),
                }));
                self.state.borrow_mut().error = Some(error);
            }
        }
        Ok(())
    }

    /// Mark the update as run without touching any value.
    pub(crate) fn complete(&self) -> Result<(), StoreError> {
        self.begin()
    }

    /// Share a notification raised by the store itself. It never runs.
    pub(crate) fn into_notification(self) -> UpdateRef {
        self.state.borrow_mut().completed = true;
        Rc::new(self)
    }

    fn begin(&self) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        if state.completed {
            return Err(StoreError::UpdateAlreadyPerformed(self.target.clone()));
        }
        state.completed = true;
        Ok(())
    }

    fn perform_update(
        &self,
        current: Option<Value>,
        default_kind: ListKind,
    ) -> Result<Option<Value>, UpdateError> {
        match &self.op {
            UpdateOp::SetValue(value) => Ok(Some(value.clone())),
            UpdateOp::SetModel(_) | UpdateOp::Cascade | UpdateOp::ModelDeleted | UpdateOp::Unknown => {
                Ok(current)
            }
            UpdateOp::Insert { end, items, kind } => {
                let mut list = into_list(current, Some(kind.unwrap_or(default_kind)))?;
                match end {
                    End::Back => list.push_back(items.iter().cloned()),
                    End::Front => list.push_front(items.iter().cloned()),
                }
                Ok(Some(Value::List(list)))
            }
            UpdateOp::RemoveIndex(index) => {
                let mut list = into_list(current, None)?;
                let removed = list.remove(*index)?;
                self.state.borrow_mut().removed = Some(removed);
                Ok(Some(Value::List(list)))
            }
            UpdateOp::RemoveMatching(predicate) => {
                let mut list = into_list(current, None)?;
                let count = list.retain_indexed(|index, item| !predicate(index, item));
                self.state.borrow_mut().removed_count = count;
                Ok(Some(Value::List(list)))
            }
            UpdateOp::KeepMatching(predicate) => {
                let mut list = into_list(current, None)?;
                let count = list.retain_indexed(|index, item| predicate(index, item));
                self.state.borrow_mut().removed_count = count;
                Ok(Some(Value::List(list)))
            }
            UpdateOp::RemoveEqualTo(value) => {
                let mut list = into_list(current, None)?;
                let count = list.retain_indexed(|_, item| item != value);
                self.state.borrow_mut().removed_count = count;
                Ok(Some(Value::List(list)))
            }
            UpdateOp::Sort(compare) => {
                let mut list = into_list(current, None)?;
                match compare {
                    Some(compare) => list.sort_by(|a, b| compare(a, b)),
                    None => list.sort_natural()?,
                }
                Ok(Some(Value::List(list)))
            }
            UpdateOp::SortDescending => {
                let mut list = into_list(current, None)?;
                list.sort_natural_descending()?;
                Ok(Some(Value::List(list)))
            }
        }
    }
}

/// Take the list out of `current`. With `create`, an absent or null value
/// becomes a new empty list of that kind. JSON arrays are taken as array
/// lists.
fn into_list(current: Option<Value>, create: Option<ListKind>) -> Result<List, UpdateError> {
    match (current, create) {
        (Some(Value::List(list)), _) => Ok(list),
        (Some(Value::Json(Json::Array(items))), _) => Ok(List::Array(items)),
        (None | Some(Value::Json(Json::Null)), Some(kind)) => Ok(List::new(kind)),
        (None, None) => Err(UpdateError::NotAList { found: "nothing" }),
        (Some(other), _) => Err(UpdateError::NotAList {
            found: other.type_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    fn list(items: &[i64]) -> Option<Value> {
        Some(Value::List(List::Array(
            items.iter().map(|&n| json!(n)).collect(),
        )))
    }

    fn run(update: &ModelUpdate, current: Option<Value>) -> Option<Value> {
        let mut slot = current;
        update.process(&mut slot, ListKind::Array).unwrap();
        slot
    }

    #[test]
    fn test_append_creates_list() {
        let update = ModelUpdate::append(p("L"), json!(1));
        let value = run(&update, None);
        assert_eq!(value, list(&[1]));
        assert!(update.succeeded());
    }

    #[test]
    fn test_append_with_linked_kind() {
        let update = ModelUpdate::append_all(p("L"), vec![json!(1), json!(2)])
            .with_list_kind(ListKind::Linked);
        let value = run(&update, None).unwrap();
        assert_eq!(value.as_list().unwrap().kind(), ListKind::Linked);
        assert_eq!(value.list_len(), Some(2));
    }

    #[test]
    fn test_prepend_to_json_array() {
        let update = ModelUpdate::prepend(p("L"), json!(0));
        let value = run(&update, Some(Value::Json(json!([1, 2]))));
        assert_eq!(value, list(&[0, 1, 2]));
    }

    #[test]
    fn test_remove_index_records_element() {
        let update = ModelUpdate::remove_index(p("L"), 1);
        let value = run(&update, list(&[1, 2, 3]));
        assert_eq!(value, list(&[1, 3]));
        assert_eq!(update.removed(), Some(json!(2)));
    }

    #[test]
    fn test_remove_index_out_of_range_is_captured() {
        let update = ModelUpdate::remove_index(p("L"), 5);
        let value = run(&update, list(&[1])).unwrap();
        assert!(value.is_fault());
        assert!(update.is_completed());
        assert!(!update.succeeded());
        assert_eq!(
            update.error(),
            Some(UpdateError::IndexOutOfRange { index: 5, len: 1 })
        );
        assert_eq!(value.fault().unwrap().cause, "removeIndex L");
    }

    #[test]
    fn test_remove_all_that_match_uses_pre_removal_index() {
        let update = ModelUpdate::remove_all_that_match(p("L"), |index, _| index < 3);
        let value = run(&update, list(&[5, 10, 15, 20]));
        assert_eq!(value, list(&[20]));
        assert_eq!(update.removed_count(), 3);
    }

    #[test]
    fn test_keep_all_that_match() {
        let update =
            ModelUpdate::keep_all_that_match(p("L"), |_, item| item.as_i64().unwrap_or(0) > 10);
        let value = run(&update, list(&[5, 10, 15, 20]));
        assert_eq!(value, list(&[15, 20]));
        assert_eq!(update.removed_count(), 2);
    }

    #[test]
    fn test_remove_all_equal_to() {
        let update = ModelUpdate::remove_all_equal_to(p("L"), json!(2));
        let value = run(&update, list(&[2, 1, 2, 3]));
        assert_eq!(value, list(&[1, 3]));
        assert_eq!(update.removed_count(), 2);
    }

    #[test]
    fn test_sort_descending() {
        let update = ModelUpdate::sort_by(p("L"), |a, b| {
            b.as_i64().unwrap_or(0).cmp(&a.as_i64().unwrap_or(0))
        });
        let value = run(&update, list(&[100, 90, 95, 3]));
        assert_eq!(value, list(&[100, 95, 90, 3]));
    }

    #[test]
    fn test_sort_descending_rejects_mixed_types() {
        let update = ModelUpdate::sort_descending(p("L"));
        let value = run(&update, Some(Value::from(json!([1, "a", 2])))).unwrap();
        assert_eq!(update.error(), Some(UpdateError::NotComparable));
        assert!(value.is_fault());
    }

    #[test]
    fn test_sort_natural() {
        let update = ModelUpdate::sort(p("L"));
        assert_eq!(run(&update, list(&[3, 1, 2])), list(&[1, 2, 3]));
    }

    #[test]
    fn test_list_update_on_scalar_is_captured() {
        let update = ModelUpdate::append(p("L"), json!(1));
        let value = run(&update, Some(Value::from("text"))).unwrap();
        assert_eq!(
            update.error(),
            Some(UpdateError::NotAList { found: "string" })
        );
        assert!(value.is_fault());
    }

    #[test]
    fn test_update_runs_once() {
        let update = ModelUpdate::set_value(p("a"), 1);
        let mut slot = None;
        update.process(&mut slot, ListKind::Array).unwrap();

        let mut other = Some(Value::from(7));
        let result = update.process(&mut other, ListKind::Array);
        assert!(matches!(result, Err(StoreError::UpdateAlreadyPerformed(_))));
        assert_eq!(other, Some(Value::from(7)));
    }

    #[test]
    fn test_notifications_leave_value_alone() {
        for update in [
            ModelUpdate::cascade(p("a")),
            ModelUpdate::model_deleted(p("a")),
            ModelUpdate::unknown(p("a")),
        ] {
            assert!(update.kind().is_notification());
            assert_eq!(run(&update, Some(Value::from(3))), Some(Value::from(3)));
        }
    }
}
