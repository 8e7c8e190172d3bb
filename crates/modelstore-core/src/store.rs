//! The model store.
//!
//! [`Store`] owns the model tree, the observer registry and the pending set
//! of observers waiting for the next [`Store::run_loop`] pass. Every
//! operation takes anything convertible into a [`Path`].
//!
//! Writes auto-vivify: intermediate models missing along the target path
//! are created. Structural changes enqueue observers as follows:
//! - value change: value observers of the model, field observers of its parent
//! - new model: referential observers of the model, field observers of its parent
//! - replacement: all observers of the model, field observers of its parent,
//!   and every observer registered below it
//! - deletion: all observers of the model and below, field observers of its parent
//!
//! Lists are updated in place: the store owns every value, so no other
//! holder can observe the old list.

use serde_json::Value as Json;
use std::collections::HashMap;
use std::fmt;

use crate::computed::{ComputeContext, ComputedModel, ComputedSpec, SyncState};
use crate::config::StoreConfig;
use crate::error::{PathError, StoreError};
use crate::model::{Entry, Model, ModelSpec};
use crate::observer::{Category, Observer, ObserverId, Pending, Registry};
use crate::path::{IntoPath, Path};
use crate::update::{ModelUpdate, UpdateOp, UpdateRef};
use crate::value::Value;

/// Structural change recorded against a model path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Value,
    Created,
    Replaced,
    Deleted,
}

/// Path-addressed reactive model store.
pub struct Store {
    pub(crate) config: StoreConfig,
    pub(crate) root: Model,
    pub(crate) registry: Registry,
    pub(crate) pending: Pending,
    /// External observers. A slot is empty while its observer is being
    /// notified.
    pub(crate) observers: HashMap<u64, Option<Box<dyn Observer>>>,
    next_observer: u64,
    /// Computed models currently computing, innermost last.
    computing: Vec<Path>,
}

impl Store {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            root: Model::root(),
            registry: Registry::default(),
            pending: Pending::default(),
            observers: HashMap::new(),
            next_observer: 0,
            computing: Vec::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The root model.
    pub fn root(&self) -> &Model {
        &self.root
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Read through `path`, registering `observer` first if given.
    ///
    /// The observer is registered in the category implied by the terminal
    /// marker of `path`, even if the read then fails. Fails with
    /// [`StoreError::ModelDoesNotExist`] if the model is missing; a `$` or
    /// `*` on an existing model never fails.
    pub fn get(
        &mut self,
        path: impl IntoPath,
        observer: Option<&ObserverId>,
    ) -> Result<Entry, StoreError> {
        let path = path.into_path()?;
        if let Some(observer) = observer {
            self.add_observer(observer, &path)?;
        }
        self.read(&path)
    }

    /// Read the value of the model at `path`.
    pub fn get_value(
        &mut self,
        path: impl IntoPath,
        observer: Option<&ObserverId>,
    ) -> Result<Option<Value>, StoreError> {
        let path = path.into_path()?.to_value_path();
        self.get(path, observer).map(Entry::into_value)
    }

    /// True if a model exists at `path`. Malformed paths do not exist.
    pub fn has_path(&self, path: impl IntoPath) -> bool {
        path.into_path()
            .map(|path| self.root.find(&path).is_some())
            .unwrap_or(false)
    }

    /// The model at `path`, if any.
    pub fn model(&self, path: impl IntoPath) -> Option<&Model> {
        let path = path.into_path().ok()?;
        self.root.find(&path)
    }

    /// JSON snapshot of the whole tree.
    pub fn snapshot(&self) -> Json {
        self.root.to_json()
    }

    fn read(&mut self, path: &Path) -> Result<Entry, StoreError> {
        let model_path = path.to_model_path();
        let model = self
            .root
            .find(&model_path)
            .ok_or_else(|| StoreError::ModelDoesNotExist(model_path.clone()))?;

        if path.is_field() {
            return Ok(Entry::Fields(model.child_keys()));
        }
        if !path.is_value() {
            return Ok(Entry::Model(model_path));
        }
        if !model.is_computed() {
            return Ok(Entry::Value(model.value.clone()));
        }
        self.computed_value(&model_path).map(|value| Entry::Value(Some(value)))
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Set the value of the model at `path`, creating it if needed.
    pub fn set(&mut self, path: impl IntoPath, value: impl Into<Value>) -> Result<(), StoreError> {
        let path = path.into_path()?;
        self.handle_update(ModelUpdate::set_value(path, value))
    }

    /// Replace the model at `path` with the one `spec` describes.
    pub fn set_model(&mut self, path: impl IntoPath, spec: ModelSpec) -> Result<(), StoreError> {
        let path = path.into_path()?;
        self.handle_update(ModelUpdate::set_model(path, spec))
    }

    /// Install a computed model at `path`.
    pub fn define_computed(
        &mut self,
        path: impl IntoPath,
        spec: ComputedSpec,
    ) -> Result<(), StoreError> {
        self.set_model(path, ModelSpec::Computed(spec))
    }

    /// Create blank models along `path` and return the model at its end.
    pub fn ensure_model(&mut self, path: impl IntoPath) -> Result<&Model, StoreError> {
        let path = path.into_path()?.to_model_path();
        let update = ModelUpdate::cascade(path.clone()).into_notification();
        self.vivify(&path, &update)?;
        self.root
            .find(&path)
            .ok_or(StoreError::ModelDoesNotExist(path))
    }

    /// Apply an update. `SetModel` updates replace the target model; every
    /// other operation runs against the target model's value.
    ///
    /// Operation failures do not fail this call: they leave a fault value at
    /// the target and are recorded on the update.
    pub fn handle_update(&mut self, update: impl Into<UpdateRef>) -> Result<(), StoreError> {
        let update: UpdateRef = update.into();
        let target = update.target().clone();
        if target.is_field() {
            return Err(PathError::invalid(target.to_string(), "cannot write through '*'").into());
        }
        if update.is_completed() {
            return Err(StoreError::UpdateAlreadyPerformed(target));
        }
        let path = target.to_model_path();

        if let UpdateOp::SetModel(spec) = update.op() {
            return self.replace_model(&path, spec, &update);
        }

        self.vivify(&path, &update)?;
        let default_kind = self.config.default_list_kind;
        let model = self
            .root
            .find_mut(&path)
            .ok_or_else(|| StoreError::ModelDoesNotExist(path.clone()))?;
        if model.is_computed() {
            return Err(StoreError::ComputedNotWritable(path));
        }
        update.process(&mut model.value, default_kind)?;

        tracing::trace!(target_path = %path, kind = %update.kind(), "Update applied");
        self.record_change(&path, Change::Value, &update);
        Ok(())
    }

    /// Apply updates in order, returning one result per update.
    pub fn handle_updates<U>(&mut self, updates: impl IntoIterator<Item = U>) -> Vec<Result<(), StoreError>>
    where
        U: Into<UpdateRef>,
    {
        updates
            .into_iter()
            .map(|update| self.handle_update(update))
            .collect()
    }

    /// Remove the model at `path` and its subtree. Observers stay registered.
    pub fn delete_model(&mut self, path: impl IntoPath) -> Result<(), StoreError> {
        let path = path.into_path()?.to_model_path();
        let removed = self.detach(&path)?;
        self.forget_computed(&removed);

        tracing::debug!(model = %path, "Model deleted");
        let update = ModelUpdate::model_deleted(path.clone()).into_notification();
        self.record_change(&path, Change::Deleted, &update);
        Ok(())
    }

    /// Move the subtree at `from` to `to`, replacing any model there.
    pub fn move_model(&mut self, from: impl IntoPath, to: impl IntoPath) -> Result<(), StoreError> {
        let from = from.into_path()?.to_model_path();
        let to = to.into_path()?.to_model_path();
        if from == to {
            return Ok(());
        }
        if to.is_empty() || to.starts_with(&from) {
            return Err(StoreError::ModelOverwrite(to));
        }
        if self.root.find(&from).is_none() {
            return Err(StoreError::ModelDoesNotExist(from));
        }

        let moved = ModelUpdate::cascade(to.clone()).into_notification();
        let parent = to.parent().unwrap_or_default();
        self.vivify(&parent, &moved)?;
        self.ensure_writable(&parent)?;

        let mut model = self.detach(&from)?;
        let old_paths = model.computed_paths();
        model.rebase(to.clone());
        // The replaced model's edges are dropped before the moved ones take
        // over its paths.
        self.attach(&to, model)?;
        for old in old_paths {
            let new = to.append(&old.resolve_path(&from)?)?;
            self.registry
                .rename(&ObserverId::Computed(old), &ObserverId::Computed(new));
        }

        tracing::debug!(from = %from, to = %to, "Model moved");
        let deleted = ModelUpdate::model_deleted(from.clone()).into_notification();
        self.record_change(&from, Change::Deleted, &deleted);
        self.record_change(&to, Change::Replaced, &moved);
        Ok(())
    }

    fn replace_model(
        &mut self,
        path: &Path,
        spec: &ModelSpec,
        update: &UpdateRef,
    ) -> Result<(), StoreError> {
        let Some(parent) = path.parent() else {
            return Err(StoreError::ModelOverwrite(path.clone()));
        };
        let model = Model::from_spec(path.clone(), spec, &self.config)?;
        self.vivify(&parent, update)?;
        self.ensure_writable(&parent)?;
        update.complete()?;
        self.attach(path, model)?;

        tracing::debug!(model = %path, computed = matches!(spec, ModelSpec::Computed(_)), "Model replaced");
        self.record_change(path, Change::Replaced, update);
        Ok(())
    }

    /// Create the models missing along `path`.
    fn vivify(&mut self, path: &Path, update: &UpdateRef) -> Result<(), StoreError> {
        let mut created = Vec::new();
        let mut model = &mut self.root;
        for key in path.keys() {
            if model.is_computed() {
                return Err(StoreError::ComputedNotWritable(model.path.clone()));
            }
            let child_path = model.path.child(key);
            model = model
                .children
                .entry(key.to_string())
                .or_insert_with(|| {
                    created.push(child_path.clone());
                    Model::blank(child_path)
                });
        }
        for path in created {
            tracing::trace!(model = %path, "Model created");
            self.record_change(&path, Change::Created, update);
        }
        Ok(())
    }

    fn ensure_writable(&self, path: &Path) -> Result<(), StoreError> {
        match self.root.find(path) {
            Some(model) if model.is_computed() => Err(StoreError::ComputedNotWritable(path.clone())),
            Some(_) => Ok(()),
            None => Err(StoreError::ModelDoesNotExist(path.clone())),
        }
    }

    /// Insert `model` at `path` under an existing parent.
    fn attach(&mut self, path: &Path, model: Model) -> Result<(), StoreError> {
        let (Some(parent), Some(key)) = (path.parent(), path.key()) else {
            return Err(StoreError::ModelOverwrite(path.clone()));
        };
        let parent = self
            .root
            .find_mut(&parent)
            .ok_or(StoreError::ModelDoesNotExist(parent))?;
        if let Some(old) = parent.children.insert(key.to_string(), model) {
            self.forget_computed(&old);
        }
        Ok(())
    }

    /// Take the model at `path` out of the tree.
    fn detach(&mut self, path: &Path) -> Result<Model, StoreError> {
        let (Some(parent), Some(key)) = (path.parent(), path.key()) else {
            return Err(StoreError::ModelOverwrite(path.clone()));
        };
        self.root
            .find_mut(&parent)
            .and_then(|model| model.children.remove(key))
            .ok_or_else(|| StoreError::ModelDoesNotExist(path.clone()))
    }

    /// Drop the dependency edges of the computed models in a removed subtree.
    fn forget_computed(&mut self, removed: &Model) {
        for path in removed.computed_paths() {
            self.registry.remove_everywhere(&ObserverId::Computed(path));
        }
    }

    fn record_change(&mut self, path: &Path, change: Change, update: &UpdateRef) {
        let categories: &[Category] = match change {
            Change::Value => &[Category::Value],
            Change::Created => &[Category::Referential],
            Change::Replaced | Change::Deleted => &Category::ALL,
        };
        for &category in categories {
            self.enqueue(path, category, update);
        }
        if let Some(parent) = path.parent() {
            self.enqueue(&parent, Category::Field, update);
        }
        if matches!(change, Change::Replaced | Change::Deleted) {
            self.cascade_below(path);
        }
    }

    /// Notify every observer registered below `path`: with a cascade if its
    /// path still resolves, as deleted otherwise.
    fn cascade_below(&mut self, path: &Path) {
        for below in self.registry.paths_below(path) {
            let update = if self.root.find(&below).is_some() {
                ModelUpdate::cascade(below.clone())
            } else {
                ModelUpdate::model_deleted(below.clone())
            }
            .into_notification();
            for category in Category::ALL {
                self.enqueue(&below, category, &update);
            }
        }
    }

    pub(crate) fn enqueue(&mut self, path: &Path, category: Category, update: &UpdateRef) {
        for id in self.registry.observers(path, category) {
            tracing::trace!(observer = %id, model = %path, kind = %update.kind(), "Observer enqueued");
            self.pending.push(id.clone(), update);
        }
    }

    // ========================================================================
    // Observers
    // ========================================================================

    /// Register an external observer. Use the returned id with
    /// [`Store::get`] or [`Store::add_observer`] to subscribe it to paths.
    pub fn register_observer(&mut self, observer: Box<dyn Observer>) -> ObserverId {
        let key = self.next_observer;
        self.next_observer += 1;
        self.observers.insert(key, Some(observer));
        ObserverId::External(key)
    }

    /// Remove an external observer and every registration it holds.
    pub fn unregister_observer(&mut self, id: &ObserverId) -> Result<(), StoreError> {
        let ObserverId::External(key) = id else {
            return Err(StoreError::UnknownObserver(id.clone()));
        };
        self.observers
            .remove(key)
            .ok_or_else(|| StoreError::UnknownObserver(id.clone()))?;
        self.registry.remove_everywhere(id);
        Ok(())
    }

    /// Subscribe `observer` to `path` in the category its terminal marker
    /// implies. Returns false if it was already subscribed.
    pub fn add_observer(
        &mut self,
        observer: &ObserverId,
        path: impl IntoPath,
    ) -> Result<bool, StoreError> {
        let path = path.into_path()?;
        if let ObserverId::External(key) = observer {
            if !self.observers.contains_key(key) {
                return Err(StoreError::UnknownObserver(observer.clone()));
            }
        }
        Ok(self
            .registry
            .add(path.to_model_path(), Category::of(&path), observer.clone()))
    }

    pub fn remove_observer(
        &mut self,
        observer: &ObserverId,
        path: impl IntoPath,
    ) -> Result<bool, StoreError> {
        let path = path.into_path()?;
        Ok(self
            .registry
            .remove(&path.to_model_path(), Category::of(&path), observer))
    }

    /// Observers subscribed to `path` in the category its marker implies.
    pub fn observers_of(&self, path: impl IntoPath) -> Result<Vec<ObserverId>, StoreError> {
        let path = path.into_path()?;
        Ok(self
            .registry
            .observers(&path.to_model_path(), Category::of(&path))
            .to_vec())
    }

    /// True if observers are waiting for the next run loop pass.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drop the tree, every observer and everything pending.
    pub fn reset(&mut self) {
        self.root = Model::root();
        self.registry.clear();
        self.pending.clear();
        self.observers.clear();
        self.computing.clear();
    }

    // ========================================================================
    // Computed models
    // ========================================================================

    pub(crate) fn computed_mut(&mut self, path: &Path) -> Option<&mut ComputedModel> {
        self.root
            .find_mut(path)
            .and_then(|model| model.computed.as_mut())
    }

    /// Value of the computed model at `path`, computing it if stale.
    pub(crate) fn computed_value(&mut self, path: &Path) -> Result<Value, StoreError> {
        let computed = self
            .root
            .find(path)
            .and_then(Model::computed)
            .ok_or_else(|| StoreError::ModelDoesNotExist(path.clone()))?;
        if let Some(value) = computed.cached() {
            return Ok(value.clone());
        }
        self.recompute(path)
    }

    /// Handle a change notification for the computed model at `path`.
    pub(crate) fn notify_computed(&mut self, path: &Path) -> Result<(), StoreError> {
        let Some(computed) = self.computed_mut(path) else {
            return Ok(());
        };
        if computed.invalidate() {
            self.recompute(path)?;
        }
        Ok(())
    }

    fn recompute(&mut self, path: &Path) -> Result<Value, StoreError> {
        if self.computing.contains(path) {
            return Err(StoreError::CyclicDependency(path.clone()));
        }
        let compute = self
            .computed_mut(path)
            .map(|computed| computed.compute.clone())
            .ok_or_else(|| StoreError::ModelDoesNotExist(path.clone()))?;

        // Edges are rediscovered by the reads of this computation.
        self.registry
            .remove_everywhere(&ObserverId::Computed(path.clone()));

        self.computing.push(path.clone());
        let mut context = ComputeContext::new(self, path.clone());
        let result = compute(&mut context);
        let reads = context.into_reads();
        self.computing.pop();

        if let Some(computed) = self.computed_mut(path) {
            computed.computations += 1;
            computed.dependencies = reads;
            match &result {
                Ok(value) if computed.cacheable => {
                    computed.cache = Some(value.clone());
                    computed.state = SyncState::Fresh;
                }
                _ => {
                    computed.cache = None;
                    computed.state = SyncState::Stale;
                }
            }
            tracing::debug!(
                model = %path,
                computations = computed.computations,
                ok = result.is_ok(),
                "Recomputed"
            );
        }
        result
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("root", &self.root)
            .field("registry", &self.registry)
            .field("pending", &self.pending.len())
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::List;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::rc::Rc;

    #[test]
    fn test_set_auto_vivifies() {
        let mut store = Store::new();
        store.set("a.b.c", 7).unwrap();
        assert!(store.has_path("a"));
        assert!(store.has_path("a.b"));
        assert!(store.has_path("a.b.c"));
        assert_eq!(store.get_value("a.b.c", None).unwrap(), Some(Value::from(7)));
    }

    #[test]
    fn test_get_entries() {
        let mut store = Store::new();
        store.set_model("a", ModelSpec::tree(json!({"x": 1, "y": 2}))).unwrap();
        assert_eq!(
            store.get("a", None).unwrap(),
            Entry::Model(Path::parse("a").unwrap())
        );
        assert_eq!(
            store.get("a.*", None).unwrap(),
            Entry::Fields(vec!["x".to_string(), "y".to_string()])
        );
        assert_eq!(store.get("a.$", None).unwrap(), Entry::Value(None));
    }

    #[test]
    fn test_get_missing_model() {
        let mut store = Store::new();
        store.set("a", 1).unwrap();
        let result = store.get("a.b.$", None);
        assert_eq!(
            result,
            Err(StoreError::ModelDoesNotExist(Path::parse("a.b").unwrap()))
        );
    }

    #[test]
    fn test_write_through_star_rejected() {
        let mut store = Store::new();
        assert!(matches!(store.set("a.*", 1), Err(StoreError::Path(_))));
    }

    #[test]
    fn test_root_cannot_be_replaced_or_deleted() {
        let mut store = Store::new();
        assert!(matches!(
            store.set_model("", ModelSpec::empty()),
            Err(StoreError::ModelOverwrite(_))
        ));
        assert!(matches!(
            store.delete_model(""),
            Err(StoreError::ModelOverwrite(_))
        ));
    }

    #[test]
    fn test_delete_missing_model() {
        let mut store = Store::new();
        assert!(matches!(
            store.delete_model("nope"),
            Err(StoreError::ModelDoesNotExist(_))
        ));
    }

    #[test]
    fn test_update_submitted_twice() {
        let mut store = Store::new();
        let update: UpdateRef = Rc::new(ModelUpdate::set_value(Path::parse("a").unwrap(), 1));
        store.handle_update(update.clone()).unwrap();
        assert!(matches!(
            store.handle_update(update),
            Err(StoreError::UpdateAlreadyPerformed(_))
        ));
    }

    #[test]
    fn test_failed_update_leaves_fault() {
        let mut store = Store::new();
        store.set("L", "text").unwrap();
        let update: UpdateRef = Rc::new(ModelUpdate::remove_index(Path::parse("L").unwrap(), 0));
        store.handle_update(update.clone()).unwrap();
        assert!(!update.succeeded());
        let value = store.get_value("L", None).unwrap().unwrap();
        assert!(value.is_fault());
    }

    #[test]
    fn test_append_uses_configured_list_kind() {
        let config = StoreConfig {
            default_list_kind: crate::value::ListKind::Linked,
            ..StoreConfig::default()
        };
        let mut store = Store::with_config(config);
        store
            .handle_update(ModelUpdate::append(Path::parse("L").unwrap(), json!(1)))
            .unwrap();
        let value = store.get_value("L", None).unwrap().unwrap();
        assert!(matches!(value.as_list(), Some(List::Linked(_))));
    }

    #[test]
    fn test_move_model_rebases_subtree() {
        let mut store = Store::new();
        store.set_model("a", ModelSpec::tree(json!({"b": {"c": 1}}))).unwrap();
        store.move_model("a.b", "x.y").unwrap();
        assert!(!store.has_path("a.b"));
        assert_eq!(
            store.model("x.y.c").unwrap().path(),
            &Path::parse("x.y.c").unwrap()
        );
        assert_eq!(store.get_value("x.y.c", None).unwrap(), Some(Value::from(1)));
    }

    #[test]
    fn test_move_into_own_subtree_rejected() {
        let mut store = Store::new();
        store.set("a.b", 1).unwrap();
        assert!(matches!(
            store.move_model("a", "a.b.c"),
            Err(StoreError::ModelOverwrite(_))
        ));
        assert!(store.has_path("a.b"));
    }

    #[test]
    fn test_ensure_model_creates_blank_models() {
        let mut store = Store::new();
        let model = store.ensure_model("a.b").unwrap();
        assert_eq!(model.path(), &Path::parse("a.b").unwrap());
        assert!(model.value().is_none());
        assert!(store.has_path("a"));
    }

    #[test]
    fn test_value_change_enqueues_value_and_parent_field_observers() {
        let mut store = Store::new();
        store.set("a.b", 1).unwrap();
        let value = ObserverId::Computed(Path::parse("v").unwrap());
        let field = ObserverId::Computed(Path::parse("f").unwrap());
        let referential = ObserverId::Computed(Path::parse("r").unwrap());
        store.add_observer(&value, "a.b.$").unwrap();
        store.add_observer(&field, "a.*").unwrap();
        store.add_observer(&referential, "a.b").unwrap();
        store.pending.clear();

        store.set("a.b", 2).unwrap();
        let ids: Vec<ObserverId> = store.pending.take().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![value, field]);
    }

    #[test]
    fn test_computed_not_writable() {
        let mut store = Store::new();
        store
            .define_computed("c", ComputedSpec::new(|_| Ok(Value::from(1))))
            .unwrap();
        assert!(matches!(
            store.set("c", 2),
            Err(StoreError::ComputedNotWritable(_))
        ));
        assert!(matches!(
            store.set("c.child", 2),
            Err(StoreError::ComputedNotWritable(_))
        ));
    }

    #[test]
    fn test_cyclic_computation_detected() {
        let mut store = Store::new();
        store
            .define_computed("a", ComputedSpec::new(|ctx| ctx.get_value("b")))
            .unwrap();
        store
            .define_computed("b", ComputedSpec::new(|ctx| ctx.get_value("a")))
            .unwrap();
        assert_eq!(
            store.get_value("a", None),
            Err(StoreError::CyclicDependency(Path::parse("a").unwrap()))
        );
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut store = Store::new();
        store.set("a", 1).unwrap();
        store
            .add_observer(&ObserverId::Computed(Path::parse("x").unwrap()), "a.$")
            .unwrap();
        store.reset();
        assert!(!store.has_path("a"));
        assert!(!store.has_pending());
        assert!(store.observers_of("a.$").unwrap().is_empty());
    }

    #[test]
    fn test_snapshot() {
        let mut store = Store::new();
        store.set("a.b", 1).unwrap();
        store.set("a.c", "x").unwrap();
        assert_eq!(store.snapshot(), json!({"a": {"b": 1, "c": "x"}}));
    }
}
