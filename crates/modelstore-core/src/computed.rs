//! Computed models.
//!
//! A computed model derives its value from other models. Its compute
//! function reads inputs through a [`ComputeContext`]; every read registers
//! the computed model as a value observer of the input, so dependency edges
//! are rediscovered on each computation.
//!
//! State machine:
//! - `Stale` --read--> compute; if cacheable, cache and become `Fresh`
//! - `Fresh` --read--> cached value
//! - any --input changed--> `Stale`; if cacheable and immediate, compute now

use std::fmt;
use std::rc::Rc;

use crate::config::ComputedDefaults;
use crate::error::StoreError;
use crate::model::Entry;
use crate::observer::ObserverId;
use crate::path::{IntoPath, Path};
use crate::store::Store;
use crate::value::Value;

/// Compute function of a computed model.
pub type ComputeFn = Rc<dyn Fn(&mut ComputeContext<'_>) -> Result<Value, StoreError>>;

/// Definition of a computed model, installed with
/// [`Store::define_computed`] or [`ModelSpec::Computed`](crate::ModelSpec).
#[derive(Clone)]
pub struct ComputedSpec {
    compute: ComputeFn,
    cacheable: Option<bool>,
    immediate: Option<bool>,
}

impl ComputedSpec {
    pub fn new(
        compute: impl Fn(&mut ComputeContext<'_>) -> Result<Value, StoreError> + 'static,
    ) -> Self {
        Self {
            compute: Rc::new(compute),
            cacheable: None,
            immediate: None,
        }
    }

    pub fn cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = Some(cacheable);
        self
    }

    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = Some(immediate);
        self
    }
}

impl fmt::Debug for ComputedSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedSpec")
            .field("cacheable", &self.cacheable)
            .field("immediate", &self.immediate)
            .finish_non_exhaustive()
    }
}

/// Whether the cache reflects the current inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Stale,
    Fresh,
}

/// Runtime state of a computed model.
pub struct ComputedModel {
    pub(crate) compute: ComputeFn,
    pub(crate) cache: Option<Value>,
    pub(crate) state: SyncState,
    pub(crate) cacheable: bool,
    pub(crate) immediate: bool,
    pub(crate) dependencies: Vec<Path>,
    pub(crate) computations: u64,
}

impl ComputedModel {
    pub(crate) fn new(spec: &ComputedSpec, defaults: &ComputedDefaults) -> Self {
        Self {
            compute: spec.compute.clone(),
            cache: None,
            state: SyncState::Stale,
            cacheable: spec.cacheable.unwrap_or(defaults.cacheable),
            immediate: spec.immediate.unwrap_or(defaults.immediate),
            dependencies: Vec::new(),
            computations: 0,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    pub fn is_immediate(&self) -> bool {
        self.immediate
    }

    /// The cached value, if fresh.
    pub fn cached(&self) -> Option<&Value> {
        match self.state {
            SyncState::Fresh => self.cache.as_ref(),
            SyncState::Stale => None,
        }
    }

    /// Value paths read by the last computation.
    pub fn dependencies(&self) -> &[Path] {
        &self.dependencies
    }

    /// Number of times the compute function has run.
    pub fn computations(&self) -> u64 {
        self.computations
    }

    /// Go stale. Returns true if the model wants to recompute right away.
    pub(crate) fn invalidate(&mut self) -> bool {
        self.state = SyncState::Stale;
        self.cache = None;
        self.cacheable && self.immediate
    }
}

impl fmt::Debug for ComputedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedModel")
            .field("cache", &self.cache)
            .field("state", &self.state)
            .field("cacheable", &self.cacheable)
            .field("immediate", &self.immediate)
            .field("dependencies", &self.dependencies)
            .field("computations", &self.computations)
            .finish_non_exhaustive()
    }
}

/// Access to the store from inside a compute function.
pub struct ComputeContext<'a> {
    store: &'a mut Store,
    path: Path,
    reads: Vec<Path>,
}

impl<'a> ComputeContext<'a> {
    pub(crate) fn new(store: &'a mut Store, path: Path) -> Self {
        Self {
            store,
            path,
            reads: Vec::new(),
        }
    }

    /// Path of the computed model being computed.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read through `key` and depend on it. The category of the dependency
    /// follows the terminal marker of `key`, as with [`Store::get`].
    ///
    /// A missing model is reported as [`StoreError::DependencyNotFound`].
    pub fn get(&mut self, key: impl IntoPath) -> Result<Entry, StoreError> {
        let key = key.into_path()?;
        let observer = ObserverId::Computed(self.path.clone());
        if !self.reads.contains(&key) {
            self.reads.push(key.clone());
        }
        match self.store.get(&key, Some(&observer)) {
            Err(StoreError::ModelDoesNotExist(_)) => {
                Err(StoreError::DependencyNotFound(key.to_model_path()))
            }
            other => other,
        }
    }

    /// Read the value of the model at `key` and depend on it. A model
    /// without a value reads as null.
    pub fn get_value(&mut self, key: impl IntoPath) -> Result<Value, StoreError> {
        let key = key.into_path()?.to_value_path();
        Ok(self.get(key)?.into_value().unwrap_or_else(Value::null))
    }

    pub fn get_i64(&mut self, key: impl IntoPath) -> Result<i64, StoreError> {
        let key = key.into_path()?;
        let value = self.get_value(&key)?;
        value.as_i64().ok_or_else(|| self.not_a_number(&key, &value))
    }

    pub fn get_f64(&mut self, key: impl IntoPath) -> Result<f64, StoreError> {
        let key = key.into_path()?;
        let value = self.get_value(&key)?;
        value.as_f64().ok_or_else(|| self.not_a_number(&key, &value))
    }

    /// A [`StoreError::Computation`] for this model.
    pub fn fail(&self, message: impl Into<String>) -> StoreError {
        StoreError::Computation {
            path: self.path.clone(),
            message: message.into(),
        }
    }

    fn not_a_number(&self, key: &Path, value: &Value) -> StoreError {
        self.fail(format!(
            "input {} is {}, expected a number",
            key.to_model_path(),
            value.type_name()
        ))
    }

    pub(crate) fn into_reads(self) -> Vec<Path> {
        self.reads
    }
}
