//! Observers and observer registries.
//!
//! Observers register interest in a path at one of three granularities,
//! picked by the path's terminal marker:
//! - "a.b" - referential: the model at "a.b" is replaced or removed
//! - "a.b.$" - value: the value of "a.b" changes
//! - "a.b.*" - field: a direct child of "a.b" is added, changed or removed
//!
//! Registrations are keyed by absolute model path rather than by model
//! instance, so they outlive the models occupying the path.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::StoreError;
use crate::path::Path;
use crate::store::Store;
use crate::update::UpdateRef;

/// Identity of an observer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObserverId {
    /// The computed model at this path.
    Computed(Path),
    /// An observer registered with [`Store::register_observer`].
    External(u64),
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObserverId::Computed(path) => write!(f, "computed({})", path),
            ObserverId::External(id) => write!(f, "observer#{}", id),
        }
    }
}

/// Registration category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Referential,
    Value,
    Field,
}

impl Category {
    /// The category implied by the terminal marker of `path`.
    pub fn of(path: &Path) -> Self {
        if path.is_value() {
            Category::Value
        } else if path.is_field() {
            Category::Field
        } else {
            Category::Referential
        }
    }

    pub const ALL: [Category; 3] = [Category::Referential, Category::Value, Category::Field];
}

/// Capability interface of observers outside the engine (views, loggers).
///
/// `notify` receives the store so an observer can read the values it
/// renders, and every update delivered to it in this run loop pass.
pub trait Observer {
    fn notify(&mut self, store: &mut Store, updates: &[UpdateRef]) -> Result<(), StoreError>;

    /// Observers reporting dependents of their own are notified during the
    /// propagation waves instead of after them.
    fn has_own_observers(&self) -> bool {
        false
    }

    fn path(&self) -> Option<&Path> {
        None
    }
}

#[derive(Debug, Default, Clone)]
struct ObserverSets {
    referential: Vec<ObserverId>,
    value: Vec<ObserverId>,
    field: Vec<ObserverId>,
}

impl ObserverSets {
    fn get(&self, category: Category) -> &Vec<ObserverId> {
        match category {
            Category::Referential => &self.referential,
            Category::Value => &self.value,
            Category::Field => &self.field,
        }
    }

    fn get_mut(&mut self, category: Category) -> &mut Vec<ObserverId> {
        match category {
            Category::Referential => &mut self.referential,
            Category::Value => &mut self.value,
            Category::Field => &mut self.field,
        }
    }

    fn is_empty(&self) -> bool {
        self.referential.is_empty() && self.value.is_empty() && self.field.is_empty()
    }
}

/// Observer registrations keyed by model path.
#[derive(Debug, Default, Clone)]
pub(crate) struct Registry {
    sets: BTreeMap<Path, ObserverSets>,
}

impl Registry {
    /// Register `id` at `path` (a model path). Returns false if it was
    /// already registered.
    pub fn add(&mut self, path: Path, category: Category, id: ObserverId) -> bool {
        let set = self.sets.entry(path).or_default().get_mut(category);
        if set.contains(&id) {
            return false;
        }
        set.push(id);
        true
    }

    pub fn remove(&mut self, path: &Path, category: Category, id: &ObserverId) -> bool {
        let Some(sets) = self.sets.get_mut(path) else {
            return false;
        };
        let set = sets.get_mut(category);
        let before = set.len();
        set.retain(|o| o != id);
        let removed = set.len() != before;
        if sets.is_empty() {
            self.sets.remove(path);
        }
        removed
    }

    /// Remove `id` from every set it appears in.
    pub fn remove_everywhere(&mut self, id: &ObserverId) {
        for sets in self.sets.values_mut() {
            for category in Category::ALL {
                sets.get_mut(category).retain(|o| o != id);
            }
        }
        self.sets.retain(|_, sets| !sets.is_empty());
    }

    /// Replace `old` with `new` wherever `old` is registered.
    pub fn rename(&mut self, old: &ObserverId, new: &ObserverId) {
        for sets in self.sets.values_mut() {
            for category in Category::ALL {
                let set = sets.get_mut(category);
                if let Some(pos) = set.iter().position(|o| o == old) {
                    if set.contains(new) {
                        set.remove(pos);
                    } else {
                        set[pos] = new.clone();
                    }
                }
            }
        }
    }

    pub fn observers(&self, path: &Path, category: Category) -> &[ObserverId] {
        self.sets
            .get(path)
            .map(|sets| sets.get(category).as_slice())
            .unwrap_or(&[])
    }

    /// Registered paths strictly below `path`.
    pub fn paths_below(&self, path: &Path) -> Vec<Path> {
        self.sets
            .keys()
            .filter(|p| p.len() > path.len() && p.starts_with(path))
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.sets.clear();
    }
}

/// Observers waiting for notification, in first-enqueued order, with the
/// updates collected for each.
#[derive(Default)]
pub(crate) struct Pending {
    order: Vec<ObserverId>,
    updates: HashMap<ObserverId, Vec<UpdateRef>>,
}

impl Pending {
    pub fn push(&mut self, id: ObserverId, update: &UpdateRef) {
        let updates = self.updates.entry(id.clone()).or_insert_with(|| {
            self.order.push(id);
            Vec::new()
        });
        if !updates.iter().any(|u| UpdateRef::ptr_eq(u, update)) {
            updates.push(update.clone());
        }
    }

    pub fn extend(&mut self, id: ObserverId, updates: Vec<UpdateRef>) {
        for update in &updates {
            self.push(id.clone(), update);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Drain everything, in order.
    pub fn take(&mut self) -> Vec<(ObserverId, Vec<UpdateRef>)> {
        let mut updates = std::mem::take(&mut self.updates);
        std::mem::take(&mut self.order)
            .into_iter()
            .map(|id| {
                let list = updates.remove(&id).unwrap_or_default();
                (id, list)
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.updates.clear();
    }
}
