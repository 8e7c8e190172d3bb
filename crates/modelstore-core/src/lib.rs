//! # modelstore-core
//!
//! Path-addressed, hierarchical reactive data store.
//!
//! This crate provides:
//! - Path parsing and manipulation (`a.b.c`, `a.b.$`, `a.b.*`, `a<b`)
//! - The model tree with referential, value and field observers
//! - Model updates: value writes, model replacement and list operations
//! - Computed models with dependency tracking and caching
//! - The run loop that propagates change notifications to a fixed point
//!
//! The engine is a single-threaded batch processor: apply a batch of updates
//! with [`Store::handle_update`], then call [`Store::run_loop`] once.
//!
//! ```
//! use modelstore_core::{ComputedSpec, Store};
//!
//! let mut store = Store::new();
//! store.set("a", 1).unwrap();
//! store
//!     .define_computed("b", ComputedSpec::new(|ctx| Ok((ctx.get_i64("a")? + 1).into())))
//!     .unwrap();
//! assert_eq!(store.get_value("b", None).unwrap().and_then(|v| v.as_i64()), Some(2));
//!
//! store.set("a", 5).unwrap();
//! assert!(store.run_loop().is_empty());
//! assert_eq!(store.get_value("b", None).unwrap().and_then(|v| v.as_i64()), Some(6));
//! ```

pub mod computed;
pub mod config;
pub mod error;
pub mod model;
pub mod observer;
pub mod path;
pub mod run_loop;
pub mod store;
pub mod update;
pub mod value;

pub use computed::{ComputeContext, ComputeFn, ComputedModel, ComputedSpec, SyncState};
pub use config::{ComputedDefaults, ConfigError, StoreConfig};
pub use error::{PathError, StoreError, UpdateError};
pub use model::{Entry, Model, ModelSpec};
pub use observer::{Category, Observer, ObserverId};
pub use path::{IntoPath, Path, Segment};
pub use run_loop::RunLoopException;
pub use store::Store;
pub use update::{Comparator, End, ModelUpdate, Predicate, UpdateKind, UpdateOp, UpdateRef};
pub use value::{compare_natural, ExceptionEncountered, List, ListKind, Value};
