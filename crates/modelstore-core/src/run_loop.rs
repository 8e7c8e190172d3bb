//! Change propagation.
//!
//! The run loop drains the pending set in waves. Each wave takes a snapshot
//! of the pending observers:
//! - observers with dependents of their own are notified now, and their
//!   dependents are enqueued for the next wave (also when the notification
//!   fails: a failing observer changed what its dependents read)
//! - leaves are held back and notified once after the last wave, so they
//!   see every cascading computed model at its fixed point
//!
//! Failures never abort a pass. They are collected as [`RunLoopException`]s
//! and returned to the caller.

use thiserror::Error;

use crate::error::StoreError;
use crate::observer::{Category, ObserverId, Pending};
use crate::path::Path;
use crate::store::Store;
use crate::update::{ModelUpdate, UpdateRef};

/// A failure captured during a run loop pass.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{observer} failed in iteration {iteration}: {error}")]
pub struct RunLoopException {
    error: StoreError,
    observer: ObserverId,
    iteration: usize,
}

impl RunLoopException {
    pub fn new(error: StoreError, observer: ObserverId, iteration: usize) -> Self {
        Self {
            error,
            observer,
            iteration,
        }
    }

    pub fn error(&self) -> &StoreError {
        &self.error
    }

    pub fn observer(&self) -> &ObserverId {
        &self.observer
    }

    /// Wave the failure happened in, counting from 1. Leaves report the
    /// last wave.
    pub fn iteration(&self) -> usize {
        self.iteration
    }
}

impl Store {
    /// Notify pending observers until nothing is left pending.
    ///
    /// Stops early, with a [`StoreError::IterationLimit`] exception, if the
    /// number of waves exceeds `max_iterations`; whatever is still pending
    /// is dropped.
    pub fn run_loop(&mut self) -> Vec<RunLoopException> {
        let mut exceptions = Vec::new();
        let mut iteration = 0;

        loop {
            let mut free = Pending::default();
            while !self.pending.is_empty() {
                if iteration >= self.config.max_iterations {
                    let stuck = self.pending.take();
                    tracing::warn!(
                        iteration,
                        pending = stuck.len(),
                        "Run loop hit the iteration limit, dropping pending observers"
                    );
                    if let Some((observer, _)) = stuck.into_iter().next() {
                        exceptions.push(RunLoopException::new(
                            StoreError::IterationLimit(self.config.max_iterations),
                            observer,
                            iteration,
                        ));
                    }
                    return exceptions;
                }
                iteration += 1;

                let wave = self.pending.take();
                tracing::debug!(iteration, observers = wave.len(), "Propagation wave");
                for (observer, updates) in wave {
                    if !self.has_own_observers(&observer) {
                        free.extend(observer, updates);
                        continue;
                    }
                    if let Err(error) = self.dispatch(&observer, &updates) {
                        exceptions.push(self.failure(error, observer.clone(), iteration));
                    }
                    self.enqueue_dependents(&observer);
                }
            }

            if free.is_empty() {
                break;
            }
            tracing::debug!(iteration, observers = free.len(), "Notifying leaves");
            for (observer, updates) in free.take() {
                if let Err(error) = self.dispatch(&observer, &updates) {
                    exceptions.push(self.failure(error, observer, iteration));
                }
            }
            // A leaf may have written to the store while handling its updates.
            if self.pending.is_empty() {
                break;
            }
        }

        exceptions
    }

    fn failure(&self, error: StoreError, observer: ObserverId, iteration: usize) -> RunLoopException {
        tracing::warn!(%observer, iteration, %error, "Observer failed");
        RunLoopException::new(error, observer, iteration)
    }

    /// True if anything observes the output of `observer`.
    fn has_own_observers(&self, observer: &ObserverId) -> bool {
        match observer {
            ObserverId::Computed(path) => !self.dependents(path).is_empty(),
            ObserverId::External(key) => self
                .observers
                .get(key)
                .and_then(Option::as_ref)
                .is_some_and(|observer| observer.has_own_observers()),
        }
    }

    /// Path whose value `observer` produces.
    fn output_path(&self, observer: &ObserverId) -> Option<Path> {
        match observer {
            ObserverId::Computed(path) => Some(path.clone()),
            ObserverId::External(key) => self
                .observers
                .get(key)
                .and_then(Option::as_ref)
                .and_then(|observer| observer.path())
                .map(Path::to_model_path),
        }
    }

    /// Value observers of `path` and field observers of its parent.
    fn dependents(&self, path: &Path) -> Vec<ObserverId> {
        let mut dependents = self.registry.observers(path, Category::Value).to_vec();
        if let Some(parent) = path.parent() {
            for id in self.registry.observers(&parent, Category::Field) {
                if !dependents.contains(id) {
                    dependents.push(id.clone());
                }
            }
        }
        dependents
    }

    fn enqueue_dependents(&mut self, observer: &ObserverId) {
        let Some(path) = self.output_path(observer) else {
            return;
        };
        let update: UpdateRef = ModelUpdate::cascade(path.to_value_path()).into_notification();
        self.enqueue(&path, Category::Value, &update);
        if let Some(parent) = path.parent() {
            self.enqueue(&parent, Category::Field, &update);
        }
    }

    fn dispatch(&mut self, observer: &ObserverId, updates: &[UpdateRef]) -> Result<(), StoreError> {
        match observer {
            ObserverId::Computed(path) => self.notify_computed(path),
            ObserverId::External(key) => {
                // Unregistered, or busy in an enclosing pass.
                let Some(mut external) = self.observers.get_mut(key).and_then(Option::take) else {
                    tracing::trace!(%observer, "Skipping unavailable observer");
                    return Ok(());
                };
                let result = external.notify(self, updates);
                if let Some(slot) = self.observers.get_mut(key) {
                    *slot = Some(external);
                }
                result
            }
        }
    }
}
