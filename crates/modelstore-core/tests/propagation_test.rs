//! Integration tests for change propagation through the model store.
//!
//! These tests drive the public `Store` API: writes, observer registration,
//! computed models and the run loop.

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use serde_json::{json, Value as Json};

use modelstore_core::{
    ComputedSpec, Entry, ModelSpec, ModelUpdate, Observer, ObserverId, Path, Store, StoreError,
    UpdateKind, UpdateRef,
};

fn p(s: &str) -> Path {
    Path::parse(s).unwrap()
}

/// `input + 1`.
fn plus_one(input: &'static str) -> ComputedSpec {
    ComputedSpec::new(move |ctx| Ok((ctx.get_i64(input)? + 1).into()))
}

fn read_i64(store: &mut Store, path: &str) -> Result<Option<i64>, StoreError> {
    Ok(store.get_value(path, None)?.and_then(|v| v.as_i64()))
}

fn computations(store: &Store, path: &str) -> u64 {
    store
        .model(path)
        .and_then(|model| model.computed())
        .map(|computed| computed.computations())
        .unwrap_or(0)
}

/// B=A+1, C=A+1, D=C+1, E=C+1, F=E+1 with A=0, every model read once.
fn chain_store() -> Store {
    let mut store = Store::new();
    store.set("A", 0).unwrap();
    store.define_computed("B", plus_one("A")).unwrap();
    store.define_computed("C", plus_one("A")).unwrap();
    store.define_computed("D", plus_one("C")).unwrap();
    store.define_computed("E", plus_one("C")).unwrap();
    store.define_computed("F", plus_one("E")).unwrap();
    for path in ["B", "C", "D", "E", "F"] {
        read_i64(&mut store, path).unwrap();
    }
    assert!(store.run_loop().is_empty());
    store
}

/// Records the kind of every update it is notified with.
struct Recorder {
    seen: Rc<RefCell<Vec<UpdateKind>>>,
}

impl Observer for Recorder {
    fn notify(&mut self, _store: &mut Store, updates: &[UpdateRef]) -> Result<(), StoreError> {
        self.seen
            .borrow_mut()
            .extend(updates.iter().map(|update| update.kind()));
        Ok(())
    }
}

/// Renders the value at a path each time it is notified.
struct View {
    path: &'static str,
    rendered: Rc<RefCell<Vec<Json>>>,
}

impl Observer for View {
    fn notify(&mut self, store: &mut Store, _updates: &[UpdateRef]) -> Result<(), StoreError> {
        let value = store.get_value(self.path, None)?;
        self.rendered
            .borrow_mut()
            .push(value.map(|v| v.to_json()).unwrap_or(Json::Null));
        Ok(())
    }
}

#[test]
fn test_auto_vivification() {
    let mut store = Store::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let root_fields = store.register_observer(Box::new(Recorder { seen: seen.clone() }));
    store.add_observer(&root_fields, "*").unwrap();

    store.set("a.b.c", "v").unwrap();
    assert!(store.has_path("a"));
    assert!(store.has_path("a.b"));
    assert!(store.has_path("a.b.c"));
    assert_eq!(
        store.get_value("a.b.c", None).unwrap().map(|v| v.to_json()),
        Some(json!("v"))
    );

    assert!(store.run_loop().is_empty());
    assert_eq!(*seen.borrow(), vec![UpdateKind::SetValue]);
}

#[test]
fn test_observer_preserved_across_replacement() {
    let mut store = Store::new();
    store.set("x.y", 1).unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let observer = store.register_observer(Box::new(Recorder { seen: seen.clone() }));
    assert_eq!(
        store.get("x.y", Some(&observer)).unwrap(),
        Entry::Model(p("x.y"))
    );

    store
        .set_model("x", ModelSpec::tree(json!({"z": 2})))
        .unwrap();
    assert_eq!(store.observers_of("x.y").unwrap(), vec![observer.clone()]);
    assert_eq!(
        store.get("x.y", None),
        Err(StoreError::ModelDoesNotExist(p("x.y")))
    );
    assert!(store.run_loop().is_empty());
    assert_eq!(*seen.borrow(), vec![UpdateKind::ModelDeleted]);

    // The registration applies to whatever occupies the path next.
    store.set("x.y", 5).unwrap();
    assert!(store.run_loop().is_empty());
    assert_eq!(
        *seen.borrow(),
        vec![UpdateKind::ModelDeleted, UpdateKind::SetValue]
    );
}

#[test]
fn test_computed_cache_refreshed_during_propagation() {
    let mut store = Store::new();
    store.set("A", 0).unwrap();
    store.define_computed("B", plus_one("A")).unwrap();

    assert_eq!(read_i64(&mut store, "B").unwrap(), Some(1));
    assert_eq!(computations(&store, "B"), 1);

    store.set("A", 1).unwrap();
    assert!(store.run_loop().is_empty());
    assert_eq!(computations(&store, "B"), 2);

    assert_eq!(read_i64(&mut store, "B").unwrap(), Some(2));
    assert_eq!(computations(&store, "B"), 2);
}

#[test]
fn test_lazy_computed_recomputes_on_read() {
    let mut store = Store::new();
    store.set("A", 0).unwrap();
    store
        .define_computed("B", plus_one("A").immediate(false))
        .unwrap();
    assert_eq!(read_i64(&mut store, "B").unwrap(), Some(1));

    store.set("A", 1).unwrap();
    assert!(store.run_loop().is_empty());
    assert_eq!(computations(&store, "B"), 1);
    assert_eq!(read_i64(&mut store, "B").unwrap(), Some(2));
    assert_eq!(computations(&store, "B"), 2);

    // The read re-registered the dependency.
    store.set("A", 2).unwrap();
    assert!(store.run_loop().is_empty());
    assert_eq!(read_i64(&mut store, "B").unwrap(), Some(3));
}

#[test]
fn test_uncacheable_computed_recomputes_every_read() {
    let mut store = Store::new();
    store.set("A", 0).unwrap();
    store
        .define_computed("B", plus_one("A").cacheable(false))
        .unwrap();
    read_i64(&mut store, "B").unwrap();
    read_i64(&mut store, "B").unwrap();
    assert_eq!(computations(&store, "B"), 2);
}

#[test]
fn test_chained_invalidation() {
    let mut store = chain_store();
    assert_eq!(read_i64(&mut store, "F").unwrap(), Some(3));

    store.set("A", 1).unwrap();
    assert!(store.run_loop().is_empty());
    assert_eq!(read_i64(&mut store, "F").unwrap(), Some(4));
    assert_eq!(read_i64(&mut store, "B").unwrap(), Some(2));
    assert_eq!(read_i64(&mut store, "D").unwrap(), Some(3));
}

#[test]
fn test_view_sees_fixed_point() {
    let mut store = chain_store();
    let rendered = Rc::new(RefCell::new(Vec::new()));
    let view = store.register_observer(Box::new(View {
        path: "F",
        rendered: rendered.clone(),
    }));
    assert_eq!(
        store.get_value("F", Some(&view)).unwrap().and_then(|v| v.as_i64()),
        Some(3)
    );

    store.set("A", 1).unwrap();
    assert!(store.run_loop().is_empty());
    assert_eq!(*rendered.borrow(), vec![json!(4)]);
    // Recomputed once during propagation; the view read the cache.
    assert_eq!(computations(&store, "F"), 2);
}

#[test]
fn test_missing_dependency_reported_per_observer() {
    let mut store = chain_store();
    let rendered = Rc::new(RefCell::new(Vec::new()));
    let view = store.register_observer(Box::new(View {
        path: "F",
        rendered: rendered.clone(),
    }));
    store.get_value("F", Some(&view)).unwrap();

    store.delete_model("C").unwrap();
    let exceptions = store.run_loop();

    assert_eq!(exceptions.len(), 4);
    for exception in &exceptions {
        assert_eq!(exception.error(), &StoreError::DependencyNotFound(p("C")));
    }
    let failed: Vec<ObserverId> = exceptions.iter().map(|e| e.observer().clone()).collect();
    for expected in [
        ObserverId::Computed(p("D")),
        ObserverId::Computed(p("E")),
        ObserverId::Computed(p("F")),
        view,
    ] {
        assert!(failed.contains(&expected), "missing {}", expected);
    }

    let result = store.get_value("F", None);
    assert_eq!(result, Err(StoreError::DependencyNotFound(p("C"))));
    assert!(rendered.borrow().is_empty());

    // Restoring the input heals the chain.
    store.set("C", 10).unwrap();
    assert!(store.run_loop().is_empty());
    assert_eq!(read_i64(&mut store, "F").unwrap(), Some(12));
}

#[test]
fn test_list_updates() {
    let mut store = Store::new();

    store
        .handle_update(ModelUpdate::append(p("L"), json!(1)))
        .unwrap();
    assert_eq!(store.snapshot(), json!({"L": [1]}));

    store.set("M", json!([5, 10, 15, 20])).unwrap();
    store
        .handle_update(ModelUpdate::remove_all_that_match(p("M"), |index, _| {
            index < 3
        }))
        .unwrap();
    assert_eq!(
        store.get_value("M", None).unwrap().map(|v| v.to_json()),
        Some(json!([20]))
    );

    store.set("S", json!([100, 90, 95, 3])).unwrap();
    store
        .handle_update(ModelUpdate::sort_by(p("S"), |a, b| {
            b.as_i64().cmp(&a.as_i64())
        }))
        .unwrap();
    assert_eq!(
        store.get_value("S", None).unwrap().map(|v| v.to_json()),
        Some(json!([100, 95, 90, 3]))
    );
}

#[test]
fn test_failed_update_notifies_and_poisons_value() {
    let mut store = Store::new();
    store.set("L", json!([1])).unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let observer = store.register_observer(Box::new(Recorder { seen: seen.clone() }));
    store.add_observer(&observer, "L.$").unwrap();

    let update: UpdateRef = Rc::new(ModelUpdate::remove_index(p("L"), 3));
    store.handle_update(update.clone()).unwrap();
    assert!(update.error().is_some());

    assert!(store.run_loop().is_empty());
    assert_eq!(*seen.borrow(), vec![UpdateKind::RemoveIndex]);
    let value = store.get_value("L", None).unwrap().unwrap();
    assert!(value.is_fault());
}

#[test]
fn test_batch_results_are_per_update() {
    let mut store = Store::new();
    let results = store.handle_updates(vec![
        ModelUpdate::set_value(p("a"), 1),
        ModelUpdate::set_value(p("b.*"), 2),
        ModelUpdate::set_value(p("c"), 3),
    ]);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(StoreError::Path(_))));
    assert!(results[2].is_ok());
    assert!(!store.has_path("b"));
}

#[test]
fn test_moved_computed_keeps_dependencies() {
    let mut store = Store::new();
    store.set("A", 1).unwrap();
    store.define_computed("calc", plus_one("A")).unwrap();
    assert_eq!(read_i64(&mut store, "calc").unwrap(), Some(2));

    store.move_model("calc", "out.calc").unwrap();
    assert!(!store.has_path("calc"));

    store.set("A", 5).unwrap();
    assert!(store.run_loop().is_empty());
    assert_eq!(computations(&store, "out.calc"), 2);
    assert_eq!(read_i64(&mut store, "out.calc").unwrap(), Some(6));
}

#[test]
fn test_replacement_notifies_field_observers() {
    let mut store = Store::new();
    store.set("x.y", 1).unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let fields = store.register_observer(Box::new(Recorder { seen: seen.clone() }));
    store.add_observer(&fields, "x.*").unwrap();

    store
        .set_model("x", ModelSpec::tree(json!({"z": 2})))
        .unwrap();
    assert!(store.run_loop().is_empty());
    assert_eq!(
        store.get("x.*", None).unwrap(),
        Entry::Fields(vec!["z".to_string()])
    );
    assert_eq!(*seen.borrow(), vec![UpdateKind::SetModel]);

    store.set("w.q", 3).unwrap();
    assert!(store.run_loop().is_empty());
    store.move_model("w", "x").unwrap();
    assert!(store.run_loop().is_empty());
    assert_eq!(
        store.get("x.*", None).unwrap(),
        Entry::Fields(vec!["q".to_string()])
    );
    assert_eq!(
        *seen.borrow(),
        vec![UpdateKind::SetModel, UpdateKind::Cascade]
    );
}

#[test]
fn test_move_over_computed_at_same_path() {
    let mut store = Store::new();
    store.set("A", 1).unwrap();
    store.define_computed("a.x", plus_one("A")).unwrap();
    store
        .define_computed(
            "a.b.x",
            ComputedSpec::new(|ctx| Ok((ctx.get_i64("A")? * 10).into())),
        )
        .unwrap();
    assert_eq!(read_i64(&mut store, "a.x").unwrap(), Some(2));
    assert_eq!(read_i64(&mut store, "a.b.x").unwrap(), Some(10));

    // a.b.x lands on a.x, replacing the computed model there.
    store.move_model("a.b", "a").unwrap();
    assert!(store.run_loop().is_empty());
    assert_eq!(read_i64(&mut store, "a.x").unwrap(), Some(10));

    store.set("A", 2).unwrap();
    assert!(store.run_loop().is_empty());
    assert_eq!(computations(&store, "a.x"), 2);
    assert_eq!(read_i64(&mut store, "a.x").unwrap(), Some(20));
}
