//! Model tree nodes.
//!
//! A [`Model`] owns its children; its parent is implied by its absolute
//! path. A model may carry a value (reached with `$`), children (reached
//! with `*` or by key), or a computed definition (see [`crate::computed`]).

use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::fmt;

use crate::computed::{ComputedModel, ComputedSpec};
use crate::config::StoreConfig;
use crate::error::PathError;
use crate::path::{is_valid_key, Path};
use crate::value::Value;

/// What `set_model` installs at a path.
#[derive(Clone)]
pub enum ModelSpec {
    /// A plain subtree: JSON objects become child models, anything else
    /// becomes the value of the model.
    Tree(Json),
    /// A computed model.
    Computed(ComputedSpec),
}

impl ModelSpec {
    /// A model with no value and no children.
    pub fn empty() -> Self {
        ModelSpec::Tree(Json::Object(Default::default()))
    }

    pub fn tree(json: Json) -> Self {
        ModelSpec::Tree(json)
    }

    pub fn computed(spec: ComputedSpec) -> Self {
        ModelSpec::Computed(spec)
    }
}

impl fmt::Debug for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSpec::Tree(json) => f.debug_tuple("Tree").field(json).finish(),
            ModelSpec::Computed(spec) => f.debug_tuple("Computed").field(spec).finish(),
        }
    }
}

/// Result of a read through a path.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// A model reference, identified by its path.
    Model(Path),
    /// The value reached with `$`; `None` if the model holds none.
    Value(Option<Value>),
    /// Keys of the children reached with `*`.
    Fields(Vec<String>),
}

impl Entry {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Entry::Value(value) => value,
            _ => None,
        }
    }
}

/// A node of the model tree.
#[derive(Debug)]
pub struct Model {
    pub(crate) key: String,
    pub(crate) path: Path,
    pub(crate) value: Option<Value>,
    pub(crate) children: BTreeMap<String, Model>,
    pub(crate) computed: Option<ComputedModel>,
}

impl Model {
    pub(crate) fn root() -> Self {
        Self::blank(Path::root())
    }

    pub(crate) fn blank(path: Path) -> Self {
        Self {
            key: path.key().unwrap_or_default().to_string(),
            path,
            value: None,
            children: BTreeMap::new(),
            computed: None,
        }
    }

    /// Build the model `spec` describes at `path`.
    ///
    /// Fails if a JSON object key is not a valid path key.
    pub(crate) fn from_spec(
        path: Path,
        spec: &ModelSpec,
        config: &StoreConfig,
    ) -> Result<Self, PathError> {
        match spec {
            ModelSpec::Tree(json) => Self::from_json(path, json),
            ModelSpec::Computed(spec) => {
                let mut model = Self::blank(path);
                model.computed = Some(ComputedModel::new(spec, &config.computed_defaults));
                Ok(model)
            }
        }
    }

    fn from_json(path: Path, json: &Json) -> Result<Self, PathError> {
        let mut model = Self::blank(path);
        match json {
            Json::Object(map) => {
                for (key, child) in map {
                    if !is_valid_key(key) {
                        return Err(PathError::invalid(
                            model.path.child(key).to_string(),
                            "model keys must match [A-Za-z0-9_]+",
                        ));
                    }
                    let child_path = model.path.child(key);
                    model
                        .children
                        .insert(key.clone(), Self::from_json(child_path, child)?);
                }
            }
            other => model.value = Some(Value::Json(other.clone())),
        }
        Ok(model)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored value. Computed models report their cache.
    pub fn value(&self) -> Option<&Value> {
        match &self.computed {
            Some(computed) => computed.cached(),
            None => self.value.as_ref(),
        }
    }

    pub fn child(&self, key: &str) -> Option<&Model> {
        self.children.get(key)
    }

    pub fn children(&self) -> impl Iterator<Item = &Model> {
        self.children.values()
    }

    pub fn child_keys(&self) -> Vec<String> {
        self.children.keys().cloned().collect()
    }

    pub fn is_computed(&self) -> bool {
        self.computed.is_some()
    }

    pub fn computed(&self) -> Option<&ComputedModel> {
        self.computed.as_ref()
    }

    /// Find the descendant at `path` (terminal marker ignored).
    pub fn find(&self, path: &Path) -> Option<&Model> {
        let mut model = self;
        for key in path.keys() {
            model = model.children.get(key)?;
        }
        Some(model)
    }

    pub(crate) fn find_mut(&mut self, path: &Path) -> Option<&mut Model> {
        let mut model = self;
        for key in path.keys() {
            model = model.children.get_mut(key)?;
        }
        Some(model)
    }

    /// Move this subtree to `path`, rewriting every descendant path.
    pub(crate) fn rebase(&mut self, path: Path) {
        self.key = path.key().unwrap_or_default().to_string();
        for (key, child) in self.children.iter_mut() {
            child.rebase(path.child(key));
        }
        self.path = path;
    }

    /// Paths of the computed models in this subtree.
    pub(crate) fn computed_paths(&self) -> Vec<Path> {
        let mut paths = Vec::new();
        self.collect_computed(&mut paths);
        paths
    }

    fn collect_computed(&self, out: &mut Vec<Path>) {
        if self.computed.is_some() {
            out.push(self.path.clone());
        }
        for child in self.children.values() {
            child.collect_computed(out);
        }
    }

    /// JSON snapshot of this subtree. Models with children render as
    /// objects (with their own value under `"$"`, if any); computed models
    /// render their cache.
    pub fn to_json(&self) -> Json {
        if self.children.is_empty() {
            return self.value().map(Value::to_json).unwrap_or(Json::Null);
        }
        let mut map = serde_json::Map::new();
        if let Some(value) = self.value() {
            map.insert("$".to_string(), value.to_json());
        }
        for (key, child) in &self.children {
            map.insert(key.clone(), child.to_json());
        }
        Json::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    #[test]
    fn test_from_json_builds_children() {
        let model = Model::from_spec(
            p("x"),
            &ModelSpec::tree(json!({"y": 1, "z": {"w": "deep"}})),
            &StoreConfig::default(),
        )
        .unwrap();
        assert_eq!(model.child_keys(), vec!["y".to_string(), "z".to_string()]);
        let deep = model.find(&p("z.w")).unwrap();
        assert_eq!(deep.path(), &p("x.z.w"));
        assert_eq!(deep.value(), Some(&Value::from("deep")));
    }

    #[test]
    fn test_rebase_rewrites_descendants() {
        let mut model = Model::from_spec(
            p("a.b"),
            &ModelSpec::tree(json!({"c": {"d": 1}})),
            &StoreConfig::default(),
        )
        .unwrap();
        model.rebase(p("x"));
        assert_eq!(model.key(), "x");
        assert_eq!(model.find(&p("c.d")).unwrap().path(), &p("x.c.d"));
    }

    #[test]
    fn test_invalid_json_key_is_rejected() {
        let result = Model::from_spec(
            p("a"),
            &ModelSpec::tree(json!({"not-a-key": 1})),
            &StoreConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_to_json_snapshot() {
        let mut model = Model::from_spec(
            p("a"),
            &ModelSpec::tree(json!({"b": [1, 2], "c": null})),
            &StoreConfig::default(),
        )
        .unwrap();
        model.value = Some(Value::from(5));
        assert_eq!(model.to_json(), json!({"$": 5, "b": [1, 2], "c": null}));
    }
}
