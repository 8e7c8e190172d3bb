//! Model path parsing and manipulation.
//!
//! Paths are dot-separated strings like "vessel.engine.rpm". Two terminal
//! markers select what a path refers to:
//! - `$` - the value held by the model at the preceding path ("a.b.$")
//! - `*` - any direct child of the model at the preceding path ("a.b.*")
//!
//! A path without a marker refers to the model itself. The `<` operator
//! mirrors its operands, so "a<b" is the same path as "b.a".
//!
//! Paths are immutable: every operation returns a new path.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::PathError;

/// A single token of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// A model key (`[A-Za-z0-9_]+`).
    Key(String),
    /// The `$` value marker.
    Value,
    /// The `*` field marker.
    Field,
}

impl Segment {
    fn parse(token: &str, raw: &str) -> Result<Self, PathError> {
        match token {
            "$" => Ok(Segment::Value),
            "*" => Ok(Segment::Field),
            "" => Err(PathError::invalid(raw, "empty segment")),
            key if key.chars().all(is_key_char) => Ok(Segment::Key(key.to_string())),
            _ => Err(PathError::invalid(
                raw,
                "markers '*' and '$' must be a segment of their own",
            )),
        }
    }

    /// Returns true for the `$` and `*` markers.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Segment::Key(_))
    }

    /// The key of a key segment.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Segment::Key(key) => Some(key),
            _ => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => f.write_str(key),
            Segment::Value => f.write_str("$"),
            Segment::Field => f.write_str("*"),
        }
    }
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// True if `key` is usable as a model key.
pub(crate) fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(is_key_char)
}

fn is_path_char(c: char) -> bool {
    is_key_char(c) || matches!(c, '.' | '*' | '$' | '<')
}

/// A parsed model path.
///
/// The empty path addresses the root model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// The root path (no segments).
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a path string.
    ///
    /// Fails if the string contains characters outside `[A-Za-z0-9_.*$<]`,
    /// has an empty segment (`..`, a leading or trailing `.`, an empty `<`
    /// operand), or places a marker anywhere but as the final segment.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Ok(Self::root());
        }
        if !raw.chars().all(is_path_char) {
            return Err(PathError::invalid(
                raw,
                "contains characters outside [A-Za-z0-9_.*$<]",
            ));
        }
        if raw.contains("..") {
            return Err(PathError::invalid(raw, "contains '..'"));
        }
        if raw.ends_with('.') {
            return Err(PathError::invalid(raw, "ends with '.'"));
        }

        // '.' binds tighter than '<': "a.b<c" is "c.a.b"
        let mut segments = Vec::new();
        for operand in raw.split('<').rev() {
            if operand.is_empty() {
                return Err(PathError::invalid(raw, "empty '<' operand"));
            }
            for token in operand.split('.') {
                segments.push(Segment::parse(token, raw)?);
            }
        }

        let last = segments.len() - 1;
        if segments[..last].iter().any(Segment::is_terminal) {
            return Err(PathError::invalid(
                raw,
                "markers '*' and '$' may only appear as the final segment",
            ));
        }

        Ok(Self { segments })
    }

    /// The path of the child `key` of this model path.
    pub(crate) fn child(&self, key: &str) -> Self {
        let mut segments = self.ignore_terminal().segments;
        segments.push(Segment::Key(key.to_string()));
        Self { segments }
    }

    /// Get the path segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Iterate over the key segments, skipping any terminal marker.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(Segment::as_key)
    }

    /// Number of segments, including a terminal marker.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True for the root path.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True if the path ends with `$` or `*`.
    pub fn is_terminal(&self) -> bool {
        self.segments.last().is_some_and(Segment::is_terminal)
    }

    /// True if the path ends with `$`.
    pub fn is_value(&self) -> bool {
        self.segments.last() == Some(&Segment::Value)
    }

    /// True if the path ends with `*`.
    pub fn is_field(&self) -> bool {
        self.segments.last() == Some(&Segment::Field)
    }

    /// The last key of the model this path refers to.
    pub fn key(&self) -> Option<&str> {
        self.keys().last()
    }

    /// The model path of the parent of the model this path refers to.
    ///
    /// Returns `None` for the root.
    pub fn parent(&self) -> Option<Path> {
        let mut segments = self.ignore_terminal().segments;
        segments.pop()?;
        Some(Self { segments })
    }

    /// Drop the first segment. The root path advances to itself.
    pub fn advance(&self) -> Path {
        Self {
            segments: self.segments.iter().skip(1).cloned().collect(),
        }
    }

    /// Concatenate `other` onto this path.
    ///
    /// Fails if this path already ends with a terminal marker.
    pub fn append(&self, other: &Path) -> Result<Path, PathError> {
        if self.is_terminal() {
            return Err(PathError::invalid(
                format!("{}.{}", self, other),
                "cannot append past a terminal marker",
            ));
        }
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Ok(Self { segments })
    }

    /// Strip a literal prefix, returning the remainder.
    pub fn resolve_path(&self, prefix: &Path) -> Result<Path, PathError> {
        if self.segments.starts_with(&prefix.segments) {
            Ok(Self {
                segments: self.segments[prefix.len()..].to_vec(),
            })
        } else {
            Err(PathError::invalid(
                self.to_string(),
                "does not start with the given prefix",
            ))
        }
    }

    /// Check if this path starts with a given prefix.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.resolve_path(prefix).is_ok()
    }

    /// Check if this path ends with a given suffix.
    pub fn ends_with(&self, suffix: &Path) -> bool {
        self.segments.ends_with(&suffix.segments)
    }

    /// The same path without its terminal marker.
    pub fn ignore_terminal(&self) -> Path {
        let mut segments = self.segments.clone();
        if self.is_terminal() {
            segments.pop();
        }
        Self { segments }
    }

    /// The `$` path of the model this path refers to.
    pub fn to_value_path(&self) -> Path {
        let mut path = self.ignore_terminal();
        path.segments.push(Segment::Value);
        path
    }

    /// The model path this path refers to.
    pub fn to_model_path(&self) -> Path {
        self.ignore_terminal()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

impl TryFrom<&str> for Path {
    type Error = PathError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Path::parse(s)
    }
}

impl TryFrom<String> for Path {
    type Error = PathError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Path::parse(&s)
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Path::parse(&raw).map_err(de::Error::custom)
    }
}

/// Anything the store accepts as a path: strings are parsed, paths cloned.
pub trait IntoPath {
    fn into_path(self) -> Result<Path, PathError>;
}

impl IntoPath for Path {
    fn into_path(self) -> Result<Path, PathError> {
        Ok(self)
    }
}

impl IntoPath for &Path {
    fn into_path(self) -> Result<Path, PathError> {
        Ok(self.clone())
    }
}

impl IntoPath for &str {
    fn into_path(self) -> Result<Path, PathError> {
        Path::parse(self)
    }
}

impl IntoPath for String {
    fn into_path(self) -> Result<Path, PathError> {
        Path::parse(&self)
    }
}

impl IntoPath for &String {
    fn into_path(self) -> Result<Path, PathError> {
        Path::parse(self)
    }
}
