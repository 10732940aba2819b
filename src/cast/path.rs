//! Path-based merging of column values into nested documents
//!
//! Column names are paths. A dot opens a nested object, `name[]` marks a
//! comma-separated multi-value leaf, and `name[sub.path]` makes `name` an
//! array of objects where `sub.path` is merged into the current element.
//!
//! ```text
//! path := (name '.')* leaf
//! leaf := name | name '[]' | name '[' path ']'
//! ```
//!
//! Brackets may only close a path: `a[x].y` is rejected as malformed.
//!
//! A grouped array starts a new element whenever the sub-path is already set
//! in the last element, so consecutive rows that repeat the same sub-key
//! produce one element each.

use crate::cast::values::Values;
use crate::error::{CastError, Result};
use crate::types::{Cell, ControlKey};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::trace;

static GROUPED_SEGMENT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^\[\]]+)\[(.*)\]$").unwrap()
});

/// Nested document under construction; keys keep first-insertion order
pub type Tree = IndexMap<String, Node>;

/// One node of a document tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Leaf field
    Values(Values),
    /// Nested object
    Object(Tree),
    /// Array of objects, built from `name[sub]` paths
    Objects(Vec<Tree>),
}

impl Node {
    /// Build a node from a parsed JSON value (used for `_source` passthrough)
    pub fn from_json(value: Value) -> Node {
        match value {
            Value::Object(obj) => Node::Object(tree_from_json(obj)),
            Value::Array(arr) if !arr.is_empty() && arr.iter().all(Value::is_object) => {
                let elements = arr
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(obj) => Some(tree_from_json(obj)),
                        _ => None,
                    })
                    .collect();
                Node::Objects(elements)
            }
            // scalar arrays stay as one structured value so nothing is deduplicated away
            Value::Array(arr) => Node::Values(Values::single(Cell::Json(Value::Array(arr)))),
            scalar => Node::Values(Values::single(Cell::from(scalar))),
        }
    }
}

/// Convert a JSON object into a document tree
pub fn tree_from_json(obj: Map<String, Value>) -> Tree {
    obj.into_iter()
        .map(|(key, value)| (key, Node::from_json(value)))
        .collect()
}

/// A single parsed path segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Plain(&'a str),
    /// `name[]`
    Sequence(&'a str),
    /// `name[sub]`
    Grouped { name: &'a str, sub: &'a str },
}

impl<'a> Segment<'a> {
    fn parse(full: &str, segment: &'a str) -> Result<Self> {
        if !segment.contains(&['[', ']'][..]) {
            return Ok(Segment::Plain(segment));
        }
        let Some(captures) = GROUPED_SEGMENT_REGEX.captures(segment) else {
            return Err(malformed(full, "brackets must follow a field name and close the segment"));
        };
        let (Some(name), Some(sub)) = (captures.get(1), captures.get(2)) else {
            return Err(malformed(full, "brackets must follow a field name and close the segment"));
        };
        if sub.as_str().is_empty() {
            Ok(Segment::Sequence(name.as_str()))
        } else {
            Ok(Segment::Grouped {
                name: name.as_str(),
                sub: sub.as_str(),
            })
        }
    }
}

fn malformed(path: &str, reason: &'static str) -> CastError {
    CastError::MalformedPath {
        path: path.to_string(),
        reason,
    }
}

fn conflict(prefix: String) -> CastError {
    CastError::Conflict { prefix }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// Split a path at its first dot outside of brackets
fn split_head<'a>(full: &str, path: &'a str) -> Result<(&'a str, Option<&'a str>)> {
    let mut depth = 0usize;
    let mut split_at = None;

    for (i, c) in path.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| malformed(full, "unbalanced `]`"))?;
            }
            '.' if depth == 0 && split_at.is_none() => split_at = Some(i),
            _ => {}
        }
    }
    if depth != 0 {
        return Err(malformed(full, "unbalanced `[`"));
    }

    let (head, tail) = match split_at {
        Some(i) => (&path[..i], Some(&path[i + 1..])),
        None => (path, None),
    };
    if head.is_empty() || tail.is_some_and(str::is_empty) {
        return Err(malformed(full, "empty path segment"));
    }
    Ok((head, tail))
}

/// Merge one `(path, value)` pair into `tree`.
///
/// Control columns are ignored here; they are routed onto the document's
/// metadata by the listener.
pub fn merge(tree: &mut Tree, path: &str, value: Cell) -> Result<()> {
    if ControlKey::is_control(path) {
        return Ok(());
    }
    trace!(path, "merging value");
    merge_at(tree, path, path, value, "")
}

fn merge_at(tree: &mut Tree, full: &str, path: &str, value: Cell, prefix: &str) -> Result<()> {
    let (head, tail) = split_head(full, path)?;

    match (Segment::parse(full, head)?, tail) {
        (Segment::Plain(name), None) => merge_leaf(tree, name, value, false, prefix),
        (Segment::Sequence(name), None) => merge_leaf(tree, name, value, true, prefix),
        (Segment::Plain(name), Some(tail)) => {
            let prefix = join(prefix, name);
            let child = tree
                .entry(name.to_string())
                .or_insert_with(|| Node::Object(Tree::new()));
            match child {
                Node::Object(inner) => merge_at(inner, full, tail, value, &prefix),
                _ => Err(conflict(prefix)),
            }
        }
        (Segment::Grouped { name, sub }, None) => {
            let prefix = join(prefix, name);
            let node = tree
                .entry(name.to_string())
                .or_insert_with(|| Node::Objects(Vec::new()));
            let Node::Objects(elements) = node else {
                return Err(conflict(prefix));
            };

            let start_new = elements.last().map_or(true, |last| has_leaf(last, sub));
            if start_new {
                elements.push(Tree::new());
            }
            let last = elements.len() - 1;
            merge_at(&mut elements[last], full, sub, value, &prefix)
        }
        (Segment::Sequence(_) | Segment::Grouped { .. }, Some(_)) => {
            Err(malformed(full, "brackets may only appear on the last segment"))
        }
    }
}

fn merge_leaf(tree: &mut Tree, name: &str, value: Cell, expand: bool, prefix: &str) -> Result<()> {
    match tree.get_mut(name) {
        None => {
            tree.insert(name.to_string(), Node::Values(Values::append(None, value, expand)));
        }
        Some(Node::Values(values)) => {
            let existing = std::mem::take(values);
            *values = Values::append(Some(existing), value, expand);
        }
        Some(_) => return Err(conflict(join(prefix, name))),
    }
    Ok(())
}

/// Whether a leaf is already stored at `path` inside `tree`
fn has_leaf(tree: &Tree, path: &str) -> bool {
    let Ok((head, tail)) = split_head(path, path) else {
        return false;
    };
    let Ok(segment) = Segment::parse(path, head) else {
        return false;
    };

    match (segment, tail) {
        (Segment::Plain(name) | Segment::Sequence(name), None) => tree.contains_key(name),
        (Segment::Plain(name), Some(tail)) => match tree.get(name) {
            Some(Node::Object(inner)) => has_leaf(inner, tail),
            _ => false,
        },
        (Segment::Grouped { name, sub }, None) => match tree.get(name) {
            Some(Node::Objects(elements)) => elements.last().is_some_and(|last| has_leaf(last, sub)),
            _ => false,
        },
        _ => false,
    }
}
