//! Rendering of document trees to JSON
//!
//! Leaves with one value become scalars, leaves with several become arrays,
//! nested trees become objects and grouped elements become arrays of objects.
//! Key order is insertion order. Every field name and scalar string form is fed
//! to the digest when one is given; embedded JSON objects and arrays are walked
//! so they feed the same sequence as a merged tree of the same shape.

use crate::cast::digest::DocumentDigest;
use crate::cast::path::{Node, Tree};
use crate::cast::values::Values;
use crate::error::{CastError, Result};
use crate::types::Cell;
use serde_json::{Map, Number, Value};

/// Render a tree into a JSON object
pub fn render_tree(tree: &Tree, mut digest: Option<&mut DocumentDigest>) -> Result<Map<String, Value>> {
    let mut obj = Map::new();
    for (key, node) in tree {
        if let Some(d) = digest.as_deref_mut() {
            d.update(key);
        }
        let value = render_node(node, digest.as_deref_mut())?;
        obj.insert(key.clone(), value);
    }
    Ok(obj)
}

/// Render a single node
pub fn render_node(node: &Node, mut digest: Option<&mut DocumentDigest>) -> Result<Value> {
    match node {
        Node::Values(values) => render_values(values, digest),
        Node::Object(tree) => Ok(Value::Object(render_tree(tree, digest)?)),
        Node::Objects(elements) => {
            let mut arr = Vec::with_capacity(elements.len());
            for element in elements {
                arr.push(Value::Object(render_tree(element, digest.as_deref_mut())?));
            }
            Ok(Value::Array(arr))
        }
    }
}

fn render_values(values: &Values, mut digest: Option<&mut DocumentDigest>) -> Result<Value> {
    match values.as_slice() {
        [] => Ok(Value::Null),
        [single] => render_cell(single, digest),
        many => {
            let mut arr = Vec::with_capacity(many.len());
            for cell in many {
                arr.push(render_cell(cell, digest.as_deref_mut())?);
            }
            Ok(Value::Array(arr))
        }
    }
}

fn render_cell(cell: &Cell, digest: Option<&mut DocumentDigest>) -> Result<Value> {
    let value = match cell {
        Cell::Null => Value::Null,
        Cell::Bool(b) => Value::Bool(*b),
        Cell::Integer(i) => Value::Number((*i).into()),
        Cell::Float(x) => Number::from_f64(*x).map_or(Value::Null, Value::Number),
        Cell::Text(s) => Value::String(s.clone()),
        Cell::Json(v) => v.clone(),
        Cell::Binary(_) => return Err(CastError::UnsupportedType(cell.type_name())),
    };
    if let Some(d) = digest {
        match cell {
            Cell::Json(v) => digest_json(v, d),
            _ => d.update(&cell.to_string()),
        }
    }
    Ok(value)
}

/// Feed embedded JSON the way a tree of the same shape is fed
fn digest_json(value: &Value, digest: &mut DocumentDigest) {
    match value {
        Value::Object(obj) => {
            for (key, value) in obj {
                digest.update(key);
                digest_json(value, digest);
            }
        }
        Value::Array(arr) => {
            for value in arr {
                digest_json(value, digest);
            }
        }
        Value::String(s) => digest.update(s),
        other => digest.update(&other.to_string()),
    }
}
