use crate::cast::digest::DocumentDigest;
use crate::cast::path::Tree;
use crate::cast::render::render_tree;
use crate::error::{CastError, Result};
use crate::types::{MetaKey, OpType};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A document being assembled from rows
#[derive(Debug, Clone, Default)]
pub struct StructuredObject {
    /// Raw `_optype` value; checked when the document is emitted
    pub optype: Option<String>,
    pub index: Option<String>,
    pub doc_type: Option<String>,
    pub id: Option<String>,
    pub meta: BTreeMap<MetaKey, String>,
    pub source: Tree,
}

impl StructuredObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same destination coordinates (`_optype`, `_index`, `_type`, `_id`).
    ///
    /// Rows are never compared by content.
    pub fn same_identity(&self, other: &StructuredObject) -> bool {
        self.optype == other.optype
            && self.index == other.index
            && self.doc_type == other.doc_type
            && self.id == other.id
    }

    /// Set the id; an empty id counts as absent
    pub fn set_id(&mut self, id: String) {
        self.id = if id.is_empty() { None } else { Some(id) };
    }

    /// No body and no destination coordinates
    pub fn is_empty(&self) -> bool {
        self.source.is_empty() && self.index.is_none() && self.doc_type.is_none() && self.id.is_none()
    }

    /// Parse the `_optype` value; `None` means the default index operation
    pub fn op_type(&self) -> Result<Option<OpType>> {
        let Some(optype) = self.optype.as_deref() else {
            return Ok(None);
        };
        let op = match optype {
            "index" => OpType::Index,
            "create" => OpType::Create,
            "delete" => OpType::Delete,
            "update" => OpType::Update,
            other => return Err(CastError::UnknownOperation(other.to_string())),
        };
        Ok(Some(op))
    }

    /// Render the body and freeze the object into a [`Document`]
    pub fn build(self, digest: Option<&mut DocumentDigest>) -> Result<Document> {
        let op = self.op_type()?.unwrap_or(OpType::Index);
        let source = render_tree(&self.source, digest)?;
        Ok(Document {
            op,
            index: self.index,
            doc_type: self.doc_type,
            id: self.id,
            meta: self.meta,
            source,
        })
    }
}

/// A completed, rendered document ready for a sink
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub op: OpType,
    pub index: Option<String>,
    pub doc_type: Option<String>,
    pub id: Option<String>,
    pub meta: BTreeMap<MetaKey, String>,
    pub source: Map<String, Value>,
}

impl Document {
    pub fn meta(&self, key: MetaKey) -> Option<&str> {
        self.meta.get(&key).map(String::as_str)
    }

    pub fn source_value(&self) -> Value {
        Value::Object(self.source.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::path::merge;
    use crate::types::Cell;
    use serde_json::json;

    #[test]
    fn test_identity_ignores_content() {
        let mut a = StructuredObject::new();
        a.set_id("1".to_string());
        merge(&mut a.source, "name", Cell::from("Joe")).unwrap();

        let mut b = StructuredObject::new();
        b.set_id("1".to_string());
        b.meta.insert(MetaKey::Routing, "r".to_string());

        assert!(a.same_identity(&b));

        b.optype = Some("create".to_string());
        assert!(!a.same_identity(&b));
    }

    #[test]
    fn test_empty_object() {
        let mut object = StructuredObject::new();
        assert!(object.is_empty());

        object.set_id(String::new());
        assert!(object.is_empty());

        object.index = Some("people".to_string());
        assert!(!object.is_empty());
    }

    #[test]
    fn test_unknown_optype() {
        let object = StructuredObject {
            optype: Some("upsert".to_string()),
            ..StructuredObject::default()
        };
        assert!(matches!(
            object.op_type(),
            Err(CastError::UnknownOperation(op)) if op == "upsert"
        ));
    }

    #[test]
    fn test_build_document() {
        let mut object = StructuredObject::new();
        object.optype = Some("create".to_string());
        object.set_id("7".to_string());
        merge(&mut object.source, "person.name", Cell::from("Joe")).unwrap();

        let document = object.build(None).unwrap();
        assert_eq!(document.op, OpType::Create);
        assert_eq!(document.id.as_deref(), Some("7"));
        assert_eq!(document.source_value(), json!({"person": {"name": "Joe"}}));
    }
}
