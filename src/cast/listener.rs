//! Row listener and document boundary detection
//!
//! Rows arrive one at a time. Control columns set the coordinates of the
//! object being filled, every other column is merged into its body. When the
//! coordinates of an incoming row differ from those of the document being
//! accumulated, that document is complete and goes to the sink.
//!
//! Two objects are kept: `prev` carries the coordinates of the document under
//! construction and `current` carries its body plus the coordinates of the
//! latest row. Consecutive rows with equal coordinates therefore fold into one
//! document, which is how denormalized join results become nested documents.
//! Rows must arrive ordered by their coordinates; only neighbouring rows are
//! compared.
//!
//! Rows with a `_source` column bypass merging: the parsed JSON becomes the
//! body and the object is emitted immediately.

use crate::cast::digest::DocumentDigest;
use crate::cast::object::StructuredObject;
use crate::cast::path::{merge, tree_from_json};
use crate::cast::sink::{Action, Sink, SinkCounters};
use crate::error::{CastError, Result};
use crate::types::{CastConfig, Cell, ControlKey, MetaKey, OpType};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Folds an ordered stream of rows into documents.
///
/// One listener serves one extraction pass; parallel passes need their own.
pub struct RowListener<S: Sink> {
    config: CastConfig,
    keys: Vec<String>,
    current: StructuredObject,
    prev: StructuredObject,
    sink: S,
    digest: Option<DocumentDigest>,
    counters: SinkCounters,
}

impl<S: Sink> RowListener<S> {
    pub fn new(sink: S, config: CastConfig) -> Self {
        let digest = config.digest.map(DocumentDigest::new);
        RowListener {
            config,
            keys: Vec::new(),
            current: StructuredObject::new(),
            prev: StructuredObject::new(),
            sink,
            digest,
            counters: SinkCounters::default(),
        }
    }

    /// Set the column names for the following rows
    pub fn keys<I, K>(&mut self, keys: I) -> &mut Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Process one row, emitting the previous document on a boundary
    pub fn values(&mut self, row: Vec<Cell>) -> Result<&mut Self> {
        if row.len() != self.keys.len() {
            return Err(CastError::InvalidSource(format!(
                "row has {} cells but {} columns were declared",
                row.len(),
                self.keys.len()
            )));
        }
        let mut has_source = false;

        for (key, cell) in self.keys.iter().zip(row.iter()) {
            if cell.is_null() {
                continue;
            }
            match ControlKey::parse(key) {
                Some(ControlKey::OpType) => self.current.optype = Some(cell.to_string()),
                Some(ControlKey::Index) => self.current.index = Some(cell.to_string()),
                Some(ControlKey::Type) => self.current.doc_type = Some(cell.to_string()),
                Some(ControlKey::Id) => self.current.set_id(cell.to_string()),
                Some(ControlKey::Meta(meta)) => {
                    self.current.meta.insert(meta, cell.to_string());
                }
                Some(ControlKey::Source) => match source_object(cell) {
                    Some(obj) => {
                        if !self.current.source.is_empty() {
                            // body of the document held by `prev` is replaced, not emitted
                            warn!(
                                id = self.prev.id.as_deref().unwrap_or(""),
                                "`_source` row replaces an accumulated document body"
                            );
                            self.counters.discarded += 1;
                            self.prev = StructuredObject::new();
                        }
                        self.current.source = tree_from_json(obj);
                        has_source = true;
                    }
                    None => warn!(column = %key, "ignoring `_source` value that is not a JSON object"),
                },
                None => {}
            }
        }

        if has_source {
            let object = std::mem::take(&mut self.current);
            self.emit(object)?;
            return Ok(self);
        }

        if !self.current.same_identity(&self.prev) || self.current.is_empty() {
            debug!(
                id = self.prev.id.as_deref().unwrap_or(""),
                next = self.current.id.as_deref().unwrap_or(""),
                "document boundary"
            );
            // body accumulated so far belongs to the coordinates held by `prev`
            let source = std::mem::take(&mut self.current.source);
            let mut finished = std::mem::replace(&mut self.prev, std::mem::take(&mut self.current));
            finished.source = source;
            self.emit(finished)?;
        }

        for (key, cell) in self.keys.iter().zip(row) {
            if cell.is_null() && self.config.ignore_null {
                continue;
            }
            let value = if self.config.detect_json { sub_parse(cell) } else { cell };
            merge(&mut self.current.source, key, value)?;
        }

        Ok(self)
    }

    /// Flush the document still being accumulated
    pub fn end(&mut self) -> Result<()> {
        let mut finished = std::mem::take(&mut self.prev);
        finished.source = std::mem::take(&mut self.current.source);
        self.current = StructuredObject::new();
        self.emit(finished)
    }

    /// Drop any partial document without emitting it
    pub fn reset(&mut self) {
        self.current = StructuredObject::new();
        self.prev = StructuredObject::new();
    }

    /// Prepare for a new fetch run: clear state, digest and counters
    pub fn begin(&mut self) {
        self.reset();
        if let Some(digest) = self.digest.as_mut() {
            digest.reset();
        }
        self.counters = SinkCounters::default();
    }

    /// Base64 digest of everything emitted since the last [`begin`](Self::begin)
    pub fn digest(&self) -> Option<String> {
        self.digest.as_ref().map(DocumentDigest::finish)
    }

    pub fn counters(&self) -> SinkCounters {
        self.counters
    }

    pub fn config(&self) -> &CastConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn emit(&mut self, mut object: StructuredObject) -> Result<()> {
        if object.source.is_empty() {
            if !object.is_empty() {
                debug!(id = object.id.as_deref().unwrap_or(""), "discarding document without body");
                self.counters.discarded += 1;
            }
            return Ok(());
        }

        // fail on a bad `_optype` before anything is fed to the digest
        object.op_type()?;
        if let Some(version) = self.config.version {
            object
                .meta
                .entry(MetaKey::Version)
                .or_insert_with(|| version.to_string());
        }

        let document = object.build(self.digest.as_mut())?;
        debug!(
            op = document.op.as_str(),
            index = document.index.as_deref().unwrap_or(""),
            id = document.id.as_deref().unwrap_or(""),
            "emitting document"
        );

        let action = match document.op {
            OpType::Index => {
                self.sink.index(document, false)?;
                Action::Index
            }
            OpType::Create => {
                self.sink.index(document, true)?;
                Action::Create
            }
            OpType::Delete => {
                self.sink.delete(document)?;
                Action::Delete
            }
            OpType::Update => {
                self.sink.update(document)?;
                Action::Update
            }
        };
        self.counters.record(action);
        Ok(())
    }
}

/// JSON object carried by a `_source` cell
fn source_object(cell: &Cell) -> Option<Map<String, Value>> {
    match cell {
        Cell::Json(Value::Object(obj)) => Some(obj.clone()),
        Cell::Text(text) => serde_json::from_str(text).ok(),
        _ => None,
    }
}

/// Use a text cell's parsed JSON object when it has one, the raw cell otherwise
fn sub_parse(cell: Cell) -> Cell {
    let Cell::Text(text) = &cell else {
        return cell;
    };
    if !text.trim_start().starts_with('{') {
        return cell;
    }
    match serde_json::from_str::<Map<String, Value>>(text) {
        Ok(obj) if !obj.is_empty() => Cell::Json(Value::Object(obj)),
        _ => cell,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::digest::DigestAlgorithm;
    use crate::cast::object::Document;
    use crate::cast::sink::MemorySink;
    use serde_json::json;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn listener(keys: &[&str]) -> RowListener<MemorySink> {
        let mut listener = RowListener::new(MemorySink::new(), CastConfig::default());
        listener.keys(keys.iter().copied());
        listener
    }

    #[test]
    fn test_nested_objects() {
        let mut listener = listener(&[
            "_id",
            "person.salary",
            "person.name",
            "person.position.name",
            "person.position.since",
        ]);
        listener
            .values(vec![
                Cell::Integer(1),
                text("$1000"),
                text("Joe Doe"),
                text("Worker"),
                text("2012-06-12"),
            ])
            .unwrap();
        listener.end().unwrap();

        let sink = listener.into_sink();
        assert_eq!(sink.documents.len(), 1);
        let (action, document) = &sink.documents[0];
        assert_eq!(*action, Action::Index);
        assert_eq!(document.id.as_deref(), Some("1"));
        assert_eq!(
            serde_json::to_string(&document.source).unwrap(),
            r#"{"person":{"salary":"$1000","name":"Joe Doe","position":{"name":"Worker","since":"2012-06-12"}}}"#
        );
    }

    #[test]
    fn test_square_brackets() {
        let mut listener = listener(&["_id", "a.b[id]", "a.b[label]"]);
        listener
            .values(vec![text("1"), Cell::Integer(1), text("X")])
            .unwrap()
            .values(vec![text("1"), Cell::Integer(2), text("Y")])
            .unwrap();
        listener.end().unwrap();

        let sink = listener.into_sink();
        assert_eq!(sink.documents.len(), 1);
        assert_eq!(
            sink.documents[0].1.source_value(),
            json!({"a": {"b": [{"id": 1, "label": "X"}, {"id": 2, "label": "Y"}]}})
        );
    }

    #[test]
    fn test_sequence_values() {
        let mut listener = listener(&["_id", "person.name[]"]);
        listener.values(vec![text("1"), text("Joe,John")]).unwrap();
        listener.end().unwrap();

        let sink = listener.into_sink();
        assert_eq!(
            sink.documents[0].1.source_value(),
            json!({"person": {"name": ["Joe", "John"]}})
        );
    }

    #[test]
    fn test_optype_boundaries() {
        let mut listener = listener(&["_optype", "_id", "name"]);
        for (op, id) in [("index", "1"), ("create", "2"), ("delete", "3"), ("index", "4")] {
            listener.values(vec![text(op), text(id), text("x")]).unwrap();
        }
        listener.end().unwrap();

        let counters = listener.counters();
        let sink = listener.into_sink();
        assert_eq!(sink.documents.len(), 4);
        assert_eq!(sink.count(Action::Index), 2);
        assert_eq!(sink.count(Action::Create), 1);
        assert_eq!(sink.count(Action::Delete), 1);

        let ids: Vec<&str> = sink
            .documents
            .iter()
            .map(|(_, d)| d.id.as_deref().unwrap_or(""))
            .collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
        assert_eq!(counters.emitted(), 4);
    }

    #[test]
    fn test_rows_with_same_id_fold_into_one_document() {
        let mut listener = listener(&["_id", "name", "tags"]);
        listener.values(vec![text("1"), text("Joe"), text("a")]).unwrap();
        listener.values(vec![text("1"), text("Joe"), text("b")]).unwrap();
        listener.values(vec![text("2"), text("Ann"), text("a")]).unwrap();
        listener.end().unwrap();

        let sink = listener.into_sink();
        assert_eq!(sink.documents.len(), 2);
        assert_eq!(sink.documents[0].1.source_value(), json!({"name": "Joe", "tags": ["a", "b"]}));
        assert_eq!(sink.documents[1].1.source_value(), json!({"name": "Ann", "tags": "a"}));
    }

    #[test]
    fn test_null_suppressed_by_later_value() {
        let mut listener = listener(&["_id", "name"]);
        listener.values(vec![text("1"), Cell::Null]).unwrap();
        listener.values(vec![text("1"), text("Joe")]).unwrap();
        listener.values(vec![text("1"), Cell::Null]).unwrap();
        listener.end().unwrap();

        let sink = listener.into_sink();
        assert_eq!(sink.documents[0].1.source_value(), json!({"name": "Joe"}));
    }

    #[test]
    fn test_ignore_null() {
        let config = CastConfig {
            ignore_null: true,
            ..CastConfig::default()
        };
        let mut listener = RowListener::new(MemorySink::new(), config);
        listener.keys(["_id", "name", "age"]);
        listener.values(vec![text("1"), text("Joe"), Cell::Null]).unwrap();
        listener.end().unwrap();

        let sink = listener.into_sink();
        assert_eq!(sink.documents[0].1.source_value(), json!({"name": "Joe"}));
    }

    #[test]
    fn test_json_sub_parse() {
        let mut listener = listener(&["_id", "data", "note"]);
        listener
            .values(vec![text("1"), text(r#"{"a": {"b": 1}}"#), text("{not json")])
            .unwrap();
        listener.end().unwrap();

        let sink = listener.into_sink();
        assert_eq!(
            sink.documents[0].1.source_value(),
            json!({"data": {"a": {"b": 1}}, "note": "{not json"})
        );
    }

    #[test]
    fn test_source_column_emits_immediately() {
        let mut listener = listener(&["_id", "_source"]);
        listener
            .values(vec![text("1"), text(r#"{"name": "Joe", "jobs": [{"t": "dev"}]}"#)])
            .unwrap();
        assert_eq!(listener.sink().documents.len(), 1);

        listener.end().unwrap();
        let sink = listener.into_sink();
        assert_eq!(sink.documents.len(), 1);
        assert_eq!(sink.documents[0].1.id.as_deref(), Some("1"));
        assert_eq!(
            sink.documents[0].1.source_value(),
            json!({"name": "Joe", "jobs": [{"t": "dev"}]})
        );
    }

    #[test]
    fn test_meta_columns_routed() {
        let mut listener = listener(&["_index", "_type", "_id", "_routing", "_version", "name"]);
        listener
            .values(vec![text("people"), text("person"), text("1"), text("r"), Cell::Integer(3), text("Joe")])
            .unwrap();
        listener.end().unwrap();

        let sink = listener.into_sink();
        let document = &sink.documents[0].1;
        assert_eq!(document.index.as_deref(), Some("people"));
        assert_eq!(document.doc_type.as_deref(), Some("person"));
        assert_eq!(document.meta(MetaKey::Routing), Some("r"));
        assert_eq!(document.meta(MetaKey::Version), Some("3"));
        assert_eq!(document.source_value(), json!({"name": "Joe"}));
    }

    #[test]
    fn test_run_version_stamped() {
        let config = CastConfig {
            version: Some(42),
            ..CastConfig::default()
        };
        let mut listener = RowListener::new(MemorySink::new(), config);
        listener.keys(["_id", "name"]);
        listener.values(vec![text("1"), text("Joe")]).unwrap();
        listener.end().unwrap();

        let sink = listener.into_sink();
        assert_eq!(sink.documents[0].1.meta(MetaKey::Version), Some("42"));
    }

    #[test]
    fn test_document_without_body_is_discarded() {
        let mut listener = listener(&["_optype", "_id"]);
        listener.values(vec![text("delete"), text("1")]).unwrap();
        listener.end().unwrap();

        assert_eq!(listener.counters().discarded, 1);
        assert!(listener.sink().documents.is_empty());
    }

    #[test]
    fn test_unknown_optype_is_fatal() {
        let mut listener = listener(&["_optype", "_id", "name"]);
        listener.values(vec![text("upsert"), text("1"), text("x")]).unwrap();
        let err = listener.end().unwrap_err();
        assert!(matches!(err, CastError::UnknownOperation(op) if op == "upsert"));
    }

    #[test]
    fn test_conflict_aborts() {
        let mut listener = listener(&["_id", "a.b", "a.b.c"]);
        let err = listener
            .values(vec![text("1"), text("x"), text("y")])
            .err()
            .unwrap();
        assert!(matches!(err, CastError::Conflict { prefix } if prefix == "a.b"));
    }

    #[test]
    fn test_digest_spans_documents() {
        let config = CastConfig {
            digest: Some(DigestAlgorithm::Sha256),
            ..CastConfig::default()
        };
        let mut listener = RowListener::new(MemorySink::new(), config);
        listener.keys(["_id", "name"]);
        listener.values(vec![text("1"), text("Joe")]).unwrap();
        listener.values(vec![text("2"), text("Ann")]).unwrap();
        listener.end().unwrap();

        let mut expected = DocumentDigest::new(DigestAlgorithm::Sha256);
        for part in ["name", "Joe", "name", "Ann"] {
            expected.update(part);
        }
        assert_eq!(listener.digest(), Some(expected.finish()));

        listener.begin();
        assert_eq!(
            listener.digest(),
            Some(DocumentDigest::new(DigestAlgorithm::Sha256).finish())
        );
    }
    #[test]
    fn test_row_width_must_match_columns() {
        let mut listener = listener(&["_id", "name", "age"]);
        let short = listener.values(vec![text("1"), text("Joe")]).err().unwrap();
        assert!(matches!(short, CastError::InvalidSource(_)));

        let long = listener
            .values(vec![text("2"), text("Ann"), Cell::Integer(3), text("extra")])
            .err()
            .unwrap();
        assert!(matches!(long, CastError::InvalidSource(_)));

        listener.end().unwrap();
        assert!(listener.sink().documents.is_empty());
    }

    #[test]
    fn test_update_optype_reaches_sink() {
        let mut listener = listener(&["_optype", "_id", "name"]);
        listener.values(vec![text("update"), text("1"), text("Joe")]).unwrap();
        listener.end().unwrap();

        assert_eq!(listener.counters().updated, 1);
        let sink = listener.into_sink();
        assert_eq!(sink.count(Action::Update), 1);
        assert_eq!(sink.documents[0].1.source_value(), json!({"name": "Joe"}));
    }

    #[test]
    fn test_update_unsupported_by_sink_propagates() {
        struct IndexOnly;
        impl Sink for IndexOnly {
            fn index(&mut self, _document: Document, _create: bool) -> Result<()> {
                Ok(())
            }
            fn delete(&mut self, _document: Document) -> Result<()> {
                Ok(())
            }
        }

        let mut listener = RowListener::new(IndexOnly, CastConfig::default());
        listener.keys(["_optype", "_id", "name"]);
        listener.values(vec![text("update"), text("1"), text("Joe")]).unwrap();
        let err = listener.end().unwrap_err();
        assert!(matches!(err, CastError::UnsupportedOperation("update")));
        assert_eq!(listener.counters().updated, 0);
    }

    #[test]
    fn test_source_that_is_not_an_object_is_merged_as_a_normal_row() {
        let mut listener = listener(&["_id", "_source", "name"]);
        listener
            .values(vec![text("1"), text("not json"), text("Joe")])
            .unwrap();
        listener.values(vec![text("2"), text("[1, 2]"), text("Ann")]).unwrap();
        listener.end().unwrap();

        let sink = listener.into_sink();
        assert_eq!(sink.documents.len(), 2);
        assert_eq!(sink.documents[0].1.source_value(), json!({"name": "Joe"}));
        assert_eq!(sink.documents[1].1.source_value(), json!({"name": "Ann"}));
    }

    #[test]
    fn test_source_row_replacing_body_is_counted() {
        let mut listener = listener(&["_id", "name", "_source"]);
        listener.values(vec![text("1"), text("Joe"), Cell::Null]).unwrap();
        listener
            .values(vec![text("2"), Cell::Null, text(r#"{"x": 1}"#)])
            .unwrap();
        listener.end().unwrap();

        assert_eq!(listener.counters().discarded, 1);
        let sink = listener.into_sink();
        assert_eq!(sink.documents.len(), 1);
        assert_eq!(sink.documents[0].1.id.as_deref(), Some("2"));
        assert_eq!(sink.documents[0].1.source_value(), json!({"x": 1}));
    }
}
