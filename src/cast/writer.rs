use crate::cast::object::Document;
use crate::cast::sink::Sink;
use crate::error::Result;
use crate::types::{MetaKey, OpType};
use serde_json::{Map, Value};
use std::io::Write;

/// Writes documents as Elasticsearch bulk requests, one action per document
pub struct BulkSink<W: Write> {
    writer: W,
}

impl<W: Write> BulkSink<W> {
    pub fn new(writer: W) -> Self {
        BulkSink { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_action(&mut self, action: &str, document: &Document) -> Result<()> {
        let line = Value::Object(Map::from_iter([(
            action.to_string(),
            Value::Object(action_metadata(document)),
        )]));
        serde_json::to_writer(&mut self.writer, &line)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn write_line(&mut self, value: &Value) -> Result<()> {
        serde_json::to_writer(&mut self.writer, value)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Coordinates and routing metadata of the bulk action line
fn action_metadata(document: &Document) -> Map<String, Value> {
    let mut meta = Map::new();
    if let Some(index) = &document.index {
        meta.insert("_index".to_string(), Value::String(index.clone()));
    }
    if let Some(doc_type) = &document.doc_type {
        meta.insert("_type".to_string(), Value::String(doc_type.clone()));
    }
    if let Some(id) = &document.id {
        meta.insert("_id".to_string(), Value::String(id.clone()));
    }

    for (key, name) in [
        (MetaKey::Routing, "routing"),
        (MetaKey::Parent, "parent"),
        (MetaKey::Timestamp, "timestamp"),
        (MetaKey::Ttl, "ttl"),
    ] {
        if let Some(value) = document.meta(key) {
            meta.insert(name.to_string(), Value::String(value.to_string()));
        }
    }

    if let Some(version) = document.meta(MetaKey::Version) {
        let value = version
            .parse::<i64>()
            .map_or_else(|_| Value::String(version.to_string()), |v| Value::Number(v.into()));
        meta.insert("version".to_string(), value);
        meta.insert("version_type".to_string(), Value::String("external".to_string()));
    }
    meta
}

impl<W: Write> Sink for BulkSink<W> {
    fn index(&mut self, document: Document, create: bool) -> Result<()> {
        let action = if create { "create" } else { "index" };
        self.write_action(action, &document)?;
        self.write_line(&document.source_value())
    }

    fn delete(&mut self, document: Document) -> Result<()> {
        self.write_action("delete", &document)
    }

    fn update(&mut self, document: Document) -> Result<()> {
        self.write_action("update", &document)?;
        let body = Value::Object(Map::from_iter([(
            "doc".to_string(),
            document.source_value(),
        )]));
        self.write_line(&body)
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes each document body on its own line, tagged with its coordinates
pub struct NdjsonSink<W: Write> {
    writer: W,
}

impl<W: Write> NdjsonSink<W> {
    pub fn new(writer: W) -> Self {
        NdjsonSink { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_document(&mut self, op: OpType, document: Document) -> Result<()> {
        let mut data = document.source;

        data.insert("_optype".to_string(), Value::String(op.as_str().to_string()));
        if let Some(index) = document.index {
            data.insert("_index".to_string(), Value::String(index));
        }
        if let Some(doc_type) = document.doc_type {
            data.insert("_type".to_string(), Value::String(doc_type));
        }
        if let Some(id) = document.id {
            data.insert("_id".to_string(), Value::String(id));
        }

        serde_json::to_writer(&mut self.writer, &data)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write> Sink for NdjsonSink<W> {
    fn index(&mut self, document: Document, create: bool) -> Result<()> {
        let op = if create { OpType::Create } else { OpType::Index };
        self.write_document(op, document)
    }

    fn delete(&mut self, document: Document) -> Result<()> {
        self.write_document(OpType::Delete, document)
    }

    fn update(&mut self, document: Document) -> Result<()> {
        self.write_document(OpType::Update, document)
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
