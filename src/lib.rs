//! # Rowcast - Rows to Documents
//!
//! Folds the flat rows of a relational query back into nested JSON documents
//! ready for a document store.
//!
//! ## Column paths
//!
//! - `person.name` nests `name` inside a `person` object
//! - `person.name[]` splits a comma-separated cell into an array
//! - `person.jobs[title]` builds an array of objects; repeating a sub-key
//!   starts a new element
//! - `_id`, `_index`, `_type`, `_optype`, `_version`, `_routing`, `_parent`,
//!   `_timestamp`, `_ttl`, `_job`, `_percolate` and `_source` are control
//!   columns and never reach the document body
//!
//! Consecutive rows with the same `_optype`/`_index`/`_type`/`_id` fold into one
//! document.
//!
//! ## Quick Start
//!
//! ```rust
//! use rowcast::{CastConfig, Cell, MemorySink, RowListener};
//! use serde_json::json;
//!
//! # fn main() -> rowcast::Result<()> {
//! let mut listener = RowListener::new(MemorySink::new(), CastConfig::default());
//! listener.keys(["_id", "person.name", "person.jobs[title]"]);
//! listener.values(vec![Cell::from("1"), Cell::from("Joe"), Cell::from("dev")])?;
//! listener.values(vec![Cell::from("1"), Cell::from("Joe"), Cell::from("ops")])?;
//! listener.end()?;
//!
//! let sink = listener.into_sink();
//! assert_eq!(
//!     sink.documents[0].1.source_value(),
//!     json!({"person": {"name": "Joe", "jobs": [{"title": "dev"}, {"title": "ops"}]}})
//! );
//! # Ok(())
//! # }
//! ```

use std::io::BufRead;

pub mod cast;
pub mod error;
pub mod types;

pub use cast::{
    fetch, Action, BulkSink, Document, FetchOutcome, JsonRowSource, MemoryRows, MemorySink,
    NdjsonSink, RowListener, RowSource, Sink, SinkRegistry, StructuredObject,
};
pub use error::{CastError, Result};
pub use types::{CastConfig, Cell, OpType};

/// Main entry point: cast a line-delimited JSON row stream into documents
pub fn cast_rows<R: BufRead, S: Sink>(
    reader: R,
    sink: S,
    config: CastConfig,
    previous_digest: Option<&str>,
) -> Result<(FetchOutcome, S)> {
    let mut source = JsonRowSource::new(reader)?;
    let mut listener = RowListener::new(sink, config);
    let outcome = fetch(&mut source, &mut listener, previous_digest)?;
    Ok((outcome, listener.into_sink()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    #[test]
    fn test_basic_casting() {
        let input = r#"["_id", "name", "posts[id]", "posts[title]"]
[1, "Alice", 10, "Post 1"]
[1, "Alice", 11, "Post 2"]
[2, "Bob", 20, "Hello"]
"#;

        let (outcome, sink) =
            cast_rows(Cursor::new(input), MemorySink::new(), CastConfig::default(), None).unwrap();

        assert_eq!(outcome.rows, 3);
        assert_eq!(sink.documents.len(), 2);
        assert_eq!(
            sink.documents[0].1.source_value(),
            json!({
                "name": "Alice",
                "posts": [{"id": 10, "title": "Post 1"}, {"id": 11, "title": "Post 2"}]
            })
        );
        assert_eq!(sink.documents[1].1.id.as_deref(), Some("2"));
    }

    #[test]
    fn test_casting_to_bulk() {
        let input = "[\"_index\", \"_id\", \"name\"]\n[\"people\", \"1\", \"Alice\"]\n";
        let (_, sink) =
            cast_rows(Cursor::new(input), BulkSink::new(Vec::new()), CastConfig::default(), None).unwrap();

        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            output,
            "{\"index\":{\"_index\":\"people\",\"_id\":\"1\"}}\n{\"name\":\"Alice\"}\n"
        );
    }
}
