//! Row casting - fold flat SQL rows back into nested documents
//!
//! This module turns relational results back into documents: rows with
//! path-shaped column names are merged into nested, array-aware JSON
//! documents and handed to a sink.

pub mod digest;
pub mod fetch;
pub mod listener;
pub mod object;
pub mod path;
pub mod render;
pub mod sink;
pub mod source;
pub mod values;
pub mod writer;

pub use digest::{DigestAlgorithm, DocumentDigest};
pub use fetch::{fetch, FetchOutcome};
pub use listener::RowListener;
pub use object::{Document, StructuredObject};
pub use path::{merge, Node, Tree};
pub use render::{render_node, render_tree};
pub use sink::{Action, Cleanup, MemorySink, Sink, SinkCounters, SinkRegistry};
pub use source::{JsonRowSource, MemoryRows, RowSource};
pub use values::Values;
pub use writer::{BulkSink, NdjsonSink};
