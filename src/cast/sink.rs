//! Destinations for completed documents
//!
//! A [`Sink`] accepts finished documents one at a time. Implementations are
//! picked by name through a [`SinkRegistry`] of statically known constructors.

use crate::cast::object::Document;
use crate::cast::writer::{BulkSink, NdjsonSink};
use crate::error::{CastError, Result};
use std::collections::BTreeMap;
use std::io::Write;

/// What a sink was asked to do with a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Index,
    Create,
    Delete,
    Update,
}

/// Request to delete documents left over from earlier runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cleanup {
    pub older_than_version: i64,
}

/// Capability that receives completed documents.
///
/// Errors are passed back to the caller unchanged; retrying is up to the sink.
pub trait Sink {
    /// Index a document, or create it when `create` is set
    fn index(&mut self, document: Document, create: bool) -> Result<()>;

    fn delete(&mut self, document: Document) -> Result<()>;

    fn update(&mut self, _document: Document) -> Result<()> {
        Err(CastError::UnsupportedOperation("update"))
    }

    /// Remove documents older than the given run version
    fn cleanup(&mut self, _cleanup: &Cleanup) -> Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn index(&mut self, document: Document, create: bool) -> Result<()> {
        (**self).index(document, create)
    }

    fn delete(&mut self, document: Document) -> Result<()> {
        (**self).delete(document)
    }

    fn update(&mut self, document: Document) -> Result<()> {
        (**self).update(document)
    }

    fn cleanup(&mut self, cleanup: &Cleanup) -> Result<()> {
        (**self).cleanup(cleanup)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn index(&mut self, document: Document, create: bool) -> Result<()> {
        (**self).index(document, create)
    }

    fn delete(&mut self, document: Document) -> Result<()> {
        (**self).delete(document)
    }

    fn update(&mut self, document: Document) -> Result<()> {
        (**self).update(document)
    }

    fn cleanup(&mut self, cleanup: &Cleanup) -> Result<()> {
        (**self).cleanup(cleanup)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Keeps every document in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub documents: Vec<(Action, Document)>,
    pub cleanups: Vec<Cleanup>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, action: Action) -> usize {
        self.documents.iter().filter(|(a, _)| *a == action).count()
    }
}

impl Sink for MemorySink {
    fn index(&mut self, document: Document, create: bool) -> Result<()> {
        let action = if create { Action::Create } else { Action::Index };
        self.documents.push((action, document));
        Ok(())
    }

    fn delete(&mut self, document: Document) -> Result<()> {
        self.documents.push((Action::Delete, document));
        Ok(())
    }

    fn update(&mut self, document: Document) -> Result<()> {
        self.documents.push((Action::Update, document));
        Ok(())
    }

    fn cleanup(&mut self, cleanup: &Cleanup) -> Result<()> {
        self.cleanups.push(*cleanup);
        Ok(())
    }
}

/// Per-listener emission counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkCounters {
    pub indexed: u64,
    pub created: u64,
    pub deleted: u64,
    pub updated: u64,
    /// Objects dropped because their body was empty
    pub discarded: u64,
}

impl SinkCounters {
    pub fn record(&mut self, action: Action) {
        match action {
            Action::Index => self.indexed += 1,
            Action::Create => self.created += 1,
            Action::Delete => self.deleted += 1,
            Action::Update => self.updated += 1,
        }
    }

    pub fn emitted(&self) -> u64 {
        self.indexed + self.created + self.deleted + self.updated
    }
}

type SinkConstructor = fn(Box<dyn Write>) -> Box<dyn Sink>;

/// Sink strategies by name
pub struct SinkRegistry {
    constructors: BTreeMap<&'static str, SinkConstructor>,
}

impl SinkRegistry {
    pub fn empty() -> Self {
        SinkRegistry {
            constructors: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, name: &'static str, constructor: SinkConstructor) {
        self.constructors.insert(name, constructor);
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constructors.keys().copied()
    }

    /// Build the sink registered under `name`, writing to `out`
    pub fn create(&self, name: &str, out: Box<dyn Write>) -> Result<Box<dyn Sink>> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| CastError::UnknownSink(name.to_string()))?;
        Ok(constructor(out))
    }
}

impl Default for SinkRegistry {
    fn default() -> Self {
        let mut registry = SinkRegistry::empty();
        registry.register("bulk", |out| Box::new(BulkSink::new(out)));
        registry.register("memory", |_| Box::new(MemorySink::new()));
        registry.register("ndjson", |out| Box::new(NdjsonSink::new(out)));
        registry
    }
}
