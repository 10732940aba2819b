//! Row producers
//!
//! A [`RowSource`] yields rows positionally aligned to a fixed list of column
//! names, in the order the listener must see them.

use crate::error::{CastError, Result};
use crate::types::Cell;
use serde_json::Value;
use std::io::BufRead;

/// Capability that produces rows
pub trait RowSource {
    /// Column names, fixed for the whole stream
    fn columns(&self) -> &[String];

    /// Next row, or `None` once the stream is exhausted
    fn next_row(&mut self) -> Option<Result<Vec<Cell>>>;
}

/// Rows held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryRows {
    columns: Vec<String>,
    rows: std::collections::VecDeque<Vec<Cell>>,
}

impl MemoryRows {
    pub fn new<C, S>(columns: C) -> Self
    where
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MemoryRows {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Default::default(),
        }
    }

    pub fn push<I, V>(&mut self, row: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Cell>,
    {
        self.rows.push_back(row.into_iter().map(Into::into).collect());
    }

    pub fn with_row<I, V>(mut self, row: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Cell>,
    {
        self.push(row);
        self
    }
}

impl RowSource for MemoryRows {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Option<Result<Vec<Cell>>> {
        self.rows.pop_front().map(Ok)
    }
}

/// Line-delimited JSON rows.
///
/// The first non-empty line is an array of column names; every following
/// line is an array of cell values.
pub struct JsonRowSource<R: BufRead> {
    lines: std::io::Lines<R>,
    columns: Vec<String>,
}

impl<R: BufRead> JsonRowSource<R> {
    pub fn new(reader: R) -> Result<Self> {
        let mut lines = reader.lines();
        let header = loop {
            match lines.next() {
                Some(line) => {
                    let line = line?;
                    if !line.trim().is_empty() {
                        break line;
                    }
                }
                None => return Err(CastError::InvalidSource("missing column header line".to_string())),
            }
        };

        let Value::Array(names) = parse_line(&header)? else {
            return Err(CastError::InvalidSource("column header must be a JSON array".to_string()));
        };
        let columns = names
            .into_iter()
            .map(|name| match name {
                Value::String(s) => Ok(s),
                other => Err(CastError::InvalidSource(format!("column name must be a string, got {}", other))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(JsonRowSource { lines, columns })
    }
}

impl<R: BufRead> RowSource for JsonRowSource<R> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Option<Result<Vec<Cell>>> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(parse_row(&line));
        }
    }
}

fn parse_row(line: &str) -> Result<Vec<Cell>> {
    match parse_line(line)? {
        Value::Array(values) => Ok(values.into_iter().map(Cell::from).collect()),
        other => Err(CastError::InvalidSource(format!("row must be a JSON array, got {}", other))),
    }
}

/// Parse one line, SIMD first with serde_json as the fallback
fn parse_line(line: &str) -> Result<Value> {
    let mut bytes = line.as_bytes().to_vec();
    match simd_json::serde::from_slice::<Value>(&mut bytes) {
        Ok(value) => Ok(value),
        Err(_) => Ok(serde_json::from_str(line)?),
    }
}
