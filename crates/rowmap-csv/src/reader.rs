//! CSV row source.
//!
//! Tokenizing is left to the `csv` crate; each record is exposed as a
//! [`Row`] of text cells and pushed through a mapping session.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::iter::FusedIterator;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use serde::de::DeserializeOwned;
use tracing::debug;

use rowmap_convert::Cell;
use rowmap_map::{MapperKey, MappingSession, Row, RowMapper, from_value};
use rowmap_model::Value;

use crate::dialect::CsvDialect;
use crate::error::{CsvError, Result};

/// One CSV record. Empty fields read as null.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvRow {
    record: StringRecord,
}

impl CsvRow {
    pub fn new(record: StringRecord) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &StringRecord {
        &self.record
    }
}

impl From<StringRecord> for CsvRow {
    fn from(record: StringRecord) -> Self {
        Self::new(record)
    }
}

impl Row for CsvRow {
    fn len(&self) -> usize {
        self.record.len()
    }

    fn cell(&self, index: usize) -> Option<Cell<'_>> {
        self.record.get(index).map(Cell::Text)
    }
}

/// Records of one CSV input and the column signature they carry.
pub struct CsvSource<R> {
    reader: csv::Reader<R>,
    key: Option<MapperKey>,
}

impl<R> fmt::Debug for CsvSource<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsvSource").field("key", &self.key).finish_non_exhaustive()
    }
}

impl CsvSource<File> {
    pub fn from_path(path: impl AsRef<Path>, dialect: &CsvDialect) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| CsvError::open(path.to_path_buf(), e))?;
        debug!(path = %path.display(), "opened CSV input");
        Self::from_reader(file, dialect)
    }
}

impl<R: Read> CsvSource<R> {
    /// Wraps `input`, reading the header row when the dialect has one.
    pub fn from_reader(input: R, dialect: &CsvDialect) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(dialect.separator_byte()?)
            .quote(dialect.quote_byte()?)
            .has_headers(dialect.has_headers)
            .flexible(true)
            .from_reader(input);
        let key = if dialect.has_headers {
            let headers = reader.headers().map_err(CsvError::parse)?;
            let key = MapperKey::from_names(
                headers
                    .iter()
                    .map(|name| name.trim_matches('\u{feff}').trim().to_string()),
            )?;
            debug!(columns = key.len(), "read CSV header");
            Some(key)
        } else {
            None
        };
        Ok(Self { reader, key })
    }

    /// Names the columns, replacing any header row.
    pub fn with_columns<I, S>(mut self, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key = Some(MapperKey::from_names(names)?);
        Ok(self)
    }

    pub fn key(&self) -> Result<&MapperKey> {
        self.key.as_ref().ok_or(CsvError::MissingHeaders)
    }

    /// Raw records as rows.
    pub fn rows(self) -> impl Iterator<Item = Result<CsvRow>> {
        self.reader
            .into_records()
            .map(|record| record.map(CsvRow::new).map_err(CsvError::parse))
    }

    /// Groups records into objects, breaking on key columns.
    pub fn map_with(self, mapper: &RowMapper) -> Result<CsvMapped<R>> {
        let session = mapper.session(self.key()?)?;
        Ok(CsvMapped {
            records: self.reader.into_records(),
            session,
            done: false,
        })
    }

    /// Maps every record on its own, without grouping.
    pub fn map_flat(self, mapper: &RowMapper) -> Result<impl Iterator<Item = Result<Value>>> {
        let key = self.key()?.clone();
        let mapper = mapper.clone();
        Ok(self.rows().map(move |row| Ok(mapper.map(&key, &row?)?)))
    }
}

/// Objects assembled from CSV records; the first error ends the sequence.
pub struct CsvMapped<R> {
    records: StringRecordsIntoIter<R>,
    session: MappingSession,
    done: bool,
}

impl<R> fmt::Debug for CsvMapped<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsvMapped")
            .field("session", &self.session)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<R: Read> CsvMapped<R> {
    pub fn session(&self) -> &MappingSession {
        &self.session
    }

    pub fn typed<T: DeserializeOwned>(self) -> impl Iterator<Item = Result<T>> {
        self.map(|value| value.and_then(|v| Ok(from_value(&v)?)))
    }
}

impl<R: Read> Iterator for CsvMapped<R> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        for record in self.records.by_ref() {
            let pushed = record
                .map_err(CsvError::parse)
                .and_then(|record| Ok(self.session.push_row(&CsvRow::new(record))?));
            match pushed {
                Ok(Some(value)) => return Some(Ok(value)),
                Ok(None) => {}
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
        self.done = true;
        self.session.finish().map_err(CsvError::from).transpose()
    }
}

impl<R: Read> FusedIterator for CsvMapped<R> {}
