// src/extract/chunk.rs

use arrow::{
    csv::{Reader, ReaderBuilder},
    datatypes::{DataType, Field, Schema, SchemaRef},
    record_batch::RecordBatch,
};
use std::{
    fs::File,
    iter,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::trace;

use super::sniff::{probe_file, FileProbe};
use crate::error::ParseError;

/// A delimited file narrowed to a fixed set of columns and read `chunk_size` rows at a time.
///
/// Each call to [`ChunkSource::chunks`] reopens the file, so the sequence can be replayed.
/// Only the projected columns are materialised, which bounds memory by
/// `chunk_size × projection.len()` whatever the width of the file.
#[derive(Debug, Clone)]
pub struct ChunkSource {
    path: PathBuf,
    separator: u8,
    /// Every header column, all read as nullable UTF-8.
    schema: SchemaRef,
    projection: Vec<usize>,
    chunk_size: usize,
}

impl ChunkSource {
    /// Resolve `id_column` and `field_columns` by name against the file header.
    pub fn open(
        path: &Path,
        id_column: &str,
        field_columns: &[String],
        chunk_size: usize,
    ) -> Result<Self, ParseError> {
        let probe = probe_file(path, 0)?;
        let projection = iter::once(id_column)
            .chain(field_columns.iter().map(String::as_str))
            .map(|name| {
                probe
                    .header
                    .iter()
                    .position(|h| h == name)
                    .ok_or_else(|| ParseError::MissingColumn {
                        path: path.to_path_buf(),
                        column: name.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_probe(&probe, projection, chunk_size))
    }

    /// Build from an existing probe; `projection` holds header positions.
    pub fn from_probe(probe: &FileProbe, projection: Vec<usize>, chunk_size: usize) -> Self {
        let fields: Vec<Field> = probe
            .header
            .iter()
            .map(|name| Field::new(name, DataType::Utf8, true))
            .collect();
        Self {
            path: probe.path.clone(),
            separator: probe.separator,
            schema: Arc::new(Schema::new(fields)),
            projection,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Names of the projected columns, in output order.
    pub fn projected_columns(&self) -> Vec<String> {
        self.projection
            .iter()
            .filter_map(|&i| self.schema.fields().get(i).map(|f| f.name().clone()))
            .collect()
    }

    /// Start a fresh pass over the file.
    pub fn chunks(&self) -> Result<Chunks, ParseError> {
        let file = File::open(&self.path).map_err(|source| ParseError::Io {
            path: self.path.clone(),
            source,
        })?;
        let reader = ReaderBuilder::new(self.schema.clone())
            .with_header(true)
            .with_delimiter(self.separator)
            .with_batch_size(self.chunk_size)
            .with_projection(self.projection.clone())
            .build(file)
            .map_err(|source| ParseError::Chunk {
                path: self.path.clone(),
                chunk: 0,
                source,
            })?;
        Ok(Chunks {
            reader,
            path: self.path.clone(),
            index: 0,
            done: false,
        })
    }
}

/// Lazy, finite sequence of projected record batches. Stops after the first error.
pub struct Chunks {
    reader: Reader<File>,
    path: PathBuf,
    index: usize,
    done: bool,
}

impl Iterator for Chunks {
    type Item = Result<RecordBatch, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let chunk = self.index;
        self.index += 1;
        match self.reader.next() {
            Some(Ok(batch)) => {
                trace!(path = %self.path.display(), chunk, rows = batch.num_rows(), "chunk read");
                Some(Ok(batch))
            }
            Some(Err(source)) => {
                self.done = true;
                Some(Err(ParseError::Chunk {
                    path: self.path.clone(),
                    chunk,
                    source,
                }))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}
