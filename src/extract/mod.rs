// src/extract/mod.rs

pub mod chunk;
pub mod partial;
pub mod sniff;

pub use chunk::{ChunkSource, Chunks};
pub use partial::{ColumnSpec, PartialTable, ValueColumn, FIELD_ID_KEY};
pub use sniff::{probe_file, sniff_separator, FileProbe};

use std::path::Path;
use sysinfo::{get_current_pid, ProcessesToUpdate, System};
use tracing::{debug, info, warn};

use crate::catalog::FieldEntry;
use crate::config::{Config, LabelStyle};
use crate::error::{FileError, ParseError};
use crate::header::{ColumnMatcher, DetectedId, IdColumnDetector};

/// Result of pulling the requested fields out of one file.
#[derive(Debug)]
pub struct FileExtraction {
    pub table: PartialTable,
    /// Requested field ids with no column in this file.
    pub unmatched: Vec<String>,
    /// Set when a chunk failed after at least one good chunk; the table holds the rows before it.
    pub truncated: Option<ParseError>,
    pub id_column: DetectedId,
    pub chunks: usize,
}

/// Per-file extraction: header matching, id detection, then a projected chunked read.
#[derive(Debug)]
pub struct Extractor {
    matcher: ColumnMatcher,
    detector: IdColumnDetector,
    id_label: String,
    label_style: LabelStyle,
    chunk_size: usize,
    probe_rows: usize,
}

impl Extractor {
    pub fn new(config: &Config) -> Self {
        Self {
            matcher: ColumnMatcher::default(),
            detector: IdColumnDetector::from_config(config),
            id_label: config.id_label.clone(),
            label_style: config.label_style,
            chunk_size: config.chunk_size.max(1),
            probe_rows: config.probe_rows,
        }
    }

    #[tracing::instrument(level = "info", skip(self, path, fields), fields(path = %path.display(), requested = fields.len()))]
    pub fn extract_file(
        &self,
        path: &Path,
        fields: &[FieldEntry],
    ) -> Result<FileExtraction, FileError> {
        let probe = probe_file(path, self.probe_rows)?;
        let decoded = self.matcher.decode(&probe.header);

        let mut selected: Vec<usize> = Vec::new();
        let mut specs: Vec<ColumnSpec> = Vec::new();
        let mut unmatched = Vec::new();
        for entry in fields {
            let found = decoded.by_field(entry);
            if found.is_empty() {
                unmatched.push(entry.field_id.clone());
                continue;
            }
            for m in found {
                let label = m.label(self.label_style, &entry.field_name);
                if selected.contains(&m.index) || specs.iter().any(|s| s.label == label) {
                    debug!(column = %m.column, label = %label, "duplicate column skipped");
                    continue;
                }
                selected.push(m.index);
                specs.push(ColumnSpec::new(label, entry.field_id.clone()));
            }
        }
        if selected.is_empty() {
            return Err(FileError::NoMatchedColumns {
                path: path.to_path_buf(),
                field_ids: unmatched,
            });
        }

        let id_column = self
            .detector
            .detect(path, &probe.header, &probe.sample, &selected)?;
        if let Some(pos) = selected.iter().position(|&i| i == id_column.index) {
            warn!(column = %id_column.column, "identifier column also matched a field; dropped from values");
            selected.remove(pos);
            specs.remove(pos);
            if selected.is_empty() {
                return Err(FileError::NoMatchedColumns {
                    path: path.to_path_buf(),
                    field_ids: fields.iter().map(|f| f.field_id.clone()).collect(),
                });
            }
        }
        debug!(id = %id_column.column, by = ?id_column.by, columns = selected.len(), "columns selected");

        let mut projection = Vec::with_capacity(selected.len() + 1);
        projection.push(id_column.index);
        projection.extend(&selected);
        let source = ChunkSource::from_probe(&probe, projection, self.chunk_size);
        debug!(
            path = %source.path().display(),
            chunk_size = source.chunk_size(),
            "streaming chunks"
        );

        let mut batches = Vec::new();
        let mut truncated = None;
        for chunk in source.chunks()? {
            match chunk {
                Ok(batch) => batches.push(batch),
                Err(e) if batches.is_empty() => return Err(e.into()),
                Err(e) => {
                    warn!(error = %e, kept_chunks = batches.len(), "file truncated at bad chunk");
                    truncated = Some(e);
                    break;
                }
            }
        }

        let table = PartialTable::from_chunks(path, &self.id_label, &specs, &batches).map_err(
            |source| FileError::Table {
                path: path.to_path_buf(),
                source,
            },
        )?;
        info!(rows = table.num_rows(), chunks = batches.len(), "file extracted");
        log_memory(path);

        Ok(FileExtraction {
            table,
            unmatched,
            truncated,
            id_column,
            chunks: batches.len(),
        })
    }
}

/// Resident memory of this process, at debug level.
fn log_memory(path: &Path) {
    let Ok(pid) = get_current_pid() else {
        return;
    };
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    if let Some(process) = sys.process(pid) {
        debug!(
            path = %path.display(),
            rss_mib = process.memory() / (1024 * 1024),
            "memory after file"
        );
    }
}
