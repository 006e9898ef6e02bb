// src/error.rs

use arrow::error::ArrowError;
use std::path::PathBuf;
use thiserror::Error;

/// The dictionary could not be turned into a catalog. Fatal for the run.
#[derive(Debug, Error)]
pub enum DictionaryFormatError {
    #[error("opening dictionary {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dictionary {0:?} is empty")]
    Empty(PathBuf),

    #[error("dictionary {path:?} has no {role} column (looked for {expected:?})")]
    MissingColumn {
        path: PathBuf,
        role: &'static str,
        expected: &'static [&'static str],
    },

    #[error("reading dictionary {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("dictionary {path:?} row {row}: {source}")]
    Csv {
        path: PathBuf,
        row: usize,
        #[source]
        source: csv::Error,
    },
}

/// A requested token that does not name a catalog field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("unknown field `{0}`")]
    UnknownField(String),

    #[error("empty field token")]
    EmptyToken,
}

/// No file on disk matched a catalog path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no file found for `{relative_path}` under {root:?}")]
pub struct LocatorMiss {
    pub relative_path: String,
    pub root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectionError {
    #[error("no identifier column among {columns} columns of {path:?}")]
    NoIdColumn { path: PathBuf, columns: usize },
}

/// Failure to read a data file (or the dictionary) as delimited text.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("opening {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0:?} is empty")]
    EmptyFile(PathBuf),

    #[error("no separator among {candidates:?} in the first line of {path:?}")]
    UndetectedSeparator {
        path: PathBuf,
        candidates: Vec<char>,
    },

    #[error("column `{column}` not present in {path:?}")]
    MissingColumn { path: PathBuf, column: String },

    #[error("reading header of {path:?}: {source}")]
    Header {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path:?} chunk {chunk}: {source}")]
    Chunk {
        path: PathBuf,
        chunk: usize,
        #[source]
        source: ArrowError,
    },
}

/// Everything that can take a single data file out of the merge.
#[derive(Debug, Error)]
pub enum FileError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Detection(#[from] DetectionError),

    #[error("none of the fields {field_ids:?} have a column in {path:?}")]
    NoMatchedColumns {
        path: PathBuf,
        field_ids: Vec<String>,
    },

    #[error("assembling table for {path:?}: {source}")]
    Table {
        path: PathBuf,
        #[source]
        source: ArrowError,
    },
}

impl FileError {
    /// Short category name used in the run summary.
    pub fn kind(&self) -> &'static str {
        match self {
            FileError::Parse(_) => "parse",
            FileError::Detection(_) => "no_id_column",
            FileError::NoMatchedColumns { .. } => "no_matched_columns",
            FileError::Table { .. } => "table",
        }
    }
}
