// src/catalog/load.rs

use csv::ReaderBuilder;
use std::path::Path;
use tracing::{debug, info, warn};

use super::{Catalog, FieldEntry};
use crate::config::Config;
use crate::error::{DictionaryFormatError, ParseError};
use crate::extract::sniff::{clean_header, sniff_separator};

/// Normalised header names accepted for each dictionary role.
pub const ID_ALIASES: &[&str] = &["fieldid", "id"];
pub const NAME_ALIASES: &[&str] = &["field", "fieldname", "name", "title"];
pub const PATH_ALIASES: &[&str] = &["path", "relativepath", "filepath", "file"];

/// Lower-case and drop everything but letters and digits: `Field_ID` → `fieldid`.
fn normalise(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn find_role(
    header: &[String],
    role: &'static str,
    aliases: &'static [&'static str],
    path: &Path,
) -> Result<usize, DictionaryFormatError> {
    let normalised: Vec<String> = header.iter().map(|h| normalise(h)).collect();
    aliases
        .iter()
        .find_map(|alias| normalised.iter().position(|h| h == alias))
        .ok_or_else(|| DictionaryFormatError::MissingColumn {
            path: path.to_path_buf(),
            role,
            expected: aliases,
        })
}

impl Catalog {
    /// Load the dictionary named by `config`.
    pub fn load(config: &Config) -> Result<Self, DictionaryFormatError> {
        Self::from_path(config.dictionary_file())
    }

    /// Parse a flat dictionary table with one row per field.
    #[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, DictionaryFormatError> {
        let path = path.as_ref();
        let separator = sniff_separator(path).map_err(|e| match e {
            ParseError::Io { source, .. } => DictionaryFormatError::Io {
                path: path.to_path_buf(),
                source,
            },
            ParseError::EmptyFile(_) => DictionaryFormatError::Empty(path.to_path_buf()),
            // a single-column dictionary cannot carry all three roles
            ParseError::UndetectedSeparator { .. } => DictionaryFormatError::MissingColumn {
                path: path.to_path_buf(),
                role: "path",
                expected: PATH_ALIASES,
            },
            other => DictionaryFormatError::Parse {
                path: path.to_path_buf(),
                source: other,
            },
        })?;

        let mut rdr = ReaderBuilder::new()
            .delimiter(separator)
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|source| DictionaryFormatError::Csv {
                path: path.to_path_buf(),
                row: 0,
                source,
            })?;

        let header: Vec<String> = rdr
            .headers()
            .map_err(|source| DictionaryFormatError::Csv {
                path: path.to_path_buf(),
                row: 0,
                source,
            })?
            .iter()
            .map(clean_header)
            .collect();

        let id_idx = find_role(&header, "field id", ID_ALIASES, path)?;
        let name_idx = find_role(&header, "field name", NAME_ALIASES, path)?;
        let path_idx = find_role(&header, "path", PATH_ALIASES, path)?;
        let needed = id_idx.max(name_idx).max(path_idx);
        debug!(id_idx, name_idx, path_idx, "dictionary columns");

        let mut catalog = Catalog::default();
        let mut skipped = 0usize;
        for (i, result) in rdr.records().enumerate() {
            let row = i + 1;
            let record = result.map_err(|source| DictionaryFormatError::Csv {
                path: path.to_path_buf(),
                row,
                source,
            })?;
            if record.len() <= needed {
                skipped += 1;
                continue;
            }

            let field_id = record[id_idx].trim();
            if field_id.is_empty() {
                skipped += 1;
                continue;
            }
            let entry = FieldEntry {
                field_id: field_id.to_string(),
                field_name: record[name_idx].trim().to_string(),
                relative_path: record[path_idx].trim().to_string(),
            };
            if !catalog.push(entry) {
                warn!(row, field_id, "repeated field id in dictionary; keeping first");
            }
        }

        if skipped > 0 {
            warn!(skipped, "dictionary rows without a usable field id were skipped");
        }
        info!(fields = catalog.len(), "loaded dictionary");
        Ok(catalog)
    }
}
