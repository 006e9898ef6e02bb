// src/resolve/query.rs

use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use super::{is_field_id, FieldResolver, ResolvedField};
use crate::catalog::FieldEntry;
use crate::error::{LocatorMiss, ResolutionError};

/// One line of the mapping table. Unresolved fields leave the path columns empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingRow {
    pub original_path: String,
    pub resolved_file_path: String,
    pub field_id: String,
    pub field_name: String,
}

/// A token that did not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedToken {
    pub token: String,
    pub error: ResolutionError,
}

/// A located file and the fields to pull from it, in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileQuery {
    pub path: PathBuf,
    pub fields: Vec<FieldEntry>,
}

/// Everything derived from one token list before any data file is opened.
#[derive(Debug, Default)]
pub struct Query {
    resolved: Vec<ResolvedField>,
    skipped: Vec<SkippedToken>,
    unlocated: Vec<LocatorMiss>,
    files: Vec<FileQuery>,
    mapping: Vec<MappingRow>,
}

impl Query {
    /// Resolve `tokens` in order. A field requested twice (by id and by name, say) counts once,
    /// and each catalog path is located only once.
    pub fn build<S: AsRef<str>>(resolver: &FieldResolver<'_>, tokens: &[S]) -> Self {
        let mut query = Query::default();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut seen_unknown: HashSet<String> = HashSet::new();
        let mut located: HashMap<String, Option<PathBuf>> = HashMap::new();
        let mut file_index: HashMap<PathBuf, usize> = HashMap::new();

        for token in tokens {
            let token = token.as_ref().trim();
            let (entry, matched_by, alternatives) = match resolver.lookup(token) {
                Ok(found) => found,
                Err(error) => {
                    warn!(token, %error, "token skipped");
                    if !token.is_empty() && seen_unknown.insert(token.to_string()) {
                        query.mapping.push(unresolved_row(token));
                    }
                    query.skipped.push(SkippedToken {
                        token: token.to_string(),
                        error,
                    });
                    continue;
                }
            };
            if !seen_ids.insert(entry.field_id.clone()) {
                continue;
            }

            let resolved_file_path = located
                .entry(entry.relative_path.clone())
                .or_insert_with(|| resolver.locator().locate(&entry.relative_path))
                .clone();
            match &resolved_file_path {
                Some(path) => {
                    let idx = *file_index.entry(path.clone()).or_insert_with(|| {
                        query.files.push(FileQuery {
                            path: path.clone(),
                            fields: Vec::new(),
                        });
                        query.files.len() - 1
                    });
                    query.files[idx].fields.push(entry.clone());
                }
                None => {
                    let miss = resolver.locator().miss(&entry.relative_path);
                    warn!(field_id = %entry.field_id, %miss, "field file not found");
                    query.unlocated.push(miss);
                }
            }

            query.mapping.push(MappingRow {
                original_path: entry.relative_path.clone(),
                resolved_file_path: resolved_file_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                field_id: entry.field_id.clone(),
                field_name: entry.field_name.clone(),
            });
            query.resolved.push(ResolvedField::new(
                token,
                entry,
                matched_by,
                alternatives,
                resolved_file_path,
            ));
        }

        info!(
            requested = tokens.len(),
            resolved = query.resolved.len(),
            skipped = query.skipped.len(),
            files = query.files.len(),
            "query built"
        );
        query
    }

    pub fn resolved(&self) -> &[ResolvedField] {
        &self.resolved
    }

    pub fn skipped(&self) -> &[SkippedToken] {
        &self.skipped
    }

    pub fn unlocated(&self) -> &[LocatorMiss] {
        &self.unlocated
    }

    /// Located files in order of first request.
    pub fn files(&self) -> &[FileQuery] {
        &self.files
    }

    pub fn mapping(&self) -> &[MappingRow] {
        &self.mapping
    }

    /// Resolved field ids in request order.
    pub fn field_order(&self) -> Vec<String> {
        self.resolved.iter().map(|r| r.field_id.clone()).collect()
    }

    pub fn ambiguous(&self) -> impl Iterator<Item = &ResolvedField> {
        self.resolved.iter().filter(|r| r.is_ambiguous())
    }
}

fn unresolved_row(token: &str) -> MappingRow {
    let (field_id, field_name) = if is_field_id(token) {
        (token.to_string(), String::new())
    } else {
        (String::new(), token.to_string())
    };
    MappingRow {
        original_path: String::new(),
        resolved_file_path: String::new(),
        field_id,
        field_name,
    }
}

/// Write the mapping table with its header, even when there are no rows.
pub fn write_mapping_csv(rows: &[MappingRow], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("creating mapping table {:?}", path))?;
    if rows.is_empty() {
        wtr.write_record(["original_path", "resolved_file_path", "field_id", "field_name"])?;
    }
    for row in rows {
        wtr.serialize(row)
            .with_context(|| format!("writing mapping row for {}", row.field_id))?;
    }
    wtr.flush()?;
    Ok(())
}
