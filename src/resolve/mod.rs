// src/resolve/mod.rs

mod query;

pub use query::{write_mapping_csv, FileQuery, MappingRow, Query, SkippedToken};

use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::catalog::{Catalog, FieldEntry};
use crate::error::ResolutionError;
use crate::locate::FileLocator;

/// How a token was tied to its catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedBy {
    Id,
    ExactName,
    FuzzyName,
}

/// A requested token bound to a catalog entry and, when found, a file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedField {
    pub token: String,
    pub field_id: String,
    pub field_name: String,
    pub relative_path: String,
    /// `None` when no file on disk matched `relative_path`.
    pub resolved_file_path: Option<PathBuf>,
    pub matched_by: MatchedBy,
    /// Other fuzzy candidates `(field_id, field_name)` passed over for this one.
    pub alternatives: Vec<(String, String)>,
}

impl ResolvedField {
    pub fn new(
        token: &str,
        entry: &FieldEntry,
        matched_by: MatchedBy,
        alternatives: Vec<(String, String)>,
        resolved_file_path: Option<PathBuf>,
    ) -> Self {
        Self {
            token: token.trim().to_string(),
            field_id: entry.field_id.clone(),
            field_name: entry.field_name.clone(),
            relative_path: entry.relative_path.clone(),
            resolved_file_path,
            matched_by,
            alternatives,
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        !self.alternatives.is_empty()
    }
}

fn is_field_id(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

/// Binds user tokens to catalog entries and locates their files.
#[derive(Debug, Clone, Copy)]
pub struct FieldResolver<'a> {
    catalog: &'a Catalog,
    locator: &'a FileLocator,
}

impl<'a> FieldResolver<'a> {
    pub fn new(catalog: &'a Catalog, locator: &'a FileLocator) -> Self {
        Self { catalog, locator }
    }

    pub fn locator(&self) -> &'a FileLocator {
        self.locator
    }

    /// Catalog lookup only. Digits go through the id index; anything else is a name, exact
    /// before fuzzy, where the first fuzzy candidate in catalog order is taken.
    pub fn lookup(
        &self,
        token: &str,
    ) -> Result<(&'a FieldEntry, MatchedBy, Vec<(String, String)>), ResolutionError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ResolutionError::EmptyToken);
        }
        if is_field_id(token) {
            return self
                .catalog
                .by_id(token)
                .map(|e| (e, MatchedBy::Id, Vec::new()))
                .ok_or_else(|| ResolutionError::UnknownField(token.to_string()));
        }
        if let Some(e) = self.catalog.by_name_exact(token) {
            return Ok((e, MatchedBy::ExactName, Vec::new()));
        }

        let mut candidates = self.catalog.by_name_fuzzy(token).into_iter();
        let chosen = candidates
            .next()
            .ok_or_else(|| ResolutionError::UnknownField(token.to_string()))?;
        let alternatives: Vec<(String, String)> = candidates
            .map(|e| (e.field_id.clone(), e.field_name.clone()))
            .collect();
        if alternatives.is_empty() {
            debug!(token, field_id = %chosen.field_id, "fuzzy name match");
        } else {
            warn!(
                token,
                chosen = %chosen.field_id,
                others = alternatives.len(),
                "ambiguous field name, taking the first match"
            );
        }
        Ok((chosen, MatchedBy::FuzzyName, alternatives))
    }

    pub fn resolve(&self, token: &str) -> Result<ResolvedField, ResolutionError> {
        let (entry, matched_by, alternatives) = self.lookup(token)?;
        let located = self.locator.locate(&entry.relative_path);
        Ok(ResolvedField::new(token, entry, matched_by, alternatives, located))
    }
}
