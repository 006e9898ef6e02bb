// src/report.rs

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use crate::error::{FileError, ParseError};
use crate::merge::MergeStats;
use crate::resolve::{MatchedBy, Query};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub token: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub field_id: String,
    pub field_name: String,
}

/// A fuzzy name match with more than one candidate; the first was used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmbiguousMatch {
    pub token: String,
    pub chosen: Candidate,
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnlocatedField {
    pub relative_path: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedField {
    pub path: PathBuf,
    pub field_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Outputs {
    pub mapping: PathBuf,
    pub merged: PathBuf,
    pub summary: PathBuf,
}

/// End-of-run account of everything that did not make it into the merged table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dictionary: PathBuf,
    pub requested_tokens: usize,
    pub resolved_fields: usize,
    pub fuzzy_matches: usize,
    pub skipped_tokens: Vec<SkippedEntry>,
    pub ambiguous: Vec<AmbiguousMatch>,
    pub unlocated: Vec<UnlocatedField>,
    pub file_errors: Vec<FileFailure>,
    pub truncated_files: Vec<FileFailure>,
    pub unmatched_fields: Vec<UnmatchedField>,
    pub files_merged: usize,
    pub rows: usize,
    pub columns: Vec<String>,
    pub merge: MergeStats,
    pub outputs: Outputs,
}

impl RunSummary {
    pub fn start(dictionary: impl Into<PathBuf>) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            dictionary: dictionary.into(),
            requested_tokens: 0,
            resolved_fields: 0,
            fuzzy_matches: 0,
            skipped_tokens: Vec::new(),
            ambiguous: Vec::new(),
            unlocated: Vec::new(),
            file_errors: Vec::new(),
            truncated_files: Vec::new(),
            unmatched_fields: Vec::new(),
            files_merged: 0,
            rows: 0,
            columns: Vec::new(),
            merge: MergeStats::default(),
            outputs: Outputs::default(),
        }
    }

    /// Copy the resolution outcome of `query` into the summary.
    pub fn record_query(&mut self, requested: usize, query: &Query) {
        self.requested_tokens = requested;
        self.resolved_fields = query.resolved().len();
        self.fuzzy_matches = query
            .resolved()
            .iter()
            .filter(|r| r.matched_by == MatchedBy::FuzzyName)
            .count();
        self.skipped_tokens = query
            .skipped()
            .iter()
            .map(|s| SkippedEntry {
                token: s.token.clone(),
                reason: s.error.to_string(),
            })
            .collect();
        self.ambiguous = query
            .ambiguous()
            .map(|r| {
                let chosen = Candidate {
                    field_id: r.field_id.clone(),
                    field_name: r.field_name.clone(),
                };
                let mut candidates = vec![chosen.clone()];
                candidates.extend(r.alternatives.iter().map(|(id, name)| Candidate {
                    field_id: id.clone(),
                    field_name: name.clone(),
                }));
                AmbiguousMatch {
                    token: r.token.clone(),
                    chosen,
                    candidates,
                }
            })
            .collect();
        self.unlocated = query
            .unlocated()
            .iter()
            .map(|m| UnlocatedField {
                relative_path: m.relative_path.clone(),
                reason: m.to_string(),
            })
            .collect();
    }

    pub fn record_file_error(&mut self, path: &Path, error: &FileError) {
        self.file_errors.push(FileFailure {
            path: path.to_path_buf(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        });
    }

    pub fn record_truncated(&mut self, path: &Path, error: &ParseError) {
        self.truncated_files.push(FileFailure {
            path: path.to_path_buf(),
            kind: "parse".to_string(),
            message: error.to_string(),
        });
    }

    pub fn record_unmatched(&mut self, path: &Path, field_ids: &[String]) {
        self.unmatched_fields
            .extend(field_ids.iter().map(|id| UnmatchedField {
                path: path.to_path_buf(),
                field_id: id.clone(),
            }));
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Pretty JSON with a trailing newline, written to a temp file then renamed into place.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "summary.json".to_string());
        let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));
        let mut tmp = fs::File::create(&tmp_path)
            .with_context(|| format!("creating {:?}", tmp_path))?;
        serde_json::to_writer_pretty(&mut tmp, self).context("serializing run summary")?;
        tmp.write_all(b"\n")?;
        fs::rename(&tmp_path, path)
            .with_context(|| format!("renaming {:?} -> {:?}", tmp_path, path))?;
        Ok(())
    }

    pub fn log(&self) {
        info!(
            requested = self.requested_tokens,
            resolved = self.resolved_fields,
            files = self.files_merged,
            rows = self.rows,
            columns = self.columns.len(),
            "run finished"
        );
        for s in &self.skipped_tokens {
            warn!(token = %s.token, reason = %s.reason, "skipped token");
        }
        for a in &self.ambiguous {
            let names: Vec<&str> = a.candidates.iter().map(|c| c.field_name.as_str()).collect();
            warn!(token = %a.token, chosen = %a.chosen.field_id, candidates = ?names, "ambiguous match");
        }
        for u in &self.unlocated {
            warn!(path = %u.relative_path, "no file for dictionary path");
        }
        for f in self.file_errors.iter().chain(&self.truncated_files) {
            warn!(path = %f.path.display(), kind = %f.kind, "{}", f.message);
        }
        if !self.unmatched_fields.is_empty() {
            warn!(count = self.unmatched_fields.len(), "fields with no column in their file");
        }
    }
}
