// src/merge/mod.rs

mod table;

pub use table::MergedTable;

use arrow::{
    array::{Array, ArrayRef, StringArray},
    datatypes::{DataType, Field, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
};
use serde::Serialize;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tracing::{debug, info};

use crate::extract::{PartialTable, FIELD_ID_KEY};

/// What the merge threw away, for the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    /// Extra rows for an identifier already seen in the same table.
    pub duplicate_rows: usize,
    /// Cells where a later table disagreed with the value already taken.
    pub conflicting_values: usize,
    /// Rows dropped for a missing or blank identifier.
    pub empty_ids: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    pub table: MergedTable,
    pub stats: MergeStats,
}

struct OutColumn {
    label: String,
    field_id: Option<String>,
    values: Vec<Option<String>>,
    filled: Vec<bool>,
}

/// Full outer join of partial tables on the identifier.
#[derive(Debug, Clone)]
pub struct MergeEngine {
    id_label: String,
    field_order: Vec<String>,
}

impl MergeEngine {
    pub fn new(id_label: impl Into<String>) -> Self {
        Self {
            id_label: id_label.into(),
            field_order: Vec::new(),
        }
    }

    /// Field ids in request order; output columns are grouped by it.
    pub fn with_field_order(mut self, field_order: Vec<String>) -> Self {
        self.field_order = field_order;
        self
    }

    /// Identifiers appear once each, in order of first appearance. Within a table the first
    /// row for an identifier wins; across tables the first table with a row for the
    /// identifier supplies the value of a shared label.
    pub fn merge(&self, tables: &[PartialTable]) -> Result<Merged, ArrowError> {
        let mut stats = MergeStats::default();

        let mut ids: Vec<String> = Vec::new();
        let mut row_of: HashMap<String, usize> = HashMap::new();
        for table in tables {
            for id in table.ids().iter() {
                match id.map(str::trim).filter(|s| !s.is_empty()) {
                    Some(id) => {
                        if !row_of.contains_key(id) {
                            row_of.insert(id.to_string(), ids.len());
                            ids.push(id.to_string());
                        }
                    }
                    None => stats.empty_ids += 1,
                }
            }
        }

        let mut columns: Vec<OutColumn> = Vec::new();
        let mut col_of: HashMap<String, usize> = HashMap::new();
        for table in tables {
            let value_columns = table.value_columns();
            let targets: Vec<Option<usize>> = value_columns
                .iter()
                .map(|vc| {
                    if vc.label == self.id_label {
                        return None;
                    }
                    let idx = *col_of.entry(vc.label.to_string()).or_insert_with(|| {
                        columns.push(OutColumn {
                            label: vc.label.to_string(),
                            field_id: vc.field_id.map(str::to_string),
                            values: vec![None; ids.len()],
                            filled: vec![false; ids.len()],
                        });
                        columns.len() - 1
                    });
                    Some(idx)
                })
                .collect();

            let mut seen: HashSet<usize> = HashSet::new();
            for (r, id) in table.ids().iter().enumerate() {
                let Some(row) = id
                    .map(str::trim)
                    .and_then(|id| row_of.get(id).copied())
                else {
                    continue;
                };
                if !seen.insert(row) {
                    stats.duplicate_rows += 1;
                    continue;
                }
                for (vc, target) in value_columns.iter().zip(&targets) {
                    let Some(c) = *target else { continue };
                    let value = vc.values.is_valid(r).then(|| vc.values.value(r));
                    let out = &mut columns[c];
                    if out.filled[row] {
                        if out.values[row].as_deref() != value {
                            stats.conflicting_values += 1;
                        }
                        continue;
                    }
                    out.filled[row] = true;
                    out.values[row] = value.map(str::to_string);
                }
            }
            debug!(source = %table.source().display(), rows = table.num_rows(), "table merged");
        }

        // group by requested field, keeping first-seen order inside a field
        let rank = |c: &OutColumn| {
            c.field_id
                .as_ref()
                .and_then(|id| self.field_order.iter().position(|f| f == id))
                .unwrap_or(self.field_order.len())
        };
        columns.sort_by_key(|c| rank(c));

        let mut fields = vec![Field::new(&self.id_label, DataType::Utf8, true)];
        let mut arrays: Vec<ArrayRef> = vec![Arc::new(StringArray::from(ids))];
        for col in columns {
            let mut field = Field::new(&col.label, DataType::Utf8, true);
            if let Some(id) = col.field_id {
                field = field.with_metadata(HashMap::from([(FIELD_ID_KEY.to_string(), id)]));
            }
            fields.push(field);
            arrays.push(Arc::new(StringArray::from(col.values)));
        }
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;

        info!(
            tables = tables.len(),
            rows = batch.num_rows(),
            columns = batch.num_columns(),
            duplicate_rows = stats.duplicate_rows,
            conflicts = stats.conflicting_values,
            "merge complete"
        );
        Ok(Merged {
            table: MergedTable::new(batch),
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ColumnSpec;
    use anyhow::Result;
    use std::fs;
    use tempfile::TempDir;

    fn table(source: &str, cols: &[(&str, &str)], rows: &[&[&str]]) -> Result<PartialTable> {
        let specs: Vec<ColumnSpec> = cols.iter().map(|(l, f)| ColumnSpec::new(*l, *f)).collect();
        let rows: Vec<Vec<Option<&str>>> = rows
            .iter()
            .map(|r| r.iter().map(|v| (!v.is_empty()).then_some(*v)).collect())
            .collect();
        Ok(PartialTable::from_rows(source, "eid", &specs, &rows)?)
    }

    fn inputs() -> Result<Vec<PartialTable>> {
        Ok(vec![
            table(
                "a.csv",
                &[("21022", "21022"), ("31", "31")],
                &[&["100", "61", "0"], &["101", "55", "1"]],
            )?,
            table(
                "b.csv",
                &[("31", "31"), ("34", "34")],
                &[&["100", "1", "1950"], &["102", "0", "1960"]],
            )?,
        ])
    }

    #[test]
    fn every_identifier_appears_exactly_once() -> Result<()> {
        let merged = MergeEngine::new("eid").merge(&inputs()?)?;
        let ids: Vec<&str> = merged.table.ids().iter().flatten().collect();
        assert_eq!(ids, vec!["100", "101", "102"]);
        assert_eq!(merged.table.column_names(), vec!["eid", "21022", "31", "34"]);
        assert_eq!(merged.table.value("102", "34"), Some("1960"));
        assert_eq!(merged.table.value("102", "21022"), None);
        Ok(())
    }

    #[test]
    fn first_table_wins_on_conflict() -> Result<()> {
        let merged = MergeEngine::new("eid").merge(&inputs()?)?;
        assert_eq!(merged.table.value("100", "31"), Some("0"));
        assert_eq!(merged.table.value("102", "31"), Some("0"));
        assert_eq!(merged.stats.conflicting_values, 1);

        // order of processing decides, not value
        let mut swapped = inputs()?;
        swapped.reverse();
        let merged = MergeEngine::new("eid").merge(&swapped)?;
        assert_eq!(merged.table.value("100", "31"), Some("1"));
        Ok(())
    }

    #[test]
    fn merge_is_idempotent() -> Result<()> {
        let engine = MergeEngine::new("eid").with_field_order(vec!["34".into(), "31".into()]);
        let tables = inputs()?;
        let first = engine.merge(&tables)?;
        let second = engine.merge(&tables)?;
        assert_eq!(first, second);
        assert_eq!(first.table.column_names(), vec!["eid", "34", "31", "21022"]);
        Ok(())
    }

    #[test]
    fn duplicate_and_blank_identifiers() -> Result<()> {
        let tables = vec![table(
            "a.csv",
            &[("21022", "21022")],
            &[&["1000001", "61"], &["", "70"], &["1000001", "62"]],
        )?];
        let merged = MergeEngine::new("eid").merge(&tables)?;
        assert_eq!(merged.table.num_rows(), 1);
        assert_eq!(merged.table.value("1000001", "21022"), Some("61"));
        assert_eq!(merged.stats.duplicate_rows, 1);
        assert_eq!(merged.stats.empty_ids, 1);
        Ok(())
    }

    #[test]
    fn writes_csv_with_empty_cells() -> Result<()> {
        let dir = TempDir::new()?;
        let merged = MergeEngine::new("eid").merge(&inputs()?)?;
        let path = dir.path().join("out.csv");
        merged.table.write_csv(&path)?;
        assert_eq!(
            fs::read_to_string(&path)?,
            "eid,21022,31,34\n100,61,0,1950\n101,55,1,\n102,,0,1960\n"
        );

        let empty = MergeEngine::new("eid").merge(&[])?;
        assert_eq!(empty.table.column_names(), vec!["eid"]);
        assert_eq!(empty.table.num_rows(), 0);
        let pq = dir.path().join("out.parquet");
        merged.table.write_parquet(&pq)?;
        assert!(fs::metadata(&pq)?.len() > 0);
        Ok(())
    }
}
