// src/merge/table.rs

use anyhow::{Context, Result};
use arrow::{
    array::{Array, AsArray, StringArray},
    csv::WriterBuilder,
    record_batch::RecordBatch,
};
use parquet::{
    arrow::ArrowWriter,
    basic::Compression,
    file::properties::WriterProperties,
};
use std::{fs::File, path::Path};
use tracing::info;

/// The merged, participant-indexed table: identifier first, every column nullable UTF-8.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedTable {
    batch: RecordBatch,
}

impl MergedTable {
    pub(crate) fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn ids(&self) -> &StringArray {
        self.batch.column(0).as_string::<i32>()
    }

    /// Cell for identifier `id` under `label`; `None` if either is absent or the cell is empty.
    pub fn value(&self, id: &str, label: &str) -> Option<&str> {
        let row = self.ids().iter().position(|v| v == Some(id))?;
        let col = self.batch.column_by_name(label)?.as_string::<i32>();
        (!col.is_null(row)).then(|| col.value(row))
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("creating {:?}", path))?;
        let mut writer = WriterBuilder::new().with_header(true).build(file);
        writer
            .write(&self.batch)
            .with_context(|| format!("writing merged table to {:?}", path))?;
        info!(path = %path.display(), rows = self.num_rows(), "merged table written");
        Ok(())
    }

    pub fn write_parquet(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("creating {:?}", path))?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, self.batch.schema(), Some(props))?;
        writer.write(&self.batch)?;
        writer.close()?;
        info!(path = %path.display(), rows = self.num_rows(), "merged table written as parquet");
        Ok(())
    }
}
