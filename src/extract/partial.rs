// src/extract/partial.rs

use arrow::{
    array::{new_empty_array, Array, ArrayRef, AsArray, StringArray},
    compute::concat_batches,
    datatypes::{DataType, Field, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Arrow field metadata key holding the source field id of a value column.
pub const FIELD_ID_KEY: &str = "ukbmerge.field_id";

/// Output label and source field id of one value column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub label: String,
    pub field_id: String,
}

impl ColumnSpec {
    pub fn new(label: impl Into<String>, field_id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            field_id: field_id.into(),
        }
    }
}

/// A value column borrowed from a [`PartialTable`].
#[derive(Debug, Clone, Copy)]
pub struct ValueColumn<'a> {
    pub label: &'a str,
    pub field_id: Option<&'a str>,
    pub values: &'a StringArray,
}

/// One file's extraction: identifier in column 0, then the matched field columns.
/// Every column is nullable UTF-8.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialTable {
    source: PathBuf,
    batch: RecordBatch,
}

fn value_field(col: &ColumnSpec) -> Field {
    Field::new(&col.label, DataType::Utf8, true).with_metadata(HashMap::from([(
        FIELD_ID_KEY.to_string(),
        col.field_id.clone(),
    )]))
}

impl PartialTable {
    /// Wrap a batch whose first column is the identifier.
    pub fn try_new(source: impl Into<PathBuf>, batch: RecordBatch) -> Result<Self, ArrowError> {
        if batch.num_columns() == 0 {
            return Err(ArrowError::SchemaError(
                "partial table needs an identifier column".into(),
            ));
        }
        if let Some(f) = batch
            .schema()
            .fields()
            .iter()
            .find(|f| f.data_type() != &DataType::Utf8)
        {
            return Err(ArrowError::SchemaError(format!(
                "column `{}` is {}, expected Utf8",
                f.name(),
                f.data_type()
            )));
        }
        Ok(Self {
            source: source.into(),
            batch,
        })
    }

    /// Concatenate projected chunks (id first, then one column per entry of `columns`) and relabel them.
    pub fn from_chunks(
        source: impl Into<PathBuf>,
        id_label: &str,
        columns: &[ColumnSpec],
        chunks: &[RecordBatch],
    ) -> Result<Self, ArrowError> {
        let mut fields = Vec::with_capacity(columns.len() + 1);
        fields.push(Field::new(id_label, DataType::Utf8, true));
        fields.extend(columns.iter().map(value_field));
        let schema = Arc::new(Schema::new(fields));

        let arrays: Vec<ArrayRef> = match chunks.first() {
            Some(first) => concat_batches(&first.schema(), chunks)?.columns().to_vec(),
            None => (0..schema.fields().len())
                .map(|_| new_empty_array(&DataType::Utf8))
                .collect(),
        };
        if arrays.len() != schema.fields().len() {
            return Err(ArrowError::SchemaError(format!(
                "chunks have {} columns, expected {}",
                arrays.len(),
                schema.fields().len()
            )));
        }
        Self::try_new(source, RecordBatch::try_new(schema, arrays)?)
    }

    /// Build from row-major values; `None` is a missing cell.
    pub fn from_rows(
        source: impl Into<PathBuf>,
        id_label: &str,
        columns: &[ColumnSpec],
        rows: &[Vec<Option<&str>>],
    ) -> Result<Self, ArrowError> {
        let width = columns.len() + 1;
        if let Some(bad) = rows.iter().position(|r| r.len() != width) {
            return Err(ArrowError::InvalidArgumentError(format!(
                "row {} has {} cells, expected {}",
                bad,
                rows[bad].len(),
                width
            )));
        }
        let arrays: Vec<ArrayRef> = (0..width)
            .map(|c| Arc::new(rows.iter().map(|r| r[c]).collect::<StringArray>()) as ArrayRef)
            .collect();
        let mut fields = vec![Field::new(id_label, DataType::Utf8, true)];
        fields.extend(columns.iter().map(value_field));
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
        Self::try_new(source, batch)
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn id_label(&self) -> String {
        self.batch.schema().field(0).name().clone()
    }

    pub fn ids(&self) -> &StringArray {
        self.batch.column(0).as_string::<i32>()
    }

    pub fn value_columns(&self) -> Vec<ValueColumn<'_>> {
        let schema = self.batch.schema_ref();
        schema
            .fields()
            .iter()
            .zip(self.batch.columns())
            .skip(1)
            .map(|(field, array)| ValueColumn {
                label: field.name().as_str(),
                field_id: field.metadata().get(FIELD_ID_KEY).map(String::as_str),
                values: array.as_string::<i32>(),
            })
            .collect()
    }

    /// Value of `label` on the first row whose identifier is `id`.
    pub fn value(&self, id: &str, label: &str) -> Option<&str> {
        let row = self.ids().iter().position(|v| v == Some(id))?;
        let col = self.value_columns().into_iter().find(|c| c.label == label)?;
        if col.values.is_null(row) {
            None
        } else {
            Some(col.values.value(row))
        }
    }
}
