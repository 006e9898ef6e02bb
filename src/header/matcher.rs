// src/header/matcher.rs

use tracing::trace;

use super::rules::{ColumnKey, FieldKey, RuleSet};
use crate::catalog::FieldEntry;
use crate::config::LabelStyle;

/// A header column that carries (one instance/array slot of) a requested field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedColumn {
    /// Position in the file header.
    pub index: usize,
    /// Column name as it appears in the file.
    pub column: String,
    pub field_id: String,
    pub instance: Option<u32>,
    pub array: Option<u32>,
    /// Rule that decoded the column.
    pub rule: &'static str,
}

impl MatchedColumn {
    /// Output label: base plus `_i<instance>` / `_a<array>` suffixes.
    pub fn label(&self, style: LabelStyle, field_name: &str) -> String {
        let base = match style {
            LabelStyle::FieldName if !field_name.trim().is_empty() => field_name.trim(),
            _ => self.field_id.as_str(),
        };
        let mut label = base.to_string();
        if let Some(i) = self.instance {
            label.push_str(&format!("_i{}", i));
        }
        if let Some(a) = self.array {
            label.push_str(&format!("_a{}", a));
        }
        label
    }
}

/// A header decoded once against a rule set.
#[derive(Debug)]
pub struct DecodedHeader {
    columns: Vec<(String, Option<(&'static str, ColumnKey)>)>,
}

impl DecodedHeader {
    fn collect<F>(&self, field_id: &str, accept: F) -> Vec<MatchedColumn>
    where
        F: Fn(&FieldKey) -> bool,
    {
        self.columns
            .iter()
            .enumerate()
            .filter_map(|(index, (column, decoded))| {
                let (rule, key) = decoded.as_ref()?;
                if !accept(&key.field) {
                    return None;
                }
                Some(MatchedColumn {
                    index,
                    column: column.clone(),
                    field_id: field_id.to_string(),
                    instance: key.instance,
                    array: key.array,
                    rule: *rule,
                })
            })
            .collect()
    }

    /// Columns whose decoded id equals `field_id`, in header order.
    pub fn by_id(&self, field_id: &str) -> Vec<MatchedColumn> {
        let wanted = field_id.trim();
        self.collect(wanted, |key| matches!(key, FieldKey::Id(id) if id == wanted))
    }

    /// Columns titled with `field_name` (case-insensitive), in header order.
    pub fn by_name(&self, field_id: &str, field_name: &str) -> Vec<MatchedColumn> {
        let wanted = field_name.trim().to_lowercase();
        if wanted.is_empty() {
            return Vec::new();
        }
        self.collect(field_id.trim(), |key| {
            matches!(key, FieldKey::Name(name) if name.to_lowercase() == wanted)
        })
    }

    /// Id-coded columns first; title columns only if the file has none.
    pub fn by_field(&self, entry: &FieldEntry) -> Vec<MatchedColumn> {
        let found = self.by_id(&entry.field_id);
        if !found.is_empty() {
            return found;
        }
        let named = self.by_name(&entry.field_id, &entry.field_name);
        if !named.is_empty() {
            trace!(field_id = %entry.field_id, "matched by field title");
        }
        named
    }
}

/// Finds the physical columns that hold a field, using an ordered [`RuleSet`].
#[derive(Debug, Default)]
pub struct ColumnMatcher {
    rules: RuleSet,
}

impl ColumnMatcher {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn decode(&self, header: &[String]) -> DecodedHeader {
        DecodedHeader {
            columns: header
                .iter()
                .map(|c| (c.clone(), self.rules.parse(c)))
                .collect(),
        }
    }

    /// All columns of `header` that encode `field_id`, in header order.
    pub fn match_columns(&self, header: &[String], field_id: &str) -> Vec<MatchedColumn> {
        self.decode(header).by_id(field_id)
    }

    pub fn match_field(&self, header: &[String], entry: &FieldEntry) -> Vec<MatchedColumn> {
        self.decode(header).by_field(entry)
    }
}
