// src/catalog/mod.rs

mod load;

use serde::Serialize;
use std::collections::HashMap;

pub use load::{ID_ALIASES, NAME_ALIASES, PATH_ALIASES};

/// One dictionary row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FieldEntry {
    pub field_id: String,
    pub field_name: String,
    /// Path as written in the dictionary, relative to the raw-data root.
    pub relative_path: String,
}

/// In-memory, read-only view of the data dictionary.
#[derive(Debug, Default)]
pub struct Catalog {
    /// Entries in dictionary row order.
    entries: Vec<FieldEntry>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog from entries in row order.
    ///
    /// A repeated `field_id` keeps its first entry; a repeated `field_name` points at the last.
    pub fn from_entries(entries: impl IntoIterator<Item = FieldEntry>) -> Self {
        let mut catalog = Catalog::default();
        for entry in entries {
            catalog.push(entry);
        }
        catalog
    }

    fn push(&mut self, entry: FieldEntry) -> bool {
        if self.by_id.contains_key(&entry.field_id) {
            return false;
        }
        let idx = self.entries.len();
        self.by_id.insert(entry.field_id.clone(), idx);
        if !entry.field_name.is_empty() {
            self.by_name.insert(entry.field_name.clone(), idx);
        }
        self.entries.push(entry);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FieldEntry] {
        &self.entries
    }

    pub fn by_id(&self, field_id: &str) -> Option<&FieldEntry> {
        self.by_id.get(field_id.trim()).map(|&i| &self.entries[i])
    }

    pub fn by_name_exact(&self, name: &str) -> Option<&FieldEntry> {
        self.by_name.get(name.trim()).map(|&i| &self.entries[i])
    }

    /// Case-insensitive containment match, in catalog row order.
    pub fn by_name_fuzzy(&self, fragment: &str) -> Vec<&FieldEntry> {
        let needle = fragment.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.entries
            .iter()
            .filter(|e| e.field_name.to_lowercase().contains(&needle))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, name: &str, path: &str) -> FieldEntry {
        FieldEntry {
            field_id: id.into(),
            field_name: name.into(),
            relative_path: path.into(),
        }
    }

    fn sample() -> Catalog {
        Catalog::from_entries(vec![
            entry("21022", "Age at recruitment", "fileA.csv"),
            entry("31", "Sex", "fileB.csv"),
            entry("34", "Year of birth", "fileB.csv"),
            entry("52", "Month of birth", "fileB.csv"),
        ])
    }

    #[test]
    fn looks_up_by_id_and_exact_name() {
        let catalog = sample();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.by_id("31").map(|e| e.field_name.as_str()), Some("Sex"));
        assert_eq!(catalog.by_id(" 21022 ").map(|e| e.relative_path.as_str()), Some("fileA.csv"));
        assert!(catalog.by_id("99999").is_none());
        assert_eq!(
            catalog.by_name_exact("Year of birth").map(|e| e.field_id.as_str()),
            Some("34")
        );
        assert!(catalog.by_name_exact("year of birth").is_none());
    }

    #[test]
    fn fuzzy_is_case_insensitive_and_row_ordered() {
        let catalog = sample();
        let hits: Vec<&str> = catalog
            .by_name_fuzzy("OF BIRTH")
            .iter()
            .map(|e| e.field_id.as_str())
            .collect();
        assert_eq!(hits, vec!["34", "52"]);
        assert!(catalog.by_name_fuzzy("   ").is_empty());
        assert!(catalog.by_name_fuzzy("cholesterol").is_empty());
    }

    #[test]
    fn duplicate_ids_keep_first_and_duplicate_names_keep_last() {
        let catalog = Catalog::from_entries(vec![
            entry("1", "Alpha", "a.csv"),
            entry("1", "Shadow", "b.csv"),
            entry("2", "Alpha", "c.csv"),
        ]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.by_id("1").map(|e| e.relative_path.as_str()), Some("a.csv"));
        assert_eq!(catalog.by_name_exact("Alpha").map(|e| e.field_id.as_str()), Some("2"));
        assert!(catalog.by_name_exact("Shadow").is_none());
    }
}
