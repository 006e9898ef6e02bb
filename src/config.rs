// src/config.rs

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    path::{Path, PathBuf},
};

/// How extracted columns are named in the merged table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LabelStyle {
    /// `21022`, `21022_i0`, `21022_i0_a1`
    #[default]
    FieldId,
    /// `Age at recruitment`, `Age at recruitment_i0`, ...
    FieldName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

/// Everything one extraction run needs to know about the filesystem and its knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory holding the dictionary and the raw data files.
    pub raw_root: PathBuf,
    /// Dictionary file; relative paths are taken from `raw_root`.
    pub dictionary_path: PathBuf,
    pub output_dir: PathBuf,
    pub mapping_filename: String,
    pub output_filename: String,
    pub summary_filename: String,
    /// Rows per chunk when streaming a data file.
    pub chunk_size: usize,
    /// Rows sampled when guessing the identifier column.
    pub probe_rows: usize,
    /// Canonical name of the identifier column in every output.
    pub id_label: String,
    /// Recognised identifier column names, highest priority first.
    pub id_aliases: Vec<String>,
    pub label_style: LabelStyle,
    pub output_format: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            raw_root: PathBuf::from("."),
            dictionary_path: PathBuf::from("Data_Dictionary_Showcase.csv"),
            output_dir: PathBuf::from("extracted_data"),
            mapping_filename: "ukb_field_mapping.csv".into(),
            output_filename: "ukb_extracted_data.csv".into(),
            summary_filename: "ukb_extraction_summary.json".into(),
            chunk_size: 50_000,
            probe_rows: 100,
            id_label: "eid".into(),
            id_aliases: ["eid", "participant.eid", "participant_id", "f.eid", "n_eid"]
                .into_iter()
                .map(String::from)
                .collect(),
            label_style: LabelStyle::FieldId,
            output_format: OutputFormat::Csv,
        }
    }
}

impl Config {
    /// Config rooted at `raw_root`, everything else default.
    pub fn with_root(raw_root: impl Into<PathBuf>) -> Self {
        Self {
            raw_root: raw_root.into(),
            ..Self::default()
        }
    }

    /// Load a YAML config file. Missing keys fall back to defaults.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening config {:?}", path))?;
        let config: Config = serde_yaml::from_reader(file)
            .with_context(|| format!("parsing config {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(anyhow!("chunk_size must be greater than zero"));
        }
        if self.probe_rows == 0 {
            return Err(anyhow!("probe_rows must be greater than zero"));
        }
        if self.id_label.trim().is_empty() {
            return Err(anyhow!("id_label must not be empty"));
        }
        if self.output_filename.trim().is_empty() || self.mapping_filename.trim().is_empty() {
            return Err(anyhow!("output and mapping file names must not be empty"));
        }
        Ok(())
    }

    pub fn dictionary_file(&self) -> PathBuf {
        if self.dictionary_path.is_absolute() {
            self.dictionary_path.clone()
        } else {
            self.raw_root.join(&self.dictionary_path)
        }
    }

    pub fn mapping_file(&self) -> PathBuf {
        self.output_dir.join(&self.mapping_filename)
    }

    pub fn output_file(&self) -> PathBuf {
        let path = self.output_dir.join(&self.output_filename);
        match self.output_format {
            OutputFormat::Csv => path,
            OutputFormat::Parquet => path.with_extension("parquet"),
        }
    }

    pub fn summary_file(&self) -> PathBuf {
        self.output_dir.join(&self.summary_filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn yaml_overrides_only_given_keys() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(tmp, "raw_root: /data/ukb/raw")?;
        writeln!(tmp, "chunk_size: 1000")?;
        writeln!(tmp, "output_format: parquet")?;
        writeln!(tmp, "label_style: field_name")?;

        let config = Config::from_yaml_file(tmp.path())?;
        assert_eq!(config.raw_root, PathBuf::from("/data/ukb/raw"));
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.output_format, OutputFormat::Parquet);
        assert_eq!(config.label_style, LabelStyle::FieldName);
        assert_eq!(config.id_label, "eid");
        assert_eq!(
            config.dictionary_file(),
            PathBuf::from("/data/ukb/raw/Data_Dictionary_Showcase.csv")
        );
        assert_eq!(
            config.output_file(),
            PathBuf::from("extracted_data/ukb_extracted_data.parquet")
        );
        Ok(())
    }

    #[test]
    fn zero_chunk_size_is_rejected() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(tmp, "chunk_size: 0")?;
        assert!(Config::from_yaml_file(tmp.path()).is_err());
        Ok(())
    }

    #[test]
    fn zero_probe_rows_is_rejected() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(tmp, "probe_rows: 0")?;
        let err = Config::from_yaml_file(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("probe_rows"));

        let config = Config {
            probe_rows: 1,
            ..Config::default()
        };
        config.validate()?;
        Ok(())
    }

    #[test]
    fn absolute_dictionary_path_ignores_root() {
        let config = Config {
            dictionary_path: PathBuf::from("/elsewhere/dict.tsv"),
            ..Config::with_root("/data")
        };
        assert_eq!(config.dictionary_file(), PathBuf::from("/elsewhere/dict.tsv"));
    }
}
