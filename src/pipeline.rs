// src/pipeline.rs

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use tracing::{info, warn};

use crate::{
    catalog::Catalog,
    config::{Config, OutputFormat},
    extract::Extractor,
    locate::FileLocator,
    merge::{MergeEngine, MergedTable},
    report::{Outputs, RunSummary},
    resolve::{write_mapping_csv, FieldResolver, MappingRow, Query},
};

/// What one run produced, in memory and on disk.
#[derive(Debug)]
pub struct RunOutput {
    pub mapping: Vec<MappingRow>,
    pub merged: MergedTable,
    pub summary: RunSummary,
    pub mapping_path: PathBuf,
    pub merged_path: PathBuf,
    pub summary_path: PathBuf,
}

/// One extraction run: resolve, locate, extract per file, merge, write.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Only a bad dictionary or an unwritable output aborts the run. Every other failure is
    /// recorded in the mapping table and the summary.
    pub fn run<S: AsRef<str>>(&self, tokens: &[S]) -> Result<RunOutput> {
        let config = &self.config;
        let mut summary = RunSummary::start(config.dictionary_file());

        let catalog = Catalog::load(config)
            .with_context(|| format!("loading dictionary {:?}", config.dictionary_file()))?;
        info!(fields = catalog.len(), "dictionary loaded");

        if tokens.is_empty() {
            warn!("no fields requested; writing empty outputs");
        }
        let locator = FileLocator::new(config);
        let resolver = FieldResolver::new(&catalog, &locator);
        let query = Query::build(&resolver, tokens);
        summary.record_query(tokens.len(), &query);

        fs::create_dir_all(&config.output_dir)
            .with_context(|| format!("creating output directory {:?}", config.output_dir))?;
        let mapping_path = config.mapping_file();
        write_mapping_csv(query.mapping(), &mapping_path)?;
        info!(path = %mapping_path.display(), rows = query.mapping().len(), "mapping table written");

        let extractor = Extractor::new(config);
        let mut tables = Vec::with_capacity(query.files().len());
        for file in query.files() {
            match extractor.extract_file(&file.path, &file.fields) {
                Ok(extraction) => {
                    summary.record_unmatched(&file.path, &extraction.unmatched);
                    if let Some(e) = &extraction.truncated {
                        summary.record_truncated(&file.path, e);
                    }
                    tables.push(extraction.table);
                }
                Err(e) => {
                    warn!(path = %file.path.display(), error = %e, "file skipped");
                    summary.record_file_error(&file.path, &e);
                }
            }
        }
        summary.files_merged = tables.len();

        let merged = MergeEngine::new(config.id_label.clone())
            .with_field_order(query.field_order())
            .merge(&tables)
            .context("merging extracted tables")?;
        // partial tables are no longer needed once merged
        drop(tables);

        let merged_path = config.output_file();
        match config.output_format {
            OutputFormat::Csv => merged.table.write_csv(&merged_path)?,
            OutputFormat::Parquet => merged.table.write_parquet(&merged_path)?,
        }

        let summary_path = config.summary_file();
        summary.rows = merged.table.num_rows();
        summary.columns = merged.table.column_names();
        summary.merge = merged.stats;
        summary.outputs = Outputs {
            mapping: mapping_path.clone(),
            merged: merged_path.clone(),
            summary: summary_path.clone(),
        };
        summary.finish();
        summary.write_json(&summary_path)?;
        summary.log();

        Ok(RunOutput {
            mapping: query.mapping().to_vec(),
            merged: merged.table,
            summary,
            mapping_path,
            merged_path,
            summary_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DictionaryFormatError;
    use std::ffi::OsStr;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    use tempfile::TempDir;

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,ukbmerge=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    const DICTIONARY: &str = "FieldID,Field,Path\n\
                              21022,Age at recruitment,fileA.csv\n\
                              31,Sex,fileB.csv\n";

    fn raw_root(file_a: &str, file_b: &str) -> Result<(TempDir, Config)> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("Data_Dictionary_Showcase.csv"), DICTIONARY)?;
        fs::write(dir.path().join("fileA.csv"), file_a)?;
        fs::write(dir.path().join("fileB.csv"), file_b)?;
        let config = Config {
            output_dir: dir.path().join("out"),
            ..Config::with_root(dir.path())
        };
        Ok((dir, config))
    }

    #[test]
    fn merges_two_files_on_the_identifier() -> Result<()> {
        init_test_logging();
        let (dir, config) = raw_root("eid,21022\n1000001,61\n", "participant_id,31\n1000001,0\n")?;
        let out = Pipeline::new(config).run(&["21022", "31"])?;

        assert_eq!(out.mapping.len(), 2);
        assert_eq!(out.mapping[0].field_id, "21022");
        assert_eq!(out.mapping[1].field_name, "Sex");
        assert_eq!(
            out.mapping[1].resolved_file_path,
            dir.path().join("fileB.csv").display().to_string()
        );

        assert_eq!(
            fs::read_to_string(&out.merged_path)?,
            "eid,21022,31\n1000001,61,0\n"
        );
        assert!(out.mapping_path.exists());
        assert!(out.summary_path.exists());
        assert!(out.summary.file_errors.is_empty());
        Ok(())
    }

    #[test]
    fn duplicate_identifier_keeps_first_row() -> Result<()> {
        init_test_logging();
        let (_dir, config) = raw_root(
            "eid,21022\n1000001,61\n1000001,62\n",
            "participant_id,31\n1000001,0\n",
        )?;
        let out = Pipeline::new(config).run(&["21022", "31"])?;
        assert_eq!(out.merged.num_rows(), 1);
        assert_eq!(out.merged.value("1000001", "21022"), Some("61"));
        assert_eq!(out.summary.merge.duplicate_rows, 1);
        Ok(())
    }

    #[test]
    fn unknown_field_is_mapped_but_not_merged() -> Result<()> {
        init_test_logging();
        let (_dir, config) = raw_root("eid,21022\n1000001,61\n", "participant_id,31\n1000001,0\n")?;
        let out = Pipeline::new(config).run(&["21022", "99999"])?;

        assert_eq!(out.mapping.len(), 2);
        assert_eq!(out.mapping[1].field_id, "99999");
        assert_eq!(out.mapping[1].resolved_file_path, "");
        assert_eq!(out.merged.column_names(), vec!["eid", "21022"]);
        assert_eq!(out.summary.skipped_tokens.len(), 1);

        let mapping = fs::read_to_string(&out.mapping_path)?;
        assert!(mapping.lines().any(|l| l == ",,99999,"));
        Ok(())
    }

    #[test]
    fn bad_file_is_reported_and_the_rest_merged() -> Result<()> {
        init_test_logging();
        let (_dir, config) = raw_root("eid,21022\n1000001,61\n", "site,31\nLeeds,0\n")?;
        let config = Config {
            output_format: OutputFormat::Parquet,
            ..config
        };
        let out = Pipeline::new(config).run(&["Age at", "Sex"])?;

        assert_eq!(out.merged.column_names(), vec!["eid", "21022"]);
        assert_eq!(out.summary.file_errors.len(), 1);
        assert_eq!(out.summary.file_errors[0].kind, "no_id_column");
        assert_eq!(out.summary.fuzzy_matches, 1);
        assert_eq!(out.merged_path.extension(), Some(OsStr::new("parquet")));
        assert!(out.merged_path.exists());
        Ok(())
    }

    #[test]
    fn bad_row_after_first_chunk_is_reported_as_truncated() -> Result<()> {
        init_test_logging();
        let (_dir, config) = raw_root(
            "eid,21022\n1000001,61\n1000002\n1000003,70\n",
            "participant_id,31\n1000001,0\n1000003,1\n",
        )?;
        let config = Config {
            chunk_size: 1,
            ..config
        };
        let out = Pipeline::new(config).run(&["21022", "31"])?;

        assert_eq!(out.summary.truncated_files.len(), 1);
        assert_eq!(out.summary.truncated_files[0].kind, "parse");
        assert!(out.summary.file_errors.is_empty());
        assert_eq!(out.summary.files_merged, 2);
        assert_eq!(out.merged.value("1000001", "21022"), Some("61"));
        assert_eq!(out.merged.value("1000003", "21022"), None);
        assert_eq!(out.merged.value("1000003", "31"), Some("1"));

        let written = fs::read_to_string(&out.summary_path)?;
        assert!(written.contains("truncated_files"));
        Ok(())
    }

    #[test]
    fn dictionary_without_path_column_is_fatal() -> Result<()> {
        let dir = TempDir::new()?;
        fs::write(
            dir.path().join("Data_Dictionary_Showcase.csv"),
            "FieldID,Field\n31,Sex\n",
        )?;
        let config = Config {
            output_dir: dir.path().join("out"),
            ..Config::with_root(dir.path())
        };
        let err = Pipeline::new(config).run(&["31"]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DictionaryFormatError>(),
            Some(DictionaryFormatError::MissingColumn { role: "path", .. })
        ));
        assert!(!dir.path().join("out").exists());
        Ok(())
    }

    #[test]
    fn empty_request_writes_empty_outputs() -> Result<()> {
        let (_dir, config) = raw_root("eid,21022\n1000001,61\n", "participant_id,31\n1000001,0\n")?;
        let out = Pipeline::new(config).run::<&str>(&[])?;
        assert!(out.mapping.is_empty());
        assert_eq!(fs::read_to_string(&out.merged_path)?, "eid\n");
        Ok(())
    }
}
