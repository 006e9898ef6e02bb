// src/main.rs
use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use ukbmerge::{
    config::{LabelStyle, OutputFormat},
    request::{parse_token_list, read_token_file},
    Config, Pipeline,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Parquet,
}

#[derive(Parser)]
#[command(name = "ukbmerge")]
#[command(about = "Resolve UK Biobank fields against the data dictionary and merge them by participant")]
struct Args {
    /// Comma separated field ids or names, e.g. "21022,31,Body mass index"
    #[arg(short, long)]
    input: Option<String>,

    /// File with one field id or name per line
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// YAML config; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Mapping table file name
    #[arg(short, long)]
    mapping: Option<String>,

    /// Root directory holding the dictionary and raw data files
    #[arg(long)]
    raw_root: Option<PathBuf>,

    /// Dictionary file (relative to the raw root unless absolute)
    #[arg(long)]
    dictionary: Option<PathBuf>,

    /// Rows per chunk while streaming a data file
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Merged table format
    #[arg(long, value_enum)]
    format: Option<Format>,

    /// Label columns with field names instead of ids
    #[arg(long)]
    field_names: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> Result<(Config, Vec<String>)> {
        let mut config = match &self.config {
            Some(path) => Config::from_yaml_file(path)?,
            None => Config::default(),
        };
        if let Some(v) = self.raw_root {
            config.raw_root = v;
        }
        if let Some(v) = self.dictionary {
            config.dictionary_path = v;
        }
        if let Some(v) = self.output {
            config.output_dir = v;
        }
        if let Some(v) = self.mapping {
            config.mapping_filename = v;
        }
        if let Some(v) = self.chunk_size {
            config.chunk_size = v;
        }
        if let Some(f) = self.format {
            config.output_format = match f {
                Format::Csv => OutputFormat::Csv,
                Format::Parquet => OutputFormat::Parquet,
            };
        }
        if self.field_names {
            config.label_style = LabelStyle::FieldName;
        }
        config.validate()?;

        let mut tokens = Vec::new();
        if let Some(list) = &self.input {
            tokens.extend(parse_token_list(list));
        }
        if let Some(path) = &self.file {
            tokens.extend(read_token_file(path)?);
        }
        if self.input.is_none() && self.file.is_none() {
            bail!("no fields given; use --input or --file");
        }
        Ok((config, tokens))
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // ─── 1) init logging ─────────────────────────────────────────────
    let default_filter = if args.verbose {
        "info,ukbmerge=debug"
    } else {
        "info"
    };
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    // ─── 2) config + tokens ──────────────────────────────────────────
    let (config, tokens) = args.into_config()?;
    info!(
        raw_root = %config.raw_root.display(),
        dictionary = %config.dictionary_file().display(),
        tokens = tokens.len(),
        "startup"
    );

    // ─── 3) run ──────────────────────────────────────────────────────
    let pipeline = Pipeline::new(config);
    let out = pipeline.run(&tokens)?;
    info!(
        mapping = %out.mapping_path.display(),
        merged = %out.merged_path.display(),
        summary = %out.summary_path.display(),
        rows = out.merged.num_rows(),
        "done"
    );
    Ok(())
}
