use std::path::Path;
use tracing::debug;

use crate::config::Config;
use crate::error::DetectionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedBy {
    /// Header matched the alias at this rank.
    Alias(usize),
    /// First column whose probed values are all integers.
    IntegerProbe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedId {
    pub index: usize,
    pub column: String,
    pub by: DetectedBy,
}

/// Picks the participant identifier column of a file.
#[derive(Debug, Clone)]
pub struct IdColumnDetector {
    aliases: Vec<String>,
}

fn is_integer(value: &str) -> bool {
    let v = value.trim().trim_matches('"');
    let digits = v.strip_prefix('-').unwrap_or(v);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

impl IdColumnDetector {
    /// `aliases` are tried in order; the canonical name should come first.
    pub fn new<I, S>(aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            aliases: aliases.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut aliases = vec![config.id_label.clone()];
        aliases.extend(
            config
                .id_aliases
                .iter()
                .filter(|a| !a.eq_ignore_ascii_case(&config.id_label))
                .cloned(),
        );
        Self::new(aliases)
    }

    /// Alias lookup first (by alias rank, not header position), then the integer probe over
    /// `sample`. Columns listed in `exclude` are never picked by the probe.
    pub fn detect(
        &self,
        path: &Path,
        header: &[String],
        sample: &[Vec<String>],
        exclude: &[usize],
    ) -> Result<DetectedId, DetectionError> {
        for (rank, alias) in self.aliases.iter().enumerate() {
            if let Some(index) = header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(alias.trim()))
            {
                return Ok(DetectedId {
                    index,
                    column: header[index].clone(),
                    by: DetectedBy::Alias(rank),
                });
            }
        }

        for (index, column) in header.iter().enumerate() {
            if exclude.contains(&index) {
                continue;
            }
            let mut seen = 0usize;
            let all_integers = sample.iter().all(|row| match row.get(index) {
                Some(v) if !v.trim().is_empty() => {
                    seen += 1;
                    is_integer(v)
                }
                _ => true,
            });
            if all_integers && seen > 0 {
                debug!(path = %path.display(), column = %column, "identifier column guessed from values");
                return Ok(DetectedId {
                    index,
                    column: column.clone(),
                    by: DetectedBy::IntegerProbe,
                });
            }
        }

        Err(DetectionError::NoIdColumn {
            path: path.to_path_buf(),
            columns: header.len(),
        })
    }
}
