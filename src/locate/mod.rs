// src/locate/mod.rs

use glob::{glob_with, MatchOptions, Pattern};
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::config::Config;
use crate::error::LocatorMiss;

/// Extensions tried when the dictionary path does not exist verbatim.
pub const KNOWN_EXTENSIONS: &[&str] = &["csv", "tsv", "txt", "tab"];

/// Maps dictionary paths onto files under the raw-data root.
#[derive(Debug, Clone)]
pub struct FileLocator {
    root: PathBuf,
}

/// `A > B > C` (showcase hierarchy) and `A\B\C` both become `A/B/C`.
fn normalise_relative(raw: &str) -> PathBuf {
    let unified = raw.trim().replace(" > ", "/").replace('\\', "/");
    let mut out = PathBuf::new();
    for part in unified.split('/').map(str::trim) {
        if part.is_empty() || part == "." {
            continue;
        }
        out.push(part);
    }
    out
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

fn known_extension(path: &Path) -> Option<usize> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    KNOWN_EXTENSIONS.iter().position(|k| *k == ext)
}

impl FileLocator {
    pub fn new(config: &Config) -> Self {
        Self::with_root(&config.raw_root)
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn miss(&self, relative_path: &str) -> LocatorMiss {
        LocatorMiss {
            relative_path: relative_path.to_string(),
            root: self.root.clone(),
        }
    }

    /// Find the file behind a dictionary path, or `None`.
    ///
    /// Tries, in order: the path as given, the path with each known extension, and a
    /// case-insensitive search for the same file name.
    pub fn locate(&self, relative_path: &str) -> Option<PathBuf> {
        let rel = normalise_relative(relative_path);
        if rel.as_os_str().is_empty() {
            return None;
        }
        let exact = self.root.join(&rel);
        if exact.is_file() {
            return Some(exact);
        }

        let base = if known_extension(&rel).is_some() {
            rel.with_extension("")
        } else {
            rel.clone()
        };
        let base_abs = self.root.join(&base);
        if base_abs != exact && base_abs.is_file() {
            debug!(from = %rel.display(), to = %base_abs.display(), "located without extension");
            return Some(base_abs);
        }
        for ext in KNOWN_EXTENSIONS {
            let candidate = append_extension(&base_abs, ext);
            if candidate != exact && candidate.is_file() {
                debug!(from = %rel.display(), to = %candidate.display(), "located by extension");
                return Some(candidate);
            }
        }

        let found = self.search_case_insensitive(&base_abs);
        match &found {
            Some(p) => debug!(from = %rel.display(), to = %p.display(), "located case-insensitively"),
            None => debug!(path = %rel.display(), "no file found"),
        }
        found
    }

    /// Lists the parent directory and compares names case-insensitively. Glob does not
    /// case-fold a literal component, so the file name itself must be a wildcard.
    fn search_case_insensitive(&self, base_abs: &Path) -> Option<PathBuf> {
        let base_name = base_abs.file_name()?.to_string_lossy().to_lowercase();
        let parent = base_abs.parent().unwrap_or(&self.root);
        let pattern = format!("{}/*", Pattern::escape(&parent.to_string_lossy()));
        let options = MatchOptions {
            case_sensitive: false,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        let paths = glob_with(&pattern, options).ok()?;

        // exact name first, then known extensions in preference order
        paths
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .filter_map(|p| {
                let name = p.file_name()?.to_string_lossy().to_lowercase();
                if name == base_name {
                    return Some((0, p));
                }
                let stem = p.file_stem()?.to_string_lossy().to_lowercase();
                if stem != base_name {
                    return None;
                }
                known_extension(&p).map(|rank| (rank + 1, p))
            })
            .min_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
            .map(|(_, p)| p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, rel: &str, content: &str) -> Result<PathBuf> {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    #[test]
    fn finds_exact_path() -> Result<()> {
        let dir = TempDir::new()?;
        let file = touch(dir.path(), "fileA.csv", "eid,21022\n")?;
        let locator = FileLocator::with_root(dir.path());
        assert_eq!(locator.locate("fileA.csv"), Some(file));
        assert_eq!(locator.locate("  fileA.csv "), Some(dir.path().join("fileA.csv")));
        Ok(())
    }

    #[test]
    fn showcase_hierarchy_gets_csv_extension() -> Result<()> {
        let dir = TempDir::new()?;
        let file = touch(
            dir.path(),
            "Population characteristics/Baseline characteristics.csv",
            "eid,31\n",
        )?;
        let locator = FileLocator::with_root(dir.path());
        assert_eq!(
            locator.locate("Population characteristics > Baseline characteristics"),
            Some(file)
        );
        Ok(())
    }

    #[test]
    fn swaps_known_extensions() -> Result<()> {
        let dir = TempDir::new()?;
        let file = touch(dir.path(), "assess/fileB.tsv", "eid\t31\n")?;
        let locator = FileLocator::with_root(dir.path());
        assert_eq!(locator.locate("assess/fileB.csv"), Some(file.clone()));
        assert_eq!(locator.locate("assess/fileB"), Some(file));
        Ok(())
    }

    #[test]
    fn falls_back_to_case_insensitive_name() -> Result<()> {
        let dir = TempDir::new()?;
        touch(dir.path(), "Blood/BIOCHEMISTRY.CSV", "eid,30690\n")?;
        let locator = FileLocator::with_root(dir.path());
        let found = locator.locate("Blood/biochemistry.csv").expect("located");
        assert_eq!(fs::read_to_string(found)?, "eid,30690\n");
        Ok(())
    }

    #[test]
    fn case_insensitive_name_without_known_extension() -> Result<()> {
        let dir = TempDir::new()?;
        let bare = touch(dir.path(), "Data/FILEA", "eid,21022\n")?;
        let other = touch(dir.path(), "Data/Other.dat", "eid,31\n")?;
        let locator = FileLocator::with_root(dir.path());
        assert_eq!(locator.locate("Data/filea"), Some(bare));
        assert_eq!(locator.locate("Data/other.dat"), Some(other));
        assert_eq!(locator.locate("Data/other.bin"), None);
        Ok(())
    }

    #[test]
    fn case_insensitive_prefers_exact_name_over_extension() -> Result<()> {
        let dir = TempDir::new()?;
        touch(dir.path(), "Blood/Counts.TSV", "eid\t30000\n")?;
        let bare = touch(dir.path(), "Blood/COUNTS", "eid,30000\n")?;
        let locator = FileLocator::with_root(dir.path());
        assert_eq!(locator.locate("Blood/counts"), Some(bare));
        Ok(())
    }

    #[test]
    fn similar_names_do_not_match() -> Result<()> {
        let dir = TempDir::new()?;
        touch(dir.path(), "fileA_extra.csv", "eid,1\n")?;
        let locator = FileLocator::with_root(dir.path());
        assert_eq!(locator.locate("fileA.csv"), None);
        assert_eq!(locator.locate(""), None);
        let miss = locator.miss("fileA.csv");
        assert_eq!(miss.relative_path, "fileA.csv");
        Ok(())
    }
}
