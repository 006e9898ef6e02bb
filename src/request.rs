// src/request.rs

use anyhow::{Context, Result};
use std::{fs, path::Path};

/// Split a comma separated list of field tokens. Full-width commas count as separators.
pub fn parse_token_list(input: &str) -> Vec<String> {
    input
        .split([',', '\u{ff0c}'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// One token per line; blank lines and `#` comments are ignored.
pub fn read_token_file<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let text =
        fs::read_to_string(path).with_context(|| format!("reading token file {:?}", path))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn splits_on_ascii_and_fullwidth_commas() {
        assert_eq!(
            parse_token_list(" 21022, Sex ，31,, "),
            vec!["21022", "Sex", "31"]
        );
        assert!(parse_token_list("").is_empty());
    }

    #[test]
    fn token_file_skips_blanks_and_comments() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(tmp, "# demographics")?;
        writeln!(tmp, "21022")?;
        writeln!(tmp)?;
        writeln!(tmp, "  Sex  ")?;
        assert_eq!(read_token_file(tmp.path())?, vec!["21022", "Sex"]);
        Ok(())
    }
}
