// src/extract/sniff.rs

use csv::ReaderBuilder;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::error::ParseError;

/// Candidate separators, in tie-break order.
pub const SEPARATORS: [u8; 3] = [b',', b'\t', b';'];

/// Header and a few leading rows of a delimited file.
#[derive(Debug, Clone)]
pub struct FileProbe {
    pub path: PathBuf,
    pub separator: u8,
    pub header: Vec<String>,
    pub sample: Vec<Vec<String>>,
}

/// Trim whitespace, a UTF-8 BOM and outer quotes from a header cell.
pub fn clean_header(raw: &str) -> String {
    let trimmed = raw.trim_start_matches('\u{feff}').trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Lines after the header consulted when candidates tie on the header.
const SNIFF_LINES: usize = 5;

fn separator_counts(line: &str) -> [usize; SEPARATORS.len()] {
    let mut counts = [0usize; SEPARATORS.len()];
    let mut in_quotes = false;
    for b in line.bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes {
            continue;
        }
        if let Some(i) = SEPARATORS.iter().position(|&s| s == b) {
            counts[i] += 1;
        }
    }
    counts
}

/// Pick the candidate that occurs most often outside quotes in `line`.
pub fn sniff_line(line: &str) -> Option<u8> {
    sniff_lines::<&str>(line, &[])
}

/// Pick the candidate that occurs most often outside quotes in `header`.
///
/// Titles such as `Diagnoses - ICD10, main` can make two candidates tie on the header. A tie
/// goes to the candidate whose count repeats on the most `following` lines, then to the
/// earlier candidate in [`SEPARATORS`].
pub fn sniff_lines<S: AsRef<str>>(header: &str, following: &[S]) -> Option<u8> {
    let counts = separator_counts(header);
    let best = *counts.iter().max()?;
    if best == 0 {
        return None;
    }
    let tied: Vec<usize> = (0..SEPARATORS.len()).filter(|&i| counts[i] == best).collect();
    if tied.len() == 1 {
        return Some(SEPARATORS[tied[0]]);
    }

    let rows: Vec<[usize; SEPARATORS.len()]> = following
        .iter()
        .map(|l| l.as_ref())
        .filter(|l| !l.trim().is_empty())
        .map(separator_counts)
        .collect();
    // max_by_key keeps the last maximum, so walk in reverse to favour earlier candidates
    let idx = tied
        .into_iter()
        .rev()
        .max_by_key(|&i| rows.iter().filter(|r| r[i] == best).count())?;
    Some(SEPARATORS[idx])
}

/// Detect the separator of `path` from its header, looking a few lines further on a tie.
pub fn sniff_separator(path: &Path) -> Result<u8, ParseError> {
    let io_err = |source: std::io::Error| ParseError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;
    let mut lines = BufReader::new(file).lines();
    let first = match lines.next() {
        Some(line) => line.map_err(io_err)?,
        None => return Err(ParseError::EmptyFile(path.to_path_buf())),
    };
    if first.trim().is_empty() {
        return Err(ParseError::EmptyFile(path.to_path_buf()));
    }
    let following = lines
        .take(SNIFF_LINES)
        .collect::<Result<Vec<String>, _>>()
        .map_err(io_err)?;

    let sep = sniff_lines(&first, &following).ok_or_else(|| ParseError::UndetectedSeparator {
        path: path.to_path_buf(),
        candidates: SEPARATORS.iter().map(|&b| b as char).collect(),
    })?;
    debug!(path = %path.display(), separator = ?(sep as char), "sniffed separator");
    Ok(sep)
}

/// Sniff the separator, then read the header and up to `rows` records.
pub fn probe_file(path: &Path, rows: usize) -> Result<FileProbe, ParseError> {
    let separator = sniff_separator(path)?;
    let mut rdr = ReaderBuilder::new()
        .delimiter(separator)
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|source| ParseError::Header {
            path: path.to_path_buf(),
            source,
        })?;

    let header: Vec<String> = rdr
        .headers()
        .map_err(|source| ParseError::Header {
            path: path.to_path_buf(),
            source,
        })?
        .iter()
        .map(clean_header)
        .collect();

    let mut sample = Vec::with_capacity(rows);
    for result in rdr.records().take(rows) {
        // a bad record in the probe only shortens the sample
        match result {
            Ok(record) => sample.push(record.iter().map(|s| s.trim().to_string()).collect()),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "probe stopped early");
                break;
            }
        }
    }

    Ok(FileProbe {
        path: path.to_path_buf(),
        separator,
        header,
        sample,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn sniffs_most_frequent_separator() {
        assert_eq!(sniff_line("eid,21022,31"), Some(b','));
        assert_eq!(sniff_line("eid\t21022-0.0\t31-0.0"), Some(b'\t'));
        assert_eq!(sniff_line("eid;21022;31"), Some(b';'));
        // commas inside quotes do not count
        assert_eq!(sniff_line("\"a,b,c\";x;y"), Some(b';'));
        assert_eq!(sniff_line("eid"), None);
    }

    #[test]
    fn ties_prefer_comma() {
        assert_eq!(sniff_line("a,b\tc"), Some(b','));
        assert_eq!(sniff_line("a\tb;c"), Some(b'\t'));
    }

    #[test]
    fn ties_go_to_the_separator_repeated_below() {
        let header = "Participant ID\tDiagnoses - ICD10, main | Instance 0";
        assert_eq!(sniff_line(header), Some(b','));
        assert_eq!(sniff_lines(header, &["1000001\tI10", "1000002\tE11"]), Some(b'\t'));
        // blank lines carry no evidence
        assert_eq!(sniff_lines(header, &["", "1000001\tI10"]), Some(b'\t'));
        // no consistent row either way
        assert_eq!(sniff_lines(header, &["1000001"]), Some(b','));
        assert_eq!(sniff_lines("a,b", &["1\t2"]), Some(b','));
    }

    #[test]
    fn titled_tsv_with_commas_is_read_as_tsv() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("titled.tsv");
        fs::write(
            &path,
            "Participant ID\tSystolic blood pressure, automated reading | Instance 0\n\
             1000001\t132\n1000002\t\n",
        )?;
        let probe = probe_file(&path, 10)?;
        assert_eq!(probe.separator, b'\t');
        assert_eq!(
            probe.header,
            vec!["Participant ID", "Systolic blood pressure, automated reading | Instance 0"]
        );
        assert_eq!(probe.sample[0], vec!["1000001", "132"]);
        Ok(())
    }

    #[test]
    fn cleans_bom_and_quotes() {
        assert_eq!(clean_header("\u{feff}eid"), "eid");
        assert_eq!(clean_header("  \"31-0.0\" "), "31-0.0");
    }

    #[test]
    fn probe_reads_header_and_sample() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("data.tsv");
        fs::write(&path, "eid\t31-0.0\n1000001\t0\n1000002\t1\n1000003\t1\n")?;

        let probe = probe_file(&path, 2)?;
        assert_eq!(probe.separator, b'\t');
        assert_eq!(probe.header, vec!["eid", "31-0.0"]);
        assert_eq!(probe.sample.len(), 2);
        assert_eq!(probe.sample[1], vec!["1000002", "1"]);
        Ok(())
    }

    #[test]
    fn empty_and_single_column_files_fail() -> Result<()> {
        let dir = TempDir::new()?;
        let empty = dir.path().join("empty.csv");
        fs::write(&empty, "")?;
        assert!(matches!(
            sniff_separator(&empty),
            Err(ParseError::EmptyFile(_))
        ));

        let single = dir.path().join("single.csv");
        fs::write(&single, "eid\n1\n")?;
        assert!(matches!(
            sniff_separator(&single),
            Err(ParseError::UndetectedSeparator { .. })
        ));

        let missing = dir.path().join("missing.csv");
        assert!(matches!(
            sniff_separator(&missing),
            Err(ParseError::Io { .. })
        ));
        Ok(())
    }
}
