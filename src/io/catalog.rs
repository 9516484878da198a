//! # Catalog Reader
//!
//! Plain-text event catalogs, one event per line:
//!
//! ```text
//! # time(days)  magnitude
//! 0.000   6.4
//! 0.013   4.1
//! ```
//!
//! Fields are whitespace separated; extra columns are ignored. Blank lines
//! and lines starting with `#` are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::data::history::{Event, History};

/// Read a catalog file into a [`History`]
pub fn read_catalog(path: &Path) -> Result<History> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open catalog {}", path.display()))?;
    parse_catalog(BufReader::new(file))
        .with_context(|| format!("Failed to read catalog {}", path.display()))
}

/// Parse catalog text from any buffered reader
pub fn parse_catalog<R: BufRead>(reader: R) -> Result<History> {
    let mut events = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("I/O error at line {}", line_no + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut fields = trimmed.split_whitespace();
        let (Some(time), Some(mag)) = (fields.next(), fields.next()) else {
            bail!("line {}: expected 'time mag', got '{}'", line_no + 1, trimmed);
        };
        let time: f64 = time
            .parse()
            .with_context(|| format!("line {}: invalid time '{}'", line_no + 1, time))?;
        let mag: f64 = mag
            .parse()
            .with_context(|| format!("line {}: invalid magnitude '{}'", line_no + 1, mag))?;
        events.push(Event::new(time, mag));
    }

    if events.is_empty() {
        bail!("catalog contains no events");
    }
    tracing::debug!(n_events = events.len(), "parsed catalog");

    Ok(History::new(events)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let text = "# header\n\n0.5 3.2\n  0.0   6.0  extra\n# trailing\n1.25 4.0\n";
        let history = parse_catalog(Cursor::new(text)).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history.mainshock().mag, 6.0);
        assert_eq!(history.events()[0].time, 0.0);
        assert_eq!(history.end_time(), 1.25);
    }

    #[test]
    fn test_parse_reports_bad_line() {
        let err = parse_catalog(Cursor::new("0.0 6.0\n1.0 abc\n")).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));

        let err = parse_catalog(Cursor::new("0.0\n")).unwrap_err();
        assert!(format!("{:#}", err).contains("line 1"));
    }

    #[test]
    fn test_empty_catalog_is_error() {
        assert!(parse_catalog(Cursor::new("# nothing\n\n")).is_err());
    }

    #[test]
    fn test_read_catalog_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "0.0 5.5").unwrap();
        writeln!(file, "0.1 3.1").unwrap();
        file.flush().unwrap();

        let history = read_catalog(file.path()).unwrap();
        assert_eq!(history.len(), 2);

        let missing = file.path().with_extension("missing");
        let err = read_catalog(&missing).unwrap_err();
        assert!(err.to_string().contains("Failed to open catalog"));
    }
}
