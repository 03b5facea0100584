//! Loading of measurement tables.
//!
//! A table is plain comma separated text without header. Rows may have different lengths.

use std::fs;
use std::path::Path;

use csv::ReaderBuilder;
use itertools::Itertools;
use log::debug;

use crate::error::{RocError, RocResult};

/// Read the measurement table at `path`.
pub fn read_rows<P: AsRef<Path>>(path: P) -> RocResult<Vec<Vec<String>>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| RocError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let rows = parse_rows(&text)?;
    debug!("Read {} rows from {}.", rows.len(), path.display());
    Ok(rows)
}

/// Split measurement text into rows of tokens.
///
/// Every line is one row. A blank line between records is an empty row, since the row index
/// selects the ring radius. Blank lines after the last record are dropped.
/// A leading byte order mark is dropped. Tokens are returned untrimmed.
pub fn parse_rows(text: &str) -> RocResult<Vec<Vec<String>>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut rows = text.lines().map(parse_line).collect::<RocResult<Vec<_>>>()?;
    while rows.last().is_some_and(Vec::is_empty) {
        rows.pop();
    }
    Ok(rows)
}

fn parse_line(line: &str) -> RocResult<Vec<String>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());

    match reader.records().next() {
        Some(record) => Ok(record?.iter().map(str::to_string).collect_vec()),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn ragged_rows() {
        let rows = parse_rows("0.1,0.2,,0.4\n0.5, 0\n").unwrap();
        assert_eq!(
            rows,
            vec![
                vec!["0.1", "0.2", "", "0.4"],
                vec!["0.5", " 0"],
            ]
        );
    }

    #[test]
    fn blank_lines_are_empty_rows() {
        let rows = parse_rows("0.05,0.05\n\n0.07,0.07,0.07,0.07\n\n").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec!["0.05", "0.05"]);
        assert!(rows[1].is_empty());
        assert_eq!(rows[2], vec!["0.07"; 4]);

        let rows = parse_rows("\n\r\n0.1\r\n\r\n0.2,\"0.3\"").unwrap();
        assert_eq!(rows.len(), 5);
        assert!(rows[0].is_empty() && rows[1].is_empty() && rows[3].is_empty());
        assert_eq!(rows[2], vec!["0.1"]);
        assert_eq!(rows[4], vec!["0.2", "0.3"]);
    }

    #[test]
    fn byte_order_mark() {
        let rows = parse_rows("\u{feff}0.076,0.075\r\n").unwrap();
        assert_eq!(rows, vec![vec!["0.076", "0.075"]]);
    }

    #[test]
    fn empty_text() {
        assert!(parse_rows("").unwrap().is_empty());
    }

    #[test]
    fn file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0.076,0.077").unwrap();
        writeln!(file, "0.078").unwrap();
        let rows = read_rows(file.path()).unwrap();
        assert_eq!(rows, vec![vec!["0.076", "0.077"], vec!["0.078"]]);
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        match read_rows(&path) {
            Err(RocError::Io { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected an I/O error, got {other:?}"),
        }
    }
}
