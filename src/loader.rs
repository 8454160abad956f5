//! Trial file loading.
//!
//! Trial exports often carry a few metadata lines above the column header, so
//! the header row is either given explicitly or detected from the data.

use crate::error::LoadError;
use csv::{ReaderBuilder, Trim};
use encoding_rs::{EUC_KR, WINDOWS_1252};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["csv", "sto", "txt"];

/// Rows considered as header candidates
const HEADER_SEARCH_ROWS: usize = 10;
/// Rows below a candidate header inspected for numeric columns
const HEADER_PROBE_ROWS: usize = 5;
/// Lines inspected when choosing the delimiter
const SNIFF_LINES: usize = 20;

/// One trial file's columns, all parsed as numbers
#[derive(Debug, Clone)]
pub struct TrialTable {
    pub path: PathBuf,
    /// File name without directories, the input to label extraction
    pub filename: String,
    pub headers: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl TrialTable {
    pub fn new(path: PathBuf, headers: Vec<String>, columns: Vec<Vec<f64>>) -> Self {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path,
            filename,
            headers,
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.headers
            .iter()
            .position(|h| h == name)
            .map(|i| self.columns[i].as_slice())
    }

    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }
}

/// Whether `path` has one of the supported trial extensions
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Load one trial file.
///
/// `header_row` is zero-based; when `None` the header is detected.
pub fn load_trial_table<P: AsRef<Path>>(path: P, header_row: Option<usize>) -> Result<TrialTable, LoadError> {
    let path = path.as_ref();
    if !is_supported(path) {
        return Err(LoadError::UnsupportedExtension(path.to_path_buf()));
    }

    let bytes = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = decode_text(&bytes);
    let text = text.trim_start_matches('\u{feff}');

    let delimiter = sniff_delimiter(text);
    let records = read_records(text, delimiter).map_err(|source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    })?;

    let header = header_row.unwrap_or_else(|| detect_header_row(&records));
    let Some(header_record) = records.get(header) else {
        return Err(LoadError::MissingHeader {
            path: path.to_path_buf(),
            row: header,
        });
    };
    log::debug!(
        "{}: header on row {}, delimiter {:?}",
        path.display(),
        header,
        delimiter as char
    );

    let headers: Vec<String> = header_record
        .iter()
        .enumerate()
        .map(|(i, h)| if h.is_empty() { format!("column_{}", i) } else { h.clone() })
        .collect();

    let data = &records[header + 1..];
    let columns: Vec<Vec<f64>> = (0..headers.len())
        .map(|j| data.iter().map(|row| parse_cell(row.get(j))).collect())
        .collect();

    let has_numbers = columns.iter().any(|c| c.iter().any(|v| v.is_finite()));
    if data.is_empty() || !has_numbers {
        return Err(LoadError::NoNumericData(path.to_path_buf()));
    }

    Ok(TrialTable::new(path.to_path_buf(), headers, columns))
}

/// Decode file contents as UTF-8, falling back to EUC-KR (CP949) and then Latin-1.
///
/// Lab exports often carry Korean metadata lines above the header.
fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Cow::Borrowed(text);
    }
    let (text, had_errors) = EUC_KR.decode_without_bom_handling(bytes);
    if !had_errors {
        log::debug!("Decoded file as EUC-KR");
        return text;
    }
    log::debug!("Decoded file as Latin-1");
    WINDOWS_1252.decode_without_bom_handling(bytes).0
}

/// Tab when the opening lines hold more tabs than commas, comma otherwise
fn sniff_delimiter(text: &str) -> u8 {
    let (tabs, commas) = text
        .lines()
        .take(SNIFF_LINES)
        .flat_map(str::chars)
        .fold((0usize, 0usize), |(t, c), ch| match ch {
            '\t' => (t + 1, c),
            ',' => (t, c + 1),
            _ => (t, c),
        });
    if tabs > commas {
        b'\t'
    } else {
        b','
    }
}

fn read_records(text: &str, delimiter: u8) -> Result<Vec<Vec<String>>, csv::Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        records.push(record.iter().map(str::to_string).collect());
    }
    Ok(records)
}

fn parse_cell(cell: Option<&String>) -> f64 {
    cell.and_then(|c| c.parse::<f64>().ok()).unwrap_or(f64::NAN)
}

/// Pick the header row whose following rows give the most numeric columns.
///
/// Ties go to the earliest row.
pub fn detect_header_row(records: &[Vec<String>]) -> usize {
    let mut best_row = 0;
    let mut best_count = 0;

    for candidate in 0..records.len().min(HEADER_SEARCH_ROWS) {
        let probe_end = (candidate + 1 + HEADER_PROBE_ROWS).min(records.len());
        let probe = &records[candidate + 1..probe_end];
        let count = (0..records[candidate].len())
            .filter(|&j| is_numeric_column(probe, j))
            .count();
        if count > best_count {
            best_count = count;
            best_row = candidate;
        }
    }
    best_row
}

fn is_numeric_column(rows: &[Vec<String>], j: usize) -> bool {
    let mut seen = false;
    for cell in rows.iter().filter_map(|r| r.get(j)).filter(|c| !c.is_empty()) {
        if cell.parse::<f64>().is_err() {
            return false;
        }
        seen = true;
    }
    seen
}

/// Columns present in every table, excluding time, sorted by name
pub fn common_variables(tables: &[TrialTable]) -> Vec<String> {
    let mut tables = tables.iter();
    let Some(first) = tables.next() else {
        return Vec::new();
    };

    let mut common: BTreeSet<&str> = first
        .headers
        .iter()
        .map(String::as_str)
        .filter(|h| !h.eq_ignore_ascii_case("time"))
        .collect();
    for table in tables {
        common.retain(|h| table.headers.iter().any(|t| t == h));
    }
    common.into_iter().map(str::to_string).collect()
}
