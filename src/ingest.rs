//! Operation input read from disk: JSON documents to insert and CSV files of
//! per-document field updates.

use crate::Document;
use crate::error::{Error, Result};
use serde_json::Value;
use serde_json::error::Category;
use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

/// One row of an update file.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRow {
    /// Value the match column must equal.
    pub match_value: String,
    /// Raw new value; an empty cell reads as null.
    pub value: Value,
}

/// The contents of one update file.
///
/// The first column header names the match field (usually `stable_id`), the
/// second names the dot path to update. Malformed rows are kept in place as
/// errors so the good rows around them still apply.
#[derive(Debug)]
pub struct UpdateBatch {
    pub match_field: String,
    pub update_field: String,
    pub rows: Vec<Result<UpdateRow>>,
}

/// List the input files at `path`.
///
/// A file is returned as is. For a directory, its files ending in
/// `.{extension}` are returned in natural order, so `part2` sorts before
/// `part10`.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if `path` does not exist.
pub fn collect_files(path: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(Error::NotFound(format!(
            "{} file or directory does not exist",
            path.display()
        )));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(path)? {
        let file = entry?.path();
        if file.is_file() && has_extension(&file, extension) {
            files.push(file);
        }
    }
    files.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));
    Ok(files)
}

/// Whether `path` ends in `.{extension}` (case-insensitive).
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

/// Compare strings treating runs of digits as numbers and letters
/// case-insensitively.
///
/// # Examples
///
/// ```
/// use fieldlog::ingest::natural_cmp;
/// use std::cmp::Ordering;
///
/// assert_eq!(natural_cmp("batch2.csv", "batch10.csv"), Ordering::Less);
/// assert_eq!(natural_cmp("B1", "a2"), Ordering::Greater);
/// ```
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let left = chunks(a);
    let right = chunks(b);
    for (l, r) in left.iter().zip(&right) {
        let ordering = match (l, r) {
            (Chunk::Digits(l), Chunk::Digits(r)) => cmp_digits(l, r),
            (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
            (Chunk::Text(l), Chunk::Text(r)) => l.cmp(r),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.len().cmp(&right.len())
}

enum Chunk {
    Digits(String),
    Text(String),
}

fn chunks(s: &str) -> Vec<Chunk> {
    let mut out: Vec<Chunk> = Vec::new();
    for c in s.chars() {
        let digit = c.is_ascii_digit();
        let extended = match out.last_mut() {
            Some(Chunk::Digits(run)) if digit => {
                run.push(c);
                true
            }
            Some(Chunk::Text(run)) if !digit => {
                run.extend(c.to_lowercase());
                true
            }
            _ => false,
        };
        if !extended {
            out.push(if digit {
                Chunk::Digits(c.to_string())
            } else {
                Chunk::Text(c.to_lowercase().collect())
            });
        }
    }
    out
}

fn cmp_digits(l: &str, r: &str) -> Ordering {
    let l = l.trim_start_matches('0');
    let r = r.trim_start_matches('0');
    l.len().cmp(&r.len()).then_with(|| l.cmp(r))
}

/// Read a JSON file holding one document or an array of documents.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] naming the file if it is not valid JSON
/// or holds anything other than an object or an array of objects.
pub fn read_json_documents(path: &Path) -> Result<Vec<Document>> {
    let file = File::open(path)?;
    let data: Value = match serde_json::from_reader(BufReader::new(file)) {
        Ok(data) => data,
        Err(e) if e.classify() == Category::Io => return Err(e.into()),
        Err(e) => return Err(Error::InvalidInput(format!("{}: {e}", path.display()))),
    };
    match data {
        Value::Object(doc) => Ok(vec![doc]),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(doc) => Ok(doc),
                _ => Err(Error::InvalidInput(format!(
                    "{}: element {i} is not an object",
                    path.display()
                ))),
            })
            .collect(),
        _ => Err(Error::InvalidInput(format!(
            "{}: expected an object or an array of objects",
            path.display()
        ))),
    }
}

/// Read an update CSV file. See [`parse_update_csv`].
pub fn read_update_csv(path: &Path) -> Result<UpdateBatch> {
    parse_update_csv(File::open(path)?)
}

/// Parse update rows from CSV with a header line.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the header is unreadable or has fewer
/// than two columns. Problems with individual rows are reported in
/// [`UpdateBatch::rows`].
///
/// # Examples
///
/// ```
/// use fieldlog::ingest::parse_update_csv;
/// use serde_json::json;
///
/// let batch = parse_update_csv("stable_id,info.status\nX,done\nY,\n".as_bytes()).unwrap();
/// assert_eq!(batch.match_field, "stable_id");
/// assert_eq!(batch.update_field, "info.status");
/// assert_eq!(batch.rows[0].as_ref().unwrap().value, json!("done"));
/// assert_eq!(batch.rows[1].as_ref().unwrap().value, json!(null));
/// ```
pub fn parse_update_csv<R: io::Read>(reader: R) -> Result<UpdateBatch> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) if e.is_io_error() => return Err(e.into()),
        Err(e) => return Err(Error::InvalidInput(format!("header: {e}"))),
    };
    let (Some(match_field), Some(update_field)) = (headers.get(0), headers.get(1)) else {
        return Err(Error::InvalidInput(
            "update file needs a match column and an update column".to_string(),
        ));
    };
    let match_field = match_field.trim().to_string();
    let update_field = update_field.trim().to_string();

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        // Header is line 1.
        let line = i + 2;
        let row = match record {
            Ok(record) => match (record.get(0), record.get(1)) {
                (Some(match_value), Some(value)) if !match_value.trim().is_empty() => {
                    Ok(UpdateRow {
                        match_value: match_value.trim().to_string(),
                        value: if value.trim().is_empty() {
                            Value::Null
                        } else {
                            Value::String(value.to_string())
                        },
                    })
                }
                _ => Err(Error::InvalidInput(format!(
                    "line {line}: expected values for '{match_field}' and '{update_field}'"
                ))),
            },
            Err(e) => Err(Error::InvalidInput(format!("line {line}: {e}"))),
        };
        rows.push(row);
    }

    Ok(UpdateBatch {
        match_field,
        update_field,
        rows,
    })
}
