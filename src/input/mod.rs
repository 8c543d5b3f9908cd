use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub mod assignment;
pub mod peptides;
pub mod readout;
pub mod request;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: missing required column {column}")]
    MissingColumn { path: String, column: String },
    #[error("{path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("{path}: {message}")]
    Invalid { path: String, message: String },
}

impl InputError {
    pub fn invalid(path: &Path, message: impl Into<String>) -> Self {
        InputError::Invalid {
            path: path.display().to_string(),
            message: message.into(),
        }
    }
}

pub fn is_gz(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

pub fn open_maybe_gz(path: &Path) -> Result<Box<dyn Read>, InputError> {
    let file = File::open(path).map_err(|source| InputError::Io {
        path: path.display().to_string(),
        source,
    })?;
    if is_gz(path) {
        Ok(Box::new(MultiGzDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Comma for `.csv` (optionally gzipped), tab otherwise.
pub fn delimiter_for(path: &Path) -> u8 {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    if name.ends_with(".csv") { b',' } else { b'\t' }
}

/// Reads a delimited table with a header row into typed records. Each entry of
/// `required` lists accepted spellings of one mandatory column.
pub fn read_records<T: DeserializeOwned>(
    path: &Path,
    required: &[&[&str]],
) -> Result<Vec<T>, InputError> {
    let csv_error = |source| InputError::Csv {
        path: path.display().to_string(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_for(path))
        .trim(csv::Trim::All)
        .from_reader(open_maybe_gz(path)?);

    let headers = reader.headers().map_err(csv_error)?.clone();
    for names in required {
        if !names.iter().any(|name| headers.iter().any(|h| h == *name)) {
            return Err(InputError::MissingColumn {
                path: path.display().to_string(),
                column: names.first().copied().unwrap_or_default().to_string(),
            });
        }
    }

    let mut out = Vec::new();
    for record in reader.deserialize() {
        out.push(record.map_err(csv_error)?);
    }
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/tests.rs"]
mod tests;
