//! Reading and writing performance records as JSON
//!
//! The on-disk format is a single JSON array:
//!
//! ```json
//! [
//!   {"dataset_id": "iris", "pipeline_id": "p1", "metafeatures": {"NumberOfInstances": 150.0}, "score": 0.93}
//! ]
//! ```
//!
//! `null` metafeature values are read as missing.

use std::fs;
use std::io::BufReader;
use std::path::Path;

use tracing::info;

use crate::record::{Corpus, PerformanceRecord};
use crate::{Error, Result};

/// Read a JSON array of records.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be opened and [`Error::Data`]
/// naming the file if it is not a valid record array.
pub fn load_records(path: &Path) -> Result<Vec<PerformanceRecord>> {
    let file = fs::File::open(path)?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::data(path.display().to_string(), format!("invalid record file: {e}")))
}

/// Read, group and validate a record file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a record is malformed, or
/// the file holds no records at all.
pub fn load_corpus(path: &Path) -> Result<Corpus> {
    let records = load_records(path)?;
    if records.is_empty() {
        return Err(Error::data(path.display().to_string(), "file holds no records"));
    }
    let corpus = Corpus::from_records(records)?;
    info!(
        path = %path.display(),
        datasets = corpus.len(),
        records = corpus.num_records(),
        "loaded corpus"
    );
    Ok(corpus)
}

/// Write a corpus as a pretty-printed JSON record array.
///
/// # Errors
///
/// Returns an error if the parent directory or file cannot be written.
pub fn write_records(path: &Path, corpus: &Corpus) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(&corpus.to_records())?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::{NamedTempFile, TempDir};

    use super::*;

    #[test]
    fn test_load_with_missing_metafeature() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"[
                {"dataset_id": "d1", "pipeline_id": "b", "metafeatures": {"x": 1.0, "y": null}, "score": 0.5},
                {"dataset_id": "d1", "pipeline_id": "a", "metafeatures": {"x": 1.0, "y": null}, "score": 0.7}
            ]"#,
        )
        .unwrap();

        let corpus = load_corpus(file.path()).unwrap();
        let group = corpus.get("d1").unwrap();
        assert_eq!(group.len(), 2);
        assert!(group.metafeatures()["y"].is_nan());
        assert_eq!(group.pipelines()[0].pipeline_id, "a");
    }

    #[test]
    fn test_malformed_file_names_path() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"not": "an array"}"#).unwrap();
        let err = load_records(file.path()).unwrap_err();
        assert!(matches!(err, Error::Data { .. }));
        assert!(format!("{err}").contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_empty_file_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[]").unwrap();
        assert!(load_corpus(file.path()).is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_records(Path::new("/nonexistent/records.json")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_write_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("records.json");
        let corpus = Corpus::from_records(vec![
            PerformanceRecord::new("d2", "p", [("m".to_string(), 2.0)].into(), 0.1),
            PerformanceRecord::new("d1", "p", [("m".to_string(), 1.0)].into(), 0.2),
        ])
        .unwrap();

        write_records(&path, &corpus).unwrap();
        assert_eq!(load_corpus(&path).unwrap(), corpus);
    }
}
