//! Precomputed vectors stored as JSON lines.
//!
//! The first non-blank line names the embedder that produced the vectors,
//! `{"embedder": "fnv1a-384"}`; every following line is one record,
//! `{"id": 12, "embedding": [0.1, ...]}`. Queries are embedded at runtime, so
//! the file is only usable with the embedder it names.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use core_types::ListingId;
use serde::{Deserialize, Serialize};

use crate::IndexError;

/// Ids may be written as JSON numbers or strings by the ingest step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Number(u64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: RawId,
    pub embedding: Vec<f32>,
}

impl VectorRecord {
    pub fn listing_id(&self) -> ListingId {
        match &self.id {
            RawId::Number(n) => ListingId::from(*n),
            RawId::Text(s) => ListingId::new(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VectorFileHeader {
    pub embedder: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorFile {
    /// Id of the embedder that produced `records` (see [`crate::Embedder::id`]).
    pub embedder: String,
    pub records: Vec<VectorRecord>,
}

/// Read the header and every record, requiring `dimension` finite components per vector.
pub fn load_vector_file(path: &Path, dimension: usize) -> Result<VectorFile, IndexError> {
    let reader = BufReader::new(File::open(path)?);
    let mut header: Option<VectorFileHeader> = None;
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let line_no = i + 1;
        if header.is_none() {
            let parsed: VectorFileHeader =
                serde_json::from_str(&line).map_err(|e| IndexError::VectorFile {
                    line: line_no,
                    reason: format!("expected {{\"embedder\": ...}} header: {e}"),
                })?;
            header = Some(parsed);
            continue;
        }
        let rec: VectorRecord = serde_json::from_str(&line).map_err(|e| IndexError::VectorFile {
            line: line_no,
            reason: e.to_string(),
        })?;
        if rec.embedding.len() != dimension {
            return Err(IndexError::DimensionMismatch {
                id: rec.listing_id().to_string(),
                expected: dimension,
                found: rec.embedding.len(),
            });
        }
        if rec.embedding.iter().any(|x| !x.is_finite()) {
            return Err(IndexError::VectorFile {
                line: line_no,
                reason: format!("vector for {} has non-finite components", rec.listing_id()),
            });
        }
        records.push(rec);
    }
    let Some(header) = header else {
        return Err(IndexError::VectorFile {
            line: 0,
            reason: "file is empty; expected an embedder header".into(),
        });
    };
    tracing::info!(
        path = %path.display(),
        embedder = %header.embedder,
        vectors = records.len(),
        "loaded precomputed vectors"
    );
    Ok(VectorFile {
        embedder: header.embedder,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const HEADER: &str = "{\"embedder\": \"fnv1a-2\"}\n";

    #[test]
    fn accepts_numeric_and_text_ids() -> Result<(), IndexError> {
        let dir = tempdir()?;
        let path = dir.path().join("vectors.jsonl");
        fs::write(
            &path,
            format!(
                "{HEADER}{{\"id\": 7, \"embedding\": [1.0, 0.0]}}\n\n{{\"id\": \"loft-9\", \"embedding\": [0.0, 1.0]}}\n"
            ),
        )?;
        let file = load_vector_file(&path, 2)?;
        assert_eq!(file.embedder, "fnv1a-2");
        assert_eq!(file.records.len(), 2);
        assert_eq!(file.records[0].listing_id(), ListingId::from(7));
        assert_eq!(file.records[1].listing_id(), ListingId::from("loft-9"));
        Ok(())
    }

    #[test]
    fn reports_bad_line_number() -> Result<(), IndexError> {
        let dir = tempdir()?;
        let path = dir.path().join("vectors.jsonl");
        fs::write(&path, format!("{HEADER}{{\"id\": 1, \"embedding\": [1.0, 0.0]}}\nnot json\n"))?;
        let err = load_vector_file(&path, 2).unwrap_err();
        assert!(matches!(err, IndexError::VectorFile { line: 3, .. }));
        Ok(())
    }

    #[test]
    fn record_without_header_is_rejected() -> Result<(), IndexError> {
        let dir = tempdir()?;
        let path = dir.path().join("vectors.jsonl");
        fs::write(&path, "{\"id\": 1, \"embedding\": [1.0, 0.0]}\n")?;
        assert!(matches!(
            load_vector_file(&path, 2),
            Err(IndexError::VectorFile { line: 1, .. })
        ));
        Ok(())
    }

    #[test]
    fn rejects_dimension_drift() -> Result<(), IndexError> {
        let dir = tempdir()?;
        let path = dir.path().join("vectors.jsonl");
        fs::write(&path, format!("{HEADER}{{\"id\": 1, \"embedding\": [1.0, 2.0, 3.0]}}\n"))?;
        assert!(matches!(
            load_vector_file(&path, 2),
            Err(IndexError::DimensionMismatch { expected: 2, found: 3, .. })
        ));
        Ok(())
    }

    #[test]
    fn overflowing_component_is_rejected() -> Result<(), IndexError> {
        let dir = tempdir()?;
        let path = dir.path().join("vectors.jsonl");
        fs::write(&path, format!("{HEADER}{{\"id\": 1, \"embedding\": [1e39, 0.0]}}\n"))?;
        assert!(matches!(
            load_vector_file(&path, 2),
            Err(IndexError::VectorFile { line: 2, .. })
        ));
        Ok(())
    }
}
