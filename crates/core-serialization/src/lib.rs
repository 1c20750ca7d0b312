//! Common serialization helpers shared across the workspace.
//!
//! The catalog snapshot is a single bincode blob: a small header followed by
//! every parsed record. The header is checked before the body is trusted.

use bincode::Options;
use core_types::ListingRecord;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

pub const SNAPSHOT_MAGIC: [u8; 4] = *b"HMCS";
pub const SNAPSHOT_VERSION: u16 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("not a catalog snapshot")]
    BadMagic,
    #[error("unsupported snapshot version {found}")]
    VersionMismatch { found: u16 },
}

/// Identity of the source table the snapshot was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub source: String,
    /// Hex SHA-256 of the source bytes, when the writer computed one.
    pub fingerprint: Option<String>,
}

impl SnapshotHeader {
    pub fn new(source: impl Into<String>, fingerprint: Option<String>) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: SNAPSHOT_VERSION,
            source: source.into(),
            fingerprint,
        }
    }

    fn validate(&self) -> Result<(), SnapshotError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(SnapshotError::BadMagic);
        }
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::VersionMismatch {
                found: self.version,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub header: SnapshotHeader,
    pub records: Vec<ListingRecord>,
}

impl CatalogSnapshot {
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode from an in-memory blob. Length prefixes are bounded by the blob
    /// size, so a corrupt cache is a codec error rather than a huge allocation.
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snap: Self = bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .allow_trailing_bytes()
            .with_limit(bytes.len() as u64)
            .deserialize(bytes)?;
        snap.header.validate()?;
        Ok(snap)
    }

    /// Write via a temp file and rename so readers never see a torn blob.
    pub fn write_to_path(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            bincode::serialize_into(&mut writer, self)?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn read_from_path(path: &Path) -> Result<Self, SnapshotError> {
        Self::decode(&fs::read(path)?)
    }
}
