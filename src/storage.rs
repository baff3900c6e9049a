//! Durable snapshot persistence. Vectors and records are serialized into
//! one postcard container and written with a temp-file-then-rename so a
//! crash mid-save can never leave them desynchronized on disk.

use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::index::{FaceVector, FlatIndex, DIMENSION};
use crate::records::{FaceRecord, RecordStore};

/// Durable representation of index + records, written together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub dimension: usize,
    pub threshold: f32,
    pub vectors: Vec<FaceVector>,
    pub records: Vec<FaceRecord>,
}

impl Snapshot {
    pub fn capture(index: &FlatIndex, store: &RecordStore, threshold: f32) -> Self {
        Self {
            dimension: DIMENSION,
            threshold,
            vectors: index.vectors().to_vec(),
            records: store.records().to_vec(),
        }
    }

    fn into_state(self) -> Result<(FlatIndex, RecordStore), SnapshotError> {
        if self.dimension != DIMENSION {
            return Err(SnapshotError::DimensionMismatch {
                expected: DIMENSION,
                found: self.dimension,
            });
        }
        if let Some(bad) = self.vectors.iter().find(|v| v.dimension() != DIMENSION) {
            return Err(SnapshotError::DimensionMismatch {
                expected: DIMENSION,
                found: bad.dimension(),
            });
        }
        if self.vectors.len() != self.records.len() {
            return Err(SnapshotError::Desynchronized {
                vectors: self.vectors.len(),
                records: self.records.len(),
            });
        }
        Ok((
            FlatIndex::with_vectors(self.vectors),
            RecordStore::with_records(self.records),
        ))
    }
}

/// Load index + records from `path`. A missing, unreadable, or corrupt
/// snapshot falls back to empty structures (logged, never fatal); a
/// snapshot built for a different dimension is a configuration error and
/// propagates.
pub fn load(path: &Path) -> Result<(FlatIndex, RecordStore), SnapshotError> {
    if !path.exists() {
        info!("no snapshot at {}, starting empty", path.display());
        return Ok((FlatIndex::new(), RecordStore::new()));
    }
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            warn!("unreadable snapshot {}: {e}; starting empty", path.display());
            return Ok((FlatIndex::new(), RecordStore::new()));
        }
    };
    let snapshot: Snapshot = match postcard::from_bytes(&data) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("corrupt snapshot {}: {e}; starting empty", path.display());
            return Ok((FlatIndex::new(), RecordStore::new()));
        }
    };
    match snapshot.into_state() {
        Ok((index, store)) => {
            info!("loaded snapshot with {} face encodings", index.len());
            Ok((index, store))
        }
        Err(e @ SnapshotError::DimensionMismatch { .. }) => Err(e),
        Err(e) => {
            warn!("inconsistent snapshot {}: {e}; starting empty", path.display());
            Ok((FlatIndex::new(), RecordStore::new()))
        }
    }
}

/// Write the snapshot atomically: serialize, write to a sibling temp file,
/// rename into place.
pub fn save(path: &Path, snapshot: &Snapshot) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = postcard::to_allocvec(snapshot)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &data)?;
    fs::rename(&tmp, path)?;
    debug!(
        "saved snapshot with {} face encodings to {}",
        snapshot.records.len(),
        path.display()
    );
    Ok(())
}
