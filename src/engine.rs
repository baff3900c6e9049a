//! Engine facade composing encoder, index, records, matching policy, and
//! persistence. One shared instance serves every request: readers
//! (recognition, stats) run concurrently under a read lock, writers
//! (registration, clear) are exclusive. Snapshots are captured inside the
//! lock and written to disk after release, so the lock is never held
//! across disk I/O.

use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use image::RgbImage;
use log::{error, info, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::encoder;
use crate::error::{EngineError, SnapshotError};
use crate::index::{FaceVector, FlatIndex, DIMENSION};
use crate::matcher::{self, FaceMatch};
use crate::records::{BoundingBox, Detection, FaceRecord, Quality, RecordStore};
use crate::storage::{self, Snapshot};

/// Ranked matches reported per recognized face.
pub const MAX_MATCHES_PER_FACE: usize = 3;
/// Label reported when no candidate clears the threshold.
pub const UNKNOWN_LABEL: &str = "Unknown";

#[derive(Debug)]
struct CoreState {
    index: FlatIndex,
    records: RecordStore,
}

/// Result of a successful registration.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub face_id: String,
    pub person_name: String,
    pub position: usize,
    pub quality: Quality,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
    pub vector: FaceVector,
    /// Whether the post-registration snapshot reached disk.
    pub persisted: bool,
}

/// Per-detection recognition outcome. A failed face carries its error
/// here instead of aborting the batch.
#[derive(Debug, Clone, Serialize)]
pub struct FaceOutcome {
    pub detection_id: usize,
    pub bounding_box: BoundingBox,
    pub confidence: f32,
    pub recognized: bool,
    pub name: String,
    pub similarity: f32,
    pub matches: Vec<FaceMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct IndexStats {
    pub total_faces: usize,
    pub dimension: usize,
    pub threshold: f32,
}

pub struct FaceEncodingEngine {
    state: RwLock<CoreState>,
    snapshot_path: PathBuf,
    threshold: f32,
    max_candidates: usize,
}

impl FaceEncodingEngine {
    /// Load the persisted state (or start empty) and become ready.
    pub fn open(config: &Config) -> Result<Self, SnapshotError> {
        let snapshot_path = config.snapshot_file();
        let (index, records) = storage::load(&snapshot_path)?;
        Ok(Self {
            state: RwLock::new(CoreState { index, records }),
            snapshot_path,
            threshold: config.threshold,
            max_candidates: config.max_candidates,
        })
    }

    /// Encode one detected face and store vector + record as a pair.
    /// Exactly one detection is required. Persistence failure does not
    /// fail the registration; it is reported via `persisted`.
    pub fn register(
        &self,
        image: &RgbImage,
        detections: &[Detection],
        person_name: &str,
    ) -> Result<Registration, EngineError> {
        let detection = match detections {
            [] => return Err(EngineError::NoFaceDetected),
            [single] => single,
            _ => return Err(EngineError::AmbiguousInput),
        };

        let vector = encoder::encode(image, &detection.bounding_box)?;
        let quality = encoder::assess_quality(image, &detection.bounding_box);
        let face_id = Uuid::new_v4().to_string();

        let (position, snapshot) = {
            let mut state = self.write_state();
            // encode already yields a unit vector; add's normalization is
            // idempotent on it.
            let position = state.index.add(vector.clone())?;
            state.records.put(
                position,
                FaceRecord {
                    face_id: face_id.clone(),
                    person_name: person_name.to_string(),
                    confidence: detection.confidence,
                    quality,
                    bounding_box: detection.bounding_box,
                    position,
                },
            )?;
            let snapshot = Snapshot::capture(&state.index, &state.records, self.threshold);
            (position, snapshot)
        };

        let persisted = self.persist(&snapshot);
        info!("registered face for {person_name} at position {position} (id {face_id})");

        Ok(Registration {
            face_id,
            person_name: person_name.to_string(),
            position,
            quality,
            confidence: detection.confidence,
            bounding_box: detection.bounding_box,
            vector,
            persisted,
        })
    }

    /// Attempt encode + search + match for each detection independently.
    /// One bad face never aborts the rest.
    pub fn recognize(&self, image: &RgbImage, detections: &[Detection]) -> Vec<FaceOutcome> {
        let state = self.read_state();
        detections
            .iter()
            .enumerate()
            .map(|(detection_id, detection)| {
                match self.match_one(&state, image, detection) {
                    Ok(matches) => {
                        let (recognized, name, similarity) = match matches.first() {
                            Some(best) => (true, best.person_name.clone(), best.similarity),
                            None => (false, UNKNOWN_LABEL.to_string(), 0.0),
                        };
                        FaceOutcome {
                            detection_id,
                            bounding_box: detection.bounding_box,
                            confidence: detection.confidence,
                            recognized,
                            name,
                            similarity,
                            matches,
                            error: None,
                        }
                    }
                    Err(e) => {
                        warn!("face {detection_id} failed: {e}");
                        FaceOutcome {
                            detection_id,
                            bounding_box: detection.bounding_box,
                            confidence: detection.confidence,
                            recognized: false,
                            name: UNKNOWN_LABEL.to_string(),
                            similarity: 0.0,
                            matches: Vec::new(),
                            error: Some(e.to_string()),
                        }
                    }
                }
            })
            .collect()
    }

    fn match_one(
        &self,
        state: &CoreState,
        image: &RgbImage,
        detection: &Detection,
    ) -> Result<Vec<FaceMatch>, EngineError> {
        let vector = encoder::encode(image, &detection.bounding_box)?;
        let hits = state.index.search(&vector, self.max_candidates)?;
        Ok(matcher::rank(
            &hits,
            &state.records,
            self.threshold,
            MAX_MATCHES_PER_FACE,
        )?)
    }

    /// Drop every stored vector and record together, then persist the
    /// empty snapshot. Returns whether the snapshot reached disk.
    pub fn clear(&self) -> bool {
        let snapshot = {
            let mut state = self.write_state();
            state.index.clear();
            state.records.clear();
            Snapshot::capture(&state.index, &state.records, self.threshold)
        };
        info!("cleared face index");
        self.persist(&snapshot)
    }

    pub fn stats(&self) -> IndexStats {
        let state = self.read_state();
        IndexStats {
            total_faces: state.index.len(),
            dimension: DIMENSION,
            threshold: self.threshold,
        }
    }

    fn persist(&self, snapshot: &Snapshot) -> bool {
        match storage::save(&self.snapshot_path, snapshot) {
            Ok(()) => true,
            Err(e) => {
                error!("failed to persist snapshot: {e}");
                false
            }
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CoreState> {
        self.state.read().unwrap_or_else(|poison| poison.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CoreState> {
        self.state.write().unwrap_or_else(|poison| poison.into_inner())
    }
}
