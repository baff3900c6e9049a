use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// Pixel-coordinate bounding box produced by the external detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// One detector hit: a box plus its confidence score. Consumed opaquely;
/// detection itself happens outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bounding_box: BoundingBox,
    pub confidence: f32,
}

impl Detection {
    pub fn new(bounding_box: BoundingBox, confidence: f32) -> Self {
        Self {
            bounding_box,
            confidence,
        }
    }

    /// Detection covering a whole image, for callers without a detector.
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self::new(BoundingBox::new(0, 0, width, height), 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    High,
}

/// Metadata stored alongside each indexed vector. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRecord {
    pub face_id: String,
    pub person_name: String,
    pub confidence: f32,
    pub quality: Quality,
    pub bounding_box: BoundingBox,
    pub position: usize,
}

/// Integer-indexed record storage, kept 1:1 with the flat index:
/// the record at position `i` describes the vector at position `i`.
#[derive(Debug, Default, Clone)]
pub struct RecordStore {
    records: Vec<FaceRecord>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<FaceRecord>) -> Self {
        Self { records }
    }

    /// Append the record for a freshly added vector. `position` must be
    /// the next unused slot, i.e. the value the index just returned from
    /// `add`; anything else means the pairing has drifted.
    pub fn put(&mut self, position: usize, mut record: FaceRecord) -> Result<(), IndexError> {
        if position != self.records.len() {
            return Err(IndexError::PositionOutOfSync {
                position,
                expected: self.records.len(),
            });
        }
        record.position = position;
        self.records.push(record);
        Ok(())
    }

    pub fn get(&self, position: usize) -> Result<&FaceRecord, IndexError> {
        self.records
            .get(position)
            .ok_or(IndexError::NotFound(position))
    }

    pub fn records(&self) -> &[FaceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> FaceRecord {
        FaceRecord {
            face_id: format!("id-{name}"),
            person_name: name.to_string(),
            confidence: 0.9,
            quality: Quality::Medium,
            bounding_box: BoundingBox::new(10, 10, 50, 50),
            position: 0,
        }
    }

    #[test]
    fn put_and_get_round_trip() {
        let mut store = RecordStore::new();
        store.put(0, record("alice")).unwrap();
        store.put(1, record("bob")).unwrap();

        assert_eq!(store.get(0).unwrap().person_name, "alice");
        assert_eq!(store.get(1).unwrap().person_name, "bob");
        assert_eq!(store.get(1).unwrap().position, 1);
    }

    #[test]
    fn put_rejects_out_of_sync_position() {
        let mut store = RecordStore::new();
        let err = store.put(3, record("alice")).unwrap_err();
        assert_eq!(
            err,
            IndexError::PositionOutOfSync {
                position: 3,
                expected: 0
            }
        );
    }

    #[test]
    fn get_missing_position_is_not_found() {
        let store = RecordStore::new();
        assert_eq!(store.get(0).unwrap_err(), IndexError::NotFound(0));
    }

    #[test]
    fn clear_empties_store() {
        let mut store = RecordStore::new();
        store.put(0, record("alice")).unwrap();
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.get(0).unwrap_err(), IndexError::NotFound(0));
    }
}
