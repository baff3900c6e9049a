//! Matching policy: distance-to-similarity mapping, threshold acceptance,
//! and candidate ranking over search hits.

use serde::Serialize;

use crate::error::IndexError;
use crate::index::{FaceVector, FlatIndex};
use crate::records::RecordStore;

/// One accepted candidate, ranked from 1 (closest).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceMatch {
    pub face_id: String,
    pub person_name: String,
    pub similarity: f32,
    pub distance: f32,
    pub position: usize,
    pub rank: usize,
}

/// Similarity score for a squared-L2 distance between unit vectors.
/// Conceptual distance range is 0..2; score clamps at 0 from below.
pub fn similarity(distance: f32) -> f32 {
    (1.0 - distance).max(0.0)
}

/// A candidate is accepted when its similarity clears `1 - threshold`,
/// i.e. up to `threshold` normalized distance is tolerated.
pub fn accepts(threshold: f32, similarity: f32) -> bool {
    similarity >= 1.0 - threshold
}

/// Convert raw search hits into accepted, ranked matches. Hits arrive
/// sorted ascending by distance, so the accepted set is a prefix and rank
/// follows output order.
pub fn rank(
    hits: &[(usize, f32)],
    store: &RecordStore,
    threshold: f32,
    limit: usize,
) -> Result<Vec<FaceMatch>, IndexError> {
    let mut matches = Vec::new();
    for &(position, distance) in hits {
        if matches.len() == limit {
            break;
        }
        let score = similarity(distance);
        if !accepts(threshold, score) {
            continue;
        }
        let record = store.get(position)?;
        matches.push(FaceMatch {
            face_id: record.face_id.clone(),
            person_name: record.person_name.clone(),
            similarity: score,
            distance,
            position,
            rank: matches.len() + 1,
        });
    }
    Ok(matches)
}

/// Single nearest accepted candidate, or `None` when nothing clears the
/// threshold. Equal distances resolve to the earliest insertion, inherited
/// from the index's stable ordering.
pub fn best_match(
    query: &FaceVector,
    index: &FlatIndex,
    store: &RecordStore,
    threshold: f32,
) -> Result<Option<FaceMatch>, IndexError> {
    let hits = index.search(query, 1)?;
    Ok(rank(&hits, store, threshold, 1)?.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::DIMENSION;
    use crate::records::{BoundingBox, FaceRecord, Quality};

    fn basis(axis: usize) -> FaceVector {
        let mut v = vec![0.0; DIMENSION];
        v[axis] = 1.0;
        FaceVector::new(v)
    }

    fn record(name: &str, position: usize) -> FaceRecord {
        FaceRecord {
            face_id: format!("id-{position}"),
            person_name: name.to_string(),
            confidence: 0.95,
            quality: Quality::High,
            bounding_box: BoundingBox::new(0, 0, 64, 64),
            position,
        }
    }

    fn populated() -> (FlatIndex, RecordStore) {
        let mut index = FlatIndex::new();
        let mut store = RecordStore::new();
        for (i, name) in ["alice", "bob"].iter().enumerate() {
            let pos = index.add(basis(i)).unwrap();
            store.put(pos, record(name, pos)).unwrap();
        }
        (index, store)
    }

    #[test]
    fn similarity_clamps_at_zero() {
        assert_eq!(similarity(0.0), 1.0);
        assert_eq!(similarity(0.5), 0.5);
        assert_eq!(similarity(2.0), 0.0);
    }

    #[test]
    fn acceptance_boundary_is_inclusive() {
        assert!(accepts(0.6, 0.4));
        assert!(accepts(0.6, 0.41));
        assert!(!accepts(0.6, 0.39));
    }

    #[test]
    fn raising_threshold_never_loses_candidates() {
        let (index, store) = populated();
        let query = basis(0);
        let hits = index.search(&query, 5).unwrap();

        let mut previous = 0;
        for threshold in [0.0, 0.3, 0.6, 1.0, 2.0] {
            let accepted = rank(&hits, &store, threshold, 5).unwrap().len();
            assert!(accepted >= previous);
            previous = accepted;
        }
    }

    #[test]
    fn rank_numbers_from_one_and_honors_limit() {
        let (index, store) = populated();
        let hits = index.search(&basis(0), 5).unwrap();
        // Threshold 2.0 accepts everything in range.
        let matches = rank(&hits, &store, 2.0, 2).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].rank, 1);
        assert_eq!(matches[1].rank, 2);
        assert!(matches[0].distance <= matches[1].distance);

        let capped = rank(&hits, &store, 2.0, 1).unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[test]
    fn best_match_identifies_exact_vector() {
        let (index, store) = populated();
        let best = best_match(&basis(0), &index, &store, 0.6).unwrap().unwrap();
        assert_eq!(best.person_name, "alice");
        assert!(best.distance < 1e-6);
        assert!((best.similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn best_match_none_when_nothing_clears_threshold() {
        let (index, store) = populated();
        // Orthogonal unit vectors sit at squared distance 2.0.
        let best = best_match(&basis(60), &index, &store, 0.6).unwrap();
        assert!(best.is_none());
    }

    #[test]
    fn best_match_none_on_empty_index() {
        let index = FlatIndex::new();
        let store = RecordStore::new();
        assert!(best_match(&basis(0), &index, &store, 0.6).unwrap().is_none());
    }
}
