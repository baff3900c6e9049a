pub mod config;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod index;
pub mod matcher;
pub mod records;
pub mod storage;

pub use engine::{FaceEncodingEngine, FaceOutcome, IndexStats, Registration, UNKNOWN_LABEL};
pub use error::{EncodingError, EngineError, IndexError, SnapshotError};
pub use index::{FaceVector, FlatIndex, DIMENSION};
pub use matcher::FaceMatch;
pub use records::{BoundingBox, Detection, FaceRecord, Quality, RecordStore};
