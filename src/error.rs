use thiserror::Error;

/// Failures while turning a face region into a feature vector. Reported
/// per-face during recognition; never aborts the whole batch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("source image is empty or malformed")]
    MalformedImage,
    #[error("face region is empty or lies outside the image")]
    EmptyRegion,
    #[error("face region carries no gradient signal")]
    DegenerateRegion,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("cannot normalize a zero-norm vector")]
    ZeroNorm,
    #[error("no record stored at position {0}")]
    NotFound(usize),
    #[error("record position {position} does not pair with store length {expected}")]
    PositionOutOfSync { position: usize, expected: usize },
}

/// Engine-level failures surfaced to callers of register/recognize.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("no face detected in image")]
    NoFaceDetected,
    #[error("multiple faces detected where exactly one is required")]
    AmbiguousInput,
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The on-disk snapshot was built for a different encoding dimension.
    /// This is a configuration error and must not be papered over.
    #[error("snapshot dimension {found} does not match configured dimension {expected}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("snapshot holds {vectors} vectors but {records} records")]
    Desynchronized { vectors: usize, records: usize },
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot codec: {0}")]
    Codec(#[from] postcard::Error),
}
