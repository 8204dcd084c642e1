use std::ops::Range;
use std::path::PathBuf;

use thiserror::Error;

/// Invalid geometry or run parameters, detected before any I/O.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("Volume size must be positive on every axis, got {0:?}")]
    InvalidSize([usize; 3]),

    #[error("Chunk shape must be positive on every axis, got {0:?}")]
    InvalidChunkShape([usize; 3]),

    #[error("Voxel spacing must be positive and finite, got {0:?}")]
    InvalidVoxelSpacing([f64; 3]),

    #[error("At least one resolution level is required")]
    ZeroLevels,

    #[error("{0} resolution levels exceed the representable downsample factor")]
    TooManyLevels(usize),

    #[error("Unsupported downsample factor {0:?}: only (2, 2, 1) is supported")]
    UnsupportedDownsampleFactor([usize; 3]),

    #[error("Batch size must be greater than 0")]
    ZeroBatchSize,

    #[error("Found {found} slice(s), but the volume is {expected} deep")]
    SliceCountMismatch { expected: usize, found: usize },

    #[error("Start batch {start} is past the last batch ({num_batches} in total)")]
    StartBatchOutOfRange { start: usize, num_batches: usize },

    #[error("No voxel spacing source: pass --voxel-size or --input-xml, or use DICOM slices")]
    MissingVoxelSpacing,

    #[error("Existing schema at {location} does not match the requested geometry")]
    SchemaConflict { location: String },
}

/// A slice file could not be turned into a `(X, Y)` array of 16-bit samples.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    #[error("No slices with extension '{extension}' found in {}", .dir.display())]
    NoSlices { dir: PathBuf, extension: String },

    #[error("Failed to read {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },

    #[error("Failed to decode image {}: {message}", .path.display())]
    Image { path: PathBuf, message: String },

    #[error("Failed to decode DICOM {}: {message}", .path.display())]
    Dicom { path: PathBuf, message: String },

    #[error("Slice {} has shape {actual:?}, expected {expected:?}", .path.display())]
    ShapeMismatch {
        path: PathBuf,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Slice {} holds {found} samples, expected 16-bit unsigned", .path.display())]
    UnexpectedSampleType { path: PathBuf, found: String },
}

/// I/O errors raised by a storage backend.
#[derive(Debug, Clone, Error)]
pub enum IoError {
    #[error("Filesystem error on {key}: {message}")]
    Filesystem { key: String, message: String },

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Errors from the chunked volume store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    #[error("No schema committed at {0}")]
    SchemaNotCommitted(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Level {level} out of range, store has {num_levels} level(s)")]
    LevelOutOfRange { level: usize, num_levels: usize },

    #[error("Box {bbox} exceeds level {level} bounds {bounds:?}")]
    BoxOutOfBounds {
        level: usize,
        bbox: String,
        bounds: [usize; 3],
    },

    #[error("Data shape {actual:?} does not match box shape {expected:?}")]
    ShapeMismatch {
        expected: [usize; 3],
        actual: [usize; 3],
    },

    #[error("Chunk {key} holds {actual} bytes, expected {expected}")]
    CorruptChunk {
        key: String,
        expected: usize,
        actual: usize,
    },
}

/// A derived pyramid level disagrees with the extent declared in the schema.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Level {level} has extent {actual:?}, schema declares {expected:?}")]
pub struct ExtentMismatchError {
    pub level: usize,
    pub expected: [usize; 3],
    pub actual: [usize; 3],
}

/// The sidecar XML could not supply a voxel size.
#[derive(Debug, Clone, Error)]
pub enum MetadataError {
    #[error("Failed to read {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },

    #[error("No <voxel_dims> element found")]
    MissingElement,

    #[error("Attribute '{0}' missing from <voxel_dims>")]
    MissingAttribute(&'static str),

    #[error("Attribute '{name}' is not a number: {value}")]
    InvalidNumber { name: &'static str, value: String },
}

/// What went wrong inside one batch.
#[derive(Debug, Clone, Error)]
pub enum BatchFailure {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Extent(#[from] ExtentMismatchError),

    #[error(transparent)]
    Write(#[from] StoreError),

    #[error("Failed to start slice loader pool: {0}")]
    LoaderPool(String),
}

/// Errors that terminate a conversion run.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Input error: {0}")]
    Input(#[from] DecodeError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error(
        "Batch {index} (depth {}..{}){} failed: {source}",
        .depth.start,
        .depth.end,
        level_suffix(.level)
    )]
    Batch {
        index: usize,
        depth: Range<usize>,
        level: Option<usize>,
        #[source]
        source: BatchFailure,
    },
}

impl PipelineError {
    /// Index of the batch to resume from, if the failure happened mid-run.
    pub fn resume_batch(&self) -> Option<usize> {
        match self {
            PipelineError::Batch { index, .. } => Some(*index),
            _ => None,
        }
    }
}

fn level_suffix(level: &Option<usize>) -> String {
    level.map(|l| format!(" at level {l}")).unwrap_or_default()
}
