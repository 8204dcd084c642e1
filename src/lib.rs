//! # precomputed-volume
//!
//! This crate converts an ordered stack of 2D slice images into a chunked,
//! multi-resolution volume in the Neuroglancer "precomputed" layout.
//!
//! Slices are read in batches along the depth axis. Every batch is loaded in
//! parallel (one rayon worker per slice) into a dense `(X, Y, Z)` block,
//! downsampled by 2×2 averaging in X/Y into every coarser level and written
//! into the chunk grid of each level. A batch is fully committed at every
//! level before the next one is loaded, so memory stays bounded by one batch
//! and a failed run can be resumed from the batch that failed.
//!
//! Supported slice formats:
//!  - 16-bit grayscale rasters (TIFF, PNG, ...) through the `image` crate
//!  - 16-bit monochrome DICOM files through `dicom-rs`
//!
//! Voxel spacing comes from an explicit value, an import XML carrying
//! `<voxel_dims V=".." H=".." D=".."/>` or, for DICOM input, the
//! PixelSpacing and SliceThickness attributes.
//!
//! # Examples
//!
//! ## Converting a directory of slices
//!
//! ```no_run
//! # use precomputed_volume::{
//! #     LocalBackend, Pipeline, PipelineOptions, VolumeGeometry, list_slices, probe_size,
//! # };
//! let files = list_slices("stitched", "tif").expect("should have listed slices");
//! let size = probe_size(&files, true, Default::default()).expect("should have read first slice");
//! let geometry = VolumeGeometry::new(size, [1800.0, 1800.0, 2000.0]);
//!
//! let mut pipeline = Pipeline::new(
//!     LocalBackend::new("volume"),
//!     &geometry,
//!     files,
//!     PipelineOptions::default(),
//! )
//! .expect("should have created the volume");
//! let summary = pipeline.run().expect("should have converted every batch");
//! println!("wrote {} slices", summary.slices_written);
//! ```
//!
//! ## Reading back a region
//!
//! ```no_run
//! # use precomputed_volume::{Bbox, LocalBackend, VolumeStore};
//! let store = VolumeStore::open(LocalBackend::new("volume")).expect("should have opened volume");
//! let level = store.open_level(1).expect("should have level 1");
//! let block = level
//!     .read_box(Bbox::from_ranges(0..64, 0..64, 0..16))
//!     .expect("should have read the box");
//! assert_eq!(block.dim(), (64, 64, 16));
//! ```

pub mod batch;
pub mod bbox;
pub mod config;
pub mod enums;
pub mod error;
pub mod geometry;
pub mod metadata;
pub mod pipeline;
pub mod pyramid;
pub mod slice_loader;
pub mod store;
pub mod writer;

pub use batch::{Batch, BatchAssembler, plan_batches};
pub use bbox::Bbox;
pub use config::Config;
pub use enums::SliceFormat;
pub use error::{
    BatchFailure, ConfigurationError, DecodeError, ExtentMismatchError, IoError, MetadataError,
    PipelineError, StoreError,
};
pub use geometry::VolumeGeometry;
pub use pipeline::{Pipeline, PipelineOptions, PipelineState, RunSummary, convert_directory};
pub use pyramid::{PyramidGenerator, average_pool_2x2};
pub use slice_loader::{SliceLoader, list_slices, probe_size};
pub use store::{LevelHandle, LocalBackend, MemoryBackend, StorageBackend, VolumeStore};
pub use writer::LevelWriter;
