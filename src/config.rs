//! Command-line configuration.
//!
//! Every option can also be set through an environment variable with the
//! `PCV_` prefix, e.g. `PCV_BATCH_SIZE=32`.

use std::path::PathBuf;

use clap::Parser;

use crate::geometry::{DEFAULT_BATCH_SIZE, DEFAULT_NUM_LEVELS};

/// Default slice file extension.
pub const DEFAULT_EXTENSION: &str = "tif";

/// Convert a directory of sequentially named slices into a precomputed volume.
#[derive(Parser, Debug, Clone)]
#[command(name = "precomputed-volume")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Directory containing the stitched slices, named so that sorting by
    /// name gives depth order.
    pub input_path: PathBuf,

    /// Output location of the precomputed volume (a directory, optionally
    /// prefixed with `file://`).
    pub precomputed_path: String,

    /// Import XML providing `<voxel_dims V=".." H=".." D=".."/>` in micrometres.
    #[arg(long, env = "PCV_INPUT_XML")]
    pub input_xml: Option<PathBuf>,

    /// Voxel size in nanometres as `X,Y,Z`; overrides the XML and DICOM headers.
    #[arg(long, env = "PCV_VOXEL_SIZE", value_delimiter = ',')]
    pub voxel_size: Option<Vec<f64>>,

    /// Extension of the slice files.
    #[arg(long, default_value = DEFAULT_EXTENSION, env = "PCV_EXTENSION")]
    pub extension: String,

    /// Number of slices loaded and written together.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, env = "PCV_BATCH_SIZE")]
    pub batch_size: usize,

    /// Number of resolution levels, including full resolution.
    #[arg(long, default_value_t = DEFAULT_NUM_LEVELS, env = "PCV_NUM_LEVELS")]
    pub num_levels: usize,

    /// Chunk shape as `X,Y,Z`. Defaults to `8*B,8*B,B` for batch size `B`.
    #[arg(long, env = "PCV_CHUNK_SHAPE", value_delimiter = ',')]
    pub chunk_shape: Option<Vec<usize>>,

    /// Keep the image row/column layout instead of transposing to X/Y.
    #[arg(long, default_value_t = false, env = "PCV_NO_TRANSPOSE")]
    pub no_transpose: bool,

    /// Resume from this batch index; earlier batches must already be written.
    #[arg(long, default_value_t = 0, env = "PCV_START_BATCH")]
    pub start_batch: usize,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("batch_size must be greater than 0".to_string());
        }
        if self.num_levels == 0 {
            return Err("num_levels must be greater than 0".to_string());
        }
        if self.extension.is_empty() {
            return Err("extension must not be empty".to_string());
        }
        if self.precomputed_path.is_empty() {
            return Err("precomputed_path must not be empty".to_string());
        }
        if self.precomputed_path.contains("://") && !self.precomputed_path.starts_with("file://") {
            return Err(format!(
                "Only local paths or file:// locations are supported, got {}",
                self.precomputed_path
            ));
        }
        if let Some(ref shape) = self.chunk_shape {
            if shape.len() != 3 || shape.contains(&0) {
                return Err("chunk_shape must be three positive integers".to_string());
            }
        }
        if let Some(ref size) = self.voxel_size {
            if size.len() != 3 || size.iter().any(|v| !v.is_finite() || *v <= 0.0) {
                return Err("voxel_size must be three positive numbers".to_string());
            }
        }
        Ok(())
    }

    pub fn chunk_shape(&self) -> [usize; 3] {
        match self.chunk_shape.as_deref() {
            Some(&[x, y, z]) => [x, y, z],
            _ => [self.batch_size * 8, self.batch_size * 8, self.batch_size],
        }
    }

    pub fn voxel_size(&self) -> Option<[f64; 3]> {
        match self.voxel_size.as_deref() {
            Some(&[x, y, z]) => Some([x, y, z]),
            _ => None,
        }
    }

    pub fn transpose(&self) -> bool {
        !self.no_transpose
    }
}
