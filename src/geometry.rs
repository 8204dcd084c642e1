use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Depth of one batch and of one chunk along Z.
pub const DEFAULT_BATCH_SIZE: usize = 16;

/// Chunk shape used when none is given: `[8 * 16, 8 * 16, 16]` voxels.
pub const DEFAULT_CHUNK_SHAPE: [usize; 3] =
    [DEFAULT_BATCH_SIZE * 8, DEFAULT_BATCH_SIZE * 8, DEFAULT_BATCH_SIZE];

pub const DEFAULT_NUM_LEVELS: usize = 6;

/// Per-level downsample factor. Z is never downsampled.
pub const DOWNSAMPLE_FACTOR: [usize; 3] = [2, 2, 1];

/// Geometry of a multi-resolution volume.
///
/// Axis order is `(X, Y, Z)` everywhere. Level 0 is full resolution; level
/// `i` has an X/Y extent of `ceil(size / 2^i)` and the same Z extent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeGeometry {
    pub size: [usize; 3],
    pub voxel_spacing: [f64; 3],
    pub chunk_shape: [usize; 3],
    pub num_levels: usize,
    pub downsample_factor: [usize; 3],
}

impl VolumeGeometry {
    pub fn new(size: [usize; 3], voxel_spacing: [f64; 3]) -> Self {
        Self {
            size,
            voxel_spacing,
            chunk_shape: DEFAULT_CHUNK_SHAPE,
            num_levels: DEFAULT_NUM_LEVELS,
            downsample_factor: DOWNSAMPLE_FACTOR,
        }
    }

    pub fn with_chunk_shape(mut self, chunk_shape: [usize; 3]) -> Self {
        self.chunk_shape = chunk_shape;
        self
    }

    pub fn with_num_levels(mut self, num_levels: usize) -> Self {
        self.num_levels = num_levels;
        self
    }

    pub fn with_downsample_factor(mut self, factor: [usize; 3]) -> Self {
        self.downsample_factor = factor;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.size.contains(&0) {
            return Err(ConfigurationError::InvalidSize(self.size));
        }
        if self.chunk_shape.contains(&0) {
            return Err(ConfigurationError::InvalidChunkShape(self.chunk_shape));
        }
        if self
            .voxel_spacing
            .iter()
            .any(|v| !v.is_finite() || *v <= 0.0)
        {
            return Err(ConfigurationError::InvalidVoxelSpacing(self.voxel_spacing));
        }
        if self.num_levels == 0 {
            return Err(ConfigurationError::ZeroLevels);
        }
        let deepest = u32::try_from(self.num_levels - 1).ok();
        if deepest.and_then(|exp| 2usize.checked_pow(exp)).is_none() {
            return Err(ConfigurationError::TooManyLevels(self.num_levels));
        }
        if self.downsample_factor != DOWNSAMPLE_FACTOR {
            return Err(ConfigurationError::UnsupportedDownsampleFactor(
                self.downsample_factor,
            ));
        }
        Ok(())
    }

    /// Cumulative downsample factor of `level` relative to level 0.
    ///
    /// Saturates at `usize::MAX` for levels past what `validate` accepts.
    pub fn level_factor(&self, level: usize) -> [usize; 3] {
        self.downsample_factor.map(|f| {
            u32::try_from(level)
                .ok()
                .and_then(|exp| f.checked_pow(exp))
                .unwrap_or(usize::MAX)
        })
    }

    /// Extent of `level` in voxels.
    pub fn level_size(&self, level: usize) -> [usize; 3] {
        let factor = self.level_factor(level);
        [0, 1, 2].map(|i| self.size[i].div_ceil(factor[i]))
    }

    /// Physical voxel size of `level`.
    pub fn level_resolution(&self, level: usize) -> [f64; 3] {
        let factor = self.level_factor(level);
        [0, 1, 2].map(|i| self.voxel_spacing[i] * factor[i] as f64)
    }

    pub fn level_sizes(&self) -> Vec<[usize; 3]> {
        (0..self.num_levels).map(|l| self.level_size(l)).collect()
    }
}
