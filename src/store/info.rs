//! The precomputed `info` document.
//!
//! ```json
//! {
//!   "type": "image",
//!   "data_type": "uint16",
//!   "num_channels": 1,
//!   "scales": [
//!     {
//!       "key": "1800_1800_2000",
//!       "size": [4096, 4096, 1200],
//!       "resolution": [1800.0, 1800.0, 2000.0],
//!       "chunk_sizes": [[128, 128, 16]],
//!       "encoding": "raw",
//!       "voxel_offset": [0, 0, 0]
//!     }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::enums::{DataType, Encoding, LayerType};
use crate::error::StoreError;
use crate::geometry::VolumeGeometry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeInfo {
    #[serde(rename = "type")]
    pub layer_type: LayerType,
    pub data_type: DataType,
    pub num_channels: usize,
    pub scales: Vec<ScaleInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleInfo {
    pub key: String,
    pub size: [usize; 3],
    pub resolution: [f64; 3],
    pub chunk_sizes: Vec<[usize; 3]>,
    pub encoding: Encoding,
    pub voxel_offset: [i64; 3],
}

impl VolumeInfo {
    /// Build the document for a validated geometry.
    pub fn from_geometry(geometry: &VolumeGeometry) -> Self {
        let scales = (0..geometry.num_levels)
            .map(|level| {
                let resolution = geometry.level_resolution(level);
                ScaleInfo {
                    key: scale_key(resolution),
                    size: geometry.level_size(level),
                    resolution,
                    chunk_sizes: vec![geometry.chunk_shape],
                    encoding: Encoding::Raw,
                    voxel_offset: [0; 3],
                }
            })
            .collect();

        Self {
            layer_type: LayerType::Image,
            data_type: DataType::Uint16,
            num_channels: 1,
            scales,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec_pretty(self).map_err(|e| StoreError::InvalidSchema(e.to_string()))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, StoreError> {
        let info: Self =
            serde_json::from_slice(bytes).map_err(|e| StoreError::InvalidSchema(e.to_string()))?;
        info.check()?;
        Ok(info)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.scales.is_empty() {
            return Err(StoreError::InvalidSchema("no scales".into()));
        }
        if self.num_channels != 1 {
            return Err(StoreError::InvalidSchema(format!(
                "expected 1 channel, found {}",
                self.num_channels
            )));
        }
        for scale in &self.scales {
            match scale.chunk_sizes.first() {
                Some(chunk) if !chunk.contains(&0) => {}
                _ => {
                    return Err(StoreError::InvalidSchema(format!(
                        "scale {} has no usable chunk size",
                        scale.key
                    )));
                }
            }
        }
        Ok(())
    }

    /// Chunk shape shared by every level.
    pub fn chunk_shape(&self, level: usize) -> [usize; 3] {
        self.scales[level].chunk_sizes[0]
    }
}

/// Directory name of a scale: its resolution joined by `_`.
pub fn scale_key(resolution: [f64; 3]) -> String {
    resolution
        .iter()
        .map(|r| format_resolution(*r))
        .collect::<Vec<_>>()
        .join("_")
}

fn format_resolution(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
