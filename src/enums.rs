use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    Image,
    // TODO: segmentation layers need compressed_segmentation encoding
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Uint16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Raw,
}

/// How a slice file is decoded.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SliceFormat {
    /// Pick by extension: `.dcm` is DICOM, anything else a raster image.
    #[default]
    Auto,
    Raster,
    Dicom,
}

impl SliceFormat {
    pub(crate) fn resolve(self, path: &Path) -> SliceFormat {
        match self {
            SliceFormat::Auto => {
                let is_dicom = path
                    .extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"));
                if is_dicom {
                    SliceFormat::Dicom
                } else {
                    SliceFormat::Raster
                }
            }
            other => other,
        }
    }
}
