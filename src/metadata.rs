//! Voxel spacing sources.
//!
//! Stitched stacks come with an import XML whose `<voxel_dims>` element
//! carries the voxel size in micrometres:
//!
//! ```xml
//! <voxel_dims V="1.8" H="1.8" D="2"/>
//! ```
//!
//! `V` is the X spacing, `H` the Y spacing and `D` the depth. DICOM stacks
//! carry the same information in PixelSpacing and SliceThickness.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use dicom::object::open_file;
use dicom_dictionary_std::tags;
use regex::Regex;

use crate::error::MetadataError;

/// Nanometres per micrometre.
const NM_PER_UM: f64 = 1000.0;

/// Nanometres per millimetre.
const NM_PER_MM: f64 = 1_000_000.0;

static VOXEL_DIMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<\s*voxel_dims\b([^>]*)>").expect("valid element pattern"));

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][\w.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid attribute pattern")
});

/// Voxel spacing in nanometres, read from the sidecar XML at `path`.
pub fn voxel_spacing_from_xml(path: impl AsRef<Path>) -> Result<[f64; 3], MetadataError> {
    let path = path.as_ref();
    let xml = fs::read_to_string(path).map_err(|e| MetadataError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_voxel_dims(&xml)
}

/// Voxel spacing in nanometres from the `<voxel_dims>` element of `xml`.
pub fn parse_voxel_dims(xml: &str) -> Result<[f64; 3], MetadataError> {
    let attrs = VOXEL_DIMS
        .captures(xml)
        .and_then(|c| c.get(1))
        .ok_or(MetadataError::MissingElement)?
        .as_str();

    let lookup = |name: &'static str| -> Result<f64, MetadataError> {
        let value = ATTRIBUTE
            .captures_iter(attrs)
            .find(|c| c[1].eq_ignore_ascii_case(name))
            .and_then(|c| c.get(2).or_else(|| c.get(3)))
            .map(|m| m.as_str().trim().to_string())
            .ok_or(MetadataError::MissingAttribute(name))?;
        value
            .parse::<f64>()
            .map_err(|_| MetadataError::InvalidNumber { name, value })
    };

    Ok([
        lookup("V")? * NM_PER_UM,
        lookup("H")? * NM_PER_UM,
        lookup("D")? * NM_PER_UM,
    ])
}

/// Voxel spacing in nanometres from the DICOM slice at `path`.
///
/// With `transpose`, image columns run along X; otherwise image rows do.
pub fn voxel_spacing_from_dicom(path: impl AsRef<Path>, transpose: bool) -> Option<[f64; 3]> {
    let dicom_object = open_file(path.as_ref()).ok()?;
    let pixel_spacing = dicom_object
        .element(tags::PIXEL_SPACING)
        .ok()?
        .to_multi_float64()
        .ok()?;

    let slice_thickness = dicom_object
        .element(tags::SLICE_THICKNESS)
        .ok()?
        .to_float64()
        .ok()?;

    // PixelSpacing is (spacing between rows, spacing between columns).
    let between_rows = *pixel_spacing.first()? * NM_PER_MM;
    let between_columns = *pixel_spacing.get(1)? * NM_PER_MM;
    let (x, y) = if transpose {
        (between_columns, between_rows)
    } else {
        (between_rows, between_columns)
    };
    Some([x, y, slice_thickness * NM_PER_MM])
}
