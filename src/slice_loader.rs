use std::fs;
use std::path::{Path, PathBuf};

use dicom::object::open_file;
use dicom::pixeldata::{
    ConvertOptions, ModalityLutOption, PixelDecoder, PixelRepresentation, VoiLutOption,
};
use image::{DynamicImage, ImageReader};
use ndarray::{Array2, ArrayViewMut2, s};

use crate::enums::SliceFormat;
use crate::error::DecodeError;

/// Decodes single slice files into `(X, Y)` arrays of 16-bit samples.
#[derive(Debug, Clone)]
pub struct SliceLoader {
    shape: (usize, usize),
    transpose: bool,
    format: SliceFormat,
}

impl SliceLoader {
    /// Loader expecting slices of `shape` in volume `(X, Y)` order.
    ///
    /// Images are stored row-major, so by default their `(row, column)`
    /// layout is transposed into `(X, Y)`.
    pub fn new(shape: (usize, usize)) -> Self {
        Self {
            shape,
            transpose: true,
            format: SliceFormat::Auto,
        }
    }

    pub fn with_transpose(mut self, transpose: bool) -> Self {
        self.transpose = transpose;
        self
    }

    pub fn with_format(mut self, format: SliceFormat) -> Self {
        self.format = format;
        self
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Decode `path` into a freshly allocated array.
    pub fn load(&self, path: &Path) -> Result<Array2<u16>, DecodeError> {
        let mut out = Array2::zeros(self.shape);
        self.load_into(path, out.view_mut())?;
        Ok(out)
    }

    /// Decode `path` straight into `out`, which must have the declared shape.
    pub fn load_into(
        &self,
        path: &Path,
        mut out: ArrayViewMut2<'_, u16>,
    ) -> Result<(), DecodeError> {
        let pixels = decode(path, self.format)?;
        let oriented = if self.transpose {
            pixels.t()
        } else {
            pixels.view()
        };

        if oriented.dim() != self.shape {
            return Err(DecodeError::ShapeMismatch {
                path: path.to_path_buf(),
                expected: self.shape,
                actual: oriented.dim(),
            });
        }
        out.assign(&oriented);
        Ok(())
    }
}

/// Decode a slice into a `(rows, columns)` array.
fn decode(path: &Path, format: SliceFormat) -> Result<Array2<u16>, DecodeError> {
    match format.resolve(path) {
        SliceFormat::Dicom => decode_dicom(path),
        _ => decode_raster(path),
    }
}

fn decode_raster(path: &Path) -> Result<Array2<u16>, DecodeError> {
    let image_error = |message: String| DecodeError::Image {
        path: path.to_path_buf(),
        message,
    };

    let image = ImageReader::open(path)
        .map_err(|e| DecodeError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
        .with_guessed_format()
        .map_err(|e| image_error(e.to_string()))?
        .decode()
        .map_err(|e| image_error(e.to_string()))?;

    let DynamicImage::ImageLuma16(buffer) = image else {
        return Err(DecodeError::UnexpectedSampleType {
            path: path.to_path_buf(),
            found: format!("{:?}", image.color()),
        });
    };

    let (width, height) = buffer.dimensions();
    Array2::from_shape_vec((height as usize, width as usize), buffer.into_raw())
        .map_err(|e| image_error(e.to_string()))
}

fn decode_dicom(path: &Path) -> Result<Array2<u16>, DecodeError> {
    let dicom_error = |message: String| DecodeError::Dicom {
        path: path.to_path_buf(),
        message,
    };

    let object = open_file(path).map_err(|e| dicom_error(e.to_string()))?;
    let pixel_data = object
        .decode_pixel_data()
        .map_err(|e| dicom_error(e.to_string()))?;

    let signed = pixel_data.pixel_representation() == PixelRepresentation::Signed;
    if pixel_data.bits_allocated() != 16 || pixel_data.samples_per_pixel() != 1 || signed {
        return Err(DecodeError::UnexpectedSampleType {
            path: path.to_path_buf(),
            found: format!(
                "{} x {}-bit {}",
                pixel_data.samples_per_pixel(),
                pixel_data.bits_allocated(),
                if signed { "signed" } else { "unsigned" }
            ),
        });
    }

    // Stored samples as-is: no rescale slope/intercept, no windowing.
    let options = ConvertOptions::new()
        .with_modality_lut(ModalityLutOption::None)
        .with_voi_lut(VoiLutOption::Identity);
    pixel_data
        .to_ndarray_with_options::<u16>(&options)
        .map(|arr| arr.slice_move(s![0, .., .., 0]))
        .map_err(|e| dicom_error(e.to_string()))
}

/// Slice files with `extension` in `dir`, sorted by path.
pub fn list_slices(dir: impl AsRef<Path>, extension: &str) -> Result<Vec<PathBuf>, DecodeError> {
    let dir = dir.as_ref();
    let mut paths: Vec<_> = fs::read_dir(dir)
        .map_err(|e| DecodeError::Io {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        })
        .collect();

    if paths.is_empty() {
        return Err(DecodeError::NoSlices {
            dir: dir.to_path_buf(),
            extension: extension.to_string(),
        });
    }

    paths.sort();
    Ok(paths)
}

/// Volume size `[X, Y, Z]`: `(X, Y)` from the first slice, `Z` from the slice count.
pub fn probe_size(
    paths: &[PathBuf],
    transpose: bool,
    format: SliceFormat,
) -> Result<[usize; 3], DecodeError> {
    let first = paths.first().ok_or_else(|| DecodeError::NoSlices {
        dir: PathBuf::new(),
        extension: String::new(),
    })?;

    let (rows, cols) = decode(first, format)?.dim();
    let (x, y) = if transpose { (cols, rows) } else { (rows, cols) };
    Ok([x, y, paths.len()])
}
