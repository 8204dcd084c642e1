use std::fmt;
use std::ops::Range;

use ndarray::{SliceInfo, SliceInfoElem, s};

/// Axis-aligned half-open box `[min, max)` in `(X, Y, Z)` voxel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bbox {
    pub min: [usize; 3],
    pub max: [usize; 3],
}

impl Bbox {
    pub fn new(min: [usize; 3], max: [usize; 3]) -> Self {
        Self { min, max }
    }

    /// Box spanning `[0, shape)` on every axis.
    pub fn from_shape(shape: [usize; 3]) -> Self {
        Self::new([0; 3], shape)
    }

    pub fn from_ranges(x: Range<usize>, y: Range<usize>, z: Range<usize>) -> Self {
        Self::new([x.start, y.start, z.start], [x.end, y.end, z.end])
    }

    pub fn shape(&self) -> [usize; 3] {
        [0, 1, 2].map(|i| self.max[i].saturating_sub(self.min[i]))
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.max[i] <= self.min[i])
    }

    pub fn contains(&self, other: &Bbox) -> bool {
        (0..3).all(|i| self.min[i] <= other.min[i] && other.max[i] <= self.max[i])
    }

    pub fn intersection(&self, other: &Bbox) -> Option<Bbox> {
        let bbox = Bbox::new(
            [0, 1, 2].map(|i| self.min[i].max(other.min[i])),
            [0, 1, 2].map(|i| self.max[i].min(other.max[i])),
        );
        (!bbox.is_empty()).then_some(bbox)
    }

    /// Shift the box so that `origin` becomes the zero point.
    pub fn relative_to(&self, origin: [usize; 3]) -> Bbox {
        Bbox::new(
            [0, 1, 2].map(|i| self.min[i] - origin[i]),
            [0, 1, 2].map(|i| self.max[i] - origin[i]),
        )
    }

    /// Slice argument selecting this box out of an `(X, Y, Z)` array.
    pub fn as_slice(&self) -> SliceInfo<[SliceInfoElem; 3], ndarray::Ix3, ndarray::Ix3> {
        s![
            self.min[0]..self.max[0],
            self.min[1]..self.max[1],
            self.min[2]..self.max[2]
        ]
    }

    /// Grid-aligned chunks of `chunk_shape` overlapping this box, clipped to `bounds`.
    ///
    /// Chunks are yielded X fastest, then Y, then Z.
    pub fn chunks(&self, chunk_shape: [usize; 3], bounds: [usize; 3]) -> Vec<Bbox> {
        let Some(clipped) = self.intersection(&Bbox::from_shape(bounds)) else {
            return Vec::new();
        };

        let first = [0, 1, 2].map(|i| clipped.min[i] / chunk_shape[i]);
        let last = [0, 1, 2].map(|i| clipped.max[i].div_ceil(chunk_shape[i]));

        let mut chunks = Vec::new();
        for gz in first[2]..last[2] {
            for gy in first[1]..last[1] {
                for gx in first[0]..last[0] {
                    let grid = [gx, gy, gz];
                    let min = [0, 1, 2].map(|i| grid[i] * chunk_shape[i]);
                    let max = [0, 1, 2].map(|i| (min[i] + chunk_shape[i]).min(bounds[i]));
                    chunks.push(Bbox::new(min, max));
                }
            }
        }
        chunks
    }
}

impl fmt::Display for Bbox {
    /// Formats as the precomputed chunk name `x0-x1_y0-y1_z0-z1`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}_{}-{}_{}-{}",
            self.min[0], self.max[0], self.min[1], self.max[1], self.min[2], self.max[2]
        )
    }
}
