//! 2×2 average pooling pyramid over the X/Y plane.
//!
//! Every level halves X and Y (rounding up) and keeps Z, so each depth slice
//! is reduced independently. Sums are accumulated in `u32` and divided with
//! round-half-up: `(sum + n / 2) / n`, where `n` is the number of samples
//! that actually exist under the 2×2 window. On an odd edge the trailing
//! row or column therefore averages only itself and its real neighbours.

use ndarray::{Array3, ArrayView3};

use crate::error::ExtentMismatchError;

/// Halve `block` in X and Y by averaging each 2×2 neighbourhood.
pub fn average_pool_2x2(block: ArrayView3<'_, u16>) -> Array3<u16> {
    let (x, y, z) = block.dim();
    let (out_x, out_y) = (x.div_ceil(2), y.div_ceil(2));

    Array3::from_shape_fn((out_x, out_y, z), |(i, j, k)| {
        let xs = 2 * i..(2 * i + 2).min(x);
        let ys = 2 * j..(2 * j + 2).min(y);

        let mut sum = 0u32;
        let mut count = 0u32;
        for sx in xs {
            for sy in ys.clone() {
                sum += u32::from(block[[sx, sy, k]]);
                count += 1;
            }
        }
        ((sum + count / 2) / count) as u16
    })
}

/// Derives coarser levels from a full-resolution block, one at a time.
///
/// `level_sizes` are the extents declared for every level, level 0 first.
pub struct PyramidGenerator<'a> {
    base: ArrayView3<'a, u16>,
    level_sizes: &'a [[usize; 3]],
    depth: usize,
}

impl<'a> PyramidGenerator<'a> {
    /// Declared Z extents cover the whole volume, so derived levels are
    /// checked against `level_sizes` in X and Y and against the batch depth in Z.
    pub fn new(base: ArrayView3<'a, u16>, level_sizes: &'a [[usize; 3]]) -> Self {
        let depth = base.dim().2;
        Self {
            base,
            level_sizes,
            depth,
        }
    }

    /// Lazy iterator over levels `1..level_sizes.len()`.
    pub fn levels(&self) -> PyramidLevels<'a> {
        PyramidLevels {
            base: self.base.clone(),
            pending: None,
            next_level: 1,
            level_sizes: self.level_sizes,
            depth: self.depth,
        }
    }
}

/// Iterator yielding `(level, block)` for each derived level.
///
/// The successor of a level is pooled before the level is handed out, so
/// every block is produced once and moved out without copying.
pub struct PyramidLevels<'a> {
    base: ArrayView3<'a, u16>,
    pending: Option<Array3<u16>>,
    next_level: usize,
    level_sizes: &'a [[usize; 3]],
    depth: usize,
}

impl Iterator for PyramidLevels<'_> {
    type Item = Result<(usize, Array3<u16>), ExtentMismatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        let level = self.next_level;
        let declared = *self.level_sizes.get(level)?;
        self.next_level += 1;

        let block = match self.pending.take() {
            Some(pending) => pending,
            None => average_pool_2x2(self.base.view()),
        };

        let (x, y, z) = block.dim();
        if x != declared[0] || y != declared[1] || z != self.depth {
            // Stop after the first mismatch.
            self.next_level = self.level_sizes.len();
            return Some(Err(ExtentMismatchError {
                level,
                expected: [declared[0], declared[1], self.depth],
                actual: [x, y, z],
            }));
        }

        if self.next_level < self.level_sizes.len() {
            self.pending = Some(average_pool_2x2(block.view()));
        }
        Some(Ok((level, block)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.level_sizes.len().saturating_sub(self.next_level);
        (remaining, Some(remaining))
    }
}

/// Check that the full-resolution block matches level 0 in X and Y.
pub fn check_base_extent(
    block: ArrayView3<'_, u16>,
    level_sizes: &[[usize; 3]],
) -> Result<(), ExtentMismatchError> {
    let (x, y, z) = block.dim();
    match level_sizes.first() {
        Some(declared) if declared[0] == x && declared[1] == y => Ok(()),
        declared => Err(ExtentMismatchError {
            level: 0,
            expected: declared.map_or([0, 0, z], |d| [d[0], d[1], z]),
            actual: [x, y, z],
        }),
    }
}
