use std::ops::Range;
use std::path::PathBuf;

use ndarray::{Array3, Axis};
use rayon::prelude::*;
use tracing::debug;

use crate::error::{BatchFailure, ConfigurationError};
use crate::slice_loader::SliceLoader;

/// A contiguous run of depth indices loaded and written together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub index: usize,
    pub depth: Range<usize>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.depth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depth.is_empty()
    }
}

/// Split `num_slices` depth indices into batches of at most `batch_size`.
pub fn plan_batches(
    num_slices: usize,
    batch_size: usize,
) -> Result<Vec<Batch>, ConfigurationError> {
    if batch_size == 0 {
        return Err(ConfigurationError::ZeroBatchSize);
    }

    Ok((0..num_slices)
        .step_by(batch_size)
        .enumerate()
        .map(|(index, start)| Batch {
            index,
            depth: start..(start + batch_size).min(num_slices),
        })
        .collect())
}

/// Fills dense `(X, Y, batch_len)` blocks from an ordered list of slice files.
pub struct BatchAssembler {
    files: Vec<PathBuf>,
    loader: SliceLoader,
    batch_size: usize,
}

impl BatchAssembler {
    pub fn new(
        files: Vec<PathBuf>,
        loader: SliceLoader,
        batch_size: usize,
    ) -> Result<Self, ConfigurationError> {
        if batch_size == 0 {
            return Err(ConfigurationError::ZeroBatchSize);
        }
        Ok(Self {
            files,
            loader,
            batch_size,
        })
    }

    pub fn num_slices(&self) -> usize {
        self.files.len()
    }

    pub fn batches(&self) -> Vec<Batch> {
        // batch_size is checked in new()
        plan_batches(self.files.len(), self.batch_size).unwrap_or_default()
    }

    /// Load every slice of `batch` into one block.
    ///
    /// Slices are decoded on a pool with one thread per slice. Each worker
    /// owns exactly one Z lane of the block; the call returns only after all
    /// workers have finished.
    pub fn assemble(&self, batch: &Batch) -> Result<Array3<u16>, BatchFailure> {
        let (x, y) = self.loader.shape();
        let files = &self.files[batch.depth.clone()];
        let mut block = Array3::<u16>::zeros((x, y, files.len()));

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(files.len().max(1))
            .thread_name(|i| format!("slice-loader-{i}"))
            .build()
            .map_err(|e| BatchFailure::LoaderPool(e.to_string()))?;

        pool.install(|| {
            block
                .axis_iter_mut(Axis(2))
                .into_par_iter()
                .zip(files.par_iter())
                .try_for_each(|(lane, path)| self.loader.load_into(path, lane))
        })?;

        debug!(
            "Batch {}: loaded {} slice(s) into {:?}",
            batch.index,
            files.len(),
            block.dim()
        );
        Ok(block)
    }
}
