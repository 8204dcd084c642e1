use std::ops::Range;

use ndarray::ArrayView3;
use tracing::debug;

use crate::bbox::Bbox;
use crate::error::StoreError;
use crate::store::{LevelHandle, StorageBackend, VolumeStore};

/// Writes batch blocks into every level of a store.
pub struct LevelWriter<'a, B: StorageBackend> {
    handles: Vec<LevelHandle<'a, B>>,
}

impl<'a, B: StorageBackend> LevelWriter<'a, B> {
    /// Open a handle for every level of `store`.
    pub fn new(store: &'a VolumeStore<B>) -> Result<Self, StoreError> {
        let handles = (0..store.num_levels())
            .map(|level| store.open_level(level))
            .collect::<Result<_, _>>()?;
        Ok(Self { handles })
    }

    pub fn num_levels(&self) -> usize {
        self.handles.len()
    }

    /// Box addressed at `level` by the full-resolution depth range `depth`.
    ///
    /// Z is not downsampled, so the depth range carries over unchanged.
    pub fn level_box(&self, level: usize, depth: Range<usize>) -> Result<Bbox, StoreError> {
        let handle = self.handle(level)?;
        let [x, y, _] = handle.size();
        Ok(Bbox::from_ranges(0..x, 0..y, depth))
    }

    /// Write `block` as the `depth` slab of `level`.
    pub fn write(
        &self,
        level: usize,
        block: ArrayView3<'_, u16>,
        depth: Range<usize>,
    ) -> Result<(), StoreError> {
        let bbox = self.level_box(level, depth)?;
        debug!("Level {level}: writing {:?} to {bbox}", block.dim());
        self.handle(level)?.write_box(bbox, block)
    }

    fn handle(&self, level: usize) -> Result<&LevelHandle<'a, B>, StoreError> {
        self.handles.get(level).ok_or(StoreError::LevelOutOfRange {
            level,
            num_levels: self.handles.len(),
        })
    }
}
