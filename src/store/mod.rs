//! Chunked multi-resolution volume store in the precomputed layout.
//!
//! [`VolumeStore`] owns the committed schema and hands out one
//! [`LevelHandle`] per resolution level. Handles translate box reads and
//! writes into whole-chunk `get`/`put` calls on a [`StorageBackend`].

mod backend;
mod info;

pub use backend::{LocalBackend, MemoryBackend, StorageBackend};
pub use info::{ScaleInfo, VolumeInfo, scale_key};

use ndarray::{Array3, ArrayView3, ShapeBuilder};
use tracing::{debug, info};

use crate::bbox::Bbox;
use crate::error::{ConfigurationError, PipelineError, StoreError};
use crate::geometry::VolumeGeometry;

/// Object key of the schema document.
pub const INFO_KEY: &str = "info";

const SAMPLE_BYTES: usize = std::mem::size_of::<u16>();

/// Committed schema of a volume plus the backend it lives in.
pub struct VolumeStore<B: StorageBackend> {
    backend: B,
    info: VolumeInfo,
}

impl<B: StorageBackend> VolumeStore<B> {
    /// Validate `geometry` and commit its schema.
    ///
    /// Committing the same schema again is a no-op, so an interrupted run can
    /// be restarted against the same location. A different existing schema
    /// is refused.
    pub fn create(backend: B, geometry: &VolumeGeometry) -> Result<Self, PipelineError> {
        geometry.validate()?;
        let info = VolumeInfo::from_geometry(geometry);

        if let Some(existing) = backend.get(INFO_KEY).map_err(StoreError::from)? {
            let existing = VolumeInfo::from_json(&existing)?;
            if existing != info {
                return Err(ConfigurationError::SchemaConflict {
                    location: backend.identifier().to_string(),
                }
                .into());
            }
            debug!("Schema already committed at {}", backend.identifier());
            return Ok(Self { backend, info });
        }

        backend
            .put(INFO_KEY, &info.to_json()?)
            .map_err(StoreError::from)?;
        info!(
            "Committed schema at {}: {} level(s), base size {:?}, chunk {:?}",
            backend.identifier(),
            info.scales.len(),
            geometry.size,
            geometry.chunk_shape
        );

        Ok(Self { backend, info })
    }

    /// Reopen a store whose schema was committed earlier.
    pub fn open(backend: B) -> Result<Self, StoreError> {
        let bytes = backend
            .get(INFO_KEY)?
            .ok_or_else(|| StoreError::SchemaNotCommitted(backend.identifier().to_string()))?;
        let info = VolumeInfo::from_json(&bytes)?;
        Ok(Self { backend, info })
    }

    pub fn info(&self) -> &VolumeInfo {
        &self.info
    }

    pub fn num_levels(&self) -> usize {
        self.info.scales.len()
    }

    /// Extent of every level, as recorded in the schema.
    pub fn level_sizes(&self) -> Vec<[usize; 3]> {
        self.info.scales.iter().map(|s| s.size).collect()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Open `level` for box reads and writes.
    pub fn open_level(&self, level: usize) -> Result<LevelHandle<'_, B>, StoreError> {
        let scale = self
            .info
            .scales
            .get(level)
            .ok_or(StoreError::LevelOutOfRange {
                level,
                num_levels: self.num_levels(),
            })?;

        Ok(LevelHandle {
            backend: &self.backend,
            level,
            scale,
            chunk_shape: self.info.chunk_shape(level),
        })
    }
}

/// I/O capability scoped to one resolution level.
pub struct LevelHandle<'a, B: StorageBackend> {
    backend: &'a B,
    level: usize,
    scale: &'a ScaleInfo,
    chunk_shape: [usize; 3],
}

impl<B: StorageBackend> LevelHandle<'_, B> {
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn size(&self) -> [usize; 3] {
        self.scale.size
    }

    pub fn chunk_shape(&self) -> [usize; 3] {
        self.chunk_shape
    }

    pub fn bounds(&self) -> Bbox {
        Bbox::from_shape(self.scale.size)
    }

    /// Write `data` into `bbox`.
    ///
    /// Chunks fully covered by the box are replaced outright; chunks on the
    /// box boundary are merged with what is already stored. Writing the same
    /// data to the same box twice leaves the store unchanged.
    pub fn write_box(&self, bbox: Bbox, data: ArrayView3<'_, u16>) -> Result<(), StoreError> {
        self.check_box(&bbox)?;
        let (x, y, z) = data.dim();
        if [x, y, z] != bbox.shape() {
            return Err(StoreError::ShapeMismatch {
                expected: bbox.shape(),
                actual: [x, y, z],
            });
        }

        let chunks = bbox.chunks(self.chunk_shape, self.scale.size);
        debug!(
            "Level {}: writing box {} as {} chunk(s)",
            self.level,
            bbox,
            chunks.len()
        );

        for chunk in chunks {
            let Some(overlap) = chunk.intersection(&bbox) else {
                continue;
            };
            let source = data.slice(overlap.relative_to(bbox.min).as_slice());

            if overlap == chunk {
                self.put_chunk(&chunk, source)?;
            } else {
                let mut merged = self.get_chunk(&chunk)?;
                merged
                    .slice_mut(overlap.relative_to(chunk.min).as_slice())
                    .assign(&source);
                self.put_chunk(&chunk, merged.view())?;
            }
        }
        Ok(())
    }

    /// Read `bbox` back as a dense `(X, Y, Z)` array. Missing chunks read as zero.
    pub fn read_box(&self, bbox: Bbox) -> Result<Array3<u16>, StoreError> {
        self.check_box(&bbox)?;
        let [x, y, z] = bbox.shape();
        let mut out = Array3::<u16>::zeros((x, y, z));

        for chunk in bbox.chunks(self.chunk_shape, self.scale.size) {
            let Some(overlap) = chunk.intersection(&bbox) else {
                continue;
            };
            let stored = self.get_chunk(&chunk)?;
            out.slice_mut(overlap.relative_to(bbox.min).as_slice())
                .assign(&stored.slice(overlap.relative_to(chunk.min).as_slice()));
        }
        Ok(out)
    }

    fn check_box(&self, bbox: &Bbox) -> Result<(), StoreError> {
        if bbox.is_empty() || !self.bounds().contains(bbox) {
            return Err(StoreError::BoxOutOfBounds {
                level: self.level,
                bbox: bbox.to_string(),
                bounds: self.scale.size,
            });
        }
        Ok(())
    }

    fn chunk_key(&self, chunk: &Bbox) -> String {
        format!("{}/{}", self.scale.key, chunk)
    }

    /// Stored chunk contents, or zeros if the chunk was never written.
    fn get_chunk(&self, chunk: &Bbox) -> Result<Array3<u16>, StoreError> {
        let [x, y, z] = chunk.shape();
        let key = self.chunk_key(chunk);

        let Some(bytes) = self.backend.get(&key)? else {
            return Ok(Array3::zeros((x, y, z)));
        };

        let expected = x * y * z * SAMPLE_BYTES;
        if bytes.len() != expected {
            return Err(StoreError::CorruptChunk {
                key,
                expected,
                actual: bytes.len(),
            });
        }

        let samples: Vec<u16> = bytemuck::pod_collect_to_vec::<u8, u16>(&bytes)
            .into_iter()
            .map(u16::from_le)
            .collect();
        Array3::from_shape_vec((x, y, z).f(), samples)
            .map_err(|e| StoreError::InvalidSchema(e.to_string()))
    }

    /// Encode a chunk as raw little-endian samples, X fastest.
    fn put_chunk(&self, chunk: &Bbox, data: ArrayView3<'_, u16>) -> Result<(), StoreError> {
        let samples: Vec<u16> = data.t().iter().map(|v| v.to_le()).collect();
        self.backend
            .put(&self.chunk_key(chunk), bytemuck::cast_slice(samples.as_slice()))?;
        Ok(())
    }
}
