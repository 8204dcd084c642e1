//! The conversion driver.
//!
//! Batches are processed strictly one after another:
//!
//! ```text
//! Uninitialized -> SchemaCreated -> { Loading -> Downsampling -> Writing }* -> Done
//! ```
//!
//! A batch only starts loading once the previous batch has been written at
//! every level. Any failure stops the run and names the batch (and level)
//! it happened in, so the run can be resumed from that batch.

use std::path::PathBuf;

use tracing::{debug, info, warn};
use web_time::Instant;

use crate::batch::{Batch, BatchAssembler};
use crate::config::Config;
use crate::enums::SliceFormat;
use crate::error::{BatchFailure, ConfigurationError, PipelineError};
use crate::geometry::{DEFAULT_BATCH_SIZE, VolumeGeometry};
use crate::metadata::{voxel_spacing_from_dicom, voxel_spacing_from_xml};
use crate::pyramid::{PyramidGenerator, check_base_extent};
use crate::slice_loader::{SliceLoader, list_slices, probe_size};
use crate::store::{LocalBackend, StorageBackend, VolumeStore};
use crate::writer::LevelWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    SchemaCreated,
    Loading { batch: usize },
    Downsampling { batch: usize },
    Writing { batch: usize },
    Done,
}

/// Run parameters that are not part of the volume geometry.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub batch_size: usize,
    /// First batch to process; earlier batches are assumed to be committed.
    pub start_batch: usize,
    pub transpose: bool,
    pub format: SliceFormat,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            start_batch: 0,
            transpose: true,
            format: SliceFormat::Auto,
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub batches_written: usize,
    pub batches_skipped: usize,
    pub slices_written: usize,
    pub num_levels: usize,
    pub elapsed_secs: f64,
}

pub struct Pipeline<B: StorageBackend> {
    store: VolumeStore<B>,
    assembler: BatchAssembler,
    level_sizes: Vec<[usize; 3]>,
    options: PipelineOptions,
    state: PipelineState,
}

impl<B: StorageBackend> Pipeline<B> {
    /// Commit the schema for `geometry` and prepare to convert `files`.
    ///
    /// `files` must be ordered by depth and match `geometry.size` in count.
    pub fn new(
        backend: B,
        geometry: &VolumeGeometry,
        files: Vec<PathBuf>,
        options: PipelineOptions,
    ) -> Result<Self, PipelineError> {
        geometry.validate()?;
        if files.len() != geometry.size[2] {
            return Err(ConfigurationError::SliceCountMismatch {
                expected: geometry.size[2],
                found: files.len(),
            }
            .into());
        }

        let loader = SliceLoader::new((geometry.size[0], geometry.size[1]))
            .with_transpose(options.transpose)
            .with_format(options.format);
        let assembler = BatchAssembler::new(files, loader, options.batch_size)?;

        let num_batches = assembler.batches().len();
        if options.start_batch > 0 && options.start_batch >= num_batches {
            return Err(ConfigurationError::StartBatchOutOfRange {
                start: options.start_batch,
                num_batches,
            }
            .into());
        }

        let store = VolumeStore::create(backend, geometry)?;
        let level_sizes = store.level_sizes();
        debug!("State: Uninitialized -> SchemaCreated");

        Ok(Self {
            store,
            assembler,
            level_sizes,
            options,
            state: PipelineState::SchemaCreated,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn store(&self) -> &VolumeStore<B> {
        &self.store
    }

    pub fn batches(&self) -> Vec<Batch> {
        self.assembler.batches()
    }

    /// Convert every remaining batch.
    pub fn run(&mut self) -> Result<RunSummary, PipelineError> {
        let start = Instant::now();
        let batches = self.assembler.batches();
        let total = batches.len();
        let writer = LevelWriter::new(&self.store)?;

        if self.options.start_batch > 0 {
            warn!(
                "Resuming at batch {}: skipping depth 0..{}",
                self.options.start_batch,
                batches[self.options.start_batch].depth.start
            );
        }

        let mut summary = RunSummary {
            batches_written: 0,
            batches_skipped: self.options.start_batch.min(total),
            slices_written: 0,
            num_levels: writer.num_levels(),
            elapsed_secs: 0.0,
        };

        for batch in batches.iter().skip(self.options.start_batch) {
            let batch_start = Instant::now();
            process_batch(
                &self.assembler,
                &writer,
                &self.level_sizes,
                batch,
                &mut self.state,
            )?;

            summary.batches_written += 1;
            summary.slices_written += batch.len();
            info!(
                "Batch {}/{} (depth {}..{}) written at {} level(s) in {:.2}s",
                batch.index + 1,
                total,
                batch.depth.start,
                batch.depth.end,
                writer.num_levels(),
                batch_start.elapsed().as_secs_f64()
            );
        }

        self.state = PipelineState::Done;
        summary.elapsed_secs = start.elapsed().as_secs_f64();
        info!(
            "Wrote {} slice(s) in {} batch(es) in {:.1}s",
            summary.slices_written, summary.batches_written, summary.elapsed_secs
        );
        Ok(summary)
    }
}

/// Convert the slice directory named by `config` into a local precomputed volume.
pub fn convert_directory(config: &Config) -> Result<RunSummary, PipelineError> {
    let files = list_slices(&config.input_path, &config.extension)?;
    let format = SliceFormat::Auto;
    let size = probe_size(&files, config.transpose(), format)?;
    info!("Found {} slice(s) in {}", files.len(), config.input_path.display());
    info!("Image size is {:?}", size);

    let voxel_spacing = match (config.voxel_size(), &config.input_xml) {
        (Some(spacing), _) => spacing,
        (None, Some(xml)) => voxel_spacing_from_xml(xml)?,
        (None, None) => files
            .first()
            .filter(|first| format.resolve(first) == SliceFormat::Dicom)
            .and_then(|first| voxel_spacing_from_dicom(first, config.transpose()))
            .ok_or(ConfigurationError::MissingVoxelSpacing)?,
    };
    info!("Voxel size is {:?} nm", voxel_spacing);

    let geometry = VolumeGeometry::new(size, voxel_spacing)
        .with_chunk_shape(config.chunk_shape())
        .with_num_levels(config.num_levels);
    let options = PipelineOptions {
        batch_size: config.batch_size,
        start_batch: config.start_batch,
        transpose: config.transpose(),
        format,
    };

    let backend = LocalBackend::from_location(&config.precomputed_path);
    Pipeline::new(backend, &geometry, files, options)?.run()
}

fn process_batch<B: StorageBackend>(
    assembler: &BatchAssembler,
    writer: &LevelWriter<'_, B>,
    level_sizes: &[[usize; 3]],
    batch: &Batch,
    state: &mut PipelineState,
) -> Result<(), PipelineError> {
    let fail = |level: Option<usize>, source: BatchFailure| PipelineError::Batch {
        index: batch.index,
        depth: batch.depth.clone(),
        level,
        source,
    };

    transition(state, PipelineState::Loading { batch: batch.index });
    let block = assembler.assemble(batch).map_err(|e| fail(None, e))?;

    transition(state, PipelineState::Downsampling { batch: batch.index });
    check_base_extent(block.view(), level_sizes).map_err(|e| fail(Some(0), e.into()))?;
    let derived = PyramidGenerator::new(block.view(), level_sizes)
        .levels()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| fail(Some(e.level), e.into()))?;

    transition(state, PipelineState::Writing { batch: batch.index });
    writer
        .write(0, block.view(), batch.depth.clone())
        .map_err(|e| fail(Some(0), e.into()))?;
    for (level, level_block) in &derived {
        writer
            .write(*level, level_block.view(), batch.depth.clone())
            .map_err(|e| fail(Some(*level), e.into()))?;
    }
    Ok(())
}

fn transition(state: &mut PipelineState, next: PipelineState) {
    debug!("State: {:?} -> {:?}", state, next);
    *state = next;
}
