//! End-to-end conversion of slice stacks into an in-memory store.

use ndarray::s;
use precomputed_volume::{
    Bbox, BatchFailure, DecodeError, MemoryBackend, Pipeline, PipelineError, PipelineOptions,
    PipelineState, VolumeStore, average_pool_2x2,
};

use super::test_utils::{
    geometry, options, pipeline, ramp, write_ramp_stack, write_slice, write_uniform_stack,
};

#[test]
fn test_uniform_stack_is_written_at_every_level() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_uniform_stack(dir.path(), 4, 32, 32, 100);
    let backend = MemoryBackend::new();
    let geometry = geometry([32, 32, 4], [16, 16, 4], 2);

    let mut pipeline = pipeline(&backend, &geometry, files, 4);
    let summary = pipeline.run().unwrap();
    assert_eq!(summary.batches_written, 1);
    assert_eq!(summary.slices_written, 4);
    assert_eq!(pipeline.state(), PipelineState::Done);

    let store = pipeline.store();
    let base = store.open_level(0).unwrap();
    assert_eq!(base.size(), [32, 32, 4]);
    assert!(base.read_box(base.bounds()).unwrap().iter().all(|&v| v == 100));

    let coarse = store.open_level(1).unwrap();
    assert_eq!(coarse.size(), [16, 16, 4]);
    assert!(coarse.read_box(coarse.bounds()).unwrap().iter().all(|&v| v == 100));

    assert_eq!(
        backend.keys(),
        vec![
            "1_1_1/0-16_0-16_0-4",
            "1_1_1/0-16_16-32_0-4",
            "1_1_1/16-32_0-16_0-4",
            "1_1_1/16-32_16-32_0-4",
            "2_2_1/0-16_0-16_0-4",
            "info",
        ]
    );
}

#[test]
fn test_odd_width_keeps_trailing_column() {
    let dir = tempfile::tempdir().unwrap();
    let files: Vec<_> = (0..4)
        .map(|z| {
            write_slice(dir.path(), &format!("z{z:04}.png"), 33, 32, |x, _| {
                (10 * x) as u16 + z as u16
            })
        })
        .collect();
    let geometry = geometry([33, 32, 4], [16, 16, 4], 2);

    let mut pipeline = pipeline(MemoryBackend::new(), &geometry, files, 4);
    pipeline.run().unwrap();

    let base = pipeline.store().open_level(0).unwrap();
    let coarse = pipeline.store().open_level(1).unwrap();
    assert_eq!(coarse.size(), [17, 16, 4]);

    let full = base.read_box(base.bounds()).unwrap();
    let pooled = coarse.read_box(coarse.bounds()).unwrap();
    assert_eq!(pooled.slice(s![16, .., ..]), full.slice(s![32, 0..16, ..]));
    for ((x, _, z), &value) in pooled.slice(s![0..16, .., ..]).indexed_iter() {
        assert_eq!(value, (20 * x + 5 + z) as u16);
    }
}

#[test]
fn test_batches_straddling_chunks_match_pooled_base() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_ramp_stack(dir.path(), 10, 20, 12);
    let geometry = geometry([20, 12, 10], [8, 8, 4], 3);

    let mut pipeline = pipeline(MemoryBackend::new(), &geometry, files, 3);
    assert_eq!(pipeline.batches().len(), 4);
    let summary = pipeline.run().unwrap();
    assert_eq!(summary.batches_written, 4);
    assert_eq!(summary.slices_written, 10);

    let store = pipeline.store();
    let base = store.open_level(0).unwrap();
    let full = base.read_box(base.bounds()).unwrap();
    for ((x, y, z), &value) in full.indexed_iter() {
        assert_eq!(value, ramp(x, y, z));
    }

    let level1 = store.open_level(1).unwrap();
    let level2 = store.open_level(2).unwrap();
    assert_eq!(level1.size(), [10, 6, 10]);
    assert_eq!(level2.size(), [5, 3, 10]);

    let expected1 = average_pool_2x2(full.view());
    assert_eq!(level1.read_box(level1.bounds()).unwrap(), expected1);
    assert_eq!(
        level2.read_box(level2.bounds()).unwrap(),
        average_pool_2x2(expected1.view())
    );
}

#[test]
fn test_decode_failure_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut files = write_uniform_stack(dir.path(), 4, 32, 32, 7);
    files[2] = write_slice(dir.path(), "narrow.png", 31, 32, |_, _| 7);
    let backend = MemoryBackend::new();
    let geometry = geometry([32, 32, 4], [16, 16, 4], 2);

    let err = pipeline(&backend, &geometry, files, 4).run().unwrap_err();
    match &err {
        PipelineError::Batch {
            index: 0,
            depth,
            level: None,
            source: BatchFailure::Decode(DecodeError::ShapeMismatch { actual, .. }),
        } => {
            assert_eq!(*depth, 0..4);
            assert_eq!(*actual, (31, 32));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.resume_batch(), Some(0));
    assert_eq!(backend.keys(), vec!["info"]);
}

#[test]
fn test_failed_run_resumes_from_failed_batch() {
    let dir = tempfile::tempdir().unwrap();
    let mut files = write_ramp_stack(dir.path(), 8, 16, 16);
    let good = files[5].clone();
    files[5] = write_slice(dir.path(), "broken.png", 15, 16, |_, _| 0);
    let backend = MemoryBackend::new();
    let geometry = geometry([16, 16, 8], [8, 8, 4], 2);

    let err = pipeline(&backend, &geometry, files.clone(), 4).run().unwrap_err();
    let resume = err.resume_batch().unwrap();
    assert_eq!(resume, 1);

    let store = VolumeStore::open(&backend).unwrap();
    let base = store.open_level(0).unwrap();
    let committed = base.read_box(Bbox::from_ranges(0..16, 0..16, 0..4)).unwrap();
    assert!(committed.indexed_iter().all(|((x, y, z), &v)| v == ramp(x, y, z)));
    let pending = base.read_box(Bbox::from_ranges(0..16, 0..16, 4..8)).unwrap();
    assert!(pending.iter().all(|&v| v == 0));

    files[5] = good;
    let opts = PipelineOptions {
        start_batch: resume,
        ..options(4)
    };
    let summary = Pipeline::new(&backend, &geometry, files, opts)
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(summary.batches_skipped, 1);
    assert_eq!(summary.batches_written, 1);

    let full = base.read_box(base.bounds()).unwrap();
    assert!(full.indexed_iter().all(|((x, y, z), &v)| v == ramp(x, y, z)));
    let coarse = store.open_level(1).unwrap();
    assert_eq!(
        coarse.read_box(coarse.bounds()).unwrap(),
        average_pool_2x2(full.view())
    );
}

#[test]
fn test_rerun_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_ramp_stack(dir.path(), 6, 12, 10);
    let backend = MemoryBackend::new();
    let geometry = geometry([12, 10, 6], [8, 8, 4], 2);

    pipeline(&backend, &geometry, files.clone(), 4).run().unwrap();
    let keys = backend.keys();
    let store = VolumeStore::open(&backend).unwrap();
    let first: Vec<_> = (0..2)
        .map(|l| {
            let level = store.open_level(l).unwrap();
            level.read_box(level.bounds()).unwrap()
        })
        .collect();

    pipeline(&backend, &geometry, files, 4).run().unwrap();
    assert_eq!(backend.keys(), keys);
    for (l, before) in first.iter().enumerate() {
        let level = store.open_level(l).unwrap();
        assert_eq!(&level.read_box(level.bounds()).unwrap(), before);
    }
}
