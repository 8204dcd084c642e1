//! DICOM slices through the loader, the spacing reader and a full conversion.

use clap::Parser;
use precomputed_volume::metadata::voxel_spacing_from_dicom;
use precomputed_volume::{
    Config, DecodeError, LocalBackend, SliceLoader, VolumeStore, convert_directory, probe_size,
};

use super::test_utils::{DicomSamples, write_dicom};

#[test]
fn test_dicom_slice_loads_stored_samples_transposed() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_dicom(dir.path(), "z0000.dcm", 5, 3, DicomSamples::Unsigned16, |x, y| {
        x + 100 * y
    });

    assert_eq!(probe_size(&[path.clone()], true, Default::default()).unwrap(), [5, 3, 1]);

    let slice = SliceLoader::new((5, 3)).load(&path).unwrap();
    assert_eq!(slice.dim(), (5, 3));
    // Rescale slope and intercept are not applied.
    assert_eq!(slice[[4, 2]], 204);
    assert_eq!(slice[[1, 0]], 1);

    let rows = SliceLoader::new((3, 5))
        .with_transpose(false)
        .load(&path)
        .unwrap();
    assert_eq!(rows[[2, 4]], 204);
}

#[test]
fn test_signed_dicom_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_dicom(dir.path(), "z0000.dcm", 4, 4, DicomSamples::Signed16, |x, _| x);

    let result = SliceLoader::new((4, 4)).load(&path);
    match result {
        Err(DecodeError::UnexpectedSampleType { found, .. }) => {
            assert_eq!(found, "1 x 16-bit signed")
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_eight_bit_dicom_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_dicom(dir.path(), "z0000.dcm", 4, 3, DicomSamples::Unsigned8, |x, _| x);

    assert!(matches!(
        SliceLoader::new((4, 3)).load(&path),
        Err(DecodeError::UnexpectedSampleType { .. })
    ));
}

#[test]
fn test_dicom_spacing_follows_orientation() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_dicom(dir.path(), "z0000.dcm", 4, 4, DicomSamples::Unsigned16, |_, _| 0);

    // Columns are 0.25 mm apart, rows 0.5 mm, slices 2 mm.
    assert_eq!(
        voxel_spacing_from_dicom(&path, true),
        Some([250_000.0, 500_000.0, 2_000_000.0])
    );
    assert_eq!(
        voxel_spacing_from_dicom(&path, false),
        Some([500_000.0, 250_000.0, 2_000_000.0])
    );
    assert_eq!(voxel_spacing_from_dicom(dir.path().join("missing.dcm"), true), None);
}

#[test]
fn test_convert_dicom_stack_takes_spacing_from_headers() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    for z in 0..3u16 {
        write_dicom(
            input.path(),
            &format!("z{z:04}.dcm"),
            8,
            6,
            DicomSamples::Unsigned16,
            move |x, y| x + 10 * y + 100 * z,
        );
    }

    let config = Config::try_parse_from([
        "precomputed-volume",
        input.path().to_str().unwrap(),
        output.path().to_str().unwrap(),
        "--extension",
        "dcm",
        "--num-levels",
        "2",
    ])
    .unwrap();
    let summary = convert_directory(&config).unwrap();
    assert_eq!(summary.slices_written, 3);

    let store = VolumeStore::open(LocalBackend::new(output.path())).unwrap();
    assert_eq!(store.info().scales[0].key, "250000_500000_2000000");
    assert_eq!(store.level_sizes(), vec![[8, 6, 3], [4, 3, 3]]);

    let level = store.open_level(0).unwrap();
    let volume = level.read_box(level.bounds()).unwrap();
    for ((x, y, z), &v) in volume.indexed_iter() {
        assert_eq!(v as usize, x + 10 * y + 100 * z);
    }
}
