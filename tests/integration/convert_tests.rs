//! Configuration-driven conversion into a local directory.

use clap::Parser;
use precomputed_volume::{
    Config, ConfigurationError, LocalBackend, MetadataError, PipelineError, VolumeStore,
    convert_directory,
};

use super::test_utils::write_uniform_stack;

fn config(args: &[&str]) -> Config {
    Config::try_parse_from(std::iter::once("precomputed-volume").chain(args.iter().copied()))
        .unwrap()
}

#[test]
fn test_convert_with_xml_voxel_dims() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_uniform_stack(input.path(), 5, 24, 16, 1234);
    let xml = input.path().join("import.xml");
    std::fs::write(
        &xml,
        r#"<?xml version="1.0"?>
<TeraStitcher volume_format="TiledXY|3Dseries">
    <voxel_dims V="2" H="2" D="4" />
</TeraStitcher>"#,
    )
    .unwrap();

    let config = config(&[
        input.path().to_str().unwrap(),
        output.path().to_str().unwrap(),
        "--input-xml",
        xml.to_str().unwrap(),
        "--extension",
        "png",
        "--batch-size",
        "2",
        "--num-levels",
        "3",
    ]);
    assert!(config.validate().is_ok());

    let summary = convert_directory(&config).unwrap();
    assert_eq!(summary.slices_written, 5);
    assert_eq!(summary.batches_written, 3);
    assert_eq!(summary.num_levels, 3);

    let store = VolumeStore::open(LocalBackend::new(output.path())).unwrap();
    let keys: Vec<_> = store.info().scales.iter().map(|s| s.key.as_str()).collect();
    assert_eq!(keys, ["2000_2000_4000", "4000_4000_4000", "8000_8000_4000"]);
    assert_eq!(store.level_sizes(), vec![[24, 16, 5], [12, 8, 5], [6, 4, 5]]);
    // Default chunk shape follows the batch size.
    assert_eq!(store.info().chunk_shape(0), [16, 16, 2]);

    let level = store.open_level(2).unwrap();
    assert!(level.read_box(level.bounds()).unwrap().iter().all(|&v| v == 1234));
}

#[test]
fn test_explicit_voxel_size_needs_no_xml() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_uniform_stack(input.path(), 2, 8, 8, 1);

    let location = format!("file://{}", output.path().display());
    let config = config(&[
        input.path().to_str().unwrap(),
        location.as_str(),
        "--extension",
        "png",
        "--voxel-size",
        "500,500,1000",
        "--chunk-shape",
        "4,4,2",
    ]);
    convert_directory(&config).unwrap();

    assert!(output.path().join("info").is_file());
    assert!(output.path().join("500_500_1000").join("4-8_4-8_0-2").is_file());
}

#[test]
fn test_missing_voxel_spacing_is_reported() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_uniform_stack(input.path(), 2, 8, 8, 1);

    let config = config(&[
        input.path().to_str().unwrap(),
        output.path().to_str().unwrap(),
        "--extension",
        "png",
    ]);
    assert!(matches!(
        convert_directory(&config),
        Err(PipelineError::Configuration(
            ConfigurationError::MissingVoxelSpacing
        ))
    ));
    assert!(!output.path().join("info").exists());
}

#[test]
fn test_xml_without_voxel_dims_is_reported() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_uniform_stack(input.path(), 2, 8, 8, 1);
    let xml = input.path().join("import.xml");
    std::fs::write(&xml, "<TeraStitcher></TeraStitcher>").unwrap();

    let config = config(&[
        input.path().to_str().unwrap(),
        output.path().to_str().unwrap(),
        "--input-xml",
        xml.to_str().unwrap(),
        "--extension",
        "png",
    ]);
    assert!(matches!(
        convert_directory(&config),
        Err(PipelineError::Metadata(MetadataError::MissingElement))
    ));
}

#[test]
fn test_empty_input_directory() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let config = config(&[
        input.path().to_str().unwrap(),
        output.path().to_str().unwrap(),
    ]);
    assert!(matches!(
        convert_directory(&config),
        Err(PipelineError::Input(_))
    ));
}
