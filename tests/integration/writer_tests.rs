//! Writer tests, checked by reading the output back.

use ometiff::error::{MetadataError, OmeTiffError};
use ometiff::format::tiff::{ByteOrder, TiffFile, DESCRIPTION_PLACEHOLDER};
use ometiff::metadata::{Channel, Image, OmeMetadata, Pixels, ResolutionSize};
use ometiff::ome::{OmeTiffReader, OmeTiffWriter};
use ometiff::pixel::{PixelType, StorageOrder, VariantPixelBuffer};
use ometiff::{DimensionOrder, WriterOptions};

use super::test_utils::*;

/// uint16 series with `channels` channels of `samples` samples each.
fn metadata(z: usize, channels: usize, samples: u32, t: usize) -> OmeMetadata {
    let mut pixels = Pixels::new(6, 4, PixelType::Uint16);
    pixels.dimension_order = DimensionOrder::XYCZT;
    pixels.size_z = z;
    pixels.size_t = t;
    pixels.size_c = channels * samples as usize;
    pixels.channels = (0..channels)
        .map(|c| Channel::new(format!("Channel:0:{}", c), samples))
        .collect();
    OmeMetadata {
        uuid: None,
        images: vec![Image::new("Image:0", pixels)],
    }
}

fn embedded(path: &std::path::Path) -> OmeMetadata {
    let file = TiffFile::open(path).unwrap();
    let description = file.directory(0).unwrap().image_description.unwrap();
    OmeMetadata::from_json(&description).unwrap()
}

// =============================================================================
// Round trips
// =============================================================================

#[test]
fn test_round_trip_single_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.ome.tif");
    let meta = metadata(2, 2, 1, 2);

    let mut writer = OmeTiffWriter::new();
    writer.set_metadata(meta).unwrap();
    writer.set_id(&path).unwrap();
    let mut written = Vec::new();
    for plane in 0..8 {
        writer.set_plane(plane).unwrap();
        let buffer = ramp_plane(6, 4, 1, plane as u16 * 100);
        writer.save_bytes(&buffer).unwrap();
        written.push(buffer);
    }
    writer.close().unwrap();

    let mut reader = OmeTiffReader::new();
    reader.open(&path).unwrap();
    let core = reader.core_metadata().unwrap();
    assert_eq!(core.dimension_order, DimensionOrder::XYCZT);
    assert_eq!(core.size_c, vec![1, 1]);
    assert_eq!(core.image_count, 8);
    for (plane, buffer) in written.iter().enumerate() {
        assert_eq!(&reader.read_plane(plane).unwrap(), buffer);
    }
    assert!(reader.warnings().unwrap().is_empty());
}

#[test]
fn test_three_planes_in_order_make_one_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.ome.tif");

    let mut writer = OmeTiffWriter::new();
    writer.set_metadata(metadata(1, 1, 1, 3)).unwrap();
    writer.set_id(&path).unwrap();
    assert!(matches!(writer.set_plane(2), Err(OmeTiffError::Ordering { .. })));
    for plane in 0..3 {
        writer.set_plane(plane).unwrap();
        writer.save_bytes(&ramp_plane(6, 4, 1, 0)).unwrap();
    }
    writer.close().unwrap();

    let records = &embedded(&path).images[0].pixels.tiff_data;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].plane_count, Some(3));
}

#[test]
fn test_planar_multi_sample_channel() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rgb.ome.tif");

    let mut writer = OmeTiffWriter::new();
    writer.set_metadata(metadata(1, 1, 3, 1)).unwrap();
    writer.set_interleaved(false).unwrap();
    writer.set_id(&path).unwrap();
    let buffer = ramp_plane(6, 4, 3, 1000);
    writer.save_bytes(&buffer).unwrap();
    writer.close().unwrap();

    let mut reader = OmeTiffReader::new();
    reader.open(&path).unwrap();
    let core = reader.core_metadata().unwrap();
    assert!(!core.interleaved);
    assert_eq!(core.size_c, vec![3]);
    assert!(core.is_rgb());
    let plane = reader.read_plane(0).unwrap();
    assert_eq!(plane.storage_order(), StorageOrder::planar());
    assert_eq!(plane, buffer);
}

#[test]
fn test_big_endian_bigtiff() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.ome.tif");
    let options = WriterOptions {
        big_tiff: Some(true),
        byte_order: ByteOrder::BigEndian,
        ..WriterOptions::default()
    };

    let mut writer = OmeTiffWriter::with_options(options);
    writer.set_metadata(metadata(1, 1, 1, 2)).unwrap();
    writer.set_id(&path).unwrap();
    for plane in 0..2 {
        writer.set_plane(plane).unwrap();
        writer.save_bytes(&ramp_plane(6, 4, 1, plane as u16)).unwrap();
    }
    writer.close().unwrap();

    let file = TiffFile::open(&path).unwrap();
    assert!(file.is_bigtiff());
    assert_eq!(file.byte_order(), ByteOrder::BigEndian);

    let mut reader = OmeTiffReader::new();
    reader.open(&path).unwrap();
    assert_eq!(reader.read_plane(1).unwrap(), ramp_plane(6, 4, 1, 1));
    assert_eq!(reader.metadata().unwrap().images[0].pixels.big_endian, Some(true));
}

#[test]
fn test_tiled_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tiled.ome.tif");
    let mut meta = metadata(1, 1, 1, 1);
    meta.images[0].pixels.size_x = 40;
    meta.images[0].pixels.size_y = 20;
    let options = WriterOptions {
        tile_size: Some((16, 16)),
        ..WriterOptions::default()
    };

    let mut writer = OmeTiffWriter::with_options(options);
    writer.set_metadata(meta).unwrap();
    writer.set_id(&path).unwrap();
    let buffer = ramp_plane(40, 20, 1, 0);
    writer.save_bytes(&buffer).unwrap();
    writer.close().unwrap();

    let mut reader = OmeTiffReader::new();
    reader.open(&path).unwrap();
    let core = reader.core_metadata().unwrap();
    assert_eq!((core.tile_size_x[0], core.tile_size_y[0]), (16, 16));
    assert_eq!(reader.read_plane(0).unwrap(), buffer);
    let region = reader.read_plane_region(0, 10, 5, 20, 10).unwrap();
    assert_eq!(region, buffer.region(10, 5, 20, 10).unwrap());
}

// =============================================================================
// Sub-resolutions
// =============================================================================

#[test]
fn test_sub_resolutions_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pyramid.ome.tif");
    let mut meta = metadata(1, 1, 1, 2);
    meta.images[0].pixels.resolutions = vec![
        ResolutionSize { size_x: 3, size_y: 2 },
        ResolutionSize { size_x: 1, size_y: 1 },
    ];

    let mut writer = OmeTiffWriter::new();
    writer.set_metadata(meta).unwrap();
    writer.set_id(&path).unwrap();
    for plane in 0..2 {
        writer.set_plane(plane).unwrap();
        for (resolution, (w, h)) in [(6, 4), (3, 2), (1, 1)].into_iter().enumerate() {
            writer.set_resolution(resolution).unwrap();
            writer.save_bytes(&ramp_plane(w, h, 1, plane as u16 * 10)).unwrap();
        }
    }
    writer.close().unwrap();

    assert!(embedded(&path).images[0].pixels.resolutions.is_empty());

    let mut reader = OmeTiffReader::new();
    reader.open(&path).unwrap();
    assert_eq!(reader.resolution_count().unwrap(), 3);
    reader.set_resolution(1).unwrap();
    assert_eq!(reader.read_plane(1).unwrap(), ramp_plane(3, 2, 1, 10));
    reader.set_resolution(2).unwrap();
    assert_eq!(reader.read_plane(0).unwrap(), ramp_plane(1, 1, 1, 0));
}

#[test]
fn test_missing_sub_resolution_fails_close() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pyramid.ome.tif");
    let mut meta = metadata(1, 1, 1, 1);
    meta.images[0].pixels.resolutions = vec![ResolutionSize { size_x: 3, size_y: 2 }];

    let mut writer = OmeTiffWriter::new();
    writer.set_metadata(meta).unwrap();
    writer.set_id(&path).unwrap();
    writer.save_bytes(&ramp_plane(6, 4, 1, 0)).unwrap();
    assert!(matches!(
        writer.close(),
        Err(OmeTiffError::IncompletePlanes { series: 0, plane: 0 })
    ));
}

// =============================================================================
// Multiple files
// =============================================================================

#[test]
fn test_round_robin_files() {
    let dir = tempfile::tempdir().unwrap();
    let paths = [dir.path().join("a.ome.tif"), dir.path().join("b.ome.tif")];

    let mut writer = OmeTiffWriter::new();
    writer.set_metadata(metadata(1, 1, 1, 4)).unwrap();
    writer.set_id(&paths[0]).unwrap();
    for plane in 0..4 {
        writer.change_output_file(&paths[plane % 2]).unwrap();
        writer.set_plane(plane).unwrap();
        writer.save_bytes(&ramp_plane(6, 4, 1, plane as u16)).unwrap();
    }
    writer.close().unwrap();

    let a = embedded(&paths[0]);
    let b = embedded(&paths[1]);
    assert_ne!(a.uuid, b.uuid);
    let records = &a.images[0].pixels.tiff_data;
    assert_eq!(records.len(), 4);
    assert_eq!(records[1].uuid.as_ref().unwrap().file_name.as_deref(), Some("b.ome.tif"));
    assert_eq!(records[1].uuid.as_ref().unwrap().value, b.uuid.clone().unwrap());
    assert_eq!(records[2].ifd, Some(1));

    let mut reader = OmeTiffReader::new();
    reader.open(&paths[1]).unwrap();
    assert_eq!(reader.used_files(false).unwrap().len(), 2);
    for plane in 0..4 {
        assert_eq!(reader.read_plane(plane).unwrap(), ramp_plane(6, 4, 1, plane as u16));
    }
}

#[test]
fn test_sub_resolution_must_follow_its_plane_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut meta = metadata(1, 1, 1, 1);
    meta.images[0].pixels.resolutions = vec![ResolutionSize { size_x: 3, size_y: 2 }];

    let mut writer = OmeTiffWriter::new();
    writer.set_metadata(meta).unwrap();
    writer.set_id(dir.path().join("a.ome.tif")).unwrap();
    writer.save_bytes(&ramp_plane(6, 4, 1, 0)).unwrap();
    writer.change_output_file(dir.path().join("b.ome.tif")).unwrap();
    writer.set_resolution(1).unwrap();
    assert!(matches!(
        writer.save_bytes(&ramp_plane(3, 2, 1, 0)),
        Err(OmeTiffError::InvalidOption(_))
    ));
}

// =============================================================================
// Failure modes
// =============================================================================

#[test]
fn test_incomplete_close_leaves_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.ome.tif");

    let mut writer = OmeTiffWriter::new();
    writer.set_metadata(metadata(1, 1, 1, 2)).unwrap();
    writer.set_id(&path).unwrap();
    writer.save_bytes(&ramp_plane(6, 4, 1, 0)).unwrap();
    assert!(writer.close().is_err());

    let file = TiffFile::open(&path).unwrap();
    let description = file.directory(0).unwrap().image_description;
    assert_eq!(description.as_deref(), Some(DESCRIPTION_PLACEHOLDER));
    let err = OmeTiffReader::new().open(&path).unwrap_err();
    assert!(matches!(err, OmeTiffError::Metadata(MetadataError::Json(_))));
}

#[test]
fn test_buffer_mismatches() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = OmeTiffWriter::new();
    writer.set_metadata(metadata(1, 2, 3, 1)).unwrap();
    writer.set_id(dir.path().join("out.ome.tif")).unwrap();

    // Channel 0 has three samples.
    assert!(matches!(writer.save_bytes(&ramp_plane(6, 4, 1, 0)), Err(OmeTiffError::Pixel(_))));
    let wrong_type = VariantPixelBuffer::with_type([6, 4, 1, 3], PixelType::Float);
    assert!(matches!(writer.save_bytes(&wrong_type), Err(OmeTiffError::Pixel(_))));
    writer.save_bytes(&ramp_plane(6, 4, 3, 0)).unwrap();
}
