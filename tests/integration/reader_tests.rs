//! Reader tests on hand-built datasets.

use ometiff::error::OmeTiffError;
use ometiff::format::tiff::ByteOrder;
use ometiff::ome::{OmeTiffReader, PlaneStatus};
use ometiff::pixel::StorageOrder;
use ometiff::{DimensionOrder, VariantPixelBuffer};

use super::test_utils::*;

// =============================================================================
// Range records
// =============================================================================

#[test]
fn test_fill_forward_from_two_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.ome.tif");
    let meta = series_metadata(5, 1, 2, vec![record(0, Some(0), 0, 0, 0), record(5, Some(0), 0, 0, 1)]);
    write_tiff(&path, &uniform_planes(10, 0), Some(&meta.to_json().unwrap()));

    let mut reader = OmeTiffReader::new();
    reader.open(&path).unwrap();
    assert_eq!(reader.image_count().unwrap(), 10);
    for plane in 0..10 {
        assert_eq!(fill_value(&reader.read_plane(plane).unwrap()), plane as u8);
    }
    let planes = reader.planes().unwrap();
    assert!(planes[0].certain && planes[5].certain);
    assert!(!planes[4].certain);
}

#[test]
fn test_one_based_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.ome.tif");
    let meta = series_metadata(
        1,
        2,
        2,
        vec![
            record(0, Some(1), 1, 1, 1),
            record(1, Some(1), 1, 2, 1),
            record(2, Some(1), 1, 1, 2),
            record(3, Some(1), 1, 2, 2),
        ],
    );
    write_tiff(&path, &uniform_planes(4, 10), Some(&meta.to_json().unwrap()));

    let mut reader = OmeTiffReader::new();
    reader.open(&path).unwrap();
    let index = reader.get_index(0, 1, 1).unwrap();
    assert_eq!(index, 3);
    assert_eq!(fill_value(&reader.read_plane(index).unwrap()), 13);
    let warnings = reader.warnings().unwrap();
    assert!(warnings.iter().any(|w| w.contains("non-zero z index start")));
}

#[test]
fn test_dimension_order_respected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.ome.tif");
    let mut meta = series_metadata(2, 3, 1, vec![record(0, Some(6), 0, 0, 0)]);
    meta.images[0].pixels.dimension_order = DimensionOrder::XYCZT;
    write_tiff(&path, &uniform_planes(6, 0), Some(&meta.to_json().unwrap()));

    let mut reader = OmeTiffReader::new();
    reader.open(&path).unwrap();
    assert_eq!(reader.core_metadata().unwrap().dimension_order, DimensionOrder::XYCZT);
    // C is fastest: z=1, c=2 is plane 1 * 3 + 2
    let index = reader.get_index(1, 2, 0).unwrap();
    assert_eq!(index, 5);
    let coords = reader.get_zct_coords(4).unwrap();
    assert_eq!((coords.z, coords.c, coords.t), (1, 1, 0));
}

// =============================================================================
// Fallbacks
// =============================================================================

#[test]
fn test_whole_file_fallback_without_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.ome.tif");
    let meta = series_metadata(3, 1, 1, Vec::new());
    write_tiff(&path, &uniform_planes(3, 7), Some(&meta.to_json().unwrap()));

    let mut reader = OmeTiffReader::new();
    reader.open(&path).unwrap();
    assert_eq!(reader.image_count().unwrap(), 3);
    assert_eq!(fill_value(&reader.read_plane(2).unwrap()), 9);
    assert!(reader
        .warnings()
        .unwrap()
        .iter()
        .any(|w| w.contains("missing plane #0")));
}

#[test]
fn test_fewer_directories_than_planes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.ome.tif");
    let meta = series_metadata(4, 1, 3, Vec::new());
    write_tiff(&path, &uniform_planes(4, 0), Some(&meta.to_json().unwrap()));

    let mut reader = OmeTiffReader::new();
    reader.open(&path).unwrap();
    let core = reader.core_metadata().unwrap();
    assert_eq!((core.size_z, core.size_t, core.image_count), (4, 1, 4));
    assert!(reader
        .warnings()
        .unwrap()
        .iter()
        .any(|w| w.contains("Inferred dimensions")));
}

#[test]
fn test_single_plane_collapses_sizes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.ome.tif");
    let meta = series_metadata(3, 1, 2, Vec::new());
    write_tiff(&path, &uniform_planes(1, 0), Some(&meta.to_json().unwrap()));

    let mut reader = OmeTiffReader::new();
    reader.open(&path).unwrap();
    let core = reader.core_metadata().unwrap();
    assert_eq!((core.size_z, core.size_t, core.image_count), (1, 1, 1));
}

#[test]
fn test_renamed_file_with_own_uuid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("renamed.ome.tif");
    let mut meta = series_metadata(1, 1, 2, vec![file_record("urn:uuid:self", "original.ome.tif", 0, 2, 0, 0, 0)]);
    meta.uuid = Some("urn:uuid:self".to_string());
    write_tiff(&path, &uniform_planes(2, 0), Some(&meta.to_json().unwrap()));

    let mut reader = OmeTiffReader::new();
    reader.open(&path).unwrap();
    assert_eq!(reader.used_files(false).unwrap(), vec![canonical(&path)]);
    assert_eq!(fill_value(&reader.read_plane(1).unwrap()), 1);
}

#[test]
fn test_unresolvable_foreign_uuid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.ome.tif");
    let mut meta = series_metadata(1, 1, 2, vec![
        file_record("urn:uuid:a", "a.ome.tif", 0, 1, 0, 0, 0),
        file_record("urn:uuid:b", "gone.ome.tif", 0, 1, 0, 0, 1),
    ]);
    meta.uuid = Some("urn:uuid:a".to_string());
    write_tiff(&path, &uniform_planes(1, 0), Some(&meta.to_json().unwrap()));

    let err = OmeTiffReader::new().open(&path).unwrap_err();
    assert!(matches!(err, OmeTiffError::UnresolvedFile { ref uuid, .. } if uuid == "urn:uuid:b"));
}

#[test]
fn test_multi_file_dataset_with_missing_planes_drops_series() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.ome.tif");
    let b = dir.path().join("b.ome.tif");
    let mut meta = series_metadata(1, 1, 3, vec![
        file_record("urn:uuid:a", "a.ome.tif", 0, 1, 0, 0, 0),
        file_record("urn:uuid:b", "b.ome.tif", 0, 1, 0, 0, 1),
    ]);
    meta.uuid = Some("urn:uuid:a".to_string());
    let json = meta.to_json().unwrap();
    write_tiff(&a, &uniform_planes(1, 0), Some(&json));
    write_tiff(&b, &uniform_planes(1, 1), Some(&json));

    let err = OmeTiffReader::new().open(&a).unwrap_err();
    assert!(matches!(err, OmeTiffError::NoValidSeries(_)));
}

#[test]
fn test_implausible_sizes_drop_series() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.ome.tif");
    let huge = usize::MAX / 2;
    let meta = series_metadata(huge, 1, huge, vec![record(0, Some(1), 0, 0, 0)]);
    write_tiff(&path, &uniform_planes(1, 0), Some(&meta.to_json().unwrap()));

    let err = OmeTiffReader::new().open(&path).unwrap_err();
    assert!(matches!(err, OmeTiffError::NoValidSeries(_)));
}

// =============================================================================
// Multiple files
// =============================================================================

#[test]
fn test_multi_file_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.ome.tif");
    let b = dir.path().join("b.ome.tif");
    let mut meta = series_metadata(1, 1, 4, vec![
        file_record("urn:uuid:a", "a.ome.tif", 0, 2, 0, 0, 0),
        file_record("urn:uuid:b", "b.ome.tif", 0, 2, 0, 0, 2),
    ]);
    meta.uuid = Some("urn:uuid:a".to_string());
    write_tiff(&a, &uniform_planes(2, 0), Some(&meta.to_json().unwrap()));
    meta.uuid = Some("urn:uuid:b".to_string());
    write_tiff(&b, &uniform_planes(2, 2), Some(&meta.to_json().unwrap()));

    // Either file opens the whole dataset.
    for path in [&a, &b] {
        let mut reader = OmeTiffReader::new();
        reader.open(path).unwrap();
        assert_eq!(reader.image_count().unwrap(), 4);
        for plane in 0..4 {
            assert_eq!(fill_value(&reader.read_plane(plane).unwrap()), plane as u8);
        }
        assert_eq!(reader.used_files(false).unwrap(), vec![canonical(&a), canonical(&b)]);
        assert!(!reader.is_single_file().unwrap());
        assert!(reader.planes().unwrap().iter().all(|p| p.status == PlaneStatus::Present));
    }
}

#[test]
fn test_invalid_file_marks_planes_absent() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.ome.tif");
    let b = dir.path().join("b.ome.tif");
    let mut meta = series_metadata(1, 1, 2, vec![
        file_record("urn:uuid:a", "a.ome.tif", 0, 1, 0, 0, 0),
        file_record("urn:uuid:b", "b.ome.tif", 0, 1, 0, 0, 1),
    ]);
    meta.uuid = Some("urn:uuid:a".to_string());
    write_tiff(&a, &uniform_planes(1, 0), Some(&meta.to_json().unwrap()));
    std::fs::write(&b, b"truncated").unwrap();

    let mut reader = OmeTiffReader::new();
    reader.open(&a).unwrap();
    assert_eq!(reader.planes().unwrap()[1].status, PlaneStatus::Absent);
    assert!(matches!(
        reader.read_plane(1),
        Err(OmeTiffError::MissingPlane { series: 0, plane: 1 })
    ));
    assert_eq!(reader.used_files(false).unwrap(), vec![canonical(&a)]);
}

// =============================================================================
// Sub-resolutions
// =============================================================================

#[test]
fn test_sub_resolutions_discovered() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.ome.tif");
    let meta = series_metadata(1, 1, 2, vec![record(0, Some(2), 0, 0, 0)]);
    let planes: Vec<PlaneSpec> = uniform_planes(2, 3)
        .into_iter()
        .map(|p| p.with_sub_resolutions(vec![(4, 3), (2, 1)]))
        .collect();
    write_tiff(&path, &planes, Some(&meta.to_json().unwrap()));

    let mut reader = OmeTiffReader::new();
    reader.open(&path).unwrap();
    assert_eq!(reader.resolution_count().unwrap(), 3);
    reader.set_resolution(2).unwrap();
    let core = reader.core_metadata().unwrap();
    assert_eq!((core.size_x, core.size_y), (2, 1));
    assert_eq!(core.sub_resolution_offset, Some(2));
    let plane = reader.read_plane(1).unwrap();
    assert_eq!(plane.shape(), [2, 1, 1, 1]);
    assert_eq!(fill_value(&plane), 4);
}

#[test]
fn test_oversized_sub_resolution_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.ome.tif");
    let meta = series_metadata(1, 1, 1, vec![record(0, Some(1), 0, 0, 0)]);
    let planes = vec![PlaneSpec::new(8, 6, 0).with_sub_resolutions(vec![(4, 3), (16, 3)])];
    write_tiff(&path, &planes, Some(&meta.to_json().unwrap()));

    let mut reader = OmeTiffReader::new();
    reader.open(&path).unwrap();
    assert_eq!(reader.resolution_count().unwrap(), 1);
    assert!(reader
        .warnings()
        .unwrap()
        .iter()
        .any(|w| w.contains("Discarding sub-resolutions of series 0")));
}

// =============================================================================
// Container variants
// =============================================================================

#[test]
fn test_bigtiff_big_endian() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.ome.tif");
    let meta = series_metadata(2, 1, 1, vec![record(0, Some(2), 0, 0, 0)]);
    write_tiff_with(
        &path,
        &uniform_planes(2, 40),
        Some(&meta.to_json().unwrap()),
        true,
        ByteOrder::BigEndian,
    );

    let mut reader = OmeTiffReader::new();
    reader.open(&path).unwrap();
    assert_eq!(fill_value(&reader.read_plane(1).unwrap()), 41);
}

#[test]
fn test_read_into_other_storage_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.ome.tif");
    let meta = series_metadata(1, 1, 1, vec![record(0, Some(1), 0, 0, 0)]);
    write_tiff(&path, &uniform_planes(1, 5), Some(&meta.to_json().unwrap()));

    let mut reader = OmeTiffReader::new();
    reader.open(&path).unwrap();
    let mut target = VariantPixelBuffer::new([8, 6, 1, 1], ometiff::PixelType::Uint8, StorageOrder::planar());
    reader.read_plane_into(0, &mut target).unwrap();
    assert_eq!(fill_value(&target), 5);
}

#[test]
fn test_pixel_type_mismatch_warned() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.ome.tif");
    let mut meta = series_metadata(1, 1, 1, vec![record(0, Some(1), 0, 0, 0)]);
    meta.images[0].pixels.pixel_type = ometiff::PixelType::Uint16;
    meta.images[0].pixels.size_x = 10;
    write_tiff(&path, &uniform_planes(1, 0), Some(&meta.to_json().unwrap()));

    let mut reader = OmeTiffReader::new();
    reader.open(&path).unwrap();
    let core = reader.core_metadata().unwrap();
    assert_eq!(core.pixel_type, ometiff::PixelType::Uint8);
    assert_eq!(core.size_x, 8);
    let warnings = reader.warnings().unwrap();
    assert!(warnings.iter().any(|w| w.contains("PixelType mismatch")));
    assert!(warnings.iter().any(|w| w.contains("Size mismatch: OME=10x6, TIFF=8x6")));
}
