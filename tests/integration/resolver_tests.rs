//! Plane resolver and repair tests against real files.

use ometiff::dimension::{get_index, get_zct_coords, DimensionOrder};
use ometiff::metadata::{OmeMetadata, TiffData, UuidRef};
use ometiff::ome::{FileMap, PlaneResolver, TiffCache, Warnings, OMERO_EXPORT_MARKER};

use super::test_utils::*;

fn resolve(path: &std::path::Path, meta: &OmeMetadata) -> (Vec<ometiff::ome::SeriesTable>, Warnings) {
    let cache = TiffCache::new();
    let mut warnings = Warnings::new();
    let files = FileMap::discover(meta, path, &mut warnings).unwrap();
    let tables = PlaneResolver::new(meta, &files, &cache, &mut warnings)
        .resolve()
        .unwrap();
    (tables, warnings)
}

// =============================================================================
// Index arithmetic
// =============================================================================

#[test]
fn test_xyztc_scenario() {
    // Z=20, T=5, two channels.
    let order = DimensionOrder::XYZTC;
    assert_eq!(get_index(order, 20, 2, 5, 200, 1, 0, 0).unwrap(), 1);
    assert_eq!(get_index(order, 20, 2, 5, 200, 0, 0, 1).unwrap(), 20);
    assert_eq!(get_index(order, 20, 2, 5, 200, 19, 1, 4).unwrap(), 199);
    let coords = get_zct_coords(order, 20, 2, 5, 200, 199).unwrap();
    assert_eq!((coords.z, coords.c, coords.t), (19, 1, 4));
    assert!(get_zct_coords(order, 20, 2, 5, 200, 200).is_err());
}

// =============================================================================
// Resolution
// =============================================================================

#[test]
fn test_resolver_fills_core_from_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.ome.tif");
    let meta = series_metadata(2, 1, 1, vec![record(0, Some(2), 0, 0, 0)]);
    write_tiff(&path, &uniform_planes(2, 0), None);

    let (tables, warnings) = resolve(&path, &meta);
    assert_eq!(tables.len(), 1);
    let core = tables[0].full_resolution();
    assert_eq!((core.size_x, core.size_y), (8, 6));
    assert_eq!(core.bits_per_pixel, 8);
    assert!(core.metadata_complete && core.order_certain);
    assert_eq!(core.tile_size_x, vec![8]);
    assert!(warnings.is_empty());
}

#[test]
fn test_significant_bits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.ome.tif");
    write_tiff(&path, &uniform_planes(1, 0), None);

    let mut meta = series_metadata(1, 1, 1, vec![record(0, Some(1), 0, 0, 0)]);
    meta.images[0].pixels.significant_bits = Some(6);
    let (tables, _) = resolve(&path, &meta);
    assert_eq!(tables[0].full_resolution().bits_per_pixel, 6);

    meta.images[0].pixels.significant_bits = Some(12);
    let (tables, warnings) = resolve(&path, &meta);
    assert_eq!(tables[0].full_resolution().bits_per_pixel, 8);
    assert!(warnings.contains("BitsPerPixel out of range"));
}

#[test]
fn test_invalid_series_dropped_others_kept() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.ome.tif");
    write_tiff(&path, &uniform_planes(2, 0), None);

    let mut meta = series_metadata(1, 1, 1, vec![record(0, Some(1), 0, 0, 0)]);
    let mut broken = meta.images[0].clone();
    broken.id = "Image:1".to_string();
    broken.pixels.size_t = 0;
    meta.images.push(broken);
    let mut second = meta.images[0].clone();
    second.id = "Image:2".to_string();
    second.pixels.tiff_data = vec![record(1, Some(1), 0, 0, 0)];
    meta.images.push(second);

    let (tables, warnings) = resolve(&path, &meta);
    assert_eq!(tables.iter().map(|t| t.image).collect::<Vec<_>>(), vec![0, 2]);
    assert!(warnings.contains("Removing image series 1 (Image:1)"));
}

// =============================================================================
// Repair
// =============================================================================

#[test]
fn test_missing_channels_inferred() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.ome.tif");
    write_tiff(&path, &uniform_planes(3, 0), None);

    let mut meta = series_metadata(1, 3, 1, vec![record(0, Some(3), 0, 0, 0)]);
    meta.images[0].pixels.channels.clear();
    let (tables, warnings) = resolve(&path, &meta);
    assert_eq!(tables[0].full_resolution().size_c, vec![1, 1, 1]);
    assert!(warnings.contains("Channel element(s) are missing for series 0"));
}

#[test]
fn test_samples_per_pixel_corrected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rgb.ome.tif");
    {
        use ometiff::format::tiff::{ByteOrder, ImageSpec, TiffWriter};
        use ometiff::pixel::{PixelType, VariantPixelBuffer};
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = TiffWriter::new(file, false, ByteOrder::LittleEndian).unwrap();
        let spec = ImageSpec::new(8, 6, PixelType::Uint8, 3);
        writer
            .write_image(&spec, &VariantPixelBuffer::with_type(spec.shape(), PixelType::Uint8))
            .unwrap();
        writer.finish().unwrap();
    }

    let meta = series_metadata(1, 1, 1, vec![record(0, Some(1), 0, 0, 0)]);
    let (tables, warnings) = resolve(&path, &meta);
    assert_eq!(tables[0].full_resolution().size_c, vec![3]);
    assert!(warnings.contains("SamplesPerPixel mismatch: OME=1, TIFF=3"));
    assert!(warnings.contains("SizeC mismatch: Channels=3, Pixels=1"));
}

#[test]
fn test_omero_export_order_corrected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.ome.tif");
    write_tiff(&path, &uniform_planes(4, 0), None);

    let marker = TiffData {
        uuid: Some(UuidRef {
            value: OMERO_EXPORT_MARKER.to_string(),
            file_name: None,
        }),
        ..record(0, Some(4), 0, 0, 0)
    };
    let mut meta = series_metadata(2, 1, 2, vec![marker]);
    meta.images[0].pixels.dimension_order = DimensionOrder::XYTZC;
    meta.images[0].pixels.channels[0].name = Some("DAPI".to_string());

    let (tables, warnings) = resolve(&path, &meta);
    assert_eq!(tables[0].full_resolution().dimension_order, DimensionOrder::XYZCT);
    assert!(warnings.contains("exported by OMERO"));
}

#[test]
fn test_repair_idempotent_after_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.ome.tif");
    write_tiff(&path, &uniform_planes(5, 0), None);

    let meta = series_metadata(4, 2, 3, Vec::new());
    let (tables, _) = resolve(&path, &meta);
    let mut core = tables[0].full_resolution().clone();
    let before = core.clone();
    let hints = ometiff::ome::ExporterHints::default();
    assert!(!ometiff::ome::repair(&mut core, hints, 0, &mut Warnings::new()));
    assert_eq!(core, before);
    assert_eq!((core.size_z, core.size_t, core.size_c.clone()), (1, 5, vec![1]));
}
