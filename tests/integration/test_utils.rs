//! Test utilities for integration tests.
//!
//! Helpers for building OME-TIFF files directly with the TIFF codec, so the
//! reader can be exercised on layouts the writer never produces (missing
//! records, one-based indices, renamed files, inconsistent sub-resolutions).

#![allow(dead_code)]

use std::fs::File;
use std::path::{Path, PathBuf};

use ometiff::format::tiff::{ByteOrder, ImageSpec, TiffWriter};
use ometiff::metadata::{Channel, Image, OmeMetadata, Pixels, TiffData, UuidRef};
use ometiff::pixel::{PixelType, VariantPixelBuffer};

// =============================================================================
// Pixel buffers
// =============================================================================

/// A uint8 single-sample plane filled with `value`.
pub fn filled_plane(width: u32, height: u32, value: u8) -> VariantPixelBuffer<'static> {
    let mut buffer = VariantPixelBuffer::with_type([width as usize, height as usize, 1, 1], PixelType::Uint8);
    buffer
        .assign(std::iter::repeat(value).take((width * height) as usize))
        .unwrap();
    buffer
}

/// A uint16 plane of `samples` samples whose elements count up from `base`.
pub fn ramp_plane(width: u32, height: u32, samples: usize, base: u16) -> VariantPixelBuffer<'static> {
    let shape = [width as usize, height as usize, 1, samples];
    let mut buffer = VariantPixelBuffer::with_type(shape, PixelType::Uint16);
    let count = buffer.num_elements();
    buffer
        .assign((0..count).map(|i| base.wrapping_add(i as u16)))
        .unwrap();
    buffer
}

/// The single value a [`filled_plane`] was filled with.
pub fn fill_value(buffer: &VariantPixelBuffer<'_>) -> u8 {
    let data = buffer.data::<u8>().unwrap();
    assert!(data.iter().all(|&v| v == data[0]), "plane is not uniform");
    data[0]
}

// =============================================================================
// TIFF files
// =============================================================================

/// One directory to write: a uniform uint8 plane plus optional reduced
/// resolutions, each given as `(width, height)`.
#[derive(Debug, Clone)]
pub struct PlaneSpec {
    pub width: u32,
    pub height: u32,
    pub value: u8,
    pub sub_resolutions: Vec<(u32, u32)>,
}

impl PlaneSpec {
    pub fn new(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            value,
            sub_resolutions: Vec::new(),
        }
    }

    pub fn with_sub_resolutions(mut self, sizes: Vec<(u32, u32)>) -> Self {
        self.sub_resolutions = sizes;
        self
    }
}

/// Write a classic little-endian TIFF with `planes` as main directories and
/// `description` on the first one.
pub fn write_tiff(path: &Path, planes: &[PlaneSpec], description: Option<&str>) {
    write_tiff_with(path, planes, description, false, ByteOrder::LittleEndian);
}

pub fn write_tiff_with(
    path: &Path,
    planes: &[PlaneSpec],
    description: Option<&str>,
    big_tiff: bool,
    byte_order: ByteOrder,
) {
    let file = File::create(path).unwrap();
    let mut writer = TiffWriter::new(file, big_tiff, byte_order).unwrap();
    for (index, plane) in planes.iter().enumerate() {
        let mut spec = ImageSpec::new(plane.width, plane.height, PixelType::Uint8, 1);
        if index == 0 {
            spec.description = description.map(str::to_string);
        }
        writer
            .write_image(&spec, &filled_plane(plane.width, plane.height, plane.value))
            .unwrap();
        for &(width, height) in &plane.sub_resolutions {
            let sub = ImageSpec::new(width, height, PixelType::Uint8, 1);
            writer
                .write_sub_image(&sub, &filled_plane(width, height, plane.value))
                .unwrap();
        }
    }
    writer.finish().unwrap();
}

/// `count` 8×6 planes whose values are `first`, `first + 1`, ...
pub fn uniform_planes(count: usize, first: u8) -> Vec<PlaneSpec> {
    (0..count)
        .map(|i| PlaneSpec::new(8, 6, first + i as u8))
        .collect()
}

// =============================================================================
// Metadata
// =============================================================================

/// One 8×6 uint8 series with the given sizes and records.
pub fn series_metadata(z: usize, c: usize, t: usize, records: Vec<TiffData>) -> OmeMetadata {
    let mut pixels = Pixels::new(8, 6, PixelType::Uint8);
    pixels.size_z = z;
    pixels.size_c = c;
    pixels.size_t = t;
    pixels.channels = (0..c).map(|i| Channel::new(format!("Channel:0:{}", i), 1)).collect();
    pixels.tiff_data = records;
    OmeMetadata {
        uuid: None,
        images: vec![Image::new("Image:0", pixels)],
    }
}

/// A record starting at `(z, c, t)` in the current file.
pub fn record(ifd: usize, count: Option<usize>, z: usize, c: usize, t: usize) -> TiffData {
    TiffData {
        uuid: None,
        ifd: Some(ifd),
        plane_count: count,
        first_z: Some(z),
        first_t: Some(t),
        first_c: Some(c),
    }
}

/// A record pointing at another file by UUID.
pub fn file_record(uuid: &str, file_name: &str, ifd: usize, count: usize, z: usize, c: usize, t: usize) -> TiffData {
    TiffData {
        uuid: Some(UuidRef {
            value: uuid.to_string(),
            file_name: Some(file_name.to_string()),
        }),
        ..record(ifd, Some(count), z, c, t)
    }
}

pub fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap()
}
