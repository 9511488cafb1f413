//! Plane resolution.
//!
//! The resolver turns the declarative range records of every series into a
//! table with one [`OmeTiffPlane`] per flat plane index, fills the core
//! metadata of each series from the directories those planes point at, and
//! discovers reduced resolutions through the `SubIFDs` of the first plane.
//!
//! Inconsistencies are repaired where a safe fallback exists and recorded
//! as warnings. A series with no usable planes is dropped; a dataset left
//! with no series at all is an error.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::{OmeTiffError, TiffError};
use crate::format::tiff::{Directory, TiffFile};
use crate::metadata::{CoreMetadata, OmeMetadata, Pixels, TiffData};

use super::cache::TiffCache;
use super::files::FileMap;
use super::plane::{OmeTiffPlane, PlaneStatus};
use super::repair::{self, ExporterHints};
use super::warnings::Warnings;

// =============================================================================
// SeriesTable
// =============================================================================

/// Resolved layout of one series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesTable {
    /// Index of the image in the metadata document
    pub image: usize,
    /// Core metadata per resolution, full resolution first
    pub resolutions: Vec<CoreMetadata>,
    /// Plane locations at full resolution
    pub planes: Vec<OmeTiffPlane>,
}

impl SeriesTable {
    pub fn full_resolution(&self) -> &CoreMetadata {
        &self.resolutions[0]
    }

    pub fn resolution_count(&self) -> usize {
        self.resolutions.len()
    }

    /// Distinct files holding present planes, in path order.
    pub fn used_files(&self) -> Vec<&Path> {
        let mut files: Vec<&Path> = self
            .planes
            .iter()
            .filter(|p| p.is_present())
            .filter_map(OmeTiffPlane::file)
            .collect();
        files.sort();
        files.dedup();
        files
    }
}

// =============================================================================
// Range ingestion
// =============================================================================

/// Minimum declared first index per axis, used to detect records that
/// count from one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct IndexStart {
    z: usize,
    c: usize,
    t: usize,
}

fn index_start(pixels: &Pixels, core: &CoreMetadata, series: usize, warnings: &mut Warnings) -> IndexStart {
    let records = &pixels.tiff_data;
    if records.is_empty() {
        return IndexStart::default();
    }

    let axes: [(&str, fn(&TiffData) -> Option<usize>, usize); 3] = [
        ("z", |td| td.first_z, core.size_z),
        ("c", |td| td.first_c, core.effective_size_c()),
        ("t", |td| td.first_t, core.size_t),
    ];
    let mut start = [0usize; 3];
    for (slot, (axis, first, size)) in axes.into_iter().enumerate() {
        let values = records.iter().map(|td| first(td).unwrap_or(0));
        let min = values.clone().min().unwrap_or(0);
        let max = values.max().unwrap_or(0);
        if min > 0 {
            warnings.push(format!("Series {} has non-zero {} index start: {}", series, axis, min));
        } else if max >= size {
            warnings.push(format!(
                "Series {} has {} indices from 0 up to {} with size {}: mixed zero- and one-based records are not corrected",
                series, axis, max, size
            ));
        }
        start[slot] = min;
    }
    IndexStart {
        z: start[0],
        c: start[1],
        t: start[2],
    }
}

/// Build the full-resolution plane table of one series from its range
/// records.
///
/// `core` supplies the dimension order and sizes; `is_valid` reports
/// whether a file opens as a TIFF. Planes no record reaches are returned
/// cleared (absent, without a file).
pub fn ingest_range_records(
    series: usize,
    pixels: &Pixels,
    core: &CoreMetadata,
    files: &FileMap,
    mut is_valid: impl FnMut(&Path) -> bool,
    warnings: &mut Warnings,
) -> Result<Vec<OmeTiffPlane>, OmeTiffError> {
    let num = core.expected_image_count();
    let mut planes = vec![OmeTiffPlane::default(); num];
    let start = index_start(pixels, core, series, warnings);

    for (record, td) in pixels.tiff_data.iter().enumerate() {
        let first_z = td.first_z.unwrap_or(0).saturating_sub(start.z);
        let first_c = td.first_c.unwrap_or(0).saturating_sub(start.c);
        let first_t = td.first_t.unwrap_or(0).saturating_sub(start.t);

        if first_z >= core.size_z || first_c >= core.effective_size_c() || first_t >= core.size_t {
            warnings.push(format!(
                "Found invalid TiffData {} in series {}: Z={}, C={}, T={}",
                record, series, first_z, first_c, first_t
            ));
            continue;
        }

        let index = crate::dimension::get_index(
            core.dimension_order,
            core.size_z,
            core.effective_size_c(),
            core.size_t,
            num,
            first_z,
            first_c,
            first_t,
        )?;

        let file = files.resolve(td).to_path_buf();
        let status = if is_valid(&file) {
            PlaneStatus::Present
        } else {
            PlaneStatus::Absent
        };
        let ifd = td.ifd.unwrap_or(0);
        let count = match (td.plane_count, td.ifd) {
            (Some(count), _) => count,
            (None, Some(_)) => 1,
            (None, None) => 0,
        };

        if count > 0 {
            if index + count > num {
                warnings.push(format!(
                    "TiffData {} in series {} covers {} planes from plane {}, past the last plane {}",
                    record,
                    series,
                    count,
                    index,
                    num - 1
                ));
            }
            for q in 0..count.min(num - index) {
                planes[index + q] = OmeTiffPlane::located(&file, ifd + q, true, status);
            }
        } else {
            // Unknown plane count: this record runs until the next certain plane.
            planes[index] = OmeTiffPlane::located(&file, ifd, true, status);
            for no in index + 1..num {
                if planes[no].certain {
                    break;
                }
                let previous = planes[no - 1].ifd;
                planes[no] = OmeTiffPlane::located(&file, previous + 1, false, status);
            }
        }
        debug!(series, record, index, count, file = %file.display(), "Ingested range record");
    }

    for (no, plane) in planes.iter_mut().enumerate() {
        if plane.status == PlaneStatus::Unknown {
            plane.clear();
            debug!(series, plane = no, "Cleared unresolved plane");
        }
    }
    Ok(planes)
}

// =============================================================================
// Directory lookup
// =============================================================================

/// The directory holding plane `index` of `series` at `resolution`.
///
/// Resolution 0 is the plane's own directory; resolution `r` is entry
/// `r - 1` of its `SubIFDs`.
pub fn plane_directory(
    cache: &TiffCache,
    plane: &OmeTiffPlane,
    series: usize,
    index: usize,
    resolution: usize,
) -> Result<(Arc<TiffFile>, Directory), OmeTiffError> {
    let path = plane
        .file()
        .ok_or(OmeTiffError::MissingPlane { series, plane: index })?;
    let file = cache.get(path)?;
    let mut directory = file.directory(plane.ifd)?;
    if resolution > 0 {
        let offset = *directory
            .sub_ifds
            .get(resolution - 1)
            .ok_or(TiffError::DirectoryIndexOutOfRange {
                index: resolution - 1,
                count: directory.sub_ifds.len(),
            })?;
        directory = file.directory_at_offset(offset)?;
    }
    Ok((file, directory))
}

// =============================================================================
// PlaneResolver
// =============================================================================

/// Resolves every series of a document against the files on disk.
pub struct PlaneResolver<'a> {
    meta: &'a OmeMetadata,
    files: &'a FileMap,
    cache: &'a TiffCache,
    warnings: &'a mut Warnings,
}

impl<'a> PlaneResolver<'a> {
    pub fn new(
        meta: &'a OmeMetadata,
        files: &'a FileMap,
        cache: &'a TiffCache,
        warnings: &'a mut Warnings,
    ) -> Self {
        Self {
            meta,
            files,
            cache,
            warnings,
        }
    }

    /// Resolve all series, dropping those that cannot be read.
    pub fn resolve(mut self) -> Result<Vec<SeriesTable>, OmeTiffError> {
        let mut tables = Vec::with_capacity(self.meta.images.len());
        for series in 0..self.meta.images.len() {
            if let Some(table) = self.resolve_series(series)? {
                tables.push(table);
            }
        }
        if tables.is_empty() {
            return Err(OmeTiffError::NoValidSeries(self.files.current().display().to_string()));
        }
        debug!(series = tables.len(), "Resolved dataset");
        Ok(tables)
    }

    fn resolve_series(&mut self, series: usize) -> Result<Option<SeriesTable>, OmeTiffError> {
        let meta = self.meta;
        let image = &meta.images[series];
        let pixels = &image.pixels;
        if let Err(err) = pixels.validate() {
            self.warnings
                .push(format!("Removing image series {} ({}): {}", series, image.id, err));
            return Ok(None);
        }

        let size_c = repair::infer_channels(pixels, series, self.warnings);
        let mut core = CoreMetadata {
            size_x: pixels.size_x,
            size_y: pixels.size_y,
            size_z: pixels.size_z,
            size_t: pixels.size_t,
            size_c,
            pixel_type: pixels.pixel_type,
            bits_per_pixel: pixels.pixel_type.bits_per_pixel(),
            dimension_order: pixels.dimension_order,
            modulo_z: pixels.modulo_z.clone(),
            modulo_t: pixels.modulo_t.clone(),
            modulo_c: pixels.modulo_c.clone(),
            ..CoreMetadata::default()
        };
        core.image_count = core.expected_image_count();

        let cache = self.cache;
        let mut planes = ingest_range_records(
            series,
            pixels,
            &core,
            self.files,
            |path| cache.is_valid(path),
            self.warnings,
        )?;

        if let Some(missing) = planes.iter().position(|p| p.file.is_none()) {
            self.warnings
                .push(format!("Image ID: {} missing plane #{}", image.id, missing));
            if self.files.used_files().len() != 1 {
                self.warnings.push(format!(
                    "Removing image series {} ({}): planes missing from a multi-file dataset",
                    series, image.id
                ));
                return Ok(None);
            }
            planes = self.whole_file_planes(core.image_count)?;
            core.image_count = planes.len();
        }

        if !planes.iter().any(OmeTiffPlane::is_present) {
            self.warnings.push(format!(
                "Removing image series {} ({}): no readable planes",
                series, image.id
            ));
            return Ok(None);
        }

        repair::fix_image_counts(&mut core, series, self.warnings);
        if let Err(err) = self.fill_core(&mut core, pixels, &planes, 0, series) {
            self.warnings
                .push(format!("Removing image series {} ({}): {}", series, image.id, err));
            return Ok(None);
        }
        let hints = ExporterHints::from_pixels(pixels, self.files.is_omero_export());
        repair::fix_exporter_order(&mut core, hints, series, self.warnings);
        repair::fix_dimensions(&mut core, series, self.warnings);

        let mut table = SeriesTable {
            image: series,
            resolutions: vec![core],
            planes,
        };
        self.add_sub_resolutions(&mut table, pixels, series);
        Ok(Some(table))
    }

    /// Map the directories of the current file onto the planes in order.
    fn whole_file_planes(&self, expected: usize) -> Result<Vec<OmeTiffPlane>, OmeTiffError> {
        let current = self.files.current();
        let file = self.cache.get(current)?;
        let count = file.directory_count().min(expected);
        Ok((0..count)
            .map(|ifd| OmeTiffPlane::located(current, ifd, false, PlaneStatus::Present))
            .collect())
    }

    /// Fill geometry, pixel type and per-channel sample counts of `core`
    /// from the directories of `planes` at `resolution`.
    fn fill_core(
        &mut self,
        core: &mut CoreMetadata,
        pixels: &Pixels,
        planes: &[OmeTiffPlane],
        resolution: usize,
        series: usize,
    ) -> Result<(), OmeTiffError> {
        let (first_index, first) =
            first_plane(planes).ok_or(OmeTiffError::MissingPlane { series, plane: 0 })?;
        let (_, dir) = plane_directory(self.cache, first, series, first_index, resolution)?;

        if resolution == 0 && (dir.width != pixels.size_x || dir.height != pixels.size_y) {
            self.warnings.push(format!(
                "Size mismatch: OME={}x{}, TIFF={}x{}",
                pixels.size_x, pixels.size_y, dir.width, dir.height
            ));
        }
        core.size_x = dir.width;
        core.size_y = dir.height;

        let pixel_type = dir.pixel_type()?;
        if resolution == 0 && pixel_type != pixels.pixel_type {
            self.warnings.push(format!(
                "PixelType mismatch: OME={}, TIFF={}",
                pixels.pixel_type, pixel_type
            ));
        }
        core.pixel_type = pixel_type;
        core.bits_per_pixel = pixel_type.bits_per_pixel();
        if let Some(bits) = pixels.significant_bits {
            if bits <= core.bits_per_pixel && bits > 0 {
                core.bits_per_pixel = bits;
            } else if resolution == 0 {
                self.warnings.push(format!(
                    "BitsPerPixel out of range: SignificantBits={}, type bits={}",
                    bits, core.bits_per_pixel
                ));
            }
        }

        core.interleaved = dir.is_interleaved();
        core.indexed = dir.is_indexed();
        core.little_endian = cfg!(target_endian = "little");
        core.order_certain = true;
        core.metadata_complete = true;
        core.sub_resolution_offset = (resolution > 0).then_some(resolution);

        core.tile_size_x.clear();
        core.tile_size_y.clear();
        for channel in 0..core.effective_size_c() {
            let index = match core.get_index(0, channel, 0) {
                Ok(index) if index < planes.len() => index,
                _ => continue,
            };
            let plane = &planes[index];
            if !plane.is_present() {
                continue;
            }
            let (_, channel_dir) = plane_directory(self.cache, plane, series, index, resolution)?;
            let samples = channel_dir.samples_per_pixel.max(1) as usize;
            if samples != core.size_c[channel] {
                if resolution == 0 {
                    self.warnings.push(format!(
                        "SamplesPerPixel mismatch: OME={}, TIFF={}",
                        core.size_c[channel], samples
                    ));
                }
                core.size_c[channel] = samples;
            }
            let (tile_width, tile_height) = channel_dir.tile_size();
            core.tile_size_x.push(tile_width);
            core.tile_size_y.push(tile_height);
        }

        if resolution == 0 && core.total_size_c() != pixels.size_c {
            self.warnings.push(format!(
                "SizeC mismatch: Channels={}, Pixels={}",
                core.total_size_c(),
                pixels.size_c
            ));
        }
        Ok(())
    }

    /// Add one resolution per `SubIFDs` entry of the first plane, or none
    /// at all if any of them is inconsistent with the full resolution.
    fn add_sub_resolutions(&mut self, table: &mut SeriesTable, pixels: &Pixels, series: usize) {
        let Some((index, first)) = first_plane(&table.planes) else {
            return;
        };
        let count = match plane_directory(self.cache, first, series, index, 0) {
            Ok((_, dir)) => dir.sub_ifds.len(),
            Err(_) => return,
        };

        let full = table.resolutions[0].clone();
        let mut levels = Vec::with_capacity(count);
        for resolution in 1..=count {
            let mut core = full.clone();
            let checked = match self.fill_core(&mut core, pixels, &table.planes, resolution, series) {
                Ok(()) => check_sub_resolution(&full, &core),
                Err(err) => Err(err.to_string()),
            };
            if let Err(reason) = checked {
                self.warnings.push(format!(
                    "Discarding sub-resolutions of series {}: resolution {}: {}",
                    series, resolution, reason
                ));
                return;
            }
            levels.push(core);
        }
        if !levels.is_empty() {
            debug!(series, levels = levels.len(), "Added sub-resolutions");
        }
        table.resolutions.extend(levels);
    }
}

/// Plane 0 if present, otherwise the first present plane.
fn first_plane(planes: &[OmeTiffPlane]) -> Option<(usize, &OmeTiffPlane)> {
    planes.iter().enumerate().find(|(_, p)| p.is_present())
}

/// Compatibility of a reduced resolution with its full resolution.
pub fn check_sub_resolution(full: &CoreMetadata, sub: &CoreMetadata) -> Result<(), String> {
    if sub.size_x > full.size_x || sub.size_y > full.size_y {
        return Err(format!(
            "size {}x{} exceeds full resolution {}x{}",
            sub.size_x, sub.size_y, full.size_x, full.size_y
        ));
    }
    if sub.size_z != full.size_z || sub.size_t != full.size_t || sub.size_c != full.size_c {
        return Err(format!(
            "Z/T/C sizes {}/{}/{:?} differ from {}/{}/{:?}",
            sub.size_z, sub.size_t, sub.size_c, full.size_z, full.size_t, full.size_c
        ));
    }
    if sub.pixel_type != full.pixel_type {
        return Err(format!(
            "pixel type {} differs from {}",
            sub.pixel_type, full.pixel_type
        ));
    }
    if sub.indexed != full.indexed || sub.interleaved != full.interleaved {
        return Err("indexed or interleaved storage differs".to_string());
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
