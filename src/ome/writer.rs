//! OME-TIFF writer.
//!
//! [`OmeTiffWriter`] writes the planes of every series described by an
//! [`OmeMetadata`] document into one or more TIFF files and embeds the
//! completed document in each of them on [`close`](OmeTiffWriter::close).
//!
//! Writing is sequential. Within a series, planes go in flat index order
//! and each plane's reduced resolutions follow it directly:
//!
//! ```text
//! set_series(0)
//!   set_plane(0)  save_bytes(full)  set_resolution(1)  save_bytes(half) ...
//!   set_plane(1)  save_bytes(full)  set_resolution(1)  save_bytes(half) ...
//! set_series(1)
//!   ...
//! ```
//!
//! Every cursor may stay where it is or advance by one. The first directory
//! of each file carries a placeholder description, which close replaces
//! with the final metadata once the location of every plane is known.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::WriterOptions;
use crate::dimension;
use crate::error::{IoError, MetadataError, OmeTiffError, PixelError};
use crate::format::tiff::{
    default_chunking, patch_image_description, ByteOrder, ImageSpec, PlanarConfiguration, TiffWriter,
    DESCRIPTION_PLACEHOLDER,
};
use crate::metadata::{OmeMetadata, Pixels, TiffData, UuidRef};
use crate::pixel::VariantPixelBuffer;

use super::plane::{OmeTiffPlane, PlaneStatus};

/// Classic TIFF offsets address at most this many bytes.
const CLASSIC_LIMIT: u64 = u32::MAX as u64;

/// One physical output file.
struct OutputFile {
    path: PathBuf,
    uuid: String,
    writer: TiffWriter<BufWriter<File>>,
}

/// Writer for single- and multi-file OME-TIFF datasets.
pub struct OmeTiffWriter {
    options: WriterOptions,
    metadata: Option<OmeMetadata>,
    files: Vec<OutputFile>,
    current_file: usize,
    big_tiff: bool,
    interleaved: bool,
    /// Plane table per series
    planes: Vec<Vec<OmeTiffPlane>>,
    /// Resolutions written per plane, per series
    levels: Vec<Vec<usize>>,
    series: usize,
    plane: usize,
    resolution: usize,
}

impl OmeTiffWriter {
    pub fn new() -> Self {
        Self::with_options(WriterOptions::default())
    }

    pub fn with_options(options: WriterOptions) -> Self {
        Self {
            interleaved: options.interleaved.unwrap_or(true),
            options,
            metadata: None,
            files: Vec::new(),
            current_file: 0,
            big_tiff: false,
            planes: Vec::new(),
            levels: Vec::new(),
            series: 0,
            plane: 0,
            resolution: 0,
        }
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    pub fn is_open(&self) -> bool {
        !self.files.is_empty()
    }

    fn ensure_closed(&self) -> Result<(), OmeTiffError> {
        match self.files.first() {
            Some(file) => Err(OmeTiffError::AlreadyOpen(file.path.display().to_string())),
            None => Ok(()),
        }
    }

    fn meta(&self) -> Result<&OmeMetadata, OmeTiffError> {
        self.metadata.as_ref().ok_or(OmeTiffError::NotOpen)
    }

    fn pixels(&self) -> Result<&Pixels, OmeTiffError> {
        Ok(&self.meta()?.image(self.series)?.pixels)
    }

    // -------------------------------------------------------------------------
    // Setup
    // -------------------------------------------------------------------------

    /// Describe the dataset to be written. Must precede [`set_id`](Self::set_id).
    pub fn set_metadata(&mut self, metadata: OmeMetadata) -> Result<(), OmeTiffError> {
        self.ensure_closed()?;
        if metadata.images.is_empty() {
            return Err(MetadataError::MissingImage(0).into());
        }
        for image in &metadata.images {
            image.pixels.validate()?;
        }
        self.metadata = Some(metadata);
        Ok(())
    }

    /// Only uncompressed output is supported.
    pub fn set_compression(&mut self, compression: &str) -> Result<(), OmeTiffError> {
        if compression.eq_ignore_ascii_case("none") || compression.eq_ignore_ascii_case("uncompressed") {
            Ok(())
        } else {
            Err(OmeTiffError::InvalidOption(format!(
                "unsupported compression: {}",
                compression
            )))
        }
    }

    /// Store multi-sample planes contiguously (`true`) or one sample plane
    /// after another.
    pub fn set_interleaved(&mut self, interleaved: bool) -> Result<(), OmeTiffError> {
        self.ensure_closed()?;
        self.interleaved = interleaved;
        Ok(())
    }

    /// Open the first output file.
    pub fn set_id(&mut self, path: impl AsRef<Path>) -> Result<(), OmeTiffError> {
        self.ensure_closed()?;
        self.options.validate().map_err(OmeTiffError::InvalidOption)?;
        let meta = self.metadata.as_ref().ok_or_else(|| {
            OmeTiffError::InvalidOption("metadata must be set before the output file".to_string())
        })?;

        let total = total_bytes(meta);
        self.big_tiff = self.options.big_tiff.unwrap_or(total > CLASSIC_LIMIT);
        self.planes = meta
            .images
            .iter()
            .map(|image| vec![OmeTiffPlane::pending(); image.pixels.plane_count()])
            .collect();
        self.levels = self.planes.iter().map(|planes| vec![0; planes.len()]).collect();
        self.series = 0;
        self.plane = 0;
        self.resolution = 0;
        debug!(total_bytes = total, big_tiff = self.big_tiff, "Sized output dataset");

        self.open_file(path.as_ref())
    }

    /// Direct subsequent planes to `path`, opening it if needed.
    pub fn change_output_file(&mut self, path: impl AsRef<Path>) -> Result<(), OmeTiffError> {
        if self.files.is_empty() {
            return Err(OmeTiffError::NotOpen);
        }
        let path = path.as_ref();
        if let Some(index) = self.files.iter().position(|f| f.path == path) {
            self.current_file = index;
            return Ok(());
        }
        self.open_file(path)
    }

    fn open_file(&mut self, path: &Path) -> Result<(), OmeTiffError> {
        let file = File::create(path).map_err(IoError::from)?;
        let byte_order = self.options.byte_order;
        let writer = TiffWriter::new(BufWriter::new(file), self.big_tiff, byte_order)?;
        let uuid = format!("urn:uuid:{}", Uuid::new_v4());
        info!(file = %path.display(), uuid = %uuid, big_tiff = self.big_tiff, "Opened output file");
        self.files.push(OutputFile {
            path: path.to_path_buf(),
            uuid,
            writer,
        });
        self.current_file = self.files.len() - 1;
        Ok(())
    }

    /// File receiving planes.
    pub fn current_file(&self) -> Option<&Path> {
        self.files.get(self.current_file).map(|f| f.path.as_path())
    }

    // -------------------------------------------------------------------------
    // Cursors
    // -------------------------------------------------------------------------

    pub fn set_series(&mut self, series: usize) -> Result<(), OmeTiffError> {
        let count = self.meta()?.image_count();
        step("series", series, self.series, count)?;
        if series != self.series {
            self.series = series;
            self.plane = 0;
            self.resolution = 0;
        }
        Ok(())
    }

    pub fn series(&self) -> usize {
        self.series
    }

    /// Select a plane of the current series. The resolution cursor goes
    /// back to full resolution.
    pub fn set_plane(&mut self, plane: usize) -> Result<(), OmeTiffError> {
        let count = self.pixels()?.plane_count();
        step("plane", plane, self.plane, count)?;
        if plane != self.plane {
            self.plane = plane;
            self.resolution = 0;
        }
        Ok(())
    }

    pub fn plane(&self) -> usize {
        self.plane
    }

    pub fn resolution_count(&self) -> Result<usize, OmeTiffError> {
        Ok(self.pixels()?.resolutions.len() + 1)
    }

    pub fn set_resolution(&mut self, resolution: usize) -> Result<(), OmeTiffError> {
        let count = self.resolution_count()?;
        step("resolution", resolution, self.resolution, count)?;
        self.resolution = resolution;
        Ok(())
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Plane locations of `series` as written so far.
    pub fn planes(&self, series: usize) -> Option<&[OmeTiffPlane]> {
        self.planes.get(series).map(Vec::as_slice)
    }

    // -------------------------------------------------------------------------
    // Pixels
    // -------------------------------------------------------------------------

    /// Write the current plane at the current resolution.
    ///
    /// The buffer must have the series' pixel type and be shaped
    /// `[sizeX, sizeY, 1, samples]` for this resolution and the plane's
    /// channel. Its storage order is free.
    pub fn save_bytes(&mut self, buffer: &VariantPixelBuffer<'_>) -> Result<(), OmeTiffError> {
        if self.files.is_empty() {
            return Err(OmeTiffError::NotOpen);
        }
        let (series, plane, resolution) = (self.series, self.plane, self.resolution);
        let written = self.levels[series][plane];
        if written != resolution {
            return Err(OmeTiffError::Ordering {
                what: "resolution",
                requested: resolution,
                current: written,
            });
        }
        if resolution > 0 && self.planes[series][plane].file() != Some(self.files[self.current_file].path.as_path()) {
            return Err(OmeTiffError::InvalidOption(format!(
                "resolution {} of plane {} must go to the file holding its full resolution",
                resolution, plane
            )));
        }

        let spec = self.image_spec(buffer)?;
        let file = &mut self.files[self.current_file];
        if resolution == 0 {
            let ifd = file.writer.write_image(&spec, buffer)?;
            self.planes[series][plane] = OmeTiffPlane::located(&file.path, ifd, true, PlaneStatus::Present);
            debug!(series, plane, ifd, file = %file.path.display(), "Wrote plane");
        } else {
            let offset = file.writer.write_sub_image(&spec, buffer)?;
            debug!(series, plane, resolution, offset, "Wrote sub-resolution");
        }
        self.levels[series][plane] += 1;
        Ok(())
    }

    /// Directory description for the current cursor, checked against `buffer`.
    fn image_spec(&self, buffer: &VariantPixelBuffer<'_>) -> Result<ImageSpec, OmeTiffError> {
        let pixels = self.pixels()?;
        let (width, height) = match self.resolution {
            0 => (pixels.size_x, pixels.size_y),
            r => {
                let size = &pixels.resolutions[r - 1];
                (size.size_x, size.size_y)
            }
        };
        let channels = pixels.channel_samples();
        let coords = dimension::get_zct_coords(
            pixels.dimension_order,
            pixels.size_z,
            channels.len(),
            pixels.size_t,
            pixels.plane_count(),
            self.plane,
        )?;
        let samples = channels[coords.c];

        if buffer.pixel_type() != pixels.pixel_type {
            return Err(PixelError::TypeMismatch {
                expected: pixels.pixel_type,
                actual: buffer.pixel_type(),
            }
            .into());
        }
        let expected = [width as usize, height as usize, 1, samples];
        if buffer.shape() != expected {
            return Err(PixelError::ShapeMismatch {
                expected,
                actual: buffer.shape(),
            }
            .into());
        }

        let samples = u16::try_from(samples).map_err(|_| MetadataError::InvalidValue {
            field: "SamplesPerPixel",
            message: format!("{} samples do not fit a TIFF directory", samples),
        })?;
        let mut spec = ImageSpec::new(width, height, pixels.pixel_type, samples);
        spec.planar = if self.interleaved {
            PlanarConfiguration::Contig
        } else {
            PlanarConfiguration::Separate
        };
        spec.chunking = self
            .options
            .chunking()
            .unwrap_or_else(|| default_chunking(width, pixels.pixel_type, samples));
        if self.resolution == 0 && self.files[self.current_file].writer.directory_count() == 0 {
            spec.description = Some(DESCRIPTION_PLACEHOLDER.to_string());
        }
        Ok(spec)
    }

    // -------------------------------------------------------------------------
    // Finalization
    // -------------------------------------------------------------------------

    /// Finish every file and embed the completed metadata.
    ///
    /// Fails if any plane or any of its resolutions was never written; the
    /// files are then left with their placeholder descriptions.
    pub fn close(&mut self) -> Result<(), OmeTiffError> {
        if self.files.is_empty() {
            self.metadata = None;
            return Ok(());
        }
        let files = std::mem::take(&mut self.files);
        let planes = std::mem::take(&mut self.planes);
        let levels = std::mem::take(&mut self.levels);
        let Some(mut meta) = self.metadata.take() else {
            return Err(OmeTiffError::NotOpen);
        };

        let mut outputs = Vec::with_capacity(files.len());
        for file in files {
            let directories = file.writer.directory_count();
            file.writer.finish()?;
            outputs.push((file.path, file.uuid, directories));
        }

        for (series, (planes, levels)) in planes.iter().zip(&levels).enumerate() {
            let expected = meta.images[series].pixels.resolutions.len() + 1;
            let incomplete = planes
                .iter()
                .zip(levels)
                .position(|(plane, &written)| !plane.is_present() || written != expected);
            if let Some(plane) = incomplete {
                warn!(series, plane, "Closing with unwritten planes");
                return Err(OmeTiffError::IncompletePlanes { series, plane });
            }
        }

        let base = outputs[0].0.parent().map(Path::to_path_buf).unwrap_or_default();
        let names: Vec<(PathBuf, UuidRef)> = outputs
            .iter()
            .map(|(path, uuid, _)| {
                let name = relative_name(&base, path);
                (
                    path.clone(),
                    UuidRef {
                        value: uuid.clone(),
                        file_name: Some(name),
                    },
                )
            })
            .collect();

        let byte_order = self.options.byte_order;
        for (series, planes) in planes.iter().enumerate() {
            let pixels = &mut meta.images[series].pixels;
            pixels.tiff_data = range_records(pixels, planes, &names)?;
            pixels.resolutions.clear();
            pixels.interleaved = Some(self.interleaved);
            pixels.big_endian = Some(byte_order == ByteOrder::BigEndian);
        }

        for (path, uuid, directories) in &outputs {
            if *directories == 0 {
                warn!(file = %path.display(), "No planes written to file; leaving it without metadata");
                continue;
            }
            meta.uuid = Some(uuid.clone());
            let description = meta.to_json()?;
            patch_image_description(path, &description)?;
            debug!(file = %path.display(), bytes = description.len(), "Embedded metadata");
        }

        info!(
            files = outputs.len(),
            series = planes.len(),
            "Closed OME-TIFF dataset"
        );
        self.current_file = 0;
        self.series = 0;
        self.plane = 0;
        self.resolution = 0;
        Ok(())
    }
}

impl Default for OmeTiffWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Accept `requested` if it stays at or advances `current` by one.
fn step(what: &'static str, requested: usize, current: usize, limit: usize) -> Result<(), OmeTiffError> {
    if requested >= limit {
        return Err(OmeTiffError::InvalidCursor {
            what,
            value: requested,
            limit,
        });
    }
    if requested != current && requested != current + 1 {
        return Err(OmeTiffError::Ordering {
            what,
            requested,
            current,
        });
    }
    Ok(())
}

/// Pixel bytes of the whole dataset, every resolution included.
fn total_bytes(meta: &OmeMetadata) -> u64 {
    meta.images
        .iter()
        .map(|image| {
            let pixels = &image.pixels;
            let samples: u64 = pixels.channel_samples().iter().map(|&s| s as u64).sum();
            let per_pixel = samples.saturating_mul(pixels.pixel_type.bits_per_pixel() as u64);
            let planes = pixels.size_z.saturating_mul(pixels.size_t) as u64;
            std::iter::once((pixels.size_x, pixels.size_y))
                .chain(pixels.resolutions.iter().map(|r| (r.size_x, r.size_y)))
                .map(|(x, y)| {
                    (x as u64 * y as u64)
                        .saturating_mul(per_pixel)
                        .div_ceil(8)
                        .saturating_mul(planes)
                })
                .fold(0u64, u64::saturating_add)
        })
        .fold(0, u64::saturating_add)
}

fn relative_name(base: &Path, path: &Path) -> String {
    let relative = path
        .strip_prefix(base)
        .ok()
        .filter(|p| !p.as_os_str().is_empty())
        .or_else(|| path.file_name().map(Path::new))
        .unwrap_or(path);
    relative.to_string_lossy().into_owned()
}

/// One record per run of planes stored in consecutive directories of the
/// same file.
fn range_records(
    pixels: &Pixels,
    planes: &[OmeTiffPlane],
    names: &[(PathBuf, UuidRef)],
) -> Result<Vec<TiffData>, OmeTiffError> {
    let size_c = pixels.channel_samples().len();
    let mut records = Vec::new();
    let mut start = 0;
    while start < planes.len() {
        let first = &planes[start];
        let mut end = start + 1;
        while end < planes.len() && planes[end].file == first.file && planes[end].ifd == planes[end - 1].ifd + 1 {
            end += 1;
        }

        let coords = dimension::get_zct_coords(
            pixels.dimension_order,
            pixels.size_z,
            size_c,
            pixels.size_t,
            planes.len(),
            start,
        )?;
        let uuid = names
            .iter()
            .find(|(path, _)| Some(path.as_path()) == first.file())
            .map(|(_, uuid)| uuid.clone());
        records.push(TiffData {
            uuid,
            ifd: Some(first.ifd),
            plane_count: Some(end - start),
            first_z: Some(coords.z),
            first_t: Some(coords.t),
            first_c: Some(coords.c),
        });
        start = end;
    }
    Ok(records)
}

// =============================================================================
// Tests
// =============================================================================
