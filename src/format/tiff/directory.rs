//! Decoded image directories.
//!
//! A [`Directory`] is an [`Ifd`] with the baseline image tags resolved into
//! typed fields. Out-of-line arrays (strip offsets, bits per sample, the
//! colour map, sub-IFD offsets) are fetched once when the directory is
//! loaded.

use crate::error::TiffError;
use crate::io::RangeReader;
use crate::pixel::PixelType;

use super::layout::{ChunkLayout, Chunking};
use super::parser::{Ifd, TiffHeader};
use super::tags::{sample_format, Compression, Photometric, PlanarConfiguration, TiffTag};
use super::values::ValueReader;

/// Typed view of one image file directory.
#[derive(Debug, Clone)]
pub struct Directory {
    /// Byte offset of the IFD in the file
    pub offset: u64,

    pub width: u32,
    pub height: u32,
    pub bits_per_sample: u16,
    pub samples_per_pixel: u16,
    pub sample_format: u16,

    /// Raw Compression value
    pub compression: u16,

    pub photometric: Photometric,
    pub planar: PlanarConfiguration,

    /// NewSubfileType bit field (0 when absent)
    pub subfile_type: u32,

    pub rows_per_strip: Option<u32>,
    pub tile_width: Option<u32>,
    pub tile_height: Option<u32>,

    /// Strip or tile offsets, in chunk order
    pub chunk_offsets: Vec<u64>,

    /// Strip or tile byte counts, in chunk order
    pub chunk_byte_counts: Vec<u64>,

    /// Offsets of reduced-resolution directories listed in SubIFDs
    pub sub_ifds: Vec<u64>,

    pub image_description: Option<String>,

    /// ColorMap values: all red entries, then green, then blue
    pub colormap: Option<Vec<u16>>,

    ifd: Ifd,
}

impl Directory {
    /// Resolve the image tags of `ifd`, which was read at `offset`.
    pub fn load<R: RangeReader>(
        reader: &R,
        header: &TiffHeader,
        offset: u64,
        ifd: Ifd,
    ) -> Result<Self, TiffError> {
        let values = ValueReader::new(reader, header);
        let u32_tag = |tag: TiffTag| -> Result<Option<u32>, TiffError> {
            ifd.get_entry_by_tag(tag)
                .map(|e| values.read_u32(e))
                .transpose()
        };
        let u16_array = |tag: TiffTag| -> Result<Option<Vec<u16>>, TiffError> {
            ifd.get_entry_by_tag(tag)
                .map(|e| values.read_u16_array(e))
                .transpose()
        };

        let width = u32_tag(TiffTag::ImageWidth)?.ok_or(TiffError::MissingTag("ImageWidth"))?;
        let height = u32_tag(TiffTag::ImageLength)?.ok_or(TiffError::MissingTag("ImageLength"))?;
        let samples_per_pixel = u32_tag(TiffTag::SamplesPerPixel)?.unwrap_or(1) as u16;

        let bits_per_sample = uniform(TiffTag::BitsPerSample, u16_array(TiffTag::BitsPerSample)?)?.unwrap_or(1);
        let sample_format = uniform(TiffTag::SampleFormat, u16_array(TiffTag::SampleFormat)?)?
            .unwrap_or(sample_format::UINT);

        let compression = u32_tag(TiffTag::Compression)?.unwrap_or(1) as u16;
        let photometric = Photometric::from_u16(u32_tag(TiffTag::PhotometricInterpretation)?.unwrap_or(1) as u16);
        let planar_raw = u32_tag(TiffTag::PlanarConfiguration)?.unwrap_or(1) as u16;
        let planar = PlanarConfiguration::from_u16(planar_raw).ok_or_else(|| TiffError::InvalidTagValue {
            tag: "PlanarConfiguration",
            message: format!("unknown value {}", planar_raw),
        })?;
        let subfile_type = u32_tag(TiffTag::NewSubfileType)?.unwrap_or(0);

        let tile_width = u32_tag(TiffTag::TileWidth)?;
        let tile_height = u32_tag(TiffTag::TileLength)?;
        let rows_per_strip = u32_tag(TiffTag::RowsPerStrip)?;

        let (offsets_tag, counts_tag) = if tile_width.is_some() && tile_height.is_some() {
            (TiffTag::TileOffsets, TiffTag::TileByteCounts)
        } else {
            (TiffTag::StripOffsets, TiffTag::StripByteCounts)
        };
        let chunk_offsets = ifd
            .get_entry_by_tag(offsets_tag)
            .map(|e| values.read_u64_array(e))
            .transpose()?
            .ok_or(TiffError::MissingTag(offsets_tag.name()))?;
        let chunk_byte_counts = ifd
            .get_entry_by_tag(counts_tag)
            .map(|e| values.read_u64_array(e))
            .transpose()?
            .ok_or(TiffError::MissingTag(counts_tag.name()))?;

        let sub_ifds = ifd
            .get_entry_by_tag(TiffTag::SubIfds)
            .map(|e| values.read_u64_array(e))
            .transpose()?
            .unwrap_or_default();

        let image_description = ifd
            .get_entry_by_tag(TiffTag::ImageDescription)
            .map(|e| values.read_string(e))
            .transpose()?;

        let colormap = u16_array(TiffTag::ColorMap)?;

        Ok(Self {
            offset,
            width,
            height,
            bits_per_sample,
            samples_per_pixel,
            sample_format,
            compression,
            photometric,
            planar,
            subfile_type,
            rows_per_strip,
            tile_width,
            tile_height,
            chunk_offsets,
            chunk_byte_counts,
            sub_ifds,
            image_description,
            colormap,
            ifd,
        })
    }

    /// The raw IFD this directory was decoded from.
    pub fn ifd(&self) -> &Ifd {
        &self.ifd
    }

    /// Pixel type derived from SampleFormat and BitsPerSample.
    pub fn pixel_type(&self) -> Result<PixelType, TiffError> {
        PixelType::from_tiff(self.sample_format, self.bits_per_sample).ok_or(
            TiffError::UnsupportedPixelFormat {
                sample_format: self.sample_format,
                bits: self.bits_per_sample,
            },
        )
    }

    pub fn is_tiled(&self) -> bool {
        self.tile_width.is_some() && self.tile_height.is_some()
    }

    /// True when NewSubfileType marks this as a reduced-resolution image.
    pub fn is_reduced_image(&self) -> bool {
        self.subfile_type & super::tags::SUBFILE_REDUCED_IMAGE != 0
    }

    pub fn is_interleaved(&self) -> bool {
        self.planar == PlanarConfiguration::Contig
    }

    /// Palette colour with a colour map present.
    pub fn is_indexed(&self) -> bool {
        self.photometric == Photometric::Palette && self.colormap.is_some()
    }

    /// Tile size, or strip width by rows per strip for stripped images.
    pub fn tile_size(&self) -> (u32, u32) {
        match (self.tile_width, self.tile_height) {
            (Some(w), Some(h)) => (w, h),
            _ => {
                let rows = self.rows_per_strip.unwrap_or(self.height).min(self.height);
                (self.width, rows)
            }
        }
    }

    pub fn compression_scheme(&self) -> Option<Compression> {
        Compression::from_u16(self.compression)
    }

    /// Fail unless the image data is stored uncompressed.
    pub fn check_compression(&self) -> Result<(), TiffError> {
        match self.compression_scheme() {
            Some(c) if c.is_supported() => Ok(()),
            Some(c) => Err(TiffError::UnsupportedCompression(c.name().to_string())),
            None => Err(TiffError::UnsupportedCompression(format!(
                "unknown ({})",
                self.compression
            ))),
        }
    }

    /// Strip or tile geometry of this directory.
    pub fn chunk_layout(&self) -> ChunkLayout {
        let chunking = match (self.tile_width, self.tile_height) {
            (Some(width), Some(height)) => Chunking::Tiles { width, height },
            _ => Chunking::Strips {
                rows_per_strip: self.rows_per_strip.unwrap_or(self.height),
            },
        };
        ChunkLayout {
            width: self.width,
            height: self.height,
            samples: self.samples_per_pixel,
            bits_per_sample: self.bits_per_sample,
            planar: self.planar,
            chunking,
        }
    }
}

/// Collapse a per-sample array to one value, rejecting mixed values.
fn uniform(tag: TiffTag, values: Option<Vec<u16>>) -> Result<Option<u16>, TiffError> {
    let Some(values) = values else {
        return Ok(None);
    };
    match values.first() {
        None => Ok(None),
        Some(&first) if values.iter().all(|v| *v == first) => Ok(Some(first)),
        Some(_) => Err(TiffError::InvalidTagValue {
            tag: tag.name(),
            message: format!("differing per-sample values {:?}", values),
        }),
    }
}

// =============================================================================
// Tests
// =============================================================================
