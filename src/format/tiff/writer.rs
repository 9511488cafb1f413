//! TIFF and BigTIFF writing.
//!
//! [`TiffWriter`] appends uncompressed images to a seekable sink. Each
//! full-resolution image becomes a directory in the main IFD chain. Reduced
//! resolutions of that image are written as standalone directories and
//! listed in the parent's `SubIFDs` tag, so the parent IFD is held back
//! until the next full-resolution image (or [`TiffWriter::flush`]).
//!
//! # Layout
//!
//! ```text
//! header | pixels(0) | sub pixels + IFDs ... | IFD(0) + values | pixels(1) | ...
//! ```
//!
//! IFDs and out-of-line values start on word boundaries.

use std::collections::BTreeMap;
use std::io::{Seek, SeekFrom, Write};

use bytes::BufMut;
use tracing::trace;

use crate::error::{IoError, PixelError, TiffError};
use crate::pixel::{PixelType, VariantPixelBuffer};

use super::layout::{ChunkLayout, Chunking};
use super::parser::{ByteOrder, VERSION_BIGTIFF, VERSION_TIFF};
use super::tags::{FieldType, Photometric, PlanarConfiguration, TiffTag, SUBFILE_REDUCED_IMAGE};

// =============================================================================
// ImageSpec
// =============================================================================

/// Everything needed to describe one image directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSpec {
    pub width: u32,
    pub height: u32,
    pub pixel_type: PixelType,
    pub samples: u16,
    pub planar: PlanarConfiguration,
    pub photometric: Photometric,
    pub chunking: Chunking,
    pub description: Option<String>,
    pub colormap: Option<Vec<u16>>,
}

impl ImageSpec {
    /// Grayscale (or multi-sample MinIsBlack) image with default chunking.
    pub fn new(width: u32, height: u32, pixel_type: PixelType, samples: u16) -> Self {
        Self {
            width,
            height,
            pixel_type,
            samples,
            planar: PlanarConfiguration::Contig,
            photometric: if samples == 3 {
                Photometric::Rgb
            } else {
                Photometric::MinIsBlack
            },
            chunking: default_chunking(width, pixel_type, samples),
            description: None,
            colormap: None,
        }
    }

    pub fn layout(&self) -> ChunkLayout {
        ChunkLayout {
            width: self.width,
            height: self.height,
            samples: self.samples,
            bits_per_sample: self.pixel_type.tiff_bits_per_sample(),
            planar: self.planar,
            chunking: self.chunking,
        }
    }

    /// Expected buffer shape: `[width, height, 1, samples]`.
    pub fn shape(&self) -> [usize; 4] {
        [self.width as usize, self.height as usize, 1, self.samples as usize]
    }
}

/// Width below which images are stored in strips.
pub const STRIP_WIDTH_LIMIT: u32 = 2048;

/// Target strip size in bytes.
pub const STRIP_TARGET_BYTES: u32 = 65536;

/// Tile edge used for wide images.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Strips for narrow images, 256×256 tiles otherwise.
pub fn default_chunking(width: u32, pixel_type: PixelType, samples: u16) -> Chunking {
    if width < STRIP_WIDTH_LIMIT {
        let row_bytes = (width as u64 * samples.max(1) as u64 * pixel_type.bits_per_pixel() as u64)
            .div_ceil(8)
            .max(1);
        let rows_per_strip = (STRIP_TARGET_BYTES as u64 / row_bytes).max(1) as u32;
        Chunking::Strips { rows_per_strip }
    } else {
        Chunking::Tiles {
            width: DEFAULT_TILE_SIZE,
            height: DEFAULT_TILE_SIZE,
        }
    }
}

// =============================================================================
// Field values
// =============================================================================

/// A tag value to be encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Ascii(String),
    Shorts(Vec<u16>),
    Longs(Vec<u32>),
    /// Offsets or byte counts: LONG in classic TIFF, LONG8 in BigTIFF
    Offsets(Vec<u64>),
    /// Directory offsets: IFD in classic TIFF, IFD8 in BigTIFF
    Ifds(Vec<u64>),
}

impl FieldValue {
    fn field_type(&self, big_tiff: bool) -> FieldType {
        match (self, big_tiff) {
            (FieldValue::Ascii(_), _) => FieldType::Ascii,
            (FieldValue::Shorts(_), _) => FieldType::Short,
            (FieldValue::Longs(_), _) => FieldType::Long,
            (FieldValue::Offsets(_), false) => FieldType::Long,
            (FieldValue::Offsets(_), true) => FieldType::Long8,
            (FieldValue::Ifds(_), false) => FieldType::Ifd,
            (FieldValue::Ifds(_), true) => FieldType::Ifd8,
        }
    }

    fn count(&self) -> u64 {
        match self {
            FieldValue::Ascii(s) => s.len() as u64 + 1,
            FieldValue::Shorts(v) => v.len() as u64,
            FieldValue::Longs(v) => v.len() as u64,
            FieldValue::Offsets(v) | FieldValue::Ifds(v) => v.len() as u64,
        }
    }

    fn encode(&self, big_tiff: bool, order: ByteOrder) -> Result<Vec<u8>, TiffError> {
        let mut out = Vec::new();
        match self {
            FieldValue::Ascii(s) => {
                out.extend_from_slice(s.as_bytes());
                out.push(0);
            }
            FieldValue::Shorts(v) => v.iter().for_each(|x| order.put_u16(&mut out, *x)),
            FieldValue::Longs(v) => v.iter().for_each(|x| order.put_u32(&mut out, *x)),
            FieldValue::Offsets(v) | FieldValue::Ifds(v) => {
                for x in v {
                    put_offset(&mut out, *x, big_tiff, order)?;
                }
            }
        }
        Ok(out)
    }
}

fn put_offset<B: BufMut>(dst: &mut B, value: u64, big_tiff: bool, order: ByteOrder) -> Result<(), TiffError> {
    if big_tiff {
        order.put_u64(dst, value);
    } else {
        let narrow = u32::try_from(value).map_err(|_| TiffError::OffsetOverflow(value))?;
        order.put_u32(dst, narrow);
    }
    Ok(())
}

// =============================================================================
// TiffWriter
// =============================================================================

/// A full-resolution directory whose IFD has not been written yet.
#[derive(Debug)]
struct PendingDirectory {
    entries: BTreeMap<u16, FieldValue>,
    sub_ifds: Vec<u64>,
}

/// Sequential writer of uncompressed TIFF or BigTIFF files.
pub struct TiffWriter<W: Write + Seek> {
    inner: W,
    big_tiff: bool,
    byte_order: ByteOrder,
    /// Current end of file
    pos: u64,
    /// File position of the next-IFD pointer to patch when the chain grows
    link_pos: u64,
    pending: Option<PendingDirectory>,
    directories: usize,
}

impl<W: Write + Seek> TiffWriter<W> {
    /// Write the header and return a writer positioned after it.
    pub fn new(mut inner: W, big_tiff: bool, byte_order: ByteOrder) -> Result<Self, TiffError> {
        let mut header = Vec::with_capacity(16);
        header.extend_from_slice(&byte_order.magic());
        if big_tiff {
            byte_order.put_u16(&mut header, VERSION_BIGTIFF);
            byte_order.put_u16(&mut header, 8);
            byte_order.put_u16(&mut header, 0);
            byte_order.put_u64(&mut header, 0);
        } else {
            byte_order.put_u16(&mut header, VERSION_TIFF);
            byte_order.put_u32(&mut header, 0);
        }
        inner.seek(SeekFrom::Start(0)).map_err(IoError::from)?;
        inner.write_all(&header).map_err(IoError::from)?;

        Ok(Self {
            inner,
            big_tiff,
            byte_order,
            pos: header.len() as u64,
            link_pos: if big_tiff { 8 } else { 4 },
            pending: None,
            directories: 0,
        })
    }

    pub fn is_bigtiff(&self) -> bool {
        self.big_tiff
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Full-resolution directories written or pending.
    pub fn directory_count(&self) -> usize {
        self.directories
    }

    /// Append a full-resolution image as the next main-chain directory.
    ///
    /// Returns the index of the new directory.
    pub fn write_image(&mut self, spec: &ImageSpec, buffer: &VariantPixelBuffer<'_>) -> Result<usize, TiffError> {
        self.flush()?;
        let entries = self.write_pixels(spec, buffer, 0)?;
        self.pending = Some(PendingDirectory {
            entries,
            sub_ifds: Vec::new(),
        });
        self.directories += 1;
        Ok(self.directories - 1)
    }

    /// Append a reduced-resolution image of the most recent full-resolution
    /// image. Returns the offset of its IFD.
    pub fn write_sub_image(&mut self, spec: &ImageSpec, buffer: &VariantPixelBuffer<'_>) -> Result<u64, TiffError> {
        if self.pending.is_none() {
            return Err(TiffError::NoParentDirectory);
        }
        let entries = self.write_pixels(spec, buffer, SUBFILE_REDUCED_IMAGE)?;
        let (offset, _) = self.write_ifd(&entries)?;
        if let Some(pending) = self.pending.as_mut() {
            pending.sub_ifds.push(offset);
        }
        trace!(offset, "Wrote sub-resolution directory");
        Ok(offset)
    }

    /// Write the pending full-resolution IFD and link it into the chain.
    pub fn flush(&mut self) -> Result<(), TiffError> {
        let Some(mut pending) = self.pending.take() else {
            return Ok(());
        };
        if !pending.sub_ifds.is_empty() {
            pending.entries.insert(
                TiffTag::SubIfds.as_u16(),
                FieldValue::Ifds(std::mem::take(&mut pending.sub_ifds)),
            );
        }
        let (offset, next_pos) = self.write_ifd(&pending.entries)?;

        let mut link = Vec::with_capacity(8);
        put_offset(&mut link, offset, self.big_tiff, self.byte_order)?;
        self.write_at(self.link_pos, &link)?;
        self.link_pos = next_pos;
        trace!(offset, "Linked directory into chain");
        Ok(())
    }

    /// Flush the pending directory and hand back the sink.
    pub fn finish(mut self) -> Result<W, TiffError> {
        self.flush()?;
        self.inner.flush().map_err(IoError::from)?;
        Ok(self.inner)
    }

    /// Write the chunks of `buffer` and build the directory entries.
    fn write_pixels(
        &mut self,
        spec: &ImageSpec,
        buffer: &VariantPixelBuffer<'_>,
        subfile_type: u32,
    ) -> Result<BTreeMap<u16, FieldValue>, TiffError> {
        if buffer.pixel_type() != spec.pixel_type {
            return Err(PixelError::TypeMismatch {
                expected: spec.pixel_type,
                actual: buffer.pixel_type(),
            }
            .into());
        }
        if buffer.shape() != spec.shape() {
            return Err(PixelError::ShapeMismatch {
                expected: spec.shape(),
                actual: buffer.shape(),
            }
            .into());
        }

        let layout = spec.layout();
        let image = if buffer.storage_order() == layout.storage_order() {
            buffer.to_bytes(self.byte_order)
        } else {
            let mut reordered = VariantPixelBuffer::new(spec.shape(), spec.pixel_type, layout.storage_order());
            reordered.copy_from(buffer)?;
            reordered.to_bytes(self.byte_order)
        };

        let count = layout.chunk_count();
        let mut offsets = Vec::with_capacity(count);
        let mut byte_counts = Vec::with_capacity(count);
        for i in 0..count {
            let chunk = layout.gather(i, &image);
            offsets.push(self.pos);
            byte_counts.push(chunk.len() as u64);
            self.append(&chunk)?;
        }

        Ok(self.image_entries(spec, subfile_type, offsets, byte_counts))
    }

    fn image_entries(
        &self,
        spec: &ImageSpec,
        subfile_type: u32,
        offsets: Vec<u64>,
        byte_counts: Vec<u64>,
    ) -> BTreeMap<u16, FieldValue> {
        let samples = spec.samples as usize;
        let mut entries = BTreeMap::new();
        let mut put = |tag: TiffTag, value: FieldValue| {
            entries.insert(tag.as_u16(), value);
        };

        if subfile_type != 0 {
            put(TiffTag::NewSubfileType, FieldValue::Longs(vec![subfile_type]));
        }
        put(TiffTag::ImageWidth, FieldValue::Longs(vec![spec.width]));
        put(TiffTag::ImageLength, FieldValue::Longs(vec![spec.height]));
        put(
            TiffTag::BitsPerSample,
            FieldValue::Shorts(vec![spec.pixel_type.tiff_bits_per_sample(); samples]),
        );
        put(TiffTag::Compression, FieldValue::Shorts(vec![1]));
        put(
            TiffTag::PhotometricInterpretation,
            FieldValue::Shorts(vec![spec.photometric.as_u16()]),
        );
        if let Some(description) = &spec.description {
            put(TiffTag::ImageDescription, FieldValue::Ascii(description.clone()));
        }
        put(TiffTag::SamplesPerPixel, FieldValue::Shorts(vec![spec.samples]));
        put(
            TiffTag::PlanarConfiguration,
            FieldValue::Shorts(vec![spec.planar.as_u16()]),
        );
        if let Some(colormap) = &spec.colormap {
            put(TiffTag::ColorMap, FieldValue::Shorts(colormap.clone()));
        }
        put(
            TiffTag::SampleFormat,
            FieldValue::Shorts(vec![spec.pixel_type.tiff_sample_format(); samples]),
        );

        match spec.chunking {
            Chunking::Strips { rows_per_strip } => {
                put(TiffTag::StripOffsets, FieldValue::Offsets(offsets));
                put(TiffTag::RowsPerStrip, FieldValue::Longs(vec![rows_per_strip]));
                put(TiffTag::StripByteCounts, FieldValue::Offsets(byte_counts));
            }
            Chunking::Tiles { width, height } => {
                put(TiffTag::TileWidth, FieldValue::Longs(vec![width]));
                put(TiffTag::TileLength, FieldValue::Longs(vec![height]));
                put(TiffTag::TileOffsets, FieldValue::Offsets(offsets));
                put(TiffTag::TileByteCounts, FieldValue::Offsets(byte_counts));
            }
        }
        entries
    }

    /// Encode an IFD with its out-of-line values at the end of the file.
    ///
    /// Returns the IFD offset and the position of its next-IFD pointer.
    fn write_ifd(&mut self, entries: &BTreeMap<u16, FieldValue>) -> Result<(u64, u64), TiffError> {
        self.align()?;
        let order = self.byte_order;
        let (count_size, entry_size, value_size) = if self.big_tiff { (8, 20, 8) } else { (2, 12, 4) };

        let ifd_offset = self.pos;
        let table_size = count_size + entries.len() * entry_size + value_size;
        let mut table = Vec::with_capacity(table_size);
        let mut data = Vec::new();
        let data_start = ifd_offset + table_size as u64;

        if self.big_tiff {
            order.put_u64(&mut table, entries.len() as u64);
        } else {
            order.put_u16(&mut table, entries.len() as u16);
        }

        for (tag, value) in entries {
            let encoded = value.encode(self.big_tiff, order)?;
            order.put_u16(&mut table, *tag);
            order.put_u16(&mut table, value.field_type(self.big_tiff).as_u16());
            if self.big_tiff {
                order.put_u64(&mut table, value.count());
            } else {
                let count = u32::try_from(value.count()).map_err(|_| TiffError::OffsetOverflow(value.count()))?;
                order.put_u32(&mut table, count);
            }

            if encoded.len() <= value_size {
                table.extend_from_slice(&encoded);
                table.resize(table.len() + value_size - encoded.len(), 0);
            } else {
                if data.len() % 2 == 1 {
                    data.push(0);
                }
                let value_offset = data_start + data.len() as u64;
                put_offset(&mut table, value_offset, self.big_tiff, order)?;
                data.extend_from_slice(&encoded);
            }
        }

        let next_pos = ifd_offset + (table.len() as u64);
        put_offset(&mut table, 0, self.big_tiff, order)?;

        if !self.big_tiff {
            let end = data_start + data.len() as u64;
            if end > u32::MAX as u64 {
                return Err(TiffError::OffsetOverflow(end));
            }
        }

        self.append(&table)?;
        self.append(&data)?;
        Ok((ifd_offset, next_pos))
    }

    fn align(&mut self) -> Result<(), TiffError> {
        if self.pos % 2 == 1 {
            self.append(&[0])?;
        }
        Ok(())
    }

    fn append(&mut self, bytes: &[u8]) -> Result<(), TiffError> {
        self.inner.seek(SeekFrom::Start(self.pos)).map_err(IoError::from)?;
        self.inner.write_all(bytes).map_err(IoError::from)?;
        self.pos += bytes.len() as u64;
        Ok(())
    }

    fn write_at(&mut self, pos: u64, bytes: &[u8]) -> Result<(), TiffError> {
        self.inner.seek(SeekFrom::Start(pos)).map_err(IoError::from)?;
        self.inner.write_all(bytes).map_err(IoError::from)?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
