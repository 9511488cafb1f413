//! Read access to a TIFF file.
//!
//! [`TiffFile`] parses the header, walks the main IFD chain once and then
//! loads [`Directory`] values on demand. Pixel data is decoded straight into
//! a [`VariantPixelBuffer`] whose storage order matches the on-disk sample
//! layout, so no reordering happens on the read path.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Weak};

use tracing::debug;

use crate::error::{PixelError, TiffError};
use crate::io::{FileRangeReader, RangeReader};
use crate::pixel::VariantPixelBuffer;

use super::directory::Directory;
use super::parser::{ByteOrder, Ifd, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};

/// Upper bound on the main IFD chain length.
const MAX_IFDS: usize = 1 << 20;

// =============================================================================
// TiffFile
// =============================================================================

/// A parsed TIFF or BigTIFF file.
pub struct TiffFile<R = FileRangeReader> {
    reader: R,
    header: TiffHeader,
    ifd_offsets: Vec<u64>,
}

impl TiffFile<FileRangeReader> {
    /// Open and index a file on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TiffError> {
        let reader = FileRangeReader::open(path)?;
        Self::from_reader(reader)
    }
}

impl<R: RangeReader> TiffFile<R> {
    /// Parse the header and walk the IFD chain of `reader`.
    pub fn from_reader(reader: R) -> Result<Self, TiffError> {
        let size = reader.size();
        if size < TIFF_HEADER_SIZE as u64 {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: size,
            });
        }
        let header_len = size.min(BIGTIFF_HEADER_SIZE as u64) as usize;
        let header_bytes = reader.read_exact_at(0, header_len)?;
        let header = TiffHeader::parse(&header_bytes, size)?;

        let mut file = Self {
            reader,
            header,
            ifd_offsets: Vec::new(),
        };
        file.ifd_offsets = file.walk_chain()?;

        debug!(
            file = file.reader.identifier(),
            bigtiff = header.is_bigtiff,
            directories = file.ifd_offsets.len(),
            "Indexed TIFF file"
        );
        Ok(file)
    }

    fn walk_chain(&self) -> Result<Vec<u64>, TiffError> {
        let mut offsets = Vec::new();
        let mut seen = HashSet::new();
        let mut offset = self.header.first_ifd_offset;

        while offset != 0 && offsets.len() < MAX_IFDS {
            if !seen.insert(offset) {
                debug!(offset, "IFD chain loops back, stopping");
                break;
            }
            let ifd = self.read_ifd(offset)?;
            offsets.push(offset);
            offset = ifd.next_ifd_offset;
        }

        Ok(offsets)
    }

    /// Read the raw IFD at `offset`.
    pub fn read_ifd(&self, offset: u64) -> Result<Ifd, TiffError> {
        let count_size = self.header.ifd_count_size();
        if offset + count_size as u64 > self.reader.size() {
            return Err(TiffError::InvalidIfdOffset(offset));
        }
        let count_bytes = self.reader.read_exact_at(offset, count_size)?;
        let entry_count = Ifd::entry_count(&count_bytes, &self.header);

        let ifd_size = Ifd::calculate_size(entry_count, &self.header);
        let ifd_bytes = self.reader.read_exact_at(offset, ifd_size)?;
        Ifd::parse(&ifd_bytes, &self.header)
    }

    pub fn header(&self) -> &TiffHeader {
        &self.header
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    pub fn is_bigtiff(&self) -> bool {
        self.header.is_bigtiff
    }

    /// Identifier of the underlying source (the path for files on disk).
    pub fn identifier(&self) -> &str {
        self.reader.identifier()
    }

    /// Number of directories in the main IFD chain.
    pub fn directory_count(&self) -> usize {
        self.ifd_offsets.len()
    }

    pub fn directory_offsets(&self) -> &[u64] {
        &self.ifd_offsets
    }

    /// Load directory `index` of the main chain.
    pub fn directory(&self, index: usize) -> Result<Directory, TiffError> {
        let offset = *self
            .ifd_offsets
            .get(index)
            .ok_or(TiffError::DirectoryIndexOutOfRange {
                index,
                count: self.ifd_offsets.len(),
            })?;
        self.directory_at_offset(offset)
    }

    /// Load the directory stored at `offset`, which need not be in the main chain.
    pub fn directory_at_offset(&self, offset: u64) -> Result<Directory, TiffError> {
        let ifd = self.read_ifd(offset)?;
        Directory::load(&self.reader, &self.header, offset, ifd)
    }

    /// Decode the full image of `dir`.
    ///
    /// The result is shaped `[width, height, 1, samples]` in the storage
    /// order of the directory's planar configuration.
    pub fn read_image(&self, dir: &Directory) -> Result<VariantPixelBuffer<'static>, TiffError> {
        dir.check_compression()?;
        let pixel_type = dir.pixel_type()?;
        let layout = dir.chunk_layout();
        let chunk_count = layout.chunk_count();

        if dir.chunk_offsets.len() < chunk_count || dir.chunk_byte_counts.len() < chunk_count {
            return Err(TiffError::InvalidTagValue {
                tag: if dir.is_tiled() { "TileOffsets" } else { "StripOffsets" },
                message: format!(
                    "{} offsets and {} byte counts for {} chunks",
                    dir.chunk_offsets.len(),
                    dir.chunk_byte_counts.len(),
                    chunk_count
                ),
            });
        }

        let mut image = vec![0u8; layout.image_bytes()];
        for i in 0..chunk_count {
            let len = (dir.chunk_byte_counts[i] as usize).min(layout.chunk_bytes(i));
            let chunk = self.reader.read_exact_at(dir.chunk_offsets[i], len)?;
            layout.scatter(i, &chunk, &mut image)?;
        }

        let shape = [dir.width as usize, dir.height as usize, 1, dir.samples_per_pixel as usize];
        let mut buffer = VariantPixelBuffer::new(shape, pixel_type, layout.storage_order());
        buffer.read_from(&mut &image[..], self.header.byte_order)?;
        Ok(buffer)
    }

    /// Decode the image of `dir` into an existing buffer.
    ///
    /// The buffer must have the directory's pixel type and shape; its
    /// storage order may differ from the on-disk layout.
    pub fn read_image_into(&self, dir: &Directory, buffer: &mut VariantPixelBuffer<'_>) -> Result<(), TiffError> {
        let decoded = self.read_image(dir)?;
        if decoded.pixel_type() != buffer.pixel_type() {
            return Err(PixelError::TypeMismatch {
                expected: buffer.pixel_type(),
                actual: decoded.pixel_type(),
            }
            .into());
        }
        buffer.copy_from(&decoded)?;
        Ok(())
    }

    /// Decode a `width`×`height` rectangle of `dir` starting at (x, y).
    pub fn read_region(
        &self,
        dir: &Directory,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<VariantPixelBuffer<'static>, TiffError> {
        let full = self.read_image(dir)?;
        if x == 0 && y == 0 && width == dir.width && height == dir.height {
            return Ok(full);
        }
        Ok(full.region(x as usize, y as usize, width as usize, height as usize)?)
    }

    /// A non-owning handle to directory `index`.
    pub fn directory_ref(self: &Arc<Self>, index: usize) -> Result<DirectoryRef<R>, TiffError> {
        let offset = *self
            .ifd_offsets
            .get(index)
            .ok_or(TiffError::DirectoryIndexOutOfRange {
                index,
                count: self.ifd_offsets.len(),
            })?;
        Ok(DirectoryRef {
            file: Arc::downgrade(self),
            offset,
        })
    }
}

// =============================================================================
// DirectoryRef
// =============================================================================

/// Handle to a directory that does not keep its file open.
///
/// Loading through a handle whose file has been dropped fails with
/// [`TiffError::Detached`].
pub struct DirectoryRef<R = FileRangeReader> {
    file: Weak<TiffFile<R>>,
    offset: u64,
}

impl<R: RangeReader> DirectoryRef<R> {
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Whether the owning file is still alive.
    pub fn is_attached(&self) -> bool {
        self.file.strong_count() > 0
    }

    /// The owning file, if it is still open.
    pub fn file(&self) -> Result<Arc<TiffFile<R>>, TiffError> {
        self.file.upgrade().ok_or(TiffError::Detached(self.offset))
    }

    /// Load the directory.
    pub fn load(&self) -> Result<Directory, TiffError> {
        self.file()?.directory_at_offset(self.offset)
    }
}

impl<R> Clone for DirectoryRef<R> {
    fn clone(&self) -> Self {
        Self {
            file: Weak::clone(&self.file),
            offset: self.offset,
        }
    }
}
