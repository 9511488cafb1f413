//! Strip and tile geometry for uncompressed image data.
//!
//! A plane is held in memory as "image bytes": every element unpacked to
//! whole bytes, in the same order the directory stores them on disk
//! (pixel-interleaved for contiguous planar configuration, one plane per
//! sample for separate). [`ChunkLayout`] maps between those image bytes and
//! the individual strips or tiles stored in the file.
//!
//! 1-bit data is packed MSB first on disk, with every chunk row starting on
//! a byte boundary.

use crate::error::TiffError;
use crate::pixel::StorageOrder;

use super::tags::PlanarConfiguration;

/// How a directory splits its image into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chunking {
    Strips { rows_per_strip: u32 },
    Tiles { width: u32, height: u32 },
}

/// Chunk geometry of one directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    pub width: u32,
    pub height: u32,
    pub samples: u16,
    pub bits_per_sample: u16,
    pub planar: PlanarConfiguration,
    pub chunking: Chunking,
}

impl ChunkLayout {
    /// Memory layout that matches the on-disk sample order.
    pub fn storage_order(&self) -> StorageOrder {
        StorageOrder::from_interleaved(self.planar == PlanarConfiguration::Contig)
    }

    /// Number of separately stored sample planes.
    pub fn planes(&self) -> usize {
        match self.planar {
            PlanarConfiguration::Contig => 1,
            PlanarConfiguration::Separate => self.samples as usize,
        }
    }

    /// Samples stored per pixel inside one chunk.
    fn chunk_samples(&self) -> usize {
        match self.planar {
            PlanarConfiguration::Contig => self.samples as usize,
            PlanarConfiguration::Separate => 1,
        }
    }

    /// Bytes per element once unpacked.
    fn element_bytes(&self) -> usize {
        (self.bits_per_sample as usize / 8).max(1)
    }

    fn is_bilevel(&self) -> bool {
        self.bits_per_sample == 1
    }

    /// Nominal chunk width and height in pixels.
    pub fn chunk_dims(&self) -> (usize, usize) {
        match self.chunking {
            Chunking::Strips { rows_per_strip } => {
                let rows = (rows_per_strip as usize).clamp(1, (self.height as usize).max(1));
                (self.width as usize, rows)
            }
            Chunking::Tiles { width, height } => (width as usize, height as usize),
        }
    }

    pub fn chunks_across(&self) -> usize {
        let (cw, _) = self.chunk_dims();
        (self.width as usize).div_ceil(cw.max(1))
    }

    pub fn chunks_down(&self) -> usize {
        let (_, ch) = self.chunk_dims();
        (self.height as usize).div_ceil(ch.max(1))
    }

    pub fn chunks_per_plane(&self) -> usize {
        self.chunks_across() * self.chunks_down()
    }

    /// Total number of strips or tiles.
    pub fn chunk_count(&self) -> usize {
        self.planes() * self.chunks_per_plane()
    }

    /// Packed size of one chunk row holding `pixels` pixels.
    pub fn row_bytes(&self, pixels: usize) -> usize {
        let bits = pixels * self.chunk_samples() * self.bits_per_sample as usize;
        bits.div_ceil(8)
    }

    /// Rows stored for chunk `index`. The last strip is truncated, tiles never are.
    pub fn chunk_rows(&self, index: usize) -> usize {
        let (_, ch) = self.chunk_dims();
        match self.chunking {
            Chunking::Strips { .. } => {
                let (_, _, y0) = self.chunk_origin(index);
                ch.min(self.height as usize - y0)
            }
            Chunking::Tiles { .. } => ch,
        }
    }

    /// Stored byte size of chunk `index`.
    pub fn chunk_bytes(&self, index: usize) -> usize {
        let (cw, _) = self.chunk_dims();
        self.row_bytes(cw) * self.chunk_rows(index)
    }

    /// Size of the unpacked image bytes for one full plane.
    pub fn image_bytes(&self) -> usize {
        self.width as usize * self.height as usize * self.samples as usize * self.element_bytes()
    }

    /// (sample plane, x, y) of the first pixel of chunk `index`.
    fn chunk_origin(&self, index: usize) -> (usize, usize, usize) {
        let per_plane = self.chunks_per_plane().max(1);
        let plane = index / per_plane;
        let within = index % per_plane;
        let across = self.chunks_across().max(1);
        let (cw, ch) = self.chunk_dims();
        (plane, (within % across) * cw, (within / across) * ch)
    }

    /// Pixels of chunk `index` that fall inside the image.
    fn visible_extent(&self, index: usize) -> (usize, usize) {
        let (_, x0, y0) = self.chunk_origin(index);
        let (cw, ch) = self.chunk_dims();
        (
            cw.min(self.width as usize - x0),
            ch.min(self.height as usize - y0),
        )
    }

    /// Byte offset of pixel (x, y) of sample plane `plane` in the image bytes.
    fn image_offset(&self, plane: usize, x: usize, y: usize) -> usize {
        let pixel = self.chunk_samples() * self.element_bytes();
        let row = self.width as usize * pixel;
        plane * row * self.height as usize + y * row + x * pixel
    }

    /// Copy the stored bytes of chunk `index` into `image`.
    pub fn scatter(&self, index: usize, chunk: &[u8], image: &mut [u8]) -> Result<(), TiffError> {
        let (plane, x0, y0) = self.chunk_origin(index);
        let (vis_w, vis_h) = self.visible_extent(index);
        let (cw, _) = self.chunk_dims();
        let stored_row = self.row_bytes(cw);
        let needed = stored_row * vis_h;

        if chunk.len() < needed {
            return Err(TiffError::InvalidTagValue {
                tag: self.byte_count_tag(),
                message: format!(
                    "chunk {} holds {} bytes, {} required",
                    index,
                    chunk.len(),
                    needed
                ),
            });
        }

        let copy_len = vis_w * self.chunk_samples() * self.element_bytes();
        let mut unpacked = Vec::new();
        for r in 0..vis_h {
            let src_row = &chunk[r * stored_row..(r + 1) * stored_row];
            let src = if self.is_bilevel() {
                unpacked.clear();
                unpack_bits(src_row, cw * self.chunk_samples(), &mut unpacked);
                &unpacked[..]
            } else {
                src_row
            };
            let dst = self.image_offset(plane, x0, y0 + r);
            image[dst..dst + copy_len].copy_from_slice(&src[..copy_len]);
        }
        Ok(())
    }

    /// Build the stored bytes of chunk `index` from `image`.
    ///
    /// Tile areas past the image edge are zero-filled.
    pub fn gather(&self, index: usize, image: &[u8]) -> Vec<u8> {
        let (plane, x0, y0) = self.chunk_origin(index);
        let (vis_w, vis_h) = self.visible_extent(index);
        let (cw, _) = self.chunk_dims();
        let rows = self.chunk_rows(index);
        let full_row = cw * self.chunk_samples() * self.element_bytes();
        let copy_len = vis_w * self.chunk_samples() * self.element_bytes();

        let mut out = Vec::with_capacity(self.chunk_bytes(index));
        let mut row = vec![0u8; full_row];
        for r in 0..rows {
            row.iter_mut().for_each(|b| *b = 0);
            if r < vis_h {
                let src = self.image_offset(plane, x0, y0 + r);
                row[..copy_len].copy_from_slice(&image[src..src + copy_len]);
            }
            if self.is_bilevel() {
                pack_bits(&row, &mut out);
            } else {
                out.extend_from_slice(&row);
            }
        }
        out
    }

    fn byte_count_tag(&self) -> &'static str {
        match self.chunking {
            Chunking::Strips { .. } => "StripByteCounts",
            Chunking::Tiles { .. } => "TileByteCounts",
        }
    }
}

/// Pack one row of 0/1 bytes MSB first.
pub fn pack_bits(unpacked: &[u8], out: &mut Vec<u8>) {
    for group in unpacked.chunks(8) {
        let mut byte = 0u8;
        for (i, bit) in group.iter().enumerate() {
            if *bit != 0 {
                byte |= 0x80 >> i;
            }
        }
        out.push(byte);
    }
}

/// Unpack `count` MSB-first bits into 0/1 bytes.
pub fn unpack_bits(packed: &[u8], count: usize, out: &mut Vec<u8>) {
    out.extend((0..count).map(|i| (packed[i / 8] >> (7 - i % 8)) & 1));
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn strips(width: u32, height: u32, samples: u16, bits: u16, rows: u32) -> ChunkLayout {
        ChunkLayout {
            width,
            height,
            samples,
            bits_per_sample: bits,
            planar: PlanarConfiguration::Contig,
            chunking: Chunking::Strips { rows_per_strip: rows },
        }
    }

    // -------------------------------------------------------------------------
    // Geometry tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_strip_geometry() {
        let layout = strips(10, 7, 3, 8, 3);
        assert_eq!(layout.chunk_count(), 3);
        assert_eq!(layout.chunk_rows(0), 3);
        assert_eq!(layout.chunk_rows(2), 1);
        assert_eq!(layout.chunk_bytes(0), 90);
        assert_eq!(layout.chunk_bytes(2), 30);
        assert_eq!(layout.image_bytes(), 210);
    }

    #[test]
    fn test_rows_per_strip_clamped() {
        let layout = strips(4, 2, 1, 16, 1000);
        assert_eq!(layout.chunk_count(), 1);
        assert_eq!(layout.chunk_bytes(0), 16);
    }

    #[test]
    fn test_separate_tile_geometry() {
        let layout = ChunkLayout {
            width: 300,
            height: 200,
            samples: 2,
            bits_per_sample: 8,
            planar: PlanarConfiguration::Separate,
            chunking: Chunking::Tiles { width: 256, height: 256 },
        };
        assert_eq!(layout.chunks_across(), 2);
        assert_eq!(layout.chunks_down(), 1);
        assert_eq!(layout.chunk_count(), 4);
        assert_eq!(layout.chunk_bytes(3), 256 * 256);
        assert_eq!(layout.storage_order(), StorageOrder::planar());
    }

    #[test]
    fn test_bilevel_row_bytes() {
        let layout = strips(10, 2, 1, 1, 2);
        assert_eq!(layout.row_bytes(10), 2);
        assert_eq!(layout.chunk_bytes(0), 4);
        assert_eq!(layout.image_bytes(), 20);
    }

    // -------------------------------------------------------------------------
    // Scatter / gather tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_tile_gather_pads_and_scatter_restores() {
        let layout = ChunkLayout {
            width: 3,
            height: 3,
            samples: 1,
            bits_per_sample: 8,
            planar: PlanarConfiguration::Contig,
            chunking: Chunking::Tiles { width: 2, height: 2 },
        };
        let image: Vec<u8> = (1..=9).collect();
        assert_eq!(layout.gather(0, &image), vec![1, 2, 4, 5]);
        assert_eq!(layout.gather(1, &image), vec![3, 0, 6, 0]);
        assert_eq!(layout.gather(3, &image), vec![9, 0, 0, 0]);

        let mut restored = vec![0u8; 9];
        for i in 0..layout.chunk_count() {
            let chunk = layout.gather(i, &image);
            layout.scatter(i, &chunk, &mut restored).unwrap();
        }
        assert_eq!(restored, image);
    }

    #[test]
    fn test_separate_strips_round_trip() {
        let layout = ChunkLayout {
            width: 2,
            height: 2,
            samples: 3,
            bits_per_sample: 16,
            planar: PlanarConfiguration::Separate,
            chunking: Chunking::Strips { rows_per_strip: 1 },
        };
        let image: Vec<u8> = (0..24).collect();
        assert_eq!(layout.chunk_count(), 6);
        assert_eq!(layout.gather(2, &image), (8..12).collect::<Vec<u8>>());

        let mut restored = vec![0u8; 24];
        for i in 0..layout.chunk_count() {
            layout.scatter(i, &layout.gather(i, &image), &mut restored).unwrap();
        }
        assert_eq!(restored, image);
    }

    #[test]
    fn test_scatter_short_chunk() {
        let layout = strips(4, 4, 1, 8, 4);
        let mut image = vec![0u8; 16];
        let err = layout.scatter(0, &[0u8; 10], &mut image).unwrap_err();
        assert!(matches!(
            err,
            TiffError::InvalidTagValue { tag: "StripByteCounts", .. }
        ));
    }

    #[test]
    fn test_bilevel_round_trip() {
        let layout = strips(10, 2, 1, 1, 2);
        let image: Vec<u8> = (0..20).map(|i| (i % 3 == 0) as u8).collect();
        let chunk = layout.gather(0, &image);
        assert_eq!(chunk.len(), 4);
        assert_eq!(chunk[0], 0b1001_0010);

        let mut restored = vec![0u8; 20];
        layout.scatter(0, &chunk, &mut restored).unwrap();
        assert_eq!(restored, image);
    }

    // -------------------------------------------------------------------------
    // Bit packing tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_pack_unpack_bits() {
        let mut packed = Vec::new();
        pack_bits(&[1, 0, 1, 1, 0, 0, 0, 0, 1], &mut packed);
        assert_eq!(packed, vec![0b1011_0000, 0b1000_0000]);

        let mut unpacked = Vec::new();
        unpack_bits(&packed, 9, &mut unpacked);
        assert_eq!(unpacked, vec![1, 0, 1, 1, 0, 0, 0, 0, 1]);
    }
}
