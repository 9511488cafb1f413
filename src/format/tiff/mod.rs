//! Minimal TIFF / BigTIFF container codec.
//!
//! This module reads and writes the uncompressed subset of TIFF that
//! OME-TIFF datasets use for pixel storage.
//!
//! # Key Concepts
//!
//! - **Byte order**: TIFF files declare their endianness (II = little-endian, MM = big-endian)
//!   in the header. All multi-byte values must be read respecting this order.
//!
//! - **Classic TIFF vs BigTIFF**: Classic TIFF uses 32-bit offsets (max 4GB files),
//!   while BigTIFF uses 64-bit offsets. Both are handled transparently.
//!
//! - **IFD (Image File Directory)**: One 2-D image plus its tags. The main chain holds
//!   one directory per plane; reduced resolutions hang off their parent via `SubIFDs`.
//!
//! - **Inline vs offset values**: Small values are stored inline in the IFD entry,
//!   larger values are stored at an offset pointed to by the entry.

mod directory;
mod file;
mod layout;
mod parser;
mod patch;
mod tags;
mod values;
mod writer;

pub use directory::Directory;
pub use file::{DirectoryRef, TiffFile};
pub use layout::{pack_bits, unpack_bits, ChunkLayout, Chunking};
pub use parser::{
    ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE, VERSION_BIGTIFF,
    VERSION_TIFF,
};
pub use patch::{patch_image_description, DESCRIPTION_PLACEHOLDER, PLACEHOLDER_COUNT};
pub use tags::{
    sample_format, Compression, FieldType, Photometric, PlanarConfiguration, TiffTag,
    SUBFILE_REDUCED_IMAGE,
};
pub use values::{parse_u64_array, ValueReader};
pub use writer::{
    default_chunking, FieldValue, ImageSpec, TiffWriter, DEFAULT_TILE_SIZE, STRIP_TARGET_BYTES,
    STRIP_WIDTH_LIMIT,
};
