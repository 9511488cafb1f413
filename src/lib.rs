//! # ometiff
//!
//! Reading and writing of OME-TIFF datasets: microscopy images whose planes
//! are spread over one or more TIFF files and described by a metadata
//! document embedded in each of them.
//!
//! ## Features
//!
//! - **Type-safe pixel buffers**: [`VariantPixelBuffer`] holds any of eleven
//!   pixel types behind an exhaustive enum
//! - **Dimension-order arithmetic**: flat plane index to (Z, C, T) and back,
//!   including modulo sub-axes
//! - **Multi-file plane resolution**: range records are resolved to files and
//!   directories, with repair of common authoring mistakes
//! - **Sub-resolutions**: reduced images linked through `SubIFDs`
//! - **Writer**: sequential plane writing across files with final metadata
//!   patched into every file on close
//!
//! ## Architecture
//!
//! - [`io`] - Synchronous range reads from files or memory
//! - [`mod@format`] - Minimal uncompressed TIFF / BigTIFF codec
//! - [`pixel`] - Pixel types and buffers
//! - [`dimension`] - Dimension orders and index arithmetic
//! - [`metadata`] - Embedded metadata model and per-resolution core metadata
//! - [`ome`] - Plane resolver, reader and writer
//! - [`config`] - CLI and option types
//!
//! ## Example
//!
//! ```rust,no_run
//! use ometiff::{OmeTiffReader, ReaderOptions};
//!
//! let mut reader = OmeTiffReader::with_options(ReaderOptions::default());
//! reader.open("dataset.ome.tif")?;
//! let index = reader.get_index(0, 1, 2)?;
//! let plane = reader.read_plane(index)?;
//! println!("{:?} {:?}", plane.pixel_type(), plane.shape());
//! for warning in reader.warnings()? {
//!     println!("warning: {}", warning);
//! }
//! # Ok::<(), ometiff::OmeTiffError>(())
//! ```

pub mod config;
pub mod dimension;
pub mod error;
pub mod format;
pub mod io;
pub mod metadata;
pub mod ome;
pub mod pixel;

// Re-export commonly used types
pub use config::{Cli, Command, InfoConfig, ReaderOptions, WriteConfig, WriterOptions};
pub use dimension::{
    get_index, get_index_modulo, get_zct_coords, get_zct_modulo_coords, DimensionOrder, Modulo,
    ModuloSizes, ZctCoords, ZctModuloCoords,
};
pub use error::{DimensionError, IoError, MetadataError, OmeTiffError, PixelError, TiffError};
pub use format::tiff::{
    patch_image_description, ByteOrder, Directory, DirectoryRef, ImageSpec, TiffFile, TiffWriter,
};
pub use io::{FileRangeReader, RangeReader};
pub use metadata::{Channel, CoreMetadata, Image, OmeMetadata, Pixels, ResolutionSize, TiffData, UuidRef};
pub use ome::{OmeTiffPlane, OmeTiffReader, OmeTiffWriter, PlaneStatus, TiffCache};
pub use pixel::{Complex, PixelBuffer, PixelType, Sample, StorageOrder, VariantPixelBuffer};
