//! Configuration for the reader, the writer and the `ometiff` binary.
//!
//! Library callers build [`ReaderOptions`] and [`WriterOptions`] directly.
//! The binary parses them from the command line, with every option also
//! settable through an environment variable with the `OMETIFF_` prefix:
//!
//! - `OMETIFF_CACHE_FILES` - Open TIFF files kept by the reader (default: 16)
//! - `OMETIFF_BIGTIFF` - Force (`true`) or forbid (`false`) BigTIFF output
//! - `OMETIFF_BIG_ENDIAN` - Write big-endian files
//! - `OMETIFF_INTERLEAVED` - Store samples contiguously (`true`) or in planes
//! - `OMETIFF_ROWS_PER_STRIP` - Rows per strip for strip-organized output
//! - `OMETIFF_TILE_SIZE` - Square tile edge for tiled output

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::dimension::DimensionOrder;
use crate::format::tiff::{ByteOrder, Chunking};
use crate::ome::DEFAULT_HANDLE_CACHE_CAPACITY;
use crate::pixel::PixelType;

// =============================================================================
// Default Values
// =============================================================================

/// Default edge length of synthetic images written by `ometiff write`.
pub const DEFAULT_SIZE: u32 = 256;

/// Default number of resolution levels written by `ometiff write`.
pub const DEFAULT_RESOLUTIONS: usize = 1;

/// Default number of files a written dataset is spread over.
pub const DEFAULT_FILES: usize = 1;

/// TIFF requires tile dimensions to be multiples of this.
pub const TILE_ALIGNMENT: u32 = 16;

// =============================================================================
// Library Options
// =============================================================================

/// Options for [`OmeTiffReader`](crate::ome::OmeTiffReader).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Maximum number of TIFF files kept open at once
    pub handle_cache_capacity: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            handle_cache_capacity: DEFAULT_HANDLE_CACHE_CAPACITY,
        }
    }
}

impl ReaderOptions {
    pub fn validate(&self) -> Result<(), String> {
        if self.handle_cache_capacity == 0 {
            return Err("handle_cache_capacity must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Options for [`OmeTiffWriter`](crate::ome::OmeTiffWriter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterOptions {
    /// `None` picks BigTIFF only when the data would not fit a classic file
    pub big_tiff: Option<bool>,
    pub byte_order: ByteOrder,
    /// `None` keeps samples contiguous for multi-sample channels
    pub interleaved: Option<bool>,
    pub rows_per_strip: Option<u32>,
    pub tile_size: Option<(u32, u32)>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            big_tiff: None,
            byte_order: ByteOrder::native(),
            interleaved: None,
            rows_per_strip: None,
            tile_size: None,
        }
    }
}

impl WriterOptions {
    pub fn validate(&self) -> Result<(), String> {
        if self.rows_per_strip.is_some() && self.tile_size.is_some() {
            return Err("rows_per_strip and tile_size are mutually exclusive".to_string());
        }
        if self.rows_per_strip == Some(0) {
            return Err("rows_per_strip must be greater than 0".to_string());
        }
        if let Some((width, height)) = self.tile_size {
            if width == 0 || height == 0 || width % TILE_ALIGNMENT != 0 || height % TILE_ALIGNMENT != 0 {
                return Err(format!(
                    "tile_size must be a positive multiple of {} in both dimensions, got {}x{}",
                    TILE_ALIGNMENT, width, height
                ));
            }
        }
        Ok(())
    }

    /// Chunking requested by these options, if any.
    pub fn chunking(&self) -> Option<Chunking> {
        match (self.rows_per_strip, self.tile_size) {
            (Some(rows_per_strip), _) => Some(Chunking::Strips { rows_per_strip }),
            (None, Some((width, height))) => Some(Chunking::Tiles { width, height }),
            (None, None) => None,
        }
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// ometiff - inspect and write OME-TIFF datasets.
#[derive(Parser, Debug, Clone)]
#[command(name = "ometiff")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print series, resolutions, plane locations and warnings of a dataset.
    Info(InfoConfig),

    /// Write a synthetic gradient dataset.
    Write(WriteConfig),
}

#[derive(Args, Debug, Clone)]
pub struct InfoConfig {
    /// Any file of the dataset.
    pub file: PathBuf,

    /// Only report this series.
    #[arg(long)]
    pub series: Option<usize>,

    /// List the location of every plane.
    #[arg(long, default_value_t = false)]
    pub planes: bool,

    /// List only files that carry no pixel data.
    #[arg(long, default_value_t = false)]
    pub no_pixels: bool,

    /// Print JSON instead of text.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Maximum number of TIFF files kept open.
    #[arg(long, default_value_t = DEFAULT_HANDLE_CACHE_CAPACITY, env = "OMETIFF_CACHE_FILES")]
    pub cache_files: usize,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl InfoConfig {
    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            handle_cache_capacity: self.cache_files,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.reader_options().validate()
    }
}

#[derive(Args, Debug, Clone)]
pub struct WriteConfig {
    /// First output file; further files get a numeric suffix.
    pub output: PathBuf,

    #[arg(long, default_value_t = DEFAULT_SIZE)]
    pub size_x: u32,

    #[arg(long, default_value_t = DEFAULT_SIZE)]
    pub size_y: u32,

    #[arg(long, default_value_t = 1)]
    pub size_z: usize,

    /// Number of channels.
    #[arg(long, default_value_t = 1)]
    pub size_c: usize,

    #[arg(long, default_value_t = 1)]
    pub size_t: usize,

    /// Samples per pixel of every channel.
    #[arg(long, default_value_t = 1)]
    pub samples: u32,

    #[arg(long, default_value_t = PixelType::Uint8)]
    pub pixel_type: PixelType,

    #[arg(long, default_value_t = DimensionOrder::XYZCT)]
    pub dimension_order: DimensionOrder,

    /// Resolution levels, each half the size of the previous one.
    #[arg(long, default_value_t = DEFAULT_RESOLUTIONS)]
    pub resolutions: usize,

    /// Number of files the planes are spread over, round-robin.
    #[arg(long, default_value_t = DEFAULT_FILES)]
    pub files: usize,

    /// Force (`true`) or forbid (`false`) BigTIFF.
    #[arg(long, env = "OMETIFF_BIGTIFF")]
    pub bigtiff: Option<bool>,

    #[arg(long, default_value_t = false, env = "OMETIFF_BIG_ENDIAN")]
    pub big_endian: bool,

    #[arg(long, env = "OMETIFF_INTERLEAVED")]
    pub interleaved: Option<bool>,

    #[arg(long, env = "OMETIFF_ROWS_PER_STRIP")]
    pub rows_per_strip: Option<u32>,

    /// Square tile edge.
    #[arg(long, env = "OMETIFF_TILE_SIZE")]
    pub tile_size: Option<u32>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl WriteConfig {
    pub fn writer_options(&self) -> WriterOptions {
        WriterOptions {
            big_tiff: self.bigtiff,
            byte_order: if self.big_endian {
                ByteOrder::BigEndian
            } else {
                ByteOrder::LittleEndian
            },
            interleaved: self.interleaved,
            rows_per_strip: self.rows_per_strip,
            tile_size: self.tile_size.map(|edge| (edge, edge)),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let sizes = [
            ("size_x", self.size_x as usize),
            ("size_y", self.size_y as usize),
            ("size_z", self.size_z),
            ("size_c", self.size_c),
            ("size_t", self.size_t),
            ("samples", self.samples as usize),
            ("resolutions", self.resolutions),
            ("files", self.files),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(format!("{} must be greater than 0", name));
            }
        }
        if self.samples > u16::MAX as u32 {
            return Err(format!("samples must be at most {}", u16::MAX));
        }
        let smallest = self.size_x.min(self.size_y) as u64;
        if self.resolutions > 1 && smallest >> (self.resolutions - 1).min(63) == 0 {
            return Err(format!(
                "{} resolutions do not fit a {}x{} image",
                self.resolutions, self.size_x, self.size_y
            ));
        }
        self.writer_options().validate()
    }
}

// =============================================================================
// Tests
// =============================================================================
