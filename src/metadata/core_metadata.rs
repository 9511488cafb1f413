//! Per-series, per-resolution core metadata.

use serde::Serialize;

use crate::dimension::{
    get_index, get_index_modulo, get_zct_coords, get_zct_modulo_coords, DimensionOrder, Modulo,
    ModuloSizes, ZctCoords, ZctModuloCoords,
};
use crate::error::DimensionError;
use crate::pixel::PixelType;

/// Geometry of one resolution of one series.
///
/// `size_c` holds one entry per effective channel, each entry being that
/// channel's sample count. The number of planes is normally
/// `size_z * size_t * size_c.len()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoreMetadata {
    pub size_x: u32,
    pub size_y: u32,
    pub size_z: usize,
    pub size_t: usize,
    pub size_c: Vec<usize>,
    pub pixel_type: PixelType,
    pub bits_per_pixel: u32,
    pub dimension_order: DimensionOrder,
    pub order_certain: bool,
    pub interleaved: bool,
    pub little_endian: bool,
    pub indexed: bool,
    pub metadata_complete: bool,
    pub image_count: usize,
    pub modulo_z: Option<Modulo>,
    pub modulo_t: Option<Modulo>,
    pub modulo_c: Option<Modulo>,
    /// Tile width per channel
    pub tile_size_x: Vec<u32>,
    /// Tile height per channel
    pub tile_size_y: Vec<u32>,
    /// Index into the SubIFDs list of the plane's directory, plus one;
    /// `None` for full resolution
    pub sub_resolution_offset: Option<usize>,
}

impl Default for CoreMetadata {
    fn default() -> Self {
        Self {
            size_x: 1,
            size_y: 1,
            size_z: 1,
            size_t: 1,
            size_c: vec![1],
            pixel_type: PixelType::Uint8,
            bits_per_pixel: 8,
            dimension_order: DimensionOrder::default(),
            order_certain: true,
            interleaved: false,
            little_endian: cfg!(target_endian = "little"),
            indexed: false,
            metadata_complete: true,
            image_count: 1,
            modulo_z: None,
            modulo_t: None,
            modulo_c: None,
            tile_size_x: Vec::new(),
            tile_size_y: Vec::new(),
            sub_resolution_offset: None,
        }
    }
}

impl CoreMetadata {
    /// Number of channels as counted by the plane index.
    pub fn effective_size_c(&self) -> usize {
        self.size_c.len()
    }

    /// Total number of samples over all channels.
    pub fn total_size_c(&self) -> usize {
        self.size_c.iter().sum()
    }

    /// Samples per pixel of one channel.
    pub fn samples(&self, channel: usize) -> Option<usize> {
        self.size_c.get(channel).copied()
    }

    /// True when some channel carries more than one sample.
    pub fn is_rgb(&self) -> bool {
        self.size_c.iter().any(|&s| s > 1)
    }

    /// Plane count implied by the Z, T and channel sizes, saturating at
    /// `usize::MAX`.
    pub fn expected_image_count(&self) -> usize {
        self.size_z
            .saturating_mul(self.size_t)
            .saturating_mul(self.effective_size_c())
    }

    pub fn modulo_sizes(&self) -> ModuloSizes {
        let size = |m: &Option<Modulo>| m.as_ref().map_or(1, Modulo::size);
        ModuloSizes {
            z: size(&self.modulo_z),
            c: size(&self.modulo_c),
            t: size(&self.modulo_t),
        }
    }

    pub fn get_index(&self, z: usize, c: usize, t: usize) -> Result<usize, DimensionError> {
        get_index(
            self.dimension_order,
            self.size_z,
            self.effective_size_c(),
            self.size_t,
            self.image_count,
            z,
            c,
            t,
        )
    }

    pub fn get_zct_coords(&self, index: usize) -> Result<ZctCoords, DimensionError> {
        get_zct_coords(
            self.dimension_order,
            self.size_z,
            self.effective_size_c(),
            self.size_t,
            self.image_count,
            index,
        )
    }

    pub fn get_index_modulo(&self, coords: ZctModuloCoords) -> Result<usize, DimensionError> {
        get_index_modulo(
            self.dimension_order,
            self.size_z,
            self.effective_size_c(),
            self.size_t,
            self.modulo_sizes(),
            self.image_count,
            coords,
        )
    }

    pub fn get_zct_modulo_coords(&self, index: usize) -> Result<ZctModuloCoords, DimensionError> {
        get_zct_modulo_coords(
            self.dimension_order,
            self.size_z,
            self.effective_size_c(),
            self.size_t,
            self.modulo_sizes(),
            self.image_count,
            index,
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
