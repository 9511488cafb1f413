//! Serializable metadata model.
//!
//! The model covers the subset of OME metadata the reader and writer need:
//! per-image pixel geometry, channels, range records mapping planes to
//! files, modulo annotations and sub-resolution sizes. It is carried as JSON
//! in the ImageDescription of the first directory of every file in a
//! dataset.

use serde::{Deserialize, Serialize};

use crate::dimension::{DimensionOrder, Modulo};
use crate::error::MetadataError;
use crate::pixel::PixelType;

/// Largest plane count a series may declare.
pub const MAX_PLANE_COUNT: usize = 1 << 24;

/// Metadata document for one dataset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OmeMetadata {
    /// UUID of the file carrying this copy of the document (`urn:uuid:...`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    #[serde(default)]
    pub images: Vec<Image>,
}

impl OmeMetadata {
    pub fn from_json(text: &str) -> Result<Self, MetadataError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, MetadataError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn image(&self, index: usize) -> Result<&Image, MetadataError> {
        self.images.get(index).ok_or(MetadataError::MissingImage(index))
    }

    pub fn image_mut(&mut self, index: usize) -> Result<&mut Image, MetadataError> {
        self.images
            .get_mut(index)
            .ok_or(MetadataError::MissingImage(index))
    }

    /// True if any range record in the document names a UUID.
    pub fn declares_uuids(&self) -> bool {
        self.uuid.is_some()
            || self
                .images
                .iter()
                .flat_map(|image| image.pixels.tiff_data.iter())
                .any(|td| td.uuid.is_some())
    }
}

/// One series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub pixels: Pixels,
}

impl Image {
    pub fn new(id: impl Into<String>, pixels: Pixels) -> Self {
        Self {
            id: id.into(),
            name: None,
            pixels,
        }
    }
}

/// Pixel geometry and storage of one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pixels {
    pub dimension_order: DimensionOrder,
    pub pixel_type: PixelType,
    pub size_x: u32,
    pub size_y: u32,
    pub size_z: usize,
    /// Total channel count (sum of samples over all channels)
    pub size_c: usize,
    pub size_t: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub significant_bits: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub big_endian: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interleaved: Option<bool>,

    #[serde(default)]
    pub channels: Vec<Channel>,

    #[serde(default)]
    pub tiff_data: Vec<TiffData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modulo_z: Option<Modulo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modulo_t: Option<Modulo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modulo_c: Option<Modulo>,

    /// Reduced resolutions to write, largest first; consumed by the writer
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolutions: Vec<ResolutionSize>,
}

impl Pixels {
    /// Single-channel pixels of the given size with no range records.
    pub fn new(size_x: u32, size_y: u32, pixel_type: PixelType) -> Self {
        Self {
            dimension_order: DimensionOrder::default(),
            pixel_type,
            size_x,
            size_y,
            size_z: 1,
            size_c: 1,
            size_t: 1,
            significant_bits: None,
            big_endian: None,
            interleaved: None,
            channels: Vec::new(),
            tiff_data: Vec::new(),
            modulo_z: None,
            modulo_t: None,
            modulo_c: None,
            resolutions: Vec::new(),
        }
    }

    /// Channels as declared, or one channel per `size_c` when none are.
    ///
    /// Every entry is the sample count of one channel.
    pub fn channel_samples(&self) -> Vec<usize> {
        if self.channels.is_empty() {
            vec![1; self.size_c.max(1)]
        } else {
            self.channels
                .iter()
                .map(|c| c.samples_per_pixel.unwrap_or(1).max(1) as usize)
                .collect()
        }
    }

    /// Number of planes in the series, saturating at `usize::MAX`.
    pub fn plane_count(&self) -> usize {
        self.checked_plane_count().unwrap_or(usize::MAX)
    }

    fn checked_plane_count(&self) -> Option<usize> {
        self.size_z
            .checked_mul(self.size_t)?
            .checked_mul(self.channel_samples().len())
    }

    /// Check the sizes are usable for index arithmetic.
    pub fn validate(&self) -> Result<(), MetadataError> {
        let checks: [(&'static str, usize); 5] = [
            ("SizeX", self.size_x as usize),
            ("SizeY", self.size_y as usize),
            ("SizeZ", self.size_z),
            ("SizeC", self.size_c),
            ("SizeT", self.size_t),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(MetadataError::InvalidValue {
                    field,
                    message: "must be positive".to_string(),
                });
            }
        }
        match self.checked_plane_count() {
            Some(count) if count <= MAX_PLANE_COUNT => Ok(()),
            _ => Err(MetadataError::InvalidValue {
                field: "SizeZ*SizeC*SizeT",
                message: format!("plane count exceeds {}", MAX_PLANE_COUNT),
            }),
        }
    }
}

/// One channel of a series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples_per_pixel: Option<u32>,
}

impl Channel {
    pub fn new(id: impl Into<String>, samples_per_pixel: u32) -> Self {
        Self {
            id: id.into(),
            name: None,
            samples_per_pixel: Some(samples_per_pixel),
        }
    }
}

/// Range record: consecutive planes stored in consecutive directories.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TiffData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<UuidRef>,

    /// First directory index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ifd: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plane_count: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_z: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_t: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_c: Option<usize>,
}

/// File reference of a range record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UuidRef {
    pub value: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// Size of one reduced resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionSize {
    pub size_x: u32,
    pub size_y: u32,
}

// =============================================================================
// Tests
// =============================================================================
