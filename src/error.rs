use thiserror::Error;

use crate::pixel::PixelType;

/// I/O errors raised while reading or writing container files
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// File not found
    #[error("File not found: {0}")]
    NotFound(String),

    /// Any other operating system error
    #[error("I/O failure: {0}")]
    Io(String),
}

impl From<std::io::Error> for IoError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => IoError::NotFound(err.to_string()),
            _ => IoError::Io(err.to_string()),
        }
    }
}

/// Errors that can occur when parsing or writing TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Directory index beyond the end of the IFD chain
    #[error("Directory index {index} out of range (file has {count} directories)")]
    DirectoryIndexOutOfRange { index: usize, count: usize },

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unsupported compression scheme
    #[error("Unsupported compression: {0} (only uncompressed data is supported)")]
    UnsupportedCompression(String),

    /// SampleFormat/BitsPerSample combination with no matching pixel type
    #[error("Unsupported pixel format: sample format {sample_format}, {bits} bits per sample")]
    UnsupportedPixelFormat { sample_format: u16, bits: u16 },

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),

    /// A directory handle was used after its file was closed
    #[error("Directory at offset {0} refers to a closed file")]
    Detached(u64),

    /// The ImageDescription placeholder does not have the expected size
    #[error("ImageDescription placeholder has count {found}, expected {expected}")]
    DescriptionPlaceholder { expected: u64, found: u64 },

    /// A value does not fit the offset width of a classic TIFF
    #[error("Offset {0} exceeds the classic TIFF 4 GiB limit")]
    OffsetOverflow(u64),

    /// A reduced-resolution image was written with no parent directory pending
    #[error("Sub-resolution directory written before any full-resolution directory")]
    NoParentDirectory,

    /// Pixel buffer rejected while transferring a plane
    #[error("Pixel transfer failed: {0}")]
    Pixel(String),
}

/// Errors raised by pixel buffer access and transfer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PixelError {
    /// Buffer accessed as a pixel type other than its active one
    #[error("Pixel type mismatch: requested {expected}, buffer holds {actual}")]
    TypeMismatch {
        expected: PixelType,
        actual: PixelType,
    },

    /// Source data length differs from the buffer element count
    #[error("Length mismatch: buffer has {expected} elements, source has {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Logical extents differ between two buffers
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: [usize; 4],
        actual: [usize; 4],
    },

    /// Storage order is not a permutation of the buffer axes
    #[error("Invalid storage order: {0}")]
    InvalidStorageOrder(String),

    /// Sample index past the sample axis extent
    #[error("Sample {sample} out of range (buffer has {samples} samples)")]
    SampleOutOfRange { sample: usize, samples: usize },

    /// Region does not fit inside the buffer
    #[error("Region {x},{y} {width}x{height} exceeds buffer extents {size_x}x{size_y}")]
    RegionOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        size_x: usize,
        size_y: usize,
    },

    /// Stream transfer failed
    #[error("Pixel stream error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PixelError {
    fn from(err: std::io::Error) -> Self {
        PixelError::Io(err.to_string())
    }
}

impl From<PixelError> for TiffError {
    fn from(err: PixelError) -> Self {
        TiffError::Pixel(err.to_string())
    }
}

/// Errors raised by dimension-order index arithmetic
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DimensionError {
    /// Dimension order is not a permutation of XYZCT starting with XY
    #[error("Invalid dimension order: {0}")]
    InvalidOrder(String),

    /// An axis size is zero
    #[error("Invalid size for {axis}: {size}")]
    InvalidSize { axis: char, size: usize },

    /// A coordinate lies outside its axis
    #[error("Invalid {axis} index: {value}/{size}")]
    CoordinateOutOfRange { axis: char, value: usize, size: usize },

    /// A flat plane index lies outside the plane count
    #[error("Invalid image index: {index}/{total}")]
    IndexOutOfRange { index: usize, total: usize },

    /// Plane count exceeds the product of the axis sizes
    #[error("ZCT size vs image count mismatch (sizeZ*sizeC*sizeT={product}, total={total})")]
    CountMismatch { product: usize, total: usize },

    /// The product of the axis sizes does not fit in a plane index
    #[error("ZCT sizes overflow the plane index: sizeZ={size_z}, sizeC={size_c}, sizeT={size_t}")]
    SizeOverflow { size_z: usize, size_c: usize, size_t: usize },
}

/// Errors raised while loading or validating the metadata model
#[derive(Debug, Clone, Error)]
pub enum MetadataError {
    /// Embedded metadata could not be (de)serialized
    #[error("Metadata serialization error: {0}")]
    Json(String),

    /// Requested image does not exist
    #[error("Image {0} not present in metadata")]
    MissingImage(usize),

    /// A field holds an unusable value
    #[error("Invalid metadata value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

impl From<serde_json::Error> for MetadataError {
    fn from(err: serde_json::Error) -> Self {
        MetadataError::Json(err.to_string())
    }
}

/// Errors raised by the OME-TIFF reader and writer
#[derive(Debug, Clone, Error)]
pub enum OmeTiffError {
    /// Container-level failure
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// Pixel buffer failure
    #[error("Pixel error: {0}")]
    Pixel(#[from] PixelError),

    /// Index arithmetic failure
    #[error("Dimension error: {0}")]
    Dimension(#[from] DimensionError),

    /// Metadata model failure
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// Raw I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// A UUID reference points at a file that cannot be used
    #[error("Unresolvable file reference {uuid}: {path}")]
    UnresolvedFile { uuid: String, path: String },

    /// The same UUID is bound to two different files
    #[error("Inconsistent UUID {uuid}: {first} and {second}")]
    InconsistentUuid {
        uuid: String,
        first: String,
        second: String,
    },

    /// Every series was dropped during plane resolution
    #[error("No valid series found in {0}")]
    NoValidSeries(String),

    /// Operation requires an open file
    #[error("No file is currently open")]
    NotOpen,

    /// Operation requires that no file is open
    #[error("A file is already open: {0}")]
    AlreadyOpen(String),

    /// Cursor value past its limit
    #[error("Invalid {what}: {value} (limit {limit})")]
    InvalidCursor {
        what: &'static str,
        value: usize,
        limit: usize,
    },

    /// Cursor moved other than by a single forward step
    #[error("{what} set out of order: {requested} (currently {current})")]
    Ordering {
        what: &'static str,
        requested: usize,
        current: usize,
    },

    /// Writer closed with planes never written
    #[error("Incomplete dataset: series {series} plane {plane} was never written")]
    IncompletePlanes { series: usize, plane: usize },

    /// Reader asked for a plane with no physical location
    #[error("Plane {plane} of series {series} has no pixel data")]
    MissingPlane { series: usize, plane: usize },

    /// Invalid writer or reader option
    #[error("Invalid option: {0}")]
    InvalidOption(String),
}
