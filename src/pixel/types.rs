//! Pixel types and their element representations.
//!
//! [`PixelType`] is the closed set of eleven element types an image plane
//! may hold. Each one maps to exactly one Rust element type through the
//! [`Sample`] trait, which is what lets [`VariantPixelBuffer`] hand out
//! typed views without ever reinterpreting memory.
//!
//! [`VariantPixelBuffer`]: super::VariantPixelBuffer

use std::fmt;
use std::str::FromStr;

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use super::buffer::PixelBuffer;
use super::variant::VariantPixelBuffer;
use crate::format::tiff::{sample_format, ByteOrder};

// =============================================================================
// PixelType
// =============================================================================

/// Element type of a pixel plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelType {
    Int8,
    Int16,
    Int32,
    #[default]
    Uint8,
    Uint16,
    Uint32,
    Bit,
    Float,
    Double,
    #[serde(rename = "complex")]
    ComplexFloat,
    #[serde(rename = "double-complex")]
    ComplexDouble,
}

impl PixelType {
    /// Every pixel type, in declaration order.
    pub const ALL: [PixelType; 11] = [
        PixelType::Int8,
        PixelType::Int16,
        PixelType::Int32,
        PixelType::Uint8,
        PixelType::Uint16,
        PixelType::Uint32,
        PixelType::Bit,
        PixelType::Float,
        PixelType::Double,
        PixelType::ComplexFloat,
        PixelType::ComplexDouble,
    ];

    /// Canonical lowercase name, as stored in the metadata model.
    pub const fn name(self) -> &'static str {
        match self {
            PixelType::Int8 => "int8",
            PixelType::Int16 => "int16",
            PixelType::Int32 => "int32",
            PixelType::Uint8 => "uint8",
            PixelType::Uint16 => "uint16",
            PixelType::Uint32 => "uint32",
            PixelType::Bit => "bit",
            PixelType::Float => "float",
            PixelType::Double => "double",
            PixelType::ComplexFloat => "complex",
            PixelType::ComplexDouble => "double-complex",
        }
    }

    /// Size of one element in memory and in pixel streams.
    ///
    /// `Bit` occupies a whole byte per element; packing only happens on disk.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelType::Int8 | PixelType::Uint8 | PixelType::Bit => 1,
            PixelType::Int16 | PixelType::Uint16 => 2,
            PixelType::Int32 | PixelType::Uint32 | PixelType::Float => 4,
            PixelType::Double | PixelType::ComplexFloat => 8,
            PixelType::ComplexDouble => 16,
        }
    }

    /// Significant bits of one element.
    pub const fn bits_per_pixel(self) -> u32 {
        match self {
            PixelType::Bit => 1,
            other => other.bytes_per_pixel() as u32 * 8,
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            PixelType::Int8
                | PixelType::Int16
                | PixelType::Int32
                | PixelType::Float
                | PixelType::Double
                | PixelType::ComplexFloat
                | PixelType::ComplexDouble
        )
    }

    pub const fn is_floating_point(self) -> bool {
        matches!(
            self,
            PixelType::Float
                | PixelType::Double
                | PixelType::ComplexFloat
                | PixelType::ComplexDouble
        )
    }

    pub const fn is_complex(self) -> bool {
        matches!(self, PixelType::ComplexFloat | PixelType::ComplexDouble)
    }

    /// TIFF SampleFormat value for this type.
    pub const fn tiff_sample_format(self) -> u16 {
        match self {
            PixelType::Int8 | PixelType::Int16 | PixelType::Int32 => sample_format::INT,
            PixelType::Uint8 | PixelType::Uint16 | PixelType::Uint32 | PixelType::Bit => {
                sample_format::UINT
            }
            PixelType::Float | PixelType::Double => sample_format::IEEEFP,
            PixelType::ComplexFloat | PixelType::ComplexDouble => sample_format::COMPLEXIEEEFP,
        }
    }

    /// TIFF BitsPerSample value for this type.
    pub const fn tiff_bits_per_sample(self) -> u16 {
        self.bits_per_pixel() as u16
    }

    /// Derive the pixel type from TIFF SampleFormat and BitsPerSample.
    pub fn from_tiff(sample_format: u16, bits: u16) -> Option<Self> {
        let pixel_type = match (sample_format, bits) {
            (sample_format::UINT | sample_format::VOID, 1) => PixelType::Bit,
            (sample_format::UINT | sample_format::VOID, 8) => PixelType::Uint8,
            (sample_format::UINT | sample_format::VOID, 16) => PixelType::Uint16,
            (sample_format::UINT | sample_format::VOID, 32) => PixelType::Uint32,
            (sample_format::INT, 8) => PixelType::Int8,
            (sample_format::INT, 16) => PixelType::Int16,
            (sample_format::INT, 32) => PixelType::Int32,
            (sample_format::IEEEFP, 32) => PixelType::Float,
            (sample_format::IEEEFP, 64) => PixelType::Double,
            (sample_format::COMPLEXIEEEFP, 64) => PixelType::ComplexFloat,
            (sample_format::COMPLEXIEEEFP, 128) => PixelType::ComplexDouble,
            _ => return None,
        };
        Some(pixel_type)
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PixelType::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown pixel type '{}'", s))
    }
}

// =============================================================================
// Complex
// =============================================================================

/// A complex sample: real part followed by imaginary part.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Complex<T> {
    pub re: T,
    pub im: T,
}

impl<T> Complex<T> {
    pub const fn new(re: T, im: T) -> Self {
        Self { re, im }
    }
}

// =============================================================================
// Sample
// =============================================================================

/// An element type that can live in a [`PixelBuffer`].
///
/// The trait ties each Rust element type to its canonical [`PixelType`] and
/// to the matching [`VariantPixelBuffer`] variant, and knows how to move the
/// element through a byte stream in either byte order.
pub trait Sample: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// The canonical pixel type for this element.
    const PIXEL_TYPE: PixelType;

    /// Append this element to `dst`.
    fn put<B: BufMut>(self, dst: &mut B, order: ByteOrder);

    /// Consume one element from `src`.
    ///
    /// Callers guarantee `src` holds at least `PIXEL_TYPE.bytes_per_pixel()` bytes.
    fn get<B: Buf>(src: &mut B, order: ByteOrder) -> Self;

    /// Wrap a typed buffer in its variant.
    fn into_variant(buffer: PixelBuffer<'_, Self>) -> VariantPixelBuffer<'_>;

    /// Borrow the typed buffer if the variant holds this element type.
    fn from_variant<'b, 'a>(
        variant: &'b VariantPixelBuffer<'a>,
    ) -> Option<&'b PixelBuffer<'a, Self>>;

    /// Mutably borrow the typed buffer if the variant holds this element type.
    fn from_variant_mut<'b, 'a>(
        variant: &'b mut VariantPixelBuffer<'a>,
    ) -> Option<&'b mut PixelBuffer<'a, Self>>;
}

macro_rules! variant_glue {
    ($variant:ident) => {
        fn into_variant(buffer: PixelBuffer<'_, Self>) -> VariantPixelBuffer<'_> {
            VariantPixelBuffer::$variant(buffer)
        }

        fn from_variant<'b, 'a>(
            variant: &'b VariantPixelBuffer<'a>,
        ) -> Option<&'b PixelBuffer<'a, Self>> {
            match variant {
                VariantPixelBuffer::$variant(buffer) => Some(buffer),
                _ => None,
            }
        }

        fn from_variant_mut<'b, 'a>(
            variant: &'b mut VariantPixelBuffer<'a>,
        ) -> Option<&'b mut PixelBuffer<'a, Self>> {
            match variant {
                VariantPixelBuffer::$variant(buffer) => Some(buffer),
                _ => None,
            }
        }
    };
}

macro_rules! impl_sample {
    ($ty:ty, $variant:ident, $put_le:ident, $put_be:ident, $get_le:ident, $get_be:ident) => {
        impl Sample for $ty {
            const PIXEL_TYPE: PixelType = PixelType::$variant;

            #[inline]
            fn put<B: BufMut>(self, dst: &mut B, order: ByteOrder) {
                match order {
                    ByteOrder::LittleEndian => dst.$put_le(self),
                    ByteOrder::BigEndian => dst.$put_be(self),
                }
            }

            #[inline]
            fn get<B: Buf>(src: &mut B, order: ByteOrder) -> Self {
                match order {
                    ByteOrder::LittleEndian => src.$get_le(),
                    ByteOrder::BigEndian => src.$get_be(),
                }
            }

            variant_glue!($variant);
        }
    };
}

impl_sample!(i8, Int8, put_i8, put_i8, get_i8, get_i8);
impl_sample!(i16, Int16, put_i16_le, put_i16, get_i16_le, get_i16);
impl_sample!(i32, Int32, put_i32_le, put_i32, get_i32_le, get_i32);
impl_sample!(u8, Uint8, put_u8, put_u8, get_u8, get_u8);
impl_sample!(u16, Uint16, put_u16_le, put_u16, get_u16_le, get_u16);
impl_sample!(u32, Uint32, put_u32_le, put_u32, get_u32_le, get_u32);
impl_sample!(f32, Float, put_f32_le, put_f32, get_f32_le, get_f32);
impl_sample!(f64, Double, put_f64_le, put_f64, get_f64_le, get_f64);

impl Sample for bool {
    const PIXEL_TYPE: PixelType = PixelType::Bit;

    #[inline]
    fn put<B: BufMut>(self, dst: &mut B, _order: ByteOrder) {
        dst.put_u8(self as u8);
    }

    #[inline]
    fn get<B: Buf>(src: &mut B, _order: ByteOrder) -> Self {
        src.get_u8() != 0
    }

    variant_glue!(Bit);
}

impl Sample for Complex<f32> {
    const PIXEL_TYPE: PixelType = PixelType::ComplexFloat;

    #[inline]
    fn put<B: BufMut>(self, dst: &mut B, order: ByteOrder) {
        self.re.put(dst, order);
        self.im.put(dst, order);
    }

    #[inline]
    fn get<B: Buf>(src: &mut B, order: ByteOrder) -> Self {
        let re = f32::get(src, order);
        let im = f32::get(src, order);
        Complex { re, im }
    }

    variant_glue!(ComplexFloat);
}

impl Sample for Complex<f64> {
    const PIXEL_TYPE: PixelType = PixelType::ComplexDouble;

    #[inline]
    fn put<B: BufMut>(self, dst: &mut B, order: ByteOrder) {
        self.re.put(dst, order);
        self.im.put(dst, order);
    }

    #[inline]
    fn get<B: Buf>(src: &mut B, order: ByteOrder) -> Self {
        let re = f64::get(src, order);
        let im = f64::get(src, order);
        Complex { re, im }
    }

    variant_glue!(ComplexDouble);
}

// =============================================================================
// Tests
// =============================================================================
