//! Pixel-type-agnostic buffer.
//!
//! [`VariantPixelBuffer`] owns exactly one [`PixelBuffer`] of one of the
//! eleven element types. It is the unit of pixel data exchanged by the
//! reader, the writer and the container codec. Every operation is a
//! `match` over all variants (through the `dispatch!` macro), so a new
//! pixel type cannot be added without the compiler pointing at each
//! operation that must handle it.

use std::io::{Read, Write};

use crate::error::PixelError;
use crate::format::tiff::ByteOrder;

use super::buffer::{PixelBuffer, Shape, StorageOrder, AXES};
use super::types::{Complex, PixelType, Sample};

/// A pixel buffer whose element type is chosen at runtime.
#[derive(Debug)]
pub enum VariantPixelBuffer<'a> {
    Int8(PixelBuffer<'a, i8>),
    Int16(PixelBuffer<'a, i16>),
    Int32(PixelBuffer<'a, i32>),
    Uint8(PixelBuffer<'a, u8>),
    Uint16(PixelBuffer<'a, u16>),
    Uint32(PixelBuffer<'a, u32>),
    Bit(PixelBuffer<'a, bool>),
    Float(PixelBuffer<'a, f32>),
    Double(PixelBuffer<'a, f64>),
    ComplexFloat(PixelBuffer<'a, Complex<f32>>),
    ComplexDouble(PixelBuffer<'a, Complex<f64>>),
}

/// Run `$body` with `$buf` bound to the typed buffer of whichever variant
/// `$value` holds.
macro_rules! dispatch {
    ($value:expr, $buf:ident => $body:expr) => {
        match $value {
            VariantPixelBuffer::Int8($buf) => $body,
            VariantPixelBuffer::Int16($buf) => $body,
            VariantPixelBuffer::Int32($buf) => $body,
            VariantPixelBuffer::Uint8($buf) => $body,
            VariantPixelBuffer::Uint16($buf) => $body,
            VariantPixelBuffer::Uint32($buf) => $body,
            VariantPixelBuffer::Bit($buf) => $body,
            VariantPixelBuffer::Float($buf) => $body,
            VariantPixelBuffer::Double($buf) => $body,
            VariantPixelBuffer::ComplexFloat($buf) => $body,
            VariantPixelBuffer::ComplexDouble($buf) => $body,
        }
    };
}

impl VariantPixelBuffer<'static> {
    /// Allocate a zero-filled buffer of the given type and layout.
    pub fn new(shape: Shape, pixel_type: PixelType, order: StorageOrder) -> Self {
        match pixel_type {
            PixelType::Int8 => Self::Int8(PixelBuffer::new(shape, order)),
            PixelType::Int16 => Self::Int16(PixelBuffer::new(shape, order)),
            PixelType::Int32 => Self::Int32(PixelBuffer::new(shape, order)),
            PixelType::Uint8 => Self::Uint8(PixelBuffer::new(shape, order)),
            PixelType::Uint16 => Self::Uint16(PixelBuffer::new(shape, order)),
            PixelType::Uint32 => Self::Uint32(PixelBuffer::new(shape, order)),
            PixelType::Bit => Self::Bit(PixelBuffer::new(shape, order)),
            PixelType::Float => Self::Float(PixelBuffer::new(shape, order)),
            PixelType::Double => Self::Double(PixelBuffer::new(shape, order)),
            PixelType::ComplexFloat => Self::ComplexFloat(PixelBuffer::new(shape, order)),
            PixelType::ComplexDouble => Self::ComplexDouble(PixelBuffer::new(shape, order)),
        }
    }

    /// Allocate a buffer with the default storage order.
    pub fn with_type(shape: Shape, pixel_type: PixelType) -> Self {
        Self::new(shape, pixel_type, StorageOrder::default())
    }
}

impl<'a> VariantPixelBuffer<'a> {
    /// Wrap an existing typed buffer without copying.
    pub fn adopt<T: Sample>(buffer: PixelBuffer<'a, T>) -> Self {
        T::into_variant(buffer)
    }

    pub fn pixel_type(&self) -> PixelType {
        dispatch!(self, b => b.pixel_type())
    }

    pub fn shape(&self) -> Shape {
        dispatch!(self, b => b.shape())
    }

    pub fn strides(&self) -> [usize; AXES] {
        dispatch!(self, b => b.strides())
    }

    pub fn storage_order(&self) -> StorageOrder {
        dispatch!(self, b => b.storage_order())
    }

    pub fn num_elements(&self) -> usize {
        dispatch!(self, b => b.num_elements())
    }

    pub fn managed(&self) -> bool {
        dispatch!(self, b => b.managed())
    }

    /// Borrow the typed buffer, failing unless `T` is the active type.
    pub fn access<T: Sample>(&self) -> Result<&PixelBuffer<'a, T>, PixelError> {
        let actual = self.pixel_type();
        T::from_variant(self).ok_or(PixelError::TypeMismatch {
            expected: T::PIXEL_TYPE,
            actual,
        })
    }

    pub fn access_mut<T: Sample>(&mut self) -> Result<&mut PixelBuffer<'a, T>, PixelError> {
        let actual = self.pixel_type();
        T::from_variant_mut(self).ok_or(PixelError::TypeMismatch {
            expected: T::PIXEL_TYPE,
            actual,
        })
    }

    /// Elements in physical order, typed as `T`.
    pub fn data<T: Sample>(&self) -> Result<&[T], PixelError> {
        Ok(self.access::<T>()?.data())
    }

    pub fn data_mut<T: Sample>(&mut self) -> Result<&mut [T], PixelError> {
        Ok(self.access_mut::<T>()?.data_mut())
    }

    /// Overwrite every element in physical order.
    pub fn assign<T, I>(&mut self, values: I) -> Result<(), PixelError>
    where
        T: Sample,
        I: IntoIterator<Item = T>,
    {
        self.access_mut::<T>()?.assign(values)
    }

    /// Logical-order copy from a buffer of the same type and shape.
    pub fn copy_from(&mut self, other: &VariantPixelBuffer<'_>) -> Result<(), PixelError> {
        dispatch!(self, b => copy_typed(b, other))
    }

    /// Fill from a byte stream in physical order.
    pub fn read_from<R: Read>(&mut self, reader: &mut R, byte_order: ByteOrder) -> Result<(), PixelError> {
        dispatch!(self, b => b.read_from(reader, byte_order))
    }

    /// Write to a byte stream in physical order.
    pub fn write_to<W: Write>(&self, writer: &mut W, byte_order: ByteOrder) -> Result<(), PixelError> {
        dispatch!(self, b => b.write_to(writer, byte_order))
    }

    /// Raw bytes in physical order.
    pub fn to_bytes(&self, byte_order: ByteOrder) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.num_elements() * self.pixel_type().bytes_per_pixel());
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut bytes, byte_order);
        bytes
    }

    /// Replace the buffer with a fresh zeroed one, discarding prior contents.
    pub fn set_buffer(&mut self, shape: Shape, pixel_type: PixelType, order: StorageOrder) {
        *self = VariantPixelBuffer::new(shape, pixel_type, order);
    }

    /// Copy one sample's X×Y×Z slab into a new planar buffer.
    pub fn copy_sample(&self, sample: usize) -> Result<VariantPixelBuffer<'static>, PixelError> {
        dispatch!(self, b => Ok(Sample::into_variant(b.extract_sample(sample)?)))
    }

    /// Overwrite one sample's slab from a single-sample buffer of the same type.
    pub fn merge_sample(&mut self, sample: usize, src: &VariantPixelBuffer<'_>) -> Result<(), PixelError> {
        dispatch!(self, b => merge_typed(b, sample, src))
    }

    /// Copy a rectangle into a new buffer with the same type and order.
    pub fn region(
        &self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> Result<VariantPixelBuffer<'static>, PixelError> {
        dispatch!(self, b => Ok(Sample::into_variant(b.region(x, y, width, height)?)))
    }
}

fn copy_typed<T: Sample>(dst: &mut PixelBuffer<'_, T>, src: &VariantPixelBuffer<'_>) -> Result<(), PixelError> {
    let src = T::from_variant(src).ok_or(PixelError::TypeMismatch {
        expected: T::PIXEL_TYPE,
        actual: src.pixel_type(),
    })?;
    dst.copy_from(src)
}

fn merge_typed<T: Sample>(
    dst: &mut PixelBuffer<'_, T>,
    sample: usize,
    src: &VariantPixelBuffer<'_>,
) -> Result<(), PixelError> {
    let src = T::from_variant(src).ok_or(PixelError::TypeMismatch {
        expected: T::PIXEL_TYPE,
        actual: src.pixel_type(),
    })?;
    dst.insert_sample(sample, src)
}

fn eq_typed<T: Sample>(a: &PixelBuffer<'_, T>, other: &VariantPixelBuffer<'_>) -> bool {
    T::from_variant(other).is_some_and(|b| a == b)
}

impl<'a, T: Sample> From<PixelBuffer<'a, T>> for VariantPixelBuffer<'a> {
    fn from(buffer: PixelBuffer<'a, T>) -> Self {
        T::into_variant(buffer)
    }
}

impl PartialEq for VariantPixelBuffer<'_> {
    /// Same pixel type, same extents, same logical contents.
    fn eq(&self, other: &Self) -> bool {
        dispatch!(self, a => eq_typed(a, other))
    }
}

impl Clone for VariantPixelBuffer<'_> {
    fn clone(&self) -> Self {
        dispatch!(self, b => Sample::into_variant(b.clone()))
    }
}

impl Default for VariantPixelBuffer<'static> {
    fn default() -> Self {
        VariantPixelBuffer::with_type([1, 1, 1, 1], PixelType::default())
    }
}

// =============================================================================
// Tests
// =============================================================================
