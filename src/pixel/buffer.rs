//! Strongly typed multi-dimensional pixel storage.
//!
//! A [`PixelBuffer`] holds the elements of one image plane (or a stack of
//! planes) for a single element type. Its four logical axes are
//! `[X, Y, Z, Sample]`. The physical layout is described separately by a
//! [`StorageOrder`], so the same logical image can be held interleaved
//! (samples adjacent) or planar (one full plane per sample).
//!
//! # Storage
//!
//! The elements are either owned by the buffer (`managed`) or borrowed from
//! the caller (`adopted`). Both behave identically apart from
//! [`PixelBuffer::managed`].

use std::fmt;
use std::io::{Read, Write};

use crate::error::PixelError;
use crate::format::tiff::ByteOrder;

use super::types::{PixelType, Sample};

/// Number of logical axes of a pixel buffer.
pub const AXES: usize = 4;

/// Logical extents, indexed by [`Dim`].
pub type Shape = [usize; AXES];

// =============================================================================
// Dim / StorageOrder
// =============================================================================

/// A logical buffer axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dim {
    X = 0,
    Y = 1,
    Z = 2,
    Sample = 3,
}

impl Dim {
    const ALL: [Dim; AXES] = [Dim::X, Dim::Y, Dim::Z, Dim::Sample];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Physical axis ordering of a buffer, fastest-varying axis first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageOrder {
    order: [Dim; AXES],
}

impl StorageOrder {
    /// Samples adjacent: `[Sample, X, Y, Z]`.
    pub const fn interleaved() -> Self {
        Self {
            order: [Dim::Sample, Dim::X, Dim::Y, Dim::Z],
        }
    }

    /// One full plane per sample: `[X, Y, Z, Sample]`.
    pub const fn planar() -> Self {
        Self {
            order: [Dim::X, Dim::Y, Dim::Z, Dim::Sample],
        }
    }

    /// Pick the interleaved or planar layout.
    pub const fn from_interleaved(interleaved: bool) -> Self {
        if interleaved {
            Self::interleaved()
        } else {
            Self::planar()
        }
    }

    /// Build an order from an explicit permutation.
    pub fn new(order: [Dim; AXES]) -> Result<Self, PixelError> {
        for dim in Dim::ALL {
            if order.iter().filter(|d| **d == dim).count() != 1 {
                return Err(PixelError::InvalidStorageOrder(format!(
                    "{:?} is not a permutation of X, Y, Z, Sample",
                    order
                )));
            }
        }
        Ok(Self { order })
    }

    /// Axes from fastest to slowest.
    pub const fn order(&self) -> [Dim; AXES] {
        self.order
    }

    /// True when samples vary fastest.
    pub fn is_interleaved(&self) -> bool {
        self.order[0] == Dim::Sample
    }

    /// Element strides for `shape`, indexed by [`Dim`].
    pub fn strides(&self, shape: &Shape) -> [usize; AXES] {
        let mut strides = [0; AXES];
        let mut stride = 1;
        for dim in self.order {
            strides[dim.index()] = stride;
            stride *= shape[dim.index()];
        }
        strides
    }
}

impl Default for StorageOrder {
    fn default() -> Self {
        Self::interleaved()
    }
}

/// Physical offsets of every element, visited in logical order
/// (X fastest, then Y, Z and Sample).
fn logical_offsets(shape: Shape, strides: [usize; AXES]) -> impl Iterator<Item = usize> {
    let [sx, sy, sz, ss] = shape;
    (0..ss).flat_map(move |s| {
        (0..sz).flat_map(move |z| {
            (0..sy).flat_map(move |y| {
                (0..sx).map(move |x| {
                    x * strides[0] + y * strides[1] + z * strides[2] + s * strides[3]
                })
            })
        })
    })
}

// =============================================================================
// PixelBuffer
// =============================================================================

enum Storage<'a, T> {
    Managed(Vec<T>),
    Adopted(&'a mut [T]),
}

/// A typed pixel array with explicit logical shape and storage order.
pub struct PixelBuffer<'a, T: Sample> {
    storage: Storage<'a, T>,
    shape: Shape,
    order: StorageOrder,
}

impl<T: Sample> PixelBuffer<'static, T> {
    /// Allocate a zero-filled buffer.
    pub fn new(shape: Shape, order: StorageOrder) -> Self {
        let len = shape.iter().product();
        Self {
            storage: Storage::Managed(vec![T::default(); len]),
            shape,
            order,
        }
    }

    /// Take ownership of `data`, laid out in physical order.
    pub fn from_vec(data: Vec<T>, shape: Shape, order: StorageOrder) -> Result<Self, PixelError> {
        check_len(data.len(), &shape)?;
        Ok(Self {
            storage: Storage::Managed(data),
            shape,
            order,
        })
    }
}

impl<'a, T: Sample> PixelBuffer<'a, T> {
    /// Wrap caller-owned memory without copying.
    pub fn adopt(data: &'a mut [T], shape: Shape, order: StorageOrder) -> Result<Self, PixelError> {
        check_len(data.len(), &shape)?;
        Ok(Self {
            storage: Storage::Adopted(data),
            shape,
            order,
        })
    }

    pub fn pixel_type(&self) -> PixelType {
        T::PIXEL_TYPE
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn storage_order(&self) -> StorageOrder {
        self.order
    }

    pub fn strides(&self) -> [usize; AXES] {
        self.order.strides(&self.shape)
    }

    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// False when the elements are borrowed from the caller.
    pub fn managed(&self) -> bool {
        matches!(self.storage, Storage::Managed(_))
    }

    /// Elements in physical order.
    pub fn data(&self) -> &[T] {
        match &self.storage {
            Storage::Managed(v) => v,
            Storage::Adopted(s) => s,
        }
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        match &mut self.storage {
            Storage::Managed(v) => v,
            Storage::Adopted(s) => s,
        }
    }

    /// Physical offset of a logical coordinate `[x, y, z, sample]`.
    pub fn offset(&self, coords: Shape) -> Option<usize> {
        if coords.iter().zip(self.shape.iter()).any(|(c, s)| c >= s) {
            return None;
        }
        let strides = self.strides();
        Some(coords.iter().zip(strides.iter()).map(|(c, s)| c * s).sum())
    }

    /// Element at a logical coordinate.
    pub fn get(&self, coords: Shape) -> Option<T> {
        self.offset(coords).map(|i| self.data()[i])
    }

    /// Overwrite the element at a logical coordinate.
    pub fn set(&mut self, coords: Shape, value: T) -> Option<()> {
        let i = self.offset(coords)?;
        self.data_mut()[i] = value;
        Some(())
    }

    /// Overwrite every element, in physical order.
    ///
    /// The source must yield exactly `num_elements()` values; on a length
    /// mismatch the buffer is left untouched.
    pub fn assign<I>(&mut self, values: I) -> Result<(), PixelError>
    where
        I: IntoIterator<Item = T>,
    {
        let values: Vec<T> = values.into_iter().collect();
        let expected = self.num_elements();
        if values.len() != expected {
            return Err(PixelError::LengthMismatch {
                expected,
                actual: values.len(),
            });
        }
        self.data_mut().copy_from_slice(&values);
        Ok(())
    }

    /// Copy `other` element by element in logical order.
    ///
    /// Both buffers must have the same shape; their storage orders may differ.
    pub fn copy_from(&mut self, other: &PixelBuffer<'_, T>) -> Result<(), PixelError> {
        if self.shape != other.shape {
            return Err(PixelError::ShapeMismatch {
                expected: self.shape,
                actual: other.shape,
            });
        }
        if self.order == other.order {
            self.data_mut().copy_from_slice(other.data());
            return Ok(());
        }
        let dst_offsets = logical_offsets(self.shape, self.strides());
        let src_offsets = logical_offsets(other.shape, other.strides());
        let src = other.data();
        let dst = self.data_mut();
        for (d, s) in dst_offsets.zip(src_offsets) {
            dst[d] = src[s];
        }
        Ok(())
    }

    /// Fill the buffer from a byte stream in physical order.
    pub fn read_from<R: Read>(&mut self, reader: &mut R, byte_order: ByteOrder) -> Result<(), PixelError> {
        let mut bytes = vec![0u8; self.num_elements() * T::PIXEL_TYPE.bytes_per_pixel()];
        reader.read_exact(&mut bytes)?;
        let mut src = &bytes[..];
        for value in self.data_mut() {
            *value = T::get(&mut src, byte_order);
        }
        Ok(())
    }

    /// Write the buffer to a byte stream in physical order.
    pub fn write_to<W: Write>(&self, writer: &mut W, byte_order: ByteOrder) -> Result<(), PixelError> {
        let mut bytes = Vec::with_capacity(self.num_elements() * T::PIXEL_TYPE.bytes_per_pixel());
        for value in self.data() {
            value.put(&mut bytes, byte_order);
        }
        writer.write_all(&bytes)?;
        Ok(())
    }

    /// Copy the whole X×Y×Z slab of one sample into a new planar buffer.
    pub fn extract_sample(&self, sample: usize) -> Result<PixelBuffer<'static, T>, PixelError> {
        self.check_sample(sample)?;
        let [sx, sy, sz, _] = self.shape;
        let mut out = PixelBuffer::new([sx, sy, sz, 1], StorageOrder::planar());
        let strides = self.strides();
        let base = sample * strides[Dim::Sample.index()];
        let src = self.data();
        for (d, s) in logical_offsets([sx, sy, sz, 1], strides).enumerate() {
            out.data_mut()[d] = src[base + s];
        }
        Ok(out)
    }

    /// Overwrite one sample's slab from a single-sample buffer.
    pub fn insert_sample(&mut self, sample: usize, src: &PixelBuffer<'_, T>) -> Result<(), PixelError> {
        self.check_sample(sample)?;
        let [sx, sy, sz, _] = self.shape;
        let expected = [sx, sy, sz, 1];
        if src.shape != expected {
            return Err(PixelError::ShapeMismatch {
                expected,
                actual: src.shape,
            });
        }
        let strides = self.strides();
        let base = sample * strides[Dim::Sample.index()];
        let src_offsets = logical_offsets(src.shape, src.strides());
        let src_data = src.data();
        let dst = self.data_mut();
        for (d, s) in logical_offsets(expected, strides).zip(src_offsets) {
            dst[base + d] = src_data[s];
        }
        Ok(())
    }

    /// Copy a `width`×`height` rectangle into a new buffer with the same order.
    pub fn region(
        &self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> Result<PixelBuffer<'static, T>, PixelError> {
        let [sx, sy, sz, ss] = self.shape;
        if x + width > sx || y + height > sy {
            return Err(PixelError::RegionOutOfBounds {
                x,
                y,
                width,
                height,
                size_x: sx,
                size_y: sy,
            });
        }
        let mut out = PixelBuffer::new([width, height, sz, ss], self.order);
        let origin = x * self.strides()[Dim::X.index()] + y * self.strides()[Dim::Y.index()];
        let src_offsets = logical_offsets(out.shape, self.strides());
        let dst_offsets = logical_offsets(out.shape, out.strides());
        let src = self.data();
        let dst = out.data_mut();
        for (d, s) in dst_offsets.zip(src_offsets) {
            dst[d] = src[origin + s];
        }
        Ok(out)
    }

    fn check_sample(&self, sample: usize) -> Result<(), PixelError> {
        let samples = self.shape[Dim::Sample.index()];
        if sample >= samples {
            return Err(PixelError::SampleOutOfRange { sample, samples });
        }
        Ok(())
    }
}

fn check_len(len: usize, shape: &Shape) -> Result<(), PixelError> {
    let expected: usize = shape.iter().product();
    if len != expected {
        return Err(PixelError::LengthMismatch {
            expected,
            actual: len,
        });
    }
    Ok(())
}

impl<T: Sample> Clone for PixelBuffer<'_, T> {
    /// Cloning always produces a managed buffer.
    fn clone(&self) -> Self {
        Self {
            storage: Storage::Managed(self.data().to_vec()),
            shape: self.shape,
            order: self.order,
        }
    }
}

impl<T: Sample> PartialEq for PixelBuffer<'_, T> {
    /// Compares extents and logical contents, ignoring storage order.
    fn eq(&self, other: &Self) -> bool {
        if self.shape != other.shape {
            return false;
        }
        if self.order == other.order {
            return self.data() == other.data();
        }
        let a = self.data();
        let b = other.data();
        logical_offsets(self.shape, self.strides())
            .zip(logical_offsets(other.shape, other.strides()))
            .all(|(i, j)| a[i] == b[j])
    }
}

impl<T: Sample> fmt::Debug for PixelBuffer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("pixel_type", &T::PIXEL_TYPE)
            .field("shape", &self.shape)
            .field("order", &self.order)
            .field("managed", &self.managed())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
