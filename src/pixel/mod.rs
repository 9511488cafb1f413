//! Pixel data model.
//!
//! - [`PixelType`] names the eleven supported element types.
//! - [`PixelBuffer`] is a typed `[X, Y, Z, Sample]` array with an explicit
//!   [`StorageOrder`].
//! - [`VariantPixelBuffer`] erases the element type behind an exhaustive enum
//!   and is what the reader and writer exchange.

mod buffer;
mod types;
mod variant;

pub use buffer::{Dim, PixelBuffer, Shape, StorageOrder, AXES};
pub use types::{Complex, PixelType, Sample};
pub use variant::VariantPixelBuffer;
