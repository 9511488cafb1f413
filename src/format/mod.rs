//! Container formats.
//!
//! OME-TIFF stores its pixels in ordinary TIFF or BigTIFF files; the codec
//! for those lives in [`tiff`].

pub mod tiff;
