//! Metadata model and derived core metadata.
//!
//! [`OmeMetadata`] is the declarative document stored inside the files;
//! [`CoreMetadata`] is what the reader derives from it and from the
//! directories it points at, one per series and resolution.

mod core_metadata;
mod model;

pub use core_metadata::CoreMetadata;
pub use model::{Channel, Image, OmeMetadata, Pixels, ResolutionSize, TiffData, UuidRef, MAX_PLANE_COUNT};
