//! OME-TIFF datasets on top of the TIFF codec.
//!
//! - [`OmeTiffReader`] resolves every plane of every series to a file and
//!   directory, repairing inconsistent metadata where it safely can.
//! - [`OmeTiffWriter`] writes planes in order across one or more files and
//!   embeds the completed metadata when closed.
//!
//! The remaining modules are the building blocks both share: the plane
//! table, UUID file discovery, the repair heuristics and the handle cache.

mod cache;
mod files;
mod plane;
mod reader;
mod repair;
mod resolver;
mod warnings;
mod writer;

pub use cache::{TiffCache, DEFAULT_HANDLE_CACHE_CAPACITY};
pub use files::{FileMap, OMERO_EXPORT_MARKER};
pub use plane::{OmeTiffPlane, PlaneStatus};
pub use reader::OmeTiffReader;
pub use repair::{fix_dimensions, fix_exporter_order, fix_image_counts, infer_channels, repair, ExporterHints};
pub use resolver::{check_sub_resolution, ingest_range_records, plane_directory, PlaneResolver, SeriesTable};
pub use warnings::Warnings;
pub use writer::OmeTiffWriter;
