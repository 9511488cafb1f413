//! Plane location records.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Whether a plane's pixel data can be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaneStatus {
    /// No range record has assigned a location yet
    #[default]
    Unknown,
    /// Location assigned and the file is a readable TIFF
    Present,
    /// Location assigned (or cleared) but no data is available
    Absent,
}

/// Where one plane of a series is stored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct OmeTiffPlane {
    /// File holding the plane; `None` until a location is assigned
    pub file: Option<PathBuf>,
    /// Directory index within `file`
    pub ifd: usize,
    /// Set by an explicit range record, as opposed to fill-forward
    pub certain: bool,
    pub status: PlaneStatus,
}

impl OmeTiffPlane {
    /// A plane stored at directory `ifd` of `file`.
    pub fn located(file: impl Into<PathBuf>, ifd: usize, certain: bool, status: PlaneStatus) -> Self {
        Self {
            file: Some(file.into()),
            ifd,
            certain,
            status,
        }
    }

    /// The writer's initial state: expected but not yet written.
    pub fn pending() -> Self {
        Self {
            file: None,
            ifd: 0,
            certain: true,
            status: PlaneStatus::Absent,
        }
    }

    pub fn is_present(&self) -> bool {
        self.status == PlaneStatus::Present
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Drop the location, leaving an absent plane.
    pub fn clear(&mut self) {
        self.file = None;
        self.ifd = 0;
        self.status = PlaneStatus::Absent;
    }
}
