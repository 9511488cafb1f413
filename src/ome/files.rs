//! UUID to file discovery.
//!
//! Range records name the file holding their planes by UUID, optionally
//! with a file name relative to the directory of the file being opened.
//! Discovery runs once over the whole document before any plane is
//! resolved, so that every record can then be mapped to a concrete path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::OmeTiffError;
use crate::metadata::{OmeMetadata, TiffData};

use super::warnings::Warnings;

/// UUID under which exports from OMERO register their files.
pub const OMERO_EXPORT_MARKER: &str = "__omero_export";

/// Resolved `UUID → file` table for one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMap {
    current: PathBuf,
    directory: PathBuf,
    /// Keyed by UUID; the empty key stands for records without one
    files: BTreeMap<String, PathBuf>,
}

impl FileMap {
    /// Build the table for `meta` read from `current`.
    ///
    /// A UUID whose file cannot be found falls back to `current` when it is
    /// the document's own UUID, or when the document declares no UUID of
    /// its own. Any other unresolved UUID is an error, as is one UUID bound
    /// to two different files.
    pub fn discover(meta: &OmeMetadata, current: &Path, warnings: &mut Warnings) -> Result<Self, OmeTiffError> {
        let current = canonical(current);
        let directory = current.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut map = Self {
            current,
            directory,
            files: BTreeMap::new(),
        };

        for image in &meta.images {
            for td in &image.pixels.tiff_data {
                let (key, file) = match &td.uuid {
                    None => (String::new(), map.current.clone()),
                    Some(uuid) => {
                        let file = match uuid.file_name.as_deref().and_then(|name| map.locate(name)) {
                            Some(found) => found,
                            None => map.fallback(&uuid.value, uuid.file_name.as_deref(), meta, warnings)?,
                        };
                        (uuid.value.clone(), file)
                    }
                };

                match map.files.get(&key) {
                    None => {
                        debug!(uuid = %key, file = %file.display(), "Registered dataset file");
                        map.files.insert(key, file);
                    }
                    Some(existing) if *existing != file => {
                        return Err(OmeTiffError::InconsistentUuid {
                            uuid: key,
                            first: existing.display().to_string(),
                            second: file.display().to_string(),
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(map)
    }

    /// A table holding only the file being opened.
    pub fn single(current: &Path) -> Self {
        let current = canonical(current);
        let directory = current.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut files = BTreeMap::new();
        files.insert(String::new(), current.clone());
        Self {
            current,
            directory,
            files,
        }
    }

    /// Find `name` next to the current file. Absolute names that no longer
    /// exist are retried by their final component.
    fn locate(&self, name: &str) -> Option<PathBuf> {
        let candidate = self.directory.join(name);
        if candidate.is_file() {
            return Some(canonical(&candidate));
        }
        let base = Path::new(name).file_name()?;
        let relative = self.directory.join(base);
        if relative.is_file() {
            Some(canonical(&relative))
        } else {
            None
        }
    }

    fn fallback(
        &self,
        uuid: &str,
        file_name: Option<&str>,
        meta: &OmeMetadata,
        warnings: &mut Warnings,
    ) -> Result<PathBuf, OmeTiffError> {
        match meta.uuid.as_deref() {
            Some(own) if own == uuid || own.is_empty() => Ok(self.current.clone()),
            Some(_) => Err(OmeTiffError::UnresolvedFile {
                uuid: uuid.to_string(),
                path: file_name.unwrap_or_default().to_string(),
            }),
            None => {
                warnings.push(format!(
                    "Unmatched filename for UUID '{}'; falling back to current file '{}' (which lacks a UUID)",
                    uuid,
                    self.current.display()
                ));
                Ok(self.current.clone())
            }
        }
    }

    /// File being opened.
    pub fn current(&self) -> &Path {
        &self.current
    }

    /// Directory relative file names are resolved against.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File holding the planes of `td`.
    pub fn resolve(&self, td: &TiffData) -> &Path {
        let key = td.uuid.as_ref().map_or("", |u| u.value.as_str());
        self.files.get(key).map_or(self.current.as_path(), PathBuf::as_path)
    }

    /// Distinct files in path order.
    pub fn used_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self.files.values().cloned().collect();
        if files.is_empty() {
            files.push(self.current.clone());
        }
        files.sort();
        files.dedup();
        files
    }

    pub fn contains_uuid(&self, uuid: &str) -> bool {
        self.files.contains_key(uuid)
    }

    /// True for datasets exported from OMERO.
    pub fn is_omero_export(&self) -> bool {
        self.contains_uuid(OMERO_EXPORT_MARKER)
    }
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

// =============================================================================
// Tests
// =============================================================================
