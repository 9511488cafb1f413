//! OME-TIFF reader.
//!
//! [`OmeTiffReader`] opens any file of a dataset, parses the metadata
//! document embedded in its first directory, resolves every plane of every
//! series to a file and directory, and then serves pixel data through
//! series and resolution cursors.
//!
//! # Example
//!
//! ```rust,no_run
//! use ometiff::ome::OmeTiffReader;
//!
//! let mut reader = OmeTiffReader::new();
//! reader.open("dataset.ome.tif")?;
//! for series in 0..reader.series_count()? {
//!     reader.set_series(series)?;
//!     let plane = reader.read_plane(0)?;
//!     println!("series {}: {:?}", series, plane.shape());
//! }
//! # Ok::<(), ometiff::error::OmeTiffError>(())
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::ReaderOptions;
use crate::dimension::{ZctCoords, ZctModuloCoords};
use crate::error::{MetadataError, OmeTiffError};
use crate::format::tiff::{Directory, TiffFile};
use crate::metadata::{CoreMetadata, Image, OmeMetadata};
use crate::pixel::{PixelType, StorageOrder, VariantPixelBuffer};

use super::cache::TiffCache;
use super::files::FileMap;
use super::plane::OmeTiffPlane;
use super::resolver::{plane_directory, PlaneResolver, SeriesTable};
use super::warnings::Warnings;

/// Everything known about the open dataset.
struct ReaderState {
    path: PathBuf,
    metadata: OmeMetadata,
    files: FileMap,
    series: Vec<SeriesTable>,
    current_series: usize,
    current_resolution: usize,
    warnings: Warnings,
}

impl ReaderState {
    fn table(&self) -> &SeriesTable {
        &self.series[self.current_series]
    }

    fn core(&self) -> &CoreMetadata {
        &self.table().resolutions[self.current_resolution]
    }
}

/// Reader for single- and multi-file OME-TIFF datasets.
pub struct OmeTiffReader {
    options: ReaderOptions,
    cache: TiffCache,
    state: Option<ReaderState>,
}

impl OmeTiffReader {
    pub fn new() -> Self {
        Self::with_options(ReaderOptions::default())
    }

    pub fn with_options(options: ReaderOptions) -> Self {
        Self {
            cache: TiffCache::with_capacity(options.handle_cache_capacity),
            options,
            state: None,
        }
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Open the dataset containing `path`.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<(), OmeTiffError> {
        if let Some(state) = &self.state {
            return Err(OmeTiffError::AlreadyOpen(state.path.display().to_string()));
        }
        self.options.validate().map_err(OmeTiffError::InvalidOption)?;

        let path = std::fs::canonicalize(path.as_ref()).unwrap_or_else(|_| path.as_ref().to_path_buf());
        let file = self.cache.get(&path)?;
        let description = file
            .directory(0)?
            .image_description
            .ok_or_else(|| MetadataError::InvalidValue {
                field: "ImageDescription",
                message: "first directory carries no metadata".to_string(),
            })?;
        let metadata = OmeMetadata::from_json(&description)?;
        debug!(file = %path.display(), images = metadata.image_count(), "Parsed embedded metadata");

        let mut warnings = Warnings::new();
        let files = FileMap::discover(&metadata, &path, &mut warnings)?;
        let series = PlaneResolver::new(&metadata, &files, &self.cache, &mut warnings).resolve()?;

        info!(
            file = %path.display(),
            series = series.len(),
            files = files.used_files().len(),
            warnings = warnings.len(),
            "Opened OME-TIFF dataset"
        );

        self.state = Some(ReaderState {
            path,
            metadata,
            files,
            series,
            current_series: 0,
            current_resolution: 0,
            warnings,
        });
        Ok(())
    }

    /// Close the dataset and drop every cached file handle.
    pub fn close(&mut self) {
        if let Some(state) = self.state.take() {
            debug!(file = %state.path.display(), "Closed OME-TIFF dataset");
        }
        self.cache.clear();
    }

    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    fn state(&self) -> Result<&ReaderState, OmeTiffError> {
        self.state.as_ref().ok_or(OmeTiffError::NotOpen)
    }

    fn state_mut(&mut self) -> Result<&mut ReaderState, OmeTiffError> {
        self.state.as_mut().ok_or(OmeTiffError::NotOpen)
    }

    // -------------------------------------------------------------------------
    // Metadata
    // -------------------------------------------------------------------------

    /// The embedded metadata document as parsed.
    pub fn metadata(&self) -> Result<&OmeMetadata, OmeTiffError> {
        Ok(&self.state()?.metadata)
    }

    /// Metadata image backing the current series.
    pub fn image(&self) -> Result<&Image, OmeTiffError> {
        let state = self.state()?;
        Ok(state.metadata.image(state.table().image)?)
    }

    /// Recovered inconsistencies, in the order they were found.
    pub fn warnings(&self) -> Result<&[String], OmeTiffError> {
        Ok(self.state()?.warnings.messages())
    }

    // -------------------------------------------------------------------------
    // Cursors
    // -------------------------------------------------------------------------

    pub fn series_count(&self) -> Result<usize, OmeTiffError> {
        Ok(self.state()?.series.len())
    }

    /// Select a series. The resolution cursor goes back to full resolution.
    pub fn set_series(&mut self, series: usize) -> Result<(), OmeTiffError> {
        let state = self.state_mut()?;
        if series >= state.series.len() {
            return Err(OmeTiffError::InvalidCursor {
                what: "series",
                value: series,
                limit: state.series.len(),
            });
        }
        state.current_series = series;
        state.current_resolution = 0;
        Ok(())
    }

    pub fn series(&self) -> Result<usize, OmeTiffError> {
        Ok(self.state()?.current_series)
    }

    pub fn resolution_count(&self) -> Result<usize, OmeTiffError> {
        Ok(self.state()?.table().resolution_count())
    }

    pub fn set_resolution(&mut self, resolution: usize) -> Result<(), OmeTiffError> {
        let state = self.state_mut()?;
        let count = state.table().resolution_count();
        if resolution >= count {
            return Err(OmeTiffError::InvalidCursor {
                what: "resolution",
                value: resolution,
                limit: count,
            });
        }
        state.current_resolution = resolution;
        Ok(())
    }

    pub fn resolution(&self) -> Result<usize, OmeTiffError> {
        Ok(self.state()?.current_resolution)
    }

    /// Core metadata of the current series at the current resolution.
    pub fn core_metadata(&self) -> Result<&CoreMetadata, OmeTiffError> {
        Ok(self.state()?.core())
    }

    /// Core metadata of every series and resolution.
    pub fn core_metadata_list(&self) -> Result<Vec<Vec<&CoreMetadata>>, OmeTiffError> {
        Ok(self
            .state()?
            .series
            .iter()
            .map(|table| table.resolutions.iter().collect())
            .collect())
    }

    /// Plane locations of the current series.
    pub fn planes(&self) -> Result<&[OmeTiffPlane], OmeTiffError> {
        Ok(&self.state()?.table().planes)
    }

    pub fn image_count(&self) -> Result<usize, OmeTiffError> {
        Ok(self.state()?.core().image_count)
    }

    // -------------------------------------------------------------------------
    // Index arithmetic
    // -------------------------------------------------------------------------

    pub fn get_index(&self, z: usize, c: usize, t: usize) -> Result<usize, OmeTiffError> {
        Ok(self.state()?.core().get_index(z, c, t)?)
    }

    pub fn get_zct_coords(&self, index: usize) -> Result<ZctCoords, OmeTiffError> {
        Ok(self.state()?.core().get_zct_coords(index)?)
    }

    pub fn get_index_modulo(&self, coords: ZctModuloCoords) -> Result<usize, OmeTiffError> {
        Ok(self.state()?.core().get_index_modulo(coords)?)
    }

    pub fn get_zct_modulo_coords(&self, index: usize) -> Result<ZctModuloCoords, OmeTiffError> {
        Ok(self.state()?.core().get_zct_modulo_coords(index)?)
    }

    // -------------------------------------------------------------------------
    // Pixels
    // -------------------------------------------------------------------------

    /// Locate `plane` of the current series at the current resolution.
    fn locate(&self, plane: usize) -> Result<(Arc<TiffFile>, Directory), OmeTiffError> {
        let state = self.state()?;
        let table = state.table();
        let core = state.core();
        let count = core.image_count.min(table.planes.len());
        if plane >= count {
            return Err(OmeTiffError::InvalidCursor {
                what: "plane",
                value: plane,
                limit: count,
            });
        }
        let entry = &table.planes[plane];
        if !entry.is_present() {
            return Err(OmeTiffError::MissingPlane {
                series: state.current_series,
                plane,
            });
        }
        let resolution = core.sub_resolution_offset.unwrap_or(0);
        plane_directory(&self.cache, entry, state.current_series, plane, resolution)
    }

    /// Decode a whole plane of the current series and resolution.
    ///
    /// The buffer is shaped `[sizeX, sizeY, 1, samples]` in the storage
    /// order of the plane on disk.
    pub fn read_plane(&self, plane: usize) -> Result<VariantPixelBuffer<'static>, OmeTiffError> {
        let (file, dir) = self.locate(plane)?;
        Ok(file.read_image(&dir)?)
    }

    /// Decode a rectangle of a plane.
    pub fn read_plane_region(
        &self,
        plane: usize,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<VariantPixelBuffer<'static>, OmeTiffError> {
        let (file, dir) = self.locate(plane)?;
        Ok(file.read_region(&dir, x, y, width, height)?)
    }

    /// Decode a plane into a caller-provided buffer of the same type and
    /// shape; its storage order may differ from the plane's.
    pub fn read_plane_into(&self, plane: usize, buffer: &mut VariantPixelBuffer<'_>) -> Result<(), OmeTiffError> {
        let (file, dir) = self.locate(plane)?;
        file.read_image_into(&dir, buffer)?;
        Ok(())
    }

    /// The palette of an indexed plane as a `[entries, 1, 1, 3]` buffer of
    /// red, green and blue values. `None` for planes without one.
    pub fn lookup_table(&self, plane: usize) -> Result<Option<VariantPixelBuffer<'static>>, OmeTiffError> {
        let (_, dir) = self.locate(plane)?;
        let indexed = dir.is_indexed();
        let Some(colormap) = dir.colormap.filter(|_| indexed) else {
            return Ok(None);
        };
        let entries = colormap.len() / 3;
        let mut table = VariantPixelBuffer::new([entries, 1, 1, 3], PixelType::Uint16, StorageOrder::planar());
        table.assign(colormap.into_iter().take(entries * 3))?;
        Ok(Some(table))
    }

    // -------------------------------------------------------------------------
    // Files
    // -------------------------------------------------------------------------

    /// The file the dataset was opened from.
    pub fn current_file(&self) -> Result<&Path, OmeTiffError> {
        Ok(&self.state()?.path)
    }

    /// Every file of the dataset, in path order.
    ///
    /// With `no_pixels`, only files that carry metadata but no pixel data;
    /// OME-TIFF datasets keep metadata inside the TIFF files, so that list
    /// is empty.
    pub fn used_files(&self, no_pixels: bool) -> Result<Vec<PathBuf>, OmeTiffError> {
        let state = self.state()?;
        if no_pixels {
            return Ok(Vec::new());
        }
        let mut files: Vec<PathBuf> = state
            .series
            .iter()
            .flat_map(|table| table.used_files())
            .map(Path::to_path_buf)
            .collect();
        files.push(state.files.current().to_path_buf());
        files.sort();
        files.dedup();
        Ok(files)
    }

    /// Files holding planes of the current series.
    pub fn series_used_files(&self, no_pixels: bool) -> Result<Vec<PathBuf>, OmeTiffError> {
        let state = self.state()?;
        if no_pixels {
            return Ok(Vec::new());
        }
        Ok(state
            .table()
            .used_files()
            .into_iter()
            .map(Path::to_path_buf)
            .collect())
    }

    /// True when the whole dataset lives in one file.
    pub fn is_single_file(&self) -> Result<bool, OmeTiffError> {
        Ok(self.used_files(false)?.len() == 1)
    }
}

impl Default for OmeTiffReader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
