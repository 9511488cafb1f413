//! Consistency repair of declared metadata.
//!
//! Each repair is a deterministic function of already ingested metadata and
//! returns whether it changed anything. Running a repair on its own output
//! changes nothing.

use crate::dimension::DimensionOrder;
use crate::metadata::{CoreMetadata, Pixels};

use super::warnings::Warnings;

/// Signals used to recognise datasets from exporters known to write the
/// wrong dimension order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExporterHints {
    /// Number of range records declared for the series
    pub tiff_data_count: usize,
    /// The first channel carries a name
    pub first_channel_named: bool,
    /// The dataset's file table contains the OMERO export marker
    pub omero_export: bool,
}

impl ExporterHints {
    pub fn from_pixels(pixels: &Pixels, omero_export: bool) -> Self {
        Self {
            tiff_data_count: pixels.tiff_data.len(),
            first_channel_named: pixels
                .channels
                .first()
                .and_then(|c| c.name.as_deref())
                .is_some_and(|name| !name.is_empty()),
            omero_export,
        }
    }
}

/// Per-channel sample counts of a series.
///
/// Series without channel elements get one single-sample channel per
/// declared `size_c`.
pub fn infer_channels(pixels: &Pixels, series: usize, warnings: &mut Warnings) -> Vec<usize> {
    if pixels.channels.is_empty() {
        let count = pixels.size_c.max(1);
        warnings.push(format!(
            "Channel element(s) are missing for series {}: Falling back to {} channel(s) of 1 sample each",
            series, count
        ));
    }
    pixels.channel_samples()
}

/// Collapse a single-plane series whose Z, T or channel sizes claim more.
///
/// The remaining channel keeps the total sample count.
pub fn fix_image_counts(core: &mut CoreMetadata, series: usize, warnings: &mut Warnings) -> bool {
    if core.image_count != 1 || (core.size_z == 1 && core.size_t == 1 && core.size_c.len() == 1) {
        return false;
    }
    warnings.push(format!(
        "Correcting image count mismatch for series {}: SizeZ={}, SizeT={}, channels={}",
        series,
        core.size_z,
        core.size_t,
        core.size_c.len()
    ));
    let samples = core.total_size_c().max(1);
    core.size_z = 1;
    core.size_t = 1;
    core.size_c = vec![samples];
    true
}

/// Pick the single axis that accounts for the plane count when the
/// declared sizes need more planes than there are.
///
/// Only applies when no channel carries more than one sample.
pub fn fix_dimensions(core: &mut CoreMetadata, series: usize, warnings: &mut Warnings) -> bool {
    let channels = core.total_size_c();
    let image_count = core.image_count;
    if image_count == 0
        || core.size_z * core.size_t * channels <= image_count
        || channels != core.size_c.len()
    {
        return false;
    }

    let (z, t, c) = (core.size_z, core.size_t, channels);
    if z == image_count {
        core.size_t = 1;
        core.size_c = vec![1];
    } else if t == image_count {
        core.size_z = 1;
        core.size_c = vec![1];
    } else if c == image_count {
        core.size_z = 1;
        core.size_t = 1;
    } else {
        core.size_z = 1;
        core.size_t = image_count;
        core.size_c = vec![1];
    }
    warnings.push(format!(
        "Inferred dimensions for series {} from {} planes: Z={}->{}, T={}->{}, C={}->{}",
        series,
        image_count,
        z,
        core.size_z,
        t,
        core.size_t,
        c,
        core.size_c.len()
    ));
    true
}

/// Force XYZCT for OMERO exports, which record a different order than
/// the one their planes are stored in.
pub fn fix_exporter_order(
    core: &mut CoreMetadata,
    hints: ExporterHints,
    series: usize,
    warnings: &mut Warnings,
) -> bool {
    if hints.tiff_data_count == 0
        || !hints.first_channel_named
        || !hints.omero_export
        || core.dimension_order == DimensionOrder::XYZCT
    {
        return false;
    }
    warnings.push(format!(
        "Series {} was exported by OMERO: replacing dimension order {} with XYZCT",
        series, core.dimension_order
    ));
    core.dimension_order = DimensionOrder::XYZCT;
    true
}

/// Run every repair in order. Returns whether anything changed.
pub fn repair(core: &mut CoreMetadata, hints: ExporterHints, series: usize, warnings: &mut Warnings) -> bool {
    let collapsed = fix_image_counts(core, series, warnings);
    let reordered = fix_exporter_order(core, hints, series, warnings);
    let inferred = fix_dimensions(core, series, warnings);
    collapsed || reordered || inferred
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Channel;
    use crate::pixel::PixelType;

    fn core(z: usize, t: usize, c: Vec<usize>, image_count: usize) -> CoreMetadata {
        CoreMetadata {
            size_z: z,
            size_t: t,
            size_c: c,
            image_count,
            ..CoreMetadata::default()
        }
    }

    // -------------------------------------------------------------------------
    // Channel inference
    // -------------------------------------------------------------------------

    #[test]
    fn test_infer_channels_without_elements() {
        let mut pixels = Pixels::new(4, 4, PixelType::Uint8);
        pixels.size_c = 3;
        let mut warnings = Warnings::new();
        assert_eq!(infer_channels(&pixels, 0, &mut warnings), vec![1, 1, 1]);
        assert!(warnings.contains("Falling back to 3 channel(s) of 1 sample each"));
    }

    #[test]
    fn test_infer_channels_from_elements() {
        let mut pixels = Pixels::new(4, 4, PixelType::Uint8);
        pixels.size_c = 4;
        pixels.channels = vec![Channel::new("c0", 3), Channel::new("c1", 1)];
        let mut warnings = Warnings::new();
        assert_eq!(infer_channels(&pixels, 0, &mut warnings), vec![3, 1]);
        assert!(warnings.is_empty());
    }

    // -------------------------------------------------------------------------
    // Image-count collapse
    // -------------------------------------------------------------------------

    #[test]
    fn test_collapse_single_plane() {
        let mut c = core(5, 2, vec![1, 1, 1], 1);
        let mut warnings = Warnings::new();
        assert!(fix_image_counts(&mut c, 0, &mut warnings));
        assert_eq!((c.size_z, c.size_t, c.size_c.clone()), (1, 1, vec![3]));
        assert!(warnings.contains("Correcting image count mismatch"));
        assert!(!fix_image_counts(&mut c, 0, &mut warnings));
    }

    #[test]
    fn test_collapse_ignores_consistent_series() {
        let mut c = core(1, 1, vec![3], 1);
        assert!(!fix_image_counts(&mut c, 0, &mut Warnings::new()));
        let mut c = core(2, 1, vec![1], 2);
        assert!(!fix_image_counts(&mut c, 0, &mut Warnings::new()));
    }

    // -------------------------------------------------------------------------
    // Dimension inference
    // -------------------------------------------------------------------------

    #[test]
    fn test_dimensions_z_matches() {
        let mut c = core(4, 3, vec![1, 1], 4);
        assert!(fix_dimensions(&mut c, 0, &mut Warnings::new()));
        assert_eq!((c.size_z, c.size_t, c.size_c.clone()), (4, 1, vec![1]));
    }

    #[test]
    fn test_dimensions_t_matches() {
        let mut c = core(4, 3, vec![1], 3);
        assert!(fix_dimensions(&mut c, 0, &mut Warnings::new()));
        assert_eq!((c.size_z, c.size_t, c.size_c.clone()), (1, 3, vec![1]));
    }

    #[test]
    fn test_dimensions_c_matches() {
        let mut c = core(4, 3, vec![1, 1], 2);
        assert!(fix_dimensions(&mut c, 0, &mut Warnings::new()));
        assert_eq!((c.size_z, c.size_t, c.size_c.clone()), (1, 1, vec![1, 1]));
    }

    #[test]
    fn test_dimensions_default_to_t() {
        let mut c = core(4, 3, vec![1, 1], 5);
        assert!(fix_dimensions(&mut c, 0, &mut Warnings::new()));
        assert_eq!((c.size_z, c.size_t, c.size_c.clone()), (1, 5, vec![1]));
    }

    #[test]
    fn test_dimensions_skip_multi_sample_channels() {
        let mut c = core(4, 1, vec![3], 2);
        assert!(!fix_dimensions(&mut c, 0, &mut Warnings::new()));
        assert_eq!(c.size_z, 4);
    }

    // -------------------------------------------------------------------------
    // Exporter correction
    // -------------------------------------------------------------------------

    #[test]
    fn test_exporter_order_requires_all_signals() {
        let hints = ExporterHints {
            tiff_data_count: 1,
            first_channel_named: true,
            omero_export: true,
        };
        let mut c = core(2, 2, vec![1], 4);
        c.dimension_order = DimensionOrder::XYTZC;
        assert!(fix_exporter_order(&mut c, hints, 0, &mut Warnings::new()));
        assert_eq!(c.dimension_order, DimensionOrder::XYZCT);

        let mut c = core(2, 2, vec![1], 4);
        c.dimension_order = DimensionOrder::XYTZC;
        let unnamed = ExporterHints {
            first_channel_named: false,
            ..hints
        };
        assert!(!fix_exporter_order(&mut c, unnamed, 0, &mut Warnings::new()));
        assert_eq!(c.dimension_order, DimensionOrder::XYTZC);
    }

    // -------------------------------------------------------------------------
    // Idempotence
    // -------------------------------------------------------------------------

    #[test]
    fn test_repair_is_idempotent() {
        let hints = ExporterHints {
            tiff_data_count: 2,
            first_channel_named: true,
            omero_export: true,
        };
        let cases = vec![
            core(5, 2, vec![1, 1, 1], 1),
            core(4, 3, vec![1, 1], 4),
            core(4, 3, vec![1, 1], 7),
            core(2, 2, vec![1, 3], 12),
            core(3, 1, vec![1], 3),
        ];
        for mut c in cases {
            repair(&mut c, hints, 0, &mut Warnings::new());
            let once = c.clone();
            assert!(!repair(&mut c, hints, 0, &mut Warnings::new()));
            assert_eq!(c, once);
        }
    }
}
