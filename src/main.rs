//! ometiff - inspect and write OME-TIFF datasets.
//!
//! `ometiff info` opens a dataset with the reader and prints what the plane
//! resolver made of it. `ometiff write` produces a synthetic dataset through
//! the writer, optionally spread over several files.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ometiff::{
    config::{Cli, Command, InfoConfig, WriteConfig},
    error::{OmeTiffError, PixelError},
    metadata::{Channel, Image, OmeMetadata, Pixels, ResolutionSize},
    ome::{OmeTiffReader, OmeTiffWriter},
    pixel::{Complex, PixelType, Shape, VariantPixelBuffer},
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Info(config) => run_info(config),
        Command::Write(config) => run_write(config),
    }
}

// =============================================================================
// Info Command
// =============================================================================

fn run_info(config: InfoConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let mut reader = OmeTiffReader::with_options(config.reader_options());
    if let Err(e) = reader.open(&config.file) {
        error!("Failed to open {}: {}", config.file.display(), e);
        return ExitCode::FAILURE;
    }

    let report = if config.json {
        json_report(&mut reader, &config).and_then(|value| {
            serde_json::to_string_pretty(&value).map_err(|e| OmeTiffError::InvalidOption(e.to_string()))
        })
    } else {
        text_report(&mut reader, &config)
    };

    match report {
        Ok(text) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to inspect {}: {}", config.file.display(), e);
            ExitCode::FAILURE
        }
    }
}

/// Series to report on: the requested one, or all of them.
fn selected_series(reader: &OmeTiffReader, config: &InfoConfig) -> Result<Vec<usize>, OmeTiffError> {
    let count = reader.series_count()?;
    match config.series {
        Some(series) if series >= count => Err(OmeTiffError::InvalidCursor {
            what: "series",
            value: series,
            limit: count,
        }),
        Some(series) => Ok(vec![series]),
        None => Ok((0..count).collect()),
    }
}

fn text_report(reader: &mut OmeTiffReader, config: &InfoConfig) -> Result<String, OmeTiffError> {
    let mut out = Vec::new();
    for series in selected_series(reader, config)? {
        reader.set_series(series)?;
        out.push(format!("Series {} ({})", series, reader.image()?.id));
        for resolution in 0..reader.resolution_count()? {
            reader.set_resolution(resolution)?;
            let core = reader.core_metadata()?;
            out.push(format!(
                "  Resolution {}: {}x{}, Z={} C={:?} T={}, {} ({} bits), {}, {} planes{}{}",
                resolution,
                core.size_x,
                core.size_y,
                core.size_z,
                core.size_c,
                core.size_t,
                core.pixel_type,
                core.bits_per_pixel,
                core.dimension_order,
                core.image_count,
                if core.interleaved { ", interleaved" } else { "" },
                if core.indexed { ", indexed" } else { "" },
            ));
        }
        reader.set_resolution(0)?;

        if config.planes {
            for (index, plane) in reader.planes()?.iter().enumerate() {
                let file = plane
                    .file()
                    .map_or_else(|| "-".to_string(), |f| f.display().to_string());
                out.push(format!(
                    "  Plane {}: {} IFD {} ({:?}{})",
                    index,
                    file,
                    plane.ifd,
                    plane.status,
                    if plane.certain { "" } else { ", inferred" },
                ));
            }
        }
    }

    out.push("Files:".to_string());
    for file in reader.used_files(config.no_pixels)? {
        out.push(format!("  {}", file.display()));
    }

    let warnings = reader.warnings()?;
    if !warnings.is_empty() {
        out.push("Warnings:".to_string());
        for warning in warnings {
            out.push(format!("  {}", warning));
        }
    }
    Ok(out.join("\n"))
}

fn json_report(reader: &mut OmeTiffReader, config: &InfoConfig) -> Result<serde_json::Value, OmeTiffError> {
    let mut series_list = Vec::new();
    for series in selected_series(reader, config)? {
        reader.set_series(series)?;
        let resolutions: Vec<_> = reader
            .core_metadata_list()?
            .into_iter()
            .nth(series)
            .unwrap_or_default();
        let resolutions =
            serde_json::to_value(resolutions).map_err(|e| OmeTiffError::InvalidOption(e.to_string()))?;
        let planes = if config.planes {
            serde_json::to_value(reader.planes()?).map_err(|e| OmeTiffError::InvalidOption(e.to_string()))?
        } else {
            serde_json::Value::Null
        };
        series_list.push(serde_json::json!({
            "series": series,
            "image": reader.image()?.id,
            "resolutions": resolutions,
            "planes": planes,
            "files": reader.series_used_files(config.no_pixels)?,
        }));
    }

    Ok(serde_json::json!({
        "file": reader.current_file()?,
        "series": series_list,
        "files": reader.used_files(config.no_pixels)?,
        "single_file": reader.is_single_file()?,
        "warnings": reader.warnings()?,
    }))
}

// =============================================================================
// Write Command
// =============================================================================

fn run_write(config: WriteConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    match write_dataset(&config) {
        Ok(files) => {
            info!("Wrote {} file(s)", files.len());
            for file in files {
                println!("{}", file.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to write {}: {}", config.output.display(), e);
            ExitCode::FAILURE
        }
    }
}

/// Metadata for the synthetic dataset described by `config`.
fn synthetic_metadata(config: &WriteConfig) -> OmeMetadata {
    let mut pixels = Pixels::new(config.size_x, config.size_y, config.pixel_type);
    pixels.dimension_order = config.dimension_order;
    pixels.size_z = config.size_z;
    pixels.size_t = config.size_t;
    pixels.size_c = config.size_c * config.samples as usize;
    pixels.channels = (0..config.size_c)
        .map(|c| Channel::new(format!("Channel:0:{}", c), config.samples))
        .collect();
    pixels.resolutions = (1..config.resolutions)
        .map(|r| ResolutionSize {
            size_x: (config.size_x >> r).max(1),
            size_y: (config.size_y >> r).max(1),
        })
        .collect();
    OmeMetadata {
        uuid: None,
        images: vec![Image::new("Image:0", pixels)],
    }
}

/// `out.ome.tif` for the first file, `out_1.ome.tif` and so on after it.
fn output_path(output: &Path, index: usize) -> PathBuf {
    if index == 0 {
        return output.to_path_buf();
    }
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let renamed = match name.split_once('.') {
        Some((stem, extension)) => format!("{}_{}.{}", stem, index, extension),
        None => format!("{}_{}", name, index),
    };
    output.with_file_name(renamed)
}

fn write_dataset(config: &WriteConfig) -> Result<Vec<PathBuf>, OmeTiffError> {
    let metadata = synthetic_metadata(config);
    let pixels = metadata.images[0].pixels.clone();
    let sizes: Vec<(u32, u32)> = std::iter::once((pixels.size_x, pixels.size_y))
        .chain(pixels.resolutions.iter().map(|r| (r.size_x, r.size_y)))
        .collect();
    let paths: Vec<PathBuf> = (0..config.files).map(|i| output_path(&config.output, i)).collect();

    let mut writer = OmeTiffWriter::with_options(config.writer_options());
    writer.set_metadata(metadata)?;
    writer.set_id(&paths[0])?;

    for plane in 0..pixels.plane_count() {
        writer.change_output_file(&paths[plane % paths.len()])?;
        writer.set_plane(plane)?;
        for (resolution, &(width, height)) in sizes.iter().enumerate() {
            writer.set_resolution(resolution)?;
            let shape = [width as usize, height as usize, 1, config.samples as usize];
            writer.save_bytes(&gradient(shape, pixels.pixel_type, plane)?)?;
        }
    }
    writer.close()?;
    Ok(paths)
}

/// A diagonal ramp offset by the plane index.
fn gradient(shape: Shape, pixel_type: PixelType, plane: usize) -> Result<VariantPixelBuffer<'static>, PixelError> {
    let mut buffer = VariantPixelBuffer::with_type(shape, pixel_type);
    let [width, height, _, samples] = shape;
    let level = move |i: usize| {
        let pixel = i / samples.max(1);
        (pixel % width.max(1) + pixel / width.max(1) % height.max(1) + plane * 16 + i % samples.max(1)) as f64
    };
    let count = buffer.num_elements();
    let values = (0..count).map(level);
    match pixel_type {
        PixelType::Int8 => buffer.assign(values.map(|v| (v as i64 % 128) as i8)),
        PixelType::Int16 => buffer.assign(values.map(|v| v as i16)),
        PixelType::Int32 => buffer.assign(values.map(|v| v as i32)),
        PixelType::Uint8 => buffer.assign(values.map(|v| (v as u64 % 256) as u8)),
        PixelType::Uint16 => buffer.assign(values.map(|v| v as u16)),
        PixelType::Uint32 => buffer.assign(values.map(|v| v as u32)),
        PixelType::Bit => buffer.assign(values.map(|v| (v as u64) % 2 == 1)),
        PixelType::Float => buffer.assign(values.map(|v| v as f32)),
        PixelType::Double => buffer.assign(values),
        PixelType::ComplexFloat => buffer.assign(values.map(|v| Complex::new(v as f32, 0.0))),
        PixelType::ComplexDouble => buffer.assign(values.map(|v| Complex::new(v, 0.0))),
    }?;
    Ok(buffer)
}

// =============================================================================
// Utilities
// =============================================================================

/// Initialize the tracing subscriber for logging.
fn init_logging(verbose: bool) {
    let env_filter = if verbose { "ometiff=debug" } else { "ometiff=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
