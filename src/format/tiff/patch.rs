//! In-place replacement of the first directory's ImageDescription.
//!
//! Files are written with a short placeholder description on IFD 0 so that
//! the final metadata, which is only known once every file of a dataset has
//! been written, can be attached afterwards. The new text is appended at the
//! end of the file and the existing entry's count and offset fields are
//! rewritten to point at it. Nothing else in the file moves.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{IoError, TiffError};

use super::parser::{ByteOrder, TiffHeader, BIGTIFF_HEADER_SIZE};
use super::tags::{FieldType, TiffTag};

/// Description written on IFD 0 until the real metadata is patched in.
pub const DESCRIPTION_PLACEHOLDER: &str = "OME-TIFF";

/// Declared count of the placeholder entry, including the NUL terminator.
pub const PLACEHOLDER_COUNT: u64 = DESCRIPTION_PLACEHOLDER.len() as u64 + 1;

/// Replace the ImageDescription of IFD 0 in the file at `path`.
///
/// The entry must exist, be ASCII and hold exactly the placeholder count;
/// otherwise the file is left untouched and an error is returned.
pub fn patch_image_description(path: impl AsRef<Path>, description: &str) -> Result<(), TiffError> {
    let path = path.as_ref();
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(IoError::from)?;
    let size = file.metadata().map_err(IoError::from)?.len();

    let mut header_bytes = vec![0u8; (size.min(BIGTIFF_HEADER_SIZE as u64)) as usize];
    file.read_exact(&mut header_bytes).map_err(IoError::from)?;
    let header = TiffHeader::parse(&header_bytes, size)?;
    let order = header.byte_order;

    let ifd_offset = header.first_ifd_offset;
    let mut count_bytes = vec![0u8; header.ifd_count_size()];
    read_at(&mut file, ifd_offset, &mut count_bytes)?;
    let entry_count = if header.is_bigtiff {
        order.read_u64(&count_bytes)
    } else {
        order.read_u16(&count_bytes) as u64
    };

    let entry_size = header.ifd_entry_size();
    let mut table = vec![0u8; entry_count as usize * entry_size];
    read_at(&mut file, ifd_offset + header.ifd_count_size() as u64, &mut table)?;

    let index = (0..entry_count as usize)
        .find(|i| order.read_u16(&table[i * entry_size..]) == TiffTag::ImageDescription.as_u16())
        .ok_or(TiffError::MissingTag("ImageDescription"))?;
    let entry = &table[index * entry_size..(index + 1) * entry_size];

    let field_type = order.read_u16(&entry[2..4]);
    if FieldType::from_u16(field_type) != Some(FieldType::Ascii) {
        return Err(TiffError::InvalidTagValue {
            tag: "ImageDescription",
            message: format!("expected ASCII field type, found {}", field_type),
        });
    }
    let count = if header.is_bigtiff {
        order.read_u64(&entry[4..12])
    } else {
        order.read_u32(&entry[4..8]) as u64
    };
    if count != PLACEHOLDER_COUNT {
        return Err(TiffError::DescriptionPlaceholder {
            expected: PLACEHOLDER_COUNT,
            found: count,
        });
    }

    let mut text = description.as_bytes().to_vec();
    text.push(0);
    let new_count = text.len() as u64;
    let value_size = header.value_offset_size();

    let mut value_field = Vec::with_capacity(value_size);
    if text.len() <= value_size {
        value_field.extend_from_slice(&text);
        value_field.resize(value_size, 0);
    } else {
        // Values start on a word boundary.
        let padding = size % 2;
        let new_offset = size + padding;
        if !header.is_bigtiff && new_offset + new_count > u32::MAX as u64 {
            return Err(TiffError::OffsetOverflow(new_offset));
        }
        file.seek(SeekFrom::End(0)).map_err(IoError::from)?;
        if padding == 1 {
            file.write_all(&[0]).map_err(IoError::from)?;
        }
        file.write_all(&text).map_err(IoError::from)?;
        put_field(&mut value_field, new_offset, header.is_bigtiff, order);
    }

    let mut count_field = Vec::with_capacity(8);
    put_field(&mut count_field, new_count, header.is_bigtiff, order);

    let entry_pos = ifd_offset + header.ifd_count_size() as u64 + (index * entry_size) as u64;
    let count_pos = entry_pos + 4;
    let value_pos = if header.is_bigtiff { entry_pos + 12 } else { entry_pos + 8 };
    write_at(&mut file, count_pos, &count_field)?;
    write_at(&mut file, value_pos, &value_field)?;
    file.flush().map_err(IoError::from)?;

    debug!(
        file = %path.display(),
        bytes = new_count,
        "Patched ImageDescription"
    );
    Ok(())
}

fn put_field(dst: &mut Vec<u8>, value: u64, big_tiff: bool, order: ByteOrder) {
    if big_tiff {
        order.put_u64(dst, value);
    } else {
        order.put_u32(dst, value as u32);
    }
}

fn read_at(file: &mut std::fs::File, pos: u64, buf: &mut [u8]) -> Result<(), TiffError> {
    file.seek(SeekFrom::Start(pos)).map_err(IoError::from)?;
    file.read_exact(buf).map_err(IoError::from)?;
    Ok(())
}

fn write_at(file: &mut std::fs::File, pos: u64, buf: &[u8]) -> Result<(), TiffError> {
    file.seek(SeekFrom::Start(pos)).map_err(IoError::from)?;
    file.write_all(buf).map_err(IoError::from)?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::fs::File;

    use super::*;
    use crate::format::tiff::file::TiffFile;
    use crate::format::tiff::writer::{ImageSpec, TiffWriter};
    use crate::pixel::{PixelType, VariantPixelBuffer};

    fn write_file(path: &Path, big_tiff: bool, description: Option<&str>, planes: usize) {
        let file = File::create(path).unwrap();
        let mut writer = TiffWriter::new(file, big_tiff, ByteOrder::BigEndian).unwrap();
        for i in 0..planes {
            let mut spec = ImageSpec::new(4, 4, PixelType::Uint8, 1);
            if i == 0 {
                spec.description = description.map(str::to_string);
            }
            let mut buffer = VariantPixelBuffer::with_type(spec.shape(), PixelType::Uint8);
            buffer.assign(vec![i as u8; 16]).unwrap();
            writer.write_image(&spec, &buffer).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_patch_classic_and_bigtiff() {
        let dir = tempfile::tempdir().unwrap();
        for big_tiff in [false, true] {
            let path = dir.path().join(format!("patch_{}.tif", big_tiff));
            write_file(&path, big_tiff, Some(DESCRIPTION_PLACEHOLDER), 2);

            let text = r#"{"uuid":"urn:uuid:1234","images":[]}"#;
            patch_image_description(&path, text).unwrap();

            let file = TiffFile::open(&path).unwrap();
            assert_eq!(file.directory_count(), 2);
            let first = file.directory(0).unwrap();
            assert_eq!(first.image_description.as_deref(), Some(text));
            let pixels = file.read_image(&file.directory(1).unwrap()).unwrap();
            assert_eq!(pixels.data::<u8>().unwrap(), &[1u8; 16]);
        }
    }

    #[test]
    fn test_patch_appends_on_word_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd.tif");
        write_file(&path, false, Some(DESCRIPTION_PLACEHOLDER), 1);
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(&[0xAA])
            .unwrap();
        let size = std::fs::metadata(&path).unwrap().len();
        assert_eq!(size % 2, 1);

        let text = "a description longer than the inline field";
        patch_image_description(&path, text).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let start = size as usize + 1;
        assert_eq!(bytes[start - 1], 0);
        assert_eq!(&bytes[start..start + text.len()], text.as_bytes());
        let file = TiffFile::open(&path).unwrap();
        assert_eq!(file.directory(0).unwrap().image_description.as_deref(), Some(text));
    }

    #[test]
    fn test_patch_short_text_inline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.tif");
        write_file(&path, false, Some(DESCRIPTION_PLACEHOLDER), 1);
        patch_image_description(&path, "ab").unwrap();
        let file = TiffFile::open(&path).unwrap();
        assert_eq!(file.directory(0).unwrap().image_description.as_deref(), Some("ab"));
    }

    #[test]
    fn test_patch_missing_tag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.tif");
        write_file(&path, false, None, 1);
        let before = std::fs::read(&path).unwrap();

        let err = patch_image_description(&path, "{}").unwrap_err();
        assert!(matches!(err, TiffError::MissingTag("ImageDescription")));
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_patch_wrong_placeholder_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.tif");
        write_file(&path, true, Some("something else entirely"), 1);

        let err = patch_image_description(&path, "{}").unwrap_err();
        assert!(matches!(
            err,
            TiffError::DescriptionPlaceholder { expected: 9, found: 24 }
        ));
    }
}
