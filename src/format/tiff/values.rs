//! TIFF tag value reading.
//!
//! Values can be stored either inline in the IFD entry (for small values)
//! or at an offset in the file (for larger values like arrays). Arrays are
//! fetched with a single range read.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, IfdEntry, TiffHeader};
use super::tags::FieldType;

// =============================================================================
// ValueReader
// =============================================================================

/// Reads tag values from a TIFF file.
///
/// Combines a RangeReader with the header so that values are decoded in
/// the file's byte order and offset width.
pub struct ValueReader<'a, R: RangeReader> {
    reader: &'a R,
    header: &'a TiffHeader,
}

impl<'a, R: RangeReader> ValueReader<'a, R> {
    /// Create a new ValueReader.
    pub fn new(reader: &'a R, header: &'a TiffHeader) -> Self {
        Self { reader, header }
    }

    /// Get the byte order from the header.
    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    /// Read raw bytes for an IFD entry's value.
    ///
    /// For inline values, returns the bytes from the entry.
    /// For offset values, fetches the bytes from the file.
    pub fn read_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        let size = entry
            .value_byte_size()
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.is_inline {
            Ok(Bytes::copy_from_slice(
                &entry.value_offset_bytes[..size as usize],
            ))
        } else {
            let offset = entry.value_offset(self.header.byte_order);
            let bytes = self.reader.read_exact_at(offset, size as usize)?;
            Ok(bytes)
        }
    }

    /// Read a single unsigned value from an entry.
    ///
    /// Handles Byte, Short, Long, Long8 and IFD field types.
    pub fn read_u64(&self, entry: &IfdEntry) -> Result<u64, TiffError> {
        if let Some(value) = entry.inline_u64(self.header.byte_order) {
            return Ok(value);
        }

        if entry.count != 1 {
            return Err(TiffError::InvalidTagValue {
                tag: tag_name(entry),
                message: format!("expected count 1, got {}", entry.count),
            });
        }

        let values = self.read_u64_array(entry)?;
        values
            .first()
            .copied()
            .ok_or_else(|| TiffError::InvalidTagValue {
                tag: tag_name(entry),
                message: "empty value".to_string(),
            })
    }

    /// Read a single value that must fit in 32 bits.
    pub fn read_u32(&self, entry: &IfdEntry) -> Result<u32, TiffError> {
        let value = self.read_u64(entry)?;
        u32::try_from(value).map_err(|_| TiffError::InvalidTagValue {
            tag: tag_name(entry),
            message: format!("value {} does not fit in 32 bits", value),
        })
    }

    /// Read an array of unsigned values, widening every element to u64.
    ///
    /// This is the primary method for offsets and byte counts.
    pub fn read_u64_array(&self, entry: &IfdEntry) -> Result<Vec<u64>, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if !field_type.is_unsigned_integer() {
            return Err(TiffError::InvalidTagValue {
                tag: tag_name(entry),
                message: format!("expected an unsigned integer type, got {:?}", field_type),
            });
        }

        let count = entry.count as usize;
        if count == 0 {
            return Ok(Vec::new());
        }

        let bytes = self.read_bytes(entry)?;
        Ok(parse_u64_array(
            &bytes,
            count,
            field_type,
            self.header.byte_order,
        ))
    }

    /// Read an array of 16-bit values (BitsPerSample, SampleFormat, ColorMap).
    pub fn read_u16_array(&self, entry: &IfdEntry) -> Result<Vec<u16>, TiffError> {
        let values = self.read_u64_array(entry)?;
        values
            .into_iter()
            .map(|v| {
                u16::try_from(v).map_err(|_| TiffError::InvalidTagValue {
                    tag: tag_name(entry),
                    message: format!("value {} does not fit in 16 bits", v),
                })
            })
            .collect()
    }

    /// Read a string value from an entry (ASCII type).
    ///
    /// The string is expected to be null-terminated. The null terminator
    /// is stripped from the result.
    pub fn read_string(&self, entry: &IfdEntry) -> Result<String, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if field_type != FieldType::Ascii {
            return Err(TiffError::InvalidTagValue {
                tag: tag_name(entry),
                message: format!("expected Ascii type for string, got {:?}", field_type),
            });
        }

        let bytes = self.read_bytes(entry)?;

        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

fn tag_name(entry: &IfdEntry) -> &'static str {
    entry.tag().map(|t| t.name()).unwrap_or("unknown")
}

// =============================================================================
// Convenience functions for reading from bytes directly
// =============================================================================

/// Parse an array of unsigned values from raw bytes.
///
/// Elements that would run past the end of `bytes` are dropped.
pub fn parse_u64_array(
    bytes: &[u8],
    count: usize,
    field_type: FieldType,
    byte_order: ByteOrder,
) -> Vec<u64> {
    let width = field_type.size_in_bytes();
    let mut values = Vec::with_capacity(count);

    for i in 0..count {
        let offset = i * width;
        if offset + width > bytes.len() {
            break;
        }
        let slice = &bytes[offset..];
        let value = match field_type {
            FieldType::Byte => slice[0] as u64,
            FieldType::Short => byte_order.read_u16(slice) as u64,
            FieldType::Long | FieldType::Ifd => byte_order.read_u32(slice) as u64,
            FieldType::Long8 | FieldType::Ifd8 => byte_order.read_u64(slice),
            _ => break,
        };
        values.push(value);
    }

    values
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tiff_header() -> TiffHeader {
        TiffHeader {
            byte_order: ByteOrder::LittleEndian,
            is_bigtiff: false,
            first_ifd_offset: 8,
        }
    }

    fn entry(tag_id: u16, field_type: FieldType, count: u64, value: [u8; 4]) -> IfdEntry {
        IfdEntry {
            tag_id,
            field_type: Some(field_type),
            field_type_raw: field_type.as_u16(),
            count,
            value_offset_bytes: value.to_vec(),
            is_inline: field_type.fits_inline(count, false),
        }
    }

    // -------------------------------------------------------------------------
    // parse_u64_array tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_u64_array_short() {
        let bytes = [0x64, 0x00, 0xC8, 0x00, 0x2C, 0x01, 0x90, 0x01];
        let result = parse_u64_array(&bytes, 4, FieldType::Short, ByteOrder::LittleEndian);
        assert_eq!(result, vec![100, 200, 300, 400]);
    }

    #[test]
    fn test_parse_u64_array_long8_and_ifd8() {
        let bytes = [
            0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, //
            0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00,
        ];
        let expected = vec![0x0000_0001_0000_0000, 0x0000_0002_0000_0000];
        assert_eq!(
            parse_u64_array(&bytes, 2, FieldType::Long8, ByteOrder::LittleEndian),
            expected
        );
        assert_eq!(
            parse_u64_array(&bytes, 2, FieldType::Ifd8, ByteOrder::LittleEndian),
            expected
        );
    }

    #[test]
    fn test_parse_u64_array_truncated() {
        let bytes = [0x00, 0x00, 0x03, 0xE8, 0x00, 0x00];
        let result = parse_u64_array(&bytes, 2, FieldType::Long, ByteOrder::BigEndian);
        assert_eq!(result, vec![1000]);
    }

    // -------------------------------------------------------------------------
    // ValueReader tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_read_inline_short() {
        let data = Bytes::from(vec![0u8; 16]);
        let header = make_tiff_header();
        let reader = ValueReader::new(&data, &header);

        let e = entry(256, FieldType::Short, 1, [0x00, 0x04, 0x00, 0x00]);
        assert_eq!(reader.read_u32(&e).unwrap(), 1024);
        assert_eq!(&reader.read_bytes(&e).unwrap()[..], &[0x00, 0x04]);
    }

    #[test]
    fn test_read_offset_array() {
        let mut data = vec![0u8; 200];
        for (i, val) in [1000u32, 2000, 3000].iter().enumerate() {
            let pos = 100 + i * 4;
            data[pos..pos + 4].copy_from_slice(&val.to_le_bytes());
        }
        let data = Bytes::from(data);
        let header = make_tiff_header();
        let reader = ValueReader::new(&data, &header);

        let e = entry(273, FieldType::Long, 3, [100, 0, 0, 0]);
        assert_eq!(reader.read_u64_array(&e).unwrap(), vec![1000, 2000, 3000]);
    }

    #[test]
    fn test_read_u16_array_inline() {
        let data = Bytes::from(vec![0u8; 8]);
        let header = make_tiff_header();
        let reader = ValueReader::new(&data, &header);

        let e = entry(258, FieldType::Short, 2, [8, 0, 16, 0]);
        assert_eq!(reader.read_u16_array(&e).unwrap(), vec![8, 16]);
    }

    #[test]
    fn test_read_string() {
        let mut data = vec![0u8; 64];
        data[40..49].copy_from_slice(b"OME-TIFF\0");
        let data = Bytes::from(data);
        let header = make_tiff_header();
        let reader = ValueReader::new(&data, &header);

        let e = entry(270, FieldType::Ascii, 9, [40, 0, 0, 0]);
        assert_eq!(reader.read_string(&e).unwrap(), "OME-TIFF");

        let not_ascii = entry(270, FieldType::Short, 1, [1, 0, 0, 0]);
        assert!(matches!(
            reader.read_string(&not_ascii),
            Err(TiffError::InvalidTagValue {
                tag: "ImageDescription",
                ..
            })
        ));
    }

    #[test]
    fn test_read_out_of_bounds() {
        let data = Bytes::from(vec![0u8; 10]);
        let header = make_tiff_header();
        let reader = ValueReader::new(&data, &header);

        let e = entry(324, FieldType::Long, 4, [8, 0, 0, 0]);
        assert!(matches!(reader.read_u64_array(&e), Err(TiffError::Io(_))));
    }

    #[test]
    fn test_read_rejects_signed_types() {
        let data = Bytes::from(vec![0u8; 10]);
        let header = make_tiff_header();
        let reader = ValueReader::new(&data, &header);

        let e = entry(256, FieldType::SShort, 1, [1, 0, 0, 0]);
        assert!(reader.read_u64(&e).is_err());
    }
}
