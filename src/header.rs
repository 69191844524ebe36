use crate::{
    error::TeFixError,
    types::{BoundingBox, Position},
    utils::{read_position, read_string, write_position, write_string},
    REGION_FORMAT_VERSION, REGION_MARKER,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// 区域文件头部
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionHeader {
    pub version: i32,
    pub source_bounds: BoundingBox,
}

/// 写入区域文件头部
pub fn write_header<W: Write>(writer: &mut W, source_bounds: &BoundingBox) -> Result<(), TeFixError> {
    write_string(writer, REGION_MARKER)?;
    writer.write_i32::<LittleEndian>(REGION_FORMAT_VERSION)?;
    write_position(writer, source_bounds.min)?;
    write_position(writer, source_bounds.max)?;
    Ok(())
}

/// 读取区域文件头部，先校验标记与版本再读取其余字段
pub fn read_header<R: Read>(reader: &mut R) -> Result<RegionHeader, TeFixError> {
    let marker = read_string(reader).map_err(|_| TeFixError::InvalidMarker(String::new()))?;
    if marker != REGION_MARKER {
        return Err(TeFixError::InvalidMarker(marker));
    }

    let version = reader.read_i32::<LittleEndian>()?;
    if version != REGION_FORMAT_VERSION {
        return Err(TeFixError::FormatVersionMismatch {
            expected: REGION_FORMAT_VERSION,
            found: version,
        });
    }

    let a: Position = read_position(reader)?;
    let b: Position = read_position(reader)?;

    Ok(RegionHeader {
        version,
        source_bounds: BoundingBox::new(a, b),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_layout() {
        let bounds = BoundingBox::new(Position::new(-5, 0, 10), Position::new(5, 3, 20));
        let mut buffer = Vec::new();
        write_header(&mut buffer, &bounds).unwrap();

        assert_eq!(buffer.len(), 1 + 7 + 4 + 24);
        assert_eq!(&buffer[1..8], b"7DTD-TE");
        assert_eq!(&buffer[8..12], &4i32.to_le_bytes());

        let header = read_header(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(header.source_bounds, bounds);
    }

    #[test]
    fn wrong_marker_is_rejected() {
        let mut buffer = Vec::new();
        write_string(&mut buffer, "MCSTRM").unwrap();
        buffer.write_i32::<LittleEndian>(REGION_FORMAT_VERSION).unwrap();
        assert!(matches!(
            read_header(&mut Cursor::new(buffer)),
            Err(TeFixError::InvalidMarker(m)) if m == "MCSTRM"
        ));
    }

    #[test]
    fn other_version_is_rejected_with_both_values() {
        let mut buffer = Vec::new();
        write_string(&mut buffer, REGION_MARKER).unwrap();
        buffer.write_i32::<LittleEndian>(3).unwrap();
        let err = read_header(&mut Cursor::new(buffer)).unwrap_err();
        assert!(matches!(
            err,
            TeFixError::FormatVersionMismatch { expected: 4, found: 3 }
        ));
        let message = err.to_string();
        assert!(message.contains('4') && message.contains('3'));
    }
}
