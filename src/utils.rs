use crate::error::TeFixError;
use crate::types::{ItemStack, Position};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::path::Path;

/// 单个记录负载的长度上限，防止损坏的长度字段导致巨量分配
const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// 计算SHA-256哈希
pub fn calculate_sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// 计算整个文件的SHA-256哈希（十六进制）
pub fn file_digest<P: AsRef<Path>>(path: P) -> Result<String, TeFixError> {
    let data = std::fs::read(path)?;
    Ok(calculate_sha256(&data)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}

/// 写入 7 位变长长度前缀的 UTF-8 字符串
pub fn write_string<W: Write>(writer: &mut W, value: &str) -> Result<(), TeFixError> {
    let mut len = value.len() as u32;
    while len >= 0x80 {
        writer.write_u8((len as u8) | 0x80)?;
        len >>= 7;
    }
    writer.write_u8(len as u8)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

/// 读取 7 位变长长度前缀的 UTF-8 字符串
pub fn read_string<R: Read>(reader: &mut R) -> Result<String, TeFixError> {
    let mut len: u32 = 0;
    let mut shift = 0;
    loop {
        let byte = reader.read_u8()?;
        len |= ((byte & 0x7F) as u32) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift > 28 {
            return Err(TeFixError::Decode("字符串长度前缀过长".to_string()));
        }
    }

    if len > MAX_FRAME_LEN {
        return Err(TeFixError::Decode(format!("字符串长度 {} 超出上限", len)));
    }

    let mut buffer = vec![0u8; len as usize];
    reader.read_exact(&mut buffer)?;
    String::from_utf8(buffer).map_err(|_| TeFixError::Decode("非UTF-8编码的字符串".to_string()))
}

pub fn write_position<W: Write>(writer: &mut W, pos: Position) -> Result<(), TeFixError> {
    writer.write_i32::<LittleEndian>(pos.x)?;
    writer.write_i32::<LittleEndian>(pos.y)?;
    writer.write_i32::<LittleEndian>(pos.z)?;
    Ok(())
}

pub fn read_position<R: Read>(reader: &mut R) -> Result<Position, TeFixError> {
    Ok(Position {
        x: reader.read_i32::<LittleEndian>()?,
        y: reader.read_i32::<LittleEndian>()?,
        z: reader.read_i32::<LittleEndian>()?,
    })
}

pub fn write_bool<W: Write>(writer: &mut W, value: bool) -> Result<(), TeFixError> {
    writer.write_u8(if value { 0x01 } else { 0x00 })?;
    Ok(())
}

pub fn read_bool<R: Read>(reader: &mut R) -> Result<bool, TeFixError> {
    Ok(reader.read_u8()? != 0)
}

pub fn write_item_stack<W: Write>(writer: &mut W, stack: &ItemStack) -> Result<(), TeFixError> {
    writer.write_i32::<LittleEndian>(stack.item_id)?;
    writer.write_i32::<LittleEndian>(stack.count)?;
    Ok(())
}

pub fn read_item_stack<R: Read>(reader: &mut R) -> Result<ItemStack, TeFixError> {
    Ok(ItemStack {
        item_id: reader.read_i32::<LittleEndian>()?,
        count: reader.read_i32::<LittleEndian>()?,
    })
}

/// 写入带长度前缀（u32）的负载
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), TeFixError> {
    if payload.len() > MAX_FRAME_LEN as usize {
        return Err(TeFixError::Decode(format!("负载长度 {} 超出上限", payload.len())));
    }
    writer.write_u32::<LittleEndian>(payload.len() as u32)?;
    writer.write_all(payload)?;
    Ok(())
}

/// 读取带长度前缀（u32）的负载
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, TeFixError> {
    let len = reader.read_u32::<LittleEndian>()?;
    if len > MAX_FRAME_LEN {
        return Err(TeFixError::Decode(format!("负载长度 {} 超出上限", len)));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}
