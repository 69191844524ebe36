use crate::{
    error::TeFixError,
    header::{read_header, write_header, RegionHeader},
    power::{read_power_item_into, write_power_item, POWER_ITEM_VERSION},
    tile_entity::{read_tile_entity, write_tile_entity, DecodeContext, TileEntity, TileEntityKind},
    types::{BoundingBox, Position},
    utils::{read_frame, read_position, write_frame, write_position},
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// 区域文件中的一条记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRecord {
    /// 相对于源包围盒最小角的坐标
    pub relative: Position,
    pub tile_entity: TileEntity,
}

/// 已分帧但尚未解码的供电物品
#[derive(Debug, Clone)]
pub struct RawPowerItem {
    pub version: u8,
    pub payload: Vec<u8>,
}

/// 已分帧但尚未解码的记录；解码需要最终坐标，因此延后到放置时进行
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub relative: Position,
    pub kind: TileEntityKind,
    pub payload: Vec<u8>,
    pub power_item: Option<RawPowerItem>,
}

impl RawRecord {
    /// 按给定上下文解码记录，并将供电物品填入解码时创建的空壳
    pub fn decode(&self, ctx: &DecodeContext) -> Result<TileEntity, TeFixError> {
        let mut cursor = Cursor::new(self.payload.as_slice());
        let mut te = read_tile_entity(&mut cursor, self.kind, ctx)?;
        ensure_consumed(&cursor, "方块实体")?;

        if let Some(raw) = &self.power_item {
            if raw.version != POWER_ITEM_VERSION {
                return Err(TeFixError::UnsupportedPowerItemVersion(raw.version));
            }
            let item = te
                .power_item_mut()
                .ok_or_else(|| TeFixError::Decode("非供电方块实体附带了供电物品".to_string()))?;
            let mut cursor = Cursor::new(raw.payload.as_slice());
            read_power_item_into(&mut cursor, item)?;
            ensure_consumed(&cursor, "供电物品")?;
        }

        Ok(te)
    }
}

fn ensure_consumed(cursor: &Cursor<&[u8]>, what: &str) -> Result<(), TeFixError> {
    let remaining = cursor.get_ref().len() as u64 - cursor.position();
    if remaining != 0 {
        return Err(TeFixError::Decode(format!(
            "{}负载末尾有 {} 字节未读取",
            what, remaining
        )));
    }
    Ok(())
}

/// 完整的区域文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionFile {
    pub source_bounds: BoundingBox,
    pub records: Vec<RegionRecord>,
}

impl RegionFile {
    pub fn new(source_bounds: BoundingBox) -> Self {
        Self {
            source_bounds,
            records: Vec::new(),
        }
    }

    /// 编码为字节
    pub fn to_bytes(&self) -> Result<Vec<u8>, TeFixError> {
        let mut buffer = Vec::new();
        write_region(&mut buffer, self)?;
        Ok(buffer)
    }

    /// 将区域文件写入磁盘
    ///
    /// 先在内存中完成编码，再写入同目录下的临时文件并重命名到目标路径，
    /// 任何失败都不会留下半个文件或破坏已有文件。
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), TeFixError> {
        let bytes = self.to_bytes()?;
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(&bytes)?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// 读取并在原位置解码全部记录
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, TeFixError> {
        let (header, raw_records) = read_raw_region(reader)?;
        let mut region = RegionFile::new(header.source_bounds);
        for raw in raw_records {
            let world = header.source_bounds.min + raw.relative;
            let tile_entity = raw.decode(&DecodeContext::new(world.chunk_pos()))?;
            region.records.push(RegionRecord {
                relative: raw.relative,
                tile_entity,
            });
        }
        Ok(region)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TeFixError> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read_from(&mut reader)
    }

    /// 带供电物品的记录数
    pub fn powered_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.tile_entity.power_item().is_some())
            .count()
    }
}

/// 写入完整区域文件
pub fn write_region<W: Write>(writer: &mut W, region: &RegionFile) -> Result<(), TeFixError> {
    write_header(writer, &region.source_bounds)?;
    writer.write_i32::<LittleEndian>(region.records.len() as i32)?;

    for record in &region.records {
        write_record(writer, record)?;
    }

    Ok(())
}

fn write_record<W: Write>(writer: &mut W, record: &RegionRecord) -> Result<(), TeFixError> {
    let te = &record.tile_entity;

    write_position(writer, record.relative)?;
    writer.write_i32::<LittleEndian>(te.kind as i32)?;

    let mut payload = Vec::new();
    write_tile_entity(&mut payload, te)?;
    write_frame(writer, &payload)?;

    if te.kind.is_powered() {
        let item = te
            .power_item()
            .ok_or(TeFixError::MissingPowerItem(record.relative))?;
        let mut payload = Vec::new();
        write_power_item(&mut payload, item)?;
        writer.write_u8(POWER_ITEM_VERSION)?;
        write_frame(writer, &payload)?;
    }

    Ok(())
}

/// 读取头部与全部分帧记录，不解码负载
///
/// 未知的方块实体类型无法判断是否跟随供电物品，只能中止读取。
pub fn read_raw_region<R: Read>(reader: &mut R) -> Result<(RegionHeader, Vec<RawRecord>), TeFixError> {
    let header = read_header(reader)?;

    let count = reader.read_i32::<LittleEndian>()?;
    if count < 0 {
        return Err(TeFixError::Decode(format!("无效的记录数量: {}", count)));
    }

    let mut records = Vec::with_capacity((count as usize).min(4096));
    for _ in 0..count {
        let relative = read_position(reader)?;
        let kind = TileEntityKind::from_i32(reader.read_i32::<LittleEndian>()?)?;
        let payload = read_frame(reader)?;

        let power_item = if kind.is_powered() {
            let version = reader.read_u8()?;
            Some(RawPowerItem {
                version,
                payload: read_frame(reader)?,
            })
        } else {
            None
        };

        records.push(RawRecord {
            relative,
            kind,
            payload,
            power_item,
        });
    }

    Ok((header, records))
}

/// 单条记录的摘要，用于信息输出
pub fn record_summary(record: &RegionRecord) -> String {
    let te = &record.tile_entity;
    match te.power_item() {
        Some(item) => format!(
            "{:?} @ ({}) 供电物品 {:?}{}",
            te.kind,
            record.relative,
            item.kind(),
            item.parent
                .map(|p| format!("，上游 ({})", p))
                .unwrap_or_default()
        ),
        None => format!("{:?} @ ({})", te.kind, record.relative),
    }
}
