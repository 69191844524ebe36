use crate::{
    error::TeFixError,
    header::RegionHeader,
    region::{read_raw_region, RawRecord},
    tile_entity::{DecodeContext, TileEntity},
    transform::{checked_rotate, rotated_extent, Rotation},
    types::{BoundingBox, ChunkPos, Position},
    world::{HostWorld, PrefabStore, StatusSink},
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// 导入选项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    pub rotation: Rotation,
    /// 目标范围内任一区块未加载时中止整个导入；关闭后仅跳过对应记录
    pub require_loaded_area: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            rotation: Rotation::None,
            require_loaded_area: true,
        }
    }
}

/// 导入结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    /// 被替换掉的占位方块实体数量（几何导入时留下的）
    pub replaced: usize,
    pub target_bounds: Option<BoundingBox>,
}

/// 源坐标到目标坐标的映射
#[derive(Debug, Clone, Copy)]
struct Placement {
    source: BoundingBox,
    origin: Position,
    rotation: Rotation,
}

impl Placement {
    fn extent(&self) -> Result<Position, TeFixError> {
        self.source
            .max
            .checked_sub(self.source.min)
            .ok_or_else(|| overflow("源包围盒", self.source.max))
    }

    fn target_of(&self, relative: Position) -> Result<Position, TeFixError> {
        checked_rotate(relative, self.extent()?, self.rotation)
            .and_then(|rotated| self.origin.checked_add(rotated))
            .ok_or_else(|| overflow("记录", relative))
    }

    /// 重新映射接线端点：区域内的端点随区域旋转平移，区域外的端点只平移
    fn rewire(&self, pos: Position) -> Result<Position, TeFixError> {
        if self.source.contains(pos) {
            let relative = pos
                .checked_sub(self.source.min)
                .ok_or_else(|| overflow("接线端点", pos))?;
            self.target_of(relative)
        } else {
            self.origin
                .checked_sub(self.source.min)
                .and_then(|delta| pos.checked_add(delta))
                .ok_or_else(|| overflow("接线端点", pos))
        }
    }

    fn target_bounds(&self) -> Result<BoundingBox, TeFixError> {
        self.extent()?;
        let local = rotated_extent(&self.source, self.rotation);
        match (self.origin.checked_add(local.min), self.origin.checked_add(local.max)) {
            (Some(min), Some(max)) => Ok(BoundingBox::new(min, max)),
            _ => Err(overflow("目标区域", self.origin)),
        }
    }
}

fn overflow(what: &str, pos: Position) -> TeFixError {
    TeFixError::Decode(format!("{} ({}) 放置后坐标溢出", what, pos))
}

/// 区域导入器
pub struct RegionImporter<'a, W: HostWorld + ?Sized> {
    world: &'a mut W,
    status: &'a mut dyn StatusSink,
    options: ImportOptions,
}

impl<'a, W: HostWorld + ?Sized> RegionImporter<'a, W> {
    pub fn new(world: &'a mut W, status: &'a mut dyn StatusSink) -> Self {
        Self {
            world,
            status,
            options: ImportOptions::default(),
        }
    }

    pub fn options(mut self, options: ImportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn rotation(mut self, rotation: Rotation) -> Self {
        self.options.rotation = rotation;
        self
    }

    /// 从文件导入；几何先于方块实体放置
    pub fn import<P: AsRef<Path>>(
        &mut self,
        path: P,
        origin: Position,
        prefab: &mut dyn PrefabStore,
    ) -> Result<ImportSummary, TeFixError> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let (header, raw_records) = read_raw_region(&mut reader)?;
        let (placement, decoded, mut summary) = self.decode_all(&header, &raw_records, origin)?;

        prefab.load_geometry(path, origin, self.options.rotation)?;
        self.place_all(decoded, &mut summary);
        self.finish(&placement, &summary);
        Ok(summary)
    }

    /// 从任意数据源导入方块实体（不处理几何）
    pub fn import_from<R: Read>(&mut self, reader: &mut R, origin: Position) -> Result<ImportSummary, TeFixError> {
        let (header, raw_records) = read_raw_region(reader)?;
        let (placement, decoded, mut summary) = self.decode_all(&header, &raw_records, origin)?;
        self.place_all(decoded, &mut summary);
        self.finish(&placement, &summary);
        Ok(summary)
    }

    /// 第一遍：校验目标区域并按最终坐标解码全部记录，不修改世界
    fn decode_all(
        &mut self,
        header: &RegionHeader,
        raw_records: &[RawRecord],
        origin: Position,
    ) -> Result<(Placement, Vec<(ChunkPos, TileEntity)>, ImportSummary), TeFixError> {
        let placement = Placement {
            source: header.source_bounds,
            origin,
            rotation: self.options.rotation,
        };
        let target_bounds = placement.target_bounds()?;

        if self.options.require_loaded_area {
            if let Some(chunk) = target_bounds
                .chunks()
                .into_iter()
                .find(|c| !self.world.is_chunk_loaded(*c))
            {
                return Err(TeFixError::AreaNotLoaded { chunk });
            }
        }

        let mut summary = ImportSummary {
            target_bounds: Some(target_bounds),
            ..ImportSummary::default()
        };
        let mut decoded = Vec::with_capacity(raw_records.len());

        for raw in raw_records {
            let target = match placement.target_of(raw.relative) {
                Ok(target) => target,
                Err(e) => {
                    summary.skipped += 1;
                    warn!("跳过记录 ({}): {}", raw.relative, e);
                    self.status
                        .report(&format!("警告：跳过记录 ({})：{}", raw.relative, e));
                    continue;
                }
            };
            let chunk = target.chunk_pos();
            if !self.world.is_chunk_loaded(chunk) {
                summary.skipped += 1;
                self.warn_skip(target, &format!("区块 ({}, {}) 未加载", chunk.x, chunk.z));
                continue;
            }

            let ctx = DecodeContext::with_override(chunk, target.local_pos());
            let mut te = match raw.decode(&ctx) {
                Ok(te) => te,
                Err(e) => {
                    summary.skipped += 1;
                    debug!("记录 {:?} @ ({}) 解码失败: {:?}", raw.kind, raw.relative, e);
                    self.warn_skip(target, &e.to_string());
                    continue;
                }
            };

            if let Some(item) = te.power_item_mut() {
                let rewired = item
                    .parent
                    .map(|p| placement.rewire(p))
                    .transpose()
                    .and_then(|parent| {
                        let children = item
                            .children
                            .iter()
                            .map(|c| placement.rewire(*c))
                            .collect::<Result<Vec<_>, _>>()?;
                        Ok((parent, children))
                    });
                match rewired {
                    Ok((parent, children)) => {
                        item.parent = parent;
                        item.children = children;
                        item.position = target;
                    }
                    Err(e) => {
                        summary.skipped += 1;
                        self.warn_skip(target, &e.to_string());
                        continue;
                    }
                }
            }
            decoded.push((chunk, te));
        }

        Ok((placement, decoded, summary))
    }

    /// 第二遍：移除占位方块实体并放入解码结果
    fn place_all(&mut self, decoded: Vec<(ChunkPos, TileEntity)>, summary: &mut ImportSummary) {
        let mut touched: Vec<ChunkPos> = Vec::new();

        for (chunk, te) in decoded {
            let target = chunk.to_world(te.local);
            match self.world.remove_tile_entity(chunk, te.local) {
                Ok(Some(_)) => summary.replaced += 1,
                Ok(None) => {}
                Err(e) => {
                    summary.skipped += 1;
                    self.warn_skip(target, &e.to_string());
                    continue;
                }
            }

            if let Err(e) = self.world.add_tile_entity(chunk, te) {
                summary.skipped += 1;
                self.warn_skip(target, &e.to_string());
                continue;
            }
            summary.imported += 1;
            if !touched.contains(&chunk) {
                touched.push(chunk);
            }
        }

        for chunk in touched {
            self.world.chunk_modified(chunk);
        }
    }

    fn finish(&mut self, placement: &Placement, summary: &ImportSummary) {
        info!(
            "已导入 {} 个方块实体到 ({})，旋转 {}，跳过 {}",
            summary.imported,
            placement.origin,
            placement.rotation.steps(),
            summary.skipped
        );
        self.status.report(&format!(
            "已导入 {} 个方块实体（跳过 {}）",
            summary.imported, summary.skipped
        ));
    }

    fn warn_skip(&mut self, target: Position, reason: &str) {
        warn!("跳过位于 ({}) 的记录: {}", target, reason);
        self.status
            .report(&format!("警告：跳过位于 ({}) 的记录：{}", target, reason));
    }
}
