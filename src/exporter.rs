use crate::{
    error::TeFixError,
    power::PowerItem,
    region::{RegionFile, RegionRecord},
    tile_entity::TileEntity,
    types::{BoundingBox, Position},
    world::{HostWorld, PrefabStore, StatusSink},
};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::Path;

/// 导出结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    pub records: usize,
    pub powered: usize,
    /// 以默认空壳替换的供电物品数
    pub replaced_power_items: usize,
}

/// 区域导出器
pub struct RegionExporter<'a, W: HostWorld + ?Sized> {
    world: &'a W,
    status: &'a mut dyn StatusSink,
}

impl<'a, W: HostWorld + ?Sized> RegionExporter<'a, W> {
    pub fn new(world: &'a W, status: &'a mut dyn StatusSink) -> Self {
        Self { world, status }
    }

    /// 收集包围盒内的方块实体，按世界坐标排序
    ///
    /// 任一覆盖区块未加载时返回 `AreaNotLoaded`。
    pub fn collect(&mut self, bounds: &BoundingBox) -> Result<(RegionFile, ExportSummary), TeFixError> {
        let chunks = bounds.chunks();
        if let Some(chunk) = chunks.iter().find(|c| !self.world.is_chunk_loaded(**c)) {
            return Err(TeFixError::AreaNotLoaded { chunk: *chunk });
        }

        let mut ordered: BTreeMap<Position, TileEntity> = BTreeMap::new();
        for chunk in chunks {
            let tile_entities = self
                .world
                .tile_entities_in(chunk)
                .ok_or(TeFixError::AreaNotLoaded { chunk })?;
            for te in tile_entities {
                let world_pos = chunk.to_world(te.local);
                if bounds.contains(world_pos) {
                    ordered.insert(world_pos, te);
                }
            }
        }

        let mut summary = ExportSummary {
            records: 0,
            powered: 0,
            replaced_power_items: 0,
        };
        let mut region = RegionFile::new(*bounds);
        for (world_pos, mut te) in ordered {
            if te.kind.is_powered() && self.normalize_power_item(world_pos, &mut te) {
                summary.replaced_power_items += 1;
            }
            if te.power_item().is_some() {
                summary.powered += 1;
            }
            region.records.push(RegionRecord {
                relative: world_pos - bounds.min,
                tile_entity: te,
            });
        }
        summary.records = region.records.len();

        Ok((region, summary))
    }

    /// 导出到文件；方块实体先于几何导出
    pub fn export<P: AsRef<Path>>(
        &mut self,
        bounds: &BoundingBox,
        path: P,
        prefab: &mut dyn PrefabStore,
    ) -> Result<ExportSummary, TeFixError> {
        let path = path.as_ref();
        let (region, summary) = self.collect(bounds)?;
        region.write_to_file(path)?;
        prefab.save_geometry(bounds, path)?;

        info!(
            "已导出 {} 个方块实体（{} 个带供电物品）到 {}",
            summary.records,
            summary.powered,
            path.display()
        );
        self.status.report(&format!(
            "已导出区域 ({}) - ({})：{} 个方块实体",
            bounds.min, bounds.max, summary.records
        ));
        Ok(summary)
    }

    /// 确保供电方块实体带有与其声明一致的物品；返回是否替换了不一致的物品
    ///
    /// 缺失的物品按声明值补上默认空壳，与导入时解码创建的空壳一致。
    fn normalize_power_item(&mut self, world_pos: Position, te: &mut TileEntity) -> bool {
        let Some(state) = te.powered_mut() else {
            return false;
        };
        let shell = state.create_power_item(world_pos);
        let Some(item) = state.power_item.as_ref() else {
            debug!("({}) 没有供电物品，导出默认 {:?}", world_pos, shell.kind());
            state.power_item = Some(shell);
            return false;
        };
        if item.kind() == shell.kind() {
            return false;
        }

        let message = format!(
            "({}) 的供电物品 {:?} 与声明不符，已按 {:?} 导出默认值；建议先运行修复",
            world_pos,
            item.kind(),
            shell.kind()
        );
        let parent = item.parent;
        state.power_item = Some(PowerItem { parent, ..shell });

        warn!("{}", message);
        self.status.report(&format!("警告：{}", message));
        true
    }
}
