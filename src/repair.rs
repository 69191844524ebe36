use crate::{
    error::TeFixError,
    power::PowerItemKind,
    tile_entity::TileEntity,
    types::{ChunkPos, Position},
    validator::{validate, Verdict},
    world::{HostWorld, StatusSink},
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepairMode {
    /// 只统计问题，不修改世界
    #[default]
    Simulate,
    Apply,
}

/// 扫描范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairScope {
    AllLoadedChunks,
    /// 包含该世界坐标的区块
    SingleChunkAt(Position),
}

/// 扫描结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub chunks_scanned: usize,
    pub problems_found: usize,
    pub repaired: usize,
    pub failed: usize,
    pub unrecognized: usize,
}

/// 供电物品修复引擎
pub struct RepairEngine<'a, W: HostWorld + ?Sized> {
    world: &'a mut W,
    status: &'a mut dyn StatusSink,
    mode: RepairMode,
}

impl<'a, W: HostWorld + ?Sized> RepairEngine<'a, W> {
    pub fn new(world: &'a mut W, status: &'a mut dyn StatusSink) -> Self {
        Self {
            world,
            status,
            mode: RepairMode::Simulate,
        }
    }

    pub fn mode(mut self, mode: RepairMode) -> Self {
        self.mode = mode;
        self
    }

    /// 扫描范围内的所有供电方块实体
    pub fn run(&mut self, scope: RepairScope) -> Result<RepairReport, TeFixError> {
        let chunks = match scope {
            RepairScope::AllLoadedChunks => self.world.loaded_chunks(),
            RepairScope::SingleChunkAt(pos) => {
                let chunk = pos.chunk_pos();
                if !self.world.is_chunk_loaded(chunk) {
                    return Err(TeFixError::AreaNotLoaded { chunk });
                }
                vec![chunk]
            }
        };

        let mut report = RepairReport::default();
        for chunk in chunks {
            // 区块可能在获取列表后被卸载
            let Some(tile_entities) = self.world.tile_entities_in(chunk) else {
                continue;
            };
            report.chunks_scanned += 1;

            let mut changed = false;
            for te in tile_entities.iter().filter(|te| te.kind.is_powered()) {
                if self.scan_one(chunk, te, &mut report) {
                    changed = true;
                }
            }
            if changed {
                self.world.chunk_modified(chunk);
            }
        }

        info!(
            "供电物品扫描完成（{:?}）：扫描区块 {}，发现问题 {}，已修复 {}，失败 {}",
            self.mode, report.chunks_scanned, report.problems_found, report.repaired, report.failed
        );
        Ok(report)
    }

    /// 返回世界是否被修改
    fn scan_one(&mut self, chunk: ChunkPos, te: &TileEntity, report: &mut RepairReport) -> bool {
        let world_pos = chunk.to_world(te.local);
        let corruption = match validate(te) {
            Verdict::Valid | Verdict::NoPowerItem => return false,
            Verdict::UnrecognizedTrigger(value) => {
                report.unrecognized += 1;
                warn!("方块实体 ({}) 的触发器类型 {} 无法识别，跳过", world_pos, value);
                self.status.report(&format!(
                    "警告：({}) 的触发器类型 {} 无法识别",
                    world_pos, value
                ));
                return false;
            }
            Verdict::Invalid(corruption) => corruption,
        };

        report.problems_found += 1;
        warn!("方块实体 {:?} ({}) 的供电物品损坏：{}", te.kind, world_pos, corruption);

        if self.mode == RepairMode::Simulate {
            self.status.report(&format!(
                "发现损坏的供电方块 {:?} ({})：{}",
                te.kind, world_pos, corruption
            ));
            return false;
        }

        match reconstruct(self.world, chunk, te) {
            Ok(lost_wiring) => {
                report.repaired += 1;
                self.status.report(&format!(
                    "已修复供电方块 {:?} ({})：{}",
                    te.kind, world_pos, corruption
                ));
                if lost_wiring > 0 {
                    self.status.report(&format!(
                        "警告：({}) 的 {} 条接线已丢失，需要重新接线",
                        world_pos, lost_wiring
                    ));
                }
                true
            }
            Err(e) => {
                report.failed += 1;
                error!("修复方块实体 ({}) 失败: {:?}", world_pos, e);
                self.status
                    .report(&format!("修复 ({}) 失败：{}", world_pos, e));
                false
            }
        }
    }
}

/// 按损坏实例的声明值构建新的方块实体
///
/// 触发器方块实体若声明类型既不是默认的 Consumer 也不是将要创建的空壳类型，
/// 则改为空壳类型，否则重建后的实体仍然无效。
pub fn fresh_tile_entity(chunk: ChunkPos, te: &TileEntity) -> Result<TileEntity, TeFixError> {
    let state = te.powered().ok_or_else(|| {
        TeFixError::Decode(format!("{:?} 不是供电方块实体", te.kind))
    })?;

    let mut declared = state.declared_kind;
    if te.kind.is_trigger() {
        // 无法识别的触发器类型会得到 Trigger 空壳
        let shell_kind = state
            .trigger_kind
            .and_then(|t| t.expected_power_kind())
            .unwrap_or(PowerItemKind::Trigger);
        if declared != shell_kind && declared != PowerItemKind::Consumer {
            declared = shell_kind;
        }
    }

    let mut fresh = TileEntity::new_powered(te.kind, chunk, te.local, declared, state.trigger_kind);
    if let (Some(new_state), Some(old_state)) = (fresh.powered_mut(), te.powered()) {
        new_state.is_player_placed = old_state.is_player_placed;
    }
    Ok(fresh)
}

/// 移除损坏的方块实体并放入重建的实例；返回丢失的接线数量
///
/// 添加失败时恢复原实例，不留下只删除未重建的状态。
pub fn reconstruct<W: HostWorld + ?Sized>(
    world: &mut W,
    chunk: ChunkPos,
    te: &TileEntity,
) -> Result<usize, TeFixError> {
    let fresh = fresh_tile_entity(chunk, te)?;

    let removed = world
        .remove_tile_entity(chunk, te.local)?
        .unwrap_or_else(|| te.clone());
    let lost_wiring = removed
        .power_item()
        .map(|item| item.children.len() + usize::from(item.parent.is_some()))
        .unwrap_or(0);

    if let Err(e) = world.add_tile_entity(chunk, fresh) {
        if let Err(restore) = world.add_tile_entity(chunk, removed) {
            error!(
                "无法恢复方块实体 ({}): {:?}",
                chunk.to_world(te.local),
                restore
            );
        }
        return Err(e);
    }

    Ok(lost_wiring)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::power::{PowerItem, TriggerKind};
    use crate::tile_entity::TileEntityKind;
    use crate::validator::is_valid;
    use crate::world::MemoryWorld;

    fn corrupt_trigger(world: &mut MemoryWorld, pos: Position) {
        let mut te = TileEntity::new_powered(
            TileEntityKind::Trigger,
            pos.chunk_pos(),
            pos.local_pos(),
            PowerItemKind::Consumer,
            Some(TriggerKind::TripWire),
        );
        te.powered_mut().unwrap().power_item = Some(PowerItem::new(PowerItemKind::TimerRelay, pos));
        world.place(pos, te).unwrap();
    }

    #[test]
    fn simulate_counts_without_changes() {
        let mut world = MemoryWorld::new();
        let pos = Position::new(4, 50, 4);
        corrupt_trigger(&mut world, pos);
        let before = world.tile_entity_at(pos).cloned();

        let mut lines: Vec<String> = Vec::new();
        let report = RepairEngine::new(&mut world, &mut lines)
            .run(RepairScope::AllLoadedChunks)
            .unwrap();
        assert_eq!(report.problems_found, 1);
        assert_eq!(report.repaired, 0);
        assert_eq!(world.tile_entity_at(pos).cloned(), before);
        assert!(world.modified_chunks().is_empty());
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn apply_rebuilds_with_declared_values() {
        let mut world = MemoryWorld::new();
        let pos = Position::new(4, 50, 4);
        corrupt_trigger(&mut world, pos);

        let mut lines: Vec<String> = Vec::new();
        let report = RepairEngine::new(&mut world, &mut lines)
            .mode(RepairMode::Apply)
            .run(RepairScope::SingleChunkAt(pos))
            .unwrap();
        assert_eq!(report.repaired, 1);

        let te = world.tile_entity_at(pos).unwrap();
        assert!(is_valid(te));
        let state = te.powered().unwrap();
        assert_eq!(state.declared_kind, PowerItemKind::Consumer);
        assert_eq!(state.trigger_kind, Some(TriggerKind::TripWire));
        assert_eq!(te.power_item().unwrap().kind(), PowerItemKind::TripWireRelay);
        assert_eq!(te.power_item().unwrap().position, pos);
        assert_eq!(world.modified_chunks(), &[pos.chunk_pos()]);
    }

    #[test]
    fn wrong_trigger_declaration_is_normalized() {
        let chunk = ChunkPos::new(0, 0);
        let te = TileEntity::new_powered(
            TileEntityKind::Trigger,
            chunk,
            Position::new(1, 1, 1),
            PowerItemKind::Generator,
            Some(TriggerKind::TimerRelay),
        );
        let fresh = fresh_tile_entity(chunk, &te).unwrap();
        assert_eq!(fresh.powered().unwrap().declared_kind, PowerItemKind::TimerRelay);
        assert!(is_valid(&fresh));
    }

    #[test]
    fn single_chunk_must_be_loaded() {
        let mut world = MemoryWorld::new();
        let mut lines: Vec<String> = Vec::new();
        let result = RepairEngine::new(&mut world, &mut lines)
            .run(RepairScope::SingleChunkAt(Position::new(100, 0, 100)));
        assert!(matches!(result, Err(TeFixError::AreaNotLoaded { .. })));
    }

    #[test]
    fn lost_wiring_is_reported() {
        let mut world = MemoryWorld::new();
        let source = Position::new(1, 50, 1);
        let switch = Position::new(2, 50, 1);
        world
            .place(
                source,
                TileEntity::new_powered(
                    TileEntityKind::PowerSource,
                    source.chunk_pos(),
                    source.local_pos(),
                    PowerItemKind::Generator,
                    None,
                ),
            )
            .unwrap();
        let mut te = TileEntity::new_powered(
            TileEntityKind::Trigger,
            switch.chunk_pos(),
            switch.local_pos(),
            PowerItemKind::Trigger,
            Some(TriggerKind::Switch),
        );
        let mut item = PowerItem::new(PowerItemKind::Consumer, switch);
        item.parent = Some(source);
        te.powered_mut().unwrap().power_item = Some(item);
        world.place(switch, te).unwrap();

        let mut lines: Vec<String> = Vec::new();
        RepairEngine::new(&mut world, &mut lines)
            .mode(RepairMode::Apply)
            .run(RepairScope::AllLoadedChunks)
            .unwrap();

        assert!(lines.iter().any(|l| l.contains("接线已丢失")));
        let source_item = world.tile_entity_at(source).unwrap().power_item().unwrap();
        assert!(source_item.children.is_empty());
        assert_eq!(world.tile_entity_at(switch).unwrap().power_item().unwrap().parent, None);
    }

    #[test]
    fn unknown_trigger_with_wrong_declaration_converges() {
        let mut world = MemoryWorld::new();
        let pos = Position::new(6, 40, 9);
        let te = TileEntity::new_powered(
            TileEntityKind::Trigger,
            pos.chunk_pos(),
            pos.local_pos(),
            PowerItemKind::Generator,
            Some(TriggerKind::Unknown(9)),
        );
        world.place(pos, te).unwrap();

        let mut lines: Vec<String> = Vec::new();
        let first = RepairEngine::new(&mut world, &mut lines)
            .mode(RepairMode::Apply)
            .run(RepairScope::AllLoadedChunks)
            .unwrap();
        assert_eq!(first.problems_found, 1);
        assert_eq!(first.repaired, 1);

        let te = world.tile_entity_at(pos).unwrap();
        assert_eq!(te.powered().unwrap().declared_kind, PowerItemKind::Trigger);
        assert_eq!(te.powered().unwrap().trigger_kind, Some(TriggerKind::Unknown(9)));
        assert!(is_valid(te));

        let second = RepairEngine::new(&mut world, &mut lines)
            .mode(RepairMode::Apply)
            .run(RepairScope::AllLoadedChunks)
            .unwrap();
        assert_eq!(second.problems_found, 0);
        assert_eq!(second.repaired, 0);
        assert_eq!(second.unrecognized, 1);
    }

    #[test]
    fn unrecognized_trigger_is_counted_and_reported() {
        let mut world = MemoryWorld::new();
        let pos = Position::new(2, 30, 2);
        let te = TileEntity::new_powered(
            TileEntityKind::Trigger,
            pos.chunk_pos(),
            pos.local_pos(),
            PowerItemKind::Consumer,
            Some(TriggerKind::Unknown(42)),
        );
        world.place(pos, te).unwrap();

        let mut lines: Vec<String> = Vec::new();
        let report = RepairEngine::new(&mut world, &mut lines)
            .mode(RepairMode::Apply)
            .run(RepairScope::AllLoadedChunks)
            .unwrap();
        assert_eq!(report.unrecognized, 1);
        assert_eq!(report.problems_found, 0);
        assert_eq!(report.repaired, 0);
        assert!(lines.iter().any(|l| l.contains("42") && l.contains("无法识别")));
    }

    /// 第一次添加方块实体失败的世界
    struct RejectingWorld {
        inner: MemoryWorld,
        reject_next_add: bool,
    }

    impl HostWorld for RejectingWorld {
        fn is_chunk_loaded(&self, chunk: ChunkPos) -> bool {
            self.inner.is_chunk_loaded(chunk)
        }

        fn loaded_chunks(&self) -> Vec<ChunkPos> {
            self.inner.loaded_chunks()
        }

        fn tile_entities_in(&self, chunk: ChunkPos) -> Option<Vec<TileEntity>> {
            self.inner.tile_entities_in(chunk)
        }

        fn remove_tile_entity(
            &mut self,
            chunk: ChunkPos,
            local: Position,
        ) -> Result<Option<TileEntity>, TeFixError> {
            self.inner.remove_tile_entity(chunk, local)
        }

        fn add_tile_entity(&mut self, chunk: ChunkPos, te: TileEntity) -> Result<(), TeFixError> {
            if self.reject_next_add {
                self.reject_next_add = false;
                return Err(TeFixError::PositionOccupied(chunk.to_world(te.local)));
            }
            self.inner.add_tile_entity(chunk, te)
        }

        fn chunk_modified(&mut self, chunk: ChunkPos) {
            self.inner.chunk_modified(chunk)
        }
    }

    #[test]
    fn failed_rebuild_restores_original() {
        let mut inner = MemoryWorld::new();
        let pos = Position::new(4, 50, 4);
        corrupt_trigger(&mut inner, pos);
        let before = inner.tile_entity_at(pos).cloned();
        let mut world = RejectingWorld {
            inner,
            reject_next_add: true,
        };

        let mut lines: Vec<String> = Vec::new();
        let report = RepairEngine::new(&mut world, &mut lines)
            .mode(RepairMode::Apply)
            .run(RepairScope::AllLoadedChunks)
            .unwrap();
        assert_eq!(report.problems_found, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.repaired, 0);
        assert_eq!(world.inner.tile_entity_at(pos).cloned(), before);
        assert!(world.inner.modified_chunks().is_empty());
        assert!(lines.iter().any(|l| l.contains("失败")));
    }
}
