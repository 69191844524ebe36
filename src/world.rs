//! 与宿主世界交互的接口，以及用于工具与测试的内存世界实现。

use crate::error::TeFixError;
use crate::tile_entity::TileEntity;
use crate::transform::Rotation;
use crate::types::{BoundingBox, ChunkPos, Position};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// 宿主世界适配器：只暴露本库需要的区块与方块实体操作
pub trait HostWorld {
    /// 区块是否已加载
    fn is_chunk_loaded(&self, chunk: ChunkPos) -> bool;

    /// 当前已加载的区块
    fn loaded_chunks(&self) -> Vec<ChunkPos>;

    /// 区块中的方块实体；区块未加载时返回 None
    fn tile_entities_in(&self, chunk: ChunkPos) -> Option<Vec<TileEntity>>;

    /// 移除方块实体，同时将其供电物品从供电网络中断开
    fn remove_tile_entity(
        &mut self,
        chunk: ChunkPos,
        local: Position,
    ) -> Result<Option<TileEntity>, TeFixError>;

    /// 添加方块实体，同时将其供电物品挂接到供电网络并重建下游端点
    fn add_tile_entity(&mut self, chunk: ChunkPos, te: TileEntity) -> Result<(), TeFixError>;

    /// 区块内容已改变，宿主可据此向客户端同步
    fn chunk_modified(&mut self, _chunk: ChunkPos) {}
}

/// 进度/结果输出
pub trait StatusSink {
    fn report(&mut self, message: &str);
}

impl StatusSink for Vec<String> {
    fn report(&mut self, message: &str) {
        self.push(message.to_string());
    }
}

/// 将状态输出转发到日志
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn report(&mut self, message: &str) {
        info!("{}", message);
    }
}

/// 方块几何（预制件）的保存与恢复，由宿主实现
pub trait PrefabStore {
    fn save_geometry(&mut self, bounds: &BoundingBox, path: &Path) -> Result<(), TeFixError>;

    fn load_geometry(&mut self, path: &Path, origin: Position, rotation: Rotation) -> Result<(), TeFixError>;
}

/// 不处理几何的预制件存储
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrefab;

impl PrefabStore for NoPrefab {
    fn save_geometry(&mut self, _bounds: &BoundingBox, _path: &Path) -> Result<(), TeFixError> {
        Ok(())
    }

    fn load_geometry(&mut self, _path: &Path, _origin: Position, _rotation: Rotation) -> Result<(), TeFixError> {
        Ok(())
    }
}

/// 区块数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub pos: ChunkPos,
    #[serde(default)]
    pub tile_entities: Vec<TileEntity>,
}

impl Chunk {
    pub fn new(pos: ChunkPos) -> Self {
        Self {
            pos,
            tile_entities: Vec::new(),
        }
    }

    pub fn get(&self, local: Position) -> Option<&TileEntity> {
        self.tile_entities.iter().find(|te| te.local == local)
    }

    fn get_mut(&mut self, local: Position) -> Option<&mut TileEntity> {
        self.tile_entities.iter_mut().find(|te| te.local == local)
    }
}

/// 世界快照（JSON）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub chunks: Vec<Chunk>,
}

/// 内存中的世界，实现完整的供电网络接线规则
#[derive(Debug, Clone, Default)]
pub struct MemoryWorld {
    chunks: BTreeMap<ChunkPos, Chunk>,
    modified: Vec<ChunkPos>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加载一个空区块（已存在则保持不变）
    pub fn load_chunk(&mut self, pos: ChunkPos) {
        self.chunks.entry(pos).or_insert_with(|| Chunk::new(pos));
    }

    /// 加载包围盒覆盖的所有区块
    pub fn load_area(&mut self, bounds: &BoundingBox) {
        for chunk in bounds.chunks() {
            self.load_chunk(chunk);
        }
    }

    pub fn unload_chunk(&mut self, pos: ChunkPos) -> Option<Chunk> {
        self.chunks.remove(&pos)
    }

    pub fn chunk(&self, pos: ChunkPos) -> Option<&Chunk> {
        self.chunks.get(&pos)
    }

    /// 按世界坐标查找方块实体
    pub fn tile_entity_at(&self, world: Position) -> Option<&TileEntity> {
        self.chunks
            .get(&world.chunk_pos())
            .and_then(|chunk| chunk.get(world.local_pos()))
    }

    /// 按世界坐标放置方块实体（区块不存在时自动加载）
    pub fn place(&mut self, world: Position, mut te: TileEntity) -> Result<(), TeFixError> {
        let chunk = world.chunk_pos();
        te.local = world.local_pos();
        self.load_chunk(chunk);
        self.add_tile_entity(chunk, te)
    }

    /// 被通知修改过的区块（按通知顺序）
    pub fn modified_chunks(&self) -> &[ChunkPos] {
        &self.modified
    }

    pub fn tile_entity_count(&self) -> usize {
        self.chunks.values().map(|c| c.tile_entities.len()).sum()
    }

    pub fn from_snapshot(snapshot: WorldSnapshot) -> Self {
        let mut world = MemoryWorld::new();
        for chunk in snapshot.chunks {
            world.chunks.insert(chunk.pos, chunk);
        }
        world
    }

    pub fn to_snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            chunks: self.chunks.values().cloned().collect(),
        }
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, TeFixError> {
        let reader = BufReader::new(File::open(path)?);
        let snapshot: WorldSnapshot = serde_json::from_reader(reader)?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), TeFixError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &self.to_snapshot())?;
        writer.flush()?;
        Ok(())
    }

    fn item_mut_at(&mut self, world: Position) -> Option<&mut crate::power::PowerItem> {
        self.chunks
            .get_mut(&world.chunk_pos())
            .and_then(|chunk| chunk.get_mut(world.local_pos()))
            .and_then(|te| te.power_item_mut())
    }

    fn positions_with_parent(&self, parent: Position) -> Vec<Position> {
        self.chunks
            .values()
            .flat_map(|chunk| chunk.tile_entities.iter())
            .filter_map(|te| te.power_item())
            .filter(|item| item.parent == Some(parent))
            .map(|item| item.position)
            .collect()
    }
}

impl HostWorld for MemoryWorld {
    fn is_chunk_loaded(&self, chunk: ChunkPos) -> bool {
        self.chunks.contains_key(&chunk)
    }

    fn loaded_chunks(&self) -> Vec<ChunkPos> {
        self.chunks.keys().copied().collect()
    }

    fn tile_entities_in(&self, chunk: ChunkPos) -> Option<Vec<TileEntity>> {
        self.chunks.get(&chunk).map(|c| c.tile_entities.clone())
    }

    fn remove_tile_entity(
        &mut self,
        chunk: ChunkPos,
        local: Position,
    ) -> Result<Option<TileEntity>, TeFixError> {
        let Some(data) = self.chunks.get_mut(&chunk) else {
            return Err(TeFixError::AreaNotLoaded { chunk });
        };
        let Some(index) = data.tile_entities.iter().position(|te| te.local == local) else {
            return Ok(None);
        };
        let removed = data.tile_entities.remove(index);

        if let Some(item) = removed.power_item() {
            let position = item.position;
            if let Some(parent) = item.parent.and_then(|p| self.item_mut_at(p)) {
                parent.children.retain(|c| *c != position);
            }
            for child in self.positions_with_parent(position) {
                if let Some(child) = self.item_mut_at(child) {
                    child.parent = None;
                }
            }
            debug!("供电物品 ({}) 已从网络断开", position);
        }

        Ok(Some(removed))
    }

    fn add_tile_entity(&mut self, chunk: ChunkPos, mut te: TileEntity) -> Result<(), TeFixError> {
        if !self.chunks.contains_key(&chunk) {
            return Err(TeFixError::AreaNotLoaded { chunk });
        }
        if self.chunks.get(&chunk).and_then(|c| c.get(te.local)).is_some() {
            return Err(TeFixError::PositionOccupied(chunk.to_world(te.local)));
        }

        let wiring = te.power_item().map(|item| (item.position, item.parent));
        if let Some((position, _)) = wiring {
            let children = self.positions_with_parent(position);
            if let Some(item) = te.power_item_mut() {
                item.children = children;
            }
        }

        if let Some(data) = self.chunks.get_mut(&chunk) {
            data.tile_entities.push(te);
        }

        if let Some((position, Some(parent))) = wiring {
            if let Some(parent) = self.item_mut_at(parent) {
                if !parent.children.contains(&position) {
                    parent.children.push(position);
                }
            }
        }

        Ok(())
    }

    fn chunk_modified(&mut self, chunk: ChunkPos) {
        if !self.modified.contains(&chunk) {
            self.modified.push(chunk);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::power::PowerItemKind;
    use crate::tile_entity::TileEntityKind;

    fn powered(world: Position, kind: PowerItemKind, parent: Option<Position>) -> TileEntity {
        let mut te = TileEntity::new_powered(
            TileEntityKind::Powered,
            world.chunk_pos(),
            world.local_pos(),
            kind,
            None,
        );
        if let Some(item) = te.power_item_mut() {
            item.parent = parent;
        }
        te
    }

    #[test]
    fn attaching_rebuilds_children_in_any_order() {
        let mut world = MemoryWorld::new();
        let source = Position::new(1, 60, 1);
        let lamp = Position::new(20, 60, 3);

        world.place(lamp, powered(lamp, PowerItemKind::Consumer, Some(source))).unwrap();
        world
            .place(source, powered(source, PowerItemKind::Generator, None))
            .unwrap();

        let source_item = world.tile_entity_at(source).unwrap().power_item().unwrap();
        assert_eq!(source_item.children, vec![lamp]);

        let other = Position::new(2, 60, 1);
        world
            .place(other, powered(other, PowerItemKind::Consumer, Some(source)))
            .unwrap();
        let source_item = world.tile_entity_at(source).unwrap().power_item().unwrap();
        assert_eq!(source_item.children, vec![lamp, other]);
    }

    #[test]
    fn removing_unwires_both_directions() {
        let mut world = MemoryWorld::new();
        let source = Position::new(1, 60, 1);
        let relay = Position::new(3, 60, 1);
        let lamp = Position::new(5, 60, 1);
        world.place(source, powered(source, PowerItemKind::Generator, None)).unwrap();
        world.place(relay, powered(relay, PowerItemKind::ElectricWireRelay, Some(source))).unwrap();
        world.place(lamp, powered(lamp, PowerItemKind::Consumer, Some(relay))).unwrap();

        let removed = world
            .remove_tile_entity(relay.chunk_pos(), relay.local_pos())
            .unwrap()
            .unwrap();
        assert_eq!(removed.power_item().unwrap().children, vec![lamp]);

        let source_item = world.tile_entity_at(source).unwrap().power_item().unwrap();
        assert!(source_item.children.is_empty());
        let lamp_item = world.tile_entity_at(lamp).unwrap().power_item().unwrap();
        assert_eq!(lamp_item.parent, None);
    }

    #[test]
    fn occupied_position_and_unloaded_chunk_are_errors() {
        let mut world = MemoryWorld::new();
        let pos = Position::new(0, 1, 0);
        world.place(pos, TileEntity::new(TileEntityKind::Loot, pos)).unwrap();
        assert!(matches!(
            world.add_tile_entity(pos.chunk_pos(), TileEntity::new(TileEntityKind::Sign, pos)),
            Err(TeFixError::PositionOccupied(_))
        ));
        assert!(matches!(
            world.add_tile_entity(ChunkPos::new(9, 9), TileEntity::new(TileEntityKind::Sign, pos)),
            Err(TeFixError::AreaNotLoaded { .. })
        ));
    }

    #[test]
    fn snapshot_survives_json() {
        let mut world = MemoryWorld::new();
        let pos = Position::new(-3, 70, 18);
        world.place(pos, powered(pos, PowerItemKind::SolarPanel, None)).unwrap();

        let json = serde_json::to_string(&world.to_snapshot()).unwrap();
        let restored = MemoryWorld::from_snapshot(serde_json::from_str(&json).unwrap());
        assert_eq!(restored.tile_entity_at(pos), world.tile_entity_at(pos));
    }
}
