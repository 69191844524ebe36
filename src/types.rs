use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// 区块边长（x 与 z 方向）
pub const CHUNK_SIZE: i32 = 16;

/// 方块位置（世界坐标或区块内局部坐标）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub const ZERO: Position = Position { x: 0, y: 0, z: 0 };

    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// 逐分量相加，任一分量溢出时返回 None
    pub fn checked_add(self, rhs: Position) -> Option<Position> {
        Some(Position::new(
            self.x.checked_add(rhs.x)?,
            self.y.checked_add(rhs.y)?,
            self.z.checked_add(rhs.z)?,
        ))
    }

    pub fn checked_sub(self, rhs: Position) -> Option<Position> {
        Some(Position::new(
            self.x.checked_sub(rhs.x)?,
            self.y.checked_sub(rhs.y)?,
            self.z.checked_sub(rhs.z)?,
        ))
    }

    /// 获取该位置所在的区块坐标
    pub fn chunk_pos(&self) -> ChunkPos {
        ChunkPos {
            x: self.x >> 4,
            z: self.z >> 4,
        }
    }

    /// 获取相对于所在区块的局部坐标（y 不变）
    pub fn local_pos(&self) -> Position {
        Position {
            x: self.x & 0xF,
            y: self.y,
            z: self.z & 0xF,
        }
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.x, self.y, self.z)
    }
}

/// 区块位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// 区块原点的世界坐标（y 为 0）
    pub fn origin(&self) -> Position {
        Position::new(self.x * CHUNK_SIZE, 0, self.z * CHUNK_SIZE)
    }

    /// 局部坐标转换为世界坐标
    pub fn to_world(&self, local: Position) -> Position {
        self.origin() + local
    }
}

/// 闭区间包围盒，构造时保证 min <= max
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Position,
    pub max: Position,
}

impl BoundingBox {
    /// 由任意两个角点构造，并规范化为 min/max
    pub fn new(a: Position, b: Position) -> Self {
        Self {
            min: Position::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Position::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// 以 0 为原点的远角坐标
    pub fn extent(&self) -> Position {
        self.max - self.min
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= self.min.x
            && pos.x <= self.max.x
            && pos.y >= self.min.y
            && pos.y <= self.max.y
            && pos.z >= self.min.z
            && pos.z <= self.max.z
    }

    /// 包围盒覆盖的所有区块，按 (x, z) 排序
    pub fn chunks(&self) -> Vec<ChunkPos> {
        let from = self.min.chunk_pos();
        let to = self.max.chunk_pos();
        let mut chunks = Vec::new();
        for x in from.x..=to.x {
            for z in from.z..=to.z {
                chunks.push(ChunkPos::new(x, z));
            }
        }
        chunks
    }

    pub fn translate(&self, delta: Position) -> Self {
        Self {
            min: self.min + delta,
            max: self.max + delta,
        }
    }
}

/// 物品堆（弹药、燃料槽等）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemStack {
    pub item_id: i32,
    pub count: i32,
}

impl ItemStack {
    pub fn new(item_id: i32, count: i32) -> Self {
        Self { item_id, count }
    }

    pub fn is_empty(&self) -> bool {
        self.item_id == 0 || self.count <= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_and_local_for_negative_coordinates() {
        let pos = Position::new(-1, 40, -17);
        assert_eq!(pos.chunk_pos(), ChunkPos::new(-1, -2));
        assert_eq!(pos.local_pos(), Position::new(15, 40, 15));
        assert_eq!(pos.chunk_pos().to_world(pos.local_pos()), pos);
    }

    #[test]
    fn bounding_box_is_canonicalized() {
        let bounds = BoundingBox::new(Position::new(10, 5, -3), Position::new(-2, 1, 4));
        assert_eq!(bounds.min, Position::new(-2, 1, -3));
        assert_eq!(bounds.max, Position::new(10, 5, 4));
        assert_eq!(bounds.extent(), Position::new(12, 4, 7));
        assert!(bounds.contains(Position::new(0, 3, 0)));
        assert!(!bounds.contains(Position::new(0, 6, 0)));
    }

    #[test]
    fn bounding_box_chunks_cover_both_corners() {
        let bounds = BoundingBox::new(Position::new(-1, 0, 0), Position::new(16, 0, 15));
        assert_eq!(
            bounds.chunks(),
            vec![ChunkPos::new(-1, 0), ChunkPos::new(0, 0), ChunkPos::new(1, 0)]
        );
    }

    #[test]
    fn checked_arithmetic_reports_overflow() {
        let far = Position::new(i32::MAX, 0, 0);
        assert_eq!(far.checked_add(Position::new(1, 0, 0)), None);
        assert_eq!(
            Position::new(i32::MIN, 0, 0).checked_sub(Position::new(0, 0, 1)),
            Some(Position::new(i32::MIN, 0, -1))
        );
        assert_eq!(Position::new(0, i32::MIN, 0).checked_sub(Position::new(0, 1, 0)), None);
        assert_eq!(far.checked_sub(far), Some(Position::ZERO));
    }
}
