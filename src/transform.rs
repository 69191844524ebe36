use crate::error::TeFixError;
use crate::types::{BoundingBox, Position};
use serde::{Deserialize, Serialize};

/// 绕竖直轴的旋转（顺时针，90° 为一步）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// 由步数 0..=3 构造，其他值视为参数错误
    pub fn from_steps(steps: i32) -> Result<Self, TeFixError> {
        match steps {
            0 => Ok(Rotation::None),
            1 => Ok(Rotation::Cw90),
            2 => Ok(Rotation::Cw180),
            3 => Ok(Rotation::Cw270),
            _ => Err(TeFixError::UserInput(format!(
                "无效的旋转值 {}，只允许 0、1、2、3",
                steps
            ))),
        }
    }

    pub fn steps(&self) -> i32 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 1,
            Rotation::Cw180 => 2,
            Rotation::Cw270 => 3,
        }
    }
}

impl TryFrom<i32> for Rotation {
    type Error = TeFixError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Rotation::from_steps(value)
    }
}

impl From<Rotation> for i32 {
    fn from(value: Rotation) -> Self {
        value.steps()
    }
}

/// 在远角为 `bounds_max` 的 0 基包围盒内旋转 x/z，y 不变
pub fn rotate(pos: Position, bounds_max: Position, rotation: Rotation) -> Position {
    match rotation {
        Rotation::None => pos,
        Rotation::Cw90 => Position::new(pos.z, pos.y, bounds_max.z - pos.x),
        Rotation::Cw180 => Position::new(bounds_max.x - pos.x, pos.y, bounds_max.z - pos.z),
        Rotation::Cw270 => Position::new(bounds_max.x - pos.z, pos.y, pos.x),
    }
}

/// 与 `rotate` 相同，坐标溢出时返回 None（用于来自文件的坐标）
pub fn checked_rotate(pos: Position, bounds_max: Position, rotation: Rotation) -> Option<Position> {
    Some(match rotation {
        Rotation::None => pos,
        Rotation::Cw90 => Position::new(pos.z, pos.y, bounds_max.z.checked_sub(pos.x)?),
        Rotation::Cw180 => Position::new(
            bounds_max.x.checked_sub(pos.x)?,
            pos.y,
            bounds_max.z.checked_sub(pos.z)?,
        ),
        Rotation::Cw270 => Position::new(bounds_max.x.checked_sub(pos.z)?, pos.y, pos.x),
    })
}

/// 以步数调用的旋转，步数非法时返回参数错误
pub fn rotate_steps(pos: Position, bounds_max: Position, steps: i32) -> Result<Position, TeFixError> {
    Ok(rotate(pos, bounds_max, Rotation::from_steps(steps)?))
}

pub fn translate(pos: Position, delta: Position) -> Position {
    pos + delta
}

/// 旋转后所有相对坐标覆盖的范围（相对于目标原点）
pub fn rotated_extent(bounds: &BoundingBox, rotation: Rotation) -> BoundingBox {
    let max = bounds.extent();
    let corners = [
        Position::new(0, 0, 0),
        Position::new(max.x, max.y, 0),
        Position::new(0, 0, max.z),
        Position::new(max.x, max.y, max.z),
    ];
    let mut rotated = corners.iter().map(|c| rotate(*c, max, rotation));
    let first = rotated.next().unwrap_or(Position::ZERO);
    rotated.fold(BoundingBox::new(first, first), |acc, p| {
        BoundingBox::new(
            Position::new(acc.min.x.min(p.x), acc.min.y.min(p.y), acc.min.z.min(p.z)),
            Position::new(acc.max.x.max(p.x), acc.max.y.max(p.y), acc.max.z.max(p.z)),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_positions() -> Vec<Position> {
        let mut positions = Vec::new();
        for x in [-3, 0, 2, 7] {
            for z in [-1, 0, 5, 11] {
                positions.push(Position::new(x, 4, z));
            }
        }
        positions
    }

    #[test]
    fn four_quarter_turns_are_identity() {
        for bounds_max in [Position::new(7, 3, 11), Position::new(4, 0, 4), Position::new(0, 0, 9)] {
            for pos in sample_positions() {
                let mut p = pos;
                for _ in 0..4 {
                    p = rotate(p, bounds_max, Rotation::Cw90);
                }
                assert_eq!(p, pos);
                assert_eq!(rotate(pos, bounds_max, Rotation::None), pos);
            }
        }
    }

    #[test]
    fn quarter_turn_formulas() {
        let max = Position::new(10, 5, 20);
        let pos = Position::new(1, 2, 3);
        assert_eq!(rotate(pos, max, Rotation::Cw90), Position::new(3, 2, 19));
        assert_eq!(rotate(pos, max, Rotation::Cw180), Position::new(9, 2, 17));
        assert_eq!(rotate(pos, max, Rotation::Cw270), Position::new(7, 2, 1));
    }

    #[test]
    fn checked_rotation_matches_and_detects_overflow() {
        let max = Position::new(10, 5, 20);
        for rotation in [Rotation::None, Rotation::Cw90, Rotation::Cw180, Rotation::Cw270] {
            for pos in sample_positions() {
                assert_eq!(checked_rotate(pos, max, rotation), Some(rotate(pos, max, rotation)));
            }
        }
        let hostile = Position::new(i32::MIN, 0, 0);
        assert_eq!(checked_rotate(hostile, max, Rotation::Cw90), None);
        assert_eq!(checked_rotate(hostile, max, Rotation::None), Some(hostile));
    }

    #[test]
    fn invalid_steps_are_user_errors() {
        assert!(matches!(Rotation::from_steps(4), Err(TeFixError::UserInput(_))));
        assert!(matches!(
            rotate_steps(Position::ZERO, Position::ZERO, -1),
            Err(TeFixError::UserInput(_))
        ));
    }

    #[test]
    fn rotated_extent_covers_every_rotated_position() {
        let bounds = BoundingBox::new(Position::new(100, 10, 50), Position::new(105, 12, 58));
        for steps in 0..4 {
            let rotation = Rotation::from_steps(steps).unwrap();
            let extent = rotated_extent(&bounds, rotation);
            let max = bounds.extent();
            for x in 0..=max.x {
                for z in 0..=max.z {
                    let p = rotate(Position::new(x, 1, z), max, rotation);
                    assert!(extent.contains(p), "{:?} outside {:?}", p, extent);
                }
            }
        }
    }
}
