//! 供电方块实体与其供电物品的一致性规则。

use crate::power::{PowerItemKind, TriggerKind};
use crate::tile_entity::TileEntity;
use std::fmt;

/// 具体的损坏特征
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
    /// 触发器方块实体挂着非触发器物品
    NotATrigger { actual: PowerItemKind },
    /// 声明类型与实际物品类型不符
    DeclaredKindMismatch {
        declared: PowerItemKind,
        actual: PowerItemKind,
    },
    /// 触发器类型对应的变体与实际物品不符
    TriggerVariantMismatch {
        trigger_kind: TriggerKind,
        expected: PowerItemKind,
        actual: PowerItemKind,
    },
    /// 方块实体与物品上的触发器类型不一致
    TriggerKindMismatch {
        tile_entity: TriggerKind,
        item: Option<TriggerKind>,
    },
}

impl fmt::Display for Corruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Corruption::NotATrigger { actual } => {
                write!(f, "触发器方块挂着非触发器供电物品 {:?}", actual)
            }
            Corruption::DeclaredKindMismatch { declared, actual } => {
                write!(f, "声明类型 {:?} 与供电物品类型 {:?} 不符", declared, actual)
            }
            Corruption::TriggerVariantMismatch {
                trigger_kind,
                expected,
                actual,
            } => write!(
                f,
                "触发器类型 {:?} 应对应 {:?}，实际为 {:?}",
                trigger_kind, expected, actual
            ),
            Corruption::TriggerKindMismatch { tile_entity, item } => write!(
                f,
                "方块实体触发器类型 {:?} 与供电物品触发器类型 {:?} 不一致",
                tile_entity, item
            ),
        }
    }
}

/// 校验结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    /// 没有挂接供电物品（尚未接线的方块很常见）
    NoPowerItem,
    /// 触发器类型无法识别；无从判断冲突，按有效处理，但必须上报
    UnrecognizedTrigger(u8),
    Invalid(Corruption),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        !matches!(self, Verdict::Invalid(_))
    }
}

pub fn is_valid(te: &TileEntity) -> bool {
    validate(te).is_valid()
}

/// 按顺序应用规则，遇到第一个失败即返回
///
/// 非供电方块实体总是有效。
pub fn validate(te: &TileEntity) -> Verdict {
    let Some(state) = te.powered() else {
        return Verdict::Valid;
    };
    let Some(item) = state.power_item.as_ref() else {
        return Verdict::NoPowerItem;
    };
    let actual = item.kind();

    if !te.kind.is_trigger() {
        if state.declared_kind != actual {
            return Verdict::Invalid(Corruption::DeclaredKindMismatch {
                declared: state.declared_kind,
                actual,
            });
        }
        return Verdict::Valid;
    }

    if !actual.is_trigger_family() {
        return Verdict::Invalid(Corruption::NotATrigger { actual });
    }

    // 触发器方块实体上的声明类型常停留在默认的 Consumer，只能接受
    if state.declared_kind != actual && state.declared_kind != PowerItemKind::Consumer {
        return Verdict::Invalid(Corruption::DeclaredKindMismatch {
            declared: state.declared_kind,
            actual,
        });
    }

    let trigger_kind = state.trigger_kind.unwrap_or(TriggerKind::Switch);
    let mut verdict = Verdict::Valid;
    match trigger_kind.expected_power_kind() {
        Some(expected) if expected != actual => {
            return Verdict::Invalid(Corruption::TriggerVariantMismatch {
                trigger_kind,
                expected,
                actual,
            });
        }
        Some(_) => {}
        None => verdict = Verdict::UnrecognizedTrigger(trigger_kind.as_u8()),
    }

    if item.trigger_kind() != Some(trigger_kind) {
        return Verdict::Invalid(Corruption::TriggerKindMismatch {
            tile_entity: trigger_kind,
            item: item.trigger_kind(),
        });
    }

    verdict
}
