//! 供电物品：闭合的变体集合与其增量编码。
//!
//! 每个变体只写入自己的字段集合；所有变体都先写入公共的上游（parent）坐标。
//! 下游（children）坐标从不持久化，由宿主在挂接物品时重建。

use crate::error::TeFixError;
use crate::types::{ItemStack, Position};
use crate::utils::{
    read_bool, read_item_stack, read_position, write_bool, write_item_stack, write_position,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// 当前写入的供电物品版本
pub const POWER_ITEM_VERSION: u8 = 1;

/// 供电物品类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PowerItemKind {
    Consumer = 1,
    ConsumerToggle = 2,
    Trigger = 3,
    TimerRelay = 4,
    Generator = 5,
    SolarPanel = 6,
    BatteryBank = 7,
    RangedTrap = 8,
    ElectricWireRelay = 9,
    TripWireRelay = 10,
    PressurePlate = 11,
    ConsumerSingle = 12,
}

impl PowerItemKind {
    pub fn from_u8(value: u8) -> Result<Self, TeFixError> {
        match value {
            1 => Ok(PowerItemKind::Consumer),
            2 => Ok(PowerItemKind::ConsumerToggle),
            3 => Ok(PowerItemKind::Trigger),
            4 => Ok(PowerItemKind::TimerRelay),
            5 => Ok(PowerItemKind::Generator),
            6 => Ok(PowerItemKind::SolarPanel),
            7 => Ok(PowerItemKind::BatteryBank),
            8 => Ok(PowerItemKind::RangedTrap),
            9 => Ok(PowerItemKind::ElectricWireRelay),
            10 => Ok(PowerItemKind::TripWireRelay),
            11 => Ok(PowerItemKind::PressurePlate),
            12 => Ok(PowerItemKind::ConsumerSingle),
            _ => Err(TeFixError::UnknownPowerItemKind(value)),
        }
    }

    /// 是否属于触发器分支（Trigger 及其派生）
    pub fn is_trigger_family(&self) -> bool {
        matches!(
            self,
            PowerItemKind::Trigger
                | PowerItemKind::PressurePlate
                | PowerItemKind::TripWireRelay
                | PowerItemKind::TimerRelay
                | PowerItemKind::ElectricWireRelay
        )
    }

    /// 是否属于电源分支
    pub fn is_source_family(&self) -> bool {
        matches!(
            self,
            PowerItemKind::Generator | PowerItemKind::SolarPanel | PowerItemKind::BatteryBank
        )
    }
}

/// 触发器类型；未知值原样保留，用于发现数据结构漂移
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerKind {
    Switch,
    PressurePlate,
    TimerRelay,
    Motion,
    TripWire,
    Unknown(u8),
}

impl TriggerKind {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => TriggerKind::Switch,
            1 => TriggerKind::PressurePlate,
            2 => TriggerKind::TimerRelay,
            3 => TriggerKind::Motion,
            4 => TriggerKind::TripWire,
            other => TriggerKind::Unknown(other),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            TriggerKind::Switch => 0,
            TriggerKind::PressurePlate => 1,
            TriggerKind::TimerRelay => 2,
            TriggerKind::Motion => 3,
            TriggerKind::TripWire => 4,
            TriggerKind::Unknown(other) => *other,
        }
    }

    /// 该触发器类型对应的供电物品变体；未知类型返回 None
    pub fn expected_power_kind(&self) -> Option<PowerItemKind> {
        match self {
            TriggerKind::Switch => Some(PowerItemKind::Trigger),
            TriggerKind::PressurePlate => Some(PowerItemKind::PressurePlate),
            TriggerKind::TimerRelay => Some(PowerItemKind::TimerRelay),
            TriggerKind::Motion => Some(PowerItemKind::Trigger),
            TriggerKind::TripWire => Some(PowerItemKind::TripWireRelay),
            TriggerKind::Unknown(_) => None,
        }
    }

    fn has_timing(&self) -> bool {
        matches!(
            self,
            TriggerKind::PressurePlate | TriggerKind::TripWire | TriggerKind::Motion
        )
    }
}

/// 触发器共有字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerState {
    pub trigger_kind: TriggerKind,
    pub is_active: bool,
    pub delay_ticks: u16,
    pub power_ticks: u16,
    pub target_flags: i32,
}

impl TriggerState {
    pub fn new(trigger_kind: TriggerKind) -> Self {
        Self {
            trigger_kind,
            is_active: false,
            delay_ticks: 0,
            power_ticks: 0,
            target_flags: 0,
        }
    }
}

/// 电源共有字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceState {
    pub current_power: u16,
    pub is_on: bool,
    pub slot: ItemStack,
}

/// 供电物品变体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerVariant {
    Consumer,
    ConsumerToggle { is_toggled: bool },
    ConsumerSingle,
    RangedTrap { is_locked: bool, ammo: ItemStack, target_flags: i32 },
    Trigger(TriggerState),
    PressurePlate(TriggerState),
    TripWireRelay(TriggerState),
    ElectricWireRelay(TriggerState),
    TimerRelay { trigger: TriggerState, start_time: u16, end_time: u16 },
    Generator { source: SourceState, current_fuel: u16 },
    SolarPanel(SourceState),
    BatteryBank(SourceState),
}

impl PowerVariant {
    /// 某类型的默认变体
    pub fn default_for(kind: PowerItemKind) -> Self {
        match kind {
            PowerItemKind::Consumer => PowerVariant::Consumer,
            PowerItemKind::ConsumerToggle => PowerVariant::ConsumerToggle { is_toggled: false },
            PowerItemKind::ConsumerSingle => PowerVariant::ConsumerSingle,
            PowerItemKind::RangedTrap => PowerVariant::RangedTrap {
                is_locked: false,
                ammo: ItemStack::default(),
                target_flags: 0,
            },
            PowerItemKind::Trigger => PowerVariant::Trigger(TriggerState::new(TriggerKind::Switch)),
            PowerItemKind::PressurePlate => {
                PowerVariant::PressurePlate(TriggerState::new(TriggerKind::PressurePlate))
            }
            PowerItemKind::TripWireRelay => {
                PowerVariant::TripWireRelay(TriggerState::new(TriggerKind::TripWire))
            }
            PowerItemKind::ElectricWireRelay => {
                PowerVariant::ElectricWireRelay(TriggerState::new(TriggerKind::Switch))
            }
            PowerItemKind::TimerRelay => PowerVariant::TimerRelay {
                trigger: TriggerState::new(TriggerKind::TimerRelay),
                start_time: 0,
                end_time: 0,
            },
            PowerItemKind::Generator => PowerVariant::Generator {
                source: SourceState::default(),
                current_fuel: 0,
            },
            PowerItemKind::SolarPanel => PowerVariant::SolarPanel(SourceState::default()),
            PowerItemKind::BatteryBank => PowerVariant::BatteryBank(SourceState::default()),
        }
    }

    pub fn kind(&self) -> PowerItemKind {
        match self {
            PowerVariant::Consumer => PowerItemKind::Consumer,
            PowerVariant::ConsumerToggle { .. } => PowerItemKind::ConsumerToggle,
            PowerVariant::ConsumerSingle => PowerItemKind::ConsumerSingle,
            PowerVariant::RangedTrap { .. } => PowerItemKind::RangedTrap,
            PowerVariant::Trigger(_) => PowerItemKind::Trigger,
            PowerVariant::PressurePlate(_) => PowerItemKind::PressurePlate,
            PowerVariant::TripWireRelay(_) => PowerItemKind::TripWireRelay,
            PowerVariant::ElectricWireRelay(_) => PowerItemKind::ElectricWireRelay,
            PowerVariant::TimerRelay { .. } => PowerItemKind::TimerRelay,
            PowerVariant::Generator { .. } => PowerItemKind::Generator,
            PowerVariant::SolarPanel(_) => PowerItemKind::SolarPanel,
            PowerVariant::BatteryBank(_) => PowerItemKind::BatteryBank,
        }
    }

    pub fn trigger(&self) -> Option<&TriggerState> {
        match self {
            PowerVariant::Trigger(t)
            | PowerVariant::PressurePlate(t)
            | PowerVariant::TripWireRelay(t)
            | PowerVariant::ElectricWireRelay(t)
            | PowerVariant::TimerRelay { trigger: t, .. } => Some(t),
            _ => None,
        }
    }

    pub fn trigger_mut(&mut self) -> Option<&mut TriggerState> {
        match self {
            PowerVariant::Trigger(t)
            | PowerVariant::PressurePlate(t)
            | PowerVariant::TripWireRelay(t)
            | PowerVariant::ElectricWireRelay(t)
            | PowerVariant::TimerRelay { trigger: t, .. } => Some(t),
            _ => None,
        }
    }
}

/// 挂在供电方块实体上的供电物品
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerItem {
    /// 世界坐标
    pub position: Position,
    /// 上游接线端点
    pub parent: Option<Position>,
    /// 下游接线端点（不持久化）
    #[serde(default)]
    pub children: Vec<Position>,
    pub variant: PowerVariant,
}

impl PowerItem {
    /// 创建某类型的空壳物品
    pub fn new(kind: PowerItemKind, position: Position) -> Self {
        Self {
            position,
            parent: None,
            children: Vec::new(),
            variant: PowerVariant::default_for(kind),
        }
    }

    /// 创建触发器壳，并同步触发器类型
    pub fn new_trigger(kind: PowerItemKind, trigger_kind: TriggerKind, position: Position) -> Self {
        let mut item = Self::new(kind, position);
        if let Some(trigger) = item.variant.trigger_mut() {
            trigger.trigger_kind = trigger_kind;
        }
        item
    }

    pub fn kind(&self) -> PowerItemKind {
        self.variant.kind()
    }

    pub fn trigger_kind(&self) -> Option<TriggerKind> {
        self.variant.trigger().map(|t| t.trigger_kind)
    }
}

/// 写入供电物品负载
pub fn write_power_item<W: Write>(writer: &mut W, item: &PowerItem) -> Result<(), TeFixError> {
    write_bool(writer, item.parent.is_some())?;
    if let Some(parent) = item.parent {
        write_position(writer, parent)?;
    }

    match &item.variant {
        PowerVariant::Consumer | PowerVariant::ConsumerSingle => {}
        PowerVariant::ConsumerToggle { is_toggled } => write_bool(writer, *is_toggled)?,
        PowerVariant::RangedTrap {
            is_locked,
            ammo,
            target_flags,
        } => {
            write_bool(writer, *is_locked)?;
            write_item_stack(writer, ammo)?;
            writer.write_i32::<LittleEndian>(*target_flags)?;
        }
        PowerVariant::Trigger(trigger)
        | PowerVariant::PressurePlate(trigger)
        | PowerVariant::TripWireRelay(trigger)
        | PowerVariant::ElectricWireRelay(trigger) => write_trigger(writer, trigger)?,
        PowerVariant::TimerRelay {
            trigger,
            start_time,
            end_time,
        } => {
            write_trigger(writer, trigger)?;
            writer.write_u16::<LittleEndian>(*start_time)?;
            writer.write_u16::<LittleEndian>(*end_time)?;
        }
        PowerVariant::Generator {
            source,
            current_fuel,
        } => {
            write_source(writer, source)?;
            writer.write_u16::<LittleEndian>(*current_fuel)?;
        }
        PowerVariant::SolarPanel(source) | PowerVariant::BatteryBank(source) => {
            write_source(writer, source)?
        }
    }

    Ok(())
}

/// 按声明类型读取供电物品
pub fn read_power_item<R: Read>(
    reader: &mut R,
    declared: PowerItemKind,
    position: Position,
) -> Result<PowerItem, TeFixError> {
    let mut item = PowerItem::new(declared, position);
    read_power_item_into(reader, &mut item)?;
    Ok(item)
}

/// 以原始类型字节读取供电物品
pub fn read_power_item_raw<R: Read>(
    reader: &mut R,
    declared: u8,
    position: Position,
) -> Result<PowerItem, TeFixError> {
    read_power_item(reader, PowerItemKind::from_u8(declared)?, position)
}

/// 填充已存在的物品壳；变体由壳决定，位置与下游端点保持不变
pub fn read_power_item_into<R: Read>(reader: &mut R, item: &mut PowerItem) -> Result<(), TeFixError> {
    item.parent = if read_bool(reader)? {
        Some(read_position(reader)?)
    } else {
        None
    };

    match &mut item.variant {
        PowerVariant::Consumer | PowerVariant::ConsumerSingle => {}
        PowerVariant::ConsumerToggle { is_toggled } => *is_toggled = read_bool(reader)?,
        PowerVariant::RangedTrap {
            is_locked,
            ammo,
            target_flags,
        } => {
            *is_locked = read_bool(reader)?;
            *ammo = read_item_stack(reader)?;
            *target_flags = reader.read_i32::<LittleEndian>()?;
        }
        PowerVariant::Trigger(trigger)
        | PowerVariant::PressurePlate(trigger)
        | PowerVariant::TripWireRelay(trigger)
        | PowerVariant::ElectricWireRelay(trigger) => *trigger = read_trigger(reader)?,
        PowerVariant::TimerRelay {
            trigger,
            start_time,
            end_time,
        } => {
            *trigger = read_trigger(reader)?;
            *start_time = reader.read_u16::<LittleEndian>()?;
            *end_time = reader.read_u16::<LittleEndian>()?;
        }
        PowerVariant::Generator {
            source,
            current_fuel,
        } => {
            *source = read_source(reader)?;
            *current_fuel = reader.read_u16::<LittleEndian>()?;
        }
        PowerVariant::SolarPanel(source) | PowerVariant::BatteryBank(source) => {
            *source = read_source(reader)?
        }
    }

    Ok(())
}

fn write_trigger<W: Write>(writer: &mut W, trigger: &TriggerState) -> Result<(), TeFixError> {
    writer.write_u8(trigger.trigger_kind.as_u8())?;
    write_bool(writer, trigger.is_active)?;
    if trigger.trigger_kind.has_timing() {
        writer.write_u16::<LittleEndian>(trigger.delay_ticks)?;
        writer.write_u16::<LittleEndian>(trigger.power_ticks)?;
    }
    if trigger.trigger_kind == TriggerKind::Motion {
        writer.write_i32::<LittleEndian>(trigger.target_flags)?;
    }
    Ok(())
}

fn read_trigger<R: Read>(reader: &mut R) -> Result<TriggerState, TeFixError> {
    let mut trigger = TriggerState::new(TriggerKind::from_u8(reader.read_u8()?));
    trigger.is_active = read_bool(reader)?;
    if trigger.trigger_kind.has_timing() {
        trigger.delay_ticks = reader.read_u16::<LittleEndian>()?;
        trigger.power_ticks = reader.read_u16::<LittleEndian>()?;
    }
    if trigger.trigger_kind == TriggerKind::Motion {
        trigger.target_flags = reader.read_i32::<LittleEndian>()?;
    }
    Ok(trigger)
}

fn write_source<W: Write>(writer: &mut W, source: &SourceState) -> Result<(), TeFixError> {
    writer.write_u16::<LittleEndian>(source.current_power)?;
    write_bool(writer, source.is_on)?;
    write_item_stack(writer, &source.slot)?;
    Ok(())
}

fn read_source<R: Read>(reader: &mut R) -> Result<SourceState, TeFixError> {
    Ok(SourceState {
        current_power: reader.read_u16::<LittleEndian>()?,
        is_on: read_bool(reader)?,
        slot: read_item_stack(reader)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(item: &PowerItem) -> Vec<u8> {
        let mut buffer = Vec::new();
        write_power_item(&mut buffer, item).unwrap();
        buffer
    }

    #[test]
    fn consumer_without_parent_is_one_byte() {
        let item = PowerItem::new(PowerItemKind::Consumer, Position::new(1, 2, 3));
        assert_eq!(encode(&item), vec![0x00]);
    }

    #[test]
    fn parent_is_written_but_children_are_not() {
        let mut item = PowerItem::new(PowerItemKind::ConsumerToggle, Position::new(1, 2, 3));
        item.parent = Some(Position::new(-4, 60, 9));
        item.children = vec![Position::new(5, 5, 5)];
        item.variant = PowerVariant::ConsumerToggle { is_toggled: true };

        let bytes = encode(&item);
        assert_eq!(bytes.len(), 1 + 12 + 1);

        let decoded =
            read_power_item(&mut Cursor::new(&bytes), PowerItemKind::ConsumerToggle, item.position)
                .unwrap();
        assert_eq!(decoded.parent, item.parent);
        assert!(decoded.children.is_empty());
        assert_eq!(decoded.variant, item.variant);
    }

    #[test]
    fn timer_relay_writes_trigger_slice_then_times() {
        let mut item = PowerItem::new(PowerItemKind::TimerRelay, Position::ZERO);
        item.variant = PowerVariant::TimerRelay {
            trigger: TriggerState {
                trigger_kind: TriggerKind::TimerRelay,
                is_active: true,
                delay_ticks: 0,
                power_ticks: 0,
                target_flags: 0,
            },
            start_time: 600,
            end_time: 1800,
        };
        let bytes = encode(&item);
        assert_eq!(bytes, vec![0x00, 2, 0x01, 0x58, 0x02, 0x08, 0x07]);
    }

    #[test]
    fn motion_trigger_carries_timing_and_targets() {
        let mut item = PowerItem::new_trigger(PowerItemKind::Trigger, TriggerKind::Motion, Position::ZERO);
        if let Some(trigger) = item.variant.trigger_mut() {
            trigger.delay_ticks = 3;
            trigger.power_ticks = 40;
            trigger.target_flags = 0b101;
        }
        let bytes = encode(&item);
        assert_eq!(bytes.len(), 1 + 2 + 4 + 4);

        let decoded = read_power_item(&mut Cursor::new(&bytes), PowerItemKind::Trigger, Position::ZERO).unwrap();
        assert_eq!(decoded, item);
    }

    #[test]
    fn decode_into_keeps_shell_position() {
        let mut source = PowerItem::new(PowerItemKind::Generator, Position::new(9, 9, 9));
        source.variant = PowerVariant::Generator {
            source: SourceState {
                current_power: 50,
                is_on: true,
                slot: ItemStack::new(77, 3),
            },
            current_fuel: 1200,
        };
        let bytes = encode(&source);

        let mut shell = PowerItem::new(PowerItemKind::Generator, Position::new(100, 20, -5));
        read_power_item_into(&mut Cursor::new(&bytes), &mut shell).unwrap();
        assert_eq!(shell.position, Position::new(100, 20, -5));
        assert_eq!(shell.variant, source.variant);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let result = read_power_item_raw(&mut Cursor::new(vec![0u8]), 42, Position::ZERO);
        assert!(matches!(result, Err(TeFixError::UnknownPowerItemKind(42))));
    }

    #[test]
    fn truncated_payload_fails() {
        let result = read_power_item(&mut Cursor::new(vec![0x01, 0x00]), PowerItemKind::Consumer, Position::ZERO);
        assert!(result.is_err());
    }
}
