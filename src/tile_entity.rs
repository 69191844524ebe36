use crate::error::TeFixError;
use crate::power::{PowerItem, PowerItemKind, TriggerKind};
use crate::types::{ChunkPos, ItemStack, Position};
use crate::utils::{
    read_bool, read_item_stack, read_position, read_string, write_bool, write_item_stack,
    write_position, write_string,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// 容器槽位数量上限
const MAX_SLOTS: u16 = 1024;

/// 方块实体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum TileEntityKind {
    Loot = 5,
    SecureLoot = 10,
    SecureDoor = 11,
    Workstation = 12,
    Sign = 13,
    Powered = 15,
    PowerSource = 16,
    PowerRangedTrap = 17,
    Trigger = 18,
}

impl TileEntityKind {
    pub fn from_i32(value: i32) -> Result<Self, TeFixError> {
        match value {
            5 => Ok(TileEntityKind::Loot),
            10 => Ok(TileEntityKind::SecureLoot),
            11 => Ok(TileEntityKind::SecureDoor),
            12 => Ok(TileEntityKind::Workstation),
            13 => Ok(TileEntityKind::Sign),
            15 => Ok(TileEntityKind::Powered),
            16 => Ok(TileEntityKind::PowerSource),
            17 => Ok(TileEntityKind::PowerRangedTrap),
            18 => Ok(TileEntityKind::Trigger),
            _ => Err(TeFixError::UnknownTileEntityKind(value)),
        }
    }

    /// 是否带有供电物品
    pub fn is_powered(&self) -> bool {
        matches!(
            self,
            TileEntityKind::Powered
                | TileEntityKind::PowerSource
                | TileEntityKind::PowerRangedTrap
                | TileEntityKind::Trigger
        )
    }

    pub fn is_trigger(&self) -> bool {
        *self == TileEntityKind::Trigger
    }

    /// 新建时的默认声明供电类型
    pub fn default_power_kind(&self) -> Option<PowerItemKind> {
        match self {
            TileEntityKind::Powered | TileEntityKind::Trigger => Some(PowerItemKind::Consumer),
            TileEntityKind::PowerSource => Some(PowerItemKind::Generator),
            TileEntityKind::PowerRangedTrap => Some(PowerItemKind::RangedTrap),
            _ => None,
        }
    }
}

/// 门锁/箱锁状态
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Lock {
    pub locked: bool,
    pub owner: String,
    pub allowed: Vec<String>,
}

/// 供电方块实体状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoweredState {
    /// 方块实体上记录的供电类型（可能与实际物品不一致）
    pub declared_kind: PowerItemKind,
    /// 仅 Trigger 类型方块实体有值
    pub trigger_kind: Option<TriggerKind>,
    pub is_player_placed: bool,
    pub power_item: Option<PowerItem>,
}

impl PoweredState {
    /// 按声明值创建空壳物品
    ///
    /// 触发器方块实体的变体由触发器类型决定（声明类型常为过期的默认值），
    /// 其他方块实体按声明类型创建。
    pub fn create_power_item(&self, position: Position) -> PowerItem {
        match self.trigger_kind {
            Some(trigger_kind) => {
                let kind = trigger_kind
                    .expected_power_kind()
                    .unwrap_or(PowerItemKind::Trigger);
                PowerItem::new_trigger(kind, trigger_kind, position)
            }
            None => PowerItem::new(self.declared_kind, position),
        }
    }
}

/// 各类型方块实体的数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileEntityData {
    Loot { items: Vec<ItemStack>, touched: bool },
    SecureLoot { items: Vec<ItemStack>, lock: Lock },
    SecureDoor { lock: Lock },
    Workstation { slots: Vec<ItemStack>, is_burning: bool },
    Sign { text: String, lock: Lock },
    Powered(PoweredState),
}

/// 方块实体（坐标为区块内局部坐标）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileEntity {
    pub local: Position,
    pub kind: TileEntityKind,
    pub data: TileEntityData,
}

impl TileEntity {
    /// 创建某类型的默认方块实体
    pub fn new(kind: TileEntityKind, local: Position) -> Self {
        let data = match kind {
            TileEntityKind::Loot => TileEntityData::Loot {
                items: Vec::new(),
                touched: false,
            },
            TileEntityKind::SecureLoot => TileEntityData::SecureLoot {
                items: Vec::new(),
                lock: Lock::default(),
            },
            TileEntityKind::SecureDoor => TileEntityData::SecureDoor {
                lock: Lock::default(),
            },
            TileEntityKind::Workstation => TileEntityData::Workstation {
                slots: Vec::new(),
                is_burning: false,
            },
            TileEntityKind::Sign => TileEntityData::Sign {
                text: String::new(),
                lock: Lock::default(),
            },
            TileEntityKind::Powered
            | TileEntityKind::PowerSource
            | TileEntityKind::PowerRangedTrap
            | TileEntityKind::Trigger => TileEntityData::Powered(PoweredState {
                declared_kind: kind.default_power_kind().unwrap_or(PowerItemKind::Consumer),
                trigger_kind: kind.is_trigger().then_some(TriggerKind::Switch),
                is_player_placed: true,
                power_item: None,
            }),
        };
        Self { local, kind, data }
    }

    /// 创建供电方块实体，并按声明值初始化其供电物品
    pub fn new_powered(
        kind: TileEntityKind,
        chunk: ChunkPos,
        local: Position,
        declared_kind: PowerItemKind,
        trigger_kind: Option<TriggerKind>,
    ) -> Self {
        let mut state = PoweredState {
            declared_kind,
            trigger_kind: if kind.is_trigger() {
                Some(trigger_kind.unwrap_or(TriggerKind::Switch))
            } else {
                None
            },
            is_player_placed: true,
            power_item: None,
        };
        state.power_item = Some(state.create_power_item(chunk.to_world(local)));
        Self {
            local,
            kind,
            data: TileEntityData::Powered(state),
        }
    }

    pub fn powered(&self) -> Option<&PoweredState> {
        match &self.data {
            TileEntityData::Powered(state) => Some(state),
            _ => None,
        }
    }

    pub fn powered_mut(&mut self) -> Option<&mut PoweredState> {
        match &mut self.data {
            TileEntityData::Powered(state) => Some(state),
            _ => None,
        }
    }

    pub fn power_item(&self) -> Option<&PowerItem> {
        self.powered().and_then(|state| state.power_item.as_ref())
    }

    pub fn power_item_mut(&mut self) -> Option<&mut PowerItem> {
        self.powered_mut().and_then(|state| state.power_item.as_mut())
    }
}

/// 方块实体解码上下文
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext {
    /// 目标区块（决定解码时创建的供电物品的世界坐标）
    pub chunk: ChunkPos,
    /// 替换负载中记录的局部坐标；原坐标字节照常读取以保持对齐
    pub override_local: Option<Position>,
}

impl DecodeContext {
    pub fn new(chunk: ChunkPos) -> Self {
        Self {
            chunk,
            override_local: None,
        }
    }

    pub fn with_override(chunk: ChunkPos, local: Position) -> Self {
        Self {
            chunk,
            override_local: Some(local),
        }
    }
}

/// 写入方块实体负载（不含供电物品）
pub fn write_tile_entity<W: Write>(writer: &mut W, te: &TileEntity) -> Result<(), TeFixError> {
    write_position(writer, te.local)?;

    match &te.data {
        TileEntityData::Loot { items, touched } => {
            write_bool(writer, *touched)?;
            write_slots(writer, items)?;
        }
        TileEntityData::SecureLoot { items, lock } => {
            write_lock(writer, lock)?;
            write_slots(writer, items)?;
        }
        TileEntityData::SecureDoor { lock } => write_lock(writer, lock)?,
        TileEntityData::Workstation { slots, is_burning } => {
            write_bool(writer, *is_burning)?;
            write_slots(writer, slots)?;
        }
        TileEntityData::Sign { text, lock } => {
            write_lock(writer, lock)?;
            write_string(writer, text)?;
        }
        TileEntityData::Powered(state) => {
            writer.write_u8(state.declared_kind as u8)?;
            write_bool(writer, state.is_player_placed)?;
            if te.kind.is_trigger() {
                let trigger_kind = state.trigger_kind.unwrap_or(TriggerKind::Switch);
                writer.write_u8(trigger_kind.as_u8())?;
            }
        }
    }

    Ok(())
}

/// 读取方块实体负载
///
/// 供电类型会在解码过程中按最终坐标创建空壳供电物品，
/// 因此最终坐标必须经由 `ctx.override_local` 在解码时提供。
pub fn read_tile_entity<R: Read>(
    reader: &mut R,
    kind: TileEntityKind,
    ctx: &DecodeContext,
) -> Result<TileEntity, TeFixError> {
    let stored_local = read_position(reader)?;
    let local = ctx.override_local.unwrap_or(stored_local);

    let data = match kind {
        TileEntityKind::Loot => {
            let touched = read_bool(reader)?;
            TileEntityData::Loot {
                items: read_slots(reader)?,
                touched,
            }
        }
        TileEntityKind::SecureLoot => {
            let lock = read_lock(reader)?;
            TileEntityData::SecureLoot {
                items: read_slots(reader)?,
                lock,
            }
        }
        TileEntityKind::SecureDoor => TileEntityData::SecureDoor {
            lock: read_lock(reader)?,
        },
        TileEntityKind::Workstation => {
            let is_burning = read_bool(reader)?;
            TileEntityData::Workstation {
                slots: read_slots(reader)?,
                is_burning,
            }
        }
        TileEntityKind::Sign => {
            let lock = read_lock(reader)?;
            TileEntityData::Sign {
                text: read_string(reader)?,
                lock,
            }
        }
        TileEntityKind::Powered
        | TileEntityKind::PowerSource
        | TileEntityKind::PowerRangedTrap
        | TileEntityKind::Trigger => {
            let declared_kind = PowerItemKind::from_u8(reader.read_u8()?)?;
            let is_player_placed = read_bool(reader)?;
            let trigger_kind = if kind.is_trigger() {
                Some(TriggerKind::from_u8(reader.read_u8()?))
            } else {
                None
            };
            let mut state = PoweredState {
                declared_kind,
                trigger_kind,
                is_player_placed,
                power_item: None,
            };
            state.power_item = Some(state.create_power_item(ctx.chunk.to_world(local)));
            TileEntityData::Powered(state)
        }
    };

    Ok(TileEntity { local, kind, data })
}

fn write_lock<W: Write>(writer: &mut W, lock: &Lock) -> Result<(), TeFixError> {
    write_bool(writer, lock.locked)?;
    write_string(writer, &lock.owner)?;
    let count = u16::try_from(lock.allowed.len())
        .map_err(|_| TeFixError::Decode(format!("授权名单长度 {} 超过上限", lock.allowed.len())))?;
    writer.write_u16::<LittleEndian>(count)?;
    for name in &lock.allowed {
        write_string(writer, name)?;
    }
    Ok(())
}

fn read_lock<R: Read>(reader: &mut R) -> Result<Lock, TeFixError> {
    let locked = read_bool(reader)?;
    let owner = read_string(reader)?;
    let count = reader.read_u16::<LittleEndian>()?;
    let mut allowed = Vec::with_capacity(count as usize);
    for _ in 0..count {
        allowed.push(read_string(reader)?);
    }
    Ok(Lock {
        locked,
        owner,
        allowed,
    })
}

fn write_slots<W: Write>(writer: &mut W, slots: &[ItemStack]) -> Result<(), TeFixError> {
    if slots.len() > MAX_SLOTS as usize {
        return Err(TeFixError::Decode(format!("槽位数量 {} 超过上限", slots.len())));
    }
    writer.write_u16::<LittleEndian>(slots.len() as u16)?;
    for stack in slots {
        write_item_stack(writer, stack)?;
    }
    Ok(())
}

fn read_slots<R: Read>(reader: &mut R) -> Result<Vec<ItemStack>, TeFixError> {
    let count = reader.read_u16::<LittleEndian>()?;
    if count > MAX_SLOTS {
        return Err(TeFixError::Decode(format!("槽位数量 {} 超过上限", count)));
    }
    let mut slots = Vec::with_capacity(count as usize);
    for _ in 0..count {
        slots.push(read_item_stack(reader)?);
    }
    Ok(slots)
}
