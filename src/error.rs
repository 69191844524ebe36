use thiserror::Error;
use std::io;

use crate::types::ChunkPos;

#[derive(Error, Debug)]
pub enum TeFixError {
    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("参数错误: {0}")]
    UserInput(String),

    #[error("区域未加载: 区块 ({}, {}) 不在内存中", .chunk.x, .chunk.z)]
    AreaNotLoaded { chunk: ChunkPos },

    #[error("无效的文件标记: {0:?}")]
    InvalidMarker(String),

    #[error("不支持的文件格式版本: 期望 {expected}，实际为 {found}")]
    FormatVersionMismatch { expected: i32, found: i32 },

    #[error("未知的方块实体类型: {0}")]
    UnknownTileEntityKind(i32),

    #[error("未知的供电物品类型: {0}")]
    UnknownPowerItemKind(u8),

    #[error("不支持的供电物品版本: {0}")]
    UnsupportedPowerItemVersion(u8),

    #[error("解码错误: {0}")]
    Decode(String),

    #[error("供电方块实体缺少供电物品: ({}, {}, {})", .0.x, .0.y, .0.z)]
    MissingPowerItem(crate::types::Position),

    #[error("位置 ({}, {}, {}) 已存在方块实体", .0.x, .0.y, .0.z)]
    PositionOccupied(crate::types::Position),

    #[error("配置错误: {0}")]
    Config(String),
}
