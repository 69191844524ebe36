use crate::{error::TeFixError, importer::ImportOptions, repair::RepairMode};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// 修复相关设置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairSettings {
    pub mode: RepairMode,
}

/// 工具配置（JSON），缺省字段取默认值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub import: ImportOptions,
    pub repair: RepairSettings,
    /// env_logger 过滤表达式，RUST_LOG 优先
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            import: ImportOptions::default(),
            repair: RepairSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TeFixError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| TeFixError::Config(format!("无法打开配置文件 {}: {}", path.display(), e)))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| TeFixError::Config(format!("配置文件 {} 格式错误: {}", path.display(), e)))
    }

    /// 配置文件存在时加载，否则使用默认值
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self, TeFixError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
