pub mod config;
pub mod error;
pub mod exporter;
pub mod header;
pub mod importer;
pub mod power;
pub mod region;
pub mod repair;
pub mod tile_entity;
pub mod transform;
pub mod types;
pub mod utils;
pub mod validator;
pub mod world;

pub use crate::error::TeFixError;
pub use crate::exporter::RegionExporter;
pub use crate::importer::RegionImporter;
pub use crate::region::RegionFile;
pub use crate::repair::{RepairEngine, RepairMode, RepairScope};
pub use crate::world::{HostWorld, MemoryWorld, PrefabStore, StatusSink};

/// 区域文件标记
pub const REGION_MARKER: &str = "7DTD-TE";

/// 区域文件格式版本
pub const REGION_FORMAT_VERSION: i32 = 4;
