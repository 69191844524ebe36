use clap::{Parser, Subcommand};
use tefix::{
    config::Settings,
    region::record_summary,
    transform::Rotation,
    types::{BoundingBox, Position},
    utils::file_digest,
    world::NoPrefab,
    MemoryWorld, RegionExporter, RegionFile, RegionImporter, RepairEngine, RepairMode,
    RepairScope, StatusSink, TeFixError, REGION_FORMAT_VERSION,
};
use std::path::{Path, PathBuf};

/// 7DTD-TE 区域文件与供电物品修复工具（离线世界快照）
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 配置文件路径（JSON）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 查看区域文件信息
    Info {
        /// 区域文件路径
        #[arg(short, long)]
        file: PathBuf,

        /// 是否详细输出
        #[arg(short, long)]
        verbose: bool,
    },

    /// 将世界快照中的一个区域导出为区域文件
    Export {
        /// 世界快照（JSON）
        #[arg(short, long)]
        world: PathBuf,

        /// 第一个角点 x,y,z
        #[arg(long, allow_hyphen_values = true)]
        from: String,

        /// 第二个角点 x,y,z
        #[arg(long, allow_hyphen_values = true)]
        to: String,

        /// 输出区域文件路径
        #[arg(short, long)]
        output: PathBuf,
    },

    /// 将区域文件导入世界快照
    Import {
        #[arg(short, long)]
        world: PathBuf,

        /// 区域文件路径
        #[arg(short, long)]
        input: PathBuf,

        /// 目标原点 x,y,z
        #[arg(long, allow_hyphen_values = true)]
        at: String,

        /// 旋转步数 0-3（90° 顺时针）
        #[arg(short, long)]
        rotate: Option<i32>,

        /// 结果写入的路径，默认覆盖输入快照
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 扫描并修复损坏的供电物品
    Repair {
        #[arg(short, long)]
        world: PathBuf,

        /// 只扫描包含该坐标的区块 x,y,z
        #[arg(long, allow_hyphen_values = true)]
        chunk: Option<String>,

        /// 实际修复（默认只模拟）
        #[arg(long)]
        apply: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// 直接打印到标准输出
struct StdoutSink;

impl StatusSink for StdoutSink {
    fn report(&mut self, message: &str) {
        println!("{}", message);
    }
}

fn main() {
    let cli = Cli::parse();

    let settings = match Settings::load_or_default(cli.config.as_ref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(settings.log_level.as_str()))
        .init();

    if let Err(e) = run(cli.command, &settings) {
        eprintln!("失败: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands, settings: &Settings) -> Result<(), TeFixError> {
    match command {
        Commands::Info { file, verbose } => print_region_info(&file, verbose),

        Commands::Export {
            world,
            from,
            to,
            output,
        } => {
            let bounds = BoundingBox::new(parse_position(&from)?, parse_position(&to)?);
            let world = MemoryWorld::load_json(&world)?;
            let mut sink = StdoutSink;
            RegionExporter::new(&world, &mut sink).export(&bounds, &output, &mut NoPrefab)?;
            Ok(())
        }

        Commands::Import {
            world,
            input,
            at,
            rotate,
            output,
        } => {
            let origin = parse_position(&at)?;
            let mut options = settings.import;
            if let Some(steps) = rotate {
                options.rotation = Rotation::from_steps(steps)?;
            }

            let mut snapshot = MemoryWorld::load_json(&world)?;
            let mut sink = StdoutSink;
            RegionImporter::new(&mut snapshot, &mut sink)
                .options(options)
                .import(&input, origin, &mut NoPrefab)?;
            snapshot.save_json(output.as_ref().unwrap_or(&world))?;
            Ok(())
        }

        Commands::Repair {
            world,
            chunk,
            apply,
            output,
        } => {
            let scope = match chunk {
                Some(text) => RepairScope::SingleChunkAt(parse_position(&text)?),
                None => RepairScope::AllLoadedChunks,
            };
            let mode = if apply {
                RepairMode::Apply
            } else {
                settings.repair.mode
            };

            let mut snapshot = MemoryWorld::load_json(&world)?;
            let mut sink = StdoutSink;
            let report = RepairEngine::new(&mut snapshot, &mut sink)
                .mode(mode)
                .run(scope)?;
            println!(
                "扫描区块 {}，发现问题 {}，已修复 {}，失败 {}",
                report.chunks_scanned, report.problems_found, report.repaired, report.failed
            );

            if mode == RepairMode::Apply && report.repaired > 0 {
                snapshot.save_json(output.as_ref().unwrap_or(&world))?;
            }
            Ok(())
        }
    }
}

/// 解析 "x,y,z" 形式的坐标
fn parse_position(text: &str) -> Result<Position, TeFixError> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(TeFixError::UserInput(format!(
            "坐标格式错误: {:?}，应为 x,y,z",
            text
        )));
    }

    let mut values = [0i32; 3];
    for (value, part) in values.iter_mut().zip(&parts) {
        *value = part
            .parse()
            .map_err(|_| TeFixError::UserInput(format!("无效的坐标值: {:?}", part)))?;
    }
    Ok(Position::new(values[0], values[1], values[2]))
}

/// 打印区域文件信息
fn print_region_info(file: &Path, verbose: bool) -> Result<(), TeFixError> {
    let region = RegionFile::from_file(file)?;
    let bounds = region.source_bounds;

    println!("=== 区域文件信息 ===");
    println!("文件: {}", file.display());
    println!("版本: {}", REGION_FORMAT_VERSION);
    println!("源区域: ({}) - ({})", bounds.min, bounds.max);
    let size = bounds.extent() + Position::new(1, 1, 1);
    println!("尺寸: {} x {} x {}", size.x, size.y, size.z);
    println!("方块实体数量: {}", region.records.len());
    println!("供电物品数量: {}", region.powered_count());
    println!("SHA-256: {}", file_digest(file)?);

    if verbose {
        println!("\n=== 详细信息 ===");
        for (i, record) in region.records.iter().enumerate() {
            println!("#{}: {}", i + 1, record_summary(record));
        }
    }

    Ok(())
}
