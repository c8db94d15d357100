use std::path::PathBuf;

use cadlink_config::{AppConfig, ConfigError};
use cadlink_core::units::LengthUnit;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod commands;

/// 绘图端与自由曲面端之间的几何转换工具。
#[derive(Debug, Parser)]
#[command(name = "cadlink", version)]
struct Cli {
    /// 配置文件路径，缺省时按 `CADLINK_CONFIG` 或 `./config/default.toml` 查找
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 生成演示文档并转换到自由曲面端
    Demo {
        /// 目标端单位
        #[arg(long, value_parser = parse_unit)]
        to: Option<LengthUnit>,
        /// 将转换结果写成 JSON 模型
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// 转换 JSON 文档（默认绘图端到自由曲面端）
    Convert {
        input: PathBuf,
        /// 另一端的单位
        #[arg(long, value_parser = parse_unit)]
        to: Option<LengthUnit>,
        /// 从自由曲面端模型转回绘图文档
        #[arg(long)]
        reverse: bool,
        /// 实体经交换文件往返，生成真正的 Brep 或实体
        #[arg(long)]
        via_exchange: bool,
        /// 输出路径，缺省时写到标准输出
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// 单位换算
    Units {
        #[arg(allow_negative_numbers = true)]
        value: f64,
        #[arg(long, value_parser = parse_unit)]
        from: LengthUnit,
        #[arg(long, value_parser = parse_unit)]
        to: LengthUnit,
    },
}

fn parse_unit(value: &str) -> Result<LengthUnit, String> {
    LengthUnit::parse(value).ok_or_else(|| format!("未知长度单位 `{value}`"))
}

fn main() {
    let cli = Cli::parse();
    let config = load_configuration(cli.config);
    init_logging(&config);
    info!("启动 CadLink 转换工具");

    let result = match cli.command {
        Command::Demo { to, output } => commands::run_demo(&config, to, output.as_deref()),
        Command::Convert {
            input,
            to,
            reverse,
            via_exchange,
            output,
        } => {
            let options = commands::ConvertOptions {
                to,
                via_exchange,
                output,
            };
            if reverse {
                commands::convert_model(&config, &input, &options)
            } else {
                commands::convert_document(&config, &input, &options)
            }
        }
        Command::Units { value, from, to } => commands::convert_units(value, from, to),
    };

    if let Err(err) = result {
        error!(error = %err, "命令执行失败");
        eprintln!("错误: {err:#}");
        std::process::exit(1);
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Invalid(_) | ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

/// 日志写到标准错误，标准输出留给 JSON 结果。
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
