//! # TMC CLI
//!
//! Command-line interface for TMC5161 stepper motor control.
//!
//! ```bash
//! # 以 2.5 转/秒连续旋转，每秒检查一次状态（Ctrl-C 停止）
//! tmc-cli run --port /dev/ttyUSB0 --rps 2.5
//!
//! # 不需要硬件：使用模拟的 TMC5161
//! tmc-cli run --simulate --cycles 5
//!
//! # 查询状态 / 列出串口 / 查看配置
//! tmc-cli status --port /dev/ttyUSB0
//! tmc-cli ports
//! tmc-cli config --config tmc5161.toml
//! ```
//!
//! 日志级别用 `RUST_LOG` 控制，例如 `RUST_LOG=tmc_driver=trace` 打印收发的原始字节。

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod connection;

use commands::{ConfigCommand, PortsCommand, RunCommand, StatusCommand};

/// TMC CLI - 步进电机命令行工具
#[derive(Parser, Debug)]
#[command(name = "tmc-cli")]
#[command(about = "Command-line interface for TMC5161 stepper motor control", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 启动电机并轮询状态
    Run {
        #[command(flatten)]
        args: RunCommand,
    },

    /// 读取电机状态
    Status {
        #[command(flatten)]
        args: StatusCommand,
    },

    /// 列出可用串口
    Ports {
        #[command(flatten)]
        args: PortsCommand,
    },

    /// 打印生效的驱动配置
    Config {
        #[command(flatten)]
        args: ConfigCommand,
    },
}

/// 未设置 `RUST_LOG` 时的日志级别
const DEFAULT_LOG_DIRECTIVES: &str = "tmc_cli=info,tmc_driver=info";

/// `RUST_LOG` 非空时完全按它过滤，否则使用默认级别
fn log_filter(rust_log: Option<&str>) -> Result<EnvFilter> {
    let directives = rust_log
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_LOG_DIRECTIVES);
    Ok(EnvFilter::try_new(directives)?)
}

fn main() -> Result<()> {
    // 初始化日志
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(rust_log.as_deref())?)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { args } => args.execute(),
        Commands::Status { args } => args.execute(),
        Commands::Ports { args } => args.execute(),
        Commands::Config { args } => args.execute(),
    }
}
