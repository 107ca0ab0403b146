//! Critical Alert CLI
//!
//! 发送关键告警 / 普通告警，并管理模拟设备状态

use anyhow::Result;
use clap::{Parser, Subcommand};
use critical_alert::{
    cli::{
        handle_critical, handle_device, handle_history, handle_normal, handle_status, AppContext,
        CriticalArgs, DeviceArgs, HistoryArgs, NormalArgs, StatusArgs,
    },
    AlertConfig,
};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "calert")]
#[command(about = "Critical Alert - 勿扰模式下仍可听见的关键告警")]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 ~/.config/critical-alert/config.json）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dry-run 模式（只打印计划，不修改设备）
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 发送关键告警（绕过勿扰并临时提高通知音量）
    Critical(CriticalArgs),
    /// 发送普通告警
    Normal(NormalArgs),
    /// 查看设备状态和勿扰访问权限
    Status(StatusArgs),
    /// 编辑模拟设备状态
    Device(DeviceArgs),
    /// 查看最近发送的告警
    History(HistoryArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("critical_alert=info,calert=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AlertConfig::load_from(path)?,
        None => AlertConfig::load()?,
    };
    debug!(data_dir = %config.data_dir().display(), "Loaded configuration");

    let ctx = AppContext::open(config)?;

    match cli.command {
        Commands::Critical(args) => handle_critical(&ctx, args, cli.dry_run).await,
        Commands::Normal(args) => handle_normal(&ctx, args, cli.dry_run).await,
        Commands::Status(args) => handle_status(&ctx, args),
        Commands::Device(args) => handle_device(&ctx, args),
        Commands::History(args) => handle_history(&ctx, args),
    }
}
