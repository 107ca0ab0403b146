//! status / device / history 命令 - 查看和编辑模拟设备

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::context::AppContext;
use super::output::format_output;
use crate::audio::RingerMode;
use crate::permission::PermissionStatus;
use crate::platform::{DeviceProfile, InterruptionFilter};

/// status 命令参数
#[derive(Args)]
pub struct StatusArgs {
    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// device 命令参数
#[derive(Args)]
pub struct DeviceArgs {
    /// 铃声模式: normal, vibrate, silent
    #[arg(long)]
    pub ringer: Option<RingerMode>,

    /// 通知音量
    #[arg(long)]
    pub volume: Option<u32>,

    /// 通知最大音量
    #[arg(long)]
    pub max_volume: Option<u32>,

    /// 中断过滤: all, priority, alarms, none
    #[arg(long)]
    pub filter: Option<InterruptionFilter>,

    /// 是否授予勿扰访问权限
    #[arg(long)]
    pub policy_access: Option<bool>,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// history 命令参数
#[derive(Args)]
pub struct HistoryArgs {
    /// 显示最近 N 条告警
    #[arg(long, short, default_value = "10")]
    pub limit: usize,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub device: DeviceProfile,
    pub suppression_active: bool,
    pub permission: PermissionStatus,
    pub device_file: String,
}

/// 处理 status 命令
pub fn handle_status(ctx: &AppContext, args: StatusArgs) -> Result<()> {
    let permission = ctx.gate.refresh();
    let device = ctx.device.load()?;
    let output = StatusOutput {
        suppression_active: device.suppression_active(),
        device,
        permission,
        device_file: ctx.device.path().display().to_string(),
    };
    println!("{}", format_output(&output, args.json));
    Ok(())
}

/// 处理 device 命令（直接编辑，不受勿扰权限限制）
pub fn handle_device(ctx: &AppContext, args: DeviceArgs) -> Result<()> {
    let profile = ctx.device.edit(|p| {
        if let Some(max) = args.max_volume {
            p.max_notification_volume = max;
            p.notification_volume = p.notification_volume.min(max);
        }
        if let Some(volume) = args.volume {
            p.notification_volume = volume.min(p.max_notification_volume);
        }
        if let Some(mode) = args.ringer {
            p.ringer_mode = mode;
        }
        if let Some(filter) = args.filter {
            p.interruption_filter = filter;
        }
        if let Some(granted) = args.policy_access {
            p.policy_access_granted = granted;
        }
    })?;
    println!("{}", format_output(&profile, args.json));
    Ok(())
}

/// 处理 history 命令
pub fn handle_history(ctx: &AppContext, args: HistoryArgs) -> Result<()> {
    let records = ctx.alert_log.read_recent(args.limit);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No alerts posted yet");
        return Ok(());
    }
    for record in records {
        println!(
            "#{} [{}] {} {} - {}",
            record.id,
            record.ts.format("%Y-%m-%d %H:%M:%S"),
            record.severity,
            record.title,
            record.body
        );
    }
    Ok(())
}
