//! critical / normal 命令 - 发送告警
//!
//! 关键告警会等待音频恢复任务执行完才退出，否则进程退出会丢弃恢复。

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use super::context::AppContext;
use super::output::format_output;
use crate::audio::OverrideSession;
use crate::notification::AlertRequest;
use crate::permission::POLICY_ACCESS_PROMPT;

/// critical 命令参数
#[derive(Args)]
pub struct CriticalArgs {
    /// 通知音量占最大音量的比例 (0.0 - 1.0)，默认取配置
    #[arg(long, short, value_parser = parse_fraction)]
    pub volume: Option<f32>,

    /// 告警标题
    #[arg(long)]
    pub title: Option<String>,

    /// 告警正文
    #[arg(long)]
    pub body: Option<String>,

    /// 提示音文件（用于计算恢复延迟）
    #[arg(long)]
    pub sound: Option<PathBuf>,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// normal 命令参数
#[derive(Args)]
pub struct NormalArgs {
    /// 告警标题
    #[arg(long)]
    pub title: Option<String>,

    /// 告警正文
    #[arg(long)]
    pub body: Option<String>,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// 发送结果输出
#[derive(Debug, Serialize)]
pub struct PostOutput {
    pub id: u32,
    pub channel_id: String,
    pub severity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_override: Option<OverrideSession>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_error: Option<String>,
}

/// 解析响度比例
pub fn parse_fraction(s: &str) -> std::result::Result<f32, String> {
    let value: f32 = s.parse().map_err(|_| format!("not a number: {}", s))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(format!("volume must be between 0.0 and 1.0, got {}", value));
    }
    Ok(value)
}

fn apply_texts(mut request: AlertRequest, title: Option<String>, body: Option<String>) -> AlertRequest {
    if let Some(title) = title {
        request = request.with_title(title);
    }
    if let Some(body) = body {
        request = request.with_body(body);
    }
    request
}

/// 未授权时拒绝发送
fn ensure_policy_access(ctx: &AppContext) -> Result<()> {
    let status = ctx.gate.refresh();
    if status.prompt_required {
        eprintln!("{}", POLICY_ACCESS_PROMPT);
        eprintln!("(simulated device: run `calert device --policy-access true`)");
        bail!("Do Not Disturb access not granted");
    }
    Ok(())
}

/// 处理 critical 命令
pub async fn handle_critical(ctx: &AppContext, args: CriticalArgs, dry_run: bool) -> Result<()> {
    ensure_policy_access(ctx)?;

    let fraction = args.volume.unwrap_or(ctx.config.default_loudness);
    let request = apply_texts(AlertRequest::critical(Some(fraction)), args.title, args.body);
    let dispatcher = ctx.dispatcher(args.sound)?;

    if dry_run {
        let plan = dispatcher.plan(&request)?;
        println!("{}", format_output(&plan, args.json));
        return Ok(());
    }

    let receipt = dispatcher.post(&request)?;
    let output = PostOutput {
        id: receipt.id,
        channel_id: receipt.channel_id.to_string(),
        severity: request.severity.to_string(),
        audio_override: receipt.session.clone(),
        override_error: receipt.override_error.as_ref().map(|e| e.to_string()),
    };
    println!("{}", format_output(&output, args.json));

    if receipt.restore_pending() {
        info!(
            restore_after_ms = receipt.session.as_ref().map(|s| s.restore_after.as_millis() as u64),
            "Waiting for audio restoration"
        );
    }
    receipt.wait_for_restore().await;
    Ok(())
}

/// 处理 normal 命令
pub async fn handle_normal(ctx: &AppContext, args: NormalArgs, dry_run: bool) -> Result<()> {
    ensure_policy_access(ctx)?;

    let request = apply_texts(AlertRequest::normal(), args.title, args.body);
    let dispatcher = ctx.dispatcher(None)?;

    if dry_run {
        let plan = dispatcher.plan(&request)?;
        println!("{}", format_output(&plan, args.json));
        return Ok(());
    }

    let receipt = dispatcher.post(&request)?;
    let output = PostOutput {
        id: receipt.id,
        channel_id: receipt.channel_id.to_string(),
        severity: request.severity.to_string(),
        audio_override: None,
        override_error: None,
    };
    println!("{}", format_output(&output, args.json));
    Ok(())
}
