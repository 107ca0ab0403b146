//! 投递服务 - 把告警交给平台显示
//!
//! `AlertLogDelivery` 将每条告警追加到本地 JSONL 文件（带文件锁），供 `calert history` 读取。

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::channel::ChannelId;
use super::request::Severity;
use crate::error::{AlertError, Result};

/// 一次投递调用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub channel_id: ChannelId,
    pub id: u32,
    pub severity: Severity,
    pub title: String,
    pub body: String,
}

/// 平台投递服务
///
/// 相同 ID 的告警会替换之前的告警。返回值只用于日志。
pub trait DeliveryService: Send + Sync {
    fn name(&self) -> &str;

    fn deliver(&self, delivery: &Delivery) -> Result<()>;
}

/// 告警日志记录（JSONL 格式）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    /// ISO8601 时间戳
    pub ts: DateTime<Utc>,
    pub id: u32,
    pub channel_id: String,
    pub severity: Severity,
    pub title: String,
    pub body: String,
}

/// 本地 JSONL 投递
pub struct AlertLogDelivery {
    path: PathBuf,
}

impl AlertLogDelivery {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取最近 N 条告警
    pub fn read_recent(&self, n: usize) -> Vec<AlertRecord> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(_) => return Vec::new(),
        };

        let records: Vec<AlertRecord> = BufReader::new(file)
            .lines()
            .filter_map(|line| line.ok())
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect();

        let start = records.len().saturating_sub(n);
        records[start..].to_vec()
    }
}

impl DeliveryService for AlertLogDelivery {
    fn name(&self) -> &str {
        "alert_log"
    }

    fn deliver(&self, delivery: &Delivery) -> Result<()> {
        let record = AlertRecord {
            ts: Utc::now(),
            id: delivery.id,
            channel_id: delivery.channel_id.0.clone(),
            severity: delivery.severity,
            title: delivery.title.clone(),
            body: delivery.body.clone(),
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(AlertError::storage)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(AlertError::storage)?;

        file.lock_exclusive().map_err(AlertError::storage)?;
        let line = serde_json::to_string(&record).map_err(AlertError::storage)?;
        let written = writeln!(file, "{}", line);
        file.unlock().map_err(AlertError::storage)?;
        written.map_err(AlertError::storage)?;

        info!(
            alert_id = delivery.id,
            channel = %delivery.channel_id,
            severity = %delivery.severity,
            title = %delivery.title,
            "Alert delivered"
        );
        debug!(path = %self.path.display(), "Alert appended to log");
        Ok(())
    }
}
