//! 配置加载
//!
//! 存储位置：`~/.config/critical-alert/config.json`，文件不存在时使用默认值。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{AlertError, Result};

/// 提示音时长查询失败时的恢复延迟
pub const FALLBACK_RESTORE_MS: u64 = 5000;
/// 恢复延迟上限
pub const MAX_RESTORE_MS: u64 = 60_000;
pub const DEFAULT_CHANNEL_ID: &str = "default";
pub const DEFAULT_CHANNEL_NAME: &str = "Default";
pub const DEFAULT_COUNTER_KEY: &str = "notification_id";
pub const DEFAULT_LOUDNESS: f32 = 0.8;

/// 告警配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertConfig {
    /// 唯一的投递渠道 ID
    pub channel_id: String,
    /// 渠道显示名
    pub channel_name: String,
    /// 计数器在 KV 存储中的 key
    pub counter_key: String,
    /// 未指定音量时使用的响度比例
    pub default_loudness: f32,
    /// 时长查询失败时的恢复延迟（毫秒）
    pub fallback_restore_ms: u64,
    /// 恢复延迟上限（毫秒）
    pub max_restore_ms: u64,
    /// 提示音文件
    pub sound_path: Option<PathBuf>,
    /// 数据目录（默认 ~/.config/critical-alert）
    pub data_dir: Option<PathBuf>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            channel_id: DEFAULT_CHANNEL_ID.to_string(),
            channel_name: DEFAULT_CHANNEL_NAME.to_string(),
            counter_key: DEFAULT_COUNTER_KEY.to_string(),
            default_loudness: DEFAULT_LOUDNESS,
            fallback_restore_ms: FALLBACK_RESTORE_MS,
            max_restore_ms: MAX_RESTORE_MS,
            sound_path: None,
            data_dir: None,
        }
    }
}

impl AlertConfig {
    /// 默认配置目录
    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("critical-alert")
    }

    /// 默认配置文件路径
    pub fn default_path() -> PathBuf {
        Self::default_dir().join("config.json")
    }

    /// 从默认位置加载
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// 从指定文件加载；文件不存在返回默认配置，格式错误返回 `Initialization`
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            AlertError::Initialization(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            AlertError::Initialization(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.channel_id.trim().is_empty() {
            return Err(AlertError::Initialization("channel_id must not be empty".into()));
        }
        if self.fallback_restore_ms == 0 {
            return Err(AlertError::Initialization("fallback_restore_ms must be positive".into()));
        }
        if self.max_restore_ms < self.fallback_restore_ms {
            return Err(AlertError::Initialization(
                "max_restore_ms must not be below fallback_restore_ms".into(),
            ));
        }
        Ok(())
    }

    /// 实际使用的数据目录
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(Self::default_dir)
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir().join("notification_ids.json")
    }

    pub fn device_path(&self) -> PathBuf {
        self.data_dir().join("device.json")
    }

    pub fn alert_log_path(&self) -> PathBuf {
        self.data_dir().join("alerts.jsonl")
    }
}
