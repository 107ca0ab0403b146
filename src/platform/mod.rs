//! 设备后端 - 平台音频、渠道注册和勿扰权限的实现
//!
//! `DeviceProfile` 描述一台设备的可见状态；`MemoryDevice` 在内存中持有它，
//! `FileDevice` 把它保存在 JSON 文件里供 CLI 跨进程使用。两者通过 `DeviceBackend`
//! 共享同一套平台规则。

pub mod file;
pub mod memory;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::audio::{AudioSubsystem, RingerMode};
use crate::error::{AlertError, Result};
use crate::notification::channel::{ChannelPolicy, ChannelRegistry};
use crate::permission::PolicyAccess;

pub use file::FileDevice;
pub use memory::MemoryDevice;

/// 中断过滤级别，只有 `All` 表示勿扰未开启
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptionFilter {
    All,
    Priority,
    Alarms,
    None,
}

impl InterruptionFilter {
    pub fn suppresses(&self) -> bool {
        *self != InterruptionFilter::All
    }
}

impl std::str::FromStr for InterruptionFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(InterruptionFilter::All),
            "priority" => Ok(InterruptionFilter::Priority),
            "alarms" => Ok(InterruptionFilter::Alarms),
            "none" => Ok(InterruptionFilter::None),
            other => Err(format!("unknown interruption filter: {} (all, priority, alarms, none)", other)),
        }
    }
}

/// 设备状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    /// 平台报告的铃声模式
    pub ringer_mode: RingerMode,
    pub notification_volume: u32,
    pub max_notification_volume: u32,
    pub interruption_filter: InterruptionFilter,
    /// 是否已授予勿扰访问权限
    pub policy_access_granted: bool,
    /// 已注册渠道（按 ID）
    pub channels: BTreeMap<String, ChannelPolicy>,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            ringer_mode: RingerMode::Normal,
            notification_volume: 5,
            max_notification_volume: 7,
            interruption_filter: InterruptionFilter::All,
            policy_access_granted: false,
            channels: BTreeMap::new(),
        }
    }
}

impl DeviceProfile {
    pub fn suppression_active(&self) -> bool {
        self.interruption_filter.suppresses()
    }

    /// 勿扰开启时，没有访问权限的应用不能改动铃声和通知音量
    fn check_policy_access(&self) -> Result<()> {
        if self.suppression_active() && !self.policy_access_granted {
            return Err(AlertError::audio(
                "not allowed to change Do Not Disturb state without policy access",
            ));
        }
        Ok(())
    }

    pub fn set_ringer_mode(&mut self, mode: RingerMode) -> Result<()> {
        self.check_policy_access()?;
        self.ringer_mode = mode;
        Ok(())
    }

    /// 超出范围的音量按平台行为截断到最大值
    pub fn set_notification_volume(&mut self, volume: u32) -> Result<()> {
        self.check_policy_access()?;
        self.notification_volume = volume.min(self.max_notification_volume);
        Ok(())
    }

    pub fn upsert_channel(&mut self, policy: &ChannelPolicy) {
        self.channels.insert(policy.id.0.clone(), policy.clone());
    }
}

/// 设备状态的读写入口
pub trait DeviceBackend: Send + Sync {
    fn read<T>(&self, f: impl FnOnce(&DeviceProfile) -> T) -> Result<T>;

    fn write<T>(&self, f: impl FnOnce(&mut DeviceProfile) -> Result<T>) -> Result<T>;
}

impl<D: DeviceBackend> AudioSubsystem for D {
    fn ringer_mode(&self) -> Result<RingerMode> {
        self.read(|p| p.ringer_mode)
    }

    fn set_ringer_mode(&self, mode: RingerMode) -> Result<()> {
        self.write(|p| p.set_ringer_mode(mode))
    }

    fn stream_volume(&self) -> Result<u32> {
        self.read(|p| p.notification_volume)
    }

    fn set_stream_volume(&self, volume: u32) -> Result<()> {
        self.write(|p| p.set_notification_volume(volume))
    }

    fn max_stream_volume(&self) -> Result<u32> {
        self.read(|p| p.max_notification_volume)
    }

    fn suppression_active(&self) -> Result<bool> {
        self.read(|p| p.suppression_active())
    }
}

impl<D: DeviceBackend> ChannelRegistry for D {
    fn upsert_channel(&self, policy: &ChannelPolicy) -> Result<()> {
        self.write(|p| {
            p.upsert_channel(policy);
            Ok(())
        })
    }
}

impl<D: DeviceBackend> PolicyAccess for D {
    fn is_policy_access_granted(&self) -> bool {
        self.read(|p| p.policy_access_granted).unwrap_or(false)
    }
}
