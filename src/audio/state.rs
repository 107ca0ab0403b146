//! 设备音频状态与平台音频接口

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// 设备铃声模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RingerMode {
    Normal,
    Vibrate,
    Silent,
}

impl std::fmt::Display for RingerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl RingerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RingerMode::Normal => "normal",
            RingerMode::Vibrate => "vibrate",
            RingerMode::Silent => "silent",
        }
    }
}

impl std::str::FromStr for RingerMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(RingerMode::Normal),
            "vibrate" => Ok(RingerMode::Vibrate),
            "silent" => Ok(RingerMode::Silent),
            other => Err(format!("unknown ringer mode: {}", other)),
        }
    }
}

/// 平台音频子系统（通知音频流）
///
/// 所有调用都可能失败，例如没有勿扰访问权限时修改铃声模式。
pub trait AudioSubsystem: Send + Sync {
    fn ringer_mode(&self) -> Result<RingerMode>;

    fn set_ringer_mode(&self, mode: RingerMode) -> Result<()>;

    /// 通知流当前音量
    fn stream_volume(&self) -> Result<u32>;

    fn set_stream_volume(&self, volume: u32) -> Result<()>;

    /// 通知流最大音量
    fn max_stream_volume(&self) -> Result<u32>;

    /// 勿扰过滤是否生效（interruption filter 不是 "all"）
    fn suppression_active(&self) -> Result<bool>;
}

/// 音频状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioState {
    pub ringer_mode: RingerMode,
    pub stream_volume: u32,
    pub stream_max_volume: u32,
    pub suppression_active: bool,
}

impl AudioState {
    /// 从音频子系统读取一次快照
    pub fn capture(audio: &dyn AudioSubsystem) -> Result<Self> {
        Ok(Self {
            ringer_mode: audio.ringer_mode()?,
            stream_volume: audio.stream_volume()?,
            stream_max_volume: audio.max_stream_volume()?,
            suppression_active: audio.suppression_active()?,
        })
    }

    /// 恢复时应写回的铃声模式
    ///
    /// 勿扰生效时平台会把 Normal 报告成 Silent；音量不为 0 说明用户真实设置是 Normal。
    pub fn effective_ringer_mode(&self) -> RingerMode {
        if self.suppression_active && self.ringer_mode == RingerMode::Silent && self.stream_volume != 0 {
            RingerMode::Normal
        } else {
            self.ringer_mode
        }
    }

    /// 应用修正后的快照
    pub fn corrected(&self) -> Self {
        Self {
            ringer_mode: self.effective_ringer_mode(),
            ..*self
        }
    }
}
