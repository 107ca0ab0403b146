//! 错误类型
//!
//! 只有 `StorageUnavailable` 会中断告警发送；音频与元数据错误由调用方记录后吞掉。

use thiserror::Error;

/// 本 crate 通用 Result
pub type Result<T> = std::result::Result<T, AlertError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlertError {
    /// 持久化计数器不可读写（ID 分配失败，必须上报）
    #[error("durable storage unavailable: {0}")]
    StorageUnavailable(String),

    /// 读取或覆盖音频状态失败（本地恢复，告警照常发送）
    #[error("audio subsystem error: {0}")]
    AudioSubsystem(String),

    /// 提示音时长查询失败（使用固定回退时长）
    #[error("metadata lookup failed: {0}")]
    MetadataLookup(String),

    /// 组件构造失败
    #[error("initialization failed: {0}")]
    Initialization(String),
}

impl AlertError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::StorageUnavailable(err.to_string())
    }

    pub fn audio(err: impl std::fmt::Display) -> Self {
        Self::AudioSubsystem(err.to_string())
    }

    pub fn metadata(err: impl std::fmt::Display) -> Self {
        Self::MetadataLookup(err.to_string())
    }

    /// 是否需要上报给调用方
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_) | Self::Initialization(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(AlertError::storage("disk full").is_fatal());
        assert!(AlertError::Initialization("no runtime".into()).is_fatal());
        assert!(!AlertError::audio("denied").is_fatal());
        assert!(!AlertError::metadata("no duration").is_fatal());
    }

    #[test]
    fn test_display_includes_cause() {
        let err = AlertError::storage("permission denied");
        assert_eq!(err.to_string(), "durable storage unavailable: permission denied");
    }
}
