//! 投递渠道策略 - 关键告警渠道绕过勿扰模式

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;

/// 渠道 ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 渠道策略
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPolicy {
    pub id: ChannelId,
    pub name: String,
    /// 是否绕过勿扰模式
    pub bypasses_suppression: bool,
}

/// 平台渠道注册表
///
/// 按 ID upsert：同一 ID 只存在一个渠道对象，重复注册覆盖 bypass 标志。
pub trait ChannelRegistry: Send + Sync {
    fn upsert_channel(&self, policy: &ChannelPolicy) -> Result<()>;
}

/// 渠道解析器
pub struct ChannelResolver {
    registry: Arc<dyn ChannelRegistry>,
    channel_id: ChannelId,
    channel_name: String,
}

impl ChannelResolver {
    pub fn new(
        registry: Arc<dyn ChannelRegistry>,
        channel_id: impl Into<String>,
        channel_name: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            channel_id: ChannelId(channel_id.into()),
            channel_name: channel_name.into(),
        }
    }

    /// 创建或更新唯一的渠道并返回其 ID（last-write-wins）
    ///
    /// 注册失败只记录日志，不影响告警发送。
    pub fn resolve(&self, bypass: bool) -> ChannelId {
        let policy = ChannelPolicy {
            id: self.channel_id.clone(),
            name: self.channel_name.clone(),
            bypasses_suppression: bypass,
        };

        match self.registry.upsert_channel(&policy) {
            Ok(()) => debug!(channel = %policy.id, bypass, "Channel registered"),
            Err(e) => warn!(channel = %policy.id, bypass, error = %e, "Channel registration failed"),
        }

        self.channel_id.clone()
    }

    pub fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }
}
