//! 告警分发器 - 解析渠道、覆盖音频、分配 ID、投递
//!
//! 音频覆盖必须在投递之前生效（平台在投递时播放提示音），但覆盖失败不能阻止投递。

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::channel::{ChannelId, ChannelResolver};
use super::delivery::{Delivery, DeliveryService};
use super::id_allocator::IdAllocator;
use super::request::{AlertRequest, Severity};
use crate::audio::{AudioOverrideController, AudioState, OverrideSession, RestoreHandle};
use crate::error::{AlertError, Result};

/// 一次发送的结果
pub struct PostReceipt {
    pub id: u32,
    pub channel_id: ChannelId,
    /// 关键告警的覆盖会话
    pub session: Option<OverrideSession>,
    /// 覆盖失败原因（告警仍已发送）
    pub override_error: Option<AlertError>,
    restore: Option<RestoreHandle>,
}

impl PostReceipt {
    /// 是否有待执行的恢复任务
    pub fn restore_pending(&self) -> bool {
        self.restore.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 等待音频恢复完成；没有覆盖时立即返回
    pub async fn wait_for_restore(self) {
        if let Some(handle) = self.restore {
            handle.wait().await;
        }
    }
}

/// 覆盖预览（dry-run）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverridePreview {
    pub captured_state: AudioState,
    pub applied_volume: u32,
    pub restore_after_ms: u64,
}

/// dry-run 计划
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchPlan {
    pub severity: Severity,
    pub channel_id: ChannelId,
    pub bypass: bool,
    pub title: String,
    pub body: String,
    pub audio_override: Option<OverridePreview>,
}

/// 告警分发器
pub struct AlertDispatcher {
    resolver: ChannelResolver,
    controller: AudioOverrideController,
    allocator: IdAllocator,
    delivery: Arc<dyn DeliveryService>,
}

impl AlertDispatcher {
    pub fn new(
        resolver: ChannelResolver,
        controller: AudioOverrideController,
        allocator: IdAllocator,
        delivery: Arc<dyn DeliveryService>,
    ) -> Self {
        Self {
            resolver,
            controller,
            allocator,
            delivery,
        }
    }

    /// 以指定响度发送关键告警
    pub fn post_critical(&self, loudness_fraction: f32) -> Result<PostReceipt> {
        self.post(&AlertRequest::critical(Some(loudness_fraction)))
    }

    /// 发送普通告警
    pub fn post_normal(&self) -> Result<PostReceipt> {
        self.post(&AlertRequest::normal())
    }

    /// 发送告警
    ///
    /// 只有 ID 分配失败（`StorageUnavailable`）会返回错误；
    /// 音频覆盖和投递失败都只记录日志。ID 分配失败时已生效的覆盖会立即撤销。
    pub fn post(&self, request: &AlertRequest) -> Result<PostReceipt> {
        let channel_id = self.resolver.resolve(request.severity.bypasses_suppression());

        let (mut session, mut restore, mut override_error) = (None, None, None);
        if request.is_critical() {
            match self.controller.apply_critical_override(request.loudness_fraction) {
                Ok(armed) => {
                    session = Some(armed.session);
                    restore = Some(armed.restore);
                }
                Err(e) => {
                    warn!(error = %e, "Audio override failed, posting alert at current volume");
                    override_error = Some(e);
                }
            }
        }

        // 没有 ID 就不会投递，覆盖必须立即撤销
        let id = match self.allocator.next_id() {
            Ok(id) => id,
            Err(e) => {
                if let Some(session) = &session {
                    self.controller.rollback(session);
                }
                return Err(e);
            }
        };

        let delivery = Delivery {
            channel_id: channel_id.clone(),
            id,
            severity: request.severity,
            title: request.title.clone(),
            body: request.body.clone(),
        };
        if let Err(e) = self.delivery.deliver(&delivery) {
            warn!(service = self.delivery.name(), alert_id = id, error = %e, "Alert delivery failed");
        }

        info!(
            alert_id = id,
            severity = %request.severity,
            channel = %channel_id,
            overridden = session.is_some(),
            "Alert posted"
        );

        Ok(PostReceipt {
            id,
            channel_id,
            session,
            override_error,
            restore,
        })
    }

    /// 计算发送计划，不修改设备、不分配 ID、不投递
    pub fn plan(&self, request: &AlertRequest) -> Result<DispatchPlan> {
        let audio_override = if request.is_critical() {
            let (captured_state, applied_volume, restore_after) =
                self.controller.preview(request.loudness_fraction)?;
            Some(OverridePreview {
                captured_state,
                applied_volume,
                restore_after_ms: duration_ms(restore_after),
            })
        } else {
            None
        };

        Ok(DispatchPlan {
            severity: request.severity,
            channel_id: self.resolver.channel_id().clone(),
            bypass: request.severity.bypasses_suppression(),
            title: request.title.clone(),
            body: request.body.clone(),
            audio_override,
        })
    }

    /// 已调度但尚未执行的音频恢复数量
    pub fn pending_restorations(&self) -> usize {
        self.controller.pending_restorations()
    }
}

fn duration_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}
