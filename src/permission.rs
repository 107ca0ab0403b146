//! 勿扰访问权限检查
//!
//! 权限只能轮询：每次激活（启动、回到前台）都重新检查。

use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::info;

/// 提示用户授予权限的文案
pub const POLICY_ACCESS_PROMPT: &str = "Critical Notifications requires DND permission to work\n\
To grant DND permission, tap on 'Open settings' > Allow Do Not Disturb access to 'Critical Alerts' app";

/// 勿扰访问权限来源
pub trait PolicyAccess: Send + Sync {
    fn is_policy_access_granted(&self) -> bool;
}

/// 权限检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PermissionStatus {
    /// 是否提供告警选项
    pub options_enabled: bool,
    /// 是否需要提示用户授权
    pub prompt_required: bool,
}

impl PermissionStatus {
    fn from_granted(granted: bool) -> Self {
        Self {
            options_enabled: granted,
            prompt_required: !granted,
        }
    }
}

/// 权限门
pub struct PermissionGate {
    source: Arc<dyn PolicyAccess>,
    last: Mutex<Option<PermissionStatus>>,
}

impl PermissionGate {
    pub fn new(source: Arc<dyn PolicyAccess>) -> Self {
        Self {
            source,
            last: Mutex::new(None),
        }
    }

    /// 重新检查权限（在每个激活点调用）
    pub fn refresh(&self) -> PermissionStatus {
        let status = PermissionStatus::from_granted(self.source.is_policy_access_granted());

        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
        if *last != Some(status) {
            info!(
                granted = status.options_enabled,
                "Do Not Disturb access status changed"
            );
        }
        *last = Some(status);
        status
    }

    /// 上次检查的结果
    pub fn last_status(&self) -> Option<PermissionStatus> {
        *self.last.lock().unwrap_or_else(|p| p.into_inner())
    }
}
