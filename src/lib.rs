//! Critical Alert - 在勿扰模式下仍可听见的关键告警
//!
//! 关键告警临时强制打开通知音频流，提示音播放完后把设备恢复到覆盖前的状态；
//! 普通告警遵守设备的勿扰设置。

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod notification;
pub mod permission;
pub mod platform;

pub use audio::{AudioOverrideController, AudioState, AudioSubsystem, OverrideSession, RingerMode};
pub use config::AlertConfig;
pub use error::{AlertError, Result};
pub use notification::{
    AlertDispatcher, AlertRequest, DispatcherBuilder, IdAllocator, PostReceipt, Severity,
};
pub use permission::{PermissionGate, PermissionStatus, PolicyAccess};
pub use platform::{DeviceProfile, FileDevice, InterruptionFilter, MemoryDevice};
