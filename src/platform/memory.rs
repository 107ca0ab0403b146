//! 内存设备

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{DeviceBackend, DeviceProfile};
use crate::error::{AlertError, Result};

/// 内存中的设备状态，clone 后共享同一份状态
#[derive(Clone, Default)]
pub struct MemoryDevice {
    profile: Arc<Mutex<DeviceProfile>>,
    fail_audio: Arc<AtomicBool>,
}

impl MemoryDevice {
    pub fn new(profile: DeviceProfile) -> Self {
        Self {
            profile: Arc::new(Mutex::new(profile)),
            fail_audio: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 模拟音频服务不可用
    pub fn set_audio_failure(&self, fail: bool) {
        self.fail_audio.store(fail, Ordering::SeqCst);
    }

    /// 当前状态（不经过平台规则）
    pub fn snapshot(&self) -> DeviceProfile {
        self.lock().clone()
    }

    /// 模拟外部（用户或其他应用）修改设备状态
    pub fn update(&self, f: impl FnOnce(&mut DeviceProfile)) {
        f(&mut self.lock());
    }

    fn lock(&self) -> MutexGuard<'_, DeviceProfile> {
        self.profile.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> Result<()> {
        if self.fail_audio.load(Ordering::SeqCst) {
            return Err(AlertError::audio("audio service unavailable"));
        }
        Ok(())
    }
}

impl DeviceBackend for MemoryDevice {
    fn read<T>(&self, f: impl FnOnce(&DeviceProfile) -> T) -> Result<T> {
        self.check_available()?;
        Ok(f(&self.lock()))
    }

    fn write<T>(&self, f: impl FnOnce(&mut DeviceProfile) -> Result<T>) -> Result<T> {
        self.check_available()?;
        f(&mut self.lock())
    }
}
