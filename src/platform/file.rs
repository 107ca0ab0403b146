//! 文件设备 - 设备状态保存在 JSON 文件中
//!
//! 每次读写都持有独占文件锁，写入通过临时文件原子替换。

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{DeviceBackend, DeviceProfile};
use crate::error::{AlertError, Result};

pub struct FileDevice {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileDevice {
    /// 打开设备文件，立即创建所在目录
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AlertError::Initialization(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        let lock_path = path.with_extension("lock");
        Ok(Self { path, lock_path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取设备状态（文件不存在时为默认设备）
    pub fn load(&self) -> Result<DeviceProfile> {
        self.read(|p| p.clone())
    }

    /// 直接编辑设备状态，不经过平台权限规则（`calert device` 使用）
    pub fn edit(&self, f: impl FnOnce(&mut DeviceProfile)) -> Result<DeviceProfile> {
        self.write(|p| {
            f(p);
            Ok(p.clone())
        })
    }

    fn lock(&self) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.lock_path)
            .map_err(AlertError::audio)?;
        file.lock_exclusive().map_err(AlertError::audio)?;
        Ok(file)
    }

    fn load_unlocked(&self) -> Result<DeviceProfile> {
        if !self.path.exists() {
            return Ok(DeviceProfile::default());
        }
        let content = fs::read_to_string(&self.path).map_err(AlertError::audio)?;
        serde_json::from_str(&content)
            .map_err(|e| AlertError::audio(format!("invalid device file {}: {}", self.path.display(), e)))
    }

    fn save_unlocked(&self, profile: &DeviceProfile) -> Result<()> {
        let temp_path = self.path.with_extension("tmp");
        {
            let mut temp = File::create(&temp_path).map_err(AlertError::audio)?;
            let json = serde_json::to_string_pretty(profile).map_err(AlertError::audio)?;
            temp.write_all(json.as_bytes()).map_err(AlertError::audio)?;
        }
        fs::rename(&temp_path, &self.path).map_err(AlertError::audio)?;
        debug!(path = %self.path.display(), "Device state saved");
        Ok(())
    }
}

impl DeviceBackend for FileDevice {
    fn read<T>(&self, f: impl FnOnce(&DeviceProfile) -> T) -> Result<T> {
        let lock = self.lock()?;
        let profile = self.load_unlocked();
        lock.unlock().map_err(AlertError::audio)?;
        Ok(f(&profile?))
    }

    fn write<T>(&self, f: impl FnOnce(&mut DeviceProfile) -> Result<T>) -> Result<T> {
        let lock = self.lock()?;
        let result = self.load_unlocked().and_then(|mut profile| {
            let value = f(&mut profile)?;
            self.save_unlocked(&profile)?;
            Ok(value)
        });
        lock.unlock().map_err(AlertError::audio)?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioSubsystem, RingerMode};
    use crate::notification::channel::{ChannelId, ChannelPolicy, ChannelRegistry};
    use crate::platform::InterruptionFilter;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_default_device() {
        let temp = tempdir().unwrap();
        let device = FileDevice::open(temp.path().join("device.json")).unwrap();
        assert_eq!(device.load().unwrap(), DeviceProfile::default());
    }

    #[test]
    fn test_writes_persist() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("device.json");

        let device = FileDevice::open(&path).unwrap();
        device.set_ringer_mode(RingerMode::Vibrate).unwrap();
        device.set_stream_volume(2).unwrap();
        device
            .upsert_channel(&ChannelPolicy {
                id: ChannelId("default".into()),
                name: "Default".into(),
                bypasses_suppression: true,
            })
            .unwrap();

        let reopened = FileDevice::open(&path).unwrap();
        let profile = reopened.load().unwrap();
        assert_eq!(profile.ringer_mode, RingerMode::Vibrate);
        assert_eq!(profile.notification_volume, 2);
        assert!(profile.channels["default"].bypasses_suppression);
    }

    #[test]
    fn test_denied_write_leaves_file_unchanged() {
        let temp = tempdir().unwrap();
        let device = FileDevice::open(temp.path().join("device.json")).unwrap();
        device
            .edit(|p| p.interruption_filter = InterruptionFilter::None)
            .unwrap();

        assert!(device.set_stream_volume(1).is_err());
        assert_eq!(device.load().unwrap().notification_volume, 5);
    }

    #[test]
    fn test_corrupt_file_is_audio_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("device.json");
        fs::write(&path, "garbage").unwrap();

        let device = FileDevice::open(&path).unwrap();
        assert!(matches!(device.ringer_mode(), Err(AlertError::AudioSubsystem(_))));
    }
}
