//! CLI 运行上下文 - 从配置打开文件设备、计数器和告警日志

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AlertConfig;
use crate::notification::{AlertDispatcher, AlertLogDelivery, DispatcherBuilder, JsonFileStore};
use crate::permission::PermissionGate;
use crate::platform::FileDevice;

pub struct AppContext {
    pub config: AlertConfig,
    pub device: Arc<FileDevice>,
    pub store: Arc<JsonFileStore>,
    pub alert_log: Arc<AlertLogDelivery>,
    pub gate: PermissionGate,
}

impl AppContext {
    pub fn open(config: AlertConfig) -> Result<Self> {
        let device = Arc::new(FileDevice::open(config.device_path())?);
        let store = Arc::new(JsonFileStore::open(config.store_path())?);
        let alert_log = Arc::new(AlertLogDelivery::new(config.alert_log_path()));
        let gate = PermissionGate::new(device.clone());

        Ok(Self {
            config,
            device,
            store,
            alert_log,
            gate,
        })
    }

    /// 构建分发器；`sound` 覆盖配置中的提示音
    pub fn dispatcher(&self, sound: Option<PathBuf>) -> Result<AlertDispatcher> {
        let sound = sound.or_else(|| self.config.sound_path.clone());
        let dispatcher = DispatcherBuilder::new(self.config.clone())
            .audio(self.device.clone())
            .channels(self.device.clone())
            .delivery(self.alert_log.clone())
            .store(self.store.clone())
            .sound(sound)
            .build()?;
        Ok(dispatcher)
    }
}
