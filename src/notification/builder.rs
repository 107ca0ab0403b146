//! 分发器构建器 - 把平台句柄显式注入分发器

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::channel::{ChannelRegistry, ChannelResolver};
use super::delivery::DeliveryService;
use super::dispatcher::AlertDispatcher;
use super::id_allocator::IdAllocator;
use super::store::KeyValueStore;
use crate::audio::{
    AudioOverrideController, AudioSubsystem, MetadataSource, RestoreDelay, RestoreScheduler,
    SymphoniaMetadataSource, TokioScheduler,
};
use crate::config::AlertConfig;
use crate::error::{AlertError, Result};

/// 分发器构建器
///
/// 音频、渠道、投递、存储四个句柄必须提供；元数据默认用 symphonia 探测，
/// 调度器默认绑定当前 tokio 运行时。
pub struct DispatcherBuilder {
    config: AlertConfig,
    audio: Option<Arc<dyn AudioSubsystem>>,
    channels: Option<Arc<dyn ChannelRegistry>>,
    delivery: Option<Arc<dyn DeliveryService>>,
    store: Option<Arc<dyn KeyValueStore>>,
    metadata: Option<Arc<dyn MetadataSource>>,
    scheduler: Option<Arc<dyn RestoreScheduler>>,
    sound: Option<PathBuf>,
}

impl DispatcherBuilder {
    pub fn new(config: AlertConfig) -> Self {
        let sound = config.sound_path.clone();
        Self {
            config,
            audio: None,
            channels: None,
            delivery: None,
            store: None,
            metadata: None,
            scheduler: None,
            sound,
        }
    }

    pub fn audio(mut self, audio: Arc<dyn AudioSubsystem>) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn channels(mut self, channels: Arc<dyn ChannelRegistry>) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn delivery(mut self, delivery: Arc<dyn DeliveryService>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn metadata(mut self, metadata: Arc<dyn MetadataSource>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn RestoreScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// 覆盖配置中的提示音文件
    pub fn sound(mut self, sound: Option<PathBuf>) -> Self {
        self.sound = sound;
        self
    }

    pub fn build(self) -> Result<AlertDispatcher> {
        let audio = self.audio.ok_or_else(|| missing("audio subsystem"))?;
        let channels = self.channels.ok_or_else(|| missing("channel registry"))?;
        let delivery = self.delivery.ok_or_else(|| missing("delivery service"))?;
        let store = self.store.ok_or_else(|| missing("key-value store"))?;
        let metadata: Arc<dyn MetadataSource> = match self.metadata {
            Some(m) => m,
            None => Arc::new(SymphoniaMetadataSource),
        };
        let scheduler: Arc<dyn RestoreScheduler> = match self.scheduler {
            Some(s) => s,
            None => Arc::new(TokioScheduler::new()?),
        };

        let delay = RestoreDelay::from_millis(self.config.fallback_restore_ms, self.config.max_restore_ms);
        let controller = AudioOverrideController::new(audio, metadata, scheduler)
            .with_sound(self.sound.clone())
            .with_delay(delay);
        let resolver = ChannelResolver::new(
            channels,
            self.config.channel_id.clone(),
            self.config.channel_name.clone(),
        );
        let allocator = IdAllocator::new(store, self.config.counter_key.clone());

        info!(
            channel = %self.config.channel_id,
            delivery = delivery.name(),
            sound = ?self.sound,
            "Alert dispatcher ready"
        );
        Ok(AlertDispatcher::new(resolver, controller, allocator, delivery))
    }
}

fn missing(what: &str) -> AlertError {
    AlertError::Initialization(format!("{} not provided", what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::delivery::AlertLogDelivery;
    use crate::notification::store::MemoryStore;
    use crate::platform::MemoryDevice;
    use tempfile::tempdir;

    #[test]
    fn test_missing_handle_is_initialization_error() {
        let err = DispatcherBuilder::new(AlertConfig::default()).build().err().unwrap();
        assert!(matches!(err, AlertError::Initialization(_)));
    }

    #[test]
    fn test_default_scheduler_needs_runtime() {
        let temp = tempdir().unwrap();
        let device = Arc::new(MemoryDevice::default());
        let result = DispatcherBuilder::new(AlertConfig::default())
            .audio(device.clone())
            .channels(device)
            .delivery(Arc::new(AlertLogDelivery::new(temp.path().join("alerts.jsonl"))))
            .store(Arc::new(MemoryStore::new()))
            .build();
        assert!(matches!(result, Err(AlertError::Initialization(_))));
    }

    #[tokio::test]
    async fn test_build_uses_config_channel() {
        let temp = tempdir().unwrap();
        let device = MemoryDevice::default();
        let config = AlertConfig {
            channel_id: "alerts".into(),
            ..Default::default()
        };
        let dispatcher = DispatcherBuilder::new(config)
            .audio(Arc::new(device.clone()))
            .channels(Arc::new(device.clone()))
            .delivery(Arc::new(AlertLogDelivery::new(temp.path().join("alerts.jsonl"))))
            .store(Arc::new(MemoryStore::new()))
            .build()
            .unwrap();

        let receipt = dispatcher.post_normal().unwrap();
        assert_eq!(receipt.channel_id.as_str(), "alerts");
        assert!(device.snapshot().channels.contains_key("alerts"));
    }
}
