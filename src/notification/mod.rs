//! 告警发送 - 渠道解析、ID 分配、投递
//!
//! # 使用示例
//! ```ignore
//! use critical_alert::notification::DispatcherBuilder;
//!
//! let dispatcher = DispatcherBuilder::new(config)
//!     .audio(device.clone())
//!     .channels(device)
//!     .delivery(Arc::new(AlertLogDelivery::new(config.alert_log_path())))
//!     .store(Arc::new(JsonFileStore::open(config.store_path())?))
//!     .build()?;
//!
//! let receipt = dispatcher.post_critical(0.8)?;
//! receipt.wait_for_restore().await;
//! ```

pub mod builder;
pub mod channel;
pub mod delivery;
pub mod dispatcher;
pub mod id_allocator;
pub mod request;
pub mod store;

pub use builder::DispatcherBuilder;
pub use channel::{ChannelId, ChannelPolicy, ChannelRegistry, ChannelResolver};
pub use delivery::{AlertLogDelivery, AlertRecord, Delivery, DeliveryService};
pub use dispatcher::{AlertDispatcher, DispatchPlan, OverridePreview, PostReceipt};
pub use id_allocator::IdAllocator;
pub use request::{AlertRequest, Severity};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
