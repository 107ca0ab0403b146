//! 音频覆盖 - 让关键告警在勿扰模式下仍可听见

pub mod metadata;
pub mod override_ctl;
pub mod scheduler;
pub mod state;

pub use metadata::{MetadataSource, RestoreDelay, SymphoniaMetadataSource};
pub use override_ctl::{applied_volume, restore_state, ArmedOverride, AudioOverrideController, OverrideSession};
pub use scheduler::{RestoreHandle, RestoreScheduler, RestoreTask, TokioScheduler};
pub use state::{AudioState, AudioSubsystem, RingerMode};
