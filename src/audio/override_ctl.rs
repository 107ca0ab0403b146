//! 音频覆盖控制器 - 临时打开通知音频流，提示音播放完后恢复原状态
//!
//! # 流程
//! 1. 读取当前音频状态快照
//! 2. 修正勿扰模式下被误报为 Silent 的铃声模式
//! 3. 计算目标音量 `ceil(max × fraction)`，未指定比例时沿用当前音量
//! 4. 铃声模式强制为 Normal 并设置通知音量
//! 5. 查询提示音时长（失败则 5000ms）
//! 6. 调度一次性恢复任务，无条件写回快照
//!
//! 恢复是 last-writer-wins：不比较中间状态。两个重叠的会话各自恢复自己的快照，
//! 后调度的会话拿到的是已被覆盖的状态，可能把设备恢复成错误的值。

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::metadata::{MetadataSource, RestoreDelay};
use super::scheduler::{RestoreHandle, RestoreScheduler};
use super::state::{AudioState, AudioSubsystem, RingerMode};
use crate::error::Result;

/// 计算覆盖音量 `ceil(max × fraction)`
///
/// 乘法在 f32 中完成，10 × 0.8f32 正好舍入为 8.0。
pub fn applied_volume(max_volume: u32, captured_volume: u32, fraction: Option<f32>) -> u32 {
    match fraction.filter(|f| !f.is_nan()) {
        None => captured_volume,
        Some(f) => {
            let product = max_volume as f32 * f.clamp(0.0, 1.0);
            (product.ceil() as u32).min(max_volume)
        }
    }
}

/// 一次覆盖-恢复周期
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverrideSession {
    /// 修正后的快照，恢复时写回
    pub captured_state: AudioState,
    /// 平台报告的原始铃声模式
    pub reported_ringer_mode: RingerMode,
    pub applied_volume: u32,
    pub armed_at: DateTime<Utc>,
    #[serde(with = "duration_ms")]
    pub restore_after: Duration,
}

impl OverrideSession {
    /// 铃声模式是否被修正
    pub fn ringer_corrected(&self) -> bool {
        self.reported_ringer_mode != self.captured_state.ringer_mode
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

/// 已生效的覆盖及其恢复任务
pub struct ArmedOverride {
    pub session: OverrideSession,
    pub restore: RestoreHandle,
}

/// 音频覆盖控制器
pub struct AudioOverrideController {
    audio: Arc<dyn AudioSubsystem>,
    metadata: Arc<dyn MetadataSource>,
    scheduler: Arc<dyn RestoreScheduler>,
    sound: Option<PathBuf>,
    delay: RestoreDelay,
    pending: Arc<AtomicUsize>,
}

impl AudioOverrideController {
    pub fn new(
        audio: Arc<dyn AudioSubsystem>,
        metadata: Arc<dyn MetadataSource>,
        scheduler: Arc<dyn RestoreScheduler>,
    ) -> Self {
        Self {
            audio,
            metadata,
            scheduler,
            sound: None,
            delay: RestoreDelay::default(),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 设置提示音文件（用于计算恢复延迟）
    pub fn with_sound(mut self, sound: Option<PathBuf>) -> Self {
        self.sound = sound;
        self
    }

    pub fn with_delay(mut self, delay: RestoreDelay) -> Self {
        self.delay = delay;
        self
    }

    /// 已调度但尚未执行的恢复数量
    pub fn pending_restorations(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// 覆盖勿扰并调度恢复
    ///
    /// 读取或写入失败时返回 `AudioSubsystem`，此时不调度恢复；
    /// 若已部分写入，会立即尝试写回快照。
    pub fn apply_critical_override(&self, loudness_fraction: Option<f32>) -> Result<ArmedOverride> {
        let reported = AudioState::capture(self.audio.as_ref()).map_err(|e| {
            warn!(error = %e, "Failed to capture audio state");
            e
        })?;
        let captured = reported.corrected();
        if captured.ringer_mode != reported.ringer_mode {
            debug!(
                reported = %reported.ringer_mode,
                restored = %captured.ringer_mode,
                "Ringer mode misreported under Do Not Disturb, correcting"
            );
        }

        let volume = applied_volume(captured.stream_max_volume, captured.stream_volume, loudness_fraction);

        if let Err(e) = self.force_audible(volume) {
            warn!(error = %e, "Failed to override audio state, rolling back");
            if let Err(rollback) = restore_state(self.audio.as_ref(), &captured) {
                error!(error = %rollback, "Rollback after failed override also failed");
            }
            return Err(e);
        }

        let restore_after = self.delay.resolve(self.metadata.as_ref(), self.sound.as_deref());
        let session = OverrideSession {
            captured_state: captured,
            reported_ringer_mode: reported.ringer_mode,
            applied_volume: volume,
            armed_at: Utc::now(),
            restore_after,
        };

        info!(
            ringer_mode = %reported.ringer_mode,
            captured_volume = captured.stream_volume,
            applied_volume = volume,
            max_volume = captured.stream_max_volume,
            suppression = captured.suppression_active,
            restore_after_ms = restore_after.as_millis() as u64,
            "Critical audio override applied"
        );

        let restore = self.arm_restore(captured, restore_after);
        Ok(ArmedOverride { session, restore })
    }

    /// 只读预览：返回修正后的快照、目标音量和恢复延迟
    pub fn preview(&self, loudness_fraction: Option<f32>) -> Result<(AudioState, u32, Duration)> {
        let captured = AudioState::capture(self.audio.as_ref())?.corrected();
        let volume = applied_volume(captured.stream_max_volume, captured.stream_volume, loudness_fraction);
        let delay = self.delay.resolve(self.metadata.as_ref(), self.sound.as_deref());
        Ok((captured, volume, delay))
    }

    /// 立即写回会话快照，用于覆盖后发送被中止的情况
    ///
    /// 已调度的恢复任务仍会运行，写入的是同一份快照。
    pub fn rollback(&self, session: &OverrideSession) {
        let captured = &session.captured_state;
        match restore_state(self.audio.as_ref(), captured) {
            Ok(()) => info!(
                ringer_mode = %captured.ringer_mode,
                volume = captured.stream_volume,
                "Audio override rolled back"
            ),
            Err(e) => error!(error = %e, "Failed to roll back audio override"),
        }
    }

    fn force_audible(&self, volume: u32) -> Result<()> {
        self.audio.set_ringer_mode(RingerMode::Normal)?;
        self.audio.set_stream_volume(volume)?;
        Ok(())
    }

    fn arm_restore(&self, captured: AudioState, delay: Duration) -> RestoreHandle {
        let audio = self.audio.clone();
        let pending = self.pending.clone();
        pending.fetch_add(1, Ordering::SeqCst);

        self.scheduler.schedule(
            delay,
            Box::new(move || {
                match restore_state(audio.as_ref(), &captured) {
                    Ok(()) => info!(
                        ringer_mode = %captured.ringer_mode,
                        volume = captured.stream_volume,
                        "Audio state restored"
                    ),
                    Err(e) => error!(error = %e, "Failed to restore audio state"),
                }
                pending.fetch_sub(1, Ordering::SeqCst);
            }),
        )
    }
}

/// 写回快照的铃声模式和音量；两步都会尝试，返回第一个错误
pub fn restore_state(audio: &dyn AudioSubsystem, state: &AudioState) -> Result<()> {
    let ringer = audio.set_ringer_mode(state.ringer_mode);
    let volume = audio.set_stream_volume(state.stream_volume);
    match (ringer, volume) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(e), _) | (_, Err(e)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::scheduler::TokioScheduler;
    use crate::error::AlertError;
    use crate::platform::{DeviceProfile, InterruptionFilter, MemoryDevice};
    use std::path::Path;

    struct NoMetadata;

    impl MetadataSource for NoMetadata {
        fn duration_ms(&self, _sound: &Path) -> Result<u64> {
            Err(AlertError::metadata("missing"))
        }
    }

    struct FixedMetadata(u64);

    impl MetadataSource for FixedMetadata {
        fn duration_ms(&self, _sound: &Path) -> Result<u64> {
            Ok(self.0)
        }
    }

    fn dnd_device() -> MemoryDevice {
        MemoryDevice::new(DeviceProfile {
            ringer_mode: RingerMode::Silent,
            notification_volume: 3,
            max_notification_volume: 10,
            interruption_filter: InterruptionFilter::Priority,
            policy_access_granted: true,
            ..Default::default()
        })
    }

    fn controller(device: &MemoryDevice, metadata: Arc<dyn MetadataSource>) -> AudioOverrideController {
        AudioOverrideController::new(
            Arc::new(device.clone()),
            metadata,
            Arc::new(TokioScheduler::new().unwrap()),
        )
    }

    #[test]
    fn test_applied_volume_ceil() {
        assert_eq!(applied_volume(10, 3, Some(0.8)), 8);
        assert_eq!(applied_volume(7, 3, Some(0.8)), 6);
        assert_eq!(applied_volume(7, 3, Some(0.5)), 4);
        assert_eq!(applied_volume(10, 3, Some(0.3)), 3);
        assert_eq!(applied_volume(15, 0, Some(0.01)), 1);
        assert_eq!(applied_volume(10, 3, Some(1.0)), 10);
    }

    #[test]
    fn test_applied_volume_rounds_up_small_excess() {
        assert_eq!(applied_volume(10, 3, Some(0.800004)), 9);
        assert_eq!(applied_volume(4, 0, Some(0.7501)), 4);
        assert_eq!(applied_volume(4, 0, Some(0.75)), 3);
    }

    #[test]
    fn test_applied_volume_without_fraction_keeps_captured() {
        assert_eq!(applied_volume(10, 3, None), 3);
        assert_eq!(applied_volume(10, 0, None), 0);
        assert_eq!(applied_volume(10, 4, Some(f32::NAN)), 4);
    }

    #[test]
    fn test_applied_volume_clamps_out_of_range() {
        assert_eq!(applied_volume(10, 3, Some(1.7)), 10);
        assert_eq!(applied_volume(10, 3, Some(-0.5)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_override_then_fallback_restore() {
        let device = dnd_device();
        let ctl = controller(&device, Arc::new(NoMetadata));

        let start = tokio::time::Instant::now();
        let armed = ctl.apply_critical_override(Some(0.8)).unwrap();

        let during = device.snapshot();
        assert_eq!(during.ringer_mode, RingerMode::Normal);
        assert_eq!(during.notification_volume, 8);
        assert_eq!(armed.session.applied_volume, 8);
        assert_eq!(armed.session.restore_after, Duration::from_millis(5000));
        assert!(armed.session.ringer_corrected());
        assert_eq!(ctl.pending_restorations(), 1);

        tokio::time::advance(Duration::from_millis(4999)).await;
        tokio::task::yield_now().await;
        assert_eq!(device.snapshot().notification_volume, 8);
        assert!(!armed.restore.is_finished());

        armed.restore.wait().await;
        let after = device.snapshot();
        assert_eq!(after.ringer_mode, RingerMode::Normal);
        assert_eq!(after.notification_volume, 3);
        assert_eq!(ctl.pending_restorations(), 0);
        assert!(start.elapsed() >= Duration::from_millis(5000));
        assert!(start.elapsed() < Duration::from_millis(5010));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_uses_sound_duration() {
        let device = dnd_device();
        let ctl = controller(&device, Arc::new(FixedMetadata(1200)))
            .with_sound(Some(PathBuf::from("chime.wav")));

        let start = tokio::time::Instant::now();
        let armed = ctl.apply_critical_override(None).unwrap();
        assert_eq!(armed.session.restore_after, Duration::from_millis(1200));
        // 未指定比例：只切换铃声模式，音量不变
        assert_eq!(device.snapshot().notification_volume, 3);

        armed.restore.wait().await;
        assert!(start.elapsed() < Duration::from_millis(1210));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_overwrites_external_changes() {
        let device = MemoryDevice::new(DeviceProfile {
            ringer_mode: RingerMode::Vibrate,
            notification_volume: 2,
            max_notification_volume: 7,
            ..Default::default()
        });
        let ctl = controller(&device, Arc::new(NoMetadata));

        let armed = ctl.apply_critical_override(Some(1.0)).unwrap();
        assert_eq!(device.snapshot().notification_volume, 7);

        // 覆盖期间外部修改
        device.update(|p| {
            p.ringer_mode = RingerMode::Silent;
            p.notification_volume = 5;
        });

        armed.restore.wait().await;
        let after = device.snapshot();
        assert_eq!(after.ringer_mode, RingerMode::Vibrate);
        assert_eq!(after.notification_volume, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_without_dnd_restores_silent() {
        let device = MemoryDevice::new(DeviceProfile {
            ringer_mode: RingerMode::Silent,
            notification_volume: 4,
            max_notification_volume: 7,
            ..Default::default()
        });
        let ctl = controller(&device, Arc::new(NoMetadata));

        let armed = ctl.apply_critical_override(Some(0.5)).unwrap();
        assert!(!armed.session.ringer_corrected());
        armed.restore.wait().await;
        assert_eq!(device.snapshot().ringer_mode, RingerMode::Silent);
    }

    #[tokio::test]
    async fn test_capture_failure_changes_nothing() {
        let device = dnd_device();
        device.set_audio_failure(true);
        let ctl = controller(&device, Arc::new(NoMetadata));

        let err = ctl.apply_critical_override(Some(0.8)).err().unwrap();
        assert!(matches!(err, AlertError::AudioSubsystem(_)));
        assert_eq!(ctl.pending_restorations(), 0);

        device.set_audio_failure(false);
        assert_eq!(device.snapshot().notification_volume, 3);
        assert_eq!(device.snapshot().ringer_mode, RingerMode::Silent);
    }

    #[tokio::test]
    async fn test_override_denied_without_policy_access() {
        let device = dnd_device();
        device.update(|p| p.policy_access_granted = false);
        let ctl = controller(&device, Arc::new(NoMetadata));

        assert!(ctl.apply_critical_override(Some(0.8)).is_err());
        assert_eq!(ctl.pending_restorations(), 0);
        let state = device.snapshot();
        assert_eq!(state.ringer_mode, RingerMode::Silent);
        assert_eq!(state.notification_volume, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_sessions_restore_stale_snapshot() {
        let device = MemoryDevice::new(DeviceProfile {
            ringer_mode: RingerMode::Normal,
            notification_volume: 3,
            max_notification_volume: 10,
            ..Default::default()
        });
        let ctl = controller(&device, Arc::new(NoMetadata));

        let first = ctl.apply_critical_override(Some(0.8)).unwrap();
        tokio::time::advance(Duration::from_millis(1000)).await;
        let second = ctl.apply_critical_override(Some(0.8)).unwrap();

        // 第二个会话捕获的是已覆盖的状态
        assert_eq!(second.session.captured_state.stream_volume, 8);
        assert_eq!(ctl.pending_restorations(), 2);

        first.restore.wait().await;
        assert_eq!(device.snapshot().notification_volume, 3);

        second.restore.wait().await;
        assert_eq!(device.snapshot().notification_volume, 8);
        assert_eq!(ctl.pending_restorations(), 0);
    }
}
