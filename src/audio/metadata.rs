//! Sound duration lookup
//!
//! The restore timer waits for the alert sound to finish. Any lookup failure
//! (missing file, unknown container, no frame count) falls back to a fixed delay.

use std::fs::File;
use std::path::Path;
use std::time::Duration;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::config::{FALLBACK_RESTORE_MS, MAX_RESTORE_MS};
use crate::error::{AlertError, Result};

/// Playback duration of a sound resource
pub trait MetadataSource: Send + Sync {
    fn duration_ms(&self, sound: &Path) -> Result<u64>;
}

/// Probes audio files with symphonia and reads the frame count of the default track
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaMetadataSource;

impl MetadataSource for SymphoniaMetadataSource {
    fn duration_ms(&self, sound: &Path) -> Result<u64> {
        let file = File::open(sound)
            .map_err(|e| AlertError::metadata(format!("{}: {}", sound.display(), e)))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = sound.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| AlertError::metadata(format!("{}: {}", sound.display(), e)))?;

        let format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| AlertError::metadata("no audio track found"))?;
        let params = &track.codec_params;

        let n_frames = params
            .n_frames
            .ok_or_else(|| AlertError::metadata("track has no frame count"))?;

        if let Some(time_base) = params.time_base {
            let time = time_base.calc_time(n_frames);
            return time_to_ms(time.seconds, time.frac);
        }

        match params.sample_rate {
            Some(rate) if rate > 0 => frames_to_ms(n_frames, rate),
            _ => Err(AlertError::metadata("track has no time base or sample rate")),
        }
    }
}

/// 秒 + 小数部分转毫秒；溢出视为查询失败
fn time_to_ms(seconds: u64, frac: f64) -> Result<u64> {
    seconds
        .checked_mul(1000)
        .and_then(|ms| ms.checked_add((frac * 1000.0).round() as u64))
        .ok_or_else(|| AlertError::metadata(format!("duration of {}s overflows", seconds)))
}

fn frames_to_ms(n_frames: u64, sample_rate: u32) -> Result<u64> {
    n_frames
        .checked_mul(1000)
        .map(|total| total / u64::from(sample_rate))
        .ok_or_else(|| AlertError::metadata(format!("frame count {} overflows", n_frames)))
}

/// How long an override stays in effect before restoration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreDelay {
    pub fallback: Duration,
    pub max: Duration,
}

impl Default for RestoreDelay {
    fn default() -> Self {
        Self {
            fallback: Duration::from_millis(FALLBACK_RESTORE_MS),
            max: Duration::from_millis(MAX_RESTORE_MS),
        }
    }
}

impl RestoreDelay {
    pub fn from_millis(fallback_ms: u64, max_ms: u64) -> Self {
        Self {
            fallback: Duration::from_millis(fallback_ms),
            max: Duration::from_millis(max_ms.max(fallback_ms)),
        }
    }

    /// Never zero, never above `max`
    pub fn resolve(&self, source: &dyn MetadataSource, sound: Option<&Path>) -> Duration {
        let looked_up = match sound {
            Some(path) => source.duration_ms(path),
            None => Err(AlertError::metadata("no alert sound configured")),
        };

        match looked_up {
            Ok(0) => {
                warn!("Alert sound reports zero duration, using fallback delay");
                self.fallback
            }
            Ok(ms) => {
                let delay = Duration::from_millis(ms).min(self.max);
                debug!(duration_ms = ms, delay_ms = delay.as_millis() as u64, "Alert sound duration resolved");
                delay
            }
            Err(e) => {
                debug!(error = %e, fallback_ms = self.fallback.as_millis() as u64, "Using fallback restore delay");
                self.fallback
            }
        }
    }
}
