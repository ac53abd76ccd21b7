use std::time::Duration;

use web_time::Instant;

use crate::{ladder::QualityVariant, types::PendingChunk};

/// Height at which a chunk counts as HD and is never discarded.
const HD_MIN_HEIGHT: u32 = 720;
/// Width at which a chunk counts as HD and is never discarded.
const HD_MIN_WIDTH: u32 = 1280;

/// Decides how much of the playback queue may be discarded and re-fetched
/// at a better quality.
#[derive(Clone, Debug)]
pub struct QueueEvictionPolicy {
    min_duration_to_retain: Duration,
    min_time_between_evaluations: Duration,
    last_evaluation: Option<Instant>,
}

impl QueueEvictionPolicy {
    pub fn new(min_duration_to_retain: Duration, min_time_between_evaluations: Duration) -> Self {
        Self {
            min_duration_to_retain,
            min_time_between_evaluations,
            last_evaluation: None,
        }
    }

    /// Forget the last evaluation so the next call always runs.
    pub fn reset(&mut self) {
        self.last_evaluation = None;
    }

    pub fn last_evaluation(&self) -> Option<Instant> {
        self.last_evaluation
    }

    fn should_evaluate(&self, now: Instant) -> bool {
        self.last_evaluation.is_none_or(|last| {
            now.saturating_duration_since(last) >= self.min_time_between_evaluations
        })
    }

    /// Number of queued chunks to keep.
    ///
    /// Returns `queue.len()` when rate-limited or when nothing may be
    /// discarded, otherwise the index of the first discardable chunk.
    pub fn evaluate(
        &mut self,
        now: Instant,
        playback_position_us: i64,
        queue: &[PendingChunk],
        ideal: &QualityVariant,
        playback_speed: f32,
    ) -> usize {
        if !self.should_evaluate(now) {
            return queue.len();
        }
        self.last_evaluation = Some(now);

        let Some(last) = queue.last() else {
            return 0;
        };

        let retain_us = i64::try_from(self.min_duration_to_retain.as_micros()).unwrap_or(i64::MAX);
        let playout_before = |chunk: &PendingChunk| {
            playout_duration_us(chunk.start_time_us - playback_position_us, playback_speed)
        };

        if playout_before(last) < retain_us {
            tracing::trace!(
                queue_len = queue.len(),
                retain_us,
                "queue eviction: not enough buffered to discard"
            );
            return queue.len();
        }

        let truncate_at = queue.iter().position(|chunk| {
            playout_before(chunk) >= retain_us && is_worse_sd(&chunk.variant, ideal)
        });

        match truncate_at {
            Some(index) => {
                tracing::debug!(
                    queue_len = queue.len(),
                    index,
                    ideal_bitrate_kbps = ideal.bitrate_kbps,
                    "queue eviction: discarding from chunk"
                );
                index
            }
            None => queue.len(),
        }
    }
}

/// Playout time for `media_us` of media at `speed`.
#[expect(clippy::cast_possible_truncation, clippy::float_cmp, clippy::cast_precision_loss)]
// exact 1.0 is the identity speed; microsecond spans fit f64 mantissa
pub fn playout_duration_us(media_us: i64, speed: f32) -> i64 {
    if speed == 1.0 {
        return media_us;
    }
    (media_us as f64 / f64::from(speed)).round() as i64
}

fn is_worse_sd(variant: &QualityVariant, ideal: &QualityVariant) -> bool {
    let lower_bitrate = matches!(
        (variant.bitrate_kbps, ideal.bitrate_kbps),
        (Some(bitrate), Some(ideal_bitrate)) if bitrate < ideal_bitrate
    );
    let (Some(width), Some(height)) = (variant.width, variant.height) else {
        return false;
    };
    let lower_height = ideal.height.is_some_and(|ideal_height| height < ideal_height);
    lower_bitrate && height < HD_MIN_HEIGHT && width < HD_MIN_WIDTH && lower_height
}
