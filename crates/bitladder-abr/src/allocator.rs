use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::{
    checkpoints::CheckpointTable,
    error::{AbrError, AbrResult},
    ladder::BitrateLadder,
};

/// Source of the raw throughput estimate.
///
/// Implemented by whatever estimator the pipeline runs; read once per
/// allocation query.
#[cfg_attr(test, unimock::unimock(api = BandwidthMeterMock))]
pub trait BandwidthMeter {
    /// Current throughput estimate in bits per second.
    fn bitrate_estimate(&self) -> u64;
}

/// Meter backed by a shared atomic the pipeline's estimator writes into.
#[derive(Clone, Debug, Default)]
pub struct SharedBandwidthMeter {
    estimate_bps: Arc<AtomicU64>,
}

impl SharedBandwidthMeter {
    pub fn new(initial_bps: u64) -> Self {
        Self {
            estimate_bps: Arc::new(AtomicU64::new(initial_bps)),
        }
    }

    pub fn set(&self, estimate_bps: u64) {
        self.estimate_bps.store(estimate_bps, Ordering::Release);
    }
}

impl BandwidthMeter for SharedBandwidthMeter {
    fn bitrate_estimate(&self) -> u64 {
        self.estimate_bps.load(Ordering::Acquire)
    }
}

impl<M: BandwidthMeter + ?Sized> BandwidthMeter for Arc<M> {
    fn bitrate_estimate(&self) -> u64 {
        (**self).bitrate_estimate()
    }
}

/// Turns a raw throughput estimate into the bandwidth one selection may use.
pub struct BandwidthAllocator<M> {
    meter: M,
    bandwidth_fraction: f64,
    reserved_bps: u64,
    checkpoints: Option<CheckpointTable>,
}

impl<M: BandwidthMeter> BandwidthAllocator<M> {
    pub fn new(meter: M, bandwidth_fraction: f64, reserved_bps: u64) -> AbrResult<Self> {
        if !(bandwidth_fraction.is_finite() && bandwidth_fraction >= 0.0) {
            return Err(AbrError::InvalidOption {
                name: "bandwidth_fraction",
                reason: format!("must be finite and non-negative, got {bandwidth_fraction}"),
            });
        }
        Ok(Self {
            meter,
            bandwidth_fraction,
            reserved_bps,
            checkpoints: None,
        })
    }

    /// Install the group's checkpoint table for this selection.
    pub fn set_allocation_checkpoints(&mut self, checkpoints: CheckpointTable) {
        self.checkpoints = Some(checkpoints);
    }

    pub fn checkpoints(&self) -> Option<&CheckpointTable> {
        self.checkpoints.as_ref()
    }

    pub fn reserved_bps(&self) -> u64 {
        self.reserved_bps
    }

    /// Bandwidth allocated to this selection, bits per second.
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    // bandwidth values are far below 2^53; truncation toward zero is intended
    pub fn allocated_bandwidth(&self) -> u64 {
        let total_bps = (self.meter.bitrate_estimate() as f64 * self.bandwidth_fraction) as u64;
        let allocatable_bps = total_bps.saturating_sub(self.reserved_bps);

        let Some(table) = &self.checkpoints else {
            return allocatable_bps;
        };
        let points = table.points();

        let mut next_index = 1;
        while next_index < points.len() - 1 && points[next_index].total_bps < allocatable_bps {
            next_index += 1;
        }
        let previous = points[next_index - 1];
        let next = points[next_index];

        let span = next.total_bps - previous.total_bps;
        if span == 0 {
            return next.allocated_bps;
        }

        let offset = i128::from(allocatable_bps) - i128::from(previous.total_bps);
        let fraction = offset as f64 / span as f64;
        let delta = i128::from(next.allocated_bps) - i128::from(previous.allocated_bps);
        let allocated = i128::from(previous.allocated_bps) + (fraction * delta as f64) as i128;

        tracing::trace!(
            allocatable_bps,
            next_index,
            fraction,
            allocated = %allocated,
            "bandwidth interpolated between checkpoints"
        );

        u64::try_from(allocated.max(0)).unwrap_or(u64::MAX)
    }

    /// Track index the allocated bandwidth alone would pick.
    ///
    /// Scans tracks from the highest bitrate down and returns the first whose
    /// bitrate, scaled by the playback speed, fits the allocation; falls back
    /// to the lowest track.
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    // speed-scaled bitrates fit u64
    pub fn ideal_track_index(&self, ladder: &BitrateLadder, playback_speed: f32) -> usize {
        let effective_bps = self.allocated_bandwidth();
        let mut lowest = 0;
        for track in 0..ladder.len() {
            let Some(variant) = ladder.variant_for_track(track) else {
                continue;
            };
            let fits = variant.bitrate_bps().is_none_or(|bps| {
                (bps as f64 * f64::from(playback_speed)).round() as u64 <= effective_bps
            });
            if fits {
                return track;
            }
            lowest = track;
        }
        lowest
    }
}

impl<M> std::fmt::Debug for BandwidthAllocator<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BandwidthAllocator")
            .field("bandwidth_fraction", &self.bandwidth_fraction)
            .field("reserved_bps", &self.reserved_bps)
            .field("checkpoints", &self.checkpoints.as_ref().map(CheckpointTable::len))
            .finish_non_exhaustive()
    }
}
