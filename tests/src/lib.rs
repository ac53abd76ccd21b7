//! Chunk-by-chunk playback simulation over a throughput trace.
//!
//! Drives a [`Session`] the way a player would: decide, download at the
//! trace's throughput, drain the buffer by the download time, append the
//! chunk. Used by the workspace integration tests.

#![forbid(unsafe_code)]

use bitladder::Session;
use bitladder_abr::{BufferState, ChunkLoad, SharedBandwidthMeter};

const US_PER_MS: i64 = 1_000;

/// Simulated network and player parameters.
#[derive(Clone, Debug)]
pub struct PlaybackModel {
    /// Media duration of one chunk.
    pub chunk_duration_ms: u64,
    /// Buffer ceiling; the player idles above it.
    pub max_buffer_ms: u64,
    /// Throughput per downloaded chunk, bps. Repeats when exhausted.
    pub throughput_bps: Vec<u64>,
}

impl Default for PlaybackModel {
    fn default() -> Self {
        Self {
            chunk_duration_ms: 4_000,
            max_buffer_ms: 60_000,
            throughput_bps: vec![3_000_000],
        }
    }
}

/// What one simulated playback did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlaybackReport {
    /// Track index fetched for each chunk.
    pub selected: Vec<usize>,
    pub switches: usize,
    pub rebuffer_ms: u64,
}

/// Play `chunks` chunks through `session`, feeding `meter` from the trace.
pub fn simulate(
    session: &mut Session<SharedBandwidthMeter>,
    meter: &SharedBandwidthMeter,
    model: &PlaybackModel,
    chunks: usize,
) -> PlaybackReport {
    let mut report = PlaybackReport::default();
    let mut buffer_ms: u64 = 0;
    let mut position_ms: u64 = 0;
    let mut last_load = ChunkLoad {
        duration_ms: 0,
        is_media: false,
    };

    for chunk in 0..chunks {
        let throughput_bps = if model.throughput_bps.is_empty() {
            0
        } else {
            model.throughput_bps[chunk % model.throughput_bps.len()]
        };
        meter.set(throughput_bps);

        let selection = session.update(
            BufferState::new(to_us(position_ms), to_us(buffer_ms)),
            &last_load,
        );
        if report.selected.last().is_some_and(|&prev| prev != selection.selected_index) {
            report.switches += 1;
        }
        report.selected.push(selection.selected_index);

        let bitrate_bps = session
            .ladder()
            .variant_for_track(selection.selected_index)
            .and_then(bitladder_abr::QualityVariant::bitrate_bps)
            .unwrap_or(0);
        let download_ms = download_time_ms(bitrate_bps, model.chunk_duration_ms, throughput_bps);

        let stall_ms = download_ms.saturating_sub(buffer_ms);
        report.rebuffer_ms = report.rebuffer_ms.saturating_add(stall_ms);
        let played_ms = download_ms - stall_ms;
        buffer_ms -= played_ms;
        position_ms = position_ms.saturating_add(played_ms);

        buffer_ms += model.chunk_duration_ms;
        if buffer_ms > model.max_buffer_ms {
            position_ms = position_ms.saturating_add(buffer_ms - model.max_buffer_ms);
            buffer_ms = model.max_buffer_ms;
        }

        last_load = ChunkLoad {
            duration_ms: download_ms,
            is_media: true,
        };
        tracing::trace!(chunk, download_ms, buffer_ms, stall_ms, "chunk played");
    }

    tracing::debug!(
        chunks,
        switches = report.switches,
        rebuffer_ms = report.rebuffer_ms,
        "playback simulated"
    );
    report
}

fn download_time_ms(bitrate_bps: u64, chunk_duration_ms: u64, throughput_bps: u64) -> u64 {
    if throughput_bps == 0 {
        return u64::MAX / 4;
    }
    bitrate_bps.saturating_mul(chunk_duration_ms) / throughput_bps
}

fn to_us(ms: u64) -> i64 {
    i64::try_from(ms).map_or(i64::MAX, |ms| ms.saturating_mul(US_PER_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stalled_network_saturates_rebuffering() {
        let catalog = bitladder::VideoCatalog::builtin().unwrap();
        let meter = SharedBandwidthMeter::default();
        let mut session = bitladder::SessionBuilder::new(&catalog)
            .video("envivio")
            .build(meter.clone())
            .unwrap();
        let model = PlaybackModel {
            throughput_bps: vec![0],
            ..PlaybackModel::default()
        };

        let report = simulate(&mut session, &meter, &model, 8);
        assert_eq!(report.selected.len(), 8);
        assert_eq!(report.rebuffer_ms, u64::MAX);
    }

    #[test]
    fn download_time_scales_with_bitrate() {
        assert_eq!(download_time_ms(1_000_000, 4_000, 2_000_000), 2_000);
        assert_eq!(download_time_ms(4_000_000, 4_000, 2_000_000), 8_000);
    }
}
