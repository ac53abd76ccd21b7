//! Rolling model input for the policy strategy.
//!
//! Six feature rows by `history_len` slots. Five rows are history rings that
//! drop their oldest sample and append the newest at the last slot; the
//! next-chunk-size row is overwritten wholesale on every decision.

use std::collections::VecDeque;

/// Number of feature rows fed to the model.
pub const FEATURE_ROWS: usize = 6;

/// Default history length per feature row.
pub const DEFAULT_HISTORY_LEN: usize = 8;

/// Fixed-capacity ring of samples, oldest first.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryRing {
    samples: VecDeque<f32>,
}

impl HistoryRing {
    /// A ring of `capacity` zero samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: std::iter::repeat_n(0.0, capacity).collect(),
        }
    }

    /// Drop the oldest sample and append `sample` at the last slot.
    pub fn push(&mut self, sample: f32) {
        if self.samples.is_empty() {
            return;
        }
        self.samples.pop_front();
        self.samples.push_back(sample);
    }

    pub fn latest(&self) -> Option<f32> {
        self.samples.back().copied()
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.samples.iter().copied()
    }
}

/// Feature rows in model input order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FeatureRow {
    /// Selected bitrate over the ladder's maximum.
    BitrateRatio = 0,
    /// Buffered seconds over the normalisation constant.
    BufferLevel = 1,
    /// Last chunk size over download time.
    Throughput = 2,
    /// Download seconds over the normalisation constant.
    DownloadTime = 3,
    /// Next chunk size per ladder level, MB. Not history-shifted.
    NextChunkSizes = 4,
    /// Remaining chunks over the cap.
    RemainingChunks = 5,
}

/// One decision's worth of history samples.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WindowSample {
    pub bitrate_ratio: f32,
    pub buffer_level: f32,
    pub throughput: f32,
    pub download_time: f32,
    pub remaining_chunks: f32,
}

/// The model's rolling state matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct StateWindow {
    bitrate_ratio: HistoryRing,
    buffer_level: HistoryRing,
    throughput: HistoryRing,
    download_time: HistoryRing,
    next_chunk_sizes: Vec<f32>,
    remaining_chunks: HistoryRing,
}

impl StateWindow {
    pub fn new(history_len: usize) -> Self {
        Self {
            bitrate_ratio: HistoryRing::new(history_len),
            buffer_level: HistoryRing::new(history_len),
            throughput: HistoryRing::new(history_len),
            download_time: HistoryRing::new(history_len),
            next_chunk_sizes: vec![0.0; history_len],
            remaining_chunks: HistoryRing::new(history_len),
        }
    }

    pub fn history_len(&self) -> usize {
        self.next_chunk_sizes.len()
    }

    /// Append one sample to every history row.
    pub fn push(&mut self, sample: WindowSample) {
        self.bitrate_ratio.push(sample.bitrate_ratio);
        self.buffer_level.push(sample.buffer_level);
        self.throughput.push(sample.throughput);
        self.download_time.push(sample.download_time);
        self.remaining_chunks.push(sample.remaining_chunks);
    }

    /// Overwrite the next-chunk-size row. Slots past `sizes_mb` are zeroed,
    /// extra sizes are ignored.
    pub fn set_next_chunk_sizes(&mut self, sizes_mb: &[f32]) {
        for (slot, value) in self.next_chunk_sizes.iter_mut().enumerate() {
            *value = sizes_mb.get(slot).copied().unwrap_or(0.0);
        }
    }

    pub fn row(&self, row: FeatureRow) -> Vec<f32> {
        match row {
            FeatureRow::BitrateRatio => self.bitrate_ratio.iter().collect(),
            FeatureRow::BufferLevel => self.buffer_level.iter().collect(),
            FeatureRow::Throughput => self.throughput.iter().collect(),
            FeatureRow::DownloadTime => self.download_time.iter().collect(),
            FeatureRow::NextChunkSizes => self.next_chunk_sizes.clone(),
            FeatureRow::RemainingChunks => self.remaining_chunks.iter().collect(),
        }
    }

    /// Row-major `[FEATURE_ROWS][history_len]` tensor for the model.
    pub fn to_tensor(&self) -> Vec<f32> {
        let mut tensor = Vec::with_capacity(FEATURE_ROWS * self.history_len());
        tensor.extend(self.bitrate_ratio.iter());
        tensor.extend(self.buffer_level.iter());
        tensor.extend(self.throughput.iter());
        tensor.extend(self.download_time.iter());
        tensor.extend_from_slice(&self.next_chunk_sizes);
        tensor.extend(self.remaining_chunks.iter());
        tensor
    }
}

impl Default for StateWindow {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}
