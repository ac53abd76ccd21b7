//! Learned-policy selector (Pensieve).
//!
//! Every completed media chunk feeds one sample into a rolling
//! [`StateWindow`], a black-box [`PolicyModel`] scores each ladder position
//! and the best-scoring position becomes the next selection. The strategy
//! also scores each chunk with a linear QoE reward.

mod window;

pub use window::{
    DEFAULT_HISTORY_LEN, FEATURE_ROWS, FeatureRow, HistoryRing, StateWindow, WindowSample,
};

use crate::{
    error::{AbrError, AbrResult, InferenceError},
    ladder::BitrateLadder,
    selector::QualitySelector,
    types::{BufferState, QoeSample, Selection, SelectionReason, SelectionState},
};

const M_IN_K: f64 = 1000.0;
const BYTES_PER_MB: f64 = 1_000_000.0;

/// Scoring function of the policy strategy.
///
/// Receives the state window and returns one score per ladder position.
/// Called synchronously; timeouts are the implementation's concern.
#[cfg_attr(test, unimock::unimock(api = PolicyModelMock))]
pub trait PolicyModel {
    fn infer(&self, window: &StateWindow) -> Result<Vec<f32>, InferenceError>;
}

impl<M: PolicyModel + ?Sized> PolicyModel for Box<M> {
    fn infer(&self, window: &StateWindow) -> Result<Vec<f32>, InferenceError> {
        (**self).infer(window)
    }
}

/// Adapts a closure into a [`PolicyModel`].
#[derive(Clone, Copy, Debug)]
pub struct FnModel<F>(pub F);

impl<F> PolicyModel for FnModel<F>
where
    F: Fn(&StateWindow) -> Result<Vec<f32>, InferenceError>,
{
    fn infer(&self, window: &StateWindow) -> Result<Vec<f32>, InferenceError> {
        (self.0)(window)
    }
}

/// Tuning of the policy strategy.
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyOptions {
    /// Divisor for buffered and download seconds in the state window.
    pub buffer_norm_secs: f64,
    /// QoE penalty per second of rebuffering.
    pub rebuffer_penalty: f64,
    /// QoE penalty per Mbps of bitrate change.
    pub smooth_penalty: f64,
    /// Initial selection offset from the top of the ladder.
    pub default_bitrate: usize,
    /// Slots per feature row; must cover the ladder.
    pub history_len: usize,
}

impl Default for PolicyOptions {
    fn default() -> Self {
        Self {
            buffer_norm_secs: 10.0,
            rebuffer_penalty: 4.3,
            smooth_penalty: 1.0,
            default_bitrate: 1,
            history_len: DEFAULT_HISTORY_LEN,
        }
    }
}

/// Expected chunk sizes in bytes, per ladder position then chunk number.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkSizes {
    levels: Vec<Vec<u64>>,
}

impl ChunkSizes {
    pub fn new(levels: Vec<Vec<u64>>) -> Self {
        Self { levels }
    }

    /// Size of `chunk` at ladder position `level`, `None` past the known data.
    pub fn get(&self, level: usize, chunk: usize) -> Option<u64> {
        self.levels.get(level)?.get(chunk).copied()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, level: usize) -> Option<&[u64]> {
        self.levels.get(level).map(Vec::as_slice)
    }
}

/// Selector driven by a [`PolicyModel`].
#[derive(Debug)]
pub struct PolicyBasedSelector<P> {
    ladder: BitrateLadder,
    model: P,
    options: PolicyOptions,
    chunk_sizes: ChunkSizes,
    total_chunks: usize,
    state: SelectionState,
    window: StateWindow,
    chunks_processed: usize,
    previous_position: usize,
    previous_buffered_us: i64,
}

impl<P: PolicyModel> PolicyBasedSelector<P> {
    pub fn new(
        ladder: BitrateLadder,
        total_chunks: usize,
        chunk_sizes: ChunkSizes,
        model: P,
        options: PolicyOptions,
    ) -> AbrResult<Self> {
        if ladder.len() > options.history_len {
            return Err(AbrError::LadderTooWide {
                levels: ladder.len(),
                slots: options.history_len,
            });
        }
        if options.default_bitrate >= ladder.len() {
            return Err(AbrError::InvalidOption {
                name: "default_bitrate",
                reason: format!(
                    "offset {} does not fit a ladder of {} levels",
                    options.default_bitrate,
                    ladder.len()
                ),
            });
        }
        if chunk_sizes.level_count() != ladder.len() {
            return Err(AbrError::ChunkSizeLevels {
                tables: chunk_sizes.level_count(),
                levels: ladder.len(),
            });
        }

        let initial_position = ladder.len() - 1 - options.default_bitrate;
        Ok(Self {
            window: StateWindow::new(options.history_len),
            ladder,
            model,
            options,
            chunk_sizes,
            total_chunks,
            state: SelectionState::default(),
            chunks_processed: 0,
            previous_position: initial_position,
            previous_buffered_us: 0,
        })
    }

    pub fn window(&self) -> &StateWindow {
        &self.window
    }

    pub fn chunks_processed(&self) -> usize {
        self.chunks_processed
    }

    fn initial_position(&self) -> usize {
        self.ladder.len() - 1 - self.options.default_bitrate
    }

    fn bitrate_kbps(&self, position: usize) -> f64 {
        self.ladder.bitrate_kbps(position).unwrap_or(0.0)
    }

    #[expect(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    // feature values are small normalised ratios; f32 is the model's precision
    fn update_window(&mut self, position: usize, buffer: &BufferState, delay_ms: u64) {
        let delay_ms = delay_ms as f64;
        let max_kbps = self.ladder.max_bitrate_kbps();
        let bitrate_ratio = if max_kbps > 0.0 {
            self.bitrate_kbps(position) / max_kbps
        } else {
            0.0
        };
        let last_chunk_bytes = self
            .chunk_sizes
            .get(position, self.chunks_processed)
            .unwrap_or(0) as f64;
        let cap = self.total_chunks;
        let remaining_chunks = if cap == 0 {
            0.0
        } else {
            cap.saturating_sub(self.chunks_processed).min(cap) as f64 / cap as f64
        };

        self.window.push(WindowSample {
            bitrate_ratio: bitrate_ratio as f32,
            buffer_level: (buffer.buffered_secs() / self.options.buffer_norm_secs) as f32,
            throughput: (last_chunk_bytes / delay_ms / M_IN_K) as f32,
            download_time: (delay_ms / M_IN_K / self.options.buffer_norm_secs) as f32,
            remaining_chunks: remaining_chunks as f32,
        });

        let next_sizes: Vec<f32> = (0..self.ladder.len())
            .map(|level| {
                if self.chunks_processed < self.total_chunks {
                    let bytes = self
                        .chunk_sizes
                        .get(level, self.chunks_processed + 1)
                        .unwrap_or(0);
                    (bytes as f64 / BYTES_PER_MB) as f32
                } else {
                    -1.0
                }
            })
            .collect();
        self.window.set_next_chunk_sizes(&next_sizes);
    }

    fn predict(&self) -> Result<usize, InferenceError> {
        let scores = self.model.infer(&self.window)?;
        if scores.len() != self.ladder.len() {
            return Err(InferenceError::MalformedOutput {
                expected: self.ladder.len(),
                actual: scores.len(),
            });
        }
        let mut best = 0;
        for (position, &score) in scores.iter().enumerate().skip(1) {
            if score > scores[best] {
                best = position;
            }
        }
        Ok(best)
    }

    /// Linear QoE reward of the chunk just downloaded at `position`.
    pub fn linear_reward(&self, position: usize, previous_position: usize, rebuffer_secs: f64) -> f64 {
        let bitrate = self.bitrate_kbps(position);
        let previous = self.bitrate_kbps(previous_position);
        bitrate / M_IN_K
            - self.options.rebuffer_penalty * rebuffer_secs
            - self.options.smooth_penalty * (bitrate - previous).abs() / M_IN_K
    }
}

impl<P: PolicyModel> QualitySelector for PolicyBasedSelector<P> {
    fn select(&mut self, buffer: &BufferState) -> Selection {
        if self.state.reason == SelectionReason::Unknown {
            self.state = SelectionState {
                selected_index: self.ladder.track_index(self.initial_position()),
                reason: SelectionReason::Initial,
            };
            tracing::debug!(
                selected_index = self.state.selected_index,
                "policy selector: initial selection"
            );
            return Selection {
                selected_index: self.state.selected_index,
                reason: self.state.reason,
                changed: true,
                qoe: None,
            };
        }

        let Some(load) = buffer.last_load.filter(|load| load.is_media) else {
            tracing::trace!("policy selector: last load was not media, skipping");
            return Selection::unchanged(self.state);
        };
        let delay_ms = load.duration_ms.max(1);
        let current_position = self.ladder.position_of_track(self.state.selected_index);

        self.update_window(current_position, buffer, delay_ms);
        let chunk = self.chunks_processed;
        self.chunks_processed += 1;

        let predicted = match self.predict() {
            Ok(predicted) => predicted,
            Err(error) => {
                tracing::warn!(
                    %error,
                    chunk,
                    selected_index = self.state.selected_index,
                    "policy selector: inference failed, keeping selection"
                );
                return Selection::unchanged(self.state);
            }
        };

        let changed = predicted != current_position;
        if changed {
            let selected_index = self.ladder.track_index(predicted);
            tracing::info!(
                from = self.state.selected_index,
                to = selected_index,
                chunk,
                "policy selector: switch"
            );
            self.state = SelectionState {
                selected_index,
                reason: SelectionReason::Adaptive,
            };
        }

        #[expect(clippy::cast_precision_loss)] // millisecond values stay far below 2^53
        let rebuffer_secs =
            (delay_ms as f64 - self.previous_buffered_us as f64 / M_IN_K).max(0.0) / M_IN_K;
        let reward = self.linear_reward(current_position, self.previous_position, rebuffer_secs);
        let sample = QoeSample {
            reward,
            bitrate_kbps: self.bitrate_kbps(predicted),
            rebuffer_secs,
        };

        tracing::debug!(
            chunk,
            current_position,
            predicted,
            delay_ms,
            rebuffer_secs,
            reward,
            "policy selector: evaluated"
        );

        self.previous_position = current_position;
        self.previous_buffered_us = buffer.buffered_duration_us;

        Selection {
            selected_index: self.state.selected_index,
            reason: self.state.reason,
            changed,
            qoe: Some(sample),
        }
    }

    fn selected_index(&self) -> usize {
        self.state.selected_index
    }

    fn reason(&self) -> SelectionReason {
        self.state.reason
    }

    fn ladder(&self) -> &BitrateLadder {
        &self.ladder
    }

    fn name(&self) -> &'static str {
        "pensieve"
    }
}
