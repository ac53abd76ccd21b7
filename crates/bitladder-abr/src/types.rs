use crate::ladder::QualityVariant;

/// Why the current track is selected.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SelectionReason {
    /// No decision has been made yet.
    #[default]
    Unknown,
    /// First decision of the stream.
    Initial,
    /// Changed by the adaptive strategy.
    Adaptive,
}

/// Mutable selection state of one stream.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SelectionState {
    /// Selected track index (pipeline order).
    pub selected_index: usize,
    pub reason: SelectionReason,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self {
            selected_index: 0,
            reason: SelectionReason::Unknown,
        }
    }
}

/// Outcome of one [`QualitySelector::select`](crate::QualitySelector::select) call.
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    pub selected_index: usize,
    pub reason: SelectionReason,
    pub changed: bool,
    /// QoE accounting for the chunk that triggered this decision, if the
    /// strategy scores chunks.
    pub qoe: Option<QoeSample>,
}

impl Selection {
    pub(crate) fn unchanged(state: SelectionState) -> Self {
        Self {
            selected_index: state.selected_index,
            reason: state.reason,
            changed: false,
            qoe: None,
        }
    }
}

/// Per-chunk QoE accounting produced by the policy strategy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QoeSample {
    /// Linear QoE reward of the chunk.
    pub reward: f64,
    /// Bitrate of the newly predicted level, kbps.
    pub bitrate_kbps: f64,
    pub rebuffer_secs: f64,
}

/// Completed chunk load, as reported by the pipeline's load observer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChunkLoad {
    pub duration_ms: u64,
    /// Whether the load carried media (as opposed to manifests, init data, …).
    pub is_media: bool,
}

/// Buffer and playback state supplied before each decision.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BufferState {
    pub playback_position_us: i64,
    pub buffered_duration_us: i64,
    /// Duration to the live edge, `None` for on-demand streams.
    pub available_duration_us: Option<i64>,
    pub last_load: Option<ChunkLoad>,
}

impl BufferState {
    pub fn new(playback_position_us: i64, buffered_duration_us: i64) -> Self {
        Self {
            playback_position_us,
            buffered_duration_us,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_last_load(mut self, duration_ms: u64, is_media: bool) -> Self {
        self.last_load = Some(ChunkLoad {
            duration_ms,
            is_media,
        });
        self
    }

    #[expect(clippy::cast_precision_loss)] // microsecond precision loss is irrelevant here
    pub fn buffered_secs(&self) -> f64 {
        self.buffered_duration_us as f64 / 1_000_000.0
    }
}

/// Chunk waiting in the playback queue. Owned by the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingChunk {
    pub start_time_us: i64,
    pub variant: QualityVariant,
}

impl PendingChunk {
    pub fn new(start_time_us: i64, variant: QualityVariant) -> Self {
        Self {
            start_time_us,
            variant,
        }
    }
}
