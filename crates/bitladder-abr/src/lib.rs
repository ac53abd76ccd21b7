//! Adaptive bitrate quality selection.
//!
//! Picks the quality level to fetch at each media-chunk boundary and decides
//! how much of the playback queue may be discarded for a better quality.
//! The crate is pure decision logic: the pipeline supplies buffer state,
//! a throughput estimate and the chunk queue, and reads back a track index.
//!
//! ## Strategies
//!
//! - [`UtilityBasedSelector`]: BOLA, a Lyapunov buffer-occupancy
//!   optimisation over log-bitrate utilities.
//! - [`PolicyBasedSelector`]: Pensieve, a learned policy scored by an
//!   external [`PolicyModel`] over a rolling [`StateWindow`], with linear QoE
//!   accounting.
//!
//! Both implement [`QualitySelector`] and are driven by a
//! [`SelectionController`], which also owns the [`QueueEvictionPolicy`].
//!
//! ## Multiple tracks
//!
//! [`SelectionGroup`] reserves bandwidth for fixed tracks and splits the rest
//! across adaptive tracks with [`plan_allocation_checkpoints`].
//!
//! ## Example
//!
//! ```rust
//! use bitladder_abr::{
//!     BitrateLadder, BufferState, SelectionController, SelectionOptions, SharedBandwidthMeter,
//!     UtilityBasedSelector,
//! };
//!
//! let ladder = BitrateLadder::from_bitrates_kbps(&[300.0, 750.0, 1200.0, 1850.0, 2850.0, 4300.0])?;
//! let meter = SharedBandwidthMeter::new(2_000_000);
//! let mut controller = SelectionController::new(
//!     UtilityBasedSelector::new(ladder),
//!     meter.clone(),
//!     &SelectionOptions::default(),
//! )?;
//!
//! // First decision starts at the top of the ladder.
//! controller.select(&BufferState::new(0, 0));
//! assert_eq!(controller.selected_index(), 0);
//!
//! // A thin buffer drops to the lowest level.
//! controller.select(&BufferState::new(0, 5_000_000));
//! assert_eq!(controller.selected_index(), 5);
//! # Ok::<(), bitladder_abr::AbrError>(())
//! ```

#![forbid(unsafe_code)]

mod allocator;
mod checkpoints;
mod controller;
mod error;
mod eviction;
mod group;
mod ladder;
mod policy;
mod qoe;
mod selector;
mod types;
mod utility;

pub use allocator::{BandwidthAllocator, BandwidthMeter, SharedBandwidthMeter};
pub use checkpoints::{AllocationCheckpoint, CheckpointTable, plan_allocation_checkpoints};
pub use controller::{
    IdealVariant, LoadObserver, SelectionController, SelectionOptions, StrategyKind,
};
pub use error::{AbrError, AbrResult, InferenceError};
pub use eviction::{QueueEvictionPolicy, playout_duration_us};
pub use group::{SelectionGroup, TrackDefinition};
pub use ladder::{BitrateLadder, QualityVariant};
pub use policy::{
    ChunkSizes, DEFAULT_HISTORY_LEN, FEATURE_ROWS, FeatureRow, FnModel, HistoryRing,
    PolicyBasedSelector, PolicyModel, PolicyOptions, StateWindow, WindowSample,
};
pub use qoe::QoeAccumulator;
pub use selector::QualitySelector;
pub use types::{
    BufferState, ChunkLoad, PendingChunk, QoeSample, Selection, SelectionReason, SelectionState,
};
pub use utility::{LyapunovParameters, UtilityBasedSelector};
