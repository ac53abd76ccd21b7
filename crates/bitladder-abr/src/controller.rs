use std::time::Duration;

use web_time::Instant;

use crate::{
    allocator::{BandwidthAllocator, BandwidthMeter},
    error::AbrResult,
    eviction::QueueEvictionPolicy,
    qoe::QoeAccumulator,
    selector::QualitySelector,
    types::{BufferState, ChunkLoad, PendingChunk, Selection, SelectionReason},
};

/// Reports the most recent completed load. Queried before each decision.
#[cfg_attr(test, unimock::unimock(api = LoadObserverMock))]
pub trait LoadObserver {
    fn last_load_duration_ms(&self) -> u64;

    fn last_load_was_media(&self) -> bool;
}

impl LoadObserver for ChunkLoad {
    fn last_load_duration_ms(&self) -> u64 {
        self.duration_ms
    }

    fn last_load_was_media(&self) -> bool {
        self.is_media
    }
}

/// Which track the queue eviction compares queued chunks against.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum IdealVariant {
    /// The strategy's current selection.
    #[default]
    Selected,
    /// The best track the allocated bandwidth alone affords.
    Throughput,
}

/// Strategy family, for picking option defaults.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StrategyKind {
    Utility,
    Policy,
}

/// Selection configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionOptions {
    /// Share of the throughput estimate this group may use.
    pub bandwidth_fraction: f64,
    /// Bandwidth held back for fixed tracks, bps.
    pub reserved_bps: u64,
    /// Buffer that must remain ahead of playback after a discard.
    pub min_duration_to_retain: Duration,
    /// Minimum time between queue evaluations.
    pub min_time_between_evaluations: Duration,
    pub ideal_variant: IdealVariant,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            bandwidth_fraction: 0.7,
            reserved_bps: 0,
            min_duration_to_retain: Duration::from_secs(25),
            min_time_between_evaluations: Duration::from_secs(2),
            ideal_variant: IdealVariant::Selected,
        }
    }
}

impl SelectionOptions {
    /// Defaults tuned for `kind`.
    pub fn for_strategy(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Utility => Self::default(),
            StrategyKind::Policy => Self {
                min_time_between_evaluations: Duration::from_millis(500),
                ..Self::default()
            },
        }
    }
}

/// Drives one stream's selector and queue eviction.
///
/// Owns all mutable selection state of the stream; callers invoke it from
/// the pipeline's decision thread only.
pub struct SelectionController<S, M> {
    selector: S,
    allocator: BandwidthAllocator<M>,
    eviction: QueueEvictionPolicy,
    ideal_variant: IdealVariant,
    playback_speed: f32,
    qoe: QoeAccumulator,
}

impl<S: QualitySelector, M: BandwidthMeter> SelectionController<S, M> {
    pub fn new(selector: S, meter: M, options: &SelectionOptions) -> AbrResult<Self> {
        let allocator =
            BandwidthAllocator::new(meter, options.bandwidth_fraction, options.reserved_bps)?;
        Ok(Self::with_allocator(selector, allocator, options))
    }

    /// Build around an allocator planned by a
    /// [`SelectionGroup`](crate::SelectionGroup).
    pub fn with_allocator(
        selector: S,
        allocator: BandwidthAllocator<M>,
        options: &SelectionOptions,
    ) -> Self {
        Self {
            selector,
            allocator,
            eviction: QueueEvictionPolicy::new(
                options.min_duration_to_retain,
                options.min_time_between_evaluations,
            ),
            ideal_variant: options.ideal_variant,
            playback_speed: 1.0,
            qoe: QoeAccumulator::new(),
        }
    }

    pub fn selected_index(&self) -> usize {
        self.selector.selected_index()
    }

    pub fn selection_reason(&self) -> SelectionReason {
        self.selector.reason()
    }

    /// Decide at a chunk boundary, reading the last load from `loads`.
    pub fn update<L: LoadObserver + ?Sized>(&mut self, buffer: BufferState, loads: &L) -> Selection {
        let buffer = BufferState {
            last_load: Some(ChunkLoad {
                duration_ms: loads.last_load_duration_ms(),
                is_media: loads.last_load_was_media(),
            }),
            ..buffer
        };
        self.select(&buffer)
    }

    /// Decide at a chunk boundary with the load already in `buffer`.
    pub fn select(&mut self, buffer: &BufferState) -> Selection {
        let selection = self.selector.select(buffer);
        if let Some(sample) = selection.qoe {
            self.qoe.record(sample);
        }
        tracing::debug!(
            strategy = self.selector.name(),
            selected_index = selection.selected_index,
            reason = ?selection.reason,
            changed = selection.changed,
            buffered_us = buffer.buffered_duration_us,
            "selection updated"
        );
        selection
    }

    /// Number of queued chunks to keep; see [`QueueEvictionPolicy::evaluate`].
    pub fn evaluate_queue_size(
        &mut self,
        now: Instant,
        playback_position_us: i64,
        queue: &[PendingChunk],
    ) -> usize {
        let ideal_index = self.ideal_track_index();
        let Some(ideal) = self.selector.ladder().variant_for_track(ideal_index) else {
            return queue.len();
        };
        self.eviction.evaluate(
            now,
            playback_position_us,
            queue,
            ideal,
            self.playback_speed,
        )
    }

    /// Track the queue eviction compares against.
    pub fn ideal_track_index(&self) -> usize {
        match self.ideal_variant {
            IdealVariant::Selected => self.selector.selected_index(),
            IdealVariant::Throughput => self
                .allocator
                .ideal_track_index(self.selector.ladder(), self.playback_speed),
        }
    }

    pub fn on_playback_speed_changed(&mut self, playback_speed: f32) {
        tracing::debug!(playback_speed, "playback speed changed");
        self.playback_speed = playback_speed;
    }

    pub fn playback_speed(&self) -> f32 {
        self.playback_speed
    }

    /// Reset evaluation timers on stream (re)start.
    pub fn enable(&mut self) {
        self.eviction.reset();
    }

    pub fn allocated_bandwidth(&self) -> u64 {
        self.allocator.allocated_bandwidth()
    }

    pub fn qoe(&self) -> &QoeAccumulator {
        &self.qoe
    }

    pub fn selector(&self) -> &S {
        &self.selector
    }
}

impl<S, M> std::fmt::Debug for SelectionController<S, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionController")
            .field("allocator", &self.allocator)
            .field("eviction", &self.eviction)
            .field("ideal_variant", &self.ideal_variant)
            .field("playback_speed", &self.playback_speed)
            .field("qoe_chunks", &self.qoe.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use unimock::{MockFn, Unimock, matching};

    use super::*;
    use crate::{
        allocator::{BandwidthMeterMock, SharedBandwidthMeter},
        error::InferenceError,
        ladder::{BitrateLadder, QualityVariant},
        policy::{ChunkSizes, FnModel, PolicyBasedSelector, PolicyOptions, StateWindow},
        utility::UtilityBasedSelector,
    };

    const SEC: i64 = 1_000_000;

    fn ladder() -> BitrateLadder {
        let resolutions = [
            (320, 180),
            (480, 270),
            (640, 360),
            (960, 540),
            (1280, 720),
            (1920, 1080),
        ];
        BitrateLadder::new(
            [300.0, 750.0, 1200.0, 1850.0, 2850.0, 4300.0]
                .iter()
                .zip(resolutions)
                .enumerate()
                .map(|(i, (&kbps, (w, h)))| QualityVariant::new(i, kbps).with_resolution(w, h))
                .collect(),
        )
        .unwrap()
    }

    fn utility_controller(
        options: &SelectionOptions,
    ) -> SelectionController<UtilityBasedSelector, SharedBandwidthMeter> {
        SelectionController::new(
            UtilityBasedSelector::new(ladder()),
            SharedBandwidthMeter::new(1_000_000),
            options,
        )
        .unwrap()
    }

    fn queue_of(track: usize, chunks: usize) -> Vec<PendingChunk> {
        let variant = ladder().variant_for_track(track).unwrap().clone();
        (0..chunks)
            .map(|i| PendingChunk::new(i64::try_from(i).unwrap() * 4 * SEC, variant.clone()))
            .collect()
    }

    #[test]
    fn update_reads_load_observer() {
        let loads = Unimock::new((
            LoadObserverMock::last_load_duration_ms
                .each_call(matching!())
                .returns(1000_u64),
            LoadObserverMock::last_load_was_media
                .each_call(matching!())
                .returns(true),
        ));
        let model = |_: &StateWindow| -> Result<Vec<f32>, InferenceError> {
            Ok(vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0])
        };
        let selector = PolicyBasedSelector::new(
            ladder(),
            48,
            ChunkSizes::new(vec![vec![100_000; 48]; 6]),
            FnModel(model),
            PolicyOptions::default(),
        )
        .unwrap();
        let mut controller = SelectionController::new(
            selector,
            SharedBandwidthMeter::default(),
            &SelectionOptions::for_strategy(StrategyKind::Policy),
        )
        .unwrap();

        let initial = controller.update(BufferState::new(0, 0), &loads);
        assert_eq!(initial.reason, SelectionReason::Initial);
        assert_eq!(controller.selected_index(), 1);

        let selection = controller.update(BufferState::new(0, 10 * SEC), &loads);
        assert!(selection.changed);
        assert_eq!(controller.selected_index(), 3);
        assert_eq!(controller.selection_reason(), SelectionReason::Adaptive);
        assert_eq!(controller.qoe().len(), 1);
        assert_eq!(controller.qoe().cumulative_bitrate(), 1200.0);
    }

    #[test]
    fn chunk_load_is_a_load_observer() {
        let mut controller = utility_controller(&SelectionOptions::default());
        let load = ChunkLoad {
            duration_ms: 400,
            is_media: false,
        };
        controller.update(BufferState::new(0, 0), &load);
        let selection = controller.update(BufferState::new(0, 5 * SEC), &load);
        assert_eq!(selection.selected_index, 5);
        assert!(controller.qoe().is_empty());
    }

    #[test]
    fn evaluate_queue_discards_worse_sd_chunks() {
        let mut controller = utility_controller(&SelectionOptions::default());
        controller.select(&BufferState::new(0, 0));
        assert_eq!(controller.selected_index(), 0);

        let queue = queue_of(4, 10);
        let now = Instant::now();
        assert_eq!(controller.evaluate_queue_size(now, 0, &queue), 7);
        assert_eq!(
            controller.evaluate_queue_size(now + Duration::from_secs(1), 0, &queue),
            10
        );

        controller.enable();
        assert_eq!(
            controller.evaluate_queue_size(now + Duration::from_secs(1), 0, &queue),
            7
        );
    }

    #[test]
    fn playback_speed_reaches_eviction() {
        let mut controller = utility_controller(&SelectionOptions::default());
        controller.select(&BufferState::new(0, 0));
        controller.on_playback_speed_changed(2.0);
        assert_eq!(controller.playback_speed(), 2.0);

        let queue = queue_of(4, 10);
        assert_eq!(controller.evaluate_queue_size(Instant::now(), 0, &queue), 10);
    }

    #[rstest]
    #[case(10_000_000, 0)]
    #[case(2_000_000, 3)]
    #[case(100_000, 5)]
    fn throughput_ideal_follows_allocation(#[case] estimate_bps: u64, #[case] expected: usize) {
        let meter = Unimock::new(
            BandwidthMeterMock::bitrate_estimate
                .each_call(matching!())
                .returns(estimate_bps),
        );
        let options = SelectionOptions {
            ideal_variant: IdealVariant::Throughput,
            ..SelectionOptions::default()
        };
        let controller =
            SelectionController::new(UtilityBasedSelector::new(ladder()), meter, &options).unwrap();
        assert_eq!(controller.ideal_track_index(), expected);
    }

    #[test]
    fn policy_defaults_evaluate_more_often() {
        let options = SelectionOptions::for_strategy(StrategyKind::Policy);
        assert_eq!(options.min_time_between_evaluations, Duration::from_millis(500));
        assert_eq!(
            SelectionOptions::for_strategy(StrategyKind::Utility),
            SelectionOptions::default()
        );
    }

    #[test]
    fn allocated_bandwidth_applies_fraction() {
        let controller = utility_controller(&SelectionOptions {
            reserved_bps: 100_000,
            ..SelectionOptions::default()
        });
        assert_eq!(controller.allocated_bandwidth(), 600_000);
    }
}
