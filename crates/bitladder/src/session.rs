use std::path::PathBuf;

use bitladder_abr::{
    BandwidthAllocator, BandwidthMeter, BitrateLadder, BufferState, ChunkSizes, LoadObserver,
    PendingChunk, PolicyBasedSelector, PolicyModel, PolicyOptions, QoeAccumulator,
    QualitySelector, Selection, SelectionController, SelectionOptions, SelectionReason,
    StrategyKind, UtilityBasedSelector,
};
use web_time::Instant;

use crate::{
    catalog::{VideoCatalog, VideoConfig},
    chunk_sizes::load_chunk_sizes,
    error::{CatalogError, CatalogResult},
};

/// Quality selection strategy of a session.
pub enum Strategy {
    /// Buffer-based utility maximisation (BOLA).
    Utility,
    /// Learned policy (Pensieve) scored by the given model.
    Policy(Box<dyn PolicyModel>),
}

impl Strategy {
    /// Resolve a strategy by name. `model` is only called for the policy strategy.
    pub fn from_name<F>(name: &str, model: F) -> CatalogResult<Self>
    where
        F: FnOnce() -> Box<dyn PolicyModel>,
    {
        match name.to_ascii_lowercase().as_str() {
            "bola" | "utility" => Ok(Self::Utility),
            "pensieve" | "policy" => Ok(Self::Policy(model())),
            _ => Err(CatalogError::UnknownStrategy(name.to_string())),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Utility => StrategyKind::Utility,
            Self::Policy(_) => StrategyKind::Policy,
        }
    }
}

impl std::fmt::Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Utility => f.write_str("Utility"),
            Self::Policy(_) => f.write_str("Policy(..)"),
        }
    }
}

enum ChunkSizeSource {
    None,
    Table(ChunkSizes),
    Dir(PathBuf),
}

/// Builds a [`Session`] for one catalog video.
pub struct SessionBuilder<'a> {
    catalog: &'a VideoCatalog,
    video: Option<String>,
    strategy: Strategy,
    options: Option<SelectionOptions>,
    policy_options: PolicyOptions,
    chunk_sizes: ChunkSizeSource,
}

impl<'a> SessionBuilder<'a> {
    pub fn new(catalog: &'a VideoCatalog) -> Self {
        Self {
            catalog,
            video: None,
            strategy: Strategy::Utility,
            options: None,
            policy_options: PolicyOptions::default(),
            chunk_sizes: ChunkSizeSource::None,
        }
    }

    #[must_use]
    pub fn video(mut self, id: impl Into<String>) -> Self {
        self.video = Some(id.into());
        self
    }

    #[must_use]
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Override the strategy-dependent [`SelectionOptions`] defaults.
    #[must_use]
    pub fn options(mut self, options: SelectionOptions) -> Self {
        self.options = Some(options);
        self
    }

    #[must_use]
    pub fn policy_options(mut self, options: PolicyOptions) -> Self {
        self.policy_options = options;
        self
    }

    #[must_use]
    pub fn chunk_sizes(mut self, sizes: ChunkSizes) -> Self {
        self.chunk_sizes = ChunkSizeSource::Table(sizes);
        self
    }

    /// Read chunk sizes from `<dir>/<video>/video_size_<level>` at build time.
    #[must_use]
    pub fn chunk_size_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.chunk_sizes = ChunkSizeSource::Dir(dir.into());
        self
    }

    pub fn build<M: BandwidthMeter>(self, meter: M) -> CatalogResult<Session<M>> {
        let options = self.selection_options();
        self.build_inner(|selector| SelectionController::new(selector, meter, &options))
    }

    /// Build around an allocator planned by a
    /// [`SelectionGroup`](bitladder_abr::SelectionGroup).
    pub fn build_with_allocator<M: BandwidthMeter>(
        self,
        allocator: BandwidthAllocator<M>,
    ) -> CatalogResult<Session<M>> {
        let options = self.selection_options();
        self.build_inner(|selector| {
            Ok(SelectionController::with_allocator(selector, allocator, &options))
        })
    }

    fn selection_options(&self) -> SelectionOptions {
        self.options
            .clone()
            .unwrap_or_else(|| SelectionOptions::for_strategy(self.strategy.kind()))
    }

    fn build_inner<M, F>(self, controller: F) -> CatalogResult<Session<M>>
    where
        M: BandwidthMeter,
        F: FnOnce(
            Box<dyn QualitySelector>,
        ) -> bitladder_abr::AbrResult<SelectionController<Box<dyn QualitySelector>, M>>,
    {
        let id = self.video.ok_or(CatalogError::MissingVideo)?;
        let video = self.catalog.get(&id)?.clone();
        let kind = self.strategy.kind();

        let selector: Box<dyn QualitySelector> = match self.strategy {
            Strategy::Utility => Box::new(UtilityBasedSelector::new(video.ladder().clone())),
            Strategy::Policy(model) => {
                let sizes = match self.chunk_sizes {
                    ChunkSizeSource::Table(sizes) => sizes,
                    ChunkSizeSource::Dir(dir) => load_chunk_sizes(
                        &dir,
                        video.id(),
                        video.ladder().len(),
                        video.total_chunks(),
                    )?,
                    ChunkSizeSource::None => {
                        tracing::warn!(
                            video = video.id(),
                            "no chunk sizes, next-chunk features are zero"
                        );
                        ChunkSizes::new(vec![Vec::new(); video.ladder().len()])
                    }
                };
                Box::new(PolicyBasedSelector::new(
                    video.ladder().clone(),
                    video.total_chunks(),
                    sizes,
                    model,
                    self.policy_options,
                )?)
            }
        };

        tracing::info!(
            video = video.id(),
            strategy = ?kind,
            levels = video.ladder().len(),
            total_chunks = video.total_chunks(),
            "selection session created"
        );

        Ok(Session {
            controller: controller(selector)?,
            video,
        })
    }
}

/// Quality selection for one playing video.
#[derive(Debug)]
pub struct Session<M> {
    controller: SelectionController<Box<dyn QualitySelector>, M>,
    video: VideoConfig,
}

impl<M: BandwidthMeter> Session<M> {
    pub fn selected_index(&self) -> usize {
        self.controller.selected_index()
    }

    pub fn selection_reason(&self) -> SelectionReason {
        self.controller.selection_reason()
    }

    pub fn update<L: LoadObserver + ?Sized>(&mut self, buffer: BufferState, loads: &L) -> Selection {
        self.controller.update(buffer, loads)
    }

    pub fn select(&mut self, buffer: &BufferState) -> Selection {
        self.controller.select(buffer)
    }

    pub fn evaluate_queue_size(
        &mut self,
        now: Instant,
        playback_position_us: i64,
        queue: &[PendingChunk],
    ) -> usize {
        self.controller
            .evaluate_queue_size(now, playback_position_us, queue)
    }

    pub fn on_playback_speed_changed(&mut self, playback_speed: f32) {
        self.controller.on_playback_speed_changed(playback_speed);
    }

    pub fn enable(&mut self) {
        self.controller.enable();
    }

    pub fn allocated_bandwidth(&self) -> u64 {
        self.controller.allocated_bandwidth()
    }

    pub fn qoe(&self) -> &QoeAccumulator {
        self.controller.qoe()
    }

    pub fn strategy_name(&self) -> &'static str {
        self.controller.selector().name()
    }

    pub fn video_id(&self) -> &str {
        self.video.id()
    }

    pub fn ladder(&self) -> &BitrateLadder {
        self.video.ladder()
    }
}

#[cfg(test)]
mod tests {
    use bitladder_abr::{InferenceError, SharedBandwidthMeter, StateWindow};
    use rstest::{fixture, rstest};

    use super::*;

    const SEC: i64 = 1_000_000;

    struct Fixed(usize);

    impl PolicyModel for Fixed {
        fn infer(&self, _: &StateWindow) -> Result<Vec<f32>, InferenceError> {
            let mut scores = vec![0.0; 6];
            scores[self.0] = 1.0;
            Ok(scores)
        }
    }

    fn fixed(position: usize) -> Box<dyn PolicyModel> {
        Box::new(Fixed(position))
    }

    #[fixture]
    fn catalog() -> VideoCatalog {
        VideoCatalog::builtin().unwrap()
    }

    #[rstest]
    #[case("bola", StrategyKind::Utility)]
    #[case("BOLA", StrategyKind::Utility)]
    #[case("utility", StrategyKind::Utility)]
    #[case("pensieve", StrategyKind::Policy)]
    #[case("Policy", StrategyKind::Policy)]
    fn strategy_names(#[case] name: &str, #[case] kind: StrategyKind) {
        let strategy = Strategy::from_name(name, || fixed(0)).unwrap();
        assert_eq!(strategy.kind(), kind);
    }

    #[test]
    fn unknown_strategy_name() {
        assert!(matches!(
            Strategy::from_name("throughput", || fixed(0)),
            Err(CatalogError::UnknownStrategy(name)) if name == "throughput"
        ));
    }

    #[rstest]
    fn missing_video(catalog: VideoCatalog) {
        assert!(matches!(
            SessionBuilder::new(&catalog).build(SharedBandwidthMeter::default()),
            Err(CatalogError::MissingVideo)
        ));
    }

    #[rstest]
    fn unknown_video(catalog: VideoCatalog) {
        assert!(matches!(
            SessionBuilder::new(&catalog)
                .video("sintel")
                .build(SharedBandwidthMeter::default()),
            Err(CatalogError::UnknownVideo(_))
        ));
    }

    #[rstest]
    fn utility_session(catalog: VideoCatalog) {
        let mut session = SessionBuilder::new(&catalog)
            .video("bbb_30fps")
            .build(SharedBandwidthMeter::new(1_000_000))
            .unwrap();
        assert_eq!(session.strategy_name(), "bola");
        assert_eq!(session.video_id(), "bbb_30fps");
        assert_eq!(session.allocated_bandwidth(), 700_000);

        session.select(&BufferState::new(0, 0));
        assert_eq!(session.selection_reason(), SelectionReason::Initial);
        assert_eq!(session.selected_index(), 0);
        session.select(&BufferState::new(0, 5 * SEC));
        assert_eq!(session.selected_index(), 5);
    }

    #[rstest]
    fn policy_session_without_sizes(catalog: VideoCatalog) {
        let mut session = SessionBuilder::new(&catalog)
            .video("envivio")
            .strategy(Strategy::Policy(Box::new(Fixed(4))))
            .build(SharedBandwidthMeter::default())
            .unwrap();
        assert_eq!(session.strategy_name(), "pensieve");

        session.select(&BufferState::new(0, 0));
        assert_eq!(session.selected_index(), 1);
        let selection = session.select(&BufferState::new(0, 10 * SEC).with_last_load(900, true));
        assert_eq!(selection.selected_index, 1);
        assert_eq!(session.qoe().len(), 1);
        assert_eq!(session.qoe().cumulative_bitrate(), 2850.0);
    }

    #[rstest]
    fn policy_rejects_mismatched_sizes(catalog: VideoCatalog) {
        let result = SessionBuilder::new(&catalog)
            .video("forest")
            .strategy(Strategy::Policy(Box::new(Fixed(0))))
            .chunk_sizes(ChunkSizes::new(vec![vec![1]; 2]))
            .build(SharedBandwidthMeter::default());
        assert!(matches!(result, Err(CatalogError::Abr(_))));
    }
}
