use crate::{
    ladder::BitrateLadder,
    selector::QualitySelector,
    types::{BufferState, Selection, SelectionReason, SelectionState},
};

/// Lyapunov control parameters for one buffer level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LyapunovParameters {
    /// Buffer horizon the parameters were derived for, seconds.
    pub buffer_time_secs: f64,
    pub gp: f64,
    pub vp: f64,
}

/// Buffer-occupancy driven selector (BOLA).
///
/// Each decision maximises `(vp * (utility + gp) - buffer_level) / bitrate`
/// over the ladder, where `gp` and `vp` are recomputed from the buffer
/// horizon on every call.
#[derive(Clone, Debug)]
pub struct UtilityBasedSelector {
    ladder: BitrateLadder,
    state: SelectionState,
}

impl UtilityBasedSelector {
    pub const MINIMUM_BUFFER_SECS: f64 = 10.0;
    pub const MINIMUM_BUFFER_PER_LEVEL_SECS: f64 = 2.0;
    const GP_EPSILON: f64 = 1e-9;

    pub fn new(ladder: BitrateLadder) -> Self {
        Self {
            ladder,
            state: SelectionState::default(),
        }
    }

    /// Ladder position with the largest utility; the first one wins a tie.
    pub fn highest_utility_position(&self) -> usize {
        let utilities = self.ladder.utilities();
        let mut best = 0;
        for (position, &utility) in utilities.iter().enumerate().skip(1) {
            if utility > utilities[best] {
                best = position;
            }
        }
        best
    }

    /// Parameters for `buffer_level_secs`, `None` when `gp` degenerates.
    #[expect(clippy::cast_precision_loss)] // ladder sizes are tiny
    pub fn lyapunov_parameters(&self, buffer_level_secs: f64) -> Option<LyapunovParameters> {
        let buffer_time_secs = buffer_level_secs.max(
            Self::MINIMUM_BUFFER_SECS
                + Self::MINIMUM_BUFFER_PER_LEVEL_SECS * self.ladder.len() as f64,
        );
        let highest_utility = self.ladder.utilities()[self.highest_utility_position()];
        let gp = (highest_utility - 1.0) / (buffer_time_secs / Self::MINIMUM_BUFFER_SECS - 1.0);
        if !gp.is_finite() || gp.abs() < Self::GP_EPSILON {
            return None;
        }
        Some(LyapunovParameters {
            buffer_time_secs,
            gp,
            vp: Self::MINIMUM_BUFFER_SECS / gp,
        })
    }

    /// Ladder position with the best score. Later positions win ties;
    /// variants without a bitrate are skipped.
    pub fn best_position(&self, params: LyapunovParameters, buffer_level_secs: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (position, variant) in self.ladder.variants().iter().enumerate() {
            let Some(bitrate_kbps) = variant.bitrate_kbps else {
                continue;
            };
            let utility = self.ladder.utilities()[position];
            let score = (params.vp * (utility + params.gp) - buffer_level_secs) / bitrate_kbps;
            if best.is_none_or(|(_, best_score)| score >= best_score) {
                best = Some((position, score));
            }
        }
        best.map(|(position, _)| position)
    }

    fn keep(&self) -> Selection {
        Selection::unchanged(self.state)
    }
}

impl QualitySelector for UtilityBasedSelector {
    fn select(&mut self, buffer: &BufferState) -> Selection {
        if self.state.reason == SelectionReason::Unknown {
            self.state = SelectionState {
                selected_index: self.ladder.track_index(self.highest_utility_position()),
                reason: SelectionReason::Initial,
            };
            tracing::debug!(
                selected_index = self.state.selected_index,
                "utility selector: initial selection"
            );
            return Selection {
                selected_index: self.state.selected_index,
                reason: self.state.reason,
                changed: true,
                qoe: None,
            };
        }

        if self.highest_utility_position() == 0 {
            tracing::debug!("utility selector: top utility at first position, skipping");
            return self.keep();
        }

        let buffer_level_secs = buffer.buffered_secs();
        let Some(params) = self.lyapunov_parameters(buffer_level_secs) else {
            tracing::debug!(buffer_level_secs, "utility selector: degenerate gp, skipping");
            return self.keep();
        };
        let Some(position) = self.best_position(params, buffer_level_secs) else {
            return self.keep();
        };

        let current = self.state.selected_index;
        let selected_index = self.ladder.track_index(position);
        tracing::debug!(
            current,
            buffer_level_secs,
            buffer_time_secs = params.buffer_time_secs,
            gp = params.gp,
            vp = params.vp,
            position,
            selected_index,
            "utility selector: evaluated"
        );

        if selected_index == current {
            return self.keep();
        }
        tracing::info!(from = current, to = selected_index, "utility selector: switch");
        self.state = SelectionState {
            selected_index,
            reason: SelectionReason::Adaptive,
        };
        Selection {
            selected_index,
            reason: SelectionReason::Adaptive,
            changed: true,
            qoe: None,
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
        "bola"
    }
}
