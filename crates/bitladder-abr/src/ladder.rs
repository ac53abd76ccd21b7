use crate::error::{AbrError, AbrResult};

/// One rung of a bitrate ladder.
#[derive(Clone, Debug, PartialEq)]
pub struct QualityVariant {
    /// Ladder position (0 = first entry of the ladder).
    pub index: usize,
    /// Bitrate in kbps, `None` when the manifest does not declare one.
    pub bitrate_kbps: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl QualityVariant {
    pub fn new(index: usize, bitrate_kbps: f64) -> Self {
        Self {
            index,
            bitrate_kbps: Some(bitrate_kbps),
            width: None,
            height: None,
        }
    }

    #[must_use]
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Bitrate in bits per second, rounded.
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    // validated finite and positive at ladder construction
    pub fn bitrate_bps(&self) -> Option<u64> {
        self.bitrate_kbps.map(|kbps| (kbps * 1000.0).round() as u64)
    }

    /// Log-utility of this variant. Unknown bitrates map to 0.
    pub fn utility(&self) -> f64 {
        self.bitrate_kbps.map_or(0.0, f64::ln)
    }
}

/// Immutable ordered list of quality variants with derived log-utilities.
///
/// Ladder positions follow the order of the configured bitrates (ascending
/// for every built-in title). The pipeline addresses tracks in the opposite
/// order, see [`BitrateLadder::track_index`].
#[derive(Clone, Debug, PartialEq)]
pub struct BitrateLadder {
    variants: Vec<QualityVariant>,
    utilities: Vec<f64>,
}

impl BitrateLadder {
    /// Build a ladder, renumbering `index` to the ladder position.
    pub fn new(variants: Vec<QualityVariant>) -> AbrResult<Self> {
        if variants.is_empty() {
            return Err(AbrError::EmptyLadder);
        }

        let variants: Vec<QualityVariant> = variants
            .into_iter()
            .enumerate()
            .map(|(position, variant)| QualityVariant {
                index: position,
                ..variant
            })
            .collect();

        for variant in &variants {
            if let Some(bitrate_kbps) = variant.bitrate_kbps
                && !(bitrate_kbps.is_finite() && bitrate_kbps > 0.0)
            {
                return Err(AbrError::InvalidBitrate {
                    position: variant.index,
                    bitrate_kbps,
                });
            }
        }

        let utilities = variants.iter().map(QualityVariant::utility).collect();
        Ok(Self {
            variants,
            utilities,
        })
    }

    pub fn from_bitrates_kbps(bitrates_kbps: &[f64]) -> AbrResult<Self> {
        Self::new(
            bitrates_kbps
                .iter()
                .enumerate()
                .map(|(index, &kbps)| QualityVariant::new(index, kbps))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Always `false`: construction rejects empty ladders.
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn variants(&self) -> &[QualityVariant] {
        &self.variants
    }

    pub fn variant(&self, position: usize) -> Option<&QualityVariant> {
        self.variants.get(position)
    }

    pub fn utilities(&self) -> &[f64] {
        &self.utilities
    }

    pub fn bitrate_kbps(&self, position: usize) -> Option<f64> {
        self.variants.get(position).and_then(|v| v.bitrate_kbps)
    }

    /// Largest declared bitrate, 0 if none is declared.
    pub fn max_bitrate_kbps(&self) -> f64 {
        self.variants
            .iter()
            .filter_map(|v| v.bitrate_kbps)
            .fold(0.0, f64::max)
    }

    /// Map a ladder position to the index the pipeline uses for its tracks.
    ///
    /// The mapping is its own inverse: `track_index(track_index(p)) == p`.
    pub fn track_index(&self, position: usize) -> usize {
        self.len().saturating_sub(1).saturating_sub(position)
    }

    /// Ladder position of a pipeline track index.
    pub fn position_of_track(&self, track_index: usize) -> usize {
        self.track_index(track_index)
    }

    pub fn variant_for_track(&self, track_index: usize) -> Option<&QualityVariant> {
        if track_index >= self.len() {
            return None;
        }
        self.variant(self.position_of_track(track_index))
    }

    /// Bitrates in bps per ladder position, for the checkpoint planner.
    pub fn bitrates_bps(&self) -> Vec<Option<u64>> {
        self.variants.iter().map(QualityVariant::bitrate_bps).collect()
    }
}
