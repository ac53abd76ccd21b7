use crate::types::QoeSample;

/// Append-only QoE totals for one session.
///
/// Telemetry only: nothing in the decision path reads it back.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QoeAccumulator {
    cumulative_reward: f64,
    cumulative_bitrate_kbps: f64,
    history: Vec<QoeSample>,
}

impl QoeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sample: QoeSample) {
        self.cumulative_reward += sample.reward;
        self.cumulative_bitrate_kbps += sample.bitrate_kbps;
        self.history.push(sample);
        tracing::debug!(
            reward = sample.reward,
            rebuffer_secs = sample.rebuffer_secs,
            cumulative_reward = self.cumulative_reward,
            cumulative_bitrate_kbps = self.cumulative_bitrate_kbps,
            chunks = self.history.len(),
            "qoe recorded"
        );
    }

    pub fn cumulative_reward(&self) -> f64 {
        self.cumulative_reward
    }

    /// Sum of predicted bitrates, kbps.
    pub fn cumulative_bitrate(&self) -> f64 {
        self.cumulative_bitrate_kbps
    }

    pub fn history(&self) -> &[QoeSample] {
        &self.history
    }

    pub fn rewards(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().map(|sample| sample.reward)
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
