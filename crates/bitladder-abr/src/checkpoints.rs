//! Fair split of one throughput budget across concurrent adaptive selections.
//!
//! Every selection's ladder is projected onto log-bitrate space and its
//! up-switch points are normalised into `[0, 1]`. Walking all switch points in
//! ascending order and upgrading one selection by one level at a time yields a
//! piecewise-linear map from total bandwidth to each selection's share.

use crate::error::{AbrError, AbrResult};

/// One point of a piecewise-linear allocation curve.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AllocationCheckpoint {
    /// Total bandwidth available to the whole group, bps.
    pub total_bps: u64,
    /// Bandwidth allocated to this selection at `total_bps`, bps.
    pub allocated_bps: u64,
}

impl AllocationCheckpoint {
    pub const fn new(total_bps: u64, allocated_bps: u64) -> Self {
        Self {
            total_bps,
            allocated_bps,
        }
    }
}

/// Validated checkpoint table: at least two entries, non-decreasing totals.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CheckpointTable(Vec<AllocationCheckpoint>);

impl CheckpointTable {
    pub fn new(points: Vec<AllocationCheckpoint>) -> AbrResult<Self> {
        if points.len() < 2 {
            return Err(AbrError::CheckpointTableTooShort { len: points.len() });
        }
        if let Some(index) = points
            .windows(2)
            .position(|pair| pair[1].total_bps < pair[0].total_bps)
        {
            return Err(AbrError::CheckpointTableUnsorted { index: index + 1 });
        }
        Ok(Self(points))
    }

    pub fn points(&self) -> &[AllocationCheckpoint] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Build one synchronized checkpoint table per selection.
///
/// `bitrates_bps[selection][level]` lists each selection's ladder from its
/// lowest level up; `None` marks an undeclared bitrate (log-bitrate 0,
/// contributes 0 bps). The returned tables all have
/// `switch_point_count + 3` entries and checkpoint `k` describes the same
/// total bandwidth in every table.
pub fn plan_allocation_checkpoints(
    bitrates_bps: &[Vec<Option<u64>>],
) -> AbrResult<Vec<CheckpointTable>> {
    if let Some(selection) = bitrates_bps.iter().position(Vec::is_empty) {
        return Err(AbrError::EmptySelection { selection });
    }
    if bitrates_bps.is_empty() {
        return Ok(Vec::new());
    }

    let log_bitrates = log_values(bitrates_bps);
    let switch_points = switch_points(&log_bitrates);

    // [0] = all zero, [1] = minimum bitrates, [2..end-1] = one up-switch each,
    // [end] = doubled last point to set the slope beyond the ladders.
    let switch_count: usize = switch_points.iter().map(Vec::len).sum();
    let checkpoint_count = switch_count + 3;

    let mut tables = vec![vec![AllocationCheckpoint::default(); checkpoint_count]; bitrates_bps.len()];
    let mut current = vec![0_usize; bitrates_bps.len()];
    set_checkpoint_values(&mut tables, 1, bitrates_bps, &current);

    for checkpoint_index in 2..checkpoint_count - 1 {
        let mut next_update = 0;
        let mut next_switch_point = f64::MAX;
        for (selection, levels) in log_bitrates.iter().enumerate() {
            if current[selection] + 1 == levels.len() {
                continue;
            }
            let switch_point = switch_points[selection][current[selection]];
            if switch_point < next_switch_point {
                next_switch_point = switch_point;
                next_update = selection;
            }
        }
        current[next_update] += 1;
        set_checkpoint_values(&mut tables, checkpoint_index, bitrates_bps, &current);
    }

    for points in &mut tables {
        let last = points[checkpoint_count - 2];
        points[checkpoint_count - 1] = AllocationCheckpoint::new(
            last.total_bps.saturating_mul(2),
            last.allocated_bps.saturating_mul(2),
        );
    }

    tracing::debug!(
        selections = bitrates_bps.len(),
        switch_count,
        checkpoint_count,
        "allocation checkpoints planned"
    );

    tables.into_iter().map(CheckpointTable::new).collect()
}

#[expect(clippy::cast_precision_loss)] // bitrate precision loss is negligible for log scale
fn log_values(bitrates_bps: &[Vec<Option<u64>>]) -> Vec<Vec<f64>> {
    bitrates_bps
        .iter()
        .map(|levels| {
            levels
                .iter()
                .map(|bitrate| bitrate.map_or(0.0, |bps| (bps as f64).ln()))
                .collect()
        })
        .collect()
}

/// Midpoints between consecutive log-bitrates, normalised to `[0, 1]` over
/// each selection's own range. A zero range maps every point to 1.0.
pub(crate) fn switch_points(log_bitrates: &[Vec<f64>]) -> Vec<Vec<f64>> {
    log_bitrates
        .iter()
        .map(|levels| {
            let (Some(first), Some(last)) = (levels.first(), levels.last()) else {
                return Vec::new();
            };
            let range = last - first;
            levels
                .windows(2)
                .map(|pair| {
                    let switch_bitrate = 0.5 * (pair[0] + pair[1]);
                    if range == 0.0 {
                        1.0
                    } else {
                        (switch_bitrate - first) / range
                    }
                })
                .collect()
        })
        .collect()
}

fn set_checkpoint_values(
    tables: &mut [Vec<AllocationCheckpoint>],
    checkpoint_index: usize,
    bitrates_bps: &[Vec<Option<u64>>],
    selected: &[usize],
) {
    let mut total_bps = 0_u64;
    for (selection, points) in tables.iter_mut().enumerate() {
        let allocated = bitrates_bps[selection][selected[selection]].unwrap_or(0);
        points[checkpoint_index].allocated_bps = allocated;
        total_bps = total_bps.saturating_add(allocated);
    }
    for points in tables.iter_mut() {
        points[checkpoint_index].total_bps = total_bps;
    }
}
