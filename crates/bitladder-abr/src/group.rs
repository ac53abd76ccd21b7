use crate::{
    allocator::{BandwidthAllocator, BandwidthMeter},
    checkpoints::plan_allocation_checkpoints,
    error::AbrResult,
    ladder::BitrateLadder,
};

/// One track of a concurrently played group (video, audio, …).
#[derive(Clone, Debug, PartialEq)]
pub enum TrackDefinition {
    /// Single-variant track; its bitrate is reserved from the shared budget.
    Fixed { bitrate_bps: Option<u64> },
    /// Track with a ladder to adapt over.
    Adaptive(BitrateLadder),
}

impl TrackDefinition {
    fn is_adaptive(&self) -> bool {
        matches!(self, Self::Adaptive(ladder) if ladder.len() > 1)
    }

    fn fixed_bitrate_bps(&self) -> Option<u64> {
        match self {
            Self::Fixed { bitrate_bps } => *bitrate_bps,
            Self::Adaptive(ladder) if ladder.len() == 1 => ladder.bitrates_bps()[0],
            Self::Adaptive(_) => None,
        }
    }
}

/// Allocators for one group of concurrently played tracks.
///
/// Fixed tracks reserve their bitrate; adaptive tracks share what is left.
/// With more than one adaptive track, each allocator gets its slice of a
/// jointly planned checkpoint table.
#[derive(Debug)]
pub struct SelectionGroup<M> {
    reserved_bps: u64,
    allocators: Vec<Option<BandwidthAllocator<M>>>,
}

impl<M: BandwidthMeter + Clone> SelectionGroup<M> {
    pub fn plan(definitions: &[TrackDefinition], meter: &M, bandwidth_fraction: f64) -> AbrResult<Self> {
        let reserved_bps = definitions
            .iter()
            .filter_map(TrackDefinition::fixed_bitrate_bps)
            .fold(0_u64, u64::saturating_add);

        let mut allocators = Vec::with_capacity(definitions.len());
        let mut adaptive_bitrates = Vec::new();
        for definition in definitions {
            match definition {
                TrackDefinition::Adaptive(ladder) if definition.is_adaptive() => {
                    allocators.push(Some(BandwidthAllocator::new(
                        meter.clone(),
                        bandwidth_fraction,
                        reserved_bps,
                    )?));
                    // The planner walks each ladder from its lowest bitrate up.
                    let mut bitrates = ladder.bitrates_bps();
                    bitrates.sort_unstable();
                    adaptive_bitrates.push(bitrates);
                }
                _ => allocators.push(None),
            }
        }

        if adaptive_bitrates.len() > 1 {
            let tables = plan_allocation_checkpoints(&adaptive_bitrates)?;
            for (allocator, table) in allocators.iter_mut().flatten().zip(tables) {
                allocator.set_allocation_checkpoints(table);
            }
        }

        tracing::debug!(
            tracks = definitions.len(),
            adaptive = adaptive_bitrates.len(),
            reserved_bps,
            "selection group planned"
        );

        Ok(Self {
            reserved_bps,
            allocators,
        })
    }
}

impl<M> SelectionGroup<M> {
    pub fn reserved_bps(&self) -> u64 {
        self.reserved_bps
    }

    /// Allocator of track `index`, `None` for fixed tracks.
    pub fn allocator(&self, index: usize) -> Option<&BandwidthAllocator<M>> {
        self.allocators.get(index)?.as_ref()
    }

    /// Hand out the allocators in definition order.
    pub fn into_allocators(self) -> Vec<Option<BandwidthAllocator<M>>> {
        self.allocators
    }
}
