use crate::{
    ladder::BitrateLadder,
    types::{BufferState, Selection, SelectionReason},
};

/// A per-stream quality decision strategy.
///
/// Implementations own their [`SelectionState`](crate::SelectionState) and
/// mutate it only from [`select`](Self::select). Indices are pipeline track
/// indices (`0` = highest ladder position).
pub trait QualitySelector {
    /// Run one decision at a chunk boundary.
    fn select(&mut self, buffer: &BufferState) -> Selection;

    fn selected_index(&self) -> usize;

    fn reason(&self) -> SelectionReason;

    fn ladder(&self) -> &BitrateLadder;

    /// Short strategy name used in logs.
    fn name(&self) -> &'static str;
}

impl<S: QualitySelector + ?Sized> QualitySelector for Box<S> {
    fn select(&mut self, buffer: &BufferState) -> Selection {
        (**self).select(buffer)
    }

    fn selected_index(&self) -> usize {
        (**self).selected_index()
    }

    fn reason(&self) -> SelectionReason {
        (**self).reason()
    }

    fn ladder(&self) -> &BitrateLadder {
        (**self).ladder()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
