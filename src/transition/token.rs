use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::ids::TransitionId;
use crate::state::State;

/// Cancellation token owned by one transition attempt.
///
/// Carries the endpoints so that whoever cancels the transition can emit
/// `TRANSITION_CANCEL` with the right payload without reaching into the
/// cancelled pipeline.
pub(crate) struct TransitionToken {
    cancelled: AtomicBool,
    /// Correlation id for log lines belonging to this attempt
    pub(crate) id: TransitionId,
    /// Target state of the attempt
    pub(crate) to: Arc<State>,
    /// State the attempt leaves from
    pub(crate) from: Option<Arc<State>>,
}

impl TransitionToken {
    pub(crate) fn new(to: Arc<State>, from: Option<Arc<State>>) -> Arc<Self> {
        Arc::new(TransitionToken {
            cancelled: AtomicBool::new(false),
            id: TransitionId::new(),
            to,
            from,
        })
    }

    /// Mark the token cancelled. Returns `true` only for the first caller;
    /// repeated cancellation is a no-op.
    pub(crate) fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
