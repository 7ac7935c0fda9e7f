//! Message types for the scheduler actor
//!
//! 1. **Commands**: request/response messages sent to the scheduler via mpsc
//! 2. **Events**: cycle summaries published on a broadcast channel

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::engine::CycleReport;

/// Event published after every completed cycle
///
/// Subscribers that lag behind simply miss summaries; the next cycle
/// carries the full picture again.
#[derive(Debug, Clone)]
pub struct CycleEvent {
    /// Sequence number of the cycle, starting at 1
    pub cycle: u64,

    pub report: Arc<CycleReport>,
}

/// Commands that can be sent to a SchedulerActor
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Run a cycle right away, without waiting for the next tick
    RunNow {
        respond_to: oneshot::Sender<anyhow::Result<Arc<CycleReport>>>,
    },

    /// Report of the most recently completed cycle, if any
    LastCycle {
        respond_to: oneshot::Sender<Option<Arc<CycleReport>>>,
    },

    /// Stop after the in-flight cycle, if any, has finished
    Shutdown,
}
