//! API shared state

use std::sync::Arc;

use crate::actors::SchedulerHandle;
use crate::engine::StatusEngine;
use crate::storage::StatusStore;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Inventory store for CRUD and imports
    pub store: Arc<dyn StatusStore>,

    /// Engine for on-demand tests and ad-hoc probes
    pub engine: Arc<StatusEngine>,

    /// Handle to the background scheduler, absent when polling is not running
    pub scheduler: Option<SchedulerHandle>,
}

impl ApiState {
    pub fn new(engine: Arc<StatusEngine>, scheduler: Option<SchedulerHandle>) -> Self {
        Self {
            store: Arc::clone(engine.store()),
            engine,
            scheduler,
        }
    }
}
