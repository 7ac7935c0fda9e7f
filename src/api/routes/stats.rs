//! Inventory statistics endpoint

use std::collections::BTreeMap;

use axum::{Json, extract::State};
use tracing::warn;

use crate::api::{
    error::ApiResult,
    state::ApiState,
    types::{CycleSummary, StatsResponse},
};

/// GET /api/v1/stats
///
/// Status counts of the inventory plus the last scheduler cycle
pub async fn get_stats(State(state): State<ApiState>) -> ApiResult<Json<StatsResponse>> {
    let mut servers = BTreeMap::new();
    for server in state.store.list_all_servers().await? {
        *servers.entry(server.status.to_string()).or_insert(0) += 1;
    }

    let mut applications = BTreeMap::new();
    for application in state.store.list_applications().await? {
        *applications
            .entry(application.status.to_string())
            .or_insert(0) += 1;
    }

    let last_cycle = match &state.scheduler {
        Some(scheduler) => match scheduler.last_cycle().await {
            Ok(report) => report.as_deref().map(CycleSummary::from),
            Err(e) => {
                warn!("could not query scheduler: {e:#}");
                None
            }
        },
        None => None,
    };

    Ok(Json(StatsResponse {
        timestamp: chrono::Utc::now().to_rfc3339(),
        servers,
        applications,
        last_cycle,
    }))
}
