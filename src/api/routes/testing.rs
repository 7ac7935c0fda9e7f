//! Whole-inventory test trigger

use axum::{Json, extract::State};

use crate::api::{error::ApiResult, state::ApiState, types::TestAllResponse};

/// POST /api/v1/test
///
/// Runs a full cycle. When the scheduler is running the cycle goes through
/// it, so it never overlaps a scheduled one and shows up in `/stats`.
pub async fn test_all(State(state): State<ApiState>) -> ApiResult<Json<TestAllResponse>> {
    let response = match &state.scheduler {
        Some(scheduler) => {
            let report = scheduler.run_now().await?;
            TestAllResponse::from(report.as_ref())
        }
        None => {
            let report = state.engine.test_all().await?;
            TestAllResponse::from(&report)
        }
    };

    Ok(Json(response))
}
