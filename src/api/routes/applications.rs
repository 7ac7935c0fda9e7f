//! Application endpoints

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::Value;
use tracing::info;

use super::{parse_body, require_name};
use crate::{
    api::{
        error::{ApiError, ApiResult},
        state::ApiState,
        types::{ApplicationImport, ApplicationImportResponse},
    },
    engine::ApplicationTest,
    models::{Application, ApplicationId, NewApplication, Server},
};

fn not_found(id: ApplicationId) -> ApiError {
    ApiError::NotFound(format!("application {id} not found"))
}

/// GET /api/v1/applications
pub async fn list_applications(
    State(state): State<ApiState>,
) -> ApiResult<Json<Vec<Application>>> {
    Ok(Json(state.store.list_applications().await?))
}

/// POST /api/v1/applications
pub async fn create_application(
    State(state): State<ApiState>,
    Json(body): Json<Value>,
) -> ApiResult<(StatusCode, Json<Application>)> {
    let application: NewApplication = parse_body(body)?;
    require_name(&application.name)?;

    let application = state.store.create_application(application).await?;
    info!("created application {} ({})", application.id, application.name);

    Ok((StatusCode::CREATED, Json(application)))
}

/// GET /api/v1/applications/:id
pub async fn get_application(
    State(state): State<ApiState>,
    Path(id): Path<ApplicationId>,
) -> ApiResult<Json<Application>> {
    state
        .store
        .get_application(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

/// PUT /api/v1/applications/:id
pub async fn update_application(
    State(state): State<ApiState>,
    Path(id): Path<ApplicationId>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Application>> {
    let application: NewApplication = parse_body(body)?;
    require_name(&application.name)?;

    state
        .store
        .update_application(id, application)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

/// DELETE /api/v1/applications/:id
///
/// Member servers stay in the inventory, unassigned
pub async fn delete_application(
    State(state): State<ApiState>,
    Path(id): Path<ApplicationId>,
) -> ApiResult<StatusCode> {
    if !state.store.delete_application(id).await? {
        return Err(not_found(id));
    }

    info!("deleted application {id}");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/applications/:id/servers
pub async fn list_members(
    State(state): State<ApiState>,
    Path(id): Path<ApplicationId>,
) -> ApiResult<Json<Vec<Server>>> {
    if state.store.get_application(id).await?.is_none() {
        return Err(not_found(id));
    }

    Ok(Json(state.store.get_application_members(id).await?))
}

/// POST /api/v1/applications/:id/test
pub async fn test_application(
    State(state): State<ApiState>,
    Path(id): Path<ApplicationId>,
) -> ApiResult<Json<ApplicationTest>> {
    Ok(Json(state.engine.test_one_application(id).await?))
}

/// POST /api/v1/applications/import
pub async fn import_applications(
    State(state): State<ApiState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<ApplicationImportResponse>> {
    let import: ApplicationImport = parse_body(body)?;

    for application in &import.applications {
        require_name(&application.name)?;
    }

    let mut applications = Vec::with_capacity(import.applications.len());
    for application in import.applications {
        applications.push(state.store.create_application(application).await?.id);
    }
    info!("imported {} applications", applications.len());

    Ok(Json(ApplicationImportResponse {
        imported: applications.len(),
        applications,
    }))
}
