//! Server inventory endpoints

use std::collections::BTreeSet;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use futures::future::join_all;
use serde_json::Value;
use tracing::{info, warn};

use super::{parse_body, require_name};
use crate::{
    api::{
        error::{ApiError, ApiResult},
        state::ApiState,
        types::{ProbeRequest, ServerImport, ServerImportResponse},
    },
    engine::ServerCheck,
    models::{NewServer, Server, ServerId},
    monitors::ProbeOutcome,
};

fn not_found(id: ServerId) -> ApiError {
    ApiError::NotFound(format!("server {id} not found"))
}

/// GET /api/v1/servers
pub async fn list_servers(State(state): State<ApiState>) -> ApiResult<Json<Vec<Server>>> {
    Ok(Json(state.store.list_all_servers().await?))
}

/// POST /api/v1/servers
///
/// The new server starts as `unknown` until it is probed
pub async fn create_server(
    State(state): State<ApiState>,
    Json(body): Json<Value>,
) -> ApiResult<(StatusCode, Json<Server>)> {
    let server: NewServer = parse_body(body)?;
    require_name(&server.name)?;

    let server = state.store.create_server(server).await?;
    info!("created server {} ({})", server.id, server.name);

    Ok((StatusCode::CREATED, Json(server)))
}

/// GET /api/v1/servers/:id
pub async fn get_server(
    State(state): State<ApiState>,
    Path(id): Path<ServerId>,
) -> ApiResult<Json<Server>> {
    state
        .store
        .get_server(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

/// PUT /api/v1/servers/:id
///
/// Replaces the inventory fields; the last status is kept
pub async fn update_server(
    State(state): State<ApiState>,
    Path(id): Path<ServerId>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Server>> {
    let server: NewServer = parse_body(body)?;
    require_name(&server.name)?;

    state
        .store
        .update_server(id, server)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

/// DELETE /api/v1/servers/:id
pub async fn delete_server(
    State(state): State<ApiState>,
    Path(id): Path<ServerId>,
) -> ApiResult<StatusCode> {
    if !state.store.delete_server(id).await? {
        return Err(not_found(id));
    }

    info!("deleted server {id}");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/servers/:id/test
pub async fn test_server(
    State(state): State<ApiState>,
    Path(id): Path<ServerId>,
) -> ApiResult<Json<ServerCheck>> {
    Ok(Json(state.engine.test_one_server(id).await?))
}

/// POST /api/v1/servers/probe
///
/// Probe a target that is not (yet) in the inventory; nothing is stored
pub async fn probe_server(
    State(state): State<ApiState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<ProbeOutcome>> {
    let request: ProbeRequest = parse_body(body)?;

    let outcome = state
        .engine
        .probe_ad_hoc(&request.hostname, request.port, &request.kind)
        .await;

    Ok(Json(outcome))
}

/// POST /api/v1/servers/import
///
/// The whole payload is validated before the first insert. Every imported
/// server is then probed once so it does not sit at `unknown` until the
/// next cycle.
pub async fn import_servers(
    State(state): State<ApiState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<ServerImportResponse>> {
    let import: ServerImport = parse_body(body)?;

    for server in &import.servers {
        require_name(&server.name)?;
    }

    let references: BTreeSet<_> = import
        .servers
        .iter()
        .filter_map(|server| server.application_id)
        .collect();
    for application_id in references {
        if state.store.get_application(application_id).await?.is_none() {
            return Err(ApiError::InvalidRequest(format!(
                "application {application_id} does not exist"
            )));
        }
    }

    let mut created = Vec::with_capacity(import.servers.len());
    for server in import.servers {
        created.push(state.store.create_server(server.into()).await?.id);
    }
    info!("imported {} servers", created.len());

    let checks = join_all(created.iter().map(|id| state.engine.test_one_server(*id))).await;
    let servers = checks
        .into_iter()
        .filter_map(|check| match check {
            Ok(check) => Some(check),
            Err(e) => {
                warn!("could not test imported server: {e}");
                None
            }
        })
        .collect();

    Ok(Json(ServerImportResponse {
        imported: created.len(),
        servers,
    }))
}
