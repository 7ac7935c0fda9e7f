//! Route handlers, one module per resource

pub mod applications;
pub mod health;
pub mod servers;
pub mod stats;
pub mod testing;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::{ApiError, ApiResult};

/// Decode a JSON body, reporting schema mismatches as 400
///
/// Handlers take `Json<Value>` and decode here so that a missing field is a
/// bad request rather than axum's 422.
pub(crate) fn parse_body<T: DeserializeOwned>(body: Value) -> ApiResult<T> {
    serde_json::from_value(body)
        .map_err(|e| ApiError::InvalidRequest(format!("invalid request body: {e}")))
}

pub(crate) fn require_name(name: &str) -> ApiResult<()> {
    if name.trim().is_empty() {
        return Err(ApiError::InvalidRequest("name is required".to_string()));
    }
    Ok(())
}
