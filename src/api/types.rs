//! Request and response bodies of the REST API

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::{ApplicationCheck, CycleReport, ServerCheck};
use crate::models::{ApplicationId, NewApplication, NewServer, ServerKind};

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok` when the store is healthy, `degraded` otherwise
    pub status: String,
    pub timestamp: String,
    pub storage: StorageHealth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageHealth {
    pub healthy: bool,
    pub message: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub timestamp: String,

    /// Number of servers per status
    pub servers: BTreeMap<String, usize>,

    /// Number of applications per status
    pub applications: BTreeMap<String, usize>,

    /// Summary of the most recent scheduler cycle
    pub last_cycle: Option<CycleSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub servers: usize,
    pub applications: usize,
    pub failures: usize,
}

impl From<&CycleReport> for CycleSummary {
    fn from(report: &CycleReport) -> Self {
        Self {
            started_at: report.started_at,
            finished_at: report.finished_at,
            servers: report.servers.len(),
            applications: report.applications.len(),
            failures: report.failures,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerImportResponse {
    pub imported: usize,
    pub servers: Vec<ServerCheck>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicationImportResponse {
    pub imported: usize,
    pub applications: Vec<ApplicationId>,
}

/// Body of `POST /api/v1/test`
#[derive(Debug, Clone, Serialize)]
pub struct TestAllResponse {
    #[serde(flatten)]
    pub summary: CycleSummary,
    pub server_results: Vec<ServerCheck>,
    pub application_results: Vec<ApplicationCheck>,
}

impl From<&CycleReport> for TestAllResponse {
    fn from(report: &CycleReport) -> Self {
        Self {
            summary: report.into(),
            server_results: report.servers.clone(),
            application_results: report.applications.clone(),
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Body of `POST /api/v1/servers/import`
#[derive(Debug, Clone, Deserialize)]
pub struct ServerImport {
    pub servers: Vec<ImportedServer>,
}

/// One imported server; unlike a plain create every field but the owner
/// and application is required
#[derive(Debug, Clone, Deserialize)]
pub struct ImportedServer {
    pub name: String,
    pub hostname: String,
    pub port: i64,
    #[serde(rename = "type")]
    pub kind: ServerKind,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub application_id: Option<ApplicationId>,
}

impl From<ImportedServer> for NewServer {
    fn from(server: ImportedServer) -> Self {
        NewServer {
            name: server.name,
            hostname: server.hostname,
            port: server.port,
            kind: server.kind,
            owner_name: server.owner_name,
            application_id: server.application_id,
        }
    }
}

/// Body of `POST /api/v1/applications/import`
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationImport {
    pub applications: Vec<NewApplication>,
}

/// Body of `POST /api/v1/servers/probe`
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeRequest {
    pub hostname: String,
    pub port: i64,
    #[serde(rename = "type", default)]
    pub kind: ServerKind,
}
