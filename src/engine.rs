//! Probe-and-aggregate engine
//!
//! Shared by the background scheduler and the on-demand triggers of the API.
//! One pass ("cycle") looks like this:
//!
//! ```text
//! list_servers → probe each (bounded concurrency) → write_server_status
//!              → list_applications_with_member_statuses → aggregate
//!              → write_application_status
//! ```
//!
//! ## Failure handling
//!
//! - A probe that panics is isolated in its own task; the server is written
//!   as `error` and the cycle carries on.
//! - A failed status write is logged and skipped.
//! - Only a failure to *list* servers or applications aborts a cycle; the
//!   caller decides what to do with that (the scheduler logs and waits for
//!   the next tick).

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

use crate::models::{
    ApplicationId, ApplicationStatus, Server, ServerId, ServerKind, ServerStatus, ServerTarget,
};
use crate::monitors::{Aggregate, ProbeOutcome, Prober};
use crate::storage::{StatusStore, StorageError};

/// Kind of entity an [`EngineError::NotFound`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Server,
    Application,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Server => write!(f, "server"),
            EntityKind::Application => write!(f, "application"),
        }
    }
}

/// Errors surfaced by on-demand triggers
///
/// Network problems are never errors here; they end up as statuses.
#[derive(Debug)]
pub enum EngineError {
    /// The requested server or application does not exist
    NotFound { kind: EntityKind, id: i64 },

    /// The store could not be read
    Storage(StorageError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotFound { kind, id } => write!(f, "{kind} {id} not found"),
            EngineError::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Storage(err) => Some(err),
            EngineError::NotFound { .. } => None,
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        EngineError::Storage(err)
    }
}

/// Result of probing one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerCheck {
    pub server_id: ServerId,
    pub status: ServerStatus,
    pub message: String,

    /// Whether the verdict reached the store (false if the row vanished or
    /// the write failed)
    pub persisted: bool,
}

/// Result of aggregating one application
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationCheck {
    pub application_id: ApplicationId,
    pub status: ApplicationStatus,
    pub message: String,
    pub persisted: bool,
}

/// Result of testing one application on demand
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationTest {
    #[serde(flatten)]
    pub application: ApplicationCheck,
    pub servers: Vec<ServerCheck>,
}

/// Summary of one full pass over the inventory
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub servers: Vec<ServerCheck>,
    pub applications: Vec<ApplicationCheck>,

    /// Probes that failed unexpectedly plus status writes that failed
    pub failures: usize,
}

impl CycleReport {
    pub fn count_servers(&self, status: ServerStatus) -> usize {
        self.servers.iter().filter(|s| s.status == status).count()
    }
}

/// Probes servers, aggregates applications and persists the results
pub struct StatusEngine {
    store: Arc<dyn StatusStore>,
    prober: Arc<dyn Prober>,
    probe_slots: Semaphore,
}

impl StatusEngine {
    pub fn new(
        store: Arc<dyn StatusStore>,
        prober: Arc<dyn Prober>,
        max_concurrent_probes: usize,
    ) -> Self {
        Self {
            store,
            prober,
            probe_slots: Semaphore::new(max_concurrent_probes.max(1)),
        }
    }

    pub fn store(&self) -> &Arc<dyn StatusStore> {
        &self.store
    }

    /// Probe every server, then aggregate every application
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<CycleReport, StorageError> {
        let started_at = Utc::now();

        let targets = self.store.list_servers().await?;
        debug!("probing {} servers", targets.len());
        let (servers, mut failures) = self.check_servers(targets).await;

        let members = self.store.list_applications_with_member_statuses().await?;
        debug!("aggregating {} applications", members.len());

        let mut applications = Vec::with_capacity(members.len());
        for application in members {
            let aggregate = Aggregate::evaluate(&application.statuses);
            let check = self.persist_application(application.id, aggregate).await;
            if check.is_err() {
                failures += 1;
            }
            applications.push(check.unwrap_or_else(|check| check));
        }

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            servers,
            applications,
            failures,
        };

        info!(
            "cycle finished: {} servers ({} online), {} applications, {} failures",
            report.servers.len(),
            report.count_servers(ServerStatus::Online),
            report.applications.len(),
            report.failures
        );

        Ok(report)
    }

    /// Probe a single server and persist the verdict
    #[instrument(skip(self))]
    pub async fn test_one_server(&self, id: ServerId) -> Result<ServerCheck, EngineError> {
        let server = self.store.get_server(id).await?.ok_or(EngineError::NotFound {
            kind: EntityKind::Server,
            id,
        })?;

        let (check, _) = self.check_server(server.target()).await;
        Ok(check)
    }

    /// Probe every member of an application, then aggregate and persist it
    ///
    /// An application without members is reported (and stored) as
    /// `unknown`, which is not an error.
    #[instrument(skip(self))]
    pub async fn test_one_application(
        &self,
        id: ApplicationId,
    ) -> Result<ApplicationTest, EngineError> {
        if self.store.get_application(id).await?.is_none() {
            return Err(EngineError::NotFound {
                kind: EntityKind::Application,
                id,
            });
        }

        let members = self.store.get_application_members(id).await?;
        let targets = members.iter().map(Server::target).collect();
        let (servers, _) = self.check_servers(targets).await;

        let statuses: Vec<ServerStatus> = servers.iter().map(|check| check.status).collect();
        let aggregate = Aggregate::evaluate(&statuses);
        let application = self
            .persist_application(id, aggregate)
            .await
            .unwrap_or_else(|check| check);

        Ok(ApplicationTest {
            application,
            servers,
        })
    }

    /// Test the whole inventory right now
    ///
    /// Same code path as a scheduler cycle; aggregation reuses the statuses
    /// that were just written.
    pub async fn test_all(&self) -> Result<CycleReport, EngineError> {
        Ok(self.run_cycle().await?)
    }

    /// Probe an arbitrary target without touching the store
    pub async fn probe_ad_hoc(&self, hostname: &str, port: i64, kind: &ServerKind) -> ProbeOutcome {
        self.prober.probe(hostname, port, kind).await
    }

    async fn check_servers(&self, targets: Vec<ServerTarget>) -> (Vec<ServerCheck>, usize) {
        let results = join_all(targets.into_iter().map(|target| self.check_server(target))).await;

        let failures: usize = results.iter().map(|(_, failures)| failures).sum();
        let checks = results.into_iter().map(|(check, _)| check).collect();
        (checks, failures)
    }

    /// Probe one target in its own task and persist the outcome
    ///
    /// Returns the check and the number of failures it ran into.
    async fn check_server(&self, target: ServerTarget) -> (ServerCheck, usize) {
        let id = target.id;
        let mut failures = 0;

        let outcome = {
            // the semaphore is never closed
            let _permit = self.probe_slots.acquire().await.ok();
            let prober = Arc::clone(&self.prober);

            let task = tokio::spawn(async move {
                prober
                    .probe(&target.hostname, target.port, &target.kind)
                    .await
            });

            match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("probe of server {id} failed: {e}");
                    failures += 1;
                    ProbeOutcome::error(format!("probe failed: {e}"))
                }
            }
        };

        let persisted = match self
            .store
            .write_server_status(id, outcome.status, &outcome.message)
            .await
        {
            Ok(0) => {
                debug!("server {id} was deleted while being probed");
                false
            }
            Ok(_) => true,
            Err(e) => {
                warn!("failed to persist status of server {id}: {e}");
                failures += 1;
                false
            }
        };

        let check = ServerCheck {
            server_id: id,
            status: outcome.status,
            message: outcome.message,
            persisted,
        };
        (check, failures)
    }

    /// Write an aggregate; `Err` carries the unpersisted check if the write failed
    async fn persist_application(
        &self,
        id: ApplicationId,
        aggregate: Aggregate,
    ) -> Result<ApplicationCheck, ApplicationCheck> {
        let result = self
            .store
            .write_application_status(id, aggregate.status, &aggregate.message)
            .await;

        let mut check = ApplicationCheck {
            application_id: id,
            status: aggregate.status,
            message: aggregate.message,
            persisted: false,
        };

        match result {
            Ok(affected) => {
                check.persisted = affected > 0;
                Ok(check)
            }
            Err(e) => {
                warn!("failed to persist status of application {id}: {e}");
                Err(check)
            }
        }
    }
}
