//! Status store trait definition
//!
//! This module defines the `StatusStore` trait that every inventory
//! backend implements. The poller and the on-demand triggers only read
//! targets and write `{status, message}` pairs through it; the CRUD methods
//! serve the REST API and imports.

use std::collections::HashMap;

use async_trait::async_trait;

use super::error::StorageResult;
use crate::models::{
    Application, ApplicationId, ApplicationMembers, ApplicationStatus, NewApplication, NewServer,
    Server, ServerId, ServerStatus, ServerTarget,
};

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Persistent record of servers and applications
///
/// ## Concurrency
///
/// Implementations are shared between the poller and API handlers, so they
/// must be `Send + Sync`. Every write is its own unit of work; a failure in
/// one write never rolls back another.
///
/// ## Vanished rows
///
/// Status writes against an id that no longer exists are not errors. They
/// report `0` affected rows, which lets a probe of a server deleted
/// mid-cycle finish quietly.
#[async_trait]
pub trait StatusStore: Send + Sync {
    // ========================================================================
    // Poller contract
    // ========================================================================

    /// Everything needed to probe every server, ordered by id
    async fn list_servers(&self) -> StorageResult<Vec<ServerTarget>>;

    /// Every application with the current statuses of its member servers
    ///
    /// Applications without members are included with an empty status list.
    async fn list_applications_with_member_statuses(&self)
    -> StorageResult<Vec<ApplicationMembers>>;

    /// Store the latest probe verdict of a server, returns affected rows
    async fn write_server_status(
        &self,
        id: ServerId,
        status: ServerStatus,
        message: &str,
    ) -> StorageResult<u64>;

    /// Store the latest aggregate of an application, returns affected rows
    async fn write_application_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
        message: &str,
    ) -> StorageResult<u64>;

    async fn get_server(&self, id: ServerId) -> StorageResult<Option<Server>>;

    /// Servers assigned to an application, ordered by id
    async fn get_application_members(&self, id: ApplicationId) -> StorageResult<Vec<Server>>;

    // ========================================================================
    // Inventory CRUD
    // ========================================================================

    /// Full server records, ordered by id
    async fn list_all_servers(&self) -> StorageResult<Vec<Server>>;

    /// Insert a server with status `unknown`
    ///
    /// Fails with `InvalidReference` if `application_id` names a missing
    /// application.
    async fn create_server(&self, server: NewServer) -> StorageResult<Server>;

    /// Replace the inventory fields of a server, keeping its status
    ///
    /// Returns `None` if the server does not exist.
    async fn update_server(&self, id: ServerId, server: NewServer)
    -> StorageResult<Option<Server>>;

    /// Returns `false` if the server did not exist
    async fn delete_server(&self, id: ServerId) -> StorageResult<bool>;

    async fn get_application(&self, id: ApplicationId) -> StorageResult<Option<Application>>;

    async fn list_applications(&self) -> StorageResult<Vec<Application>>;

    /// Insert an application with status `unknown`
    async fn create_application(&self, application: NewApplication)
    -> StorageResult<Application>;

    async fn update_application(
        &self,
        id: ApplicationId,
        application: NewApplication,
    ) -> StorageResult<Option<Application>>;

    /// Delete an application and unassign its servers
    ///
    /// Member servers are kept with `application_id` cleared.
    async fn delete_application(&self, id: ApplicationId) -> StorageResult<bool>;

    /// Check backend health
    async fn health_check(&self) -> StorageResult<HealthStatus>;
}
