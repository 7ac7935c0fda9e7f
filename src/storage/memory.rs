//! In-memory status store (no persistence)
//!
//! Useful for:
//! - Testing without database dependencies
//! - Throwaway deployments (`"backend": "none"`)
//!
//! All data is lost on restart.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{HealthStatus, StatusStore};
use super::error::{StorageError, StorageResult};
use crate::models::{
    Application, ApplicationId, ApplicationMembers, ApplicationStatus, NewApplication, NewServer,
    Server, ServerId, ServerStatus, ServerTarget,
};

#[derive(Debug, Default)]
struct Inventory {
    servers: BTreeMap<ServerId, Server>,
    applications: BTreeMap<ApplicationId, Application>,
    next_server_id: ServerId,
    next_application_id: ApplicationId,
}

impl Inventory {
    fn check_reference(&self, application_id: Option<ApplicationId>) -> StorageResult<()> {
        match application_id {
            Some(id) if !self.applications.contains_key(&id) => Err(
                StorageError::InvalidReference(format!("application {id} does not exist")),
            ),
            _ => Ok(()),
        }
    }
}

/// In-memory status store
///
/// Ids are assigned sequentially starting at 1, like SQLite rowids.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inventory>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn list_servers(&self) -> StorageResult<Vec<ServerTarget>> {
        let inventory = self.inner.read().await;
        Ok(inventory.servers.values().map(Server::target).collect())
    }

    async fn list_applications_with_member_statuses(
        &self,
    ) -> StorageResult<Vec<ApplicationMembers>> {
        let inventory = self.inner.read().await;

        let mut members: BTreeMap<ApplicationId, Vec<ServerStatus>> = inventory
            .applications
            .keys()
            .map(|id| (*id, Vec::new()))
            .collect();

        for server in inventory.servers.values() {
            if let Some(statuses) = server
                .application_id
                .and_then(|id| members.get_mut(&id))
            {
                statuses.push(server.status);
            }
        }

        Ok(members
            .into_iter()
            .map(|(id, statuses)| ApplicationMembers { id, statuses })
            .collect())
    }

    async fn write_server_status(
        &self,
        id: ServerId,
        status: ServerStatus,
        message: &str,
    ) -> StorageResult<u64> {
        let mut inventory = self.inner.write().await;
        match inventory.servers.get_mut(&id) {
            Some(server) => {
                server.status = status;
                server.message = message.to_string();
                server.last_checked = Some(Utc::now());
                Ok(1)
            }
            None => {
                debug!("server {id} vanished before its status could be written");
                Ok(0)
            }
        }
    }

    async fn write_application_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
        message: &str,
    ) -> StorageResult<u64> {
        let mut inventory = self.inner.write().await;
        match inventory.applications.get_mut(&id) {
            Some(application) => {
                application.status = status;
                application.message = message.to_string();
                application.last_checked = Some(Utc::now());
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn get_server(&self, id: ServerId) -> StorageResult<Option<Server>> {
        Ok(self.inner.read().await.servers.get(&id).cloned())
    }

    async fn get_application_members(&self, id: ApplicationId) -> StorageResult<Vec<Server>> {
        let inventory = self.inner.read().await;
        Ok(inventory
            .servers
            .values()
            .filter(|server| server.application_id == Some(id))
            .cloned()
            .collect())
    }

    async fn list_all_servers(&self) -> StorageResult<Vec<Server>> {
        Ok(self.inner.read().await.servers.values().cloned().collect())
    }

    async fn create_server(&self, server: NewServer) -> StorageResult<Server> {
        let mut inventory = self.inner.write().await;
        inventory.check_reference(server.application_id)?;

        inventory.next_server_id += 1;
        let id = inventory.next_server_id;
        let server = Server {
            id,
            name: server.name,
            hostname: server.hostname,
            port: server.port,
            kind: server.kind,
            owner_name: server.owner_name,
            application_id: server.application_id,
            status: ServerStatus::Unknown,
            message: String::new(),
            last_checked: None,
        };
        inventory.servers.insert(id, server.clone());

        Ok(server)
    }

    async fn update_server(
        &self,
        id: ServerId,
        update: NewServer,
    ) -> StorageResult<Option<Server>> {
        let mut inventory = self.inner.write().await;
        inventory.check_reference(update.application_id)?;

        let Some(server) = inventory.servers.get_mut(&id) else {
            return Ok(None);
        };
        server.name = update.name;
        server.hostname = update.hostname;
        server.port = update.port;
        server.kind = update.kind;
        server.owner_name = update.owner_name;
        server.application_id = update.application_id;

        Ok(Some(server.clone()))
    }

    async fn delete_server(&self, id: ServerId) -> StorageResult<bool> {
        Ok(self.inner.write().await.servers.remove(&id).is_some())
    }

    async fn get_application(&self, id: ApplicationId) -> StorageResult<Option<Application>> {
        Ok(self.inner.read().await.applications.get(&id).cloned())
    }

    async fn list_applications(&self) -> StorageResult<Vec<Application>> {
        Ok(self
            .inner
            .read()
            .await
            .applications
            .values()
            .cloned()
            .collect())
    }

    async fn create_application(
        &self,
        application: NewApplication,
    ) -> StorageResult<Application> {
        let mut inventory = self.inner.write().await;

        inventory.next_application_id += 1;
        let id = inventory.next_application_id;
        let application = Application {
            id,
            name: application.name,
            description: application.description,
            status: ApplicationStatus::Unknown,
            message: String::new(),
            last_checked: None,
        };
        inventory.applications.insert(id, application.clone());

        Ok(application)
    }

    async fn update_application(
        &self,
        id: ApplicationId,
        update: NewApplication,
    ) -> StorageResult<Option<Application>> {
        let mut inventory = self.inner.write().await;
        let Some(application) = inventory.applications.get_mut(&id) else {
            return Ok(None);
        };
        application.name = update.name;
        application.description = update.description;

        Ok(Some(application.clone()))
    }

    async fn delete_application(&self, id: ApplicationId) -> StorageResult<bool> {
        let mut inventory = self.inner.write().await;
        if inventory.applications.remove(&id).is_none() {
            return Ok(false);
        }

        for server in inventory.servers.values_mut() {
            if server.application_id == Some(id) {
                server.application_id = None;
            }
        }

        Ok(true)
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let inventory = self.inner.read().await;
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory storage operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("servers".to_string(), inventory.servers.len().to_string()),
                (
                    "applications".to_string(),
                    inventory.applications.len().to_string(),
                ),
            ]),
        })
    }
}
