//! SQLite status store
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Readers (API handlers) do not block the poller's writes
//! - **Connection pooling**: Each status write is a single statement on the
//!   pool, so a failure halfway through a cycle never rolls back the writes
//!   that already happened
//! - **Migrations**: Automatic schema versioning with sqlx

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite, SqliteConnection};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, StatusStore};
use super::error::{StorageError, StorageResult};
use super::schema::{
    APPLICATION_COLUMNS, SERVER_COLUMNS, application_from_row, parse_server_status,
    server_from_row, timestamp_to_millis,
};
use crate::models::{
    Application, ApplicationId, ApplicationMembers, ApplicationStatus, NewApplication, NewServer,
    Server, ServerId, ServerKind, ServerStatus, ServerTarget,
};

/// SQLite status store
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` and run migrations
    ///
    /// ## Example
    ///
    /// ```no_run
    /// # use server_inventory::storage::sqlite::SqliteStore;
    /// # async fn example() -> anyhow::Result<()> {
    /// let store = SqliteStore::new("./servers.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite store at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    /// Close the pool and release the database file
    pub async fn close(&self) {
        info!("closing SQLite store");
        self.pool.close().await;
    }

    async fn ensure_application_exists(
        conn: &mut SqliteConnection,
        application_id: Option<ApplicationId>,
    ) -> StorageResult<()> {
        let Some(id) = application_id else {
            return Ok(());
        };

        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM applications WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match exists {
            Some(_) => Ok(()),
            None => Err(StorageError::InvalidReference(format!(
                "application {id} does not exist"
            ))),
        }
    }

    async fn fetch_server(
        conn: &mut SqliteConnection,
        id: ServerId,
    ) -> StorageResult<Option<Server>> {
        let sql = format!("SELECT {SERVER_COLUMNS} FROM servers WHERE id = ?");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *conn).await?;
        row.as_ref().map(server_from_row).transpose()
    }

    async fn fetch_application(
        conn: &mut SqliteConnection,
        id: ApplicationId,
    ) -> StorageResult<Option<Application>> {
        let sql = format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *conn).await?;
        row.as_ref().map(application_from_row).transpose()
    }
}

#[async_trait]
impl StatusStore for SqliteStore {
    #[instrument(skip(self))]
    async fn list_servers(&self) -> StorageResult<Vec<ServerTarget>> {
        let rows = sqlx::query("SELECT id, hostname, port, type FROM servers ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> StorageResult<ServerTarget> {
                let kind: String = row.try_get("type")?;
                Ok(ServerTarget {
                    id: row.try_get("id")?,
                    hostname: row.try_get("hostname")?,
                    port: row.try_get("port")?,
                    kind: ServerKind::from_label(&kind),
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn list_applications_with_member_statuses(
        &self,
    ) -> StorageResult<Vec<ApplicationMembers>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id AS application_id, s.status AS status
            FROM applications a
            LEFT JOIN servers s ON s.application_id = a.id
            ORDER BY a.id, s.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut applications: Vec<ApplicationMembers> = Vec::new();
        for row in &rows {
            let id: ApplicationId = row.try_get("application_id")?;
            let status: Option<String> = row.try_get("status")?;

            if applications.last().map(|app| app.id) != Some(id) {
                applications.push(ApplicationMembers {
                    id,
                    statuses: Vec::new(),
                });
            }

            // LEFT JOIN yields a single NULL row for applications without members
            if let (Some(status), Some(app)) = (status, applications.last_mut()) {
                app.statuses.push(parse_server_status(&status)?);
            }
        }

        Ok(applications)
    }

    #[instrument(skip(self, message))]
    async fn write_server_status(
        &self,
        id: ServerId,
        status: ServerStatus,
        message: &str,
    ) -> StorageResult<u64> {
        let result = sqlx::query(
            "UPDATE servers SET status = ?, message = ?, last_checked = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(message)
        .bind(timestamp_to_millis(&Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;

        let affected = result.rows_affected();
        if affected == 0 {
            debug!("server {id} vanished before its status could be written");
        }
        Ok(affected)
    }

    #[instrument(skip(self, message))]
    async fn write_application_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
        message: &str,
    ) -> StorageResult<u64> {
        let result = sqlx::query(
            "UPDATE applications SET status = ?, message = ?, last_checked = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(message)
        .bind(timestamp_to_millis(&Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn get_server(&self, id: ServerId) -> StorageResult<Option<Server>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_server(&mut conn, id).await
    }

    async fn get_application_members(&self, id: ApplicationId) -> StorageResult<Vec<Server>> {
        let sql = format!("SELECT {SERVER_COLUMNS} FROM servers WHERE application_id = ? ORDER BY id");
        let rows = sqlx::query(&sql).bind(id).fetch_all(&self.pool).await?;
        rows.iter().map(server_from_row).collect()
    }

    async fn list_all_servers(&self) -> StorageResult<Vec<Server>> {
        let sql = format!("SELECT {SERVER_COLUMNS} FROM servers ORDER BY id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(server_from_row).collect()
    }

    #[instrument(skip(self, server), fields(name = %server.name))]
    async fn create_server(&self, server: NewServer) -> StorageResult<Server> {
        let mut tx = self.pool.begin().await?;
        Self::ensure_application_exists(&mut tx, server.application_id).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO servers (name, hostname, port, type, owner_name, application_id)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&server.name)
        .bind(&server.hostname)
        .bind(server.port)
        .bind(server.kind.label())
        .bind(&server.owner_name)
        .bind(server.application_id)
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();
        let created = Self::fetch_server(&mut tx, id)
            .await?
            .ok_or_else(|| StorageError::QueryFailed(format!("server {id} missing after insert")))?;

        tx.commit().await?;
        debug!("created server {id}");
        Ok(created)
    }

    #[instrument(skip(self, server))]
    async fn update_server(
        &self,
        id: ServerId,
        server: NewServer,
    ) -> StorageResult<Option<Server>> {
        let mut tx = self.pool.begin().await?;
        Self::ensure_application_exists(&mut tx, server.application_id).await?;

        let result = sqlx::query(
            r#"
            UPDATE servers
            SET name = ?, hostname = ?, port = ?, type = ?, owner_name = ?, application_id = ?
            WHERE id = ?
            "#,
        )
        .bind(&server.name)
        .bind(&server.hostname)
        .bind(server.port)
        .bind(server.kind.label())
        .bind(&server.owner_name)
        .bind(server.application_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let updated = Self::fetch_server(&mut tx, id).await?;
        tx.commit().await?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete_server(&self, id: ServerId) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM servers WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_application(&self, id: ApplicationId) -> StorageResult<Option<Application>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_application(&mut conn, id).await
    }

    async fn list_applications(&self) -> StorageResult<Vec<Application>> {
        let sql = format!("SELECT {APPLICATION_COLUMNS} FROM applications ORDER BY id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(application_from_row).collect()
    }

    #[instrument(skip(self, application), fields(name = %application.name))]
    async fn create_application(
        &self,
        application: NewApplication,
    ) -> StorageResult<Application> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("INSERT INTO applications (name, description) VALUES (?, ?)")
            .bind(&application.name)
            .bind(&application.description)
            .execute(&mut *tx)
            .await?;

        let id = result.last_insert_rowid();
        let created = Self::fetch_application(&mut tx, id).await?.ok_or_else(|| {
            StorageError::QueryFailed(format!("application {id} missing after insert"))
        })?;

        tx.commit().await?;
        debug!("created application {id}");
        Ok(created)
    }

    #[instrument(skip(self, application))]
    async fn update_application(
        &self,
        id: ApplicationId,
        application: NewApplication,
    ) -> StorageResult<Option<Application>> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE applications SET name = ?, description = ? WHERE id = ?")
            .bind(&application.name)
            .bind(&application.description)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let updated = Self::fetch_application(&mut tx, id).await?;
        tx.commit().await?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete_application(&self, id: ApplicationId) -> StorageResult<bool> {
        let mut tx = self.pool.begin().await?;

        let unassigned = sqlx::query("UPDATE servers SET application_id = NULL WHERE application_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let deleted = sqlx::query("DELETE FROM applications WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if deleted > 0 {
            debug!("deleted application {id}, unassigned {unassigned} servers");
        }
        Ok(deleted > 0)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }
}
