//! Row layout of the `servers` and `applications` tables
//!
//! Statuses are stored as their lowercase names, server types as the raw
//! label and `last_checked` as Unix milliseconds. The helpers here decode
//! a row back into the domain model and report undecodable values as
//! [`StorageError::CorruptRow`] instead of panicking.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::error::{StorageError, StorageResult};
use crate::models::{Application, ApplicationStatus, Server, ServerKind, ServerStatus};

/// Columns selected whenever a full server is read
pub const SERVER_COLUMNS: &str =
    "id, name, hostname, port, type, owner_name, application_id, status, message, last_checked";

/// Columns selected whenever a full application is read
pub const APPLICATION_COLUMNS: &str = "id, name, description, status, message, last_checked";

pub fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub fn millis_to_timestamp(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

pub fn parse_server_status(raw: &str) -> StorageResult<ServerStatus> {
    raw.parse().map_err(StorageError::CorruptRow)
}

pub fn parse_application_status(raw: &str) -> StorageResult<ApplicationStatus> {
    raw.parse().map_err(StorageError::CorruptRow)
}

pub fn server_from_row(row: &SqliteRow) -> StorageResult<Server> {
    let status: String = row.try_get("status")?;
    let kind: String = row.try_get("type")?;
    let last_checked: Option<i64> = row.try_get("last_checked")?;

    Ok(Server {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        hostname: row.try_get("hostname")?,
        port: row.try_get("port")?,
        kind: ServerKind::from_label(&kind),
        owner_name: row.try_get("owner_name")?,
        application_id: row.try_get("application_id")?,
        status: parse_server_status(&status)?,
        message: row.try_get("message")?,
        last_checked: last_checked.and_then(millis_to_timestamp),
    })
}

pub fn application_from_row(row: &SqliteRow) -> StorageResult<Application> {
    let status: String = row.try_get("status")?;
    let last_checked: Option<i64> = row.try_get("last_checked")?;

    Ok(Application {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        status: parse_application_status(&status)?,
        message: row.try_get("message")?,
        last_checked: last_checked.and_then(millis_to_timestamp),
    })
}
