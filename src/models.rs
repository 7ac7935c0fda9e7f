//! Inventory entities and status values
//!
//! Servers and applications carry their last-known status and diagnostic
//! message. Both status enums serialize as lowercase strings, which is also
//! how they are stored in the database.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a server row
pub type ServerId = i64;

/// Identifier of an application row
pub type ApplicationId = i64;

/// Last-known reachability of a single server
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// Never checked
    #[default]
    Unknown,
    Online,
    Offline,
    /// The check itself could not be carried out
    Error,
}

impl ServerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerStatus::Unknown => "unknown",
            ServerStatus::Online => "online",
            ServerStatus::Offline => "offline",
            ServerStatus::Error => "error",
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(ServerStatus::Unknown),
            "online" => Ok(ServerStatus::Online),
            "offline" => Ok(ServerStatus::Offline),
            "error" => Ok(ServerStatus::Error),
            other => Err(format!("invalid server status: {other}")),
        }
    }
}

/// Status of an application, derived from its member servers
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Unknown,
    Online,
    Offline,
    /// Some, but not all, member servers are online
    Partial,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Unknown => "unknown",
            ApplicationStatus::Online => "online",
            ApplicationStatus::Offline => "offline",
            ApplicationStatus::Partial => "partial",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(ApplicationStatus::Unknown),
            "online" => Ok(ApplicationStatus::Online),
            "offline" => Ok(ApplicationStatus::Offline),
            "partial" => Ok(ApplicationStatus::Partial),
            other => Err(format!("invalid application status: {other}")),
        }
    }
}

/// Protocol/type tag of a server
///
/// Only `Tcp` and `Http` change how a server is probed. Any other label is
/// kept verbatim for display and probed like plain TCP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServerKind {
    #[default]
    Tcp,
    Http {
        /// Use `https://` instead of `http://`
        tls: bool,
    },
    Other(String),
}

impl ServerKind {
    /// Parse a free-form type label (case insensitive)
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "tcp" => ServerKind::Tcp,
            "http" | "web" => ServerKind::Http { tls: false },
            "https" => ServerKind::Http { tls: true },
            _ => ServerKind::Other(label.to_string()),
        }
    }

    pub fn is_http_like(&self) -> bool {
        matches!(self, ServerKind::Http { .. })
    }

    pub fn label(&self) -> &str {
        match self {
            ServerKind::Tcp => "tcp",
            ServerKind::Http { tls: false } => "http",
            ServerKind::Http { tls: true } => "https",
            ServerKind::Other(label) => label,
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for ServerKind {
    fn from(value: String) -> Self {
        ServerKind::from_label(&value)
    }
}

impl From<ServerKind> for String {
    fn from(value: ServerKind) -> Self {
        value.label().to_string()
    }
}

/// A server as stored in the inventory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Server {
    pub id: ServerId,
    pub name: String,
    pub hostname: String,
    pub port: i64,
    #[serde(rename = "type")]
    pub kind: ServerKind,
    pub owner_name: Option<String>,
    pub application_id: Option<ApplicationId>,
    pub status: ServerStatus,
    pub message: String,
    pub last_checked: Option<DateTime<Utc>>,
}

impl Server {
    /// The part of the server the poller needs to probe it
    pub fn target(&self) -> ServerTarget {
        ServerTarget {
            id: self.id,
            hostname: self.hostname.clone(),
            port: self.port,
            kind: self.kind.clone(),
        }
    }
}

/// Fields supplied when creating or replacing a server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewServer {
    pub name: String,
    #[serde(default)]
    pub hostname: String,
    pub port: i64,
    #[serde(rename = "type", default)]
    pub kind: ServerKind,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub application_id: Option<ApplicationId>,
}

/// An application grouping servers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Application {
    pub id: ApplicationId,
    pub name: String,
    pub description: String,
    pub status: ApplicationStatus,
    pub message: String,
    pub last_checked: Option<DateTime<Utc>>,
}

/// Fields supplied when creating or replacing an application
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewApplication {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Probe input for one server
#[derive(Debug, Clone, PartialEq)]
pub struct ServerTarget {
    pub id: ServerId,
    pub hostname: String,
    pub port: i64,
    pub kind: ServerKind,
}

/// An application together with the current statuses of its member servers
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationMembers {
    pub id: ApplicationId,
    pub statuses: Vec<ServerStatus>,
}
