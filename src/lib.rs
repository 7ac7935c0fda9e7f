pub mod actors;
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod engine;
pub mod models;
pub mod monitors;
pub mod storage;
pub mod util;

pub use engine::{CycleReport, EngineError, StatusEngine};
pub use models::{Application, ApplicationStatus, Server, ServerKind, ServerStatus};
