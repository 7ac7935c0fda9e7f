//! Actor-based scheduling
//!
//! ```text
//!   Hub (main) ──spawns──▶ SchedulerActor ──run_cycle──▶ StatusEngine
//!        │                     │  ▲
//!        │                     │  └── SchedulerCommand (mpsc)
//!        │                     ▼
//!        │              CycleEvent (broadcast)
//!        └── SchedulerHandle (cloned into the API state)
//! ```
//!
//! Commands travel over an mpsc channel; queries are answered through
//! oneshot channels carried inside the command.

pub mod messages;
pub mod scheduler;

pub use messages::{CycleEvent, SchedulerCommand};
pub use scheduler::{SchedulerActor, SchedulerHandle};
