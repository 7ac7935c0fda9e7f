//! SchedulerActor - Runs a status cycle, then sleeps a fixed interval
//!
//! ## Message Flow
//!
//! ```text
//! Timer → StatusEngine::run_cycle → publish CycleEvent → [subscribers]
//!   ↑                                      │
//!   └──── re-armed after every cycle ──────┘
//!
//! Commands (RunNow, LastCycle, Shutdown)
//! ```
//!
//! The first cycle runs as soon as the actor starts. The full interval is
//! slept after every cycle, scheduled or `RunNow`, so cycles never overlap
//! and a slow cycle never eats into the pause. A cycle that fails is logged
//! and the loop sleeps as usual.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, instrument, trace};

use crate::engine::{CycleReport, StatusEngine};

use super::messages::{CycleEvent, SchedulerCommand};

/// Actor that drives periodic status cycles
pub struct SchedulerActor {
    engine: Arc<StatusEngine>,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<SchedulerCommand>,

    /// Broadcast sender for cycle summaries
    event_tx: broadcast::Sender<CycleEvent>,

    /// Pause between the end of one cycle and the start of the next
    interval_duration: Duration,

    last_cycle: Option<Arc<CycleReport>>,

    /// Completed cycles so far
    cycles: u64,
}

impl SchedulerActor {
    pub fn new(
        engine: Arc<StatusEngine>,
        interval_duration: Duration,
        command_rx: mpsc::Receiver<SchedulerCommand>,
        event_tx: broadcast::Sender<CycleEvent>,
    ) -> Self {
        Self {
            engine,
            command_rx,
            event_tx,
            interval_duration,
            last_cycle: None,
            cycles: 0,
        }
    }

    /// Run the actor's main loop
    ///
    /// Runs until a Shutdown command is received. Dropping every handle does
    /// not stop it; the timer keeps driving cycles.
    #[instrument(skip(self), fields(interval = ?self.interval_duration))]
    pub async fn run(mut self) {
        info!("starting scheduler");

        let timer = sleep(Duration::ZERO);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                _ = &mut timer => {
                    if let Err(e) = self.run_cycle().await {
                        error!("status cycle failed: {:#}", e);
                    }
                    timer.as_mut().reset(Instant::now() + self.interval_duration);
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        SchedulerCommand::RunNow { respond_to } => {
                            debug!("received RunNow command");
                            let result = self.run_cycle().await;
                            timer.as_mut().reset(Instant::now() + self.interval_duration);
                            let _ = respond_to.send(result);
                        }

                        SchedulerCommand::LastCycle { respond_to } => {
                            let _ = respond_to.send(self.last_cycle.clone());
                        }

                        SchedulerCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }
            }
        }

        info!("scheduler stopped after {} cycles", self.cycles);
    }

    async fn run_cycle(&mut self) -> Result<Arc<CycleReport>> {
        let report = self
            .engine
            .run_cycle()
            .await
            .context("could not read the inventory")?;

        self.cycles += 1;
        let report = Arc::new(report);
        self.last_cycle = Some(Arc::clone(&report));

        let event = CycleEvent {
            cycle: self.cycles,
            report: Arc::clone(&report),
        };
        if let Ok(receivers) = self.event_tx.send(event) {
            trace!("published cycle event to {receivers} receivers");
        }

        Ok(report)
    }
}

/// Handle for controlling a SchedulerActor
///
/// Cheap to clone; every clone talks to the same actor.
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Spawn a new scheduler actor
    ///
    /// Cycle summaries are published on `event_tx`; subscribe before
    /// spawning to see the startup cycle.
    pub fn spawn(
        engine: Arc<StatusEngine>,
        interval: Duration,
        event_tx: broadcast::Sender<CycleEvent>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let interval = interval.max(Duration::from_secs(1));
        let actor = SchedulerActor::new(engine, interval, cmd_rx, event_tx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Run a cycle immediately and wait for its report
    pub async fn run_now(&self) -> Result<Arc<CycleReport>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::RunNow { respond_to: tx })
            .await
            .context("failed to send RunNow command")?;

        rx.await.context("failed to receive response")?
    }

    pub async fn last_cycle(&self) -> Result<Option<Arc<CycleReport>>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::LastCycle { respond_to: tx })
            .await
            .context("failed to send LastCycle command")?;

        rx.await.context("failed to receive response")
    }

    /// Gracefully shut down the scheduler
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(SchedulerCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
