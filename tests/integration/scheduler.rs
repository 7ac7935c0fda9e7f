//! Scheduler actor driving real cycles

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use server_inventory::{
    ServerStatus, StatusEngine,
    actors::{CycleEvent, SchedulerHandle},
    storage::{MemoryStore, StatusStore},
};
use tokio::sync::broadcast;

use crate::helpers::*;

async fn next_event(events: &mut broadcast::Receiver<CycleEvent>) -> CycleEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("no cycle within 5s")
        .unwrap()
}

#[tokio::test]
async fn test_scheduler_repeats_cycles() {
    let (store, engine) = memory_engine();
    let server = store
        .create_server(create_test_server("web", ONLINE_PORT, None))
        .await
        .unwrap();

    let (event_tx, mut events) = broadcast::channel(16);
    let scheduler = SchedulerHandle::spawn(engine, Duration::from_secs(1), event_tx);

    let first = next_event(&mut events).await;
    let second = next_event(&mut events).await;

    assert_eq!(first.cycle, 1);
    assert_eq!(second.cycle, 2);
    assert!(second.report.started_at >= first.report.finished_at);

    let server = store.get_server(server.id).await.unwrap().unwrap();
    assert_eq!(server.status, ServerStatus::Online);

    scheduler.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_scheduler_survives_panicking_check() {
    let (store, engine) = memory_engine();
    store
        .create_server(create_test_server("broken", PANIC_PORT, None))
        .await
        .unwrap();

    let (event_tx, mut events) = broadcast::channel(16);
    let scheduler = SchedulerHandle::spawn(engine, Duration::from_secs(1), event_tx);

    let first = next_event(&mut events).await;
    assert_eq!(first.report.failures, 1);
    assert_eq!(first.report.count_servers(ServerStatus::Error), 1);

    // still alive and answering commands
    let report = scheduler.run_now().await.unwrap();
    assert_eq!(report.failures, 1);

    scheduler.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_run_now_is_recorded_as_last_cycle() {
    let store = Arc::new(MemoryStore::new());
    let engine = Arc::new(StatusEngine::new(store.clone(), Arc::new(StubProber), 4));
    let (event_tx, _events) = broadcast::channel(16);
    let scheduler = SchedulerHandle::spawn(engine, Duration::from_secs(3600), event_tx);

    store
        .create_server(create_test_server("late", ONLINE_PORT, None))
        .await
        .unwrap();
    let report = scheduler.run_now().await.unwrap();
    assert_eq!(report.count_servers(ServerStatus::Online), 1);

    let last = scheduler.last_cycle().await.unwrap().unwrap();
    assert_eq!(last.servers.len(), 1);

    scheduler.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_scheduler_pauses_full_interval_after_slow_cycle() {
    let store = Arc::new(MemoryStore::new());
    let checker = Arc::new(SlowChecker(Duration::from_millis(1500)));
    let engine = Arc::new(StatusEngine::new(store.clone(), checker, 4));
    store
        .create_server(create_test_server("slow", ONLINE_PORT, None))
        .await
        .unwrap();

    let (event_tx, mut events) = broadcast::channel(16);
    let scheduler = SchedulerHandle::spawn(engine, Duration::from_secs(1), event_tx);

    let first = next_event(&mut events).await;
    let second = next_event(&mut events).await;

    // each cycle outlasts the interval, the next one still waits a full second
    let pause = second.report.started_at - first.report.finished_at;
    assert!(
        pause.num_milliseconds() >= 900,
        "next cycle started {}ms after the previous one finished",
        pause.num_milliseconds()
    );

    scheduler.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_run_now_restarts_the_interval() {
    let (store, engine) = memory_engine();
    store
        .create_server(create_test_server("web", ONLINE_PORT, None))
        .await
        .unwrap();

    let (event_tx, mut events) = broadcast::channel(16);
    let scheduler = SchedulerHandle::spawn(engine, Duration::from_secs(2), event_tx);

    next_event(&mut events).await;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let manual = scheduler.run_now().await.unwrap();
    // the manual cycle is broadcast too
    next_event(&mut events).await;

    let scheduled = next_event(&mut events).await;
    let pause = scheduled.report.started_at - manual.finished_at;
    assert!(
        pause.num_milliseconds() >= 1800,
        "scheduled cycle started {}ms after the manual one",
        pause.num_milliseconds()
    );

    scheduler.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_scheduler_keeps_running_after_storage_failure() {
    let store = Arc::new(FailingStore::failing_listings(1));
    let engine = Arc::new(StatusEngine::new(store.clone(), Arc::new(StubProber), 4));
    let server = store
        .create_server(create_test_server("web", ONLINE_PORT, None))
        .await
        .unwrap();

    let (event_tx, mut events) = broadcast::channel(16);
    let scheduler = SchedulerHandle::spawn(engine, Duration::from_secs(1), event_tx);

    // the failed first cycle is not counted or broadcast
    let event = next_event(&mut events).await;
    assert_eq!(event.cycle, 1);
    assert_eq!(event.report.count_servers(ServerStatus::Online), 1);
    assert_eq!(store.failing_listings.load(Ordering::SeqCst), 0);

    let server = store.get_server(server.id).await.unwrap().unwrap();
    assert_eq!(server.status, ServerStatus::Online);

    scheduler.shutdown().await.unwrap();
}
