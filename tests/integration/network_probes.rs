//! End-to-end cycles against real sockets
//!
//! HTTP targets are served by wiremock, TCP targets by a local listener.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use server_inventory::{
    ApplicationStatus, ServerKind, ServerStatus, StatusEngine,
    config::PingPolicy,
    models::NewServer,
    monitors::NetworkProber,
    storage::{MemoryStore, StatusStore},
};
use tokio::net::TcpListener;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

fn server(
    name: &str,
    hostname: &str,
    port: i64,
    kind: ServerKind,
    app: Option<i64>,
) -> NewServer {
    NewServer {
        name: name.to_string(),
        hostname: hostname.to_string(),
        port,
        kind,
        owner_name: None,
        application_id: app,
    }
}

fn network_engine(store: Arc<MemoryStore>) -> StatusEngine {
    let prober = NetworkProber::new(Duration::from_secs(2), PingPolicy::Disabled).unwrap();
    StatusEngine::new(store, Arc::new(prober), 8)
}

#[tokio::test]
async fn test_mixed_inventory_cycle() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;
    let http_port = i64::from(mock_server.address().port());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let tcp_port = i64::from(listener.local_addr().unwrap().port());
    let closed = i64::from(closed_port().await);

    let store = Arc::new(MemoryStore::new());
    let app = store
        .create_application(create_test_application("shop"))
        .await
        .unwrap();

    let web = store
        .create_server(server(
            "web",
            "127.0.0.1",
            http_port,
            ServerKind::from_label("web"),
            Some(app.id),
        ))
        .await
        .unwrap();
    let db = store
        .create_server(server(
            "db",
            "127.0.0.1",
            tcp_port,
            ServerKind::from_label("postgres"),
            Some(app.id),
        ))
        .await
        .unwrap();
    let cache = store
        .create_server(server(
            "cache",
            "127.0.0.1",
            closed,
            ServerKind::Tcp,
            Some(app.id),
        ))
        .await
        .unwrap();
    let bogus = store
        .create_server(server(
            "bogus",
            "127.0.0.1",
            70000,
            ServerKind::Tcp,
            None,
        ))
        .await
        .unwrap();

    let report = network_engine(store.clone()).run_cycle().await.unwrap();
    assert_eq!(report.failures, 0);

    let web = store.get_server(web.id).await.unwrap().unwrap();
    assert_eq!(web.status, ServerStatus::Online);
    assert_eq!(web.message, "http check returned status 200");

    let db = store.get_server(db.id).await.unwrap().unwrap();
    assert_eq!(db.status, ServerStatus::Online);
    assert_eq!(db.message, format!("tcp connection successful on port {tcp_port}"));
    assert_eq!(db.kind.label(), "postgres");

    let cache = store.get_server(cache.id).await.unwrap().unwrap();
    assert_eq!(cache.status, ServerStatus::Offline);

    let bogus = store.get_server(bogus.id).await.unwrap().unwrap();
    assert_eq!(bogus.status, ServerStatus::Offline);
    assert_eq!(bogus.message, "invalid hostname or port");

    let app = store.get_application(app.id).await.unwrap().unwrap();
    assert_eq!(app.status, ApplicationStatus::Partial);
    assert_eq!(app.message, "2/3 servers online");
}

#[tokio::test]
async fn test_unresolvable_host_is_offline_within_timeout() {
    let store = Arc::new(MemoryStore::new());
    let ghost = store
        .create_server(server(
            "ghost",
            "no-such-host.invalid",
            80,
            ServerKind::Tcp,
            None,
        ))
        .await
        .unwrap();
    let engine = network_engine(store.clone());

    let started = Instant::now();
    let check = engine.test_one_server(ghost.id).await.unwrap();

    // resolution is bounded by the 2s probe timeout
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(check.status, ServerStatus::Offline);
    assert!(check.persisted);

    let ghost = store.get_server(ghost.id).await.unwrap().unwrap();
    assert_eq!(ghost.status, ServerStatus::Offline);
    assert!(
        ghost.message.contains("no-such-host.invalid"),
        "unexpected message: {}",
        ghost.message
    );
}
