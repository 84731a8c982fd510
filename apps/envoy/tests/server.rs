mod common;

use common::*;
use envoy::{
    adapters::ProtocolAdapter,
    models::SourceKind,
    orchestrator::{Orchestrator, OrchestratorSettings},
    server,
    store::{MemoryStore, Store},
};
use serde_json::Value;
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, sync::watch};

struct TestServer {
    addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<std::io::Result<()>>,
    notifier: Arc<RecordingNotifier>,
}

impl TestServer {
    async fn start(adapters: Vec<Arc<dyn ProtocolAdapter>>, store: Option<Arc<dyn Store>>) -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut orchestrator = Orchestrator::new(
            adapters,
            normalizer(),
            notifier.clone(),
            OrchestratorSettings::default(),
        );
        if let Some(store) = store {
            orchestrator = orchestrator.with_store(store);
        }

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(server::serve(listener, Arc::new(orchestrator), rx));

        Self {
            addr,
            shutdown,
            handle,
            notifier,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn stop(self) {
        self.shutdown.send(true).unwrap();
        self.handle.await.unwrap().unwrap();
    }
}

fn sources() -> Vec<Arc<dyn ProtocolAdapter>> {
    vec![
        StaticAdapter::ok(
            SourceKind::Aave,
            vec![
                aave_proposal(41, "Add wstETH", now() - hours(3)),
                aave_proposal(42, "Raise caps", now() - hours(2)),
            ],
        ),
        StaticAdapter::failing(SourceKind::Arbitrum, "GraphQL error: rate limited"),
    ]
}

#[tokio::test]
async fn serves_health_and_root() {
    let server = TestServer::start(Vec::new(), None).await;

    let health = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(health.status(), 200);
    assert_eq!(health.text().await.unwrap(), "OK");

    let root = reqwest::get(server.url("/")).await.unwrap();
    assert_eq!(root.status(), 200);
    assert_eq!(root.text().await.unwrap(), "Nothing on this page.");

    server.stop().await;
}

#[tokio::test]
async fn unknown_protocol_is_not_found() {
    let server = TestServer::start(sources(), None).await;

    let response = reqwest::get(server.url("/proposals/fetch/compound"))
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "unknown protocol `compound`");

    server.stop().await;
}

#[tokio::test]
async fn fetches_one_protocol_without_notifying() {
    let server = TestServer::start(sources(), None).await;

    let response = reqwest::get(server.url("/proposals/fetch/aave")).await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    let titles: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, vec!["Add wstETH", "Raise caps"]);
    assert_eq!(body[0]["protocol"], "Aave");
    assert_eq!(server.notifier.count(), 0);

    server.stop().await;
}

#[tokio::test]
async fn failed_fetch_is_a_bad_gateway_and_reported() {
    let server = TestServer::start(sources(), None).await;

    let response = reqwest::get(server.url("/proposals/fetch/arbitrum"))
        .await
        .unwrap();
    assert_eq!(response.status(), 502);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("rate limited"));
    assert_eq!(
        server
            .notifier
            .messages_to(envoy::notifier::Channel::Diagnostics)
            .len(),
        1
    );

    server.stop().await;
}

#[tokio::test]
async fn fetch_all_returns_the_cycle_report() {
    let server = TestServer::start(sources(), None).await;

    let response = reqwest::get(server.url("/proposals/fetch-all")).await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();

    assert_eq!(body["new"]["Aave"].as_array().unwrap().len(), 2);
    assert!(
        body["errors"]["Arbitrum"]
            .as_str()
            .unwrap()
            .contains("rate limited")
    );
    assert!(body["new"].get("Arbitrum").is_none());

    server.stop().await;
}

#[tokio::test]
async fn expiring_requires_a_store() {
    let server = TestServer::start(sources(), None).await;

    let response = reqwest::get(server.url("/proposals/expiring")).await.unwrap();
    assert_eq!(response.status(), 503);

    server.stop().await;
}

#[tokio::test]
async fn expiring_lists_recorded_proposals() {
    let store = Arc::new(MemoryStore::new());
    let mut closing = normalizer()
        .normalize(&aave_proposal(7, "Closing soon", chrono::Utc::now()))
        .unwrap();
    closing.date_expiry = Some(chrono::Utc::now() + hours(3));
    store.upsert(&closing).await.unwrap();

    let server = TestServer::start(sources(), Some(store as Arc<dyn Store>)).await;

    let response = reqwest::get(server.url("/proposals/expiring")).await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["title"], "Closing soon");

    server.stop().await;
}
