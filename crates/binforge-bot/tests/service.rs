//! End to end: config → provider chain → bot → HTTP endpoint, against local
//! stand-ins for the metadata providers.

use axum::{
    Json, Router,
    extract::{Path, RawQuery},
    http::StatusCode,
    routing::get,
};
use binforge_bot::{
    config::{BotConfig, CliArgs},
    handler::{Bot, NOT_FOUND_REPLY, WAIT_REPLY},
    server::{CommandRequest, CommandResponse, router},
    store::{JsonFileStore, UserStore},
};
use clap::Parser;
use serde_json::{Value, json};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;

async fn binlist(Path(bin): Path<String>) -> (StatusCode, Json<Value>) {
    match bin.as_str() {
        "431940" => (
            StatusCode::OK,
            Json(json!({
                "scheme": "visa",
                "type": "debit",
                "brand": "Visa Classic",
                "bank": { "name": "BANCO DE CREDITO DEL PERU" },
                "country": { "name": "Peru", "alpha2": "PE" }
            })),
        ),
        "555555" => (StatusCode::TOO_MANY_REQUESTS, Json(json!({}))),
        _ => (StatusCode::NOT_FOUND, Json(json!({}))),
    }
}

async fn bintable(Path(bin): Path<String>, RawQuery(query): RawQuery) -> (StatusCode, Json<Value>) {
    if query.as_deref() != Some("api_key=test-key") {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }
    match bin.as_str() {
        "555555" => (
            StatusCode::OK,
            Json(json!({
                "scheme": "MASTERCARD",
                "type": "CREDIT",
                "level": "STANDARD",
                "bank": { "name": "Example Bank" },
                "country": { "name": "United States", "code": "US" }
            })),
        ),
        _ => (StatusCode::NOT_FOUND, Json(json!({}))),
    }
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
}

struct Harness {
    addr: SocketAddr,
    client: reqwest::Client,
    store: Arc<JsonFileStore>,
    _data: tempfile::TempDir,
}

impl Harness {
    async fn start(cooldown_ms: &str) -> Self {
        let upstream = spawn(
            Router::new()
                .route("/binlist/{bin}", get(binlist))
                .route("/bintable/v1/{bin}", get(bintable)),
        )
        .await;

        let data = tempfile::tempdir().unwrap();
        let binlist_url = format!("http://{upstream}/binlist");
        let bintable_url = format!("http://{upstream}/bintable");
        let args = CliArgs::try_parse_from([
            "binforge-bot",
            "--listen-addr",
            "127.0.0.1:0",
            "--data-dir",
            data.path().to_str().unwrap(),
            "--cooldown-ms",
            cooldown_ms,
            "--binlist-url",
            &binlist_url,
            "--bintable-url",
            &bintable_url,
            "--bintable-api-key",
            "test-key",
            "--batch-size",
            "5",
        ])
        .unwrap();
        let config = BotConfig::try_from(args).unwrap();

        let store = Arc::new(JsonFileStore::open(&config.data_dir).unwrap());
        let bot = Bot::new(
            Arc::new(config.throttle()),
            config.synthesizer(),
            config.resolver().unwrap(),
            store.clone(),
        )
        .with_batch_size(config.batch_size);

        let addr = spawn(router(Arc::new(bot))).await;
        Self {
            addr,
            client: reqwest::Client::new(),
            store,
            _data: data,
        }
    }

    async fn send(&self, caller_id: i64, text: &str) -> Option<String> {
        let resp = self
            .client
            .post(format!("http://{}/v1/commands", self.addr))
            .json(&CommandRequest {
                caller_id,
                text: text.to_owned(),
            })
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());
        resp.json::<CommandResponse>().await.unwrap().reply
    }
}

#[tokio::test]
async fn lookup_uses_the_primary_provider() {
    let h = Harness::start("0").await;
    let reply = h.send(1, "/bin 431940").await.unwrap();
    assert!(reply.contains("Issuer: BANCO DE CREDITO DEL PERU"), "{reply}");
    assert!(reply.contains("Network: visa"));
    assert!(reply.contains("Level: Visa Classic"));
}

#[tokio::test]
async fn lookup_falls_back_when_the_primary_is_rate_limited() {
    let h = Harness::start("0").await;
    let reply = h.send(1, "/bin 555555").await.unwrap();
    assert!(reply.contains("Network: MASTERCARD"), "{reply}");
    assert!(reply.contains("Country: United States (US)"));
}

#[tokio::test]
async fn unknown_bin_is_reported_without_details() {
    let h = Harness::start("0").await;
    assert_eq!(h.send(1, "/bin 999999").await.unwrap(), NOT_FOUND_REPLY);
}

#[tokio::test]
async fn activity_is_persisted_per_user() {
    let h = Harness::start("0").await;
    let reply = h.send(3, "/gen 431940|07|2031").await.unwrap();
    assert_eq!(reply.lines().skip(2).count(), 5);
    h.send(3, "/bin 431940").await.unwrap();
    h.send(3, "/addbin 431940 07 31").await.unwrap();

    let record = h.store.load(3).unwrap();
    assert_eq!(record.history.len(), 2);
    assert_eq!(record.favorites.len(), 1);
    assert!(h.store.load(4).unwrap().history.is_empty());
}

#[tokio::test]
async fn rapid_commands_are_throttled() {
    let h = Harness::start("60000").await;
    assert!(h.send(9, "/help").await.is_some());
    assert_eq!(h.send(9, "/help").await.unwrap(), WAIT_REPLY);
    assert_eq!(h.send(9, "not a command").await, None);
}
