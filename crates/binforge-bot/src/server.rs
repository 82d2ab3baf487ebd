//! HTTP transport for chat commands.
//!
//! - `POST /v1/commands` takes `{"caller_id": i64, "text": string}` and answers
//!   `{"reply": string | null}`. A `null` reply means the text was not a
//!   command and nothing should be sent back.
//! - `GET /healthz` answers `ok` while the process is serving.

use crate::handler::Bot;
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use binforge::CallerId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub caller_id: CallerId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub reply: Option<String>,
}

pub fn router(bot: Arc<Bot>) -> Router {
    Router::new()
        .route("/v1/commands", post(command))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(bot)
}

async fn command(
    State(bot): State<Arc<Bot>>,
    Json(req): Json<CommandRequest>,
) -> Json<CommandResponse> {
    let reply = bot.handle(req.caller_id, &req.text).await;
    Json(CommandResponse { reply })
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use binforge::{Resolver, Synthesizer, ThreadRandom, Throttle};
    use core::time::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        let bot = Bot::new(
            Arc::new(Throttle::new(Duration::ZERO)),
            Synthesizer::new(ThreadRandom),
            Resolver::new(),
            Arc::new(MemoryStore::default()),
        );
        router(Arc::new(bot))
    }

    async fn post_command(app: Router, body: &str) -> (StatusCode, Vec<u8>) {
        let resp = app
            .oneshot(
                Request::post("/v1/commands")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_owned()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn command_gets_a_reply() {
        let (status, body) =
            post_command(app(), r#"{"caller_id": 7, "text": "/gen 431940|05|2030|999"}"#).await;
        assert_eq!(status, StatusCode::OK);

        let resp: CommandResponse = serde_json::from_slice(&body).unwrap();
        let reply = resp.reply.unwrap();
        assert!(reply.lines().skip(2).all(|l| l.ends_with("|05|30|999")), "{reply}");
    }

    #[tokio::test]
    async fn plain_text_gets_a_null_reply() {
        let (status, body) = post_command(app(), r#"{"caller_id": 7, "text": "hi"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&body).unwrap(),
            serde_json::json!({ "reply": null })
        );
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let (status, _) = post_command(app(), r#"{"text": "/help"}"#).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn health_check() {
        let resp = app()
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }
}
