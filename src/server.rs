//! HTTP API: follow and unfollow feeds, trigger a publish.
//!
//! Every response body is a plain-text message from the localized catalog.

use crate::messages::Messages;
use crate::publish::{items_filename_fits, Publisher, MAX_FILENAME_LEN};
use crate::storage::FeedInfo;
use crate::sync::{Registrar, RegistrationError};
use crate::util::{validate_feed_url, HostPolicy};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{any, delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

type Reply = (StatusCode, String);

#[derive(Clone)]
pub struct AppState {
    pub registrar: Registrar,
    pub publisher: Arc<Publisher>,
    pub messages: Arc<Messages>,
    pub host_policy: HostPolicy,
}

/// Body of `DELETE /unfollow`
#[derive(Debug, Deserialize)]
pub struct UnfollowRequest {
    pub url: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/follow", post(handle_follow).fallback(handle_wrong_method))
        .route("/unfollow", delete(handle_unfollow).fallback(handle_wrong_method))
        .route("/insert", any(handle_publish))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn handle_follow(
    State(state): State<AppState>,
    payload: Result<Json<FeedInfo>, JsonRejection>,
) -> Reply {
    let Json(mut feed) = match payload {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected follow request");
            return (StatusCode::BAD_REQUEST, state.messages.get("invalid_follow_req"));
        }
    };

    feed.url = feed.url.trim().to_string();
    if let Err(e) = validate_feed_url(&feed.url, state.host_policy) {
        tracing::warn!(feed = %feed.url, error = %e, "Rejected feed URL");
        return (
            StatusCode::BAD_REQUEST,
            state
                .messages
                .format("invalid_feed_url", &[("Error", e.to_string().as_str())]),
        );
    }
    // Its items file could never be written
    if !items_filename_fits(&feed.url) {
        tracing::warn!(feed = %feed.url, "Rejected feed URL too long to name its items file");
        let reason = format!("encoded URL exceeds the {MAX_FILENAME_LEN} byte filename limit");
        return (
            StatusCode::BAD_REQUEST,
            state
                .messages
                .format("invalid_feed_url", &[("Error", reason.as_str())]),
        );
    }

    match state.registrar.follow(feed).await {
        Ok(()) => (StatusCode::OK, state.messages.get("req_handle_success")),
        Err(RegistrationError::Database(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            state
                .messages
                .format("db_store_error", &[("Error", e.to_string().as_str())]),
        ),
        Err(RegistrationError::Closed) => (
            StatusCode::SERVICE_UNAVAILABLE,
            state.messages.get("service_unavailable"),
        ),
    }
}

async fn handle_unfollow(
    State(state): State<AppState>,
    payload: Result<Json<UnfollowRequest>, JsonRejection>,
) -> Reply {
    let Json(request) = match payload {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected unfollow request");
            return (StatusCode::BAD_REQUEST, state.messages.get("invalid_unfollow_req"));
        }
    };

    match state.registrar.unfollow(request.url.trim()).await {
        Ok(_) => (StatusCode::OK, state.messages.get("feed_delete_success")),
        Err(RegistrationError::Database(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            state
                .messages
                .format("feed_delete_err", &[("Error", e.to_string().as_str())]),
        ),
        Err(RegistrationError::Closed) => (
            StatusCode::SERVICE_UNAVAILABLE,
            state.messages.get("service_unavailable"),
        ),
    }
}

async fn handle_publish(State(state): State<AppState>) -> Reply {
    match state.publisher.publish().await {
        Ok(report) => (
            StatusCode::OK,
            state.messages.format(
                "publish_success",
                &[("Count", report.items_published.to_string().as_str())],
            ),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            state
                .messages
                .format("publish_failed", &[("Error", e.to_string().as_str())]),
        ),
    }
}

async fn handle_wrong_method(State(state): State<AppState>) -> Reply {
    (StatusCode::METHOD_NOT_ALLOWED, state.messages.get("method_not_impl"))
}

async fn handle_health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnfollowPolicy;
    use crate::gateway::fake::FakeGateway;
    use crate::publish::ArtifactLayout;
    use crate::storage::Database;
    use crate::sync::{PollContext, PollSettings, Supervisor};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    struct TestServer {
        base: String,
        db: Database,
        client: reqwest::Client,
    }

    async fn start(name: &str) -> TestServer {
        let db = Database::open(":memory:").await.unwrap();
        let gateway = Arc::new(FakeGateway::default());
        let supervisor = Supervisor::new(PollContext {
            db: db.clone(),
            client: reqwest::Client::new(),
            gateway: gateway.clone(),
            settings: PollSettings {
                default_interval: Duration::from_secs(300),
                min_interval: Duration::from_secs(30),
                request_timeout: Duration::from_millis(200),
            },
        });
        let (registrar, _worker) = Registrar::spawn(db.clone(), supervisor, UnfollowPolicy::Stop);
        let dir = std::env::temp_dir().join(format!("feedgate_server_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        let publisher = Arc::new(Publisher::new(
            db.clone(),
            gateway,
            ArtifactLayout::new(dir.join("feeds.json"), dir.join("items")),
        ));
        let state = AppState {
            registrar,
            publisher,
            messages: Arc::new(Messages::english()),
            host_policy: HostPolicy::AllowPrivate,
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, state, std::future::pending()));

        TestServer {
            base: format!("http://{addr}"),
            db,
            client: reqwest::Client::new(),
        }
    }

    async fn send(request: reqwest::RequestBuilder) -> (u16, String) {
        let response = request.send().await.unwrap();
        let status = response.status().as_u16();
        (status, response.text().await.unwrap())
    }

    #[tokio::test]
    async fn test_follow_registers_feed() {
        let server = start("follow").await;
        let (status, body) = send(
            server
                .client
                .post(format!("{}/follow", server.base))
                .header("content-type", "application/json")
                .body(r#"{"url":"http://example.com/feed","type":"rss","charset":""}"#),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(body, Messages::english().get("req_handle_success"));
        assert!(server.db.feed_exists("http://example.com/feed").await.unwrap());
    }

    #[tokio::test]
    async fn test_follow_rejects_malformed_json() {
        let server = start("malformed").await;
        let (status, body) = send(
            server
                .client
                .post(format!("{}/follow", server.base))
                .header("content-type", "application/json")
                .body(r#"{"url": 42}"#),
        )
        .await;

        assert_eq!(status, 400);
        assert_eq!(body, Messages::english().get("invalid_follow_req"));
        assert!(server.db.all_feeds().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_follow_rejects_non_http_url() {
        let server = start("scheme").await;
        let (status, body) = send(
            server
                .client
                .post(format!("{}/follow", server.base))
                .header("content-type", "application/json")
                .body(r#"{"url":"file:///etc/passwd","type":"rss","charset":""}"#),
        )
        .await;

        assert_eq!(status, 400);
        assert!(body.starts_with("The feed URL was rejected"));
    }

    #[tokio::test]
    async fn test_follow_rejects_url_too_long_for_items_file() {
        let server = start("long_url").await;
        let url = format!("http://example.com/rss?q={}", "x".repeat(180));
        let (status, body) = send(
            server
                .client
                .post(format!("{}/follow", server.base))
                .header("content-type", "application/json")
                .body(serde_json::json!({"url": url, "type": "rss", "charset": ""}).to_string()),
        )
        .await;

        assert_eq!(status, 400);
        assert!(body.contains("255 byte filename limit"), "{body}");
        assert!(!server.db.feed_exists(&url).await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_method_answers_not_implemented_message() {
        let server = start("method").await;
        let (status, body) = send(server.client.get(format!("{}/follow", server.base))).await;
        assert_eq!(status, 405);
        assert_eq!(body, Messages::english().get("method_not_impl"));

        let (status, _) = send(server.client.post(format!("{}/unfollow", server.base))).await;
        assert_eq!(status, 405);
    }

    #[tokio::test]
    async fn test_unfollow_removes_feed() {
        let server = start("unfollow").await;
        send(
            server
                .client
                .post(format!("{}/follow", server.base))
                .header("content-type", "application/json")
                .body(r#"{"url":"http://example.com/feed","type":"atom","charset":"utf-8"}"#),
        )
        .await;

        let (status, body) = send(
            server
                .client
                .delete(format!("{}/unfollow", server.base))
                .header("content-type", "application/json")
                .body(r#"{"url":"http://example.com/feed"}"#),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(body, Messages::english().get("feed_delete_success"));
        assert!(!server.db.feed_exists("http://example.com/feed").await.unwrap());
    }

    #[tokio::test]
    async fn test_unfollow_rejects_missing_url() {
        let server = start("unfollow_bad").await;
        let (status, body) = send(
            server
                .client
                .delete(format!("{}/unfollow", server.base))
                .header("content-type", "application/json")
                .body("{}"),
        )
        .await;

        assert_eq!(status, 400);
        assert_eq!(body, Messages::english().get("invalid_unfollow_req"));
    }

    #[tokio::test]
    async fn test_insert_publishes_with_any_method() {
        let server = start("insert").await;
        let (status, body) = send(server.client.get(format!("{}/insert", server.base))).await;
        assert_eq!(status, 200);
        assert_eq!(body, "Published the feed list and 0 item lists.");

        let (status, _) = send(server.client.put(format!("{}/insert", server.base))).await;
        assert_eq!(status, 200);
    }

    #[tokio::test]
    async fn test_health() {
        let server = start("health").await;
        let (status, body) = send(server.client.get(format!("{}/health", server.base))).await;
        assert_eq!(status, 200);
        assert_eq!(body, "ok");
    }
}
