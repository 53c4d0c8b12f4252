use std::any::Any;
use std::net::SocketAddr;

use axum::{
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::error::AppError;
use crate::state::AppState;
use crate::{auth, tasks, users};

pub fn build_app(state: AppState) -> Router {
    let router = Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(users::router())
                .merge(tasks::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state);
    with_layers(router)
}

/// Panic recovery, CORS and request tracing around `router`.
fn with_layers(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

/// Renders a handler panic as a regular `unknown` error.
fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    AppError::unknown(anyhow::anyhow!("handler panicked: {detail}")).into_response()
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to register SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        auth: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(value) = auth {
            req = req.header(header::AUTHORIZATION, value);
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    /// Registers `email` and returns a ready `Authorization` header value.
    async fn sign_up(app: &Router, email: &str) -> String {
        let (status, _) = send(
            app,
            Method::POST,
            "/api/v1/users",
            None,
            Some(json!({ "email": email, "password": "correct-horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = send(
            app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": email, "password": "correct-horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        format!("Bearer {}", body["access_token"].as_str().unwrap())
    }

    async fn new_task(app: &Router, auth: &str, title: &str, category: &str) -> i64 {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/v1/tasks",
            Some(auth),
            Some(json!({
                "title": title,
                "category": category,
                "start_date": "2024-02-15T10:00:00Z",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    async fn exploding_handler() -> &'static str {
        panic!("handler exploded")
    }

    #[tokio::test]
    async fn handler_panic_becomes_unknown_error() {
        let app = with_layers(Router::new().route("/boom", get(exploding_handler)));
        let (status, body) = send(&app, Method::GET, "/boom", None, None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["kind"], "unknown");
        assert_eq!(body["error"]["message"], "internal error");
        assert!(!body.to_string().contains("exploded"));
    }

    #[tokio::test]
    async fn unavailable_store_fails_closed() {
        use crate::users::memory::UnavailableUserStore;
        use std::sync::Arc;

        let fake = AppState::fake();
        let state = AppState::from_parts(
            fake.config.clone(),
            Arc::new(UnavailableUserStore),
            fake.tasks.clone(),
            fake.hasher.clone(),
        );
        let token = state.tokens.issue("a@x.com").unwrap();
        let app = build_app(state);

        let auth = format!("Bearer {token}");
        let (status, body) = send(&app, Method::GET, "/api/v1/me", Some(&auth), None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["kind"], "unknown");
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::fake());
        let (status, body) = send(&app, Method::GET, "/api/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("ok".into()));
    }

    #[tokio::test]
    async fn register_login_and_read_profile() {
        let app = build_app(AppState::fake());
        let auth = sign_up(&app, "Alice@Example.com").await;
        let (status, body) = send(&app, Method::GET, "/api/v1/me", Some(&auth), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "alice@example.com");
        assert_eq!(body["timezone"], "UTC");
        assert!(body.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let app = build_app(AppState::fake());
        sign_up(&app, "a@x.com").await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/users",
            None,
            Some(json!({ "email": "A@x.com", "password": "another-pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["kind"], "conflict");
    }

    #[tokio::test]
    async fn login_for_unknown_user_is_bad_request() {
        let app = build_app(AppState::fake());
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "ghost@x.com", "password": "whatever1" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.get("access_token").is_none());
    }

    #[tokio::test]
    async fn logout_revokes_the_token() {
        let app = build_app(AppState::fake());
        let auth = sign_up(&app, "a@x.com").await;

        let (status, body) = send(&app, Method::POST, "/api/v1/auth/logout", Some(&auth), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "revoked": true }));

        let (status, body) = send(&app, Method::GET, "/api/v1/me", Some(&auth), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["kind"], "revoked_or_mismatched_credential");
    }

    #[tokio::test]
    async fn bearer_header_handling() {
        let app = build_app(AppState::fake());
        let auth = sign_up(&app, "a@x.com").await;
        let token = auth.trim_start_matches("Bearer ");

        let (status, body) = send(&app, Method::GET, "/api/v1/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["kind"], "missing_or_malformed_credential");

        let (_, body) = send(&app, Method::GET, "/api/v1/me", Some(token), None).await;
        assert_eq!(body["error"]["kind"], "missing_or_malformed_credential");

        let (_, body) = send(&app, Method::GET, "/api/v1/me", Some("Bearer garbage"), None).await;
        assert_eq!(body["error"]["kind"], "invalid_or_expired_credential");

        let lower = format!("bearer {token}");
        let (status, _) = send(&app, Method::GET, "/api/v1/me", Some(&lower), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn password_change_drops_every_session() {
        let app = build_app(AppState::fake());
        let auth = sign_up(&app, "a@x.com").await;

        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/v1/users/me/password",
            Some(&auth),
            Some(json!({ "current_password": "wrong-one", "new_password": "brand-new-pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "bad_request");

        let (status, _) = send(
            &app,
            Method::PUT,
            "/api/v1/users/me/password",
            Some(&auth),
            Some(json!({ "current_password": "correct-horse", "new_password": "brand-new-pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, Method::GET, "/api/v1/me", Some(&auth), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "a@x.com", "password": "brand-new-pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn timezone_update_is_validated() {
        let app = build_app(AppState::fake());
        let auth = sign_up(&app, "a@x.com").await;

        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/v1/users/me",
            Some(&auth),
            Some(json!({ "timezone": "Europe/Kyiv" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["timezone"], "Europe/Kyiv");

        let (status, _) = send(
            &app,
            Method::PUT,
            "/api/v1/users/me",
            Some(&auth),
            Some(json!({ "timezone": "not a zone" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_then_get_roundtrip() {
        let app = build_app(AppState::fake());
        let auth = sign_up(&app, "a@x.com").await;
        let id = new_task(&app, &auth, "standup", "event").await;

        let (status, body) =
            send(&app, Method::GET, &format!("/api/v1/tasks/{id}"), Some(&auth), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "standup");
        assert_eq!(body["category"], "event");
        assert_eq!(body["description"], "");
        assert_eq!(body["start_date"], "2024-02-15T10:00:00Z");
    }

    #[tokio::test]
    async fn other_users_tasks_are_forbidden() {
        let app = build_app(AppState::fake());
        let alice = sign_up(&app, "alice@x.com").await;
        let bob = sign_up(&app, "bob@x.com").await;
        let id = new_task(&app, &alice, "private", "note").await;
        let uri = format!("/api/v1/tasks/{id}");

        let (status, body) = send(&app, Method::GET, &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["kind"], "access_forbidden");

        let (status, _) = send(
            &app,
            Method::PUT,
            &uri,
            Some(&bob),
            Some(json!({ "title": "hijacked" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, Method::DELETE, &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&app, Method::GET, &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "private");

        let (status, body) = send(&app, Method::DELETE, &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "deleted": true }));
    }

    #[tokio::test]
    async fn listing_filters_and_sorts_per_owner() {
        let app = build_app(AppState::fake());
        let alice = sign_up(&app, "alice@x.com").await;
        let bob = sign_up(&app, "bob@x.com").await;
        new_task(&app, &alice, "b-sync", "event").await;
        new_task(&app, &alice, "a-idea", "note").await;
        new_task(&app, &alice, "c-demo", "event").await;
        new_task(&app, &bob, "z-bob", "event").await;

        let (status, body) = send(
            &app,
            Method::GET,
            "/api/v1/tasks?category=event&order=desc&order_by=title",
            Some(&alice),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let titles: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["c-demo", "b-sync"]);

        let (_, body) = send(
            &app,
            Method::GET,
            "/api/v1/tasks?order=sideways&order_by=password",
            Some(&alice),
            None,
        )
        .await;
        let titles: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["b-sync", "a-idea", "c-demo"]);
    }

    #[tokio::test]
    async fn malformed_input_is_bad_request() {
        let app = build_app(AppState::fake());
        let auth = sign_up(&app, "a@x.com").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/tasks",
            Some(&auth),
            Some(json!({ "title": "x", "category": "meeting", "start_date": "2024-02-15T10:00:00Z" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "bad_request");

        let (status, _) =
            send(&app, Method::GET, "/api/v1/tasks/not-a-number", Some(&auth), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
