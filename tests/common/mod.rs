use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use plantops_api::{
    app_router,
    config::AppConfig,
    db::Repositories,
    events::{self, EventSender},
    AppState,
};
use serde_json::Value;
use tower::ServiceExt;

/// Helper harness wrapping the full router over in-memory repositories.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Application seeded with the sample plant data.
    pub async fn new() -> Self {
        Self::with_repositories(Repositories::in_memory())
    }

    /// Application with every collection empty.
    #[allow(dead_code)]
    pub async fn empty() -> Self {
        Self::with_repositories(Repositories::empty())
    }

    pub fn with_repositories(repos: Repositories) -> Self {
        let cfg = AppConfig {
            environment: "test".to_string(),
            ..AppConfig::default()
        };
        let (event_sender, event_rx) = EventSender::channel(cfg.event_channel_capacity);
        let state = AppState::new(cfg, repos, event_sender);
        let event_task = tokio::spawn(events::process_events(
            event_rx,
            state.services.activities.clone(),
        ));

        Self {
            router: app_router(state.clone()),
            state,
            _event_task: event_task,
        }
    }

    /// Send a request against the router with an optional JSON body.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request_with_headers(method, uri, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Waits until the activity feed holds at least `count` entries.
    #[allow(dead_code)]
    pub async fn wait_for_activities(&self, count: usize) -> Vec<plantops_api::models::Activity> {
        for _ in 0..50 {
            let activities = self
                .state
                .services
                .activities
                .list()
                .await
                .expect("list activities");
            if activities.len() >= count {
                return activities;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("activity feed never reached {} entries", count);
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Reads a response body as JSON.
#[allow(dead_code)]
pub async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is JSON")
}

/// Reads a response body as text.
#[allow(dead_code)]
pub async fn text_body(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    String::from_utf8(bytes.to_vec()).expect("response body is UTF-8")
}
