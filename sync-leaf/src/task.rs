//! Task execution against the configured target.

use crate::config::TaskConfig;
use crate::error::{LeafError, Result};
use crate::holder::ConfigHolder;
use reqwest::header::ACCEPT;
use serde::Serialize;
use std::sync::Arc;

/// Body returned by the target.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "body", rename_all = "lowercase")]
pub enum TaskOutcome {
    /// The body did not parse as JSON.
    Text(String),
    /// The body parsed as JSON.
    Json(serde_json::Value),
}

impl TaskOutcome {
    /// Classify a response body.
    pub fn from_body(body: String) -> Self {
        match serde_json::from_str(&body) {
            Ok(value) => TaskOutcome::Json(value),
            Err(_) => TaskOutcome::Text(body),
        }
    }
}

/// Issues `GET target` for the held configuration.
#[derive(Debug, Clone)]
pub struct TaskRunner {
    client: reqwest::Client,
    holder: Arc<ConfigHolder>,
}

impl TaskRunner {
    /// Create a runner reading its target from `holder`.
    pub fn new(holder: Arc<ConfigHolder>, config: &TaskConfig) -> Result<Self> {
        if config.accept_invalid_certs {
            tracing::warn!("Task requests accept invalid TLS certificates");
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| LeafError::Task(e.to_string()))?;
        Ok(Self { client, holder })
    }

    /// Run one task. Returns [`LeafError::NotSet`] before the first push.
    pub async fn execute(&self) -> Result<TaskOutcome> {
        let target = self.holder.target().await?;

        let response = self
            .client
            .get(&target)
            .header(ACCEPT, "text/plain")
            .send()
            .await
            .map_err(|e| LeafError::Task(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LeafError::Task(e.to_string()))?;

        tracing::debug!(%target, status = status.as_u16(), bytes = body.len(), "Task completed");
        Ok(TaskOutcome::from_body(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::routing::get;
    use axum::Router;
    use sync_types::{ConfigId, PushPayload, Version};

    async fn target_server() -> String {
        let app = Router::new()
            .route("/json", get(|| async { r#"{"answer":42}"# }))
            .route("/text", get(|| async { "hello" }))
            .route(
                "/agent",
                get(|headers: HeaderMap| async move {
                    let ua = headers
                        .get("user-agent")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    let accept = headers
                        .get("accept")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    format!("{ua}|{accept}")
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn runner_for(target: String) -> TaskRunner {
        let holder = Arc::new(ConfigHolder::new());
        holder
            .apply(PushPayload {
                id: ConfigId::new(),
                version: Version::new(1),
                target,
                interval: 30,
            })
            .await;
        TaskRunner::new(holder, &TaskConfig::default()).unwrap()
    }

    #[test]
    fn json_bodies_are_parsed() {
        assert_eq!(
            TaskOutcome::from_body(r#"{"a":1}"#.into()),
            TaskOutcome::Json(serde_json::json!({"a": 1}))
        );
        assert_eq!(
            TaskOutcome::from_body("plain".into()),
            TaskOutcome::Text("plain".into())
        );
    }

    #[test]
    fn outcome_serializes_tagged() {
        let json = serde_json::to_value(TaskOutcome::Text("hi".into())).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "text", "body": "hi"}));
    }

    #[tokio::test]
    async fn unset_holder_is_not_set() {
        let runner = TaskRunner::new(Arc::new(ConfigHolder::new()), &TaskConfig::default()).unwrap();
        assert!(matches!(runner.execute().await, Err(LeafError::NotSet)));
    }

    #[tokio::test]
    async fn executes_against_target() {
        let base = target_server().await;

        let outcome = runner_for(format!("{base}/json")).await.execute().await.unwrap();
        assert_eq!(outcome, TaskOutcome::Json(serde_json::json!({"answer": 42})));

        let outcome = runner_for(format!("{base}/text")).await.execute().await.unwrap();
        assert_eq!(outcome, TaskOutcome::Text("hello".into()));
    }

    #[tokio::test]
    async fn sends_configured_headers() {
        let base = target_server().await;
        let outcome = runner_for(format!("{base}/agent")).await.execute().await.unwrap();
        assert_eq!(outcome, TaskOutcome::Text("curl/7.81.0|text/plain".into()));
    }

    #[tokio::test]
    async fn unreachable_target_is_a_task_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let runner = runner_for(format!("http://127.0.0.1:{port}/")).await;
        assert!(matches!(runner.execute().await, Err(LeafError::Task(_))));
    }
}
