// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! REST client for the amelia daemon.

use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use std::path::PathBuf;

const DEFAULT_URL: &str = "http://127.0.0.1:7340";

/// Workflow summary as returned by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowSummary {
    pub id: String,
    pub issue_id: String,
    pub worktree_path: PathBuf,
    pub worktree_name: String,
    pub status: String,
    #[serde(default)]
    pub current_stage: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventSummary {
    pub sequence: u64,
    pub event_type: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenSummary {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cost_usd: f64,
}

#[derive(Debug, Deserialize)]
pub struct WorkflowDetail {
    #[serde(flatten)]
    pub workflow: WorkflowSummary,
    #[serde(default)]
    pub recent_events: Vec<EventSummary>,
    #[serde(default)]
    pub tokens: TokenSummary,
}

#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

pub struct StartParams {
    pub issue_id: String,
    pub worktree_path: PathBuf,
    pub worktree_name: Option<String>,
    pub pipeline: Option<String>,
    pub driver: Option<String>,
    pub profile: Option<String>,
    pub plan_file: Option<PathBuf>,
    pub plan_content: Option<String>,
}

pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    /// Build a client against `url`, `$AMELIA_URL`, or the default.
    pub fn new(url: Option<String>) -> Result<Self> {
        let base_url = url
            .or_else(|| std::env::var("AMELIA_URL").ok())
            .unwrap_or_else(|| DEFAULT_URL.to_string());
        let base_url = base_url.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self { base_url, http })
    }

    pub async fn start(&self, params: StartParams) -> Result<WorkflowSummary> {
        let body = serde_json::json!({
            "issue_id": params.issue_id,
            "worktree_path": params.worktree_path,
            "worktree_name": params.worktree_name,
            "pipeline": params.pipeline,
            "driver": params.driver,
            "profile": params.profile,
            "plan_file": params.plan_file,
            "plan_content": params.plan_content,
        });
        let response =
            self.http.post(self.url("/workflows")).json(&body).send().await?;
        Self::parse(response).await
    }

    pub async fn approve(&self, workflow_id: &str) -> Result<StatusResponse> {
        let response = self
            .http
            .post(self.url(&format!("/workflows/{workflow_id}/approve")))
            .json(&serde_json::json!({}))
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn reject(&self, workflow_id: &str, feedback: &str) -> Result<StatusResponse> {
        let response = self
            .http
            .post(self.url(&format!("/workflows/{workflow_id}/reject")))
            .json(&serde_json::json!({ "feedback": feedback }))
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn cancel(&self, workflow_id: &str) -> Result<StatusResponse> {
        let response = self
            .http
            .post(self.url(&format!("/workflows/{workflow_id}/cancel")))
            .json(&serde_json::json!({}))
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn workflow(&self, workflow_id: &str) -> Result<WorkflowDetail> {
        let response =
            self.http.get(self.url(&format!("/workflows/{workflow_id}"))).send().await?;
        Self::parse(response).await
    }

    pub async fn active(&self) -> Result<Vec<WorkflowSummary>> {
        let response = self.http.get(self.url("/workflows/active")).send().await?;
        Self::parse(response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Decode a 2xx body, or surface the server's machine-readable error.
    async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => bail!("{} ({})", parsed.error.message, parsed.error.code),
            Err(_) => Err(anyhow!("server returned {status}: {body}")),
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
