//! Production `PrIntegrityClient`: a GitHub REST API lookup (§6).
//!
//! Mirrors the teacher's `reqwest`-backed HTTP collaborator pattern
//! (build a client once, reuse it, map transport/parse failures to a
//! tolerant fallback rather than propagating an error through the gate
//! chain). Any failure to resolve a PR — network error, unexpected
//! response shape, URL that isn't GitHub-shaped — degrades to
//! `PrState::Unknown`, which the gate chain already treats as "can't
//! confirm, policy decides".

use std::time::Duration;

use async_trait::async_trait;
use gov_core::pr_integrity::{looks_like_pr_url, PrIntegrityClient, PrSnapshot, PrState};
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

pub struct ReqwestPrClient {
    client: Client,
    api_base_url: String,
    api_token: Option<String>,
}

impl ReqwestPrClient {
    pub fn new(api_base_url: String, api_token: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("gov-server/0.3")
            .build()
            .expect("reqwest client builds with static configuration");
        Self { client, api_base_url, api_token }
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// `https://github.com/<owner>/<repo>/pull/<n>` -> `(owner, repo, n)`.
    fn parse_pr_url(pr_url: &str) -> Option<(String, String, u64)> {
        if !looks_like_pr_url(pr_url) {
            return None;
        }
        let (repo_part, rest) = pr_url.split_once("/pull/")?;
        let number: u64 = rest.chars().take_while(|c| c.is_ascii_digit()).collect::<String>().parse().ok()?;
        let mut segments: Vec<&str> = repo_part.trim_end_matches('/').rsplitn(3, '/').collect();
        if segments.len() < 2 {
            return None;
        }
        segments.reverse();
        let repo = segments.pop()?.to_string();
        let owner = segments.pop()?.to_string();
        Some((owner, repo, number))
    }
}

#[derive(Debug, Deserialize)]
struct GitHubPull {
    state: String,
    merged_at: Option<chrono::DateTime<chrono::Utc>>,
    merge_commit_sha: Option<String>,
    head: GitHubRef,
}

#[derive(Debug, Deserialize)]
struct GitHubRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitHubFile {
    filename: String,
}

#[async_trait]
impl PrIntegrityClient for ReqwestPrClient {
    async fn fetch(&self, pr_url: &str) -> PrSnapshot {
        let unknown = PrSnapshot { pr_url: pr_url.to_string(), state: PrState::Unknown, changed_files: vec![], checks_passed: None };

        let Some((owner, repo, number)) = Self::parse_pr_url(pr_url) else {
            warn!(%pr_url, "pr url is not github-shaped, returning Unknown");
            return unknown;
        };

        let pull_url = format!("{}/repos/{owner}/{repo}/pulls/{number}", self.api_base_url);
        let pull: GitHubPull = match self.authed(self.client.get(&pull_url)).send().await {
            Ok(response) if response.status().is_success() => match response.json().await {
                Ok(body) => body,
                Err(error) => {
                    warn!(%pr_url, %error, "failed to parse pull response");
                    return unknown;
                }
            },
            Ok(response) => {
                warn!(%pr_url, status = %response.status(), "pull lookup returned non-success status");
                return unknown;
            }
            Err(error) => {
                warn!(%pr_url, %error, "pull lookup request failed");
                return unknown;
            }
        };

        let state = match pull.state.as_str() {
            "open" => PrState::Open { head_sha: pull.head.sha.clone() },
            "closed" => match (pull.merged_at, pull.merge_commit_sha.or(Some(pull.head.sha.clone()))) {
                (Some(merged_at), Some(head_sha)) => PrState::Merged { head_sha, merged_at },
                _ => PrState::ClosedUnmerged,
            },
            _ => PrState::Unknown,
        };

        let files_url = format!("{}/repos/{owner}/{repo}/pulls/{number}/files", self.api_base_url);
        let changed_files = match self.authed(self.client.get(&files_url)).send().await {
            Ok(response) if response.status().is_success() => response
                .json::<Vec<GitHubFile>>()
                .await
                .map(|files| files.into_iter().map(|f| f.filename).collect())
                .unwrap_or_default(),
            _ => Vec::new(),
        };

        PrSnapshot { pr_url: pr_url.to_string(), state, changed_files, checks_passed: None }
    }
}
