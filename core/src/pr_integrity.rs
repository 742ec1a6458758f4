//! PR-integrity collaborator contract (§6).
//!
//! A read-only lookup the close gate and execution sweeper use to
//! verify PR head SHA, merge state, and changed-file list against the
//! evidence a task carries. The engine must tolerate `Unknown` — the
//! collaborator may not be able to resolve a given URL — and policy
//! (not this trait) decides whether an `Unknown` blocks a transition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Observed state of a pull request, as reported by the PR integrity
/// collaborator. All identifiers are opaque strings; the engine
/// validates format but assumes no provider semantics beyond these
/// fields (§6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum PrState {
    Open { head_sha: String },
    Merged { head_sha: String, merged_at: chrono::DateTime<chrono::Utc> },
    ClosedUnmerged,
    Unknown,
}

/// A snapshot of a PR's integrity-relevant fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrSnapshot {
    pub pr_url: String,
    pub state: PrState,
    pub changed_files: Vec<String>,
    pub checks_passed: Option<bool>,
}

/// Collaborator contract for looking up PR state by URL.
#[async_trait]
pub trait PrIntegrityClient: Send + Sync {
    async fn fetch(&self, pr_url: &str) -> PrSnapshot;
}

/// A validated GitHub-style PR URL pattern check, used at gate 5/9
/// ingress before attempting a lookup (`.../pull/<n>`).
pub fn looks_like_pr_url(url: &str) -> bool {
    url.contains("/pull/") && url.split("/pull/").nth(1).is_some_and(|s| s.chars().take_while(|c| c.is_ascii_digit()).count() > 0)
}

/// A commit SHA prefix check (gate 5: `commit (>=7 hex)`).
pub fn looks_like_commit(commit: &str) -> bool {
    commit.len() >= 7 && commit.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pr_url_pattern() {
        assert!(looks_like_pr_url("https://github.com/acme/app/pull/7"));
        assert!(!looks_like_pr_url("https://github.com/acme/app/issues/7"));
        assert!(!looks_like_pr_url("https://github.com/acme/app/pull/"));
    }

    #[test]
    fn commit_pattern() {
        assert!(looks_like_commit("abc1234"));
        assert!(looks_like_commit("deadbeefdeadbeef"));
        assert!(!looks_like_commit("abc12")); // too short
        assert!(!looks_like_commit("xyz1234")); // not hex
    }
}
