//! Wires config -> repository -> handler -> HTTP server, the same
//! assembly shape as the teacher's `create_repository`/`create_server`/
//! `initialize_app` trio, generalized to the governance handler and its
//! reqwest-backed PR-integrity client.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use database::SqliteGovRepository;
use gov_core::gate_chain::GatePolicy;
use protocol::{GovAuth, GovHandlerImpl, GovServer};

use crate::config::Config;
use crate::pr_client::ReqwestPrClient;

pub type AppHandler = GovHandlerImpl<SqliteGovRepository, ReqwestPrClient>;

pub async fn create_repository(config: &Config) -> Result<Arc<SqliteGovRepository>> {
    let database_url = config.database_url();
    ensure_database_directory(&database_url)?;

    let repository = SqliteGovRepository::new(&database_url)
        .await
        .with_context(|| format!("failed to connect to database at {database_url}"))?;
    repository.migrate().await.context("failed to run database migrations")?;

    Ok(Arc::new(repository))
}

pub fn create_pr_client(config: &Config) -> Arc<ReqwestPrClient> {
    Arc::new(ReqwestPrClient::new(
        config.pr_integrity.api_base_url.clone(),
        config.pr_integrity.api_token.clone(),
        Duration::from_secs(config.pr_integrity.request_timeout_seconds),
    ))
}

pub fn create_handler(repository: Arc<SqliteGovRepository>, pr_client: Arc<ReqwestPrClient>) -> Arc<AppHandler> {
    Arc::new(GovHandlerImpl::new(repository, pr_client, GatePolicy::default()))
}

/// Assembles the full application: repository, PR client, handler, and
/// an axum `GovServer` ready to `serve`.
pub async fn initialize_app(config: &Config) -> Result<GovServer<AppHandler>> {
    let repository = create_repository(config).await?;
    let pr_client = create_pr_client(config);
    let handler = create_handler(repository, pr_client);
    Ok(GovServer::new(handler))
}

pub fn build_auth(config: &Config) -> Arc<GovAuth> {
    Arc::new(GovAuth::new(config.server.auth_enabled))
}

/// Ensures the parent directory of a `sqlite://` database URL exists.
pub fn ensure_database_directory(database_url: &str) -> Result<()> {
    let path_part = database_url.strip_prefix("sqlite://").unwrap_or(database_url);
    if path_part == ":memory:" || path_part.is_empty() {
        return Ok(());
    }

    let path = Path::new(path_part);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create database directory: {}", parent.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn create_repository_with_in_memory_url() {
        let mut config = Config::default();
        config.database.url = Some("sqlite://:memory:".to_string());
        let repository = create_repository(&config).await;
        assert!(repository.is_ok());
    }

    #[tokio::test]
    async fn create_repository_with_custom_file_url() {
        let dir = TempDir::new().expect("tempdir");
        let db_path = dir.path().join("nested").join("gov.sqlite");
        let mut config = Config::default();
        config.database.url = Some(format!("sqlite://{}", db_path.display()));
        let repository = create_repository(&config).await;
        assert!(repository.is_ok());
        assert!(db_path.parent().unwrap().exists());
    }

    #[test]
    fn ensure_database_directory_creates_missing_parent() {
        let dir = TempDir::new().expect("tempdir");
        let db_path = dir.path().join("a").join("b").join("gov.sqlite");
        let url = format!("sqlite://{}", db_path.display());
        ensure_database_directory(&url).expect("create dirs");
        assert!(db_path.parent().unwrap().exists());
    }

    #[test]
    fn ensure_database_directory_tolerates_in_memory() {
        ensure_database_directory("sqlite://:memory:").expect("no-op for in-memory url");
    }

    #[tokio::test]
    async fn initialize_app_assembles_a_server() {
        let mut config = Config::default();
        config.database.url = Some("sqlite://:memory:".to_string());
        let server = initialize_app(&config).await;
        assert!(server.is_ok());
    }
}
