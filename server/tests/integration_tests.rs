use gov_server::config::{Config, DatabaseConfig, LogFormat, LoggingConfig, PrIntegrityConfig, SchedulerConfig, ServerConfig};
use gov_server::setup::{create_repository, ensure_database_directory};
use std::env;
use std::time::Duration;
use tempfile::TempDir;

fn scheduler_defaults() -> SchedulerConfig {
    Config::default().scheduler
}

fn pr_integrity_defaults() -> PrIntegrityConfig {
    Config::default().pr_integrity
}

#[tokio::test]
async fn server_starts_up_against_a_fresh_sqlite_file() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let database_url = format!("sqlite://{}", db_path.display());

    let config = Config {
        database: DatabaseConfig { url: Some(database_url), max_connections: 5, connection_timeout: 30 },
        server: ServerConfig { listen_addr: "127.0.0.1".to_string(), port: 3000, workers: 4, auth_enabled: false },
        logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Pretty },
        scheduler: scheduler_defaults(),
        pr_integrity: pr_integrity_defaults(),
    };

    let repo = create_repository(&config).await;
    assert!(repo.is_ok(), "Failed to create repository: {:?}", repo.err());
}

#[test]
fn default_configuration_is_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.server.listen_addr, "127.0.0.1");
    assert_eq!(config.server.port, 3000);
    assert!(!config.server.auth_enabled);
}

#[test]
fn standard_env_vars_override_config_file_values() {
    env::set_var("DATABASE_URL", "sqlite://test_env.db");
    env::set_var("LISTEN_ADDR", "0.0.0.0");
    env::set_var("LOG_LEVEL", "debug");

    let config = Config::from_env().expect("config should build from env");

    assert_eq!(config.database.url, Some("sqlite://test_env.db".to_string()));
    assert_eq!(config.server.listen_addr, "0.0.0.0");
    assert_eq!(config.logging.level, "debug");

    env::remove_var("DATABASE_URL");
    env::remove_var("LISTEN_ADDR");
    env::remove_var("LOG_LEVEL");
}

#[test]
fn default_database_path_resolves_to_a_sqlite_url() {
    let config = Config::default();
    let url = config.database_url();
    assert!(url.starts_with("sqlite://"));
    assert!(url.contains(".sqlite"));
}

#[test]
fn ensure_database_directory_creates_missing_subdir() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("subdir").join("test.db");
    let database_url = format!("sqlite://{}", db_path.display());

    let result = ensure_database_directory(&database_url);
    assert!(result.is_ok());
    assert!(db_path.parent().unwrap().exists());
}

#[test]
fn config_validation_rejects_every_bad_field_in_turn() {
    let mut config = Config::default();

    config.logging.level = "invalid".to_string();
    assert!(config.validate().is_err());

    config.logging.level = "info".to_string();
    config.database.url = Some("postgres://invalid".to_string());
    assert!(config.validate().is_err());

    config.database.url = None;
    config.server.port = 0;
    assert!(config.validate().is_err());

    config.server.port = 3000;
    config.server.workers = 0;
    assert!(config.validate().is_err());

    config.server.workers = 4;
    config.database.max_connections = 0;
    assert!(config.validate().is_err());

    config.database.max_connections = 5;
    config.scheduler.webhook_retry_seconds = 0;
    assert!(config.validate().is_err());
}

#[test]
fn server_address_combines_listen_addr_and_port() {
    let config = Config {
        database: DatabaseConfig { url: None, max_connections: 5, connection_timeout: 30 },
        server: ServerConfig { listen_addr: "0.0.0.0".to_string(), port: 8080, workers: 2, auth_enabled: true },
        logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Json },
        scheduler: scheduler_defaults(),
        pr_integrity: pr_integrity_defaults(),
    };

    assert_eq!(config.server_address(), "0.0.0.0:8080");
}

#[tokio::test]
async fn repository_creation_runs_migrations_and_creates_the_file() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("migration_test.db");
    let database_url = format!("sqlite://{}", db_path.display());

    let config = Config {
        database: DatabaseConfig { url: Some(database_url), max_connections: 3, connection_timeout: 15 },
        server: ServerConfig { listen_addr: "127.0.0.1".to_string(), port: 3000, workers: 4, auth_enabled: false },
        logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Pretty },
        scheduler: scheduler_defaults(),
        pr_integrity: pr_integrity_defaults(),
    };

    let repo = create_repository(&config).await;
    assert!(repo.is_ok());
    assert!(db_path.exists());
}

#[tokio::test]
async fn multiple_repository_instances_can_share_a_database_file() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("multi_test.db");
    let database_url = format!("sqlite://{}", db_path.display());

    let config = Config {
        database: DatabaseConfig { url: Some(database_url), max_connections: 10, connection_timeout: 30 },
        server: ServerConfig { listen_addr: "127.0.0.1".to_string(), port: 3000, workers: 4, auth_enabled: false },
        logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Pretty },
        scheduler: scheduler_defaults(),
        pr_integrity: pr_integrity_defaults(),
    };

    let repo1 = create_repository(&config).await;
    let repo2 = create_repository(&config).await;

    assert!(repo1.is_ok());
    assert!(repo2.is_ok());
}

#[test]
fn pr_integrity_timeout_defaults_are_sane() {
    let defaults = pr_integrity_defaults();
    assert!(Duration::from_secs(defaults.request_timeout_seconds) <= Duration::from_secs(30));
}
