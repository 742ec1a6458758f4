mod config;
mod pr_client;
mod scheduler;
mod setup;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use config::Config;

/// Governance-core HTTP server: REST surface over the task/reflection/
/// insight/webhook engine, with a background scheduler driving watchdog
/// ticks and webhook retries.
#[derive(Parser, Debug)]
#[command(name = "gov-server", version, about = "Governance-core HTTP server")]
struct Cli {
    /// Start the server (required; present so a bare invocation prints --help)
    #[arg(long)]
    start: bool,

    /// Port to listen on (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(long)]
    listen_addr: Option<String>,

    /// Path to a config file (TOML)
    #[arg(long)]
    config: Option<String>,

    /// Database URL (overrides config), e.g. sqlite:///path/to/gov.sqlite
    #[arg(long)]
    database_url: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long)]
    log_level: Option<String>,

    /// Require a bearer token on every request
    #[arg(long)]
    auth: bool,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path).context("failed to load config file")?,
        None => Config::from_env().context("failed to load configuration from environment")?,
    };

    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(listen_addr) = &cli.listen_addr {
        config.server.listen_addr = listen_addr.clone();
    }
    if let Some(database_url) = &cli.database_url {
        config.database.url = Some(database_url.clone());
    }
    if let Some(log_level) = &cli.log_level {
        config.logging.level = log_level.clone();
    }
    if cli.auth {
        config.server.auth_enabled = true;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();

    let cli = Cli::parse();

    if !cli.start {
        eprintln!("pass --start to run the server (see --help for options)");
        std::process::exit(1);
    }

    let config = load_config(&cli)?;

    telemetry::init_telemetry(&config.logging).context("failed to initialize telemetry")?;
    telemetry::log_config_validation(&config);
    config.validate().context("invalid configuration")?;
    telemetry::log_startup_info(&config);

    let repository = setup::create_repository(&config).await.context("failed to initialize database")?;
    let pr_client = setup::create_pr_client(&config);
    let handler = setup::create_handler(repository.clone(), pr_client);

    scheduler::spawn_all(handler.clone(), repository.clone(), &config.scheduler);

    let auth = setup::build_auth(&config);
    let server = protocol::GovServer::new(handler);
    let app = server.create_router_with_auth(auth);

    let server_addr = config.server_address();
    info!(address = %server_addr, "governance server ready");

    let listener = tokio::net::TcpListener::bind(&server_addr)
        .await
        .with_context(|| format!("failed to bind {server_addr}"))?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = shutdown_tx.send(());
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
            telemetry::log_shutdown_info();
        })
        .await
        .context("server error")?;

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received ctrl-c");
}
