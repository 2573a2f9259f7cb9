//! mcplink - OAuth2-PKCE client for remote MCP services
//!
//! Main entry point: parses the deployment selector, runs the connect
//! sequence, and writes the run report. The report is persisted on every
//! outcome, including interrupts.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mcplink::auth::flow::{AuthorizerConfig, PkceAuthorizer};
use mcplink::cli::Cli;
use mcplink::config::Config;
use mcplink::output::RunReport;
use mcplink::store::FileStore;
use mcplink::McpClient;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("failed to load configuration: {e:#}");
            std::process::exit(1);
        }
    };
    if let Err(e) = config.validate() {
        tracing::error!("invalid configuration: {e:#}");
        std::process::exit(1);
    }

    let (deployment, base_url) = match config.resolve_deployment(cli.deployment.as_deref()) {
        Ok(resolved) => resolved,
        Err(e) => {
            tracing::error!("{e:#}");
            std::process::exit(1);
        }
    };

    tracing::info!(deployment = %deployment, url = %base_url, "contacting deployment");

    let output_path = cli
        .output
        .unwrap_or_else(|| PathBuf::from(format!("output-{deployment}.json")));
    let mut report = RunReport::new(&deployment, &base_url);

    let http = match reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.service.connect_timeout_seconds))
        .build()
    {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!("failed to build HTTP client: {e}");
            std::process::exit(1);
        }
    };

    let store = Arc::new(FileStore::new(credential_dir()));
    let authorizer = Arc::new(PkceAuthorizer::new(
        Arc::clone(&http),
        store,
        AuthorizerConfig {
            deployment: deployment.clone(),
            base_url: base_url.clone(),
            client_name: config.service.client_name.clone(),
            callback_port: config.service.callback_port,
            callback_timeout: Duration::from_secs(config.service.callback_timeout_seconds),
        },
    ));

    let mut client = McpClient::new(Arc::clone(&http), base_url, authorizer);

    // An interrupt persists whatever has been gathered so far; in-flight
    // calls are not aborted beyond being dropped here.
    let outcome = tokio::select! {
        result = client.connect() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    match outcome {
        None => {
            tracing::info!("interrupted, saving report");
            save_report(&report, &output_path);
        }
        Some(Ok(())) => {
            if let Some(session_id) = client.session_id() {
                report.record_session(session_id);
            }
            report.record_tools(client.tools());
            save_report(&report, &output_path);
            tracing::info!(
                tools = client.tools().len(),
                report = %output_path.display(),
                "connected, report saved"
            );
        }
        Some(Err(e)) => {
            tracing::error!("connection failed: {e:#}");
            report.record_error(&format!("{e:#}"));
            save_report(&report, &output_path);
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "mcplink=debug" } else { "mcplink=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Per-user directory holding the persisted credential records.
fn credential_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "xbcsmith", "mcplink")
        .map(|dirs| dirs.data_dir().join("credentials"))
        .unwrap_or_else(|| PathBuf::from(".mcplink/credentials"))
}

/// Best-effort report persistence; failures are logged, not fatal.
fn save_report(report: &RunReport, path: &std::path::Path) {
    if let Err(e) = report.save(path) {
        tracing::error!("failed to save report to {}: {e:#}", path.display());
    }
}
