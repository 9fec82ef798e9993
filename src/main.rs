// ABOUTME: Entry point for the exoframe CLI application.
// ABOUTME: Parses arguments, connects to the local engine and dispatches commands.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use exoframe::cleanup::CleanupOutcome;
use exoframe::config::{ServerConfig, SharedServerConfig, config_dir};
use exoframe::deploy::{DeployRequest, Orchestrator};
use exoframe::diagnostics::Diagnostics;
use exoframe::error::{Error, Result};
use exoframe::output::{Output, OutputMode};
use exoframe::plugins::PluginRegistry;
use exoframe::proxy::{ProxyOutcome, ProxyPaths, ensure_proxy_running};
use exoframe::runtime::{Runtime, connect_local};
use exoframe::secrets::{MemorySecretStore, SECRETS_FILENAME};
use exoframe::templates::TemplateRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        if !matches!(e, Error::DeployFailed) {
            eprintln!("Error: {e}");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(ServerConfig::default_path);
    let server = ServerConfig::load(&config_path)?;

    match cli.command {
        Commands::Deploy {
            dir,
            user,
            update,
            json,
        } => {
            let mode = if json {
                OutputMode::Json
            } else {
                OutputMode::Normal {
                    verbose: cli.verbose,
                }
            };
            deploy(server, &dir, &user, update, Output::new(mode)).await
        }
        Commands::Proxy => proxy(server).await,
    }
}

fn connect(server: &ServerConfig) -> Result<Arc<dyn Runtime>> {
    let runtime = connect_local(Some(&server.runtime_config()))?;
    tracing::debug!(runtime = %runtime.runtime_type(), "connected");
    Ok(Arc::new(runtime))
}

async fn deploy(
    server: ServerConfig,
    dir: &Path,
    user: &str,
    update: bool,
    output: Output,
) -> Result<()> {
    if !dir.is_dir() {
        return Err(Error::ProjectNotFound(dir.to_path_buf()));
    }
    let dir: PathBuf = dir.canonicalize()?;

    let runtime = connect(&server)?;
    let secrets = MemorySecretStore::load(&config_dir().join(SECRETS_FILENAME))?;

    let mut diagnostics = Diagnostics::default();
    let plugins = PluginRegistry::new(Vec::new(), &mut diagnostics);
    let orchestrator = Orchestrator::new(
        runtime,
        TemplateRegistry::builtin(),
        plugins,
        SharedServerConfig::new(server),
        Arc::new(secrets),
    );

    orchestrator.bootstrap_proxy(&config_dir()).await;

    let mut request = DeployRequest::new(user, &dir);
    if update {
        request = request.updating();
    }

    let mut handle = orchestrator.resolve_and_deploy(request);
    while let Some(event) = handle.events.recv().await {
        output.emit(&event);
    }
    let outcome = handle.finished.await?;
    if !outcome.succeeded {
        return Err(Error::DeployFailed);
    }

    if let Some(cleanup) = outcome.cleanup {
        match cleanup.await? {
            CleanupOutcome::Done { removed, .. } => {
                tracing::info!(removed = removed.len(), "previous deployments removed");
            }
            CleanupOutcome::Abandoned { remaining, attempts } => {
                eprintln!(
                    "Warning: {} previous deployment(s) still running after {} attempts",
                    remaining.len(),
                    attempts
                );
            }
        }
    }

    Ok(())
}

async fn proxy(server: ServerConfig) -> Result<()> {
    let runtime = connect(&server)?;
    let paths = ProxyPaths::detect(runtime.as_ref(), &config_dir()).await;
    match ensure_proxy_running(runtime.as_ref(), &server, &paths).await? {
        ProxyOutcome::Disabled => println!("Proxy management is disabled"),
        ProxyOutcome::Restarted => println!("Proxy {} restarted", server.traefik_name),
        ProxyOutcome::Created => println!("Proxy {} created", server.traefik_name),
    }
    Ok(())
}
