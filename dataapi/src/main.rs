use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dataapi::cli::{self, CliArgs, Command};
use dataapi::config::Config;
use dataapi::scripts::DiskScripts;
use dataapi::service::{self, Service};
use dataapi::transport::UreqTransport;

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("dataapi: {e}");
            eprintln!("Usage: dataapi [-c<config.toml>] [-r<script-root>] [-a<host:port>] [-d] [serve]");
            eprintln!("       dataapi [-c<config.toml>] [-r<script-root>] [-d] run <file-or-dir>");
            return ExitCode::from(2);
        }
    };

    install_tracing(args.debug);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("dataapi: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn install_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(args: &CliArgs) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => Config::new(),
    };
    config.apply_env().context("applying environment overrides")?;
    if let Some(root) = &args.root {
        config.scripts.root = root.clone();
    }
    if let Some(host) = &args.api_host {
        config.web.api_host = host.clone();
    }
    Ok(config)
}

async fn run(args: CliArgs) -> anyhow::Result<ExitCode> {
    let config = load_config(&args)?;
    info!(?config, "effective configuration");

    let service = Arc::new(Service::new(
        Arc::new(UreqTransport::new()),
        Arc::new(DiskScripts::new(&config.scripts.root)),
    ));

    match args.command {
        Command::Run(path) => {
            let svc = Arc::clone(&service);
            let results = tokio::task::spawn_blocking(move || svc.evaluate(&path))
                .await
                .context("evaluation task panicked")?;
            println!("Failures:");
            for line in &results.failures {
                println!("  {line}");
            }
            println!("Successes:");
            for line in &results.successes {
                println!("  {line}");
            }
            Ok(if results.failures.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Serve => {
            let listener = TcpListener::bind(&config.web.api_host)
                .await
                .with_context(|| format!("binding {}", config.web.api_host))?;
            info!(addr = %config.web.api_host, "API listening");
            service::serve(
                service,
                listener,
                config.read_timeout(),
                config.shutdown_timeout(),
                shutdown_signal(),
            )
            .await?;
            info!("shutdown complete");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
