//! `authgate` - obtain an OAuth 2.0 access token from the command line
//!
//! Reuses a cached token, refreshes it, or runs the browser flow with a
//! device flow fallback; then verifies the token and makes a demo call.

mod args;
mod console;
mod display;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use authgate_core::Authenticator;
use authgate_domain::AuthGateError;
use authgate_infra::{
    resolve_from_env, ConfigOverrides, EnvProbe, FileTokenStore, HttpClient, HttpOAuthApi,
    LoopbackCallbackListener, SystemBrowserLauncher,
};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::args::Command;
use crate::console::ConsoleReporter;

#[tokio::main]
async fn main() -> ExitCode {
    let command = match args::parse(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(err) => {
            eprintln!("Error: {err}\n\n{}", args::USAGE);
            return ExitCode::FAILURE;
        }
    };
    let overrides = match command {
        Command::Help => {
            print!("{}", args::USAGE);
            return ExitCode::SUCCESS;
        }
        Command::Run(overrides) => overrides,
    };

    // Load .env before the filter so RUST_LOG can come from it too.
    let dotenv = dotenvy::dotenv();
    init_tracing();
    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "cli.dotenv_loaded"),
        Err(err) if err.not_found() => tracing::debug!("cli.dotenv_absent"),
        Err(err) => tracing::warn!(error = %err, "cli.dotenv_invalid"),
    }

    match run(overrides).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run(overrides: ConfigOverrides) -> anyhow::Result<()> {
    let resolved = resolve_from_env(overrides)?;
    for warning in &resolved.warnings {
        eprintln!("WARNING: {warning}");
    }
    let config = Arc::new(resolved.config);
    println!("{}", display::banner(&config));

    let http = HttpClient::shared().context("failed to build HTTP client")?.clone();
    let auth = Authenticator::new(
        config.clone(),
        Arc::new(HttpOAuthApi::new(config.clone(), http)),
        Arc::new(FileTokenStore::new(&config.token_file)),
        Arc::new(EnvProbe::from_process()),
        Arc::new(LoopbackCallbackListener::new()),
        Arc::new(SystemBrowserLauncher),
        Arc::new(ConsoleReporter::new()),
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("cli.interrupted");
            on_interrupt.cancel();
        }
    });

    let authenticated = auth.authenticate(&cancel).await.context("authentication failed")?;
    println!("{}", display::source_line(authenticated.source));
    println!("{}", display::token_summary(&authenticated.record, Utc::now()));

    println!("\nVerifying token with server...");
    match auth.verify(&authenticated.record).await {
        Ok(info) => println!("Token verified successfully.\nToken info: {}", info.trim()),
        Err(err) => println!("Token verification failed: {err}"),
    }

    println!("\nDemonstrating automatic refresh on API call...");
    let original_token = authenticated.record.access_token.clone();
    match auth.call_resource(authenticated.record, &cancel).await {
        Ok((response, record)) => {
            if record.access_token != original_token {
                println!("Access token was renewed during the call.");
            }
            match display::resource_outcome(&response) {
                Ok(line) => println!("{line}"),
                Err(line) => eprintln!("{line}"),
            }
        }
        Err(AuthGateError::Cancelled) => return Err(AuthGateError::Cancelled.into()),
        Err(err) => eprintln!("API call failed: {err}"),
    }

    Ok(())
}
