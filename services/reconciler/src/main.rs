//! Reconciliation job: compares the expected inventory list with the asset store.
//!
//! # Usage
//!
//! ```bash
//! # Admin HTTP surface, plus scheduled runs when RECON_INTERVAL_SECS is set
//! reconciler serve
//!
//! # One run against a given file; exits 1 on failure
//! reconciler run-once --file data/expected_inventory.csv
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sea_orm::Database;
use tokio::sync::watch;
use tracing::{error, info, warn};

use stockroom_core::tracing::init_tracing;

use stockroom_reconciler::config::ReconcilerConfig;
use stockroom_reconciler::router::build_router;
use stockroom_reconciler::schedule::spawn_schedule;
use stockroom_reconciler::state::AppState;
use stockroom_reconciler::usecase::run::ExpectedSource;

#[derive(Parser)]
#[command(about = "Reconcile the asset store against the expected inventory list")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the admin HTTP surface until SIGINT/SIGTERM
    Serve,
    /// Run one reconciliation and print the report summary
    RunOnce {
        /// Expected inventory file (.csv or .json); defaults to EXPECTED_INVENTORY_PATH
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing("info,stockroom_reconciler=debug");

    let args = Args::parse();
    let config = ReconcilerConfig::from_env();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");
    let state = AppState {
        db,
        expected_inventory_path: config.expected_inventory_path.clone(),
    };

    match args.command {
        Command::Serve => {
            serve(state, &config).await;
            ExitCode::SUCCESS
        }
        Command::RunOnce { file } => run_once(&state, file).await,
    }
}

async fn run_once(state: &AppState, file: Option<PathBuf>) -> ExitCode {
    let source = file.map_or(ExpectedSource::Default, ExpectedSource::File);
    match state.run_usecase().execute(source).await {
        Ok(run) => {
            println!(
                "report {} at {}: {} ({} discrepancies)",
                run.report.id,
                run.report.run_at.to_rfc3339(),
                run.report.status.as_str(),
                run.discrepancies.len()
            );
            for d in &run.discrepancies {
                println!("  {:<20} {}", d.kind(), d.key());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, kind = e.kind(), "reconciliation failed");
            eprintln!("reconciliation failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(state: AppState, config: &ReconcilerConfig) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let schedule = config.run_interval.map(|period| {
        info!(every_secs = period.as_secs(), "scheduled reconciliation enabled");
        let state = state.clone();
        spawn_schedule(period, shutdown_rx, move || {
            let usecase = state.run_usecase();
            async move { usecase.execute(ExpectedSource::Default).await.map(|_| ()) }
        })
    });

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.reconciler_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("reconciler listening on {addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    if let Some(handle) = schedule {
        let _ = shutdown_tx.send(true);
        if let Err(e) = handle.await {
            warn!(error = %e, "reconciliation schedule task failed");
        }
    }
    info!("reconciler stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
