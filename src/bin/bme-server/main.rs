mod args;
mod host;
mod routes;

use std::process::ExitCode;

use anyhow::{Context as _, Result};
use args::Args;
use bme_mux_monitor::config::MonitorConfig;
use bme_mux_monitor::history::HistoryStore;
use bme_mux_monitor::scheduler::{PollingScheduler, StopOutcome};
use bme_mux_monitor::sweep::SweepExecutor;
use clap::Parser as _;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

use crate::routes::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bme_mux_monitor=info,bme_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        eprintln!("{e:#}");
        return ExitCode::from(1);
    }

    ExitCode::from(0)
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let config = MonitorConfig {
        bus_number: args.bus_number,
        poll_interval: args.poll_period()?,
        history_size: args.history_size,
        timezone: args.timezone,
    };
    config.validate().context("invalid configuration")?;

    let history = HistoryStore::new(config.history_size);
    let mut scheduler = PollingScheduler::new(
        SweepExecutor::linux(&config),
        history.clone(),
        config.poll_interval,
    );

    let state = AppState {
        history,
        stats: scheduler.stats(),
    };
    let app = routes::router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;

    tracing::info!(
        bus_number = config.bus_number,
        poll_interval_s = args.poll_interval,
        history_size = config.history_size,
        listen = %args.listen,
        "starting sensor server"
    );
    scheduler.start();

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error");

    match scheduler.stop().await {
        StopOutcome::Stopped | StopOutcome::NotRunning => {
            if let Some(mut executor) = scheduler.into_sweeper() {
                executor.release();
            }
        }
        StopOutcome::TimedOut => {
            tracing::error!("sensor poller did not stop cleanly; the bus is released at exit");
        }
    }

    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
