// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `answerloop serve`
//!
//! Runs the HTTP API until Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use clap::Args;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use answerloop_core::domain::loop_config::{EscalationMode, LoopConfigManifest};
use answerloop_core::presentation::api;

use crate::embedded::{start_with, GlobalOptions};

#[derive(Args)]
pub struct ServeArgs {
    /// Bind address (default: network.bind_address)
    #[arg(long, env = "ANSWERLOOP_HOST")]
    pub host: Option<String>,

    /// HTTP API port (default: network.port)
    #[arg(long, env = "ANSWERLOOP_PORT")]
    pub port: Option<u16>,

    /// Expose Prometheus metrics on this port
    #[arg(long, env = "ANSWERLOOP_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// A server has no terminal to prompt on, so console escalation becomes the
/// HTTP escalation queue.
fn prepare_config(mut config: LoopConfigManifest) -> LoopConfigManifest {
    if config.spec.escalation.mode == EscalationMode::Console {
        warn!("Console escalation is unavailable when serving; using the escalation queue");
        config.spec.escalation.mode = EscalationMode::Queue;
    }
    config
}

pub async fn execute(args: ServeArgs, options: &GlobalOptions) -> Result<()> {
    let config = prepare_config(options.load_config()?);
    let network = config.network();
    let host = args.host.unwrap_or(network.bind_address);
    let port = args.port.unwrap_or(network.port);

    if let Some(metrics_port) = args.metrics_port {
        let metrics_addr: SocketAddr = format!("{host}:{metrics_port}")
            .parse()
            .with_context(|| format!("Invalid metrics address {host}:{metrics_port}"))?;
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Prometheus metrics on http://{}/metrics", metrics_addr);
    }

    let runtime = start_with(&config).await?;
    let _event_logger = runtime.event_bus.spawn_event_logger();
    let app = api::app(runtime.question_loop.clone(), runtime.human_input.clone());

    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(
        escalation = ?config.spec.escalation.mode,
        "answerloop API listening on {}", addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("answerloop API shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_mode_becomes_queue() {
        let config = prepare_config(LoopConfigManifest::default());
        assert_eq!(config.spec.escalation.mode, EscalationMode::Queue);

        let mut deferring = LoopConfigManifest::default();
        deferring.spec.escalation.mode = EscalationMode::Defer;
        assert_eq!(
            prepare_config(deferring).spec.escalation.mode,
            EscalationMode::Defer
        );
    }
}
