//! The `serve` command: run the full aggregation service.

use anyhow::{Context, Result};
use candela_service::{Config, Runtime};
use candela_types::BaseCandle;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

pub(crate) async fn run() -> Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    tracing::info!(
        symbols = ?config.symbols,
        timeframes = ?config.timeframes,
        "starting candela"
    );

    let runtime = Runtime::connect(config)
        .await
        .context("startup failed, refusing to serve")?;

    let (feed_tx, feed_rx) = mpsc::channel::<BaseCandle>(1024);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Reference feed: the stream collaborator delivers base candle
    // updates as newline-delimited JSON on stdin.
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<BaseCandle>(&line) {
                Ok(candle) => {
                    if feed_tx.send(candle).await.is_err() {
                        return;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "malformed base candle update"),
            }
        }
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    runtime.run(feed_rx, shutdown_rx).await;
    tracing::info!("candela stopped");
    Ok(())
}
