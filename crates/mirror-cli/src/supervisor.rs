//! Runs one engine per configured mirror and restarts it after failures
//!
//! A failed engine is replaced by a fresh one after a backoff delay. The new
//! engine starts over with a full read, which re-converges the directory no
//! matter how far the failed one got. Mirrors are fully independent of each
//! other.

use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use mirror_core::{MirrorEngine, MirrorEvent, StoreClient};
use mirror_fs::{DirectorySink, Sink, WriteOptions};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{Config, MirrorConfig, RestartConfig};
use crate::{CliError, Result};

struct Mirror {
    subtree: String,
    sink: Arc<dyn Sink>,
}

/// Owns every configured mirror for the life of the process.
pub struct Supervisor {
    client: Arc<dyn StoreClient>,
    mirrors: Vec<Mirror>,
    restart: RestartConfig,
    cancel: CancellationToken,
}

impl Supervisor {
    /// Validate every mirror up front so bad subtrees or targets fail fast.
    pub fn new(client: Arc<dyn StoreClient>, config: &Config) -> Result<Self> {
        let mirrors = config
            .mirrors
            .iter()
            .map(|mirror| prepare(&client, mirror))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            client,
            mirrors,
            restart: config.restart.clone(),
            cancel: CancellationToken::new(),
        })
    }

    /// Cancelling this token stops every mirror.
    pub fn stop_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until stopped.
    pub async fn run(self) -> Result<()> {
        let mut tasks = JoinSet::new();
        for mirror in self.mirrors {
            let span = tracing::info_span!("supervise", subtree = %mirror.subtree);
            tasks.spawn(
                supervise(
                    self.client.clone(),
                    mirror,
                    self.restart.clone(),
                    self.cancel.clone(),
                )
                .instrument(span),
            );
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined
                .map_err(|e| CliError::user(format!("Mirror task panicked: {}", e)))
                .and_then(|result| result);
            if let Err(e) = outcome {
                tracing::error!(error = %e, "Mirror gave up");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn prepare(client: &Arc<dyn StoreClient>, config: &MirrorConfig) -> Result<Mirror> {
    let options = WriteOptions {
        fsync: config.fsync,
    };
    let sink: Arc<dyn Sink> = Arc::new(DirectorySink::with_options(&config.target, options)?);
    MirrorEngine::new(client.clone(), &config.subtree, sink.clone())?;

    Ok(Mirror {
        subtree: config.subtree.clone(),
        sink,
    })
}

async fn supervise(
    client: Arc<dyn StoreClient>,
    mirror: Mirror,
    restart: RestartConfig,
    cancel: CancellationToken,
) -> Result<()> {
    let mut backoff = restart.backoff();
    let mut attempt: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }
        attempt += 1;

        let engine = MirrorEngine::new(client.clone(), &mirror.subtree, mirror.sink.clone())?;
        let mut handle = engine.start();
        tracing::debug!(attempt, "Mirror started");

        let cause = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                event = handle.next_event() => Some(event),
            };
            let Some(event) = next else {
                handle.stop();
                handle.join().await;
                return Ok(());
            };

            match event {
                Some(MirrorEvent::Synced) => {
                    tracing::info!(attempt, "Mirror in sync");
                    backoff.reset();
                }
                Some(MirrorEvent::Changed { cursor }) => {
                    tracing::debug!(cursor, "Mirror updated");
                }
                Some(MirrorEvent::Errored { cause }) => break cause,
                None => {
                    handle.join().await;
                    return Ok(());
                }
            }
        };
        handle.join().await;

        let delay = backoff
            .next_backoff()
            .unwrap_or_else(|| restart.max_interval());
        tracing::warn!(
            error = %cause,
            delay_ms = delay.as_millis() as u64,
            "Mirror failed; restarting"
        );
        if sleep_or_cancel(delay, &cancel).await {
            return Ok(());
        }
    }
}

/// Returns `true` if cancelled before `delay` elapsed.
async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(delay) => false,
    }
}
