use monitor_core::{CoreError, ErrorExt, KeywordMatcher, KeywordSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Result of one keyword reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub changed: bool,
    pub empty: bool,
}

pub struct KeywordWatch {
    source: Arc<dyn KeywordSource>,
    refresh: Duration,
    idle_wait: Duration,
}

impl KeywordWatch {
    pub fn new(source: Arc<dyn KeywordSource>, refresh: Duration, idle_wait: Duration) -> Self {
        Self {
            source,
            refresh,
            idle_wait,
        }
    }

    /// Loads the active keywords and publishes them if the compiled set
    /// differs from what `tx` currently holds.
    pub async fn refresh_once(
        &self,
        tx: &watch::Sender<Arc<KeywordMatcher>>,
    ) -> Result<RefreshOutcome, CoreError> {
        let keywords = self.source.active_keywords().await?;
        let matcher = KeywordMatcher::new(keywords);
        let empty = matcher.is_empty();

        let changed = tx.send_if_modified(|current| {
            if **current == matcher {
                false
            } else {
                *current = Arc::new(matcher);
                true
            }
        });

        if changed {
            let current = tx.borrow();
            info!(
                "Active keywords changed: {:?}",
                current.keywords().collect::<Vec<_>>()
            );
        } else {
            debug!("Active keywords unchanged");
        }
        Ok(RefreshOutcome { changed, empty })
    }

    pub async fn run(self, tx: watch::Sender<Arc<KeywordMatcher>>, shutdown: CancellationToken) {
        loop {
            let wait = match self.refresh_once(&tx).await {
                Ok(outcome) if outcome.empty => {
                    info!("No active keywords, checking again in {:?}", self.idle_wait);
                    self.idle_wait
                }
                Ok(_) => self.refresh,
                Err(e) => {
                    if e.is_retryable() {
                        e.log_warn();
                    } else {
                        e.log_error();
                    }
                    self.idle_wait
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(wait) => {}
            }
        }
        debug!("Keyword watch stopped");
    }
}
