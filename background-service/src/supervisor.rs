use crate::listener::{Listener, ListenerStats};
use monitor_core::{ContentSink, FeedKind, FeedSource, KeywordMatcher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// The listener pair started for one keyword set.
struct Generation {
    id: u64,
    token: CancellationToken,
    tasks: JoinSet<ListenerStats>,
}

/// Owns the listener lifecycle. At most one generation runs at a time and
/// the previous one is fully joined before the next starts.
pub struct ListenerSupervisor {
    feed: Arc<dyn FeedSource>,
    sink: Arc<dyn ContentSink>,
    reconnect_backoff: Duration,
    current: Option<Generation>,
    started: u64,
}

impl ListenerSupervisor {
    pub fn new(
        feed: Arc<dyn FeedSource>,
        sink: Arc<dyn ContentSink>,
        reconnect_backoff: Duration,
    ) -> Self {
        Self {
            feed,
            sink,
            reconnect_backoff,
            current: None,
            started: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.current.is_some()
    }

    /// Number of generations started so far.
    pub fn generations_started(&self) -> u64 {
        self.started
    }

    /// Replaces the running generation with one for `matcher`. An empty
    /// matcher leaves nothing running.
    pub async fn apply(&mut self, matcher: Arc<KeywordMatcher>, parent: &CancellationToken) {
        self.stop_current().await;

        if matcher.is_empty() {
            info!("No active keywords, listeners stay stopped");
            return;
        }
        if parent.is_cancelled() {
            return;
        }

        self.started += 1;
        let token = parent.child_token();
        let mut tasks = JoinSet::new();
        for kind in FeedKind::ALL {
            let listener = Listener::new(
                kind,
                Arc::clone(&self.feed),
                Arc::clone(&self.sink),
                Arc::clone(&matcher),
                self.reconnect_backoff,
            );
            tasks.spawn(listener.run(token.clone()));
        }

        info!(
            "Started listener generation {} for {} keywords",
            self.started,
            matcher.len()
        );
        self.current = Some(Generation {
            id: self.started,
            token,
            tasks,
        });
    }

    /// Cancels the running generation and waits for its listeners to exit.
    pub async fn stop_current(&mut self) {
        let Some(mut generation) = self.current.take() else {
            return;
        };

        debug!("Stopping listener generation {}", generation.id);
        generation.token.cancel();
        while let Some(joined) = generation.tasks.join_next().await {
            if let Err(e) = joined {
                error!(
                    "Listener in generation {} ended abnormally: {}",
                    generation.id, e
                );
            }
        }
        info!("Listener generation {} stopped", generation.id);
    }

    /// Follows `keywords` until `shutdown` fires or the sender goes away.
    pub async fn run(
        mut self,
        mut keywords: watch::Receiver<Arc<KeywordMatcher>>,
        shutdown: CancellationToken,
    ) {
        let initial = Arc::clone(&keywords.borrow_and_update());
        if !initial.is_empty() {
            self.apply(initial, &shutdown).await;
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = keywords.changed() => {
                    if changed.is_err() {
                        debug!("Keyword channel closed");
                        break;
                    }
                    let matcher = Arc::clone(&keywords.borrow_and_update());
                    self.apply(matcher, &shutdown).await;
                }
            }
        }

        self.stop_current().await;
        debug!("Listener supervisor stopped");
    }
}
