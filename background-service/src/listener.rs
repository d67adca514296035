use monitor_core::{
    ContentItem, ContentSink, FeedKind, FeedSource, InsertOutcome, KeywordMatcher,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    NotMatched,
    Inserted,
    Duplicate,
    Failed,
}

/// Counters for one listener over one generation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ListenerStats {
    pub seen: u64,
    pub matched: u64,
    pub inserted: u64,
    pub duplicate: u64,
    pub failed: u64,
    pub reconnects: u64,
}

impl ListenerStats {
    pub fn record(&mut self, outcome: ItemOutcome) {
        self.seen += 1;
        match outcome {
            ItemOutcome::NotMatched => {}
            ItemOutcome::Inserted => {
                self.matched += 1;
                self.inserted += 1;
            }
            ItemOutcome::Duplicate => {
                self.matched += 1;
                self.duplicate += 1;
            }
            ItemOutcome::Failed => {
                self.matched += 1;
                self.failed += 1;
            }
        }
    }
}

pub struct Listener {
    kind: FeedKind,
    feed: Arc<dyn FeedSource>,
    sink: Arc<dyn ContentSink>,
    matcher: Arc<KeywordMatcher>,
    reconnect_backoff: Duration,
}

impl Listener {
    pub fn new(
        kind: FeedKind,
        feed: Arc<dyn FeedSource>,
        sink: Arc<dyn ContentSink>,
        matcher: Arc<KeywordMatcher>,
        reconnect_backoff: Duration,
    ) -> Self {
        Self {
            kind,
            feed,
            sink,
            matcher,
            reconnect_backoff,
        }
    }

    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    /// Stores `item` if it matches. Insert failures are logged and reported,
    /// never propagated.
    pub async fn process_item(&self, item: &ContentItem) -> ItemOutcome {
        if !self.matcher.matches_any(item.matchable_fields()) {
            return ItemOutcome::NotMatched;
        }

        match self.sink.insert_content(item).await {
            Ok(InsertOutcome::Inserted) => {
                info!(
                    "Stored {} {} from r/{}",
                    item.type_tag(),
                    item.id(),
                    item.subreddit()
                );
                ItemOutcome::Inserted
            }
            Ok(InsertOutcome::Duplicate) => {
                debug!("{} {} already stored", item.type_tag(), item.id());
                ItemOutcome::Duplicate
            }
            Err(e) => {
                error!("Failed to store {} {}: {}", item.type_tag(), item.id(), e);
                ItemOutcome::Failed
            }
        }
    }

    /// Follows the feed until `cancel` fires. Feed errors lead to a fixed
    /// pause and a fresh subscription.
    pub async fn run(self, cancel: CancellationToken) -> ListenerStats {
        let mut stats = ListenerStats::default();
        info!(
            "Starting {} listener for {} keywords",
            self.kind,
            self.matcher.len()
        );

        'listen: loop {
            let subscribed = tokio::select! {
                _ = cancel.cancelled() => break 'listen,
                result = self.feed.subscribe(self.kind) => result,
            };

            match subscribed {
                Ok(mut subscription) => loop {
                    let batch = tokio::select! {
                        _ = cancel.cancelled() => break 'listen,
                        batch = subscription.next_batch() => batch,
                    };

                    match batch {
                        Ok(items) => {
                            for item in &items {
                                stats.record(self.process_item(item).await);
                            }
                        }
                        Err(e) => {
                            error!("{} stream failed: {}", self.kind, e);
                            break;
                        }
                    }
                },
                Err(e) => {
                    error!("Failed to subscribe to {}: {}", self.kind, e);
                }
            }

            stats.reconnects += 1;
            warn!(
                "Reconnecting {} listener in {:?}",
                self.kind, self.reconnect_backoff
            );
            tokio::select! {
                _ = cancel.cancelled() => break 'listen,
                _ = sleep(self.reconnect_backoff) => {}
            }
        }

        info!(
            "Stopped {} listener: seen {}, matched {}, inserted {}, duplicate {}, failed {}, reconnects {}",
            self.kind,
            stats.seen,
            stats.matched,
            stats.inserted,
            stats.duplicate,
            stats.failed,
            stats.reconnects
        );
        stats
    }
}
