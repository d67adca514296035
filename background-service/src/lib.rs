//! Keyword-driven ingestion of the Reddit firehose.
//!
//! Three pieces cooperate:
//! - [`keyword_watch::KeywordWatch`] polls the keyword store and publishes a
//!   compiled [`KeywordMatcher`](monitor_core::KeywordMatcher) whenever the
//!   active set changes.
//! - [`supervisor::ListenerSupervisor`] reacts to each published matcher by
//!   tearing down the running listener pair and starting a new one.
//! - [`listener::Listener`] follows one feed and stores matching items.

pub mod keyword_watch;
pub mod listener;
pub mod supervisor;


use keyword_watch::KeywordWatch;
use monitor_core::{ContentSink, FeedSource, IngestionSettings, KeywordMatcher, KeywordSource};
use std::sync::Arc;
use std::time::Duration;
use supervisor::ListenerSupervisor;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionConfig {
    pub keyword_refresh: Duration,
    pub idle_wait: Duration,
    pub reconnect_backoff: Duration,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self::from(&IngestionSettings::default())
    }
}

impl From<&IngestionSettings> for IngestionConfig {
    fn from(settings: &IngestionSettings) -> Self {
        Self {
            keyword_refresh: settings.keyword_refresh(),
            idle_wait: settings.idle_wait(),
            reconnect_backoff: settings.reconnect_backoff(),
        }
    }
}

pub struct IngestionService {
    keywords: Arc<dyn KeywordSource>,
    sink: Arc<dyn ContentSink>,
    feed: Arc<dyn FeedSource>,
    config: IngestionConfig,
}

impl IngestionService {
    pub fn new(
        keywords: Arc<dyn KeywordSource>,
        sink: Arc<dyn ContentSink>,
        feed: Arc<dyn FeedSource>,
        config: IngestionConfig,
    ) -> Self {
        Self {
            keywords,
            sink,
            feed,
            config,
        }
    }

    /// Runs until `shutdown` is cancelled. On return no listener is left
    /// running.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            "Starting ingestion (keyword refresh {:?}, idle wait {:?}, reconnect backoff {:?})",
            self.config.keyword_refresh, self.config.idle_wait, self.config.reconnect_backoff
        );

        let (tx, rx) = watch::channel(Arc::new(KeywordMatcher::default()));

        let watch = KeywordWatch::new(
            self.keywords,
            self.config.keyword_refresh,
            self.config.idle_wait,
        );
        let watch_task = tokio::spawn(watch.run(tx, shutdown.clone()));

        let supervisor = ListenerSupervisor::new(self.feed, self.sink, self.config.reconnect_backoff);
        supervisor.run(rx, shutdown.clone()).await;

        if let Err(e) = watch_task.await {
            error!("Keyword watch task failed: {}", e);
        }
        info!("Ingestion stopped");
    }
}
