//! Live "new items" streams over Reddit listings.
//!
//! Reddit has no push API for `/r/all`, so a stream polls the newest
//! listing and hands out ids it has not seen before. The first poll only
//! records what already exists, so a fresh subscription starts at "now".

use crate::api::LISTING_LIMIT;
use crate::RedditClient;
use async_trait::async_trait;
use monitor_core::{ContentItem, CoreError, FeedKind, FeedSubscription};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// How many recent ids a stream remembers. Slightly more than one full
/// listing page plus overlap, matching what PRAW keeps.
pub const SEEN_CAPACITY: usize = 301;

const POLL_DELAY_BASE: Duration = Duration::from_secs(1);
const POLL_DELAY_MAX: Duration = Duration::from_secs(16);

/// Bounded insertion-ordered set; the oldest id is evicted first.
#[derive(Debug)]
pub struct SeenIds {
    order: VecDeque<String>,
    members: HashSet<String>,
    capacity: usize,
}

impl SeenIds {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Returns true if `id` was not already present.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.members.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
        self.order.push_back(id.to_string());
        self.members.insert(id.to_string());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Exponential pause between empty polls, with a little jitter.
#[derive(Debug)]
pub struct PollDelay {
    current: Duration,
    base: Duration,
    max: Duration,
}

impl PollDelay {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            current: base,
            base,
            max,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let jitter_range = (delay.as_millis() / 8) as u64;
        let jitter = Duration::from_millis(fastrand::u64(0..=jitter_range));
        self.current = (self.current * 2).min(self.max);
        (delay + jitter).min(self.max)
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }
}

impl Default for PollDelay {
    fn default() -> Self {
        Self::new(POLL_DELAY_BASE, POLL_DELAY_MAX)
    }
}

/// Dedup bookkeeping for one stream, independent of HTTP.
#[derive(Debug)]
pub struct StreamState {
    seen: SeenIds,
    primed: bool,
    skip_existing: bool,
}

impl StreamState {
    pub fn new(skip_existing: bool) -> Self {
        Self {
            seen: SeenIds::new(SEEN_CAPACITY),
            primed: false,
            skip_existing,
        }
    }

    /// Takes one listing (newest first) and returns the unseen items oldest
    /// first. With `skip_existing`, the first listing only primes the set.
    pub fn absorb(&mut self, newest_first: Vec<ContentItem>) -> Vec<ContentItem> {
        let mut fresh = Vec::new();
        for item in newest_first.into_iter().rev() {
            if self.seen.insert(item.id()) {
                fresh.push(item);
            }
        }

        if !self.primed {
            self.primed = true;
            if self.skip_existing {
                debug!("Primed stream with {} existing items", fresh.len());
                return Vec::new();
            }
        }
        fresh
    }

    pub fn is_primed(&self) -> bool {
        self.primed
    }
}

pub struct RedditSubscription {
    client: RedditClient,
    kind: FeedKind,
    state: StreamState,
    delay: PollDelay,
    pending_pause: Option<Duration>,
}

impl RedditSubscription {
    pub fn new(client: RedditClient, kind: FeedKind) -> Self {
        Self {
            client,
            kind,
            state: StreamState::new(true),
            delay: PollDelay::default(),
            pending_pause: None,
        }
    }

    async fn poll_listing(&self) -> Result<Vec<ContentItem>, CoreError> {
        let token = self.client.access_token().await?;
        let api = self.client.api();
        let result = match self.kind {
            FeedKind::Submissions => api.get_new_submissions(&token, LISTING_LIMIT).await,
            FeedKind::Comments => api.get_new_comments(&token, LISTING_LIMIT).await,
        };
        if let Err(CoreError::RedditApi(monitor_core::RedditApiError::InvalidToken)) = &result {
            self.client.invalidate_token().await;
        }
        result
    }
}

#[async_trait]
impl FeedSubscription for RedditSubscription {
    async fn next_batch(&mut self) -> Result<Vec<ContentItem>, CoreError> {
        loop {
            if let Some(pause) = self.pending_pause.take() {
                sleep(pause).await;
            }

            let listing = self.poll_listing().await?;
            let was_primed = self.state.is_primed();
            let fresh = self.state.absorb(listing);

            if !was_primed {
                info!("Started {} stream", self.kind);
                continue;
            }
            if fresh.is_empty() {
                self.pending_pause = Some(self.delay.next_delay());
                continue;
            }

            self.delay.reset();
            debug!("{} stream yielded {} new items", self.kind, fresh.len());
            return Ok(fresh);
        }
    }
}
