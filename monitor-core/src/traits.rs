//! Seams between ingestion and its collaborators.
//!
//! The `database` crate implements the store traits and `reddit-client`
//! implements the feed traits; ingestion only sees these.

use crate::error::CoreError;
use crate::types::{ContentItem, FeedKind, InsertOutcome};
use async_trait::async_trait;

#[async_trait]
pub trait KeywordSource: Send + Sync {
    /// Text of every keyword currently flagged active.
    async fn active_keywords(&self) -> Result<Vec<String>, CoreError>;
}

#[async_trait]
pub trait ContentSink: Send + Sync {
    /// Inserts `item` keyed by its id. An existing id is reported as
    /// [`InsertOutcome::Duplicate`], never as an error.
    async fn insert_content(&self, item: &ContentItem) -> Result<InsertOutcome, CoreError>;
}

#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Opens a live subscription that skips items created before it.
    async fn subscribe(&self, kind: FeedKind) -> Result<Box<dyn FeedSubscription>, CoreError>;
}

#[async_trait]
pub trait FeedSubscription: Send {
    /// Waits for and returns the next batch of unseen items, oldest first.
    /// An error ends the subscription.
    async fn next_batch(&mut self) -> Result<Vec<ContentItem>, CoreError>;
}
