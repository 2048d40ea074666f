//! Change notifications for view invalidation.
//!
//! Services publish a [`Change`] after every successful mutation. Views hold
//! a [`ChangeListener`] and refetch a collection only when it was touched,
//! instead of refetching everything after every edit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

/// What happened to the rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
    Reordered,
}

/// A mutation of one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub collection: String,
    pub kind: ChangeKind,
    /// Keys of the affected rows, when known.
    pub ids: Vec<String>,
    pub at: DateTime<Utc>,
}

impl Change {
    /// Creates a change stamped with the current time.
    pub fn new(collection: impl Into<String>, kind: ChangeKind, ids: Vec<String>) -> Self {
        Self {
            collection: collection.into(),
            kind,
            ids,
            at: Utc::now(),
        }
    }
}

/// Fan-out of change notifications.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<Change>,
}

impl ChangeFeed {
    /// Creates a feed that buffers up to `capacity` changes per listener.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes a change. Returns the number of listeners reached.
    pub fn publish(&self, change: Change) -> usize {
        tracing::debug!(collection = %change.collection, kind = ?change.kind, "change published");
        self.sender.send(change).unwrap_or(0)
    }

    /// Raw receiver for every future change.
    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.sender.subscribe()
    }

    /// Listener that tracks stale collections.
    pub fn listener(&self) -> ChangeListener {
        ChangeListener {
            receiver: self.subscribe(),
            stale: HashSet::new(),
            all_stale: false,
            fresh_since_lag: HashSet::new(),
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Tracks which collections a view must refetch.
#[derive(Debug)]
pub struct ChangeListener {
    receiver: broadcast::Receiver<Change>,
    stale: HashSet<String>,
    all_stale: bool,
    fresh_since_lag: HashSet<String>,
}

impl ChangeListener {
    /// Drains pending notifications.
    ///
    /// If the listener fell behind and changes were dropped, every
    /// collection is treated as stale.
    pub fn poll(&mut self) {
        loop {
            match self.receiver.try_recv() {
                Ok(change) => {
                    self.stale.insert(change.collection);
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "change listener lagged; invalidating all");
                    self.all_stale = true;
                    self.fresh_since_lag.clear();
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    /// Returns true if `collection` changed since it was last marked fresh.
    pub fn is_stale(&mut self, collection: &str) -> bool {
        self.poll();
        self.stale.contains(collection)
            || (self.all_stale && !self.fresh_since_lag.contains(collection))
    }

    /// Records that the view just refetched `collection`.
    pub fn mark_fresh(&mut self, collection: &str) {
        self.stale.remove(collection);
        if self.all_stale {
            self.fresh_since_lag.insert(collection.to_string());
        }
    }

    /// Returns the collections known to be stale.
    ///
    /// After a lag this only lists collections with a received change; use
    /// [`is_stale`](Self::is_stale) for a definitive per-collection answer.
    pub fn stale(&mut self) -> Vec<String> {
        self.poll();
        let mut names: Vec<String> = self.stale.iter().cloned().collect();
        names.sort();
        names
    }
}
