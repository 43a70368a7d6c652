use std::sync::Arc;

use tokio::sync::watch;

use crate::types::{ConnectionState, League};

/// Everything the presentation side may read about the feed.
#[derive(Debug, Clone, Default)]
pub struct FeedState {
    /// Latest decoded snapshot, replaced whole on every publish.
    pub league: Option<Arc<League>>,
    pub connection: ConnectionState,
    pub last_error: Option<String>,
    /// Snapshots published since start.
    pub snapshots: u64,
}

impl FeedState {
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Open
    }
}

/// Write side of the feed state. Owned by the connection manager alone.
#[derive(Debug)]
pub struct FeedStore {
    tx: watch::Sender<FeedState>,
}

impl FeedStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(FeedState::default());
        Self { tx }
    }

    pub fn reader(&self) -> FeedReader {
        FeedReader {
            rx: self.tx.subscribe(),
        }
    }

    /// Replace the held League with a freshly decoded one.
    pub fn publish_league(&self, league: League) {
        let league = Arc::new(league);
        self.tx.send_modify(|state| {
            state.league = Some(league);
            state.snapshots += 1;
        });
    }

    pub fn set_connection(&self, connection: ConnectionState) {
        self.tx.send_if_modified(|state| {
            if state.connection == connection {
                return false;
            }
            state.connection = connection;
            true
        });
    }

    /// Mark the channel open and drop any stale error.
    pub fn mark_open(&self) {
        self.tx.send_if_modified(|state| {
            let changed = state.connection != ConnectionState::Open || state.last_error.is_some();
            state.connection = ConnectionState::Open;
            state.last_error = None;
            changed
        });
    }

    pub fn record_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.tx.send_modify(|state| state.last_error = Some(message));
    }
}

impl Default for FeedStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of the feed, cheap to clone.
#[derive(Debug, Clone)]
pub struct FeedReader {
    rx: watch::Receiver<FeedState>,
}

impl FeedReader {
    pub fn snapshot(&self) -> FeedState {
        self.rx.borrow().clone()
    }

    pub fn league(&self) -> Option<Arc<League>> {
        self.rx.borrow().league.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.rx.borrow().is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.rx.borrow().connection
    }

    pub fn last_error(&self) -> Option<String> {
        self.rx.borrow().last_error.clone()
    }

    /// Wait for the next change. Errors once the store is gone.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.rx.changed().await
    }

    /// Current state, marking it seen.
    pub fn snapshot_and_mark_seen(&mut self) -> FeedState {
        self.rx.borrow_and_update().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn league(id: i64) -> League {
        League {
            id,
            name: format!("L{id}"),
            matches: Vec::new(),
        }
    }

    #[test]
    fn publish_replaces_whole_league() {
        let store = FeedStore::new();
        let reader = store.reader();
        assert!(reader.league().is_none());

        store.publish_league(league(1));
        store.publish_league(league(2));
        let held = reader.league().unwrap();
        assert_eq!(held.id, 2);
        assert_eq!(reader.snapshot().snapshots, 2);
    }

    #[test]
    fn open_clears_error() {
        let store = FeedStore::new();
        let reader = store.reader();
        store.set_connection(ConnectionState::Connecting);
        store.record_error("connection error: refused");
        assert_eq!(reader.last_error().as_deref(), Some("connection error: refused"));
        assert!(!reader.is_connected());

        store.mark_open();
        assert!(reader.is_connected());
        assert!(reader.last_error().is_none());
    }

    #[tokio::test]
    async fn readers_are_notified() {
        let store = FeedStore::new();
        let mut reader = store.reader();
        store.publish_league(league(5));
        reader.changed().await.unwrap();
        assert_eq!(reader.snapshot_and_mark_seen().league.unwrap().id, 5);
    }

    #[tokio::test]
    async fn unchanged_connection_does_not_notify() {
        let store = FeedStore::new();
        let mut reader = store.reader();
        store.set_connection(ConnectionState::Disconnected);
        assert!(!reader.rx.has_changed().unwrap());
        store.set_connection(ConnectionState::Connecting);
        assert!(reader.rx.has_changed().unwrap());
        reader.changed().await.unwrap();
    }

    #[tokio::test]
    async fn dropped_store_ends_readers() {
        let store = FeedStore::new();
        let mut reader = store.reader();
        drop(store);
        assert!(reader.changed().await.is_err());
    }
}
