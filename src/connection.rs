//! Connection lifecycle for the feed channel.
//!
//! `Disconnected → Connecting → Open → Closed → Connecting (after delay)`.
//!
//! The manager runs as a single task that owns at most one channel task and at
//! most one reconnect timer. Every channel attempt gets a generation number;
//! events from a superseded attempt are dropped, so a channel that was closed
//! on purpose can never schedule a second reconnect.

use std::pin::Pin;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::decoder::{Decoded, decode_frame};
use crate::store::{FeedReader, FeedStore};
use crate::types::ConnectionState;

/// What a channel task reports back to the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Opened,
    Frame(String),
    Error(String),
    Closed,
}

/// Event sink handed to one channel attempt, stamped with its generation.
#[derive(Debug, Clone)]
pub struct ChannelEvents {
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, ChannelEvent)>,
}

impl ChannelEvents {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `false` once the manager is gone.
    pub fn emit(&self, event: ChannelEvent) -> bool {
        self.tx.send((self.generation, event)).is_ok()
    }
}

/// Opens one data channel per call, running it on its own task.
///
/// The task must emit `Closed` when the channel ends on its own. Aborting the
/// returned handle closes the channel.
pub trait Connector: Send + 'static {
    fn open(&self, url: &Url, events: ChannelEvents) -> JoinHandle<()>;
}

/// WebSocket transport over `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn open(&self, url: &Url, events: ChannelEvents) -> JoinHandle<()> {
        tokio::spawn(run_ws_channel(url.clone(), events))
    }
}

async fn run_ws_channel(url: Url, events: ChannelEvents) {
    let generation = events.generation();
    match connect_async(url.as_str()).await {
        Ok((mut ws, response)) => {
            debug!("[gen {generation}] Handshake complete ({})", response.status());
            events.emit(ChannelEvent::Opened);
            while let Some(msg) = ws.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if !events.emit(ChannelEvent::Frame(text.as_str().to_owned())) {
                            return;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        debug!("[gen {generation}] Server closed channel: {frame:?}");
                        break;
                    }
                    Ok(_) => {} // ping/pong/binary
                    Err(e) => {
                        events.emit(ChannelEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
        }
        Err(e) => {
            events.emit(ChannelEvent::Error(e.to_string()));
        }
    }
    events.emit(ChannelEvent::Closed);
}

/// Control messages accepted by a running manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Reconnect,
    Shutdown,
}

/// Owns the feed channel and republishes decoded snapshots into the store.
pub struct ConnectionManager<K: Connector> {
    url: Url,
    connector: K,
    store: FeedStore,
    reconnect_delay: Duration,
    state: ConnectionState,
    generation: u64,
    channel: Option<JoinHandle<()>>,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
    events_tx: mpsc::UnboundedSender<(u64, ChannelEvent)>,
    events_rx: mpsc::UnboundedReceiver<(u64, ChannelEvent)>,
}

impl<K: Connector> ConnectionManager<K> {
    pub fn new(url: Url, connector: K, store: FeedStore, reconnect_delay: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            url,
            connector,
            store,
            reconnect_delay,
            state: ConnectionState::Disconnected,
            generation: 0,
            channel: None,
            reconnect_timer: None,
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn reader(&self) -> FeedReader {
        self.store.reader()
    }

    pub fn has_pending_reconnect(&self) -> bool {
        self.reconnect_timer.is_some()
    }

    /// Open a channel unless one is already open.
    pub fn connect(&mut self) {
        if self.state == ConnectionState::Open {
            return;
        }
        // a half-open attempt is replaced, never duplicated
        self.drop_channel();
        self.reconnect_timer = None;
        self.generation += 1;
        let events = ChannelEvents {
            generation: self.generation,
            tx: self.events_tx.clone(),
        };
        info!("Connecting to feed (attempt {})", self.generation);
        self.channel = Some(self.connector.open(&self.url, events));
        self.set_state(ConnectionState::Connecting);
    }

    /// Close whatever is open, cancel the pending retry, connect now.
    pub fn reconnect(&mut self) {
        info!("Manual reconnect requested");
        self.drop_channel();
        self.reconnect_timer = None;
        if self.state == ConnectionState::Open {
            self.set_state(ConnectionState::Closed);
        }
        self.connect();
    }

    /// Close the channel and cancel the retry timer.
    pub fn teardown(&mut self) {
        self.drop_channel();
        self.reconnect_timer = None;
        self.set_state(ConnectionState::Disconnected);
    }

    /// Apply one event from a channel task.
    pub fn handle_event(&mut self, generation: u64, event: ChannelEvent) {
        if generation != self.generation {
            trace!("Dropping {event:?} from superseded channel {generation}");
            return;
        }
        match event {
            ChannelEvent::Opened => {
                info!("Feed channel open");
                self.state = ConnectionState::Open;
                self.store.mark_open();
            }
            ChannelEvent::Frame(text) => self.handle_frame(&text),
            ChannelEvent::Error(detail) => {
                warn!("Feed channel error: {detail}");
                self.store.record_error(format!("connection error: {detail}"));
            }
            ChannelEvent::Closed => {
                self.drop_channel();
                self.set_state(ConnectionState::Closed);
                info!("Feed channel closed, retrying in {:?}", self.reconnect_delay);
                self.reconnect_timer = Some(Box::pin(tokio::time::sleep(self.reconnect_delay)));
            }
        }
    }

    fn handle_frame(&mut self, text: &str) {
        if self.state != ConnectionState::Open {
            trace!("Frame received while {:?}, ignoring", self.state);
            return;
        }
        match decode_frame(text) {
            Ok(Decoded::Snapshot(league)) => {
                debug!(
                    "Snapshot: league {} with {} match(es)",
                    league.id,
                    league.matches.len()
                );
                self.store.publish_league(league);
            }
            Ok(Decoded::Ignored { tag }) => trace!("Ignoring frame tagged {tag:?}"),
            Err(e) => debug!("Dropping undecodable frame: {e}"),
        }
    }

    /// Drive the manager until `Shutdown` arrives or every handle is dropped.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        self.connect();
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Reconnect) => self.reconnect(),
                    Some(Command::Shutdown) | None => break,
                },
                Some((generation, event)) = self.events_rx.recv() => {
                    self.handle_event(generation, event);
                }
                () = wait_timer(&mut self.reconnect_timer) => {
                    self.reconnect_timer = None;
                    self.connect();
                }
            }
        }
        self.teardown();
        info!("Feed connection manager stopped");
    }

    fn drop_channel(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.abort();
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        self.store.set_connection(state);
    }
}

async fn wait_timer(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

/// Public face of a running feed: read access plus the reconnect action.
pub struct FeedHandle {
    commands: mpsc::UnboundedSender<Command>,
    reader: FeedReader,
    task: JoinHandle<()>,
}

impl FeedHandle {
    /// Start a manager on its own task.
    pub fn spawn<K: Connector>(url: Url, connector: K, reconnect_delay: Duration) -> Self {
        let manager = ConnectionManager::new(url, connector, FeedStore::new(), reconnect_delay);
        let reader = manager.reader();
        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(manager.run(rx));
        Self {
            commands,
            reader,
            task,
        }
    }

    pub fn reader(&self) -> FeedReader {
        self.reader.clone()
    }

    pub fn reconnect(&self) {
        let _ = self.commands.send(Command::Reconnect);
    }

    /// Close the channel, cancel timers, and wait for the manager to stop.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        let _ = self.task.await;
    }
}
