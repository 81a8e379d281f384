//! Real-time connection contract and the shared, reference-counted wrapper
//! used by every push listener in the process.
//!
//! The transport itself (reconnects, backoff, framing) lives behind
//! [`RealtimeConnection`]. [`SharedConnection`] adds a connect-once lifecycle
//! and a topic registry so a topic is only left once its last joiner leaves.
//! [`InMemoryConnection`] is a process-local transport for embedding and tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use thiserror::Error;
use tracker_logging::{tracker_debug, tracker_info};

/// Callback invoked synchronously by the transport for one named event.
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Token returned by [`RealtimeConnection::on`], used to deregister the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("realtime connection failed: {0}")]
    Connect(String),
}

#[async_trait::async_trait]
pub trait RealtimeConnection: Send + Sync {
    async fn connect(&self) -> Result<(), ConnectionError>;
    fn disconnect(&self);
    fn is_connected(&self) -> bool;
    fn join_topic(&self, topic: &str);
    fn leave_topic(&self, topic: &str);
    fn on(&self, event: &str, handler: EventHandler) -> HandlerId;
    /// Returns false when `handler` was not registered for `event`.
    fn off(&self, event: &str, handler: HandlerId) -> bool;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct SharedConnection {
    transport: Arc<dyn RealtimeConnection>,
    topics: Arc<Mutex<HashMap<String, usize>>>,
    connecting: Arc<tokio::sync::Mutex<()>>,
}

impl SharedConnection {
    pub fn new(transport: Arc<dyn RealtimeConnection>) -> Self {
        Self {
            transport,
            topics: Arc::new(Mutex::new(HashMap::new())),
            connecting: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Connects unless already connected. Concurrent callers share one attempt.
    pub async fn ensure_connected(&self) -> Result<(), ConnectionError> {
        let _attempt = self.connecting.lock().await;
        if self.transport.is_connected() {
            return Ok(());
        }
        tracker_info!("Connecting realtime transport");
        self.transport.connect().await
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Joins `topic`; the transport only sees the first join.
    pub fn join(&self, topic: &str) {
        let mut topics = lock(&self.topics);
        let count = topics.entry(topic.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 {
            tracker_debug!("Joining topic {}", topic);
            self.transport.join_topic(topic);
        }
    }

    /// Leaves `topic`; the transport only sees the last leave. Unknown topics are ignored.
    pub fn leave(&self, topic: &str) {
        let mut topics = lock(&self.topics);
        match topics.get_mut(topic) {
            None => {}
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                topics.remove(topic);
                tracker_debug!("Leaving topic {}", topic);
                self.transport.leave_topic(topic);
            }
        }
    }

    pub fn joiners(&self, topic: &str) -> usize {
        lock(&self.topics).get(topic).copied().unwrap_or(0)
    }

    pub fn on(&self, event: &str, handler: EventHandler) -> HandlerId {
        self.transport.on(event, handler)
    }

    pub fn off(&self, event: &str, handler: HandlerId) -> bool {
        self.transport.off(event, handler)
    }

    /// Drops every topic registration and closes the transport.
    pub fn disconnect(&self) {
        lock(&self.topics).clear();
        self.transport.disconnect();
    }
}

#[derive(Default)]
struct LocalState {
    connected: bool,
    connects: usize,
    topics: HashSet<String>,
    joins: HashMap<String, usize>,
    handlers: HashMap<String, Vec<(HandlerId, EventHandler)>>,
}

/// Process-local transport: `emit` delivers to handlers while the topic is joined.
#[derive(Default)]
pub struct InMemoryConnection {
    state: Mutex<LocalState>,
    next_handler: AtomicU64,
}

impl InMemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `payload` to every handler of `event`. Returns how many ran.
    pub fn emit(&self, topic: &str, event: &str, payload: &Value) -> usize {
        let handlers: Vec<EventHandler> = {
            let state = lock(&self.state);
            if !state.connected || !state.topics.contains(topic) {
                return 0;
            }
            state
                .handlers
                .get(event)
                .map(|registered| {
                    registered
                        .iter()
                        .map(|(_, handler)| handler.clone())
                        .collect()
                })
                .unwrap_or_default()
        };
        // Handlers run outside the lock so they may call back into the connection.
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    pub fn handler_count(&self, event: &str) -> usize {
        lock(&self.state).handlers.get(event).map_or(0, Vec::len)
    }

    pub fn is_joined(&self, topic: &str) -> bool {
        lock(&self.state).topics.contains(topic)
    }

    /// Raw `join_topic` calls seen for `topic`.
    pub fn join_calls(&self, topic: &str) -> usize {
        lock(&self.state).joins.get(topic).copied().unwrap_or(0)
    }

    pub fn connect_calls(&self) -> usize {
        lock(&self.state).connects
    }
}

#[async_trait::async_trait]
impl RealtimeConnection for InMemoryConnection {
    async fn connect(&self) -> Result<(), ConnectionError> {
        let mut state = lock(&self.state);
        state.connects += 1;
        state.connected = true;
        Ok(())
    }

    fn disconnect(&self) {
        let mut state = lock(&self.state);
        state.connected = false;
        state.topics.clear();
    }

    fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    fn join_topic(&self, topic: &str) {
        let mut state = lock(&self.state);
        state.topics.insert(topic.to_string());
        *state.joins.entry(topic.to_string()).or_insert(0) += 1;
    }

    fn leave_topic(&self, topic: &str) {
        lock(&self.state).topics.remove(topic);
    }

    fn on(&self, event: &str, handler: EventHandler) -> HandlerId {
        let id = HandlerId::new(self.next_handler.fetch_add(1, Ordering::Relaxed));
        lock(&self.state)
            .handlers
            .entry(event.to_string())
            .or_default()
            .push((id, handler));
        id
    }

    fn off(&self, event: &str, handler: HandlerId) -> bool {
        let mut state = lock(&self.state);
        let Some(registered) = state.handlers.get_mut(event) else {
            return false;
        };
        let before = registered.len();
        registered.retain(|(id, _)| *id != handler);
        before != registered.len()
    }
}
