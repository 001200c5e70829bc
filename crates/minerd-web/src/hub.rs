//! Push channel broadcast hub.
//!
//! Every connected push client owns a bounded FIFO queue. Producers call
//! [`BroadcastHub::publish`] from any thread; it copies the registry under
//! the lock, releases it, and then appends to each queue. A full queue drops
//! its oldest pending message, so a stalled browser never blocks telemetry
//! production.
//!
//! The connection task drains its queue through [`Subscription::recv`] and
//! performs the network write without holding any lock. Dropping the
//! subscription removes the client from the registry.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use minerd_telemetry::Metrics;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

/// Identifier of a connected push client.
pub type ClientId = u64;

/// Delivery state of a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeliveryState {
    Connected = 0,
    Closing = 1,
    Closed = 2,
}

impl DeliveryState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Connected,
            1 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

struct ClientQueue {
    pending: Mutex<VecDeque<String>>,
    capacity: usize,
    notify: Notify,
    state: AtomicU8,
    dropped: AtomicU64,
}

impl ClientQueue {
    fn new(capacity: usize) -> Self {
        Self {
            pending: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
            state: AtomicU8::new(DeliveryState::Connected as u8),
            dropped: AtomicU64::new(0),
        }
    }

    fn state(&self) -> DeliveryState {
        DeliveryState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Append a message, dropping the oldest ones beyond capacity.
    /// Returns how many were dropped.
    fn enqueue(&self, message: String) -> u64 {
        if self.state() != DeliveryState::Connected {
            return 0;
        }
        let mut dropped = 0;
        {
            let mut pending = self.pending.lock();
            while pending.len() >= self.capacity {
                pending.pop_front();
                dropped += 1;
            }
            pending.push_back(message);
        }
        if dropped > 0 {
            self.dropped.fetch_add(dropped, Ordering::Relaxed);
        }
        self.notify.notify_one();
        dropped
    }

    fn close(&self) {
        // Only move forward: Connected -> Closing.
        let _ = self.state.compare_exchange(
            DeliveryState::Connected as u8,
            DeliveryState::Closing as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.notify.notify_one();
    }
}

struct HubInner {
    clients: Mutex<HashMap<ClientId, Arc<ClientQueue>>>,
    next_id: AtomicU64,
    queue_capacity: usize,
    max_clients: usize,
}

/// Fan-out of telemetry strings to every connected push client.
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

impl BroadcastHub {
    /// `queue_capacity` pending messages are kept per client (at least one);
    /// at most `max_clients` may be connected at once (0 = unlimited).
    pub fn new(queue_capacity: usize, max_clients: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                clients: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                queue_capacity: queue_capacity.max(1),
                max_clients,
            }),
        }
    }

    /// Register a new client. `None` when the client limit is reached.
    pub fn subscribe(&self) -> Option<Subscription> {
        self.subscribe_with(Vec::new())
    }

    /// Register a new client whose queue already holds `initial`, so no
    /// publish can be delivered ahead of it.
    pub fn subscribe_with(&self, initial: impl IntoIterator<Item = String>) -> Option<Subscription> {
        let queue = Arc::new(ClientQueue::new(self.inner.queue_capacity));
        for message in initial {
            queue.enqueue(message);
        }
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let rejected_at = {
            let mut clients = self.inner.clients.lock();
            if self.inner.max_clients > 0 && clients.len() >= self.inner.max_clients {
                Some(clients.len())
            } else {
                clients.insert(id, Arc::clone(&queue));
                None
            }
        };
        // Logged outside the registry lock: warnings are relayed to the hub.
        if let Some(current) = rejected_at {
            warn!(current, max = self.inner.max_clients, "Push client limit reached");
            return None;
        }
        Metrics::push_client_connected();
        debug!(client_id = id, "Push client registered");

        Some(Subscription {
            id,
            queue,
            hub: Arc::clone(&self.inner),
        })
    }

    /// Queue `message` for every connected client. Never blocks on a client.
    ///
    /// Returns the number of clients the message was queued for.
    pub fn publish(&self, message: impl Into<String>) -> usize {
        let message = message.into();
        let snapshot: Vec<Arc<ClientQueue>> = self.inner.clients.lock().values().cloned().collect();

        Metrics::push_published();
        let mut delivered = 0;
        for queue in snapshot {
            if queue.state() != DeliveryState::Connected {
                continue;
            }
            let dropped = queue.enqueue(message.clone());
            if dropped > 0 {
                Metrics::push_dropped(dropped);
                trace!(dropped, "Push client lagging, dropped oldest messages");
            }
            delivered += 1;
        }
        delivered
    }

    pub fn client_count(&self) -> usize {
        self.inner.clients.lock().len()
    }

    /// Ask every client loop to stop (used at shutdown).
    pub fn close_all(&self) {
        let snapshot: Vec<Arc<ClientQueue>> = self.inner.clients.lock().values().cloned().collect();
        for queue in snapshot {
            queue.close();
        }
    }
}

/// A registered push client. Deregisters itself when dropped.
pub struct Subscription {
    id: ClientId,
    queue: Arc<ClientQueue>,
    hub: Arc<HubInner>,
}

impl Subscription {
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn state(&self) -> DeliveryState {
        self.queue.state()
    }

    /// Queue a message for this client only (e.g. the welcome snapshot).
    pub fn push(&self, message: impl Into<String>) {
        self.queue.enqueue(message.into());
    }

    /// Wait for the next message.
    ///
    /// Returns `None` as soon as the subscription is closing; pending
    /// messages are not flushed to a client that is going away.
    pub async fn recv(&self) -> Option<String> {
        loop {
            if let Some(message) = self.try_recv() {
                return Some(message);
            }
            if self.queue.state() != DeliveryState::Connected {
                return None;
            }
            self.queue.notify.notified().await;
        }
    }

    /// Pop the next message without waiting.
    pub fn try_recv(&self) -> Option<String> {
        if self.queue.state() != DeliveryState::Connected {
            return None;
        }
        self.queue.pending.lock().pop_front()
    }

    /// Mark the client as closing and wake its loop.
    pub fn close(&self) {
        self.queue.close();
    }

    /// Messages dropped for this client so far.
    pub fn dropped(&self) -> u64 {
        self.queue.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.queue
            .state
            .store(DeliveryState::Closed as u8, Ordering::Release);
        let removed = self.hub.clients.lock().remove(&self.id).is_some();
        if removed {
            Metrics::push_client_disconnected();
            debug!(client_id = self.id, "Push client deregistered");
        }
    }
}
