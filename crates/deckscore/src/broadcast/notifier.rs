//! Per-job subscription registry.
//!
//! Each subscription owns a bounded queue. Publishing never waits: a full
//! queue drops the event for that subscriber only, and a queue whose
//! receiver is gone is pruned.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::event::ProgressEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    jobs: HashMap<String, HashMap<ConnectionId, mpsc::Sender<ProgressEvent>>>,
    connections: HashMap<ConnectionId, String>,
}

impl Registry {
    fn remove_connection(&mut self, id: ConnectionId) -> bool {
        let Some(job_id) = self.connections.remove(&id) else {
            return false;
        };
        if let Some(subscribers) = self.jobs.get_mut(&job_id) {
            subscribers.remove(&id);
            if subscribers.is_empty() {
                self.jobs.remove(&job_id);
            }
        }
        true
    }
}

fn read(registry: &RwLock<Registry>) -> RwLockReadGuard<'_, Registry> {
    registry.read().unwrap_or_else(|poisoned| {
        log::warn!("Notifier registry lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

fn write(registry: &RwLock<Registry>) -> RwLockWriteGuard<'_, Registry> {
    registry.write().unwrap_or_else(|poisoned| {
        log::warn!("Notifier registry lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Broadcasts job events to every connection currently subscribed to a job.
///
/// There is no replay: a subscriber only sees events published after it
/// subscribed.
#[derive(Clone)]
pub struct ProgressNotifier {
    registry: Arc<RwLock<Registry>>,
    capacity: usize,
}

impl ProgressNotifier {
    /// `capacity` is the number of undelivered progress events buffered per
    /// subscriber. One more slot is kept free for the job's terminal event,
    /// so a lagging subscriber still learns how the job ended.
    pub fn new(capacity: usize) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self, job_id: &str) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.capacity + 1);

        let mut registry = write(&self.registry);
        registry.next_id += 1;
        let id = ConnectionId(registry.next_id);
        registry
            .jobs
            .entry(job_id.to_string())
            .or_default()
            .insert(id, sender);
        registry.connections.insert(id, job_id.to_string());
        drop(registry);

        log::debug!("{} subscribed to job {}", id, job_id);

        Subscription {
            id,
            job_id: job_id.to_string(),
            receiver,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Detaches a connection. Its subscription drains what was already
    /// queued and then ends. Returns false for unknown connections.
    pub fn unsubscribe(&self, id: ConnectionId) -> bool {
        let removed = write(&self.registry).remove_connection(id);
        if removed {
            log::debug!("{} unsubscribed", id);
        }
        removed
    }

    /// Delivers `event` to every subscriber of `job_id` and returns how many
    /// accepted it. Having no subscribers is not an error.
    pub fn publish(&self, job_id: &str, event: &ProgressEvent) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();

        {
            let registry = read(&self.registry);
            let Some(subscribers) = registry.jobs.get(job_id) else {
                return 0;
            };

            let terminal = event.is_terminal();
            for (id, sender) in subscribers {
                if sender.is_closed() {
                    dead.push(*id);
                    continue;
                }
                // The last free slot belongs to the terminal event.
                if !terminal && sender.capacity() <= 1 {
                    tracing::warn!(job_id, connection = %id, "Subscriber is lagging, dropping event");
                    continue;
                }
                match sender.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(job_id, connection = %id, "Subscriber is lagging, dropping event");
                    }
                    Err(TrySendError::Closed(_)) => dead.push(*id),
                }
            }
        }

        if !dead.is_empty() {
            let mut registry = write(&self.registry);
            for id in dead {
                registry.remove_connection(id);
            }
        }

        delivered
    }

    /// Ends every subscription of a job once queued events are drained.
    pub fn close(&self, job_id: &str) {
        let mut registry = write(&self.registry);
        if let Some(subscribers) = registry.jobs.remove(job_id) {
            for id in subscribers.keys() {
                registry.connections.remove(id);
            }
        }
    }

    pub fn subscriber_count(&self, job_id: &str) -> usize {
        read(&self.registry)
            .jobs
            .get(job_id)
            .map_or(0, HashMap::len)
    }

    pub fn connection_count(&self) -> usize {
        read(&self.registry).connections.len()
    }
}

impl Default for ProgressNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

/// A live subscription to one job. Dropping it unsubscribes.
pub struct Subscription {
    id: ConnectionId,
    job_id: String,
    receiver: mpsc::Receiver<ProgressEvent>,
    registry: Weak<RwLock<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Waits for the next event. Returns `None` once the subscription has
    /// been closed or unsubscribed and its queue is empty.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.recv().await
    }

    /// Returns a queued event without waiting.
    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // The registry may already be gone if the notifier was dropped first.
        if let Some(registry) = self.registry.upgrade() {
            write(&registry).remove_connection(self.id);
        }
    }
}
