//! RelayForwarder: the dedicated task that drains the relay queue

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{DeliverySink, RelayConfig, RelayEvent, format_notification};

/// Counters describing relay throughput
#[derive(Debug, Default)]
pub struct RelayStats {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    retried: AtomicU64,
    dead_lettered: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`RelayStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStatsSnapshot {
    pub enqueued: u64,
    pub delivered: u64,
    pub retried: u64,
    pub dead_lettered: u64,
    pub dropped: u64,
}

impl RelayStats {
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// A notification that exhausted its delivery attempts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub destination: String,
    pub session_id: String,
    pub kind: String,
    pub error: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

/// Bounded ring of recent dead letters
#[derive(Debug)]
pub struct DeadLetters {
    entries: Mutex<VecDeque<DeadLetter>>,
    capacity: usize,
}

impl DeadLetters {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    async fn push(&self, letter: DeadLetter) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().await;
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(letter);
    }

    /// Oldest first
    pub async fn recent(&self) -> Vec<DeadLetter> {
        self.entries.lock().await.iter().cloned().collect()
    }
}

/// Cloneable producer side of the relay queue
#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::Sender<RelayEvent>,
    stats: Arc<RelayStats>,
    dead_letters: Arc<DeadLetters>,
}

impl RelayHandle {
    /// Queue an event without waiting; returns false if it was dropped
    pub fn enqueue(&self, event: RelayEvent) -> bool {
        let session_id = event.session.id().to_string();
        match self.tx.try_send(event) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(session_id = %session_id, "Relay queue full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(session_id = %session_id, "Relay queue closed, dropping event");
                false
            }
        }
    }

    pub fn stats(&self) -> RelayStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn dead_letters(&self) -> Arc<DeadLetters> {
        Arc::clone(&self.dead_letters)
    }
}

/// Consumes relay events and delivers them through a sink
pub struct RelayForwarder {
    sink: Arc<dyn DeliverySink>,
    config: RelayConfig,
    stats: Arc<RelayStats>,
    dead_letters: Arc<DeadLetters>,
}

impl RelayForwarder {
    /// Start the forwarder task
    ///
    /// The task drains whatever is queued and exits once every
    /// [`RelayHandle`] clone has been dropped.
    pub fn spawn(sink: Arc<dyn DeliverySink>, config: RelayConfig) -> (RelayHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let stats = Arc::new(RelayStats::default());
        let dead_letters = Arc::new(DeadLetters::new(config.dead_letter_capacity));

        let forwarder = Self {
            sink,
            config,
            stats: Arc::clone(&stats),
            dead_letters: Arc::clone(&dead_letters),
        };
        let task = tokio::spawn(forwarder.run(rx));

        (
            RelayHandle {
                tx,
                stats,
                dead_letters,
            },
            task,
        )
    }

    async fn run(self, mut rx: mpsc::Receiver<RelayEvent>) {
        info!("RelayForwarder started");
        while let Some(event) = rx.recv().await {
            self.deliver_with_retry(&event).await;
        }
        info!("Relay queue closed, RelayForwarder stopped");
    }

    async fn deliver_with_retry(&self, event: &RelayEvent) {
        let notification = format_notification(event);
        let max_attempts = self.config.max_attempts.max(1);
        let mut backoff = Duration::from_millis(self.config.initial_backoff_ms);

        for attempt in 1..=max_attempts {
            match self.sink.deliver(&notification).await {
                Ok(()) => {
                    self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        session_id = %notification.session_id,
                        kind = %notification.kind,
                        attempt,
                        "Relay delivered"
                    );
                    return;
                }
                Err(e) if attempt < max_attempts => {
                    self.stats.retried.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        session_id = %notification.session_id,
                        attempt,
                        "Relay delivery failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => {
                    self.stats.dead_lettered.fetch_add(1, Ordering::Relaxed);
                    error!(
                        session_id = %notification.session_id,
                        destination = %notification.destination,
                        kind = %notification.kind,
                        attempts = max_attempts,
                        "Relay delivery dead-lettered: {}",
                        e
                    );
                    self.dead_letters
                        .push(DeadLetter {
                            destination: notification.destination.clone(),
                            session_id: notification.session_id.clone(),
                            kind: notification.kind.clone(),
                            error: e.to_string(),
                            attempts: max_attempts,
                            failed_at: Utc::now(),
                        })
                        .await;
                }
            }
        }
    }
}
