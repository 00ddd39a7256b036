//! Audit trail of authorization decisions
//!
//! Every call the gate evaluates produces one entry:
//! - Bounded channel, writers never block (entries are dropped when full)
//! - Background flush thread hands batches to a callback
//! - Block name and policy taken from the chain's exit result

use crate::acl::{BlockExitResult, Policy};
use chrono::{DateTime, Utc};
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Largest batch handed to the flush callback at once
const FLUSH_BATCH: usize = 1000;

/// Final decision for an evaluated call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Allowed,
    Forbidden,
}

/// Single audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    /// Indices after any narrowing
    pub indices: Vec<String>,
    /// Matched block, if any
    pub block: Option<String>,
    pub policy: Option<Policy>,
    pub verdict: Verdict,
}

impl AuditEntry {
    /// Record the outcome of one chain evaluation
    pub fn from_exit(action: &str, indices: &BTreeSet<String>, exit: &BlockExitResult<'_>) -> Self {
        let block = exit.block().filter(|_| exit.is_match());

        AuditEntry {
            timestamp: Utc::now(),
            action: action.to_string(),
            indices: indices.iter().cloned().collect(),
            block: block.map(|b| b.name().to_string()),
            policy: block.map(|b| b.policy()),
            verdict: if exit.is_allowed() {
                Verdict::Allowed
            } else {
                Verdict::Forbidden
            },
        }
    }
}

/// Non-blocking audit logger with background flushing
pub struct AuditLogger {
    sender: Sender<AuditEntry>,
    receiver: Receiver<AuditEntry>,
    /// Background flush thread handle
    flush_thread: Option<JoinHandle<()>>,
    /// How often queued entries are flushed
    flush_interval: Duration,
    /// Whether the flush thread should keep going
    running: Arc<Mutex<bool>>,
    logged: AtomicUsize,
    dropped: AtomicUsize,
}

impl AuditLogger {
    /// Create a new audit logger
    ///
    /// # Arguments
    /// * `capacity` - Entries held before new ones are dropped
    /// * `flush_interval` - How often entries are handed to the flush callback
    pub fn new(capacity: usize, flush_interval: Duration) -> Self {
        let (sender, receiver) = channel::bounded(capacity.max(1));
        AuditLogger {
            sender,
            receiver,
            flush_thread: None,
            flush_interval,
            running: Arc::new(Mutex::new(false)),
            logged: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Start the background flush thread
    ///
    /// Entries still queued when the logger stops are flushed once more before the
    /// thread exits.
    pub fn start<F>(&mut self, flush_callback: F)
    where
        F: Fn(&[AuditEntry]) + Send + 'static,
    {
        if self.flush_thread.is_some() {
            return;
        }
        *self.running.lock() = true;

        let receiver = self.receiver.clone();
        let flush_interval = self.flush_interval;
        let running = Arc::clone(&self.running);

        let flush_thread = thread::spawn(move || {
            let drain = |receiver: &Receiver<AuditEntry>| loop {
                let batch: Vec<AuditEntry> = receiver.try_iter().take(FLUSH_BATCH).collect();
                if batch.is_empty() {
                    break;
                }
                flush_callback(&batch);
            };

            while *running.lock() {
                thread::sleep(flush_interval);
                drain(&receiver);
            }
            drain(&receiver);
        });

        self.flush_thread = Some(flush_thread);
    }

    /// Stop the background flush thread
    pub fn stop(&mut self) {
        *self.running.lock() = false;

        if let Some(thread) = self.flush_thread.take() {
            let _ = thread.join();
        }
    }

    /// Queue an entry (non-blocking)
    pub fn log(&self, entry: AuditEntry) {
        match self.sender.try_send(entry) {
            Ok(()) => {
                self.logged.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// (entries queued, entries dropped because the queue was full)
    pub fn stats(&self) -> (usize, usize) {
        (
            self.logged.load(Ordering::Relaxed),
            self.dropped.load(Ordering::Relaxed),
        )
    }

    /// Entries waiting for the next flush
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl Drop for AuditLogger {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (logged, dropped) = self.stats();
        f.debug_struct("AuditLogger")
            .field("logged", &logged)
            .field("dropped", &dropped)
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::Block;

    fn entry(action: &str) -> AuditEntry {
        AuditEntry::from_exit(action, &BTreeSet::new(), &BlockExitResult::no_match())
    }

    #[test]
    fn test_entry_from_exit() {
        let block = Block::new("readers", Policy::Allow, Vec::new());
        let indices = BTreeSet::from(["logs-1".to_string()]);
        let entry = AuditEntry::from_exit("search", &indices, &BlockExitResult::matched(&block));

        assert_eq!(entry.block.as_deref(), Some("readers"));
        assert_eq!(entry.policy, Some(Policy::Allow));
        assert_eq!(entry.verdict, Verdict::Allowed);
        assert_eq!(entry.indices, vec!["logs-1"]);

        let denied = AuditEntry::from_exit("search", &indices, &BlockExitResult::no_match());
        assert_eq!(denied.block, None);
        assert_eq!(denied.verdict, Verdict::Forbidden);
    }

    #[test]
    fn test_audit_logger_basic() {
        let logger = AuditLogger::new(1024, Duration::from_millis(100));
        logger.log(entry("search"));

        assert_eq!(logger.stats(), (1, 0));
        assert_eq!(logger.pending(), 1);
    }

    #[test]
    fn test_full_queue_drops() {
        let logger = AuditLogger::new(2, Duration::from_millis(100));
        for _ in 0..5 {
            logger.log(entry("search"));
        }
        assert_eq!(logger.stats(), (2, 3));
    }

    #[test]
    fn test_audit_logger_flush() {
        let mut logger = AuditLogger::new(1024, Duration::from_millis(20));
        let flushed = Arc::new(AtomicUsize::new(0));
        let flushed_clone = Arc::clone(&flushed);

        logger.start(move |entries| {
            flushed_clone.fetch_add(entries.len(), Ordering::SeqCst);
        });

        for i in 0..100 {
            logger.log(entry(&format!("action-{}", i)));
        }

        logger.stop();

        // Whatever the periodic flushes missed is drained on stop
        assert_eq!(flushed.load(Ordering::SeqCst), 100);
        assert_eq!(logger.pending(), 0);
    }
}
