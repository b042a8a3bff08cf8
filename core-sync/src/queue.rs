//! # Sync Queue
//!
//! FIFO work queue shared by every level of the artist → album → song
//! cascade. What "processing one item" means is supplied by a [`Stage`].
//!
//! ## State
//!
//! A queue carries two independent flags:
//!
//! - **processing**: an item is being handled right now, or the stage has
//!   reached its cap of in-flight fetches
//! - **refreshing**: at least one producer announced more items with
//!   [`SyncQueue::refreshing`] and has not yet delivered them
//!
//! Producers outside the scheduler (fetch completions) never touch the queue
//! directly. They hold an [`InboxHandle`] and post [`StageMessage`]s that the
//! scheduler applies on its next tick.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, trace};

use crate::error::Result;

// ============================================================================
// Stage capability
// ============================================================================

/// Result of handling a single queue item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// An async fetch was issued; its results arrive downstream later.
    Dispatched,
    /// The item was written to the local store.
    Committed,
    /// The item was dropped without touching the store.
    Skipped(String),
}

/// What one level of the cascade does with an item.
#[async_trait]
pub trait Stage: Send {
    type Item: Send + 'static;

    async fn process_one(&mut self, item: Self::Item) -> Result<StageOutcome>;

    /// True while the stage cannot accept another item.
    fn saturated(&self) -> bool {
        false
    }
}

// ============================================================================
// Scheduler activation
// ============================================================================

/// Shared request to (re)start the scheduler loop.
///
/// Owned by one orchestrator and cloned into its queues and inbox handles.
#[derive(Clone, Default)]
pub struct Activation {
    inner: Arc<ActivationState>,
}

#[derive(Default)]
struct ActivationState {
    requested: AtomicBool,
    notify: Notify,
}

impl Activation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.inner.requested.store(true, Ordering::SeqCst);
        self.inner.notify.notify_one();
    }

    /// Consume a pending request.
    pub fn take_request(&self) -> bool {
        self.inner.requested.swap(false, Ordering::SeqCst)
    }

    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Wait for the next request. A request made while nobody was waiting
    /// completes the next call immediately.
    pub async fn wait(&self) {
        self.inner.notify.notified().await;
    }
}

impl fmt::Debug for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activation")
            .field("requested", &self.is_requested())
            .finish()
    }
}

// ============================================================================
// Inbox
// ============================================================================

/// Delivery from a producer to a queue.
#[derive(Debug)]
pub enum StageMessage<T> {
    /// Append these items, then count as `refreshed()`.
    Extend(Vec<T>),
    /// The producer is done and has nothing to add.
    Refreshed,
}

/// Send-only handle to a queue's inbox.
///
/// Every [`refreshing`](InboxHandle::refreshing) must be balanced by exactly
/// one [`extend`](InboxHandle::extend) or [`refreshed`](InboxHandle::refreshed).
pub struct InboxHandle<T> {
    sender: mpsc::UnboundedSender<StageMessage<T>>,
    pending: Arc<AtomicUsize>,
    activation: Activation,
}

impl<T> Clone for InboxHandle<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            pending: Arc::clone(&self.pending),
            activation: self.activation.clone(),
        }
    }
}

impl<T: Send> InboxHandle<T> {
    /// Announce a delivery that will follow later.
    pub fn refreshing(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    pub fn extend(&self, items: Vec<T>) {
        self.post(StageMessage::Extend(items));
    }

    pub fn refreshed(&self) {
        self.post(StageMessage::Refreshed);
    }

    fn post(&self, message: StageMessage<T>) {
        if self.sender.send(message).is_err() {
            trace!("Queue dropped before delivery");
            return;
        }
        self.activation.request();
    }
}

/// Returns `false` when there was no outstanding producer to release.
fn release(pending: &AtomicUsize) -> bool {
    pending
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

// ============================================================================
// Queue
// ============================================================================

/// FIFO queue driven one item at a time by the scheduler.
pub struct SyncQueue<S: Stage> {
    name: &'static str,
    items: VecDeque<S::Item>,
    stage: S,
    receiver: mpsc::UnboundedReceiver<StageMessage<S::Item>>,
    handle: InboxHandle<S::Item>,
    processing: bool,
}

impl<S: Stage> SyncQueue<S> {
    pub fn new(name: &'static str, stage: S, activation: Activation) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            name,
            items: VecDeque::new(),
            stage,
            receiver,
            handle: InboxHandle {
                sender,
                pending: Arc::new(AtomicUsize::new(0)),
                activation,
            },
            processing: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Handle for producers of this queue's items.
    pub fn inbox(&self) -> InboxHandle<S::Item> {
        self.handle.clone()
    }

    pub fn stage(&self) -> &S {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut S {
        &mut self.stage
    }

    /// Append `items` in order, then signal [`refreshed`](Self::refreshed).
    pub fn extend(&mut self, items: impl IntoIterator<Item = S::Item>) {
        let before = self.items.len();
        self.items.extend(items);
        debug!(
            queue = self.name,
            added = self.items.len() - before,
            queued = self.items.len(),
            "Queue extended"
        );
        self.refreshed();
    }

    /// Mark that a producer is about to enqueue more items.
    pub fn refreshing(&self) {
        self.handle.refreshing();
    }

    /// Balance one [`refreshing`](Self::refreshing) and request activation.
    pub fn refreshed(&self) {
        if !release(&self.handle.pending) {
            trace!(queue = self.name, "Unbalanced refreshed absorbed");
        }
        self.handle.activation.request();
    }

    /// Drop queued items and outstanding producers.
    ///
    /// Inbox handles taken before the reset are detached: whatever they post
    /// afterwards is discarded. Stages holding such a handle must be given
    /// a fresh one from [`inbox`](Self::inbox).
    pub fn reset(&mut self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let dropped = self.items.len();

        self.items.clear();
        self.receiver = receiver;
        self.handle = InboxHandle {
            sender,
            pending: Arc::new(AtomicUsize::new(0)),
            activation: self.handle.activation.clone(),
        };
        self.processing = false;

        debug!(queue = self.name, dropped, "Queue reset");
    }

    /// Apply every message posted since the last call.
    ///
    /// Returns the number of messages applied.
    pub fn drain_inbox(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(message) = self.receiver.try_recv() {
            match message {
                StageMessage::Extend(items) => self.extend(items),
                StageMessage::Refreshed => self.refreshed(),
            }
            applied += 1;
        }
        applied
    }

    /// Handle up to `n` items from the head, one at a time.
    ///
    /// Returns `true` when the queue was found empty, `false` otherwise.
    pub async fn process(&mut self, n: usize) -> Result<bool> {
        for _ in 0..n.max(1) {
            let Some(item) = self.items.pop_front() else {
                return Ok(true);
            };

            self.processing = true;
            let outcome = self.stage.process_one(item).await;
            self.processing = false;

            let outcome = outcome?;
            trace!(queue = self.name, ?outcome, "Item processed");
        }
        Ok(false)
    }

    pub fn is_processing(&self) -> bool {
        self.processing || self.stage.saturated()
    }

    pub fn is_refreshing(&self) -> bool {
        self.handle.pending.load(Ordering::SeqCst) > 0
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Empty, not processing and not refreshing.
    pub fn is_quiescent(&self) -> bool {
        self.is_empty() && !self.is_processing() && !self.is_refreshing()
    }
}

impl<S: Stage> fmt::Debug for SyncQueue<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncQueue")
            .field("name", &self.name)
            .field("len", &self.items.len())
            .field("processing", &self.is_processing())
            .field("refreshing", &self.is_refreshing())
            .finish()
    }
}
