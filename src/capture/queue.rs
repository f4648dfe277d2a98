use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::capture::still::StillImage;

/// What the consumer should do next, as observed under the queue lock.
#[derive(Debug)]
pub enum QueueStep {
    /// The head of the queue, now owned by the consumer.
    Frame(StillImage),
    /// The producer has finished and nothing is left to drain.
    Finished,
    /// Nothing is pending yet and the producer is still running.
    Idle,
}

#[derive(Debug, Default)]
struct QueueState {
    frames: VecDeque<StillImage>,
    producer_finished: bool,
    warned_backlog: bool,
}

/// Thread-shared FIFO of pending still images.
///
/// One producer appends, one consumer drains. `append` only takes a short uncontended lock and
/// never waits for the consumer, so the capture tick is never delayed by encoding. The
/// producer-finished flag lives under the same lock as the frames, which makes
/// "finished and empty" a consistent snapshot for the final drain decision.
#[derive(Debug)]
pub struct FrameQueue {
    state: Mutex<QueueState>,
    wake: Condvar,
    enqueued: AtomicU64,
    warn_pending_frames: usize,
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new(0)
    }
}

impl FrameQueue {
    /// Create an empty queue. `warn_pending_frames == 0` disables the backlog warning.
    pub fn new(warn_pending_frames: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            wake: Condvar::new(),
            enqueued: AtomicU64::new(0),
            warn_pending_frames,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // No critical section can leave the deque half-mutated.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add `image` at the tail and wake the consumer.
    pub fn append(&self, image: StillImage) {
        let pending = {
            let mut st = self.lock();
            st.frames.push_back(image);
            let pending = st.frames.len();
            if self.warn_pending_frames > 0
                && pending > self.warn_pending_frames
                && !st.warned_backlog
            {
                st.warned_backlog = true;
                tracing::warn!(
                    pending,
                    threshold = self.warn_pending_frames,
                    "encoder is falling behind capture; frame queue keeps growing"
                );
            }
            pending
        };
        let total = self.enqueued.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::trace!(pending, total, "frame enqueued");
        self.wake.notify_one();
    }

    /// Remove and return the head, or `None` when empty.
    pub fn remove_first(&self) -> Option<StillImage> {
        self.lock().frames.pop_front()
    }

    /// Snapshot: `true` when no frames are pending.
    pub fn is_empty(&self) -> bool {
        self.lock().frames.is_empty()
    }

    /// Snapshot of the number of pending frames.
    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    /// Number of frames ever appended.
    pub fn enqueued_total(&self) -> u64 {
        self.enqueued.load(Ordering::Acquire)
    }

    /// Snapshot of the producer-finished flag.
    pub fn is_producer_finished(&self) -> bool {
        self.lock().producer_finished
    }

    /// Mark that no further frames will be appended. Only the controller calls this.
    pub(crate) fn finish_producing(&self) {
        self.lock().producer_finished = true;
        self.wake.notify_all();
    }

    /// Pop the head if present; otherwise report whether draining is complete.
    ///
    /// Never waits: returns [`QueueStep::Idle`] when empty and the producer is still running.
    pub fn try_step(&self) -> QueueStep {
        let mut st = self.lock();
        Self::step_locked(&mut st)
    }

    /// Block until a frame is pending or the producer has finished, up to `timeout`.
    ///
    /// Returns `true` when there is something to do. Nothing is removed.
    pub fn wait_for_work(&self, timeout: Duration) -> bool {
        let st = self.lock();
        let (st, _) = self
            .wake
            .wait_timeout_while(st, timeout, |st| {
                st.frames.is_empty() && !st.producer_finished
            })
            .unwrap_or_else(|e| e.into_inner());
        !st.frames.is_empty() || st.producer_finished
    }

    fn step_locked(st: &mut QueueState) -> QueueStep {
        match st.frames.pop_front() {
            Some(frame) => QueueStep::Frame(frame),
            None if st.producer_finished => QueueStep::Finished,
            None => QueueStep::Idle,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/capture/queue.rs"]
mod tests;
