//! Bounded sample queue shared by the event handler and blocking readers
//!
//! Samples live in a fixed arena allocated once at attach time; head and tail
//! indices walk it as a ring. The queue owns its lock and the "data ready"
//! condition, so the producer can publish and wake readers without touching
//! any other per-device state.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::config::OverflowPolicy;
use crate::error::{AcquisitionError, Result};
use crate::sample::Sample;

/// Cancels a pending blocking read
///
/// Clones share the same flag. Once cancelled a token stays cancelled; use a
/// fresh token for the next read. Cancelling wakes every queue currently
/// waited on through this token.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    waiters: Mutex<Vec<Weak<Shared>>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);

        let waiters = std::mem::take(&mut *self.inner.waiters.lock());
        for shared in waiters.iter().filter_map(Weak::upgrade) {
            // Waiters check the flag under this lock, so the wake cannot slip
            // in between their check and their wait.
            drop(shared.state.lock());
            shared.data_ready.notify_all();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    fn register(&self, shared: &Arc<Shared>) {
        let mut waiters = self.inner.waiters.lock();
        waiters.retain(|w| w.strong_count() > 0);
        waiters.push(Arc::downgrade(shared));
    }

    fn unregister(&self, shared: &Arc<Shared>) {
        let target = Arc::downgrade(shared);
        let mut waiters = self.inner.waiters.lock();
        if let Some(pos) = waiters.iter().position(|w| w.ptr_eq(&target)) {
            waiters.swap_remove(pos);
        }
    }

    #[cfg(test)]
    fn registered(&self) -> usize {
        self.inner.waiters.lock().len()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Fixed-capacity ring over a preallocated arena
struct Ring {
    slots: Box<[Sample]>,
    head: usize,
    tail: usize,
    len: usize,
}

impl Ring {
    fn with_capacity(capacity: usize) -> Result<Self> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| AcquisitionError::OutOfMemory {
                requested: capacity,
            })?;
        slots.resize(capacity, Sample::default());

        Ok(Self {
            slots: slots.into_boxed_slice(),
            head: 0,
            tail: 0,
            len: 0,
        })
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Push without overwrite (fails if full)
    fn push(&mut self, sample: Sample) -> bool {
        if self.is_full() {
            return false;
        }
        self.slots[self.tail] = sample;
        self.tail = (self.tail + 1) % self.capacity();
        self.len += 1;
        true
    }

    /// Push, discarding the oldest entry when full. Returns true if one was discarded.
    fn push_overwrite(&mut self, sample: Sample) -> bool {
        let overwrote = self.is_full();
        if overwrote {
            self.head = (self.head + 1) % self.capacity();
        } else {
            self.len += 1;
        }
        self.slots[self.tail] = sample;
        self.tail = (self.tail + 1) % self.capacity();
        overwrote
    }

    fn pop(&mut self) -> Option<Sample> {
        if self.len == 0 {
            return None;
        }
        let sample = self.slots[self.head];
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        Some(sample)
    }
}

struct QueueState {
    ring: Ring,
    closed: bool,
    dropped: u64,
}

/// Result of publishing a batch of samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PushSummary {
    /// Samples now in the queue
    pub accepted: usize,
    /// Samples lost to overflow (new ones rejected or old ones overwritten)
    pub dropped: usize,
}

struct Shared {
    state: Mutex<QueueState>,
    data_ready: Condvar,
}

/// Bounded multi-consumer sample queue
pub struct SampleQueue {
    shared: Arc<Shared>,
    policy: OverflowPolicy,
}

impl SampleQueue {
    /// Allocate a queue with `capacity` slots
    ///
    /// Fails with `OutOfMemory` if the arena cannot be reserved.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Result<Self> {
        if capacity == 0 {
            return Err(AcquisitionError::InvalidParameter(
                "Queue capacity must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    ring: Ring::with_capacity(capacity)?,
                    closed: false,
                    dropped: 0,
                }),
                data_ready: Condvar::new(),
            }),
            policy,
        })
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.shared.state.lock()
    }

    pub fn capacity(&self) -> usize {
        self.lock().ring.capacity()
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.lock().ring.len
    }

    pub fn is_empty(&self) -> bool {
        self.lock().ring.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.lock().ring.is_full()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Samples lost to overflow since creation
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    /// Add one sample and wake one waiting reader
    ///
    /// Returns whether the sample was accepted. Under `Reject` a full queue
    /// refuses the sample; under `OverwriteOldest` it is always accepted.
    /// A closed queue accepts nothing. Never blocks on a reader.
    pub fn push(&self, sample: Sample) -> bool {
        let summary = self.push_batch(std::iter::once(sample));
        summary.accepted == 1
    }

    /// Add samples in order, then wake every waiting reader once
    pub fn push_batch<I>(&self, samples: I) -> PushSummary
    where
        I: IntoIterator<Item = Sample>,
    {
        let mut summary = PushSummary::default();
        {
            let mut state = self.lock();
            if state.closed {
                return summary;
            }

            for sample in samples {
                match self.policy {
                    OverflowPolicy::Reject => {
                        if state.ring.push(sample) {
                            summary.accepted += 1;
                        } else {
                            summary.dropped += 1;
                        }
                    }
                    OverflowPolicy::OverwriteOldest => {
                        if state.ring.push_overwrite(sample) {
                            summary.dropped += 1;
                        }
                        summary.accepted += 1;
                    }
                }
            }
            state.dropped += summary.dropped as u64;
        }

        match summary.accepted {
            0 => {}
            1 => {
                self.shared.data_ready.notify_one();
            }
            _ => {
                self.shared.data_ready.notify_all();
            }
        }
        summary
    }

    /// Take the oldest sample without waiting
    pub fn try_pop(&self) -> Option<Sample> {
        self.lock().ring.pop()
    }

    /// Take the oldest sample, waiting while the queue is empty
    ///
    /// Fails with `DeviceRemoved` once the queue is closed and with
    /// `Interrupted` if `cancel` fires before data arrives. Neither failure
    /// touches the queued samples.
    pub fn pop_wait(&self, cancel: Option<&CancelToken>) -> Result<Sample> {
        let Some(token) = cancel else {
            return self.wait_for_sample(None);
        };

        token.register(&self.shared);
        let result = self.wait_for_sample(Some(token));
        token.unregister(&self.shared);
        result
    }

    fn wait_for_sample(&self, cancel: Option<&CancelToken>) -> Result<Sample> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return Err(AcquisitionError::DeviceRemoved);
            }
            if let Some(sample) = state.ring.pop() {
                return Ok(sample);
            }
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(AcquisitionError::Interrupted);
            }
            self.shared.data_ready.wait(&mut state);
        }
    }

    /// Stop accepting samples and fail every current and future wait
    pub fn close(&self) {
        self.lock().closed = true;
        self.shared.data_ready.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn sample(n: i16) -> Sample {
        Sample::new(n, n + 1, n + 2)
    }

    #[test]
    fn test_fifo_order_and_capacity() {
        let queue = SampleQueue::new(4, OverflowPolicy::Reject).unwrap();
        assert!(queue.is_empty());
        for n in 0..4 {
            assert!(queue.push(sample(n)));
            assert!(queue.len() <= queue.capacity());
        }
        assert!(queue.is_full());

        for n in 0..4 {
            assert_eq!(queue.try_pop(), Some(sample(n)));
        }
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn test_wraparound_keeps_order() {
        let queue = SampleQueue::new(3, OverflowPolicy::Reject).unwrap();
        let mut expected = 0;
        for n in 0..20 {
            assert!(queue.push(sample(n)));
            if n % 2 == 1 {
                assert_eq!(queue.try_pop(), Some(sample(expected)));
                assert_eq!(queue.try_pop(), Some(sample(expected + 1)));
                expected += 2;
            }
            assert!(queue.len() <= 3);
        }
    }

    #[test]
    fn test_reject_when_full() {
        let queue = SampleQueue::new(2, OverflowPolicy::Reject).unwrap();
        assert!(queue.push(sample(1)));
        assert!(queue.push(sample(2)));
        assert!(!queue.push(sample(3)));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.try_pop(), Some(sample(1)));
        assert_eq!(queue.try_pop(), Some(sample(2)));
    }

    #[test]
    fn test_overwrite_oldest_when_full() {
        let queue = SampleQueue::new(2, OverflowPolicy::OverwriteOldest).unwrap();
        assert!(queue.push(sample(1)));
        assert!(queue.push(sample(2)));
        assert!(queue.push(sample(3)));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.try_pop(), Some(sample(2)));
        assert_eq!(queue.try_pop(), Some(sample(3)));
    }

    #[test]
    fn test_push_batch_summary() {
        let queue = SampleQueue::new(3, OverflowPolicy::Reject).unwrap();
        let summary = queue.push_batch((0..5).map(sample));
        assert_eq!(summary, PushSummary { accepted: 3, dropped: 2 });
        assert_eq!(queue.try_pop(), Some(sample(0)));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            SampleQueue::new(0, OverflowPolicy::Reject),
            Err(AcquisitionError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_closed_queue_refuses_pushes() {
        let queue = SampleQueue::new(2, OverflowPolicy::Reject).unwrap();
        queue.close();
        assert!(!queue.push(sample(1)));
        assert!(queue.is_empty());
        assert_eq!(queue.pop_wait(None), Err(AcquisitionError::DeviceRemoved));
    }

    #[test]
    fn test_pop_wait_wakes_on_push() {
        let queue = Arc::new(SampleQueue::new(4, OverflowPolicy::Reject).unwrap());
        let (tx, rx) = mpsc::channel();

        let reader = {
            let queue = queue.clone();
            thread::spawn(move || tx.send(queue.pop_wait(None)).unwrap())
        };

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        queue.push(sample(7));
        let got = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(got, Ok(sample(7)));
        reader.join().unwrap();
    }

    #[test]
    fn test_pop_wait_cancelled() {
        let queue = Arc::new(SampleQueue::new(4, OverflowPolicy::Reject).unwrap());
        let token = CancelToken::new();
        let (tx, rx) = mpsc::channel();

        let reader = {
            let queue = queue.clone();
            let token = token.clone();
            thread::spawn(move || tx.send(queue.pop_wait(Some(&token))).unwrap())
        };

        thread::sleep(Duration::from_millis(30));
        token.cancel();
        let got = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(got, Err(AcquisitionError::Interrupted));
        reader.join().unwrap();

        // Cancellation leaves the queue usable
        assert!(queue.push(sample(1)));
        assert_eq!(queue.try_pop(), Some(sample(1)));
        assert_eq!(token.registered(), 0);
    }

    #[test]
    fn test_cancel_wakes_waiters_on_every_queue() {
        let first = Arc::new(SampleQueue::new(4, OverflowPolicy::Reject).unwrap());
        let second = Arc::new(SampleQueue::new(4, OverflowPolicy::Reject).unwrap());
        let token = CancelToken::new();
        let (tx, rx) = mpsc::channel();

        let readers: Vec<_> = [first.clone(), first.clone(), second.clone()]
            .into_iter()
            .map(|queue| {
                let token = token.clone();
                let tx = tx.clone();
                thread::spawn(move || tx.send(queue.pop_wait(Some(&token))).unwrap())
            })
            .collect();

        // Parked readers stay parked; nothing polls the token
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert_eq!(token.registered(), 3);

        token.cancel();
        for _ in 0..3 {
            let got = rx.recv_timeout(Duration::from_secs(2)).unwrap();
            assert_eq!(got, Err(AcquisitionError::Interrupted));
        }
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(token.registered(), 0);
    }

    #[test]
    fn test_cancelled_token_fails_fast() {
        let queue = SampleQueue::new(2, OverflowPolicy::Reject).unwrap();
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(queue.pop_wait(Some(&token)), Err(AcquisitionError::Interrupted));

        // Queued data still wins over a cancelled token
        queue.push(sample(3));
        assert_eq!(queue.pop_wait(Some(&token)), Ok(sample(3)));
        assert_eq!(token.registered(), 0);
    }

    #[test]
    fn test_close_wakes_all_waiters() {
        let queue = Arc::new(SampleQueue::new(4, OverflowPolicy::Reject).unwrap());
        let (tx, rx) = mpsc::channel();

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let queue = queue.clone();
                let tx = tx.clone();
                thread::spawn(move || tx.send(queue.pop_wait(None)).unwrap())
            })
            .collect();

        thread::sleep(Duration::from_millis(30));
        queue.close();
        for _ in 0..3 {
            let got = rx.recv_timeout(Duration::from_secs(2)).unwrap();
            assert_eq!(got, Err(AcquisitionError::DeviceRemoved));
        }
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn test_each_sample_delivered_once() {
        let queue = Arc::new(SampleQueue::new(64, OverflowPolicy::Reject).unwrap());
        let (tx, rx) = mpsc::channel();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                let tx = tx.clone();
                thread::spawn(move || {
                    for _ in 0..8 {
                        tx.send(queue.pop_wait(None).unwrap().x).unwrap();
                    }
                })
            })
            .collect();

        let summary = queue.push_batch((0..32).map(sample));
        assert_eq!(summary.accepted, 32);

        let mut seen: Vec<i16> = (0..32)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..32).collect::<Vec<_>>());
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
