//! Event dispatch for watermark interrupts
//!
//! Each registered handler gets a worker thread that runs it once per raised
//! event. Invocations for one handler never overlap. At most one event is
//! kept pending: raising the line while an event is already queued merges
//! into it, which is safe because a handler drains everything the hardware
//! reports when it runs.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, trace, warn};

/// Work to run when the hardware signals an event
pub trait EventHandler: Send + Sync {
    /// Called from the dispatch worker, one invocation at a time
    ///
    /// Must not block waiting on consumers. Failures are the handler's to
    /// report; the event always counts as handled.
    fn handle_event(&self);
}

/// Cloneable handle used to raise events for one handler
#[derive(Clone)]
pub struct EventLine {
    tx: SyncSender<()>,
    running: Arc<AtomicBool>,
}

impl EventLine {
    /// Signal an event. Returns false once the dispatcher has shut down.
    pub fn raise(&self) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                trace!("event merged into pending one");
                true
            }
            Err(TrySendError::Disconnected(())) => false,
        }
    }
}

/// Worker thread bound to one event handler
pub struct Dispatcher {
    name: String,
    line: EventLine,
    worker: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Start dispatching events to `handler`
    ///
    /// `holdoff` is slept after each invocation before the next event is taken.
    pub fn spawn(
        name: &str,
        handler: Arc<dyn EventHandler>,
        holdoff: Duration,
    ) -> io::Result<Self> {
        let (tx, rx) = mpsc::sync_channel(1);
        let running = Arc::new(AtomicBool::new(true));

        let worker = {
            let running = running.clone();
            thread::Builder::new()
                .name(format!("{}-irq", name))
                .spawn(move || run_worker(rx, handler, running, holdoff))?
        };

        debug!(handler = name, "event dispatcher started");
        Ok(Self {
            name: name.to_string(),
            line: EventLine { tx, running },
            worker: Some(worker),
        })
    }

    /// Handle for raising events from another thread
    pub fn line(&self) -> EventLine {
        self.line.clone()
    }

    pub fn raise(&self) -> bool {
        self.line.raise()
    }

    /// Stop the worker after any invocation in progress completes
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.line.running.store(false, Ordering::SeqCst);
        // Wake the worker if it is idle; a pending event wakes it just as well
        let _ = self.line.tx.try_send(());
        if worker.join().is_err() {
            warn!(handler = %self.name, "event handler panicked");
        }
        debug!(handler = %self.name, "event dispatcher stopped");
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(
    rx: Receiver<()>,
    handler: Arc<dyn EventHandler>,
    running: Arc<AtomicBool>,
    holdoff: Duration,
) {
    while rx.recv().is_ok() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        handler.handle_event();
        if !holdoff.is_zero() {
            thread::sleep(holdoff);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
        active: AtomicUsize,
        overlapped: AtomicBool,
        delay: Duration,
    }

    impl EventHandler for Counting {
        fn handle_event(&self) {
            if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            thread::sleep(self.delay);
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn wait_for(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let end = Instant::now() + deadline;
        while Instant::now() < end {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        done()
    }

    #[test]
    fn test_each_raise_runs_handler() {
        let handler = Arc::new(Counting::default());
        let dispatcher = Dispatcher::spawn("test", handler.clone(), Duration::ZERO).unwrap();

        for expected in 1..=3 {
            assert!(dispatcher.raise());
            assert!(wait_for(Duration::from_secs(2), || {
                handler.calls.load(Ordering::SeqCst) == expected
            }));
        }
        dispatcher.shutdown();
    }

    #[test]
    fn test_invocations_never_overlap_and_merge() {
        let handler = Arc::new(Counting {
            delay: Duration::from_millis(20),
            ..Default::default()
        });
        let dispatcher = Dispatcher::spawn("test", handler.clone(), Duration::ZERO).unwrap();

        let lines: Vec<_> = (0..4).map(|_| dispatcher.line()).collect();
        let raisers: Vec<_> = lines
            .into_iter()
            .map(|line| thread::spawn(move || (0..10).for_each(|_| assert!(line.raise()))))
            .collect();
        for raiser in raisers {
            raiser.join().unwrap();
        }

        assert!(wait_for(Duration::from_secs(2), || {
            handler.calls.load(Ordering::SeqCst) >= 1
        }));
        dispatcher.shutdown();
        let calls = handler.calls.load(Ordering::SeqCst);
        assert!(calls >= 1 && calls < 40, "calls = {}", calls);
        assert!(!handler.overlapped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_raise_after_shutdown_fails() {
        let handler = Arc::new(Counting::default());
        let dispatcher = Dispatcher::spawn("test", handler, Duration::ZERO).unwrap();
        let line = dispatcher.line();
        drop(dispatcher);
        assert!(!line.raise());
    }

    #[test]
    fn test_holdoff_spaces_invocations() {
        struct Stamped(Mutex<Vec<Instant>>);
        impl EventHandler for Stamped {
            fn handle_event(&self) {
                self.0.lock().unwrap().push(Instant::now());
            }
        }

        let handler = Arc::new(Stamped(Mutex::new(Vec::new())));
        let dispatcher =
            Dispatcher::spawn("test", handler.clone(), Duration::from_millis(40)).unwrap();

        assert!(dispatcher.raise());
        assert!(wait_for(Duration::from_secs(2), || handler.0.lock().unwrap().len() == 1));
        assert!(dispatcher.raise());
        assert!(wait_for(Duration::from_secs(2), || handler.0.lock().unwrap().len() == 2));
        dispatcher.shutdown();

        let stamps = handler.0.lock().unwrap();
        assert!(stamps[1] - stamps[0] >= Duration::from_millis(40));
    }
}
