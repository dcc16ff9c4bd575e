//! Event loop handles.
//!
//! Every loop wraps a current-thread Tokio runtime, so all work spawned on a
//! loop (timer firings, SDK completions) runs on whichever thread is inside
//! [`EventLoop::run`], one callback at a time. Pending work is counted by a
//! [`TaskTracker`]; `run` returns once the tracker drains or [`EventLoop::stop`]
//! is requested.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::OnceCell;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

use crate::error::{BridgeError, BridgeResult};

static DEFAULT_LOOP: OnceCell<EventLoop> = OnceCell::new();

/// A cooperative, single-threaded event loop.
#[derive(Debug)]
pub struct EventLoop {
    runtime: Runtime,
    tracker: TaskTracker,
    timers: CancellationToken,
    stop: Notify,
    stop_requested: AtomicBool,
    running: AtomicBool,
}

/// Clears the running flag when `run` exits, including by unwinding.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl EventLoop {
    /// Creates an independent loop. The caller owns it.
    pub fn new() -> BridgeResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .thread_name("ziti4dotnet-loop")
            .build()
            .map_err(|source| BridgeError::Runtime { source })?;

        Ok(Self {
            runtime,
            tracker: TaskTracker::new(),
            timers: CancellationToken::new(),
            stop: Notify::new(),
            stop_requested: AtomicBool::new(false),
            running: AtomicBool::new(false),
        })
    }

    /// Returns the process-wide default loop, creating it on first use.
    ///
    /// The default loop lives until process exit.
    pub fn default_loop() -> BridgeResult<&'static EventLoop> {
        DEFAULT_LOOP.get_or_try_init(|| {
            debug!("creating default event loop");
            EventLoop::new()
        })
    }

    /// Returns true if `self` is the default loop.
    pub fn is_default(&self) -> bool {
        DEFAULT_LOOP
            .get()
            .is_some_and(|default| std::ptr::eq(default, self))
    }

    /// Returns true while some thread is inside [`EventLoop::run`].
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of spawned tasks that have not finished yet.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Queues `future` on this loop. It makes progress only while the loop runs.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn_on(future, self.runtime.handle());
    }

    /// Token whose cancellation stops every timer of this loop.
    pub(crate) fn timer_token(&self) -> CancellationToken {
        self.timers.child_token()
    }

    /// Drives the loop until no pending work remains.
    ///
    /// Returns `0` if the loop drained, or the number of tasks still pending
    /// if [`EventLoop::stop`] ended the run early. Blocks the calling thread.
    /// Entering `run` while this loop (or any other loop on the same thread)
    /// is already running fails with [`BridgeError::LoopBusy`].
    pub fn run(&self) -> BridgeResult<usize> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(BridgeError::LoopBusy);
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(BridgeError::LoopBusy);
        }
        let _guard = RunningGuard(&self.running);

        debug!("running loop with address: {:p}", self);
        let pending = self.runtime.block_on(async {
            self.tracker.close();
            loop {
                let notified = self.stop.notified();
                if self.stop_requested.swap(false, Ordering::AcqRel) {
                    break self.tracker.len();
                }
                tokio::select! {
                    _ = self.tracker.wait() => break 0,
                    _ = notified => {}
                }
            }
        });
        self.tracker.reopen();
        self.stop_requested.store(false, Ordering::Release);

        debug!(pending, "loop at {:p} returned", self);
        Ok(pending)
    }

    /// Makes the current run return after the callback in progress.
    ///
    /// If the loop is idle, the next run returns as soon as it starts. A stop
    /// request does not outlive the run it ended.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.stop.notify_waiters();
    }

    /// Releases the loop. Remaining timers are cancelled and queued work is
    /// dropped without running.
    pub fn close(self) {
        debug!("closing event loop with {} pending tasks", self.tracker.len());
        self.timers.cancel();
        self.runtime.shutdown_background();
    }
}
