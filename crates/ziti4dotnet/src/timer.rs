//! Timers armed on an [`EventLoop`].
//!
//! A timer is a boxed handle plus a task on the loop that sleeps until the
//! initial delay, invokes the C callback with the handle, and then repeats
//! every `repeat` interval until stopped. A zero `repeat` makes it one-shot.

use std::time::Duration;

use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::event_loop::EventLoop;

/// Callback invoked on the loop thread each time a timer fires.
pub type TimerCallback = unsafe extern "C" fn(timer: *mut Timer);

/// Opaque timer handle handed to the foreign caller.
#[derive(Debug)]
pub struct Timer {
    cancel: CancellationToken,
    delay: Duration,
    repeat: Duration,
}

impl Timer {
    /// Delay before the first firing.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Period between firings; zero for a one-shot timer.
    pub fn repeat(&self) -> Duration {
        self.repeat
    }

    /// Returns true once the timer has been stopped or its loop closed.
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

struct TimerPtr(*mut Timer);

// The pointer is only handed back to the callback on the loop thread; the
// firing task never dereferences it.
unsafe impl Send for TimerPtr {}

/// Arms a timer on `event_loop`.
///
/// The returned handle stays valid until [`stop`] is called on it. The first
/// firing happens `delay` after registration, once the loop is running.
pub fn register(
    event_loop: &EventLoop,
    callback: TimerCallback,
    delay: Duration,
    repeat: Duration,
) -> *mut Timer {
    let cancel = event_loop.timer_token();
    let timer = Box::into_raw(Box::new(Timer {
        cancel: cancel.clone(),
        delay,
        repeat,
    }));

    debug!(?delay, ?repeat, "registered timer {:p}", timer);
    event_loop.spawn(fire(TimerPtr(timer), callback, cancel, delay, repeat));
    timer
}

async fn fire(
    timer: TimerPtr,
    callback: TimerCallback,
    cancel: CancellationToken,
    delay: Duration,
    repeat: Duration,
) {
    let start = Instant::now() + delay;

    if repeat.is_zero() {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {}
            _ = sleep_until(start) => unsafe { callback(timer.0) },
        }
        return;
    }

    let mut ticks = interval_at(start, repeat);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticks.tick() => {}
        }
        // The callback may stop (and free) the timer; only `cancel` is used after it.
        unsafe { callback(timer.0) };
    }
}

/// Cancels future firings of `timer` and releases the handle.
///
/// # Safety
///
/// - `timer` must be null or a handle returned by [`register`] that has not
///   been stopped yet.
/// - It may be called from inside the timer's own callback.
pub unsafe fn stop(timer: *mut Timer) {
    if timer.is_null() {
        return;
    }
    let timer = Box::from_raw(timer);
    debug!("stopping timer {:p}", &*timer);
    timer.cancel.cancel();
}
