use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use dowow_core::Request;

/// FIFO of Requests awaiting send. The background loop is the sole
/// consumer; `Connection::push` and the liveness filler are the producers.
#[derive(Default)]
pub struct SendQueue {
    inner: Mutex<VecDeque<Request>>,
}

impl SendQueue {
    pub fn push_back(&self, req: Request) {
        self.inner.lock().unwrap().push_back(req);
    }

    /// Liveness fillers jump the line so a busy send queue never delays
    /// keeping the peer-liveness timer fed.
    pub fn push_front(&self, req: Request) {
        self.inner.lock().unwrap().push_front(req);
    }

    pub fn pop_front(&self) -> Option<Request> {
        self.inner.lock().unwrap().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

/// Inbound Requests that fell through every dispatch step and the
/// condvar that wakes blocked `Pull` callers. The queue is intentionally
/// preserved across Closed so a caller can still drain whatever arrived
/// before the peer went away.
#[derive(Default)]
pub struct ReceiveQueue {
    inner: Mutex<VecDeque<Request>>,
    cv: Condvar,
}

impl ReceiveQueue {
    pub fn push_back(&self, req: Request) {
        self.inner.lock().unwrap().push_back(req);
        self.cv.notify_all();
    }

    /// Pops the oldest unhandled Request, waiting up to `timeout` (`None`
    /// = forever) while `still_open` keeps returning true. Once
    /// `still_open` goes false and the queue is empty there is nothing
    /// left to wait for, so this returns `None` immediately.
    pub fn pop_front_wait(&self, timeout: Option<Duration>, still_open: impl Fn() -> bool) -> Option<Request> {
        let mut guard = self.inner.lock().unwrap();
        let deadline = timeout.map(|d| Instant::now() + d);
        loop {
            if let Some(req) = guard.pop_front() {
                return Some(req);
            }
            if !still_open() {
                return None;
            }
            match deadline {
                None => {
                    guard = self.cv.wait(guard).unwrap();
                }
                Some(at) => {
                    let remaining = at.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return None;
                    }
                    let (next, timed_out) = self.cv.wait_timeout(guard, remaining).unwrap();
                    guard = next;
                    if timed_out.timed_out() && guard.is_empty() {
                        return None;
                    }
                }
            }
        }
    }

    /// Wakes every blocked `Pull` caller without adding data, used when
    /// the Connection closes so waiters can re-check `still_open`.
    pub fn wake_all(&self) {
        self.cv.notify_all();
    }
}
