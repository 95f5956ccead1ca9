use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use dowow_core::Request;

pub(crate) struct Slot {
    response: Mutex<Option<Request>>,
    cv: Condvar,
    closed: AtomicBool,
}

/// Maps request IDs to callers blocked inside a correlated `Push`. A
/// colliding registration (the same ID registered twice, which only
/// happens with caller-supplied, non-reallocated IDs) overwrites the
/// older waiter: the new Push owns the ID going forward and the old
/// waiter simply times out.
#[derive(Default)]
pub struct CorrelationMap {
    waiters: Mutex<HashMap<u32, Arc<Slot>>>,
}

impl CorrelationMap {
    pub fn register(&self, id: u32) -> Arc<Slot> {
        let slot = Arc::new(Slot { response: Mutex::new(None), cv: Condvar::new(), closed: AtomicBool::new(false) });
        self.waiters.lock().unwrap().insert(id, Arc::clone(&slot));
        slot
    }

    pub fn unregister(&self, id: u32) {
        self.waiters.lock().unwrap().remove(&id);
    }

    /// Delivers an inbound Request to its waiter, if any is registered
    /// for this ID. Returns `true` if delivered (cascade stops there).
    pub fn deliver(&self, req: Request) -> Result<(), Request> {
        let slot = { self.waiters.lock().unwrap().remove(&req.id) };
        match slot {
            Some(slot) => {
                *slot.response.lock().unwrap() = Some(req);
                slot.cv.notify_all();
                Ok(())
            }
            None => Err(req),
        }
    }

    /// Wakes every registered waiter with no response, used on forced or
    /// errored shutdown so blocked Pushes return `None` instead of
    /// hanging until their timeout (or, for `Timeout::Forever`, forever).
    pub fn wake_all_with_none(&self) {
        let waiters = self.waiters.lock().unwrap();
        for slot in waiters.values() {
            slot.closed.store(true, Ordering::Release);
            slot.cv.notify_all();
        }
    }
}

pub fn wait(slot: &Arc<Slot>, timeout: Option<Duration>) -> Option<Request> {
    let mut guard = slot.response.lock().unwrap();
    let deadline = timeout.map(|d| Instant::now() + d);
    loop {
        if let Some(req) = guard.take() {
            return Some(req);
        }
        if slot.closed.load(Ordering::Acquire) {
            return None;
        }
        match deadline {
            None => guard = slot.cv.wait(guard).unwrap(),
            Some(at) => {
                let remaining = at.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return None;
                }
                let (next, _timed_out) = slot.cv.wait_timeout(guard, remaining).unwrap();
                guard = next;
            }
        }
    }
}
