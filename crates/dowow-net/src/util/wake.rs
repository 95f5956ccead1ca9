use std::io;

use mio::{Registry, Token, Waker};

/// Cross-thread wake notifier: setting it makes the background loop's next
/// `Poll::poll` return with the registered token ready, exactly once per
/// `notify`. Coalescing multiple notifies before the loop next polls is
/// fine — the loop always re-reads the resource (queue, stop flag) the
/// notify was for rather than counting notifications.
pub struct Notifier {
    waker: Waker,
}

impl Notifier {
    pub fn new(registry: &Registry, token: Token) -> io::Result<Self> {
        Ok(Self { waker: Waker::new(registry, token)? })
    }

    pub fn notify(&self) -> io::Result<()> {
        self.waker.wake()
    }
}
