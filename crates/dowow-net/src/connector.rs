use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use mio::event::Source;
use mio::{Events, Interest, Poll, Token};
use tracing::debug;

use crate::connection::{Connection, ConnectionConfig, Parity, Timeout};
use crate::error::{Error, Result};
use crate::transport::{Address, StreamEndpoint};
use crate::util::Notifier;

const CONNECT: Token = Token(0);
const CANCEL: Token = Token(1);

enum Outcome {
    Pending,
    Connected(Option<Connection>),
    Failed(String),
    Cancelled,
}

struct Shared {
    outcome: Mutex<Outcome>,
    cv: Condvar,
    cancel: AtomicBool,
    cancel_waker: Notifier,
    join: Mutex<Option<JoinHandle<()>>>,
}

/// Dials a single Connection in the background with a bounded connect
/// timeout, then hands ownership of the resulting Connection to whoever
/// calls `take` first. The dialer always allocates from the even ID
/// half; accepted (server-side) Connections take the odd half.
pub struct Connector {
    shared: Arc<Shared>,
}

impl Connector {
    pub fn dial(addr: Address, conn_config: ConnectionConfig, connect_timeout: Duration) -> Result<Self> {
        let poll = Poll::new().map_err(Error::Transport)?;
        let cancel_waker = Notifier::new(poll.registry(), CANCEL).map_err(Error::Transport)?;

        let shared = Arc::new(Shared {
            outcome: Mutex::new(Outcome::Pending),
            cv: Condvar::new(),
            cancel: AtomicBool::new(false),
            cancel_waker,
            join: Mutex::new(None),
        });

        let thread_shared = Arc::clone(&shared);
        let join = std::thread::Builder::new()
            .name("dowow-connector".to_string())
            .spawn(move || run(thread_shared, addr, conn_config, connect_timeout, poll))
            .map_err(Error::Transport)?;
        *shared.join.lock().unwrap() = Some(join);

        Ok(Connector { shared })
    }

    pub fn is_ready(&self) -> bool {
        !matches!(*self.shared.outcome.lock().unwrap(), Outcome::Pending)
    }

    pub fn wait(&self, timeout: Timeout) -> bool {
        let mut guard = self.shared.outcome.lock().unwrap();
        let predicate = |o: &mut Outcome| matches!(o, Outcome::Pending);
        match timeout {
            Timeout::Forever => {
                let _unused = self.shared.cv.wait_while(guard, predicate).unwrap();
                true
            }
            Timeout::NoWait => !predicate(&mut guard),
            Timeout::After(d) => {
                let (guard, _) = self.shared.cv.wait_timeout_while(guard, d, predicate).unwrap();
                !matches!(*guard, Outcome::Pending)
            }
        }
    }

    /// Takes ownership of the established Connection. Returns `None` on
    /// the first call if the dial is still pending, failed, or was
    /// cancelled, and on every call after the first successful one.
    pub fn take(&self) -> Option<Connection> {
        let mut outcome = self.shared.outcome.lock().unwrap();
        match &mut *outcome {
            Outcome::Connected(slot) => slot.take(),
            _ => None,
        }
    }

    pub fn last_error(&self) -> Option<String> {
        match &*self.shared.outcome.lock().unwrap() {
            Outcome::Failed(e) => Some(e.clone()),
            _ => None,
        }
    }

    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::Release);
        let _ = self.shared.cancel_waker.notify();
    }
}

impl Drop for Connector {
    fn drop(&mut self) {
        self.cancel();
        if let Some(join) = self.shared.join.lock().unwrap().take() {
            let _ = join.join();
        }
    }
}

fn settle(shared: &Arc<Shared>, outcome: Outcome) {
    *shared.outcome.lock().unwrap() = outcome;
    shared.cv.notify_all();
}

fn run(shared: Arc<Shared>, addr: Address, conn_config: ConnectionConfig, connect_timeout: Duration, mut poll: Poll) {
    let deadline = Instant::now() + connect_timeout;

    let mut stream = match StreamEndpoint::connect(&addr) {
        Ok(s) => s,
        Err(e) => return settle(&shared, Outcome::Failed(format!("connect failed: {e}"))),
    };
    if let Err(e) = stream.register(poll.registry(), CONNECT, Interest::WRITABLE) {
        return settle(&shared, Outcome::Failed(format!("register failed: {e}")));
    }

    let mut events = Events::with_capacity(8);
    loop {
        if shared.cancel.load(Ordering::Acquire) {
            return settle(&shared, Outcome::Cancelled);
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return settle(&shared, Outcome::Failed("connect timed out".to_string()));
        }
        if let Err(e) = poll.poll(&mut events, Some(remaining)) {
            if e.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return settle(&shared, Outcome::Failed(format!("poll failed: {e}")));
        }

        for event in events.iter() {
            match event.token() {
                CANCEL => return settle(&shared, Outcome::Cancelled),
                CONNECT if event.is_writable() => match stream.take_socket_error() {
                    Ok(None) => {
                        let _ = stream.deregister(poll.registry());
                        match Connection::spawn(stream, conn_config.with_parity(Parity::Even), Some(addr)) {
                            Ok(conn) => {
                                debug!("dial succeeded");
                                return settle(&shared, Outcome::Connected(Some(conn)));
                            }
                            Err(e) => return settle(&shared, Outcome::Failed(format!("{e}"))),
                        }
                    }
                    Ok(Some(err)) => return settle(&shared, Outcome::Failed(format!("connect failed: {err}"))),
                    Err(err) => return settle(&shared, Outcome::Failed(format!("socket error probe failed: {err}"))),
                },
                _ => {}
            }
        }
    }
}
