mod config;
mod correlation;
mod handlers;
mod id;
mod io_loop;
mod queues;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use mio::event::Source;
use mio::{Interest, Poll, Token};

use dowow_core::Request;

pub use config::ConnectionConfig;
pub use handlers::HandlerFn;
pub use id::Parity;

use correlation::CorrelationMap;
use handlers::HandlerTable;
use id::IdAllocator;
use queues::{ReceiveQueue, SendQueue};

use crate::error::{Error, Result};
use crate::transport::{Address, StreamEndpoint};

const STOP_TOKEN: Token = Token(0);
const TRANSPORT_TOKEN: Token = Token(1);
const PUSH_TOKEN: Token = Token(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Disconnecting,
    Closed,
}

/// A public-facing blocking timeout: `0` never blocks, a negative value
/// blocks forever, a positive one bounds the wait in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    NoWait,
    Forever,
    After(Duration),
}

impl From<i64> for Timeout {
    fn from(millis: i64) -> Self {
        match millis {
            0 => Timeout::NoWait,
            m if m < 0 => Timeout::Forever,
            m => Timeout::After(Duration::from_millis(m as u64)),
        }
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Timeout::NoWait
    }
}

impl Timeout {
    fn as_duration_option(self) -> Option<Duration> {
        match self {
            Timeout::NoWait => Some(Duration::ZERO),
            Timeout::Forever => None,
            Timeout::After(d) => Some(d),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PushOptions {
    /// Present for API parity with callers that distinguish a copying
    /// push from a moving one; Rust's ownership already makes every
    /// push a move, so this has no behavioral effect.
    pub copy: bool,
    pub change_id: bool,
    pub timeout: Timeout,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DisconnectOptions {
    pub forced: bool,
    pub wait_for_join: bool,
}

pub(crate) struct Shared {
    state: Mutex<State>,
    state_cv: Condvar,
    send_queue: SendQueue,
    recv_queue: ReceiveQueue,
    correlation: CorrelationMap,
    handlers: HandlerTable,
    config: Mutex<ConnectionConfig>,
    id_alloc: IdAllocator,
    push_waker: crate::util::Notifier,
    stop_waker: crate::util::Notifier,
    closing: AtomicBool,
    last_error: Mutex<Option<String>>,
    refs: AtomicUsize,
    join: Mutex<Option<JoinHandle<()>>>,
    peer_address: Option<Address>,
    session: Mutex<Option<Box<dyn std::any::Any + Send + Sync>>>,
}

impl Shared {
    fn handle(self: &Arc<Self>) -> Connection {
        Connection { shared: Arc::clone(self) }
    }
}

/// A framed request/response Connection backed by one background I/O
/// thread. Cloning a `Connection` is cheap and shares the same
/// underlying thread and state — handlers receive a clone to push
/// replies on.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    pub(crate) fn spawn(stream: StreamEndpoint, config: ConnectionConfig, peer_address: Option<Address>) -> Result<Self> {
        let mut poll = Poll::new().map_err(Error::Transport)?;
        let mut stream = stream;
        stream
            .register(poll.registry(), TRANSPORT_TOKEN, Interest::READABLE)
            .map_err(Error::Transport)?;
        let push_waker = crate::util::Notifier::new(poll.registry(), PUSH_TOKEN).map_err(Error::Transport)?;
        let stop_waker = crate::util::Notifier::new(poll.registry(), STOP_TOKEN).map_err(Error::Transport)?;

        let shared = Arc::new(Shared {
            state: Mutex::new(State::Open),
            state_cv: Condvar::new(),
            send_queue: SendQueue::default(),
            recv_queue: ReceiveQueue::default(),
            correlation: CorrelationMap::default(),
            handlers: HandlerTable::default(),
            id_alloc: IdAllocator::new(config.parity),
            config: Mutex::new(config),
            push_waker,
            stop_waker,
            closing: AtomicBool::new(false),
            last_error: Mutex::new(None),
            refs: AtomicUsize::new(1),
            join: Mutex::new(None),
            peer_address,
            session: Mutex::new(None),
        });

        let thread_shared = Arc::clone(&shared);
        let join = std::thread::Builder::new()
            .name("dowow-connection".to_string())
            .spawn(move || io_loop::run(thread_shared, stream, poll))
            .map_err(Error::Transport)?;
        *shared.join.lock().unwrap() = Some(join);

        Ok(Connection { shared })
    }

    pub fn is_connected(&self) -> bool {
        !matches!(*self.shared.state.lock().unwrap(), State::Closed)
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.lock().unwrap().clone()
    }

    pub fn peer_address(&self) -> Option<&Address> {
        self.shared.peer_address.as_ref()
    }

    /// Enqueues `request` for send. See module docs for the full timeout
    /// contract; in short, a zero-or-absent timeout fires-and-forgets, a
    /// positive one blocks for a correlated reply, a negative one blocks
    /// forever.
    pub fn push(&self, mut request: Request, opts: PushOptions) -> Option<Request> {
        {
            let state = self.shared.state.lock().unwrap();
            if !matches!(*state, State::Open) {
                return None;
            }
        }

        if opts.change_id {
            request.id = self.shared.id_alloc.allocate();
            let parity = self.shared.config.lock().unwrap().parity;
            dowow_assert::safe_assert!(
                request.id % 2 == parity.bit(),
                "allocated id {} does not match configured parity",
                request.id
            );
        }
        let id = request.id;

        let timeout = opts.timeout;
        if matches!(timeout, Timeout::NoWait) {
            self.shared.send_queue.push_back(request);
            let _ = self.shared.push_waker.notify();
            return None;
        }

        let slot = self.shared.correlation.register(id);
        self.shared.send_queue.push_back(request);
        let _ = self.shared.push_waker.notify();
        let response = correlation::wait(&slot, timeout.as_duration_option());
        self.shared.correlation.unregister(id);
        response
    }

    /// Dequeues the oldest unhandled inbound Request, per the same
    /// timeout contract as `push`.
    pub fn pull(&self, timeout: Timeout) -> Option<Request> {
        let shared = Arc::clone(&self.shared);
        self.shared
            .recv_queue
            .pop_front_wait(timeout.as_duration_option(), move || {
                !matches!(*shared.state.lock().unwrap(), State::Closed)
            })
    }

    pub fn disconnect(&self, opts: DisconnectOptions) {
        {
            let mut state = self.shared.state.lock().unwrap();
            match *state {
                State::Closed => return,
                State::Open if !opts.forced => *state = State::Disconnecting,
                _ => {}
            }
        }
        if opts.forced {
            self.shared.closing.store(true, Ordering::Release);
        }
        let _ = self.shared.stop_waker.notify();
        let _ = self.shared.push_waker.notify();

        if opts.wait_for_join {
            self.wait_for_stop(Timeout::Forever);
        }
    }

    pub fn wait_for_stop(&self, timeout: Timeout) -> bool {
        let guard = self.shared.state.lock().unwrap();
        match timeout.as_duration_option() {
            None => {
                let _unused = self
                    .shared
                    .state_cv
                    .wait_while(guard, |s| !matches!(*s, State::Closed))
                    .unwrap();
                true
            }
            Some(d) => {
                let (guard, _) = self
                    .shared
                    .state_cv
                    .wait_timeout_while(guard, d, |s| !matches!(*s, State::Closed))
                    .unwrap();
                matches!(*guard, State::Closed)
            }
        }
    }

    pub fn set_handler_named(&self, name: impl Into<String>, handler: Option<HandlerFn>) {
        self.shared.handlers.set_named(name, handler);
    }

    pub fn set_handler_default(&self, handler: Option<HandlerFn>) {
        self.shared.handlers.set_default(handler);
    }

    pub fn set_config(&self, f: impl FnOnce(&mut ConnectionConfig)) {
        f(&mut self.shared.config.lock().unwrap());
    }

    /// Replaces this Connection's opaque per-session slot with a typed
    /// value. Owned by the Connection and dropped along with it.
    pub fn set_session_data<T: std::any::Any + Send + Sync>(&self, data: T) {
        *self.shared.session.lock().unwrap() = Some(Box::new(data));
    }

    pub fn clear_session_data(&self) {
        *self.shared.session.lock().unwrap() = None;
    }

    /// Runs `f` against the session slot if one is set and holds a `T`.
    /// Returns `None` if no slot is set or it holds a different type.
    pub fn with_session_data<T: std::any::Any + Send + Sync, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.shared.session.lock().unwrap();
        guard.as_mut().and_then(|b| b.downcast_mut::<T>()).map(f)
    }

    /// Bookkeeping-only counter kept for API parity with a caller that
    /// tracks external borrows explicitly; `Arc<Shared>` is what actually
    /// governs the Connection's lifetime in this crate.
    pub fn increase_refs(&self) {
        self.shared.refs.fetch_add(1, Ordering::AcqRel);
    }

    pub fn decrease_refs(&self) {
        self.shared.refs.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn ref_count(&self) -> usize {
        self.shared.refs.load(Ordering::Acquire)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Only the thread's own clone and this handle remain: no other
        // external reference is keeping the Connection alive, so tear
        // down the background task before the last reference is gone.
        if Arc::strong_count(&self.shared) != 2 {
            return;
        }
        self.disconnect(DisconnectOptions { forced: true, wait_for_join: false });
        if let Some(join) = self.shared.join.lock().unwrap().take() {
            let _ = join.join();
        }
    }
}
