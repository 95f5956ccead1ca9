use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use mio::event::Source;
use mio::{Events, Poll, Token};
use tracing::{debug, info, warn};

use crate::connection::{Connection, ConnectionConfig, DisconnectOptions, Parity, Timeout};
use crate::error::{Error, Result};
use crate::transport::{Address, ListenerEndpoint};
use crate::util::Notifier;

const STOP: Token = Token(0);
const LISTENER: Token = Token(1);

/// Periodic sweep interval the accept loop uses to notice Connections
/// that closed on their own background thread. Each Connection runs its
/// own `mio::Poll`, so its stop event cannot be folded into the same
/// `Poll` the Server's accept loop waits on; polling this often keeps
/// reap latency low without a dedicated notification channel per
/// Connection.
const REAP_INTERVAL: Duration = Duration::from_millis(200);

pub type ServerCallback = Arc<dyn Fn(u64, &Connection) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct ServerOptions {
    pub max_connections: Option<usize>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self { max_connections: None }
    }
}

struct Entry {
    id: u64,
    tag: Mutex<Option<String>>,
    conn: Connection,
}

struct Shared {
    local_addr: Address,
    state: Mutex<bool>, // true while running
    state_cv: Condvar,
    connections: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
    closing: AtomicBool,
    stop_waker: Notifier,
    join: Mutex<Option<JoinHandle<()>>>,
    on_connected: Mutex<Option<ServerCallback>>,
    on_disconnected: Mutex<Option<ServerCallback>>,
}

/// Accepts Connections on a listening endpoint and owns their live set.
/// One background thread runs the accept loop; every accepted Connection
/// runs its own background I/O thread independently.
pub struct Server {
    shared: Arc<Shared>,
}

impl Server {
    pub fn start(addr: Address, conn_config: ConnectionConfig, opts: ServerOptions) -> Result<Self> {
        let conn_config = conn_config.with_parity(Parity::Odd);

        let mut poll = Poll::new().map_err(Error::Transport)?;
        let mut listener = ListenerEndpoint::bind(&addr)?;
        let local_addr = listener.local_addr().map_err(Error::Transport)?;
        listener
            .register(poll.registry(), LISTENER, mio::Interest::READABLE)
            .map_err(Error::Transport)?;
        let stop_waker = Notifier::new(poll.registry(), STOP).map_err(Error::Transport)?;

        let shared = Arc::new(Shared {
            local_addr,
            state: Mutex::new(true),
            state_cv: Condvar::new(),
            connections: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            closing: AtomicBool::new(false),
            stop_waker,
            join: Mutex::new(None),
            on_connected: Mutex::new(None),
            on_disconnected: Mutex::new(None),
        });

        let thread_shared = Arc::clone(&shared);
        let join = std::thread::Builder::new()
            .name("dowow-server-accept".to_string())
            .spawn(move || run(thread_shared, listener, poll, conn_config, opts))
            .map_err(Error::Transport)?;
        *shared.join.lock().unwrap() = Some(join);

        Ok(Server { shared })
    }

    pub fn local_addr(&self) -> &Address {
        &self.shared.local_addr
    }

    pub fn set_on_connected(&self, cb: Option<ServerCallback>) {
        *self.shared.on_connected.lock().unwrap() = cb;
    }

    pub fn set_on_disconnected(&self, cb: Option<ServerCallback>) {
        *self.shared.on_disconnected.lock().unwrap() = cb;
    }

    pub fn connections(&self) -> Vec<(u64, Connection)> {
        self.shared.connections.lock().unwrap().iter().map(|e| (e.id, e.conn.clone())).collect()
    }

    pub fn find_by_id(&self, id: u64) -> Option<Connection> {
        self.shared.connections.lock().unwrap().iter().find(|e| e.id == id).map(|e| e.conn.clone())
    }

    pub fn find_by_tag(&self, tag: &str) -> Option<Connection> {
        self.shared
            .connections
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.tag.lock().unwrap().as_deref() == Some(tag))
            .map(|e| e.conn.clone())
    }

    pub fn set_tag(&self, id: u64, tag: impl Into<String>) -> bool {
        let connections = self.shared.connections.lock().unwrap();
        match connections.iter().find(|e| e.id == id) {
            Some(entry) => {
                *entry.tag.lock().unwrap() = Some(tag.into());
                true
            }
            None => false,
        }
    }

    pub fn stop(&self) {
        {
            let mut running = self.shared.state.lock().unwrap();
            if !*running {
                return;
            }
            *running = false;
        }
        self.shared.closing.store(true, Ordering::Release);
        let _ = self.shared.stop_waker.notify();
    }

    pub fn wait_for_stop(&self, timeout: Timeout) {
        let guard = self.shared.state.lock().unwrap();
        match timeout {
            Timeout::Forever => {
                let _unused = self.shared.state_cv.wait_while(guard, |running| *running).unwrap();
            }
            Timeout::NoWait => {}
            Timeout::After(d) => {
                let _ = self.shared.state_cv.wait_timeout_while(guard, d, |running| *running).unwrap();
            }
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
        if let Some(join) = self.shared.join.lock().unwrap().take() {
            let _ = join.join();
        }
    }
}

fn run(shared: Arc<Shared>, mut listener: ListenerEndpoint, mut poll: Poll, conn_config: ConnectionConfig, opts: ServerOptions) {
    let mut events = Events::with_capacity(64);
    let mut accept_armed = true;

    loop {
        if shared.closing.load(Ordering::Acquire) {
            break;
        }

        if let Err(e) = poll.poll(&mut events, Some(REAP_INTERVAL)) {
            if e.kind() != std::io::ErrorKind::Interrupted {
                warn!(error = %e, "server accept poll failed");
            }
        }

        for event in events.iter() {
            match event.token() {
                STOP => break,
                LISTENER => loop {
                    let under_cap = opts
                        .max_connections
                        .map(|cap| shared.connections.lock().unwrap().len() < cap)
                        .unwrap_or(true);
                    if !under_cap {
                        break;
                    }
                    match listener.accept() {
                        Ok(Some((stream, peer))) => accept_one(&shared, stream, peer, &conn_config),
                        Ok(None) => break,
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                            break;
                        }
                    }
                },
                _ => {}
            }
        }

        reap(&shared);

        let under_cap = opts
            .max_connections
            .map(|cap| shared.connections.lock().unwrap().len() < cap)
            .unwrap_or(true);
        if under_cap != accept_armed {
            let result = if under_cap {
                listener.register(poll.registry(), LISTENER, mio::Interest::READABLE)
            } else {
                listener.deregister(poll.registry())
            };
            if result.is_ok() {
                accept_armed = under_cap;
            }
        }
    }

    for (_, conn) in shared.connections.lock().unwrap().drain(..).map(|e| (e.id, e.conn)).collect::<Vec<_>>() {
        conn.disconnect(DisconnectOptions { forced: true, wait_for_join: true });
    }
    listener.unlink();

    let mut running = shared.state.lock().unwrap();
    *running = false;
    shared.state_cv.notify_all();
    debug!("server accept loop stopped");
}

fn accept_one(shared: &Arc<Shared>, stream: crate::transport::StreamEndpoint, peer: Option<Address>, conn_config: &ConnectionConfig) {
    let conn = match Connection::spawn(stream, conn_config.clone(), peer) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "failed to spawn accepted connection");
            return;
        }
    };
    let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
    info!(id, "accepted connection");

    if let Some(cb) = shared.on_connected.lock().unwrap().clone() {
        cb(id, &conn);
    }

    shared.connections.lock().unwrap().push(Entry { id, tag: Mutex::new(None), conn });
}

fn reap(shared: &Arc<Shared>) {
    let dead: Vec<Entry> = {
        let mut connections = shared.connections.lock().unwrap();
        let mut dead = Vec::new();
        let mut i = 0;
        while i < connections.len() {
            if !connections[i].conn.is_connected() {
                dead.push(connections.remove(i));
            } else {
                i += 1;
            }
        }
        dead
    };
    for entry in dead {
        if let Some(cb) = shared.on_disconnected.lock().unwrap().clone() {
            cb(entry.id, &entry.conn);
        }
    }
}
