//! Framed request/response RPC over TCP or Unix-domain sockets: a
//! background-threaded `Connection`, an accepting `Server`, and a
//! timed-dial `Connector`, all built on the wire codec in `dowow-core`.

mod connection;
mod connector;
mod error;
mod server;
mod transport;
mod util;

pub use connection::{Connection, ConnectionConfig, DisconnectOptions, HandlerFn, Parity, PushOptions, Timeout};
pub use connector::Connector;
pub use error::{Error, Result};
pub use server::{Server, ServerCallback, ServerOptions};
pub use transport::Address;

pub use dowow_core::{Datum, Request, Value};
