//! Wire format for dowow-rpc: the `Value`/`Datum`/`Request` codecs and
//! incremental frame assembly.
//!
//! This crate has no notion of sockets, threads or handlers — it is pure
//! encode/decode over byte slices, the replaceable "hard data model"
//! layer that `dowow-net` builds its background I/O loop on top of.

mod datum;
mod error;
pub mod frame;
mod request;
mod value;

pub use datum::Datum;
pub use error::Error;
pub use request::Request;
pub use value::Value;
