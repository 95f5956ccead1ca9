use thiserror::Error;

/// Errors from setting up a transport-level endpoint. Once a Connection
/// is running, transport and protocol failures are handled only by its
/// background I/O thread and surface to the caller as
/// `is_connected() == false` plus a preserved `last_error()`, since
/// `push`/`pull` return `Option` on a timeout rather than `Result`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("listener bind failed: {0}")]
    ListenerBind(std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
