use thiserror::Error;

/// Failures arising from the wire codec and frame assembly.
///
/// Every variant here is fatal to the connection that produced it: there
/// is no partial-recovery path for a malformed or oversized frame, only
/// closure (see `dowow-net`'s `Connection` state machine).
#[derive(Error, Debug)]
pub enum Error {
    #[error("frame too large: declared length {declared} exceeds max {max}")]
    FrameTooLarge { declared: u32, max: u32 },

    #[error("frame too small: declared length {declared} is below the floor {floor}")]
    FrameTooSmall { declared: u32, floor: u32 },

    #[error("malformed frame")]
    MalformedFrame,

    #[error("transport closed mid-frame")]
    TransportClosed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
