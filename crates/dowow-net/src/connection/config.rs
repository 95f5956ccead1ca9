use std::time::Duration;

use dowow_core::frame::{DEFAULT_MAX_FRAME_SIZE, MIN_FRAME_SIZE};

use super::id::Parity;

const MIN_LIVENESS: Duration = Duration::from_secs(1);

/// Tunables for one Connection. Every setter clamps to the floor named in
/// the external-interface defaults table rather than rejecting an
/// out-of-range value outright.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Upper bound on bytes written per `write` syscall.
    pub send_block_size: usize,
    /// Upper bound on bytes read per `read` syscall, passed straight
    /// through to the connection's `FrameReader`.
    pub recv_block_size: usize,
    pub max_frame_size: u32,
    pub local_liveness_interval: Duration,
    pub peer_liveness_deadline: Duration,
    pub parity: Parity,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            send_block_size: 1024,
            recv_block_size: 1024,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            local_liveness_interval: Duration::from_secs(10),
            peer_liveness_deadline: Duration::from_secs(60),
            parity: Parity::Even,
        }
    }
}

impl ConnectionConfig {
    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn set_max_frame_size(&mut self, size: u32) {
        self.max_frame_size = size.max(MIN_FRAME_SIZE);
    }

    pub fn set_local_liveness_interval(&mut self, interval: Duration) {
        self.local_liveness_interval = interval.max(MIN_LIVENESS);
    }

    pub fn set_peer_liveness_deadline(&mut self, deadline: Duration) {
        self.peer_liveness_deadline = deadline.max(MIN_LIVENESS);
    }
}
