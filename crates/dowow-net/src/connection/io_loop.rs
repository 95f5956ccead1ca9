use std::io::{self, Write};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use mio::{Events, Interest, Poll};
use tracing::{debug, warn};

use dowow_core::frame::FrameReader;
use dowow_core::Request;

use crate::transport::StreamEndpoint;
use crate::util::Deadline;

use super::{Shared, State, PUSH_TOKEN as PUSH, STOP_TOKEN as STOP, TRANSPORT_TOKEN as TRANSPORT};

enum SendState {
    Idle,
    Sending { buf: Vec<u8>, sent: usize },
}

/// The background task body: one per Connection, running until a stop
/// signal, a transport failure, a protocol violation, or peer-liveness
/// expiry. Owns the socket exclusively — nothing outside this function
/// ever touches `stream`.
pub(super) fn run(shared: Arc<Shared>, mut stream: StreamEndpoint, mut poll: Poll) {
    let mut events = Events::with_capacity(64);
    let mut frame_reader = {
        let config = shared.config.lock().unwrap();
        FrameReader::new(config.max_frame_size, config.recv_block_size)
    };

    let mut local_liveness = Deadline::new(shared.config.lock().unwrap().local_liveness_interval);
    let mut peer_liveness = Deadline::new(shared.config.lock().unwrap().peer_liveness_deadline);

    let mut send_state = SendState::Idle;
    let mut readable_armed = true;
    let mut writable_armed = false;

    let outcome = 'outer: loop {
        if shared.closing.load(Ordering::Acquire) {
            break 'outer None;
        }

        let timeout = local_liveness.remaining().min(peer_liveness.remaining());
        if let Err(e) = poll.poll(&mut events, Some(timeout)) {
            if e.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            break 'outer Some(format!("poll failed: {e}"));
        }

        if peer_liveness.is_expired() {
            break 'outer Some("peer liveness deadline expired".to_string());
        }

        if local_liveness.is_expired() {
            let filler = Request::new("_");
            shared.send_queue.push_front(filler);
            local_liveness.reset();
        }

        for event in events.iter() {
            match event.token() {
                STOP => break 'outer None,
                PUSH => { /* only wakes poll to re-evaluate armed interests */ }
                TRANSPORT => {
                    if event.is_readable() {
                        match read_ready(&shared, &mut stream, &mut frame_reader) {
                            Ok(true) => peer_liveness.reset(),
                            Ok(false) => {}
                            Err(e) => break 'outer Some(e),
                        }
                    }
                    if event.is_writable() {
                        if let Err(e) = write_ready(&shared, &mut stream, &mut send_state) {
                            break 'outer Some(e);
                        }
                    }
                }
                _ => {}
            }
        }

        let disconnecting = matches!(*shared.state.lock().unwrap(), State::Disconnecting);
        let send_buf_empty = matches!(send_state, SendState::Idle) && shared.send_queue.is_empty();
        if disconnecting && send_buf_empty {
            break 'outer None;
        }

        let want_readable = !disconnecting;
        let want_writable = disconnecting || !matches!(send_state, SendState::Idle) || !shared.send_queue.is_empty();
        if want_readable != readable_armed || want_writable != writable_armed {
            let mut interests = None;
            if want_readable {
                interests = Some(Interest::READABLE);
            }
            if want_writable {
                interests = Some(interests.map_or(Interest::WRITABLE, |i| i | Interest::WRITABLE));
            }
            let result = match interests {
                Some(i) => stream.reregister(poll.registry(), TRANSPORT, i),
                None => stream.deregister(poll.registry()),
            };
            if let Err(e) = result {
                break 'outer Some(format!("reregister failed: {e}"));
            }
            readable_armed = want_readable;
            writable_armed = want_writable;
        }
    };

    finish(&shared, &mut stream, outcome);
}

/// Reads and dispatches as many complete frames as are immediately ready.
/// Returns `Ok(true)` if at least one byte was read (refreshing peer
/// liveness even on a partial frame).
fn read_ready(shared: &Arc<Shared>, stream: &mut StreamEndpoint, reader: &mut FrameReader) -> Result<bool, String> {
    let mut read_anything = false;
    loop {
        match reader.read_from(stream) {
            Ok(Some(buf)) => {
                read_anything = true;
                match Request::decode(&buf) {
                    Ok((req, _used)) => dispatch(shared, req),
                    Err(e) => return Err(format!("malformed frame: {e}")),
                }
            }
            Ok(None) => return Ok(read_anything),
            Err(dowow_core::Error::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => return Ok(read_anything),
            Err(e) => return Err(format!("frame read failed: {e}")),
        }
    }
}

fn dispatch(shared: &Arc<Shared>, req: Request) {
    if req.is_liveness_filler() {
        return;
    }

    let req = match shared.correlation.deliver(req) {
        Ok(()) => return,
        Err(req) => req,
    };

    if let Some(handler) = shared.handlers.named(&req.name) {
        let conn = shared.handle();
        handler(&conn, req);
        return;
    }

    if let Some(handler) = shared.handlers.default_handler() {
        let conn = shared.handle();
        handler(&conn, req);
        return;
    }

    shared.recv_queue.push_back(req);
}

fn write_ready(shared: &Arc<Shared>, stream: &mut StreamEndpoint, send_state: &mut SendState) -> Result<(), String> {
    let block_size = shared.config.lock().unwrap().send_block_size;

    loop {
        if matches!(send_state, SendState::Idle) {
            match shared.send_queue.pop_front() {
                Some(req) => *send_state = SendState::Sending { buf: req.encode(), sent: 0 },
                None => return Ok(()),
            }
        }

        let SendState::Sending { buf, sent } = send_state else {
            dowow_assert::safe_panic!("send_state must be Sending after the Idle branch above");
            return Ok(());
        };
        let end = (*sent + block_size).min(buf.len());
        match stream.write(&buf[*sent..end]) {
            Ok(0) => return Err("transport closed on write".to_string()),
            Ok(n) => {
                *sent += n;
                if *sent >= buf.len() {
                    *send_state = SendState::Idle;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
            Err(e) => return Err(format!("write failed: {e}")),
        }
    }
}

fn finish(shared: &Arc<Shared>, stream: &mut StreamEndpoint, outcome: Option<String>) {
    {
        let mut state = shared.state.lock().unwrap();
        *state = State::Closed;
    }
    if let Some(err) = &outcome {
        warn!(error = %err, "connection closing");
        *shared.last_error.lock().unwrap() = Some(err.clone());
    } else {
        debug!("connection closing cleanly");
    }

    let _ = stream.shutdown(std::net::Shutdown::Both);

    shared.correlation.wake_all_with_none();
    shared.recv_queue.wake_all();
    shared.state_cv.notify_all();
}
