mod common;

use std::io::Write;
use std::os::unix::net::UnixStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dowow_net::Connection;

/// Scenario 4: a peer declaring `total_len` far beyond the configured
/// maximum gets the Connection closed before any body byte is read, and
/// no Request is ever surfaced to a handler or Pull.
#[test]
fn oversized_frame_closes_connection_without_surfacing_request() {
    let (server, addr) = common::start_server(None);
    let accepted: Arc<Mutex<Option<Connection>>> = Arc::new(Mutex::new(None));
    let accepted_clone = Arc::clone(&accepted);
    server.set_on_connected(Some(Arc::new(move |_id, conn: &Connection| {
        *accepted_clone.lock().unwrap() = Some(conn.clone());
    })));

    let dowow_net::Address::Local(path) = addr.clone() else { panic!("expected local address") };
    let mut raw = UnixStream::connect(&path).expect("raw connect");
    raw.write_all(&1_000_000u32.to_le_bytes()).expect("write oversized header");

    std::thread::sleep(Duration::from_millis(200));

    let conn = accepted.lock().unwrap().clone().expect("server should have accepted the raw stream");
    assert!(!conn.is_connected());
    assert!(conn.pull(dowow_net::Timeout::NoWait).is_none());
}
