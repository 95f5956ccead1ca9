mod common;

use std::time::Duration;

use dowow_net::DisconnectOptions;

/// Scenario 5: once `max_connections` is reached the server stops
/// wrapping newly accepted sockets in a Connection; the transport-level
/// connect for a connection beyond the cap may still complete (it only
/// needs room in the kernel's listen backlog), but no server-side
/// Connection appears for it until an existing one disconnects and
/// frees a slot.
#[test]
fn max_connections_gates_accept_until_a_slot_frees() {
    let (server, addr) = common::start_server(Some(1));

    let first = common::dial(&addr);
    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(server.connections().len(), 1);

    let _second = common::dial(&addr);
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(
        server.connections().len(),
        1,
        "server should not have wrapped the second socket while at capacity"
    );

    first.disconnect(DisconnectOptions { forced: true, wait_for_join: true });
    std::thread::sleep(Duration::from_millis(400));

    assert_eq!(server.connections().len(), 1, "the freed slot should now hold the second connection");
}
