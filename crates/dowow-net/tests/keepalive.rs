mod common;

use std::time::Duration;

use dowow_net::{ConnectionConfig, Connector, Server, ServerOptions, Timeout};

/// Scenario 6: both endpoints sit idle well past the peer deadline, but
/// each keeps sending `"_"` fillers inside every local interval, so
/// neither side's peer-liveness timer ever fires. `local`/`peer` are
/// both above `ConnectionConfig`'s 1s liveness floor (so neither value
/// is silently clamped up past what the test assumes), and the sleep
/// genuinely crosses the peer deadline: without fillers the connection
/// would have died partway through the sleep, so this only passes if
/// the filler mechanism is actually keeping it alive.
#[test]
fn idle_connection_survives_on_liveness_fillers() {
    let mut config = ConnectionConfig::default();
    config.set_local_liveness_interval(Duration::from_secs(1));
    config.set_peer_liveness_deadline(Duration::from_millis(2500));

    let addr = common::local_addr();
    let server = Server::start(addr.clone(), config.clone(), ServerOptions::default()).expect("server start");

    let connector = Connector::dial(addr, config, Duration::from_secs(2)).expect("dial spawn");
    assert!(connector.wait(Timeout::After(Duration::from_secs(2))));
    let client = connector.take().expect("connected");

    std::thread::sleep(Duration::from_millis(3500));

    assert!(client.is_connected(), "client should still be connected");
    let (_, server_side) = server.connections().into_iter().next().expect("server accepted one connection");
    assert!(server_side.is_connected(), "server side should still be connected");
}
