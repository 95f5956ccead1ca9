use std::time::Duration;

use dowow_net::{Address, ConnectionConfig, Connector, Server, ServerOptions, Timeout};

pub fn local_addr() -> Address {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("dowow-test.sock");
    // Leak the tempdir so the path stays valid for the test's lifetime;
    // tests are short-lived processes so this is not a real leak concern.
    std::mem::forget(dir);
    Address::local(path)
}

pub fn start_server(max_connections: Option<usize>) -> (Server, Address) {
    let addr = local_addr();
    let server = Server::start(addr.clone(), ConnectionConfig::default(), ServerOptions { max_connections })
        .expect("server start");
    (server, addr)
}

pub fn dial(addr: &Address) -> dowow_net::Connection {
    let connector =
        Connector::dial(addr.clone(), ConnectionConfig::default(), Duration::from_secs(2)).expect("dial spawn");
    assert!(connector.wait(Timeout::After(Duration::from_secs(2))), "dial did not complete in time");
    connector.take().expect("dial succeeded")
}
