mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dowow_net::{Connection, PushOptions, Request, Timeout};

/// Cascade exclusivity: a Request correlated to a waiting Push must not
/// also reach the named handler, and a Request matching a named handler
/// must not also land in the receive queue.
#[test]
fn correlated_reply_does_not_reach_named_handler() {
    let (server, addr) = common::start_server(None);
    let handler_calls = Arc::new(AtomicUsize::new(0));
    let handler_calls_clone = Arc::clone(&handler_calls);
    server.set_on_connected(Some(Arc::new(move |_id, conn: &Connection| {
        let calls = Arc::clone(&handler_calls_clone);
        conn.set_handler_named(
            "echo",
            Some(Arc::new(move |conn: &Connection, req: Request| {
                calls.fetch_add(1, Ordering::SeqCst);
                conn.push(Request::new("echo").with_id(req.id), PushOptions::default());
            })),
        );
    })));

    let client = common::dial(&addr);
    let response = client.push(
        Request::new("echo"),
        PushOptions { change_id: true, timeout: Timeout::After(Duration::from_secs(2)), ..Default::default() },
    );
    assert!(response.is_some(), "the correlated waiter should receive the reply");

    // The reply's name is "echo" too, but since a waiter was registered
    // for its id the cascade must stop at step 2 on the client side —
    // there is no "echo" handler registered on the client, so if the
    // cascade leaked past correlation it would fall through to the
    // client's receive queue instead, not re-invoke anything server-side.
    assert!(client.pull(Timeout::NoWait).is_none());
    assert_eq!(handler_calls.load(Ordering::SeqCst), 1, "the server handler should fire exactly once");
}

/// A named handler that consumes a Request keeps it out of the receive
/// queue entirely.
#[test]
fn named_handler_consumes_request_before_the_receive_queue() {
    let (server, addr) = common::start_server(None);
    server.set_on_connected(Some(Arc::new(|_id, conn: &Connection| {
        conn.set_handler_named("noop", Some(Arc::new(|_conn: &Connection, _req: Request| {})));
    })));

    let client = common::dial(&addr);
    client.push(Request::new("noop"), PushOptions { change_id: true, ..Default::default() });
    std::thread::sleep(Duration::from_millis(150));

    let server_side = server.connections().into_iter().next().map(|(_, c)| c).expect("accepted");
    assert!(server_side.pull(Timeout::NoWait).is_none(), "the handler should have consumed the Request");
}
