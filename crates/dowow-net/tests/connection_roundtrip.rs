mod common;

use std::time::Duration;

use dowow_net::{Connection, PushOptions, Request, Timeout, Value};

/// Scenario 1: named handler replies, Pull observes the reply.
#[test]
fn named_handler_round_trip() {
    let (server, addr) = common::start_server(None);
    server.set_on_connected(Some(std::sync::Arc::new(|_id, conn: &Connection| {
        conn.set_handler_named("ping", Some(std::sync::Arc::new(|conn: &Connection, req: Request| {
            let number = req.get("number").and_then(Value::as_i32).unwrap_or(0);
            let reply = Request::new("pong").with_id(req.id).set("number", Value::I32(number + 1));
            conn.push(reply, PushOptions::default());
        })));
    })));

    let client = common::dial(&addr);
    client.push(
        Request::new("ping").set("number", Value::I32(0)),
        PushOptions { change_id: true, ..Default::default() },
    );

    let reply = client
        .pull(Timeout::After(Duration::from_secs(2)))
        .expect("pong should arrive");
    assert_eq!(reply.name, "pong");
    assert_eq!(reply.get("number").and_then(Value::as_i32), Some(1));
}

/// Scenario 2: a correlated Push gets its reply back directly, no Pull
/// needed, well inside the bound timeout.
#[test]
fn correlated_push_returns_response() {
    let (server, addr) = common::start_server(None);
    server.set_on_connected(Some(std::sync::Arc::new(|_id, conn: &Connection| {
        conn.set_handler_named("get", Some(std::sync::Arc::new(|conn: &Connection, req: Request| {
            conn.push(Request::new("response").with_id(req.id), PushOptions::default());
        })));
    })));

    let client = common::dial(&addr);
    let response = client.push(
        Request::new("get"),
        PushOptions { change_id: true, timeout: Timeout::After(Duration::from_secs(5)), ..Default::default() },
    );
    assert_eq!(response.expect("should correlate").name, "response");
}

/// Scenario 3: a correlated Push times out and returns None, but the
/// Connection stays open and the late response is later observed via
/// Pull (cascade fallthrough once the waiter has already been removed).
#[test]
fn timed_out_push_falls_through_to_pull() {
    let (server, addr) = common::start_server(None);
    server.set_on_connected(Some(std::sync::Arc::new(|_id, conn: &Connection| {
        conn.set_handler_named("hang", Some(std::sync::Arc::new(|conn: &Connection, req: Request| {
            let conn = conn.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(300));
                conn.push(Request::new("response").with_id(req.id), PushOptions::default());
            });
        })));
    })));

    let client = common::dial(&addr);
    let immediate = client.push(
        Request::new("hang").set("s", Value::U32(5)),
        PushOptions { change_id: true, timeout: Timeout::After(Duration::from_millis(50)), ..Default::default() },
    );
    assert!(immediate.is_none());
    assert!(client.is_connected());

    let late = client.pull(Timeout::After(Duration::from_secs(2))).expect("late response should arrive");
    assert_eq!(late.name, "response");
}
