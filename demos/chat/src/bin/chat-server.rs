//! A toy multi-user chat server: an `auth_invite` on connect, a
//! `login`/`send`/`bye` handler set, and a broadcast helper.

use std::sync::{Arc, Mutex};

use clap::Parser;
use dowow_net::{Address, Connection, ConnectionConfig, PushOptions, Request, Server, ServerOptions, Value};
use tracing::info;

#[derive(Parser)]
struct Args {
    /// Address to listen on: `ip:port` for TCP, any other string for a
    /// local-domain socket path.
    #[arg(long, default_value = "127.0.0.1:7890")]
    bind: String,

    /// Name announced to clients in the `auth_invite` request.
    #[arg(long, default_value = "dowow-chat")]
    name: String,
}

#[derive(Default)]
enum SessionState {
    #[default]
    LoggedOut,
    Online {
        username: String,
    },
}

#[derive(Default)]
struct Session {
    state: SessionState,
}

fn error_response(text: &str) -> Request {
    Request::new("error").set("text", Value::Str(text.as_bytes().to_vec()))
}

fn broadcast(server: &Server, from: &str, to: Option<&str>, text: &str) {
    info!(from, to = to.unwrap_or("EVERYONE"), text, "chat message");
    for (_id, conn) in server.connections() {
        let mut req = Request::new("message")
            .set("from", Value::Str(from.as_bytes().to_vec()))
            .set("text", Value::Str(text.as_bytes().to_vec()));
        if let Some(to) = to {
            req = req.set("to", Value::Str(to.as_bytes().to_vec()));
        }
        conn.push(req, PushOptions::default());
    }
}

fn handle_login(conn: &Connection, req: Request, server_name: &str, participants: &Arc<Mutex<usize>>) {
    let already_online = conn
        .with_session_data::<Session, _>(|s| matches!(s.state, SessionState::Online { .. }))
        .unwrap_or(false);
    if already_online {
        conn.push(error_response("you are already logged in"), PushOptions::default());
        return;
    }

    let username = match req.get("username").and_then(Value::as_str_bytes) {
        Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        None => {
            conn.push(error_response("no username"), PushOptions::default());
            return;
        }
    };
    if username.len() < 2 || username.len() > 32 {
        conn.push(error_response("username size must lie in range [2; 32]"), PushOptions::default());
        return;
    }

    conn.with_session_data::<Session, _>(|s| s.state = SessionState::Online { username: username.clone() });
    *participants.lock().unwrap() += 1;

    let ok = Request::new("authorized")
        .with_id(req.id)
        .set("users", Value::U32(*participants.lock().unwrap() as u32))
        .set("server", Value::Str(server_name.as_bytes().to_vec()));
    conn.push(ok, PushOptions::default());

    info!(username, "participant logged in");
}

fn handle_send(conn: &Connection, req: Request, server: &Server) {
    let username = conn.with_session_data::<Session, _>(|s| match &s.state {
        SessionState::Online { username } => Some(username.clone()),
        SessionState::LoggedOut => None,
    });
    let username = match username.flatten() {
        Some(u) => u,
        None => {
            conn.push(error_response("you must authorize before sending messages"), PushOptions::default());
            return;
        }
    };

    let text = match req.get("text").and_then(Value::as_str_bytes) {
        Some(bytes) if !bytes.is_empty() => String::from_utf8_lossy(bytes).into_owned(),
        _ => {
            conn.push(error_response("no text specified"), PushOptions::default());
            return;
        }
    };
    let to = req.get("to").and_then(Value::as_str_bytes).map(|b| String::from_utf8_lossy(b).into_owned());

    broadcast(server, &username, to.as_deref(), &text);
}

fn handle_bye(conn: &Connection, _req: Request, server: &Server) {
    conn.push(Request::new("bye"), PushOptions::default());
    let username = conn.with_session_data::<Session, _>(|s| match &s.state {
        SessionState::Online { username } => Some(username.clone()),
        SessionState::LoggedOut => None,
    });
    conn.disconnect(dowow_net::DisconnectOptions { forced: false, wait_for_join: false });

    if let Some(Some(username)) = username {
        broadcast(server, &username, None, "I'm leaving y'all, bye!");
    }
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let addr = Address::parse(&args.bind).expect("invalid --bind address");
    let server = Arc::new(
        Server::start(addr, ConnectionConfig::default(), ServerOptions::default()).expect("failed to start server"),
    );
    info!(addr = %args.bind, "chat server listening");

    let server_name = args.name.clone();
    let participants = Arc::new(Mutex::new(0usize));

    {
        let server_for_handlers = Arc::clone(&server);
        let server_name = server_name.clone();
        let participants = Arc::clone(&participants);
        server.set_on_connected(Some(Arc::new(move |id, conn: &Connection| {
            conn.set_session_data(Session::default());

            let invite = Request::new("auth_invite")
                .set("text", Value::Str(b"Please authorize".to_vec()))
                .set("server", Value::Str(server_name.as_bytes().to_vec()));
            conn.push(invite, PushOptions::default());

            let server_for_login = Arc::clone(&server_for_handlers);
            let server_name_for_login = server_name.clone();
            let participants_for_login = Arc::clone(&participants);
            conn.set_handler_named(
                "login",
                Some(Arc::new(move |conn: &Connection, req: Request| {
                    handle_login(conn, req, &server_name_for_login, &participants_for_login);
                    let _ = &server_for_login;
                })),
            );

            let server_for_send = Arc::clone(&server_for_handlers);
            conn.set_handler_named(
                "send",
                Some(Arc::new(move |conn: &Connection, req: Request| {
                    handle_send(conn, req, &server_for_send);
                })),
            );

            let server_for_bye = Arc::clone(&server_for_handlers);
            conn.set_handler_named(
                "bye",
                Some(Arc::new(move |conn: &Connection, req: Request| {
                    handle_bye(conn, req, &server_for_bye);
                })),
            );

            conn.set_handler_default(Some(Arc::new(|conn: &Connection, req: Request| {
                tracing::warn!(name = %req.name, "invalid request received, closing connection");
                conn.push(error_response("invalid request, closing connection"), PushOptions::default());
                conn.disconnect(dowow_net::DisconnectOptions { forced: false, wait_for_join: false });
            })));

            info!(id, "participant connected");
        })));
    }

    server.set_on_disconnected(Some(Arc::new(|id, _conn: &Connection| {
        info!(id, "participant disconnected");
    })));

    server.wait_for_stop(dowow_net::Timeout::Forever);
}
