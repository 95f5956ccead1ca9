//! Interactive chat client: handles `auth_invite`, `authorized`,
//! `error`, and `message` requests over a plain stdin/stdout loop.

use std::io::Write;
use std::time::Duration;

use clap::Parser;
use dowow_net::{Address, Connection, ConnectionConfig, Connector, PushOptions, Request, Timeout, Value};

#[derive(Parser)]
struct Args {
    /// Address to dial: `ip:port` for TCP, any other string for a
    /// local-domain socket path.
    #[arg(long, default_value = "127.0.0.1:7890")]
    connect: String,
}

fn print_line(label: &str, text: &str) {
    println!("[{label}] {text}");
    let _ = std::io::stdout().flush();
}

fn str_arg(req: &Request, name: &str) -> String {
    req.get(name).and_then(Value::as_str_bytes).map(|b| String::from_utf8_lossy(b).into_owned()).unwrap_or_default()
}

fn spawn_printer(conn: Connection) {
    std::thread::spawn(move || loop {
        match conn.pull(Timeout::After(Duration::from_millis(500))) {
            Some(req) => match req.name.as_str() {
                "auth_invite" => {
                    let server = str_arg(&req, "server");
                    print_line("SERVER", &format!("{} requires authorization; use /login <name>", server));
                    print_line(&server, &str_arg(&req, "text"));
                }
                "authorized" => {
                    print_line("CLIENT", &format!("logged in; {} user(s) online", str_arg_u32(&req)));
                }
                "error" => print_line("ERROR", &str_arg(&req, "text")),
                "message" => print_line(&str_arg(&req, "from"), &str_arg(&req, "text")),
                "bye" => {
                    print_line("CLIENT", "server closed the session");
                    break;
                }
                _ => {}
            },
            None if !conn.is_connected() => {
                print_line("CLIENT", "disconnected from server");
                break;
            }
            None => {}
        }
    });
}

fn str_arg_u32(req: &Request) -> String {
    req.get("users").and_then(Value::as_u32).map(|v| v.to_string()).unwrap_or_else(|| "?".to_string())
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let addr = Address::parse(&args.connect).expect("invalid --connect address");
    let connector = Connector::dial(addr, ConnectionConfig::default(), Duration::from_secs(10))
        .expect("failed to start dialing");
    if !connector.wait(Timeout::After(Duration::from_secs(10))) {
        eprintln!("connect timed out");
        return;
    }
    let Some(conn) = connector.take() else {
        eprintln!("connect failed: {}", connector.last_error().unwrap_or_default());
        return;
    };
    print_line("CLIENT", "connected; type /help for commands");

    spawn_printer(conn.clone());

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        line.clear();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if !conn.is_connected() {
            break;
        }

        if let Some(username) = line.strip_prefix("/login ") {
            conn.push(
                Request::new("login").set("username", Value::Str(username.as_bytes().to_vec())),
                PushOptions::default(),
            );
        } else if line == "/bye" {
            conn.push(Request::new("bye"), PushOptions::default());
        } else if line == "/help" {
            print_line("CLIENT", "/login <name>, /bye, or just type a message to broadcast it");
        } else if let Some(rest) = line.strip_prefix("/to ") {
            let (to, text) = rest.split_once(' ').unwrap_or((rest, ""));
            conn.push(
                Request::new("send")
                    .set("to", Value::Str(to.as_bytes().to_vec()))
                    .set("text", Value::Str(text.as_bytes().to_vec())),
                PushOptions::default(),
            );
        } else {
            conn.push(Request::new("send").set("text", Value::Str(line.as_bytes().to_vec())), PushOptions::default());
        }
    }
}
