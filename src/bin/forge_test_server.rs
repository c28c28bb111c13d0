/// Minimal stdio MCP server used to exercise the compliance harness
///
/// Speaks just enough of MCP to pass every case, and can be switched into a
/// specific misbehaviour with `--mode` so tests can observe how the harness
/// judges it. Blocking std I/O only: one request in, at most one line out.

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Answer everything correctly
    Compliant,
    /// Exit with code 3 before reading anything
    CrashOnStart,
    /// Answer initialize, then exit with code 1
    ExitAfterInitialize,
    /// Never answer ping
    HangOnPing,
    /// Answer initialize and tools/list with each other's ids
    SwapIds,
    /// Answer unknown methods with an empty result instead of an error
    BareResultUnknown,
    /// Keep running after stdin closes
    IgnoreEof,
    /// Advertise no tools
    NoTools,
    /// Emit notifications, blank lines and stderr noise around every response
    Chatty,
    /// Print a plain-text banner on stdout before serving
    Banner,
}

#[derive(Parser, Debug)]
#[command(about = "Stdio MCP server with selectable misbehaviours")]
struct Args {
    #[arg(long, value_enum, default_value_t = Mode::Compliant)]
    mode: Mode,
}

fn main() -> io::Result<()> {
    let args = Args::parse();
    let mode = args.mode;

    if mode == Mode::CrashOnStart {
        eprintln!("forge-test-server: refusing to start");
        std::process::exit(3);
    }
    eprintln!("forge-test-server: ready ({:?})", mode);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    if mode == Mode::Banner {
        writeln!(stdout, "Weather MCP server listening on stdio")?;
        stdout.flush()?;
    }
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let message: Value = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(e) => {
                let reply = error(Value::Null, -32700, &format!("Parse error: {}", e));
                write_line(&mut stdout, &reply)?;
                continue;
            }
        };
        let method = message["method"].as_str().unwrap_or_default().to_string();
        let Some(id) = message.get("id").cloned() else {
            eprintln!("forge-test-server: notification {}", method);
            continue;
        };

        if mode == Mode::HangOnPing && method == "ping" {
            eprintln!("forge-test-server: ignoring ping");
            continue;
        }
        if mode == Mode::Chatty {
            for i in 0..50 {
                eprintln!("forge-test-server: chatter {} for {}", i, method);
            }
            let progress = json!({
                "jsonrpc": "2.0",
                "method": "notifications/message",
                "params": {"level": "info", "data": format!("handling {}", method)}
            });
            write_line(&mut stdout, &progress)?;
            stdout.write_all(b"\n")?;
        }

        let reply = respond(mode, &method, id, &message["params"]);
        write_line(&mut stdout, &reply)?;

        if mode == Mode::ExitAfterInitialize && method == "initialize" {
            eprintln!("forge-test-server: exiting after initialize");
            std::process::exit(1);
        }
    }

    if mode == Mode::IgnoreEof {
        eprintln!("forge-test-server: stdin closed, staying up");
        loop {
            thread::sleep(Duration::from_secs(60));
        }
    }
    Ok(())
}

fn respond(mode: Mode, method: &str, id: Value, params: &Value) -> Value {
    match method {
        "initialize" => {
            let id = if mode == Mode::SwapIds { shift(&id, 1) } else { id };
            success(
                id,
                json!({
                    "protocolVersion": params["protocolVersion"]
                        .as_str()
                        .unwrap_or("2024-11-05"),
                    "capabilities": {"tools": {}},
                    "serverInfo": {
                        "name": "forge-test-server",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            )
        }
        "tools/list" => {
            let id = if mode == Mode::SwapIds { shift(&id, -1) } else { id };
            let tools = if mode == Mode::NoTools {
                json!([])
            } else {
                json!([{
                    "name": "echo",
                    "description": "Echo the message back",
                    "inputSchema": {
                        "type": "object",
                        "properties": {"message": {"type": "string"}},
                        "required": ["message"]
                    }
                }])
            };
            success(id, json!({ "tools": tools }))
        }
        "tools/call" => match params["name"].as_str() {
            Some("echo") => {
                let text = params["arguments"]["message"].as_str().unwrap_or_default();
                success(id, json!({"content": [{"type": "text", "text": text}]}))
            }
            other => error(id, -32602, &format!("Unknown tool: {}", other.unwrap_or_default())),
        },
        "ping" => success(id, json!({})),
        _ if mode == Mode::BareResultUnknown => success(id, json!({})),
        _ => error(id, -32601, &format!("Method not found: {}", method)),
    }
}

fn shift(id: &Value, by: i64) -> Value {
    id.as_i64().map(|n| json!(n + by)).unwrap_or_else(|| id.clone())
}

fn success(id: Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

fn error(id: Value, code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
}

fn write_line(stdout: &mut io::Stdout, message: &Value) -> io::Result<()> {
    let mut out = stdout.lock();
    serde_json::to_writer(&mut out, message)?;
    out.write_all(b"\n")?;
    out.flush()
}
