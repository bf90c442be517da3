//! Minimal device firmware stand-in for CLI tests.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use serde_json::{json, Value};

pub const PASSWORD: &str = "IoTDevice2024";

pub struct Device {
    port: u16,
    commands: Receiver<Value>,
}

impl Device {
    /// Serve one client connection.
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("device should bind");
        let port = listener.local_addr().expect("local addr").port();
        let (tx, commands) = mpsc::channel();

        thread::spawn(move || {
            let Ok((stream, _)) = listener.accept() else {
                return;
            };
            let mut writer = stream.try_clone().expect("clone stream");
            let mut send = |value: Value| {
                let _ = writer.write_all(format!("{value}\r\n").as_bytes());
            };
            send(json!({"status": "auth_required", "message": "Send authentication"}));

            let mut servo = 90;
            let mut authenticated = false;
            for line in BufReader::new(stream).lines() {
                let Ok(line) = line else { break };
                let Ok(cmd) = serde_json::from_str::<Value>(&line) else {
                    continue;
                };
                let _ = tx.send(cmd.clone());

                match cmd["command"].as_str().unwrap_or_default() {
                    "auth" if cmd["password"] == PASSWORD => {
                        authenticated = true;
                        send(json!({"status": "success", "message": "Authenticated"}));
                    }
                    "auth" => send(json!({"status": "error", "message": "Invalid password"})),
                    _ if !authenticated => {
                        send(json!({"status": "error", "message": "Authentication required"}))
                    }
                    "set_servo" => {
                        servo = cmd["angle"].as_i64().unwrap_or(servo);
                        send(json!({"status": "success", "message": "Servo set"}));
                    }
                    "set_led" | "set_all_leds" => {
                        send(json!({"status": "success", "message": "LEDs set"}))
                    }
                    "ping" => send(json!({"status": "success", "message": "pong"})),
                    "get_status" => send(json!({
                        "type": "status",
                        "timestamp": 42,
                        "leds": [{"id": 1, "state": true}, {"id": 2, "state": false}],
                        "buttons": [{"id": 1, "pressed": false}],
                        "potentiometer": {"raw": 1024, "voltage": 0.83, "percent": 25},
                        "servo": {"angle": servo}
                    })),
                    _ => send(json!({"status": "error", "message": "Unknown command"})),
                }
            }
        });

        Self { port, commands }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Commands received within `window`.
    pub fn received(&self, window: Duration) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(cmd) = self.commands.recv_timeout(window) {
            out.push(cmd);
        }
        out
    }
}

/// A port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    port
}
