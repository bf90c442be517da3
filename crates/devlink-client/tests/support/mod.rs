//! In-process stand-in for the device firmware.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use devlink_client::ClientConfig;
use serde_json::{json, Value};

pub const PASSWORD: &str = "IoTDevice2024";

/// How the mock device reacts.
#[derive(Debug, Clone)]
pub struct Behavior {
    pub password: String,
    /// Send the `auth_required` greeting on accept.
    pub greet: bool,
    /// Answer the `auth` command at all.
    pub answer_auth: bool,
    /// Extra line written in the same `write` as a successful auth reply.
    pub push_with_auth_reply: Option<String>,
    /// Write a junk line at this interval for a few seconds after accept.
    pub chatter: Option<Duration>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            password: PASSWORD.to_string(),
            greet: true,
            answer_auth: true,
            push_with_auth_reply: None,
            chatter: None,
        }
    }
}

#[derive(Default)]
struct Hardware {
    leds: [bool; 5],
    servo: i64,
}

impl Hardware {
    fn status(&self) -> Value {
        json!({
            "type": "status",
            "timestamp": 1000,
            "leds": self.leds.iter().enumerate()
                .map(|(i, on)| json!({"id": i + 1, "state": on}))
                .collect::<Vec<_>>(),
            "buttons": (1..=5).map(|id| json!({"id": id, "pressed": false})).collect::<Vec<_>>(),
            "potentiometer": {"raw": 2048, "voltage": 1.65, "percent": 50},
            "servo": {"angle": self.servo},
        })
    }
}

/// A single-connection device listening on `127.0.0.1`.
pub struct MockDevice {
    port: u16,
    commands: Receiver<Value>,
    conn: Arc<Mutex<Option<TcpStream>>>,
}

impl MockDevice {
    pub fn start() -> Self {
        Self::with_behavior(Behavior::default())
    }

    pub fn with_behavior(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("mock device should bind");
        let port = listener.local_addr().expect("local addr").port();
        let (tx, commands) = mpsc::channel();
        let conn = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&conn);
        thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                serve(stream, &behavior, &slot, &tx);
            }
        });

        Self {
            port,
            commands,
            conn,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Client settings for this device with test-friendly timeouts.
    pub fn config(&self, password: &str) -> ClientConfig {
        ClientConfig::new("127.0.0.1", self.port, password)
            .with_connect_timeout(Duration::from_secs(2))
            .with_handshake_timeout(Duration::from_secs(1))
            .with_keepalive_interval(Duration::from_secs(30))
    }

    /// Next command the device received.
    pub fn next_command(&self, timeout: Duration) -> Option<Value> {
        self.commands.recv_timeout(timeout).ok()
    }

    /// Next command whose verb is `name`, skipping others.
    pub fn next_named(&self, name: &str, timeout: Duration) -> Option<Value> {
        let deadline = Instant::now() + timeout;
        loop {
            let left = deadline.checked_duration_since(Instant::now())?;
            match self.commands.recv_timeout(left) {
                Ok(cmd) if cmd["command"] == name => return Some(cmd),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Every command received during `window`.
    pub fn collect(&self, window: Duration) -> Vec<Value> {
        let deadline = Instant::now() + window;
        let mut out = Vec::new();
        loop {
            let Some(left) = deadline.checked_duration_since(Instant::now()) else {
                return out;
            };
            match self.commands.recv_timeout(left) {
                Ok(cmd) => out.push(cmd),
                Err(RecvTimeoutError::Timeout) => return out,
                Err(RecvTimeoutError::Disconnected) => {
                    thread::sleep(left);
                    return out;
                }
            }
        }
    }

    /// Write one line to the connected client.
    pub fn push(&self, line: &str) {
        let mut guard = self.conn.lock().expect("conn lock");
        let stream = guard.as_mut().expect("a client should be connected");
        stream
            .write_all(format!("{line}\r\n").as_bytes())
            .expect("push should write");
    }

    pub fn push_servo(&self, angle: i64) {
        self.push(&json!({"type": "status", "servo": {"angle": angle}}).to_string());
    }

    /// Drop the connection from the device side.
    pub fn disconnect(&self) {
        if let Some(stream) = self.conn.lock().expect("conn lock").as_ref() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

fn serve(
    stream: TcpStream,
    behavior: &Behavior,
    slot: &Arc<Mutex<Option<TcpStream>>>,
    tx: &Sender<Value>,
) {
    let writer = stream.try_clone().expect("clone stream");
    *slot.lock().expect("conn lock") = Some(writer);
    let send = |line: String| {
        if let Some(stream) = slot.lock().expect("conn lock").as_mut() {
            let _ = stream.write_all(line.as_bytes());
        }
    };

    if behavior.greet {
        send(format!(
            "{}\r\n",
            json!({
                "status": "auth_required",
                "message": "Send authentication: {\"command\":\"auth\",\"password\":\"your_password\"}"
            })
        ));
    }

    if let Some(every) = behavior.chatter {
        let slot = Arc::clone(slot);
        thread::spawn(move || {
            let until = Instant::now() + Duration::from_secs(3);
            while Instant::now() < until {
                let sent = slot
                    .lock()
                    .expect("conn lock")
                    .as_mut()
                    .is_some_and(|stream| stream.write_all(b"noise\r\n").is_ok());
                if !sent {
                    break;
                }
                thread::sleep(every);
            }
        });
    }

    let mut hardware = Hardware::default();
    let mut authenticated = false;

    for line in BufReader::new(stream).lines() {
        let Ok(line) = line else { break };
        let Ok(cmd) = serde_json::from_str::<Value>(&line) else {
            send(reply("error", "Invalid JSON"));
            continue;
        };
        let _ = tx.send(cmd.clone());

        let verb = cmd["command"].as_str().unwrap_or_default();
        if !authenticated {
            if verb != "auth" {
                send(reply("error", "Authentication required"));
            } else if !behavior.answer_auth {
                continue;
            } else if cmd["password"] == behavior.password.as_str() {
                authenticated = true;
                let mut out = reply("success", "Authenticated");
                if let Some(extra) = &behavior.push_with_auth_reply {
                    out.push_str(extra);
                    out.push_str("\r\n");
                }
                send(out);
            } else {
                send(reply("error", "Invalid password"));
            }
            continue;
        }

        match verb {
            "set_led" => {
                let led = cmd["led"].as_u64().unwrap_or(0) as usize;
                if (1..=5).contains(&led) {
                    hardware.leds[led - 1] = cmd["state"].as_bool().unwrap_or(false);
                    send(reply("success", &format!("LED {led} set")));
                } else {
                    send(reply("error", "Invalid LED number (1-5)"));
                }
            }
            "set_all_leds" => {
                let state = cmd["state"].as_bool().unwrap_or(false);
                hardware.leds = [state; 5];
                send(reply("success", "All LEDs set"));
            }
            "set_servo" => {
                hardware.servo = cmd["angle"].as_i64().unwrap_or(0);
                send(reply("success", "Servo set"));
            }
            "get_status" => send(format!("{}\r\n", hardware.status())),
            "ping" => send(reply("success", "pong")),
            _ => send(reply("error", "Unknown command")),
        }
    }
}

fn reply(status: &str, message: &str) -> String {
    format!(
        "{}\r\n",
        json!({"status": status, "message": message, "timestamp": 1000})
    )
}
