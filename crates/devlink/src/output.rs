use std::io::IsTerminal;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use devlink_client::{Reply, StatusSnapshot};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct SnapshotOutput<'a> {
    device: &'a str,
    received_at: u64,
    #[serde(flatten)]
    snapshot: &'a StatusSnapshot,
}

#[derive(Serialize)]
struct ReplyOutput<'a> {
    device: &'a str,
    command: &'a str,
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    elapsed_ms: Option<u128>,
}

pub fn print_snapshot(snapshot: &StatusSnapshot, device: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = SnapshotOutput {
                device,
                received_at: now_unix_seconds(),
                snapshot,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["INPUT/OUTPUT", "ID", "VALUE"]);
            for led in snapshot.leds.iter().flatten() {
                table.add_row(vec![
                    "led".to_string(),
                    led.id.to_string(),
                    on_off(led.state).to_string(),
                ]);
            }
            for button in snapshot.buttons.iter().flatten() {
                table.add_row(vec![
                    "button".to_string(),
                    button.id.to_string(),
                    if button.pressed { "pressed" } else { "released" }.to_string(),
                ]);
            }
            if let Some(pot) = snapshot.potentiometer {
                table.add_row(vec![
                    "potentiometer".to_string(),
                    "-".to_string(),
                    format!("{}% ({:.2} V, raw {})", pot.percent, pot.voltage, pot.raw),
                ]);
            }
            if let Some(angle) = snapshot.servo_angle() {
                table.add_row(vec![
                    "servo".to_string(),
                    "-".to_string(),
                    format!("{angle}°"),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", pretty_snapshot(snapshot, device)),
    }
}

pub fn print_reply(
    reply: &Reply,
    command: &str,
    device: &str,
    elapsed: Option<Duration>,
    format: OutputFormat,
) {
    let elapsed_ms = elapsed.map(|d| d.as_millis());
    match format {
        OutputFormat::Json => {
            let out = ReplyOutput {
                device,
                command,
                status: &reply.status,
                message: reply.message.as_deref(),
                elapsed_ms,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "STATUS", "MESSAGE", "ELAPSED"])
                .add_row(vec![
                    command.to_string(),
                    reply.status.clone(),
                    reply.message.clone().unwrap_or_default(),
                    elapsed_ms.map(|ms| format!("{ms} ms")).unwrap_or_default(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let mut line = format!("{device} {command}: {}", reply.status);
            if let Some(message) = &reply.message {
                line.push_str(&format!(" ({message})"));
            }
            if let Some(ms) = elapsed_ms {
                line.push_str(&format!(" in {ms} ms"));
            }
            println!("{line}");
        }
    }
}

/// Confirmation for fire-and-forget commands that were not waited on.
pub fn print_sent(command: &str, device: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({"device": device, "command": command, "sent": true})
        ),
        OutputFormat::Table | OutputFormat::Pretty => println!("{device} {command}: sent"),
    }
}

fn pretty_snapshot(snapshot: &StatusSnapshot, device: &str) -> String {
    let mut parts = vec![device.to_string()];
    if let Some(leds) = &snapshot.leds {
        let leds: Vec<String> = leds
            .iter()
            .map(|led| format!("{}={}", led.id, on_off(led.state)))
            .collect();
        parts.push(format!("leds[{}]", leds.join(" ")));
    }
    if let Some(buttons) = &snapshot.buttons {
        let pressed: Vec<String> = buttons
            .iter()
            .filter(|b| b.pressed)
            .map(|b| b.id.to_string())
            .collect();
        parts.push(format!("pressed[{}]", pressed.join(" ")));
    }
    if let Some(pot) = snapshot.potentiometer {
        parts.push(format!("pot={}%", pot.percent));
    }
    if let Some(angle) = snapshot.servo_angle() {
        parts.push(format!("servo={angle}"));
    }
    parts.join(" ")
}

fn on_off(state: bool) -> &'static str {
    if state {
        "on"
    } else {
        "off"
    }
}

fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
