use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use pairlink::palette::PaletteEntry;
use pairlink_session::{ColorPayload, ObservableUiState, Reply};
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
struct UiStateOutput<'a> {
    event: &'static str,
    #[serde(flatten)]
    state: &'a ObservableUiState,
    hex: String,
    timestamp: String,
}

#[derive(Serialize)]
struct SendOutput<'a> {
    event: &'static str,
    color: &'a ColorPayload,
    hex: String,
    status: &'static str,
    message: &'a str,
}

#[derive(Serialize)]
struct PaletteOutput<'a> {
    key: &'a str,
    name: &'a str,
    hex: String,
    red: f64,
    green: f64,
    blue: f64,
}

pub fn print_ui_state(state: &ObservableUiState, format: OutputFormat) {
    let hex = state.current_color.to_hex();
    match format {
        OutputFormat::Json => {
            let out = UiStateOutput {
                event: "ui_state",
                state,
                hex,
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SESSION", "CONNECTED", "REACHABLE", "COLOR", "HEX", "STATUS"])
                .add_row(vec![
                    state.session_state.to_string(),
                    state.is_connected.to_string(),
                    state.is_reachable.to_string(),
                    state.current_color.name.clone(),
                    hex,
                    state.status_text.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "session={} connected={} reachable={} color={} ({}) status={}",
                state.session_state,
                state.is_connected,
                state.is_reachable,
                state.current_color.name,
                hex,
                state.status_text
            );
        }
    }
}

pub fn print_send(color: &ColorPayload, reply: &Reply, format: OutputFormat) {
    let hex = color.to_hex();
    match format {
        OutputFormat::Json => {
            let out = SendOutput {
                event: "color_sent",
                color,
                hex,
                status: reply.status.as_str(),
                message: &reply.message,
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COLOR", "HEX", "STATUS", "MESSAGE"])
                .add_row(vec![
                    color.name.clone(),
                    hex,
                    reply.status.as_str().to_string(),
                    reply.message.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "color={} ({}) status={} message={}",
                color.name,
                hex,
                reply.status.as_str(),
                reply.message
            );
        }
    }
}

pub fn print_palette(entries: &[PaletteEntry], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for entry in entries {
                let color = entry.payload();
                print_json(&PaletteOutput {
                    key: entry.key,
                    name: entry.name,
                    hex: color.to_hex(),
                    red: color.red,
                    green: color.green,
                    blue: color.blue,
                });
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KEY", "NAME", "HEX"]);
            for entry in entries {
                table.add_row(vec![
                    entry.key.to_string(),
                    entry.name.to_string(),
                    entry.payload().to_hex(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for entry in entries {
                println!("{:<8} {} {}", entry.key, entry.name, entry.payload().to_hex());
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
