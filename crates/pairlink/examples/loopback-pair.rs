//! Picker and display wired together in one process.
//!
//! Run with:
//!   cargo run --example loopback-pair

use std::time::Duration;

use pairlink::palette::PALETTE;
use pairlink::session::{ChannelBuilder, ChannelConfig, LoopbackSession, SessionState};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (phone, watch) = LoopbackSession::pair();

    let display = ChannelBuilder::new(watch)
        .with_config(ChannelConfig::default().with_name("example-display"))
        .with_observer(|state| {
            eprintln!(
                "[display] {} | {} {}",
                state.session_state,
                state.current_color.name,
                state.current_color.to_hex()
            );
        })
        .open()?;
    let picker = ChannelBuilder::new(phone)
        .with_config(ChannelConfig::default().with_name("example-picker"))
        .open()?;

    if !picker.wait_for_state(SessionState::ActivatedReachable, Duration::from_secs(2)) {
        return Err("picker never became reachable".into());
    }

    for entry in PALETTE.iter().take(3) {
        let reply = picker.send(&entry.payload())?;
        eprintln!("[picker] {} -> {}", entry.name, reply.message);
    }

    // Out of range: the send is refused locally and the display never hears about it.
    picker.session().set_reachable(false);
    picker.wait_for_state(SessionState::ActivatedUnreachable, Duration::from_secs(2));
    if let Err(err) = picker.send(&PALETTE[3].payload()) {
        eprintln!("[picker] {err}");
    }

    if let Some(state) = display.ui_state() {
        eprintln!("[display] final color: {}", state.current_color.name);
    }
    Ok(())
}
