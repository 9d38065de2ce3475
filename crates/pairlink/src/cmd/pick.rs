use std::time::Duration;

use pairlink::palette;
use pairlink_session::{
    ChannelBuilder, ChannelConfig, ColorPayload, LinkConfig, PeerChannel, SessionState,
    SocketSession,
};
use tracing::debug;

use crate::cmd::{parse_duration, PickArgs};
use crate::exit::{
    channel_error, exchange_error, CliError, CliResult, FAILURE, PEER_REJECTED, SUCCESS, TIMEOUT,
    USAGE,
};
use crate::output::{print_send, OutputFormat};

pub fn run(args: PickArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let color = resolve_color(&args)?;

    let session = SocketSession::connect(&args.path, LinkConfig::default());
    let channel = ChannelBuilder::new(session)
        .with_config(
            ChannelConfig::default()
                .with_name("pick")
                .with_send_timeout(timeout),
        )
        .open()
        .map_err(|err| channel_error("picker start failed", err))?;

    wait_until_reachable(&channel, timeout)?;
    debug!(color = %color.name, "display reachable; sending");

    let reply = channel
        .send(&color)
        .map_err(|err| exchange_error("send failed", err))?;
    print_send(&color, &reply, format);

    if reply.is_success() {
        Ok(SUCCESS)
    } else {
        Ok(PEER_REJECTED)
    }
}

fn wait_until_reachable(channel: &PeerChannel<SocketSession>, timeout: Duration) -> CliResult<()> {
    if channel.wait_for_state(SessionState::ActivatedReachable, timeout) {
        return Ok(());
    }
    match channel.state() {
        SessionState::Inactive => Err(CliError::new(
            FAILURE,
            "peer session inactive (display app missing or hello rejected)",
        )),
        state => Err(CliError::new(
            TIMEOUT,
            format!(
                "display not reachable within {}ms (session {state})",
                timeout.as_millis()
            ),
        )),
    }
}

fn resolve_color(args: &PickArgs) -> CliResult<ColorPayload> {
    if let Some(query) = &args.color {
        return palette::lookup(query)
            .map(|entry| entry.payload())
            .ok_or_else(|| {
                CliError::new(
                    USAGE,
                    format!("unknown color '{query}' (see `pairlink palette`)"),
                )
            });
    }

    match (&args.rgba, &args.name) {
        (Some(rgba), Some(name)) => parse_rgba(name, rgba),
        _ => Err(CliError::new(USAGE, "either --color or --rgba with --name is required")),
    }
}

fn parse_rgba(name: &str, input: &str) -> CliResult<ColorPayload> {
    let channels = input
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| CliError::new(USAGE, format!("invalid --rgba '{input}': {err}")))?;

    let &[red, green, blue, alpha] = channels.as_slice() else {
        return Err(CliError::new(
            USAGE,
            format!("--rgba needs 4 channels, got {}", channels.len()),
        ));
    };
    if [red, green, blue, alpha].iter().any(|c| !c.is_finite()) {
        return Err(CliError::new(USAGE, "--rgba channels must be finite numbers"));
    }
    Ok(ColorPayload::new(name, red, green, blue, alpha))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rgba_channels() {
        let color = parse_rgba("custom", "1, 0.5,0,1").unwrap();
        assert_eq!(color, ColorPayload::new("custom", 1.0, 0.5, 0.0, 1.0));
    }

    #[test]
    fn out_of_range_rgba_is_passed_through() {
        let color = parse_rgba("loud", "2,0,0,1").unwrap();
        assert!(!color.is_in_unit_range());
    }

    #[test]
    fn rejects_bad_rgba() {
        assert_eq!(parse_rgba("x", "1,0,0").unwrap_err().code, USAGE);
        assert_eq!(parse_rgba("x", "1,0,zero,1").unwrap_err().code, USAGE);
        assert_eq!(parse_rgba("x", "NaN,0,0,1").unwrap_err().code, USAGE);
    }
}
