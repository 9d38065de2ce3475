use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod display;
pub mod palette;
pub mod pick;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the companion display and print every UI state change.
    Display(DisplayArgs),
    /// Send one color to a running display.
    Pick(PickArgs),
    /// List the built-in colors.
    Palette(PaletteArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Display(args) => display::run(args, format),
        Command::Pick(args) => pick::run(args, format),
        Command::Palette(args) => palette::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DisplayArgs {
    /// Socket path to bind.
    #[arg(env = "PAIRLINK_SOCKET")]
    pub path: PathBuf,
    /// Exit after N colors have been received, repeats included.
    #[arg(long)]
    pub count: Option<u64>,
    /// Advertise the display app as not installed (the picker stays inactive).
    #[arg(long)]
    pub no_app: bool,
}

#[derive(Args, Debug)]
pub struct PickArgs {
    /// Socket path of the display.
    #[arg(env = "PAIRLINK_SOCKET")]
    pub path: PathBuf,
    /// Palette key or name (see `pairlink palette`).
    #[arg(long, short = 'c', required_unless_present = "rgba", conflicts_with = "rgba")]
    pub color: Option<String>,
    /// Custom color as `r,g,b,a` channels.
    #[arg(long, requires = "name")]
    pub rgba: Option<String>,
    /// Name sent with a custom `--rgba` color.
    #[arg(long, requires = "rgba")]
    pub name: Option<String>,
    /// How long to wait for the display, and then for its reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", env = "PAIRLINK_TIMEOUT")]
    pub timeout: String,
}

#[derive(Args, Debug, Default)]
pub struct PaletteArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("7").unwrap(), Duration::from_secs(7));
        assert_eq!(parse_duration("0s").unwrap_err().code, USAGE);
        assert_eq!(parse_duration("fast").unwrap_err().code, USAGE);
    }
}
