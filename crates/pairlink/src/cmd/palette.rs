use pairlink::palette::PALETTE;

use crate::cmd::PaletteArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_palette, OutputFormat};

pub fn run(_args: PaletteArgs, format: OutputFormat) -> CliResult<i32> {
    print_palette(&PALETTE, format);
    Ok(SUCCESS)
}
