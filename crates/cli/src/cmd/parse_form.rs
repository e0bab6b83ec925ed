use anyhow::{Context, Result};
use argp::FromArgs;
use cla_bot_sign::form::parse_form_data;
use typed_path::Utf8NativePathBuf;

use crate::util::native_path;

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Extract GitHub usernames from a saved agreement form data export.
#[argp(subcommand, name = "parse-form")]
pub struct Args {
    #[argp(option, short = 'i', from_str_fn(native_path))]
    /// form data CSV file
    input: Utf8NativePathBuf,
}

pub fn run(args: Args) -> Result<()> {
    let data = std::fs::read_to_string(args.input.with_platform_encoding())
        .with_context(|| format!("Failed to read {}", args.input))?;
    let record =
        parse_form_data(&data).with_context(|| format!("Failed to parse {}", args.input))?;
    for username in record.usernames() {
        println!("{username}");
    }
    Ok(())
}
