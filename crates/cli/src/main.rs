mod cmd;
mod util;

use anyhow::Result;
use argp::FromArgs;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};
use typed_path::Utf8NativePathBuf;

use crate::util::{load_config, native_path};

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Contribution agreement bot tools.
struct TopLevel {
    #[argp(subcommand)]
    command: SubCommand,
    #[argp(option, short = 'c', from_str_fn(native_path))]
    /// config file (defaults to $CLA_BOT_CONFIG or config.yml)
    config: Option<Utf8NativePathBuf>,
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
#[argp(subcommand)]
enum SubCommand {
    Lookup(cmd::lookup::Args),
    ParseForm(cmd::parse_form::Args),
    Sweep(cmd::sweep::Args),
}

#[tokio::main]
async fn main() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(env_filter).with_writer(std::io::stderr).init();

    let args: TopLevel = argp::parse_args_or_exit(argp::DEFAULT);
    if let Err(e) = run(args).await {
        tracing::error!("{e:?}");
        std::process::exit(1);
    }
}

async fn run(args: TopLevel) -> Result<()> {
    match args.command {
        SubCommand::Lookup(c) => cmd::lookup::run(c, &load_config(args.config.as_ref())?).await,
        SubCommand::ParseForm(c) => cmd::parse_form::run(c),
        SubCommand::Sweep(c) => cmd::sweep::run(c, load_config(args.config.as_ref())?).await,
    }
}
