use anyhow::{Result, ensure};
use argp::FromArgs;
use cla_bot_actions::lookup::lookup_usernames;
use cla_bot_core::config::Config;
use cla_bot_sign::AdobeSign;

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Resolve signed agreements to the GitHub usernames they cover.
#[argp(subcommand, name = "lookup")]
pub struct Args {
    #[argp(positional)]
    /// agreement IDs
    agreements: Vec<String>,
}

pub async fn run(args: Args, config: &Config) -> Result<()> {
    ensure!(!args.agreements.is_empty(), "No agreement IDs given");
    let sign = AdobeSign::new(&config.sign);
    let usernames = lookup_usernames(sign.as_ref(), &args.agreements, None).await?;
    tracing::info!("Found {} usernames in {} agreements", usernames.len(), args.agreements.len());
    for username in usernames.iter() {
        println!("{username}");
    }
    Ok(())
}
