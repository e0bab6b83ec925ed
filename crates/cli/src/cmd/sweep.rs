use std::sync::Arc;

use anyhow::{Result, ensure};
use argp::FromArgs;
use cla_bot_actions::{ActionContext, agreement::sweep};
use cla_bot_core::{config::Config, models::UsernameSet};

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Mark every open pull request by the given users as signed.
#[argp(subcommand, name = "sweep")]
pub struct Args {
    #[argp(positional)]
    /// GitHub usernames
    usernames: Vec<String>,
}

pub async fn run(args: Args, config: Config) -> Result<()> {
    ensure!(!args.usernames.is_empty(), "No usernames given");
    let ctx = ActionContext::from_config(Arc::new(config))?;
    let usernames: UsernameSet = args.usernames.into_iter().collect();
    let result = sweep(&ctx, &usernames).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    ensure!(result.errors.is_empty(), "{} pull requests could not be updated", result.errors.len());
    Ok(())
}
