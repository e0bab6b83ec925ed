use anyhow::Result;
use cla_bot_core::config::Config;
use typed_path::Utf8NativePathBuf;

// For argp::FromArgs
pub fn native_path(value: &str) -> Result<Utf8NativePathBuf, String> {
    Ok(Utf8NativePathBuf::from(value))
}

/// Loads the config from `path`, or from the default location.
pub fn load_config(path: Option<&Utf8NativePathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path.with_platform_encoding()),
        None => Config::from_env(),
    }
}
