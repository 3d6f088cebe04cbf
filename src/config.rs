use std::ffi::OsString;
use std::path::PathBuf;

use thiserror::Error;

/// Environment variable naming a directory of `.lox` files run before anything else
pub const PRELUDE_ENV: &str = "LOXWALK_PRELUDE";

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Usage: loxwalk [script]")]
pub struct UsageError;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// None means read lines interactively
    pub script: Option<PathBuf>,
    pub prelude_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Config, UsageError> {
        Config::from_parts(std::env::args_os().skip(1), std::env::var_os(PRELUDE_ENV))
    }

    /// `args` excludes the program name
    pub fn from_parts<I>(args: I, prelude_dir: Option<OsString>) -> Result<Config, UsageError>
    where
        I: IntoIterator<Item = OsString>,
    {
        let mut args = args.into_iter();
        let script = args.next().map(PathBuf::from);
        if args.next().is_some() {
            return Err(UsageError);
        }
        Ok(Config {
            script,
            prelude_dir: prelude_dir.filter(|dir| !dir.is_empty()).map(PathBuf::from),
        })
    }
}
