use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Process error: {0}")]
    Process(String),

    #[error("script {script:?} failed: {detail}")]
    ScriptFailed { script: String, detail: String },

    #[error("script {script:?} timed out after {timeout:?}")]
    Timeout { script: String, timeout: Duration },

    #[error("run cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
