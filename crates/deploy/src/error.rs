//! Deploy error types.

use hashpub_constor::ConstorError;

/// Errors produced while publishing a build.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("compile error: {0}")]
    Compile(String),

    #[error("can't compile - {0} is not a main package")]
    NotCommand(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] ConstorError),
}
