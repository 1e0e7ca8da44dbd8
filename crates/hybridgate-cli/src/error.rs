use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] hybridgate_core::ConfigError),

    #[error("invalid request JSON: {0}")]
    Input(serde_json::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("server error: {0}")]
    Server(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Input(_) => 2,
            Self::Serialization(_) => 4,
            Self::Render(_) => 4,
            Self::Server(_) => 6,
            Self::Io(_) => 10,
        }
    }
}
