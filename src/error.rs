use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// A stage that needs an online token was called without one.
    #[error("{stage} requires a non-empty online token")]
    EmptyToken { stage: &'static str },

    #[error("failed to build the shared HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("browser login failed: {0}")]
    Browser(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
