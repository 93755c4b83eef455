use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MockError {
    #[error("usage error: {0}")]
    Usage(String),
    #[error("verification failed: {0}")]
    Verification(String),
    #[error("instantiation error: {0}")]
    Instantiation(String),
    #[error("answer error: {0}")]
    Answer(String),
    #[error("config parse error: {0}")]
    ConfigParse(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("io error: {0}")]
    Io(String),
}

impl MockError {
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }

    pub fn is_verification(&self) -> bool {
        matches!(self, Self::Verification(_))
    }
}
