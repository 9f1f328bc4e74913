use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("A global tracing subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Installs the process-wide `tracing` subscriber.
pub trait LoggingService {
    fn init_logging(level_str: &str, use_color: bool) -> Result<(), LoggingError>;
}
