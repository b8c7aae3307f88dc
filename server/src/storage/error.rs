use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid configuration name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Configuration {0} was not readable after it was written")]
    MissingAfterWrite(String),
}
