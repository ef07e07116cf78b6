//! Domain errors

use crate::infrastructure::gpio::GpioError;
use thiserror::Error;

/// Domain result type
pub type Result<T> = std::result::Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Gpio(#[from] GpioError),
}
