use thiserror::Error;

/// Raised by the request builders before anything is sent to the provider.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RequestValidationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("invalid port mapping '{0}', expected host:container")]
    InvalidPort(String),
    #[error("volume mount path '{0}' must be absolute")]
    RelativeMountPath(String),
    #[error("{field} must be greater than zero")]
    ZeroQuantity { field: &'static str },
}

pub(crate) fn require(field: &'static str, value: &str) -> Result<(), RequestValidationError> {
    if value.trim().is_empty() {
        return Err(RequestValidationError::EmptyField(field));
    }
    Ok(())
}

pub(crate) fn require_positive(field: &'static str, value: u32) -> Result<(), RequestValidationError> {
    if value == 0 {
        return Err(RequestValidationError::ZeroQuantity { field });
    }
    Ok(())
}
