//! Input validation for decode calls.
//!
//! Runs before any resource is acquired, so a bad request never ties up
//! a surface or worker.

use crate::core::ResizeOptions;
use crate::utils::{PixelResult, ValidationError};

/// Validate a decode payload and its optional resize target.
pub fn validate_request(payload: &[u8], resize: Option<&ResizeOptions>) -> PixelResult<()> {
    if payload.is_empty() {
        return Err(ValidationError::EmptyInput.into());
    }
    if let Some(resize) = resize {
        resize.validate()?;
    }
    Ok(())
}
