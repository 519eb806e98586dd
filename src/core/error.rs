use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

pub(crate) fn ensure_finite(field: &'static str, value: f64) -> EngineResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EngineError::invalid(field, "must be finite"))
    }
}

pub(crate) fn ensure_non_negative(field: &'static str, value: f64) -> EngineResult<()> {
    ensure_finite(field, value)?;
    if value < 0.0 {
        return Err(EngineError::invalid(field, "must be >= 0"));
    }
    Ok(())
}
