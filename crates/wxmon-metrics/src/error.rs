#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SinkError {
    #[error("Sink: {field} is not a finite number ({value})")]
    NonFinite { field: &'static str, value: f64 },

    #[error("Sink: {0}")]
    Other(String),
}

pub(crate) fn ensure_finite(field: &'static str, value: f64) -> Result<(), SinkError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SinkError::NonFinite { field, value })
    }
}
