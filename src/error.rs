use thiserror::Error;
use warp::reject::Reject;

/// A request body that failed a domain rule.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {reason}")]
pub(crate) struct ValidationError {
    pub(crate) field: String,
    pub(crate) reason: String,
}

impl ValidationError {
    pub(crate) fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Checks that a required text field is present and within `max` characters.
pub(crate) fn require_text(field: &str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    if value.chars().count() > max {
        return Err(ValidationError::new(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(())
}

#[derive(Debug, Error)]
pub(crate) enum ApiError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl Reject for ApiError {}

impl ApiError {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_text_limits() {
        assert_eq!(
            require_text("name", "  ", 10),
            Err(ValidationError::new("name", "must not be empty"))
        );
        assert_eq!(
            require_text("name", "abcdef", 5),
            Err(ValidationError::new("name", "must be at most 5 characters"))
        );
        assert_eq!(require_text("name", "abcde", 5), Ok(()));
    }

    #[test]
    fn messages() {
        assert_eq!(
            ApiError::not_found("view", "v1").to_string(),
            "view v1 not found"
        );
        assert_eq!(
            ApiError::from(ValidationError::new("columns", "must not be empty")).to_string(),
            "columns: must not be empty"
        );
    }
}
