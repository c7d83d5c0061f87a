// Error taxonomy for the member registry
//
// Validators answer with bool / Option and never appear here.
// Everything a caller can act on has its own variant.

use crate::identity::BirthDateError;
use crate::validation::FieldError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// One or more form fields were rejected
    #[error("validation failed: {}", summarize(.0))]
    Validation(Vec<FieldError>),

    /// Storage uniqueness constraint on `field` was violated
    #[error("{message}")]
    Duplicate { field: String, message: String },

    #[error("member {0} not found")]
    NotFound(i64),

    /// Every candidate member number drawn was already taken
    #[error("no free member number after {attempts} attempts")]
    GenerationExhausted { attempts: usize },

    /// Internal inconsistency: a validated ID produced no birth date
    #[error(transparent)]
    BirthDate(#[from] BirthDateError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

impl RegistryError {
    /// Field errors when this is a validation failure
    pub fn field_errors(&self) -> Option<&[FieldError]> {
        match self {
            RegistryError::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    /// Recoverable at the presentation boundary (re-prompt or retry)
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            RegistryError::Validation(_)
                | RegistryError::Duplicate { .. }
                | RegistryError::NotFound(_)
        )
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
