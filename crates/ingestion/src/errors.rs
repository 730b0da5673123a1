//! Ingestion error types

use convorag_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IngestionError {
    #[error("Invalid chunking configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown chunking strategy '{0}', expected 'recursive' or 'semantic'")]
    UnknownStrategy(String),

    #[error("Document {index} has empty content")]
    EmptyDocument { index: usize },

    #[error("Document id '{0}' appears more than once in the request")]
    DuplicateDocumentId(String),

    #[error("Unsupported file type '.{extension}'")]
    UnsupportedFileType { extension: String },

    #[error("File size exceeds maximum of {limit_mb}MB")]
    FileTooLarge { limit_mb: u64 },

    #[error("Could not read '{file}': {message}")]
    UnreadableFile { file: String, message: String },
}

impl From<IngestionError> for AppError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::InvalidConfig(message) => AppError::Configuration { message },
            IngestionError::UnknownStrategy(_) => AppError::Validation {
                message: e.to_string(),
                field: Some("chunking_strategy".to_string()),
            },
            IngestionError::EmptyDocument { .. } | IngestionError::DuplicateDocumentId(_) => {
                AppError::Validation {
                    message: e.to_string(),
                    field: Some("documents".to_string()),
                }
            }
            IngestionError::UnsupportedFileType { .. }
            | IngestionError::FileTooLarge { .. }
            | IngestionError::UnreadableFile { .. } => AppError::InvalidUpload {
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_errors_map_to_validation() {
        let err: AppError = IngestionError::UnknownStrategy("fancy".into()).into();
        assert_eq!(err.status_code().as_u16(), 422);

        let err: AppError = IngestionError::EmptyDocument { index: 1 }.into();
        assert_eq!(err.status_code().as_u16(), 422);
    }

    #[test]
    fn test_upload_errors_are_bad_request() {
        let err: AppError = IngestionError::FileTooLarge { limit_mb: 10 }.into();
        assert_eq!(err.status_code().as_u16(), 400);
        assert_eq!(err.to_string(), "File size exceeds maximum of 10MB");

        let err: AppError = IngestionError::UnsupportedFileType { extension: "exe".into() }.into();
        assert_eq!(err.status_code().as_u16(), 400);
    }

    #[test]
    fn test_config_errors_are_internal() {
        let err: AppError = IngestionError::InvalidConfig("chunk_size is zero".into()).into();
        assert_eq!(err.status_code().as_u16(), 500);
    }
}
