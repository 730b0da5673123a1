//! Request body extraction with validation
//!
//! Malformed bodies and failed `validator` rules both surface as
//! `AppError::Validation` so every rejection shares the error envelope.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, OptionalFromRequest, Request},
    Json,
};
use convorag_common::errors::AppError;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

/// JSON body that has passed its `Validate` rules
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = <Json<T> as FromRequest<S>>::from_request(req, state)
            .await
            .map_err(rejection)?;
        value.validate().map_err(invalid)?;
        Ok(Self(value))
    }
}

/// Absent body (no content type) extracts as `None`
impl<T, S> OptionalFromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        let json = <Json<T> as OptionalFromRequest<S>>::from_request(req, state)
            .await
            .map_err(rejection)?;
        match json {
            Some(Json(value)) => {
                value.validate().map_err(invalid)?;
                Ok(Some(Self(value)))
            }
            None => Ok(None),
        }
    }
}

fn rejection(err: JsonRejection) -> AppError {
    AppError::Validation {
        message: err.body_text(),
        field: None,
    }
}

fn invalid(errors: ValidationErrors) -> AppError {
    let field = errors.field_errors().keys().next().map(|k| k.to_string());
    AppError::Validation {
        message: errors.to_string(),
        field,
    }
}
