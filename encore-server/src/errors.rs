use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use encore_core::{EncoreError, StorageError};
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Update body must contain at least one field")]
    EmptyUpdate,
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::MissingField(_) => StatusCode::BAD_REQUEST,
            Self::EmptyUpdate => StatusCode::BAD_REQUEST,
            Self::NotFound {
                resource: _,
                identifier: _,
            } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<StorageError> for ServerError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<EncoreError> for ServerError {
    fn from(value: EncoreError) -> Self {
        match value {
            EncoreError::MissingField(field) => Self::MissingField(field),
            EncoreError::Storage(e) => e.into(),
        }
    }
}
