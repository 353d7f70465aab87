use crate::catalog::CatalogError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::{debug, error};
use std::io;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Email is already registered: {0}")]
    DuplicateEmail(String),

    #[error("Movie already saved as favorite: {0}")]
    DuplicateFavorite(u64),

    #[error("Token is already invalidated")]
    AlreadyBanned,

    #[error("Error {action} {target}: {source}")]
    Io {
        action: &'static str,
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("Error encoding record: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    pub fn io(action: &'static str, target: String, source: io::Error) -> Self {
        StoreError::Io {
            action,
            target,
            source,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::DuplicateEmail(_)
                | StoreError::DuplicateFavorite(_)
                | StoreError::AlreadyBanned
        )
    }
}

/// Rejected input, reported back to the client verbatim.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Password is invalid")]
    InvalidPassword,
    #[error("First name is required")]
    MissingFirstName,
    #[error("Last name is required")]
    MissingLastName,
    #[error("Movie id is required")]
    MissingMovieId,
    #[error("Movie title is required")]
    MissingTitle,
    #[error("A valid user email is required")]
    MissingUserEmail,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("authentication is required")]
    Unauthorized,

    #[error("Either the user or the password is incorrect")]
    InvalidCredentials,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Internal(&'static str),
}

impl ApiError {
    /// Hides `err` from the client behind `message`; the details only reach the debug log.
    pub fn internal<E: std::fmt::Debug>(err: E, message: &'static str) -> Self {
        debug!("{:?}", err);
        ApiError::Internal(message)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Domain(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(err) if err.is_conflict() => StatusCode::CONFLICT,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Catalog(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::InvalidCredentials => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{}", self);
        }
        HttpResponse::build(status).json(self.to_string())
    }
}
