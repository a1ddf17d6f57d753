use jsonwebtoken::errors::Error as JwtError;
use mongodb::error::Error as DbError;
use rocket::{http::Status, response::Responder};
use thiserror::Error;

use crate::model::otp::OtpError;

pub type Result<T> = std::result::Result<T, Error>;

/// Request-local error taxonomy. Every failure path through a route
/// resolves to one of these values; the responder maps each to an HTTP
/// status, so no handler manipulates statuses directly.
#[derive(Debug, Error)]
pub enum Error {
    /// The storage layer failed; transient and safe for the client to retry.
    #[error(transparent)]
    Db(#[from] DbError),
    /// A bearer token failed to decode (expired, malformed, or bad signature).
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("Bad request: {0}")]
    Validation(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Expired: {0}")]
    Expired(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
    /// Mail dispatch failed. Anything already committed stays committed.
    #[error("Dispatch failure: {0}")]
    Dispatch(String),
}

impl Error {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{what} not found"))
    }
}

impl From<OtpError> for Error {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::AlreadyVerified => Self::Conflict(err.to_string()),
            OtpError::Expired => Self::Expired(err.to_string()),
            OtpError::Mismatch => Self::Validation(err.to_string()),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = match &self {
            Self::Validation(_) => Status::BadRequest,
            Self::Unauthorized(_) | Self::Jwt(_) => Status::Unauthorized,
            Self::Forbidden(_) => Status::Forbidden,
            Self::NotFound(_) => Status::NotFound,
            Self::Conflict(_) => Status::Conflict,
            Self::Expired(_) => Status::Gone,
            Self::RateLimited(_) => Status::TooManyRequests,
            Self::Db(_) | Self::Dispatch(_) => Status::InternalServerError,
        };
        if status.class().is_server_error() {
            error!("{self}");
        } else {
            warn!("{self}");
        }
        Err(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_errors_map_to_taxonomy() {
        assert!(matches!(
            Error::from(OtpError::AlreadyVerified),
            Error::Conflict(_)
        ));
        assert!(matches!(Error::from(OtpError::Expired), Error::Expired(_)));
        assert!(matches!(
            Error::from(OtpError::Mismatch),
            Error::Validation(_)
        ));
    }
}
