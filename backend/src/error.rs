//! API error type and its HTTP rendering

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::Request;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// 400
    #[error("{0}")]
    BadRequest(String),
    /// 401, missing or expired admin session
    #[error("admin session required")]
    Unauthorized,
    /// 403
    #[error("{0}")]
    Forbidden(String),
    /// 404
    #[error("{0}")]
    NotFound(String),
    /// 409
    #[error("{0}")]
    Conflict(String),
    /// 412, the event is not in the phase this action needs
    #[error("{0}")]
    PreconditionFailed(String),
    /// 500
    #[error("database error: {0}")]
    Database(DieselError),
    /// 500
    #[error("{0}")]
    Internal(String),
}

/// JSON body for every error response, including catcher output.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::Unauthorized => Status::Unauthorized,
            ApiError::Forbidden(_) => Status::Forbidden,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Conflict(_) => Status::Conflict,
            ApiError::PreconditionFailed(_) => Status::PreconditionFailed,
            ApiError::Database(_) | ApiError::Internal(_) => Status::InternalServerError,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::PreconditionFailed(_) => "precondition_failed",
            ApiError::Database(_) | ApiError::Internal(_) => "internal_error",
        }
    }
}

impl From<DieselError> for ApiError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => ApiError::NotFound("record not found".to_string()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                // The driver message names keys and values
                tracing::debug!(detail = info.message(), "unique constraint violated");
                ApiError::Conflict("conflicts with an existing record".to_string())
            }
            other => ApiError::Database(other),
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for ApiError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ApiError::Internal(format!("failed to build workbook: {err}"))
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let kind = self.kind();
        let message = match &self {
            // Internal details stay in the log
            ApiError::Database(_) => "database error".to_string(),
            other => other.to_string(),
        };

        if status.code >= 500 {
            tracing::error!(error = kind, detail = %self, uri = %req.uri(), "request failed");
        } else {
            tracing::debug!(error = kind, %message, uri = %req.uri(), "request rejected");
        }

        (status, Json(ErrorBody::new(kind, message))).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_variants() {
        assert_eq!(ApiError::BadRequest("x".into()).status(), Status::BadRequest);
        assert_eq!(ApiError::Unauthorized.status(), Status::Unauthorized);
        assert_eq!(ApiError::Forbidden("x".into()).status(), Status::Forbidden);
        assert_eq!(ApiError::Conflict("x".into()).status(), Status::Conflict);
        assert_eq!(
            ApiError::PreconditionFailed("x".into()).status(),
            Status::PreconditionFailed
        );
        assert_eq!(
            ApiError::Internal("x".into()).status(),
            Status::InternalServerError
        );
    }

    #[test]
    fn diesel_not_found_becomes_404() {
        let err: ApiError = DieselError::NotFound.into();
        assert_eq!(err.status(), Status::NotFound);
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn unique_violation_hides_driver_message() {
        let info = "Duplicate entry '1-a@x.com' for key 'participants.uq_participants_event_email'"
            .to_string();
        let err: ApiError =
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, Box::new(info)).into();
        assert_eq!(err.status(), Status::Conflict);
        assert_eq!(err.kind(), "conflict");
        let message = err.to_string();
        assert!(!message.contains("uq_"));
        assert!(!message.contains("a@x.com"));
    }

    #[test]
    fn other_diesel_errors_are_internal() {
        let err: ApiError = DieselError::RollbackTransaction.into();
        assert!(matches!(err, ApiError::Database(_)));
        assert_eq!(err.status(), Status::InternalServerError);
    }
}
