use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::ports::RepositoryError;
use crate::validation::{AmountError, ValidationError};

pub const CODE_OK: u32 = 0;
pub const CODE_UNKNOWN: u32 = 1300;
pub const CODE_PARSE_JSON_FAILED: u32 = 1302;
pub const CODE_AUTH_FAILED: u32 = 1305;
pub const CODE_PERMISSION_DENIED: u32 = 1306;
pub const CODE_INVALID_PARAMETERS: u32 = 1307;
pub const CODE_RECORD_TRANSACTION: u32 = 1308;
pub const CODE_UPDATE_BALANCE: u32 = 1309;
pub const CODE_QUERY_TRANSACTIONS: u32 = 1312;
pub const CODE_GET_AIPAY_MSG: u32 = 1313;
pub const CODE_AMOUNT_NEGATIVE: u32 = 1315;
pub const CODE_AMOUNT_TOO_BIG: u32 = 1316;
pub const CODE_NOT_FOUND: u32 = 1318;

/// Which stage of a request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Auth,
    Persistence,
    ExternalCall,
    NotFound,
    Internal,
}

/// Service-boundary error. The numeric code and the leading message are
/// stable; the parenthesised detail is informational only.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("recharge amount is negative")]
    AmountNegative,

    #[error("recharge amount is too big")]
    AmountTooLarge,

    #[error("invalid parameters ({0})")]
    Validation(String),

    #[error("parse json failed ({0})")]
    ParseJson(String),

    #[error("auth failed ({0})")]
    Unauthorized(String),

    #[error("permission denied ({0})")]
    PermissionDenied(String),

    #[error("failed to record transaction ({0})")]
    RecordTransaction(String),

    #[error("failed to update balance ({0})")]
    UpdateBalance(String),

    #[error("failed to query transactions ({0})")]
    QueryTransactions(String),

    #[error("failed to get aipay message ({0})")]
    Gateway(String),

    #[error("transaction not found ({0})")]
    NotFound(String),

    #[error("unknown error ({0})")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> u32 {
        match self {
            AppError::AmountNegative => CODE_AMOUNT_NEGATIVE,
            AppError::AmountTooLarge => CODE_AMOUNT_TOO_BIG,
            AppError::Validation(_) => CODE_INVALID_PARAMETERS,
            AppError::ParseJson(_) => CODE_PARSE_JSON_FAILED,
            AppError::Unauthorized(_) => CODE_AUTH_FAILED,
            AppError::PermissionDenied(_) => CODE_PERMISSION_DENIED,
            AppError::RecordTransaction(_) => CODE_RECORD_TRANSACTION,
            AppError::UpdateBalance(_) => CODE_UPDATE_BALANCE,
            AppError::QueryTransactions(_) => CODE_QUERY_TRANSACTIONS,
            AppError::Gateway(_) => CODE_GET_AIPAY_MSG,
            AppError::NotFound(_) => CODE_NOT_FOUND,
            AppError::Internal(_) => CODE_UNKNOWN,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::AmountNegative
            | AppError::AmountTooLarge
            | AppError::Validation(_)
            | AppError::ParseJson(_) => ErrorKind::Validation,
            AppError::Unauthorized(_) | AppError::PermissionDenied(_) => ErrorKind::Auth,
            AppError::RecordTransaction(_)
            | AppError::UpdateBalance(_)
            | AppError::QueryTransactions(_) => ErrorKind::Persistence,
            AppError::Gateway(_) => ErrorKind::ExternalCall,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            _ => match self.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::ExternalCall => StatusCode::BAD_GATEWAY,
                ErrorKind::Auth | ErrorKind::Persistence | ErrorKind::Internal => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl From<AmountError> for AppError {
    fn from(err: AmountError) -> Self {
        match err {
            AmountError::Negative => AppError::AmountNegative,
            AmountError::TooLarge => AppError::AmountTooLarge,
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::Gateway(err.to_string())
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => AppError::NotFound(id),
            other => AppError::QueryTransactions(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self.kind() {
            ErrorKind::Persistence | ErrorKind::ExternalCall | ErrorKind::Internal => {
                tracing::error!(code = self.code(), "{}", self)
            }
            _ => tracing::warn!(code = self.code(), "{}", self),
        }

        let body = Json(json!({
            "code": self.code(),
            "msg": self.to_string(),
        }));

        (status, body).into_response()
    }
}
