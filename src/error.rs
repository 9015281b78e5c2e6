// error.rs
use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serde_json::to_string(&self).unwrap_or_default())
    }
}

#[derive(Debug, PartialEq)]
pub enum ErrorMessage {
    InvalidJson,
    MissingSignature,
    MissingTimestamp,
    InvalidSignature,
    ServerMisconfigured,
    UnresolvableUser,
    NegativeAmount,
    NonPositiveAmount,
    NonPositiveInvoiceTotal,
    UnknownUser,
    PersistenceFailure,
    TokenNotProvided,
    InvalidToken,
    PermissionDenied,
}

impl ToString for ErrorMessage {
    fn to_string(&self) -> String {
        self.to_str().to_owned()
    }
}

impl ErrorMessage {
    fn to_str(&self) -> &str {
        match self {
            ErrorMessage::InvalidJson => "Invalid JSON payload",
            ErrorMessage::MissingSignature => "Missing signature header",
            ErrorMessage::MissingTimestamp => "Missing timestamp header",
            ErrorMessage::InvalidSignature => "Invalid signature",
            ErrorMessage::ServerMisconfigured => "Server misconfigured",
            ErrorMessage::UnresolvableUser => "Unable to resolve user for event",
            ErrorMessage::NegativeAmount => "Amount and fee must not be negative",
            ErrorMessage::NonPositiveAmount => "Net amount must be greater than zero",
            ErrorMessage::NonPositiveInvoiceTotal => "Invoice total must be greater than zero",
            ErrorMessage::UnknownUser => "User does not exist",
            ErrorMessage::PersistenceFailure => "Failed to record transaction",
            ErrorMessage::TokenNotProvided => "You are not logged in, please provide a token",
            ErrorMessage::InvalidToken => "Authentication token is invalid or expired",
            ErrorMessage::PermissionDenied => "You are not allowed to perform this action",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpError {
    pub message: String,
    pub status: StatusCode,
}

impl HttpError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        HttpError {
            message: message.into(),
            status,
        }
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::BAD_REQUEST)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::UNAUTHORIZED)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::FORBIDDEN)
    }

    /// The signing key (or another required secret) is absent from configuration.
    pub fn misconfigured() -> Self {
        HttpError::server_error(ErrorMessage::ServerMisconfigured.to_string())
    }

    pub fn into_http_response(self) -> Response {
        let json_response = Json(ErrorResponse {
            error: self.message.clone(),
        });

        (self.status, json_response).into_response()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HttpError: message: {}, status: {}", self.message, self.status)
    }
}

impl std::error::Error for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}
