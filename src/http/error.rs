//! HTTP error mapping.

use crate::marketplace::{domain::MarketplaceDomainError, services::WorkflowError};
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Errors returned to HTTP clients as `{ "error": message }`.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Missing, malformed, or invalid bearer token.
    #[error("unauthorized")]
    Unauthorized,

    /// The request body could not be decoded.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// A path segment such as an id could not be decoded.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A workflow refused or failed the operation.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InvalidBody(_) | Self::InvalidPath(_) => StatusCode::BAD_REQUEST,
            Self::Workflow(err) => workflow_status(err),
        }
    }
}

const fn workflow_status(err: &WorkflowError) -> StatusCode {
    match err {
        WorkflowError::RequestNotFound(_)
        | WorkflowError::ProposalNotFound(_)
        | WorkflowError::NotificationNotFound(_) => StatusCode::NOT_FOUND,
        WorkflowError::Forbidden(_) => StatusCode::FORBIDDEN,
        WorkflowError::InvalidAction(_) | WorkflowError::InvalidStatus(_) => {
            StatusCode::BAD_REQUEST
        }
        WorkflowError::Domain(domain) => domain_status(domain),
        WorkflowError::TransactionFailed(_) | WorkflowError::Template(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

const fn domain_status(err: &MarketplaceDomainError) -> StatusCode {
    match err {
        MarketplaceDomainError::InvalidStateTransition { .. }
        | MarketplaceDomainError::RequestNotOpen(_)
        | MarketplaceDomainError::MissingProvider(_)
        | MarketplaceDomainError::DuplicateProposal(_) => StatusCode::CONFLICT,
        MarketplaceDomainError::UnknownProposal { .. } => StatusCode::NOT_FOUND,
        MarketplaceDomainError::InvalidPrice(_)
        | MarketplaceDomainError::EmptyCategory
        | MarketplaceDomainError::EmptyDescription
        | MarketplaceDomainError::EmptyNotificationTitle
        | MarketplaceDomainError::NoNotificationChannels => StatusCode::BAD_REQUEST,
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::InvalidPath(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_owned()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
