use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::helpers::connection_suggestion;

/// Failure reported by a runtime collaborator call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuntimeError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("timeout after {0}ms")]
    Timeout(u128),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Api(String),
}

/// Every connection strategy for a host failed.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("unable to connect to {address}: {message}")]
pub struct ConnectionError {
    pub address: String,
    pub message: String,
}

impl ConnectionError {
    pub fn suggestion(&self) -> &'static str {
        connection_suggestion(&self.message)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SampleError {
    #[error("timeout")]
    Timeout,
    #[error("{0}")]
    Runtime(String),
}

/// A single derived field could not be computed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DerivationError {
    #[error("field {0} missing")]
    Missing(&'static str),
    #[error("invalid port {0:?}")]
    InvalidPort(String),
    #[error("unparseable address {0:?}")]
    InvalidAddress(String),
    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),
}

/// The raw record was unreadable as a whole.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FormatError {
    #[error("container record has no id")]
    MissingId,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Error surface of per-host queries (listing, detail, stats, unused resources).
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error("runtime query failed: {0}")]
    Runtime(RuntimeError),
    #[error("{0} not found")]
    NotFound(String),
}

impl From<RuntimeError> for DashboardError {
    fn from(e: RuntimeError) -> Self {
        match e {
            RuntimeError::NotFound(what) => DashboardError::NotFound(what),
            other => DashboardError::Runtime(other),
        }
    }
}

/// HTTP boundary error. Renders `{"error": ..., "details": {...}}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Dashboard(#[from] DashboardError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Dashboard(DashboardError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Dashboard(DashboardError::Connection(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Dashboard(DashboardError::Runtime(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Registry(RegistryError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Registry(RegistryError::Invalid(_))
            | ApiError::Registry(RegistryError::Forbidden(_)) => StatusCode::BAD_REQUEST,
            ApiError::Registry(RegistryError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("api error: {}", self);
        }
        let body = match &self {
            ApiError::Dashboard(DashboardError::Connection(e)) => json!({
                "error": self.to_string(),
                "details": {
                    "host_url": e.address,
                    "suggestion": e.suggestion(),
                },
            }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
