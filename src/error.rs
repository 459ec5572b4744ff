//! # error
//!
//! Centralised application error type.
//!
//! Engine operations and HTTP handlers return `Result<_, AppError>`.  Axum's
//! `IntoResponse` impl converts these into structured JSON error bodies.
//!
//! Expected "unsuccessful" outcomes (duplicate signal, indeterminate trend,
//! stale tick on a terminal order) are **not** errors — they are modelled as
//! result enums next to the operation that produces them.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    /// The request payload was syntactically correct but semantically invalid.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The requested entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing broker keys or user settings — never retried.
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// Broker quote / historical-data / order call failed.
    #[error("Broker error: {0}")]
    Broker(String),

    /// Storage collaborator failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Catch-all for unexpected failures.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::NotConfigured(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::Broker(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::Store(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            AppError::Internal(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {err}"),
            ),
        };

        let body = Json(json!({
            "ok":    false,
            "error": message,
        }));

        (status, body).into_response()
    }
}
