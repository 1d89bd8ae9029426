/*
 * Meeting Assistant CLI - Rust Edition
 * Copyright (c) 2024 Meeting Assistant Contributors
 *
 * This work is licensed under the Creative Commons Attribution-NonCommercial 4.0 International License.
 * To view a copy of this license, visit http://creativecommons.org/licenses/by-nc/4.0/
 *
 * You are free to share and adapt this work for non-commercial purposes with attribution.
 * Commercial use is prohibited without explicit written permission.
 *
 * For commercial licensing inquiries, please contact the project maintainers.
 */

//! Typed error taxonomy shared by every component of the orchestration core.
//!
//! Components never recover an error kind they don't understand; they either map it to a
//! caller-visible response or let it propagate. See SPEC_FULL.md section 7.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("transient backing store error: {0}")]
    TransientStore(String),

    #[error("external service unavailable: {service}: {reason}")]
    ServiceUnavailable { service: &'static str, reason: String },

    #[error("timeout waiting on {0}")]
    Timeout(String),

    #[error("codec failure: {0}")]
    CodecFailure(String),

    #[error("operation cancelled")]
    Cancelled,
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Whether the caller should consider retrying the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::TransientStore(_) | CoreError::ServiceUnavailable { .. } | CoreError::Timeout(_)
        )
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CoreError::Timeout(err.to_string())
        } else {
            CoreError::ServiceUnavailable {
                service: "http",
                reason: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::InvalidInput(format!("malformed JSON: {err}"))
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::CodecFailure(err.to_string())
    }
}

impl From<hound::Error> for CoreError {
    fn from(err: hound::Error) -> Self {
        CoreError::CodecFailure(err.to_string())
    }
}
