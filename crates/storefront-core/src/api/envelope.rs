//! The uniform response wrapper every backend endpoint returns.
//!
//! The backend can answer HTTP 200 with `isSuccess: false`, so callers
//! must go through `into_result` rather than trusting the status code.

use serde::{Deserialize, Serialize};

#[cfg(feature = "ts")]
use ts_rs::TS;

use super::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct Envelope<T> {
    pub value: Option<T>,
    #[serde(default)]
    pub is_success: bool,
    #[serde(default)]
    pub is_failure: bool,
    pub error: Option<EnvelopeError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct EnvelopeError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl<T> Envelope<T> {
    pub fn success(value: T) -> Self {
        Self {
            value: Some(value),
            is_success: true,
            is_failure: false,
            error: None,
        }
    }

    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            value: None,
            is_success: false,
            is_failure: true,
            error: Some(EnvelopeError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }

    /// Unwrap the value of a successful envelope
    pub fn into_result(self) -> Result<T, ApiError> {
        if !self.is_success {
            let error = self.error.unwrap_or_default();
            return Err(ApiError::Rejected {
                code: error.code,
                message: error.message,
            });
        }
        self.value
            .ok_or_else(|| ApiError::InvalidResponse("successful envelope without a value".to_string()))
    }
}
