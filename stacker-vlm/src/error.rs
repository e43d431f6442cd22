//! VLM-layer error helpers
//!
//! Re-exports stacker-error and converts provider failures explicitly, so a
//! raw `ProviderError` never escapes as an opaque string.

pub use stacker_error::{Error, ErrorKind, ErrorStatus, Result};

use crate::provider::ProviderError;

/// Convert a transport-level failure into a stacker Error with the matching kind
pub fn provider_error(err: ProviderError) -> Error {
    let kind = match &err {
        ProviderError::Network(_) => ErrorKind::NetworkFailed,
        ProviderError::RateLimited { .. } => ErrorKind::RateLimited,
        ProviderError::AuthenticationFailed | ProviderError::ModelNotFound(_) => {
            ErrorKind::ProviderUnavailable
        }
        ProviderError::InvalidRequest(_) => ErrorKind::InvalidArgument,
        ProviderError::Api { status, .. } if *status >= 500 => ErrorKind::InferenceFailed,
        ProviderError::Api { .. } => ErrorKind::ProviderUnavailable,
        ProviderError::Parse(_) | ProviderError::EmptyResponse => ErrorKind::InferenceFailed,
    };

    let mut error = Error::new(kind, err.to_string()).with_operation("provider::complete");
    if let ProviderError::Api { status, .. } = &err {
        error = error.with_context("status", status.to_string());
    }
    if let ProviderError::RateLimited { retry_after: Some(secs) } = &err {
        error = error.with_context("retry_after", secs.to_string());
    }
    error
}
