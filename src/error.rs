//! Error types and provider error normalization.
//!
//! The orchestrator never lets a provider error object cross its boundary.
//! Every provider failure is reduced to an [`AuthError`] carrying one of the
//! stable messages below, so callers never depend on provider vocabulary.

use thiserror::Error;

/// Fallback message for failure codes this crate does not recognize.
pub const FALLBACK_MESSAGE: &str = "Something went wrong. Please try again.";

/// Error types for identity provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider rejected the request with a documented failure code.
    #[error("provider rejected request: {code}")]
    Api { code: String },

    /// Transport-level failure reaching the provider.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider responded with a payload this client cannot interpret.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn api(code: impl Into<String>) -> Self {
        Self::Api { code: code.into() }
    }
}

/// Normalized, application-facing authentication failure.
///
/// Carries exactly the stable message produced by [`normalize_error_code`]
/// (or [`FALLBACK_MESSAGE`]); the provider's own error object is logged and
/// dropped at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AuthError {
    pub message: &'static str,
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        let message = match &err {
            ProviderError::Api { code } => normalize_error_code(code),
            ProviderError::Http(_) | ProviderError::Malformed(_) => FALLBACK_MESSAGE,
        };
        tracing::debug!(error = %err, message, "normalized provider failure");
        Self { message }
    }
}

/// Maps a provider failure code to a stable caller-facing message.
///
/// Total over all inputs: recognized codes map to fixed messages, everything
/// else maps to [`FALLBACK_MESSAGE`]. This table is the single point of
/// change when the provider's code set evolves.
pub fn normalize_error_code(code: &str) -> &'static str {
    match code {
        "EMAIL_EXISTS" => "An account already exists for that email.",
        "EMAIL_NOT_FOUND" | "INVALID_LOGIN_CREDENTIALS" => {
            "No account was found for those credentials."
        }
        "INVALID_PASSWORD" => "The password is incorrect.",
        "USER_DISABLED" => "This account has been disabled.",
        "WEAK_PASSWORD" => "The password is too weak. Choose a longer one.",
        "OPERATION_NOT_ALLOWED" => "This sign-in method is not enabled.",
        "TOO_MANY_ATTEMPTS_TRY_LATER" | "QUOTA_EXCEEDED" => {
            "Too many attempts. Please wait and try again."
        }
        "INVALID_PHONE_NUMBER" | "MISSING_PHONE_NUMBER" => {
            "The phone number is not valid."
        }
        "INVALID_CODE" | "MISSING_CODE" => "The verification code is not valid.",
        "SESSION_EXPIRED" | "INVALID_SESSION_INFO" => {
            "The verification session expired. Request a new code."
        }
        _ => FALLBACK_MESSAGE,
    }
}
