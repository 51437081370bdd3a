use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Workflow outcomes that reach the client as `{"success": false, "message"}`.
///
/// The Display string of each variant is the exact wire message.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("User already exists")]
    UserAlreadyExists,
    #[error("User not found")]
    UserNotFound,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Email not verified. Please verify your email first.")]
    EmailNotVerified,
    #[error("Invalid or expired OTP")]
    InvalidOtp,
    #[error("Current password is incorrect")]
    CurrentPasswordIncorrect,
    #[error("Invalid or expired reset token")]
    InvalidResetToken,
    #[error("Invalid email")]
    InvalidEmail,
    #[error("Password too short")]
    PasswordTooShort,
    #[error("Server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            // Cause stays server-side, the client only sees the generic message.
            AuthError::Internal(err) => {
                error!(error = %err, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        };
        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_failures_map_to_400() {
        for err in [
            AuthError::UserAlreadyExists,
            AuthError::UserNotFound,
            AuthError::InvalidCredentials,
            AuthError::EmailNotVerified,
            AuthError::InvalidOtp,
            AuthError::CurrentPasswordIncorrect,
            AuthError::InvalidResetToken,
        ] {
            assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn internal_maps_to_500_with_generic_message() {
        let err = AuthError::Internal(anyhow::anyhow!("pool timed out"));
        assert_eq!(err.to_string(), "Server error");
        let response = AuthError::Internal(anyhow::anyhow!("pool timed out")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn body_carries_success_false_and_message() {
        let response = AuthError::InvalidOtp.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .expect("read body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Invalid or expired OTP");
    }
}
