use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use time::OffsetDateTime;
use uuid::Uuid;

/// An email-verification code waiting to be confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOtp {
    pub code: String,
    pub expires_at: OffsetDateTime,
}

/// A password-reset token issued by forgot-password and not yet consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordReset {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

/// User record in the database.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String, // Argon2 hash, never exposed to clients
    pub email_verified: bool,
    pub otp: Option<PendingOtp>,
    pub reset: Option<PasswordReset>,
    pub created_at: OffsetDateTime,
}

// The code/expiry column pairs are only meaningful together; a half-present
// pair reads back as no active OTP / no active reset.
impl<'r> FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let otp = match (
            row.try_get::<Option<String>, _>("otp_code")?,
            row.try_get::<Option<OffsetDateTime>, _>("otp_expires_at")?,
        ) {
            (Some(code), Some(expires_at)) => Some(PendingOtp { code, expires_at }),
            _ => None,
        };
        let reset = match (
            row.try_get::<Option<String>, _>("reset_token")?,
            row.try_get::<Option<OffsetDateTime>, _>("reset_token_expires_at")?,
        ) {
            (Some(token), Some(expires_at)) => Some(PasswordReset { token, expires_at }),
            _ => None,
        };
        Ok(User {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            email_verified: row.try_get("email_verified")?,
            otp,
            reset,
            created_at: row.try_get("created_at")?,
        })
    }
}
