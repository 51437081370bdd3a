use anyhow::Context;
use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            ChangePasswordRequest, ForgotPasswordRequest, MessageResponse, PublicUser,
            ResetPasswordRequest, SessionResponse, SigninRequest, SignupRequest, SignupResponse,
            VerifyOtpRequest,
        },
        error::AuthError,
        otp,
        repo::is_unique_violation,
        repo_types::{PendingOtp, User},
        services::{hash_password, is_valid_email, verify_password, AuthUser, JwtKeys},
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/verify-otp", post(verify_otp))
        .route("/signin", post(signin))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/change-password", post(change_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> Result<Json<SignupResponse>, AuthError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AuthError::InvalidEmail);
    }

    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(AuthError::PasswordTooShort);
    }

    if User::find_by_email(&state.db, &payload.email)
        .await?
        .is_some()
    {
        warn!(email = %payload.email, "email already registered");
        return Err(AuthError::UserAlreadyExists);
    }

    let hash = hash_password(&payload.password)?;
    let pending = PendingOtp {
        code: otp::generate_code(),
        expires_at: OffsetDateTime::now_utc()
            + TimeDuration::minutes(state.config.otp_ttl_minutes),
    };

    let user = match User::create(&state.db, &payload.name, &payload.email, &hash, &pending).await
    {
        Ok(u) => u,
        // Lost the race against a concurrent signup: the unique index on
        // email decides, not the lookup above.
        Err(e) if is_unique_violation(&e) => {
            warn!(email = %payload.email, "duplicate email on insert");
            return Err(AuthError::UserAlreadyExists);
        }
        Err(e) => return Err(anyhow::Error::new(e).context("create user").into()),
    };

    // A failed send leaves the user row in place; the code simply never
    // arrives and signup must be retried.
    let html = format!(
        "<p>Your OTP for email verification is: <strong>{}</strong></p>",
        pending.code
    );
    state
        .mailer
        .send(&user.email, "Verify Your Email", &html)
        .await
        .context("send verification email")?;

    info!(user_id = %user.id, email = %user.email, "user signed up, otp sent");
    Ok(Json(SignupResponse {
        success: true,
        message: "OTP sent to your email".into(),
        user_id: user.id,
    }))
}

#[instrument(skip(state, payload))]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Json<SessionResponse>, AuthError> {
    let email = payload.email.trim().to_lowercase();

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    let now = OffsetDateTime::now_utc();
    let accepted = user
        .otp
        .as_ref()
        .is_some_and(|pending| pending.matches(&payload.otp, now));
    if !accepted {
        warn!(user_id = %user.id, "otp rejected");
        return Err(AuthError::InvalidOtp);
    }

    User::mark_verified(&state.db, user.id).await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_session(user.id, false)?;

    info!(user_id = %user.id, "email verified");
    Ok(Json(SessionResponse {
        success: true,
        message: "Email verified successfully".into(),
        token,
        user: PublicUser {
            id: user.id,
            name: user.name,
            email: user.email,
        },
    }))
}

#[instrument(skip(state, payload))]
pub async fn signin(
    State(state): State<AppState>,
    Json(mut payload): Json<SigninRequest>,
) -> Result<Json<SessionResponse>, AuthError> {
    payload.email = payload.email.trim().to_lowercase();

    // Unknown email and wrong password share one message so a caller cannot
    // probe which addresses have accounts.
    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "signin unknown email");
            AuthError::InvalidCredentials
        })?;

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "signin invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    if !user.email_verified {
        warn!(user_id = %user.id, "signin before email verification");
        return Err(AuthError::EmailNotVerified);
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_session(user.id, payload.remember_me)?;

    info!(user_id = %user.id, remember = payload.remember_me, "user signed in");
    Ok(Json(SessionResponse {
        success: true,
        message: "Login successful".into(),
        token,
        user: PublicUser {
            id: user.id,
            name: user.name,
            email: user.email,
        },
    }))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let email = payload.email.trim().to_lowercase();

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_reset(user.id)?;
    let expires_at =
        OffsetDateTime::now_utc() + TimeDuration::minutes(state.config.jwt.reset_ttl_minutes);
    User::set_reset_token(&state.db, user.id, &token, expires_at).await?;

    let reset_url = format!(
        "{}/reset-password?token={}",
        state.config.frontend_url.trim_end_matches('/'),
        token
    );
    let html = format!(
        "<p>You requested a password reset. Click the link below to reset your password:</p>\
         <a href=\"{reset_url}\">{reset_url}</a>\
         <p>This link will expire in 15 minutes.</p>"
    );
    state
        .mailer
        .send(&user.email, "Password Reset", &html)
        .await
        .context("send reset email")?;

    info!(user_id = %user.id, "password reset email sent");
    Ok(Json(MessageResponse {
        success: true,
        message: "Password reset email sent".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_reset(&payload.token)
        .map_err(|_| AuthError::InvalidResetToken)?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or(AuthError::InvalidResetToken)?;

    // The token must still be the one on record: consumption clears it, so a
    // replayed link fails here even though the signature is valid.
    let now = OffsetDateTime::now_utc();
    let accepted = user
        .reset
        .as_ref()
        .is_some_and(|reset| reset.token == payload.token && now < reset.expires_at);
    if !accepted {
        warn!(user_id = %user.id, "reset token rejected");
        return Err(AuthError::InvalidResetToken);
    }

    let hash = hash_password(&payload.new_password)?;
    User::consume_reset_token(&state.db, user.id, &hash).await?;

    info!(user_id = %user.id, "password reset");
    Ok(Json(MessageResponse {
        success: true,
        message: "Password reset successfully".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let user = User::find_by_id(&state.db, payload.user_id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    if !verify_password(&payload.current_password, &user.password_hash)? {
        warn!(user_id = %user.id, "change-password with wrong current password");
        return Err(AuthError::CurrentPasswordIncorrect);
    }

    let hash = hash_password(&payload.new_password)?;
    User::update_password(&state.db, user.id, &hash).await?;

    info!(user_id = %user.id, "password changed");
    Ok(Json(MessageResponse {
        success: true,
        message: "Password changed successfully".into(),
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AuthError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    Ok(Json(PublicUser {
        id: user.id,
        name: user.name,
        email: user.email,
    }))
}
