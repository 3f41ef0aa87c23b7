/// Authentication endpoints: signup, OTP verification, login, password reset
use crate::{
    auth::{issue_token, AuthUser},
    context::AppContext,
    error::{ApiError, ApiResult},
    otp::{self, CodeError},
    users::{hash_password, verify_password, User, UserProfile},
};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/verify-otp", post(verify_otp))
        .route("/request-otp", post(request_otp))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: Option<String>,
    pub token: Option<String>,
    pub new_password: Option<String>,
}

/// Response when a code has been stored (and possibly emailed).
/// In development with email sending disabled, the code is echoed back.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeIssuedResponse {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_otp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_reset_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub ok: bool,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub ok: bool,
    pub user: UserProfile,
}

fn require_email(email: Option<String>) -> ApiResult<String> {
    let email = email.unwrap_or_default().trim().to_lowercase();
    if email.is_empty() {
        return Err(ApiError::Validation("Email required".to_string()));
    }
    Ok(email)
}

fn map_otp_error(err: CodeError) -> ApiError {
    match err {
        CodeError::NotRequested => ApiError::Validation("No OTP requested".to_string()),
        CodeError::Expired => ApiError::Validation("OTP expired".to_string()),
        CodeError::Mismatch => ApiError::Validation("Invalid OTP".to_string()),
    }
}

fn session(ctx: &AppContext, user: &User, include_user: bool) -> ApiResult<SessionResponse> {
    let token = issue_token(user, &ctx.config.auth.jwt_secret, ctx.config.auth.jwt_ttl_days)?;
    Ok(SessionResponse {
        ok: true,
        token,
        user: include_user.then(|| UserProfile::from(user)),
    })
}

/// Signup: stage the account and send a verification code
async fn signup(
    State(ctx): State<AppContext>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<Json<CodeIssuedResponse>> {
    let email = require_email(req.email)?;

    if ctx.users.find_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict("Email already in use".to_string()));
    }

    let password_hash = match req.password.as_deref() {
        Some(password) if !password.is_empty() => Some(hash_password(password)?),
        _ => None,
    };

    let challenge = otp::generate_otp();
    ctx.users
        .upsert_pending(
            &email,
            req.name.as_deref(),
            password_hash.as_deref(),
            &challenge.code,
            challenge.expires_at,
        )
        .await?;

    if let Err(e) = ctx
        .mailer
        .send_verification_code(&email, req.name.as_deref(), &challenge.code)
        .await
    {
        tracing::error!("Failed to send OTP email: {}", e);
    }

    Ok(Json(CodeIssuedResponse {
        ok: true,
        message: "OTP stored".to_string(),
        dev_otp: ctx.config.echo_dev_codes().then_some(challenge.code),
        dev_reset_token: None,
    }))
}

/// Issue a fresh login code to an existing user
async fn request_otp(
    State(ctx): State<AppContext>,
    Json(req): Json<EmailRequest>,
) -> ApiResult<Json<CodeIssuedResponse>> {
    let email = require_email(req.email)?;

    let user = ctx
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let challenge = otp::generate_otp();
    ctx.users
        .set_otp(&user.id, &challenge.code, challenge.expires_at)
        .await?;

    if let Err(e) = ctx
        .mailer
        .send_verification_code(&email, user.name.as_deref(), &challenge.code)
        .await
    {
        tracing::error!("Failed to send OTP email: {}", e);
    }

    Ok(Json(CodeIssuedResponse {
        ok: true,
        message: "OTP stored".to_string(),
        dev_otp: ctx.config.echo_dev_codes().then_some(challenge.code),
        dev_reset_token: None,
    }))
}

/// Verify a code: promotes a pending signup, or completes an OTP login
async fn verify_otp(
    State(ctx): State<AppContext>,
    Json(req): Json<VerifyOtpRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let email = require_email(req.email)?;
    let code = req
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::Validation("Email and code required".to_string()))?;

    // A pending signup takes precedence over an existing user's code
    if let Some(pending) = ctx.users.find_pending_by_email(&email).await? {
        otp::validate_code(
            Some(&pending.otp_code),
            Some(pending.otp_expires_at),
            &code,
        )
        .map_err(map_otp_error)?;

        let user = ctx.users.promote_pending(&pending).await?;
        tracing::info!("Signup verified for {}", user.email);
        return Ok(Json(session(&ctx, &user, true)?));
    }

    let user = ctx
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    otp::validate_code(user.otp_code.as_deref(), user.otp_expires_at, &code)
        .map_err(map_otp_error)?;

    ctx.users.consume_otp(&user.id).await?;

    Ok(Json(session(&ctx, &user, true)?))
}

/// Login with password, or fall back to the OTP flow when no password
/// is submitted. Configured admin credentials short-circuit both.
async fn login(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<axum::response::Response> {
    use axum::response::IntoResponse;

    let email = require_email(req.email)?;

    // Admin bootstrap: matching the configured credential pair logs in
    // directly, creating or upgrading the admin account as needed
    if let Some(admin) = &ctx.config.auth.admin {
        if email == admin.email && req.password.as_deref() == Some(admin.password.as_str()) {
            let user = ctx.users.ensure_admin(admin).await?;
            tracing::info!("Admin bootstrap login for {}", user.email);
            return Ok(Json(session(&ctx, &user, false)?).into_response());
        }
    }

    let user = ctx
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if let Some(password) = req.password.filter(|p| !p.is_empty()) {
        let stored_hash = user.password_hash.as_deref().ok_or_else(|| {
            ApiError::Validation("Password login not available for this account".to_string())
        })?;

        if !verify_password(&password, stored_hash)? {
            return Err(ApiError::Authentication("Invalid credentials".to_string()));
        }

        return Ok(Json(session(&ctx, &user, false)?).into_response());
    }

    // No password: issue an OTP instead
    let challenge = otp::generate_otp();
    ctx.users
        .set_otp(&user.id, &challenge.code, challenge.expires_at)
        .await?;

    if let Err(e) = ctx
        .mailer
        .send_verification_code(&email, user.name.as_deref(), &challenge.code)
        .await
    {
        tracing::error!("Failed to send OTP email: {}", e);
    }

    Ok(Json(CodeIssuedResponse {
        ok: true,
        message: "OTP stored".to_string(),
        dev_otp: ctx.config.echo_dev_codes().then_some(challenge.code),
        dev_reset_token: None,
    })
    .into_response())
}

/// Start a password reset: store a token and email it
async fn forgot_password(
    State(ctx): State<AppContext>,
    Json(req): Json<EmailRequest>,
) -> ApiResult<Json<CodeIssuedResponse>> {
    let email = require_email(req.email)?;

    let user = ctx
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let challenge = otp::generate_reset_token();
    ctx.users
        .set_reset_token(&user.id, &challenge.code, challenge.expires_at)
        .await?;

    if let Err(e) = ctx
        .mailer
        .send_password_reset(&email, user.name.as_deref(), &challenge.code)
        .await
    {
        tracing::error!("Failed to send password reset email: {}", e);
    }

    Ok(Json(CodeIssuedResponse {
        ok: true,
        message: "Reset code sent".to_string(),
        dev_otp: None,
        dev_reset_token: ctx.config.echo_dev_codes().then_some(challenge.code),
    }))
}

/// Complete a password reset with the emailed token
async fn reset_password(
    State(ctx): State<AppContext>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<CodeIssuedResponse>> {
    let email = require_email(req.email)?;
    let token = req
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Validation("Reset token required".to_string()))?;
    let new_password = req
        .new_password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::Validation("New password required".to_string()))?;

    let user = ctx
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    otp::validate_code(user.reset_token.as_deref(), user.reset_expires_at, &token).map_err(
        |err| match err {
            CodeError::NotRequested => ApiError::Validation("No reset requested".to_string()),
            CodeError::Expired => ApiError::Validation("Reset code expired".to_string()),
            CodeError::Mismatch => ApiError::Validation("Invalid reset code".to_string()),
        },
    )?;

    let password_hash = hash_password(&new_password)?;
    ctx.users.reset_password(&user.id, &password_hash).await?;

    tracing::info!("Password reset completed for {}", user.email);

    Ok(Json(CodeIssuedResponse {
        ok: true,
        message: "Password updated".to_string(),
        dev_otp: None,
        dev_reset_token: None,
    }))
}

/// Return the authenticated user's profile
async fn me(AuthUser { user }: AuthUser) -> ApiResult<Json<MeResponse>> {
    Ok(Json(MeResponse {
        ok: true,
        user: UserProfile::from(&user),
    }))
}
