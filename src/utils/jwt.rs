// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, services::users, state::AppState};

fn default_role() -> String {
    "user".to_string()
}

/// JWT Claims structure.
///
/// Tokens are issued by the external auth provider; this service only verifies them.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - the opaque user id.
    pub sub: String,
    /// User's role (e.g., 'user', 'admin').
    #[serde(default = "default_role")]
    pub role: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
    /// Display name, used to seed the local profile on first sight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

impl Claims {
    /// Claims for `sub` expiring `expiration_seconds` from now.
    pub fn new(sub: &str, role: &str, expiration_seconds: u64) -> Result<Self, AppError> {
        let expiration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AppError::InternalServerError(e.to_string()))?
            .as_secs() as usize
            + expiration_seconds as usize;

        Ok(Self {
            sub: sub.to_owned(),
            role: role.to_owned(),
            exp: expiration,
            name: None,
            email: None,
            picture: None,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// The verified caller, injected into request extensions by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
}

/// Signs a JWT for the given claims.
pub fn sign_jwt(claims: &Claims, secret: &str) -> Result<String, AppError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
///
/// Returns the `Claims` if valid, otherwise returns an `AppError`.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid or expired token".to_string()))?;

    if token_data.claims.sub.trim().is_empty() {
        return Err(AppError::AuthError("Invalid token subject".to_string()));
    }

    Ok(token_data.claims)
}

/// Axum Middleware: Authentication.
///
/// Validates the 'Authorization: Bearer <token>' header, makes sure the caller has a
/// local profile, and injects `Claims` and `AuthUser` into the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => return Err(AppError::AuthError("No token provided".to_string())),
    };

    let claims = verify_jwt(token, &state.config.jwt_secret)?;
    users::ensure_user(&state.pool, &claims).await?;

    req.extensions_mut().insert(AuthUser {
        id: claims.sub.clone(),
    });
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Axum Middleware: Admin Authorization.
///
/// Must be used AFTER `auth_middleware`. Checks if the injected `Claims` has 'admin' role.
/// If not, returns 403 Forbidden.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !claims.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(req).await)
}
