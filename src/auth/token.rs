//! Signed session tokens and the cookie that carries them.
//!
//! Tokens are HS256 JWTs with a fixed 24-hour validity window. They are not
//! persisted server-side; the signature is the only thing trusted. Delivery
//! is a `token` cookie with `HttpOnly`, `SameSite=Strict`, `Path=/`, and
//! `Secure` in production.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Session lifetime.
pub const SESSION_TTL_HOURS: i64 = 24;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "token";

/// Claims carried by a session token.
///
/// `sub` is the user id; absent for the static admin identity, which is not
/// a stored entity. `role` is present only for authenticated sessions —
/// registration grants no role.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    fn stamped(sub: Option<String>, role: Option<String>) -> Self {
        let now = Utc::now();
        let exp = now + Duration::hours(SESSION_TTL_HOURS);
        Self {
            sub,
            role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        }
    }

    /// Claims for a freshly registered user: id only, no role.
    pub fn for_user(user_id: &str) -> Self {
        Self::stamped(Some(user_id.to_owned()), None)
    }

    /// Claims for a logged-in user: id plus role.
    pub fn for_session(user_id: &str, role: &str) -> Self {
        Self::stamped(Some(user_id.to_owned()), Some(role.to_owned()))
    }

    /// Claims for the config-held admin identity: role only, no id.
    pub fn for_admin() -> Self {
        Self::stamped(None, Some("admin".to_owned()))
    }
}

/// Sign claims into an opaque token string.
pub fn issue(secret: &[u8], claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
    encode(&Header::default(), claims, &EncodingKey::from_secret(secret))
}

/// Verify signature and expiry, returning the decoded claims.
pub fn verify(secret: &[u8], token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &Validation::default())?;
    Ok(data.claims)
}

/// `Set-Cookie` value attaching a session token.
pub fn session_cookie(token: &str, production: bool) -> String {
    let max_age = SESSION_TTL_HOURS * 3600;
    let mut cookie =
        format!("{SESSION_COOKIE}={token}; Max-Age={max_age}; Path=/; HttpOnly; SameSite=Strict");
    if production {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value removing the session cookie.
///
/// Browsers only delete a cookie when the clearing attributes match the ones
/// used at issuance, so this mirrors [`session_cookie`] with `Max-Age=0`.
pub fn clear_cookie(production: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}=; Max-Age=0; Path=/; HttpOnly; SameSite=Strict");
    if production {
        cookie.push_str("; Secure");
    }
    cookie
}
