//! Authentication: registration validation, password hashing, and JWT
//! session tokens.
//!
//! - Registration validates email/password/name and stores a salted hash
//! - Login verifies credentials and returns a JWT
//! - Login failures are one generic message; unknown email and wrong
//!   password are indistinguishable, with a dummy hash to level timing

mod password;

pub use password::{dummy_verify, hash_password, verify_password};

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

/// Minimum password length. Registration with 5 characters fails, 6
/// succeeds.
pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_NAME_LEN: usize = 2;

/// The authenticated identity a verified token resolves to. Inserted as a
/// request extension by the auth middleware and passed explicitly into
/// every task operation.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    /// Subject: user id.
    sub: String,
    /// Email (for display/auditing).
    #[serde(default)]
    eml: String,
    /// Issued-at unix seconds.
    iat: i64,
    /// Expiration unix seconds.
    exp: i64,
}

/// Validate registration input. Returns the offending-field message on
/// failure.
pub fn validate_registration(email: &str, password: &str, name: &str) -> Result<(), String> {
    if !email_is_well_formed(email) {
        return Err("invalid email address".to_string());
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    if name.trim().chars().count() < MIN_NAME_LEN {
        return Err(format!("name must be at least {} characters", MIN_NAME_LEN));
    }
    Ok(())
}

fn email_is_well_formed(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || email.contains(char::is_whitespace) {
        return false;
    }
    // Domain needs at least one dot with labels on both sides.
    domain
        .split_once('.')
        .map(|(head, tail)| !head.is_empty() && !tail.is_empty())
        .unwrap_or(false)
}

/// Issue a session token for `user`. Returns the token and its expiry
/// (unix seconds).
pub fn issue_jwt(secret: &str, ttl_days: i64, user: &AuthUser) -> anyhow::Result<(String, i64)> {
    let now = Utc::now();
    let exp = now + Duration::days(ttl_days.max(1));
    let claims = Claims {
        sub: user.id.to_string(),
        eml: user.email.clone(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok((token, claims.exp))
}

/// Verify a session token and resolve the identity it carries.
pub fn verify_jwt(token: &str, secret: &str) -> anyhow::Result<AuthUser> {
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    let id = Uuid::parse_str(&token_data.claims.sub)?;
    Ok(AuthUser {
        id,
        email: token_data.claims.eml,
    })
}
