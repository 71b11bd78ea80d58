use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use potion::HtmlError;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::database::schema::User;
use crate::error::{ForbiddenError, UnauthenticatedError};
use crate::schema::{Id, UserRole};

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub username: String,
    pub user_role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Id, username: String, role: UserRole, ttl_hours: i64) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(ttl_hours)).timestamp();

        Self {
            user_id: id,
            username,
            user_role: role,
            iat,
            exp,
        }
    }
}

/// Caller identity resolved from a verified session token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: Id,
    pub username: String,
    pub user_role: UserRole,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), potion::Error> {
        if !action.authenticate(self) {
            return Err(
                ForbiddenError::new("You don't have permission to perform this action").into(),
            );
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        Self {
            user_id: value.user_id,
            username: value.username,
            user_role: value.user_role,
        }
    }
}

fn signing_key(secret: &[u8]) -> Result<Hmac<Sha256>, potion::Error> {
    Hmac::new_from_slice(secret)
        .map_err(|_| HtmlError::InternalServerError.new("Invalid session signing key"))
}

pub fn generate_jwt_session(
    user: &User,
    secret: &[u8],
    ttl_hours: i64,
) -> Result<String, potion::Error> {
    let key = signing_key(secret)?;
    let claims = JwtSessionData::new(
        user.id,
        user.username.to_owned(),
        user.role.to_owned(),
        ttl_hours,
    );

    claims.sign_with_key(&key).map_err(|e| {
        log::error!("Failed to sign session token: {e}");
        HtmlError::InternalServerError.new("Failed to sign session token")
    })
}

pub fn verify_jwt_session(token: &str, secret: &[u8]) -> Result<JwtSessionData, potion::Error> {
    let key = signing_key(secret)?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| UnauthenticatedError::new("Invalid session; Invalid token"))?;

    let now = Local::now().timestamp();
    if (session.exp - now).is_negative() {
        return Err(UnauthenticatedError::new("Invalid session; Token expired").into());
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            email: String::from("cook@example.com"),
            username: String::from("cook"),
            first_name: String::from("Ada"),
            last_name: String::from("Cook"),
            password: String::new(),
            role: UserRole::User,
        }
    }

    fn sign(ttl_hours: i64) -> String {
        generate_jwt_session(&user(), b"secret", ttl_hours)
            .unwrap_or_else(|e| panic!("failed to sign session: {}", e.code))
    }

    #[test]
    fn round_trips_session() {
        let token = sign(1);
        let session: SessionData = verify_jwt_session(&token, b"secret")
            .unwrap_or_else(|e| panic!("token rejected: {}", e.code))
            .into();
        assert_eq!(session.user_id, 7);
        assert_eq!(session.username, "cook");
        assert_eq!(session.user_role, UserRole::User);
    }

    #[test]
    fn rejects_foreign_signature() {
        let token = sign(1);
        assert!(verify_jwt_session(&token, b"another secret").is_err());
        assert!(verify_jwt_session("garbage", b"secret").is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let token = sign(-1);
        assert!(verify_jwt_session(&token, b"secret").is_err());
    }
}
