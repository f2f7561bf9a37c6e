use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::services::Requester;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Passenger,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,     // opaque user id from the identity provider
    pub role: Role,
    pub exp: i64,        // expiration timestamp
    pub iat: i64,        // issued at timestamp
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether the caller may act on resources owned by `user_id`
    pub fn may_act_for(&self, user_id: &str) -> bool {
        self.is_admin() || self.sub == user_id
    }

    pub fn requester(&self) -> Requester {
        Requester {
            user_id: self.sub.clone(),
            is_admin: self.is_admin(),
        }
    }
}

/// Issue a token the way the identity provider does. The service itself
/// only verifies tokens; this exists for tooling and tests.
pub fn create_token(
    user_id: &str,
    role: Role,
    secret: &str,
    expiration_hours: i64,
) -> AppResult<String> {
    let now = Utc::now();
    let exp = now + Duration::hours(expiration_hours);

    let claims = Claims {
        sub: user_id.to_string(),
        role,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
}

pub fn verify_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let token = create_token("U1", Role::Passenger, "secret", 1).unwrap();
        let claims = verify_token(&token, "secret").unwrap();

        assert_eq!(claims.sub, "U1");
        assert_eq!(claims.role, Role::Passenger);
        assert!(!claims.is_admin());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = create_token("U1", Role::Admin, "secret", 1).unwrap();
        assert!(matches!(
            verify_token(&token, "other"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_may_act_for() {
        let passenger = Claims { sub: "U1".into(), role: Role::Passenger, exp: 0, iat: 0 };
        let admin = Claims { sub: "A1".into(), role: Role::Admin, exp: 0, iat: 0 };

        assert!(passenger.may_act_for("U1"));
        assert!(!passenger.may_act_for("U2"));
        assert!(admin.may_act_for("U2"));
    }
}
