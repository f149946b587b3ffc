use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// Authenticated caller identity, inserted as a request extension.
#[derive(Debug, Clone)]
pub struct Identity(pub String);

/// Require a valid `Authorization: Bearer <jwt>` header on every request.
///
/// The token subject becomes the caller identity used for thread ownership
/// and rate limiting.
pub async fn require_identity(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let claims = verify_token(token, &state.config.auth_secret)?;

    req.extensions_mut().insert(Identity(claims.sub));
    Ok(next.run(req).await)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn make_token(sub: &str, secret: &str, exp_offset_secs: i64) -> String {
        let exp = (chrono::Utc::now().timestamp() + exp_offset_secs) as usize;
        let claims = Claims {
            sub: sub.to_string(),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_yields_subject() {
        let token = make_token("user-1", "secret", 3600);
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "user-1");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = make_token("user-1", "secret", 3600);
        assert!(verify_token(&token, "other").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = make_token("user-1", "secret", -3600);
        assert!(verify_token(&token, "secret").is_err());
    }
}
