// Operator tokens are issued elsewhere; this service only verifies them.
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorMessage, HttpError};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default)]
    pub role: String,
    pub exp: usize,
    #[serde(default)]
    pub iat: usize,
}

pub fn decode_token<T: Into<String>>(token: T, secret: &[u8]) -> Result<TokenClaims, HttpError> {
    let decoded = decode::<TokenClaims>(
        &token.into(),
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    );

    match decoded {
        Ok(token) => Ok(token.claims),
        Err(_) => Err(HttpError::unauthorized(ErrorMessage::InvalidToken.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn sign(claims: &TokenClaims, secret: &[u8]) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn claims(exp_offset: i64) -> TokenClaims {
        let now = chrono::Utc::now().timestamp();
        TokenClaims {
            sub: "operator-1".to_string(),
            role: "admin".to_string(),
            exp: (now + exp_offset) as usize,
            iat: now as usize,
        }
    }

    #[test]
    fn decodes_a_valid_token() {
        let token = sign(&claims(600), b"secret");
        let decoded = decode_token(token, b"secret").unwrap();
        assert_eq!(decoded.sub, "operator-1");
        assert_eq!(decoded.role, "admin");
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        let token = sign(&claims(600), b"secret");
        assert!(decode_token(token, b"other").is_err());

        let expired = sign(&claims(-3600), b"secret");
        let err = decode_token(expired, b"secret").unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::UNAUTHORIZED);
    }
}
