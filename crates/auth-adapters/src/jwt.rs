//! HS256 JWT implementation of `TokenIssuer`.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use domains::models::{Principal, Role};
use domains::ports::{TokenClaims, TokenIssuer};
use domains::TokenError;

/// Token payload: the principal id plus the roles held at issuance.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    roles: Vec<Role>,
    iat: i64,
    exp: i64,
}

pub struct JwtIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl JwtIssuer {
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        let raw = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(raw),
            decoding_key: DecodingKey::from_secret(raw),
            ttl,
        }
    }
}

impl TokenIssuer for JwtIssuer {
    fn issue(&self, principal: &Principal) -> anyhow::Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: principal.id.to_string(),
            roles: principal.roles.iter().copied().collect(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("failed to sign token: {e}"))
    }

    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default()).map_err(
            |e| {
                tracing::debug!(error = %e, "bearer token rejected");
                match e.kind() {
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Invalid,
                }
            },
        )?;
        let user_id = data.claims.sub.parse().map_err(|_| TokenError::Invalid)?;
        Ok(TokenClaims {
            user_id,
            roles: data.claims.roles,
        })
    }
}
