use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::models::{AuthenticatedUser, Caller};
use crate::error::AppError;

/// Verifies bearer credentials issued by the external identity provider.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Return the user the token was issued to, or [`AppError::Auth`].
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AppError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    exp: i64,
}

/// HS256 JWT verifier sharing a secret with the identity provider.
pub struct JwtVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Sign a token for `user`, valid for `ttl`.
    ///
    /// Used by the `mint-token` command and by tests; production tokens come
    /// from the identity provider.
    pub fn issue(&self, user: &AuthenticatedUser, ttl: Duration) -> Result<String, AppError> {
        let claims = Claims {
            sub: user.user_id.clone(),
            email: user.email.clone(),
            exp: Utc::now()
                .checked_add_signed(ttl)
                .ok_or_else(|| AppError::BadRequest(format!("Token lifetime {ttl} is out of range")))?
                .timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
    }
}

#[async_trait]
impl CredentialVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| AppError::Auth(format!("Invalid token: {e}")))?;

        Ok(AuthenticatedUser {
            user_id: data.claims.sub,
            email: data.claims.email,
        })
    }
}

/// Token lifetime of `hours`, rejecting values that are not positive or that
/// do not fit a [`Duration`].
pub fn ttl_from_hours(hours: i64) -> Result<Duration, AppError> {
    Duration::try_hours(hours)
        .filter(|ttl| *ttl > Duration::zero())
        .ok_or_else(|| AppError::BadRequest(format!("Invalid token lifetime of {hours} hours")))
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(authorization: Option<&str>) -> Option<&str> {
    let value = authorization?.trim();
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Decide who is calling. A missing or invalid credential yields
/// [`Caller::Anonymous`]; endpoints that mutate reject that themselves.
pub async fn resolve_caller(
    verifier: &dyn CredentialVerifier,
    authorization: Option<&str>,
) -> Caller {
    let Some(token) = bearer_token(authorization) else {
        return Caller::Anonymous;
    };

    match verifier.verify(token).await {
        Ok(user) => Caller::Authenticated(user),
        Err(e) => {
            tracing::debug!("Treating caller as anonymous: {e}");
            Caller::Anonymous
        }
    }
}
