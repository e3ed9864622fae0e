// Access/refresh token pair.

use chrono::Utc;
use echo_core::{EchoError, Principal};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::options::JwtOptions;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// user id
    pub sub: String,
    pub username: String,
    pub token_type: TokenType,
    pub iss: String,
    pub aud: Vec<String>,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl Claims {
    pub fn principal(&self) -> Result<Principal, TokenError> {
        let user_id = Uuid::parse_str(&self.sub).map_err(|_| TokenError::MalformedSubject)?;
        Ok(Principal {
            user_id,
            username: self.username.clone(),
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token is invalid or expired")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("Token has wrong type")]
    WrongType { expected: TokenType, found: TokenType },
    #[error("Token subject is not a user id")]
    MalformedSubject,
}

impl From<TokenError> for EchoError {
    fn from(err: TokenError) -> Self {
        EchoError::not_authenticated(err.to_string()).with_source(err.into())
    }
}

/// Signs and verifies tokens with one HMAC secret.
pub struct TokenService {
    options: JwtOptions,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenService {
    pub fn new(options: JwtOptions) -> Self {
        let encoding = EncodingKey::from_secret(options.secret.as_bytes());
        let decoding = DecodingKey::from_secret(options.secret.as_bytes());
        Self {
            options,
            encoding,
            decoding,
        }
    }

    pub fn options(&self) -> &JwtOptions {
        &self.options
    }

    pub fn issue_pair(&self, principal: &Principal) -> anyhow::Result<TokenPair> {
        Ok(TokenPair {
            access: self.issue(principal, TokenType::Access)?,
            refresh: self.issue(principal, TokenType::Refresh)?,
        })
    }

    pub fn issue(&self, principal: &Principal, token_type: TokenType) -> anyhow::Result<String> {
        self.issue_at(principal, token_type, Utc::now().timestamp())
    }

    pub(crate) fn issue_at(
        &self,
        principal: &Principal,
        token_type: TokenType,
        issued_at: i64,
    ) -> anyhow::Result<String> {
        let ttl = match token_type {
            TokenType::Access => self.options.access_token_expires_in,
            TokenType::Refresh => self.options.refresh_token_expires_in,
        };
        let claims = Claims {
            sub: principal.user_id.to_string(),
            username: principal.username.clone(),
            token_type,
            iss: self.options.issuer.clone(),
            aud: self.options.audience.clone(),
            iat: issued_at,
            exp: issued_at + ttl.as_secs() as i64,
            jti: Uuid::new_v4().to_string(),
        };

        let mut header = Header::new(self.options.algorithm.to_jsonwebtoken());
        header.typ = Some("JWT".to_string());

        encode(&header, &claims, &self.encoding).map_err(|e| {
            EchoError::general_error(format!("Could not sign {} token", token_type.as_str()))
                .with_source(e.into())
                .into_anyhow()
        })
    }

    /// Decode `token`, checking signature, expiry, issuer, audience and type.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(self.options.algorithm.to_jsonwebtoken());
        validation.leeway = 0;
        validation.set_issuer(&[self.options.issuer.as_str()]);
        validation.set_audience(&self.options.audience);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let claims = decode::<Claims>(token, &self.decoding, &validation)?.claims;
        if claims.token_type != expected {
            return Err(TokenError::WrongType {
                expected,
                found: claims.token_type,
            });
        }
        Ok(claims)
    }

    /// Mint a fresh access token from a refresh token.
    pub fn refresh(&self, refresh_token: &str) -> anyhow::Result<String> {
        let claims = self
            .verify(refresh_token, TokenType::Refresh)
            .map_err(|e| EchoError::from(e).into_anyhow())?;
        let principal = claims
            .principal()
            .map_err(|e| EchoError::from(e).into_anyhow())?;
        self.issue(&principal, TokenType::Access)
    }
}

/// Token from an `Authorization` header value using the `Bearer` or `JWT`
/// scheme.
pub fn extract_bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    let token = token.trim();
    let known = ["Bearer", "JWT"]
        .iter()
        .any(|s| s.eq_ignore_ascii_case(scheme.trim()));
    (known && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(JwtOptions {
            secret: "test-secret".into(),
            ..JwtOptions::default()
        })
    }

    fn alice() -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            username: "alice".into(),
        }
    }

    #[test]
    fn pair_round_trips_with_types() {
        let tokens = service();
        let alice = alice();
        let pair = tokens.issue_pair(&alice).unwrap();

        let access = tokens.verify(&pair.access, TokenType::Access).unwrap();
        assert_eq!(access.principal().unwrap(), alice);
        assert_eq!(access.iss, "echoblogs");

        assert!(matches!(
            tokens.verify(&pair.access, TokenType::Refresh),
            Err(TokenError::WrongType { .. })
        ));
        assert!(tokens.verify(&pair.refresh, TokenType::Refresh).is_ok());
    }

    #[test]
    fn refresh_mints_access_and_rejects_access_tokens() {
        let tokens = service();
        let pair = tokens.issue_pair(&alice()).unwrap();

        let access = tokens.refresh(&pair.refresh).unwrap();
        assert!(tokens.verify(&access, TokenType::Access).is_ok());

        let err = tokens.refresh(&pair.access).unwrap_err();
        assert_eq!(
            EchoError::kind_of(&err),
            Some(echo_core::ErrorKind::NotAuthenticated)
        );
    }

    #[test]
    fn expired_and_foreign_tokens_are_rejected() {
        let tokens = service();
        let stale = tokens
            .issue_at(&alice(), TokenType::Access, Utc::now().timestamp() - 3600)
            .unwrap();
        assert!(matches!(
            tokens.verify(&stale, TokenType::Access),
            Err(TokenError::Invalid(_))
        ));

        let other = TokenService::new(JwtOptions {
            secret: "someone-else".into(),
            ..JwtOptions::default()
        });
        let foreign = other.issue(&alice(), TokenType::Access).unwrap();
        assert!(tokens.verify(&foreign, TokenType::Access).is_err());
    }

    #[test]
    fn bearer_header_parsing() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("jwt  abc "), Some("abc"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("abc"), None);
    }
}
