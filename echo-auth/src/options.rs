// Authentication options and configuration.

use std::time::Duration;

use echo_core::{ConfigSnapshot, EchoError};
use serde::{Deserialize, Serialize};

const DEV_SECRET: &str = "dev-secret";
const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

/// HMAC signing algorithms.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum JwtAlgorithm {
    #[default]
    HS256,
    HS384,
    HS512,
}

impl JwtAlgorithm {
    pub(crate) fn to_jsonwebtoken(self) -> jsonwebtoken::Algorithm {
        match self {
            JwtAlgorithm::HS256 => jsonwebtoken::Algorithm::HS256,
            JwtAlgorithm::HS384 => jsonwebtoken::Algorithm::HS384,
            JwtAlgorithm::HS512 => jsonwebtoken::Algorithm::HS512,
        }
    }
}

/// JWT-specific configuration options
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct JwtOptions {
    pub algorithm: JwtAlgorithm,
    /// `iss` claim
    pub issuer: String,
    /// `aud` claim
    pub audience: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub access_token_expires_in: Duration,
    #[serde(with = "humantime_serde")]
    pub refresh_token_expires_in: Duration,
    pub secret: String,
}

impl Default for JwtOptions {
    fn default() -> Self {
        Self {
            algorithm: JwtAlgorithm::default(),
            issuer: "echoblogs".to_string(),
            audience: vec!["echoblogs-api".to_string()],
            access_token_expires_in: Duration::from_secs(5 * 60),
            refresh_token_expires_in: Duration::from_secs(24 * 60 * 60),
            secret: DEV_SECRET.to_string(),
        }
    }
}

impl JwtOptions {
    pub fn validate(&self) -> Result<(), String> {
        if self.issuer.is_empty() {
            return Err("JWT issuer cannot be empty".to_string());
        }
        if self.audience.is_empty() {
            return Err("JWT audience cannot be empty".to_string());
        }
        if self.secret.is_empty() {
            return Err("HMAC algorithms require a secret".to_string());
        }
        if self.access_token_expires_in.is_zero() || self.refresh_token_expires_in.is_zero() {
            return Err("Token lifetimes must be positive".to_string());
        }
        Ok(())
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.secret == DEV_SECRET
    }
}

/// Username/password strategy options.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalOptions {
    pub bcrypt_cost: u32,
    /// The one message every failed login gets.
    pub error_message: String,
}

impl Default for LocalOptions {
    fn default() -> Self {
        Self {
            bcrypt_cost: bcrypt::DEFAULT_COST,
            error_message: "Invalid credentials".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthOptions {
    pub jwt: JwtOptions,
    pub local: LocalOptions,
}

impl AuthOptions {
    /// Read `auth.*` keys, falling back to defaults for anything unset.
    pub fn from_config(config: &ConfigSnapshot) -> anyhow::Result<Self> {
        let mut options = Self::default();
        let jwt = &mut options.jwt;

        if let Some(secret) = config.get_string("auth.jwt.secret") {
            jwt.secret = secret;
        }
        if let Some(issuer) = config.get_string("auth.jwt.issuer") {
            jwt.issuer = issuer;
        }
        if let Some(audience) = config.get("auth.jwt.audience") {
            jwt.audience = audience
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(ttl) = config.get_duration("auth.jwt.access_ttl")? {
            jwt.access_token_expires_in = ttl;
        }
        if let Some(ttl) = config.get_duration("auth.jwt.refresh_ttl")? {
            jwt.refresh_token_expires_in = ttl;
        }
        if let Some(cost) = config.get_u32("auth.bcrypt_cost") {
            options.local.bcrypt_cost = cost;
        }

        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.jwt
            .validate()
            .map_err(|e| EchoError::general_error(format!("JWT validation failed: {e}")).into_anyhow())?;
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.local.bcrypt_cost) {
            return Err(EchoError::general_error(format!(
                "bcrypt cost must be between {} and {}",
                MIN_BCRYPT_COST,
                MAX_BCRYPT_COST
            ))
            .into_anyhow());
        }
        Ok(())
    }
}
