// Local (username/password) and bearer strategies.

use std::sync::Arc;

use anyhow::Result;
use echo_core::{Directory, EchoError, Principal, User};
use uuid::Uuid;

use crate::jwt::{extract_bearer_token, TokenPair, TokenService, TokenType};
use crate::options::{AuthOptions, LocalOptions};
use crate::password::PasswordHasher;

pub struct LocalStrategy {
    directory: Arc<dyn Directory>,
    hasher: Arc<PasswordHasher>,
    options: LocalOptions,
}

impl LocalStrategy {
    pub fn new(directory: Arc<dyn Directory>, hasher: Arc<PasswordHasher>, options: LocalOptions) -> Self {
        Self {
            directory,
            hasher,
            options,
        }
    }

    fn invalid(&self) -> anyhow::Error {
        EchoError::bad_request(self.options.error_message.clone()).into_anyhow()
    }

    /// Unknown user, wrong password and inactive account fail the same way.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(self.invalid());
        }

        let Some(user) = self.directory.find_user(username).await? else {
            self.hasher.verify_dummy(password);
            return Err(self.invalid());
        };

        if !self.hasher.verify(password, &user.password_hash) || !user.is_active {
            return Err(self.invalid());
        }
        Ok(user)
    }
}

pub struct BearerStrategy {
    directory: Arc<dyn Directory>,
    tokens: Arc<TokenService>,
}

impl BearerStrategy {
    pub fn new(directory: Arc<dyn Directory>, tokens: Arc<TokenService>) -> Self {
        Self { directory, tokens }
    }

    /// Verify an access token and check its user still exists.
    pub async fn authenticate(&self, token: &str) -> Result<Principal> {
        let claims = self
            .tokens
            .verify(token, TokenType::Access)
            .map_err(|e| EchoError::from(e).into_anyhow())?;
        let principal = claims
            .principal()
            .map_err(|e| EchoError::from(e).into_anyhow())?;

        match self.directory.get_user(principal.user_id).await? {
            Some(user) if user.is_active => Ok(Principal::from(&user)),
            _ => Err(EchoError::not_authenticated("User not found").into_anyhow()),
        }
    }
}

/// Everything the HTTP layer needs to authenticate callers.
pub struct AuthenticationService {
    directory: Arc<dyn Directory>,
    hasher: Arc<PasswordHasher>,
    tokens: Arc<TokenService>,
    local: LocalStrategy,
    bearer: BearerStrategy,
}

impl AuthenticationService {
    pub fn new(options: AuthOptions, directory: Arc<dyn Directory>) -> Self {
        if options.jwt.uses_dev_secret() {
            tracing::warn!("auth.jwt.secret is the development default; set a real secret");
        }
        let hasher = Arc::new(PasswordHasher::new(options.local.bcrypt_cost));
        let tokens = Arc::new(TokenService::new(options.jwt));
        Self {
            local: LocalStrategy::new(directory.clone(), hasher.clone(), options.local),
            bearer: BearerStrategy::new(directory.clone(), tokens.clone()),
            directory,
            hasher,
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn hash_password(&self, password: &str) -> Result<String> {
        self.hasher.hash(password)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let user = self.local.authenticate(username, password).await?;
        tracing::info!(username = %user.username, "login succeeded");
        Ok(user)
    }

    pub fn issue_tokens(&self, user: &User) -> Result<TokenPair> {
        self.tokens.issue_pair(&Principal::from(user))
    }

    pub fn refresh(&self, refresh_token: &str) -> Result<String> {
        self.tokens.refresh(refresh_token)
    }

    /// `Ok(None)` when the header does not carry a bearer token.
    pub async fn authenticate_header(&self, header_value: &str) -> Result<Option<Principal>> {
        match extract_bearer_token(header_value) {
            Some(token) => self.bearer.authenticate(token).await.map(Some),
            None => Ok(None),
        }
    }

    /// Principal for a user id remembered in a session.
    pub async fn principal_for(&self, user_id: Uuid) -> Result<Option<Principal>> {
        Ok(self
            .directory
            .get_user(user_id)
            .await?
            .filter(|u| u.is_active)
            .map(|u| Principal::from(&u)))
    }
}
