use std::sync::Arc;

use anyhow::Result;
use chrono::{Days, NaiveDate, Utc};
use echo_auth::AuthenticationService;
use echo_core::models::{NewClient, NewUser, Provisioned, Provisioning};
use echo_core::store::Conflict;
use echo_core::validation;
use echo_core::{
    ConfigSnapshot, Directory, EchoError, ErrorKind, FieldErrors, SchemaName, TenantContext, User,
};

use super::accounts_schema::RegisterRequest;

pub const INVALID_REGISTRATION: &str = "Invalid registration data";
pub const PASSWORDS_DO_NOT_MATCH: &str = "Passwords do not match.";

/// Registration with tenant provisioning, and login.
pub struct AccountsService {
    directory: Arc<dyn Directory>,
    auth: Arc<AuthenticationService>,
    base_domain: String,
    trial_days: u64,
}

impl AccountsService {
    pub fn new(
        directory: Arc<dyn Directory>,
        auth: Arc<AuthenticationService>,
        config: &ConfigSnapshot,
    ) -> Self {
        Self {
            directory,
            auth,
            base_domain: config
                .get("tenants.base_domain")
                .unwrap_or("localhost")
                .trim_matches('.')
                .to_ascii_lowercase(),
            trial_days: config
                .get_i64("tenants.trial_days")
                .and_then(|d| u64::try_from(d).ok())
                .unwrap_or(365),
        }
    }

    pub fn base_domain(&self) -> &str {
        &self.base_domain
    }

    /// Primary hostname of the tenant created for `schema`.
    pub fn domain_for(&self, schema: &SchemaName) -> String {
        format!("{}.{}", schema, self.base_domain)
    }

    pub fn trial_end(&self) -> Result<NaiveDate> {
        Utc::now()
            .date_naive()
            .checked_add_days(Days::new(self.trial_days))
            .ok_or_else(|| EchoError::general_error("tenants.trial_days is out of range").into_anyhow())
    }

    fn check_fields(&self, request: &RegisterRequest) -> Result<SchemaName> {
        validation::require_present(
            &[
                ("username", Some(request.username.as_str())),
                ("email", Some(request.email.as_str())),
                ("password", Some(request.password.as_str())),
            ],
            INVALID_REGISTRATION,
        )?;
        validation::validate(request, INVALID_REGISTRATION)?;

        let schema = SchemaName::for_username(request.username.trim()).map_err(|e| {
            let mut errors = FieldErrors::default();
            errors.push("username", e.to_string());
            errors.into_bad_request(INVALID_REGISTRATION)
        })?;

        if let Some(confirm) = &request.confirm_password {
            if *confirm != request.password {
                return Err(EchoError::bad_request(PASSWORDS_DO_NOT_MATCH)
                    .with_field_error("confirm_password", PASSWORDS_DO_NOT_MATCH)
                    .into_anyhow());
            }
        }
        Ok(schema)
    }

    /// Create user, tenant, partition and primary domain.
    ///
    /// Only allowed on the public tenant. Duplicates are reported per field
    /// and leave nothing behind.
    pub async fn register(&self, tenant: &TenantContext, request: RegisterRequest) -> Result<Provisioned> {
        tenant.require_public("Registration must be done on the public schema.")?;

        let schema = self.check_fields(&request)?;
        let username = request.username.trim().to_string();
        let email = request.email.trim().to_string();

        if self.directory.find_user(&username).await?.is_some() {
            return Err(Conflict::Username.into_anyhow());
        }
        if self.directory.find_user_by_email(&email).await?.is_some() {
            return Err(Conflict::Email.into_anyhow());
        }

        let password_hash = self.auth.hash_password(&request.password)?;
        let domain = self.domain_for(&schema);
        let provisioning = Provisioning {
            user: NewUser {
                username: username.clone(),
                email,
                password_hash,
            },
            client: NewClient {
                schema_name: schema,
                name: username.clone(),
                paid_until: self.trial_end()?,
                on_trial: true,
            },
            domain,
        };

        match self.directory.provision(provisioning).await {
            Ok(out) => {
                tracing::info!(
                    username = %out.user.username,
                    schema = %out.client.schema_name,
                    domain = %out.domain.domain,
                    "tenant provisioned"
                );
                Ok(out)
            }
            Err(err) => {
                if EchoError::kind_of(&err) != Some(ErrorKind::BadRequest) {
                    tracing::error!(username = %username, error = %err, "tenant provisioning failed");
                }
                Err(err)
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        self.auth.login(username.trim(), password).await
    }
}
