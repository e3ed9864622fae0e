use echo_core::EchoConfig;

/// `ECHOBLOGS__HTTP__PORT` sets `http.port`.
pub const ENV_PREFIX: &str = "ECHOBLOGS__";

/// Built-in defaults for every setting the application reads.
pub fn defaults() -> EchoConfig {
    let mut config = EchoConfig::new();

    // HTTP
    config.set("http.host", "127.0.0.1");
    config.set("http.port", "8000");

    config.set("database.url", "memory");

    // Tenants
    config.set("tenants.base_domain", "localhost");
    config.set("tenants.trial_days", "365");

    // Auth
    config.set("auth.jwt.secret", "dev-secret");
    config.set("auth.jwt.issuer", "echoblogs");
    config.set("auth.jwt.audience", "echoblogs-api");
    config.set("auth.jwt.access_ttl", "5m");
    config.set("auth.jwt.refresh_ttl", "1day");
    config.set("auth.bcrypt_cost", "12");

    config.set("session.secure", "false");

    config
}

/// Defaults, then `.env`, then the process environment.
pub fn load() -> EchoConfig {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            tracing::warn!(error = %err, "could not read .env");
        }
    }

    let mut config = defaults();
    config.load_env(ENV_PREFIX);
    config
}
