use std::time::Duration;

use crate::error::ConfigError;

const MIN_SECRET_LENGTH: usize = 32;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub session: SessionSettings,
}

/// Which persistence backend the server wires in
#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub store: StoreBackend,
    /// Upper bound for a single store round-trip, in seconds
    pub store_timeout_seconds: u64,
    /// bcrypt work factor
    pub password_cost: u32,
}

impl ApplicationSettings {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_seconds)
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// JWT signing settings. `secret` comes from the environment
/// (`APP_JWT__SECRET`) and has no default.
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_expiry: i64, // seconds
    pub issuer: String,
}

impl std::fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secret", &"[redacted]")
            .field("access_token_expiry", &self.access_token_expiry)
            .field("issuer", &self.issuer)
            .finish()
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct SessionSettings {
    pub cookie_name: String,
    /// Sets the `Secure` attribute; disable only for plain-http development
    pub cookie_secure: bool,
    /// How often expired session records are purged, in seconds
    pub cleanup_interval_seconds: u64,
}

impl SessionSettings {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: "tillpoint_session".to_string(),
            cookie_secure: true,
            cleanup_interval_seconds: 3600,
        }
    }
}

impl Settings {
    /// Rejects settings the server must not start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt.secret".to_string()));
        }
        if self.jwt.secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "jwt.secret must be at least {} bytes",
                MIN_SECRET_LENGTH
            )));
        }
        if self.jwt.access_token_expiry <= 0 {
            return Err(ConfigError::InvalidValue(
                "jwt.access_token_expiry must be positive".to_string(),
            ));
        }
        if self.application.store_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "application.store_timeout_seconds must be positive".to_string(),
            ));
        }
        if self.session.cookie_name.trim().is_empty() {
            return Err(ConfigError::MissingRequired("session.cookie_name".to_string()));
        }
        if self.session.cleanup_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "session.cleanup_interval_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads `configuration.yaml` (optional) and overlays `APP_*` environment
/// variables, e.g. `APP_JWT__SECRET` or `APP_APPLICATION__PORT`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .set_default("application.host", "127.0.0.1")?
        .set_default("application.port", 8080_i64)?
        .set_default("application.store", "postgres")?
        .set_default("application.store_timeout_seconds", 5_i64)?
        .set_default("application.password_cost", bcrypt::DEFAULT_COST as i64)?
        .set_default("database.username", "postgres")?
        .set_default("database.password", "")?
        .set_default("database.host", "localhost")?
        .set_default("database.port", 5432_i64)?
        .set_default("database.database_name", "tillpoint")?
        .set_default("jwt.access_token_expiry", 86_400_i64)?
        .set_default("jwt.issuer", "tillpoint")?
        .set_default("session.cookie_name", "tillpoint_session")?
        .set_default("session.cookie_secure", true)?
        .set_default("session.cleanup_interval_seconds", 3600_i64)?
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let settings = settings.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}
