use config::ConfigError;

/// Development-only signing key. Deployments must override `jwt.secret`,
/// otherwise any two of them can forge each other's tokens.
pub const DEFAULT_JWT_SECRET: &str =
    "your-super-secret-key-that-must-be-at-least-32-characters-long-for-hmacsha256";
pub const DEFAULT_JWT_ISSUER: &str = "BloodwaveApi";
pub const DEFAULT_JWT_AUDIENCE: &str = "BloodwaveClient";

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    pub password: PasswordSettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub max_connections: u32,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// Access/refresh token settings
#[derive(serde::Deserialize, Clone, Debug)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_token_expiry: i64,   // seconds (86400 = 24 hours)
    pub refresh_token_expiry: i64,  // seconds (604800 = 7 days)
    /// Reject rotation of an unknown predecessor instead of issuing a fresh token
    pub strict_rotation: bool,
}

impl JwtSettings {
    pub fn uses_default_secret(&self) -> bool {
        self.secret == DEFAULT_JWT_SECRET
    }
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: DEFAULT_JWT_SECRET.to_string(),
            issuer: DEFAULT_JWT_ISSUER.to_string(),
            audience: DEFAULT_JWT_AUDIENCE.to_string(),
            access_token_expiry: 24 * 60 * 60,
            refresh_token_expiry: 7 * 24 * 60 * 60,
            strict_rotation: false,
        }
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct PasswordSettings {
    pub bcrypt_cost: u32,
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

/// Defaults, then `configuration.yaml` (optional), then `APP_*` environment
/// variables (`APP_JWT__SECRET`, `APP_DATABASE__HOST`, ...).
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let jwt = JwtSettings::default();
    let settings = config::Config::builder()
        .set_default("application.host", "127.0.0.1")?
        .set_default("application.port", 8080)?
        .set_default("database.username", "postgres")?
        .set_default("database.password", "password")?
        .set_default("database.host", "localhost")?
        .set_default("database.port", 5432)?
        .set_default("database.database_name", "bloodwave")?
        .set_default("database.max_connections", 5)?
        .set_default("jwt.secret", jwt.secret)?
        .set_default("jwt.issuer", jwt.issuer)?
        .set_default("jwt.audience", jwt.audience)?
        .set_default("jwt.access_token_expiry", jwt.access_token_expiry)?
        .set_default("jwt.refresh_token_expiry", jwt.refresh_token_expiry)?
        .set_default("jwt.strict_rotation", jwt.strict_rotation)?
        .set_default("password.bcrypt_cost", PasswordSettings::default().bcrypt_cost)?
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
