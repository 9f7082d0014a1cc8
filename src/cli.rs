//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::config::{
    AuthSettings, ConfigError, CookieProfile, DEFAULT_ACCESS_COOKIE_NAME,
    DEFAULT_ACCESS_MAX_AGE_SECS, DEFAULT_REFRESH_COOKIE_NAME, DEFAULT_REFRESH_MAX_AGE_SECS,
    DEFAULT_REFRESH_THRESHOLD_SECS, SameSite,
};
use crate::db::Database;
use crate::password::hash_password;
use clap::{ArgAction, Parser};
use tracing::{error, info};
use uuid::Uuid;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const CREATE_USER_PASSWORD_ENV: &str = "CREATE_USER_PASSWORD";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "cookie-jwt",
    about = "JWT sessions carried in HttpOnly cookies"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "DATABASE_PATH", default_value = "sessions.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Log output format
    #[arg(short, long, env = "LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,

    /// Development mode: cookies are not marked Secure unless --cookie-secure is given
    #[arg(long, env = "DEBUG")]
    pub debug: bool,

    /// Name of the access token cookie
    #[arg(long, env = "AUTH_COOKIE_NAME", default_value = DEFAULT_ACCESS_COOKIE_NAME)]
    pub access_cookie: String,

    /// Name of the refresh token cookie
    #[arg(long, env = "REFRESH_COOKIE_NAME", default_value = DEFAULT_REFRESH_COOKIE_NAME)]
    pub refresh_cookie: String,

    /// Mark session cookies HttpOnly
    #[arg(long, env = "AUTH_COOKIE_HTTP_ONLY", default_value_t = true, action = ArgAction::Set)]
    pub cookie_http_only: bool,

    /// Mark session cookies Secure (defaults to true unless --debug)
    #[arg(long, env = "AUTH_COOKIE_SECURE", action = ArgAction::Set)]
    pub cookie_secure: Option<bool>,

    /// SameSite attribute: strict, lax or none
    #[arg(long, env = "AUTH_COOKIE_SAMESITE", default_value = "lax", value_parser = parse_same_site)]
    pub cookie_same_site: SameSite,

    /// Path attribute of session cookies
    #[arg(long, env = "AUTH_COOKIE_PATH", default_value = "/")]
    pub cookie_path: String,

    /// Domain attribute of session cookies (host-only when unset)
    #[arg(long, env = "AUTH_COOKIE_DOMAIN")]
    pub cookie_domain: Option<String>,

    /// Max-Age of the access cookie in seconds
    #[arg(long, env = "AUTH_COOKIE_MAX_AGE", default_value_t = DEFAULT_ACCESS_MAX_AGE_SECS)]
    pub access_max_age: u64,

    /// Max-Age of the refresh cookie in seconds
    #[arg(long, env = "REFRESH_COOKIE_MAX_AGE", default_value_t = DEFAULT_REFRESH_MAX_AGE_SECS)]
    pub refresh_max_age: u64,

    /// Rotate the access token when fewer than this many seconds remain
    #[arg(long, env = "TOKEN_REFRESH_THRESHOLD", default_value_t = DEFAULT_REFRESH_THRESHOLD_SECS)]
    pub refresh_threshold: u64,

    /// Access token lifetime in seconds (defaults to the access cookie Max-Age)
    #[arg(long, env = "ACCESS_TOKEN_LIFETIME")]
    pub access_lifetime: Option<u64>,

    /// Refresh token lifetime in seconds (defaults to the refresh cookie Max-Age)
    #[arg(long, env = "REFRESH_TOKEN_LIFETIME")]
    pub refresh_lifetime: Option<u64>,

    /// Login attempts allowed per client IP per minute
    #[arg(long, env = "LOGIN_RATE_LIMIT", default_value_t = 10,
        value_parser = clap::value_parser!(u32).range(1..))]
    pub login_rate_limit: u32,

    /// Take the client IP from X-Forwarded-For (only behind a trusted proxy)
    #[arg(long, env = "TRUST_PROXY")]
    pub trust_proxy: bool,

    /// Create a user with this name on startup. The password is read from CREATE_USER_PASSWORD
    #[arg(long)]
    pub create_user: Option<String>,
}

fn parse_same_site(s: &str) -> Result<SameSite, String> {
    s.parse().map_err(|e: ConfigError| e.to_string())
}

impl Args {
    /// Resolve the session settings and validate them.
    pub fn auth_settings(&self) -> Result<AuthSettings, ConfigError> {
        let settings = AuthSettings {
            access_cookie: self.access_cookie.clone(),
            refresh_cookie: self.refresh_cookie.clone(),
            profile: CookieProfile {
                http_only: self.cookie_http_only,
                secure: self.cookie_secure.unwrap_or(!self.debug),
                same_site: self.cookie_same_site,
                path: self.cookie_path.clone(),
                domain: self.cookie_domain.clone(),
                access_max_age: self.access_max_age,
                refresh_max_age: self.refresh_max_age,
            },
            refresh_threshold: self.refresh_threshold,
            access_lifetime: self.access_lifetime.unwrap_or(self.access_max_age),
            refresh_lifetime: self.refresh_lifetime.unwrap_or(self.refresh_max_age),
        };
        settings.validate()?;
        Ok(settings)
    }
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // SAFETY: Called from main before the tokio runtime is built, so no
        // other thread exists yet.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    jwt_secret: String,
) -> Result<ServerConfig, ConfigError> {
    let auth = args.auth_settings()?;

    Ok(ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        auth,
        login_rate_per_minute: args.login_rate_limit,
        trust_forwarded_for: args.trust_proxy,
    })
}

/// Read the --create-user password from the environment and remove it.
/// Returns None and logs an error if it is missing or empty.
pub fn take_create_user_password() -> Option<String> {
    let Ok(password) = std::env::var(CREATE_USER_PASSWORD_ENV) else {
        error!(
            "Set {} to the new user's password",
            CREATE_USER_PASSWORD_ENV
        );
        return None;
    };
    // SAFETY: Called from main before the tokio runtime is built, so no other
    // thread exists yet.
    unsafe { std::env::remove_var(CREATE_USER_PASSWORD_ENV) };

    if password.is_empty() {
        error!("{} must not be empty", CREATE_USER_PASSWORD_ENV);
        return None;
    }
    Some(password)
}

/// Handle the --create-user flag: hash the password and store the user.
/// Exits the process if the user cannot be created.
pub async fn handle_create_user(db: &Database, username: &str, password: &str) {
    let username = username.trim();
    if username.is_empty() {
        error!("--create-user needs a non-empty username");
        std::process::exit(1);
    }

    match db.users().get_by_username(username).await {
        Ok(Some(_)) => {
            info!(username = %username, "User already exists");
            return;
        }
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "Failed to check for existing user");
            std::process::exit(1);
        }
    }

    let hash = match hash_password(password) {
        Ok(hash) => hash,
        Err(e) => {
            error!(error = %e, "Failed to hash password");
            std::process::exit(1);
        }
    };

    let uuid = Uuid::new_v4().to_string();
    match db.users().create(&uuid, username, &hash).await {
        Ok(_) => info!(username = %username, uuid = %uuid, "User created"),
        Err(e) => {
            error!(error = %e, "Failed to create user");
            std::process::exit(1);
        }
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
