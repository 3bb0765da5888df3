use std::{env, fmt::Display, str::FromStr};

use chrono::Duration;
use log::*;
use marketplace_engine::{helpers::DEFAULT_SIGNATURE_TOLERANCE_SECS, ReviewWindow};
use mkt_common::{helpers::parse_env_value, Secret};
use rand::{distributions::Alphanumeric, thread_rng, Rng};

const DEFAULT_MKT_HOST: &str = "127.0.0.1";
const DEFAULT_MKT_PORT: u16 = 8470;
const DEFAULT_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_REVIEW_WINDOW_DAYS: i64 = 7;
const SESSION_SECRET_LENGTH: usize = 48;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// The SQLite database URL. If empty, the engine's default database is used.
    pub database_url: String,
    pub max_connections: u32,
    pub auth: AuthConfig,
    pub webhooks: WebhookConfig,
    /// How long after completion a sub-order can be reviewed
    pub review_window: ReviewWindow,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MKT_HOST.to_string(),
            port: DEFAULT_MKT_PORT,
            database_url: String::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            auth: AuthConfig::default(),
            webhooks: WebhookConfig::default(),
            review_window: ReviewWindow::days(DEFAULT_REVIEW_WINDOW_DAYS),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MKT_HOST").ok().unwrap_or_else(|| DEFAULT_MKT_HOST.into());
        let port = env_or_default("MKT_PORT", DEFAULT_MKT_PORT);
        let database_url = env::var("MKT_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MKT_DATABASE_URL is not set. Please set it to the URL for the marketplace database.");
            String::default()
        });
        let max_connections = env_or_default("MKT_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS);
        let days = env_or_default("MKT_REVIEW_WINDOW_DAYS", DEFAULT_REVIEW_WINDOW_DAYS);
        let review_window = if days > 0 {
            ReviewWindow::days(days)
        } else {
            error!("🪛️ MKT_REVIEW_WINDOW_DAYS must be positive. Using the default, {DEFAULT_REVIEW_WINDOW_DAYS}.");
            ReviewWindow::days(DEFAULT_REVIEW_WINDOW_DAYS)
        };
        Self {
            host,
            port,
            database_url,
            max_connections,
            auth: AuthConfig::from_env_or_default(),
            webhooks: WebhookConfig::from_env_or_default(),
            review_window,
        }
    }
}

/// Reads `name` from the environment, falling back to `default` (with an error in the log) if the value is invalid.
fn env_or_default<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match parse_env_value::<T>(name) {
        Ok(Some(v)) => v,
        Ok(None) => default,
        Err(e) => {
            error!("🪛️ {e} Using the default, {default}, instead.");
            default
        },
    }
}

//-------------------------------------------------  AuthConfig  ------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HS256 secret shared with the identity provider that issues bearer tokens
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let secret =
            thread_rng().sample_iter(&Alphanumeric).take(SESSION_SECRET_LENGTH).map(char::from).collect::<String>();
        warn!(
            "🚨️🚨️🚨️ A random JWT secret has been generated for this session. No externally issued token will be \
             accepted. If this is a production instance, you are doing it wrong! Set the MKT_JWT_SECRET environment \
             variable instead. 🚨️🚨️🚨️"
        );
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn new<S: Into<String>>(jwt_secret: S) -> Self {
        Self { jwt_secret: Secret::new(jwt_secret.into()) }
    }

    pub fn from_env_or_default() -> Self {
        match env::var("MKT_JWT_SECRET") {
            Ok(s) if !s.trim().is_empty() => Self::new(s),
            _ => {
                warn!("🪛️ MKT_JWT_SECRET is not set.");
                Self::default()
            },
        }
    }
}

//-------------------------------------------------  WebhookConfig  ---------------------------------------------------
#[derive(Clone, Debug)]
pub struct WebhookConfig {
    /// The signing secret of the gateway's webhook endpoint
    pub signing_secret: Secret<String>,
    /// Deliveries signed longer ago than this (or this far in the future) are rejected
    pub signature_tolerance: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            signing_secret: Secret::default(),
            signature_tolerance: Duration::seconds(DEFAULT_SIGNATURE_TOLERANCE_SECS),
        }
    }
}

impl WebhookConfig {
    pub fn from_env_or_default() -> Self {
        let signing_secret = env::var("MKT_STRIPE_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ MKT_STRIPE_WEBHOOK_SECRET is not set. Please set it to the signing secret of your webhook \
                 endpoint. Every webhook delivery will be rejected until you do."
            );
            String::default()
        });
        let tolerance = env_or_default("MKT_STRIPE_SIGNATURE_TOLERANCE", DEFAULT_SIGNATURE_TOLERANCE_SECS);
        Self { signing_secret: Secret::new(signing_secret), signature_tolerance: Duration::seconds(tolerance.abs()) }
    }
}
