use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// SendGrid API key. `None` logs outgoing mail instead of sending it.
    pub sendgrid_api_key: Option<String>,
    pub from_email: String,
    pub from_name: String,
    pub queue_capacity: usize,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub google: Option<GoogleConfig>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Token lifetime bounds. Zero or negative would expire every token on issue.
const TTL_HOURS_RANGE: std::ops::RangeInclusive<i64> = 1..=24 * 365;

fn ttl_hours(raw: Option<String>) -> anyhow::Result<i64> {
    let Some(raw) = raw else { return Ok(72) };
    let hours: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("JWT_TTL_HOURS is not an integer: {raw:?}"))?;
    anyhow::ensure!(
        TTL_HOURS_RANGE.contains(&hours),
        "JWT_TTL_HOURS must be between {} and {}, got {hours}",
        TTL_HOURS_RANGE.start(),
        TTL_HOURS_RANGE.end()
    );
    Ok(hours)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "sprintboard".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "sprintboard-users".into()),
            ttl_hours: ttl_hours(env_opt("JWT_TTL_HOURS")).context("invalid JWT settings")?,
        };
        let mail = MailConfig {
            sendgrid_api_key: env_opt("SENDGRID_API_KEY"),
            from_email: std::env::var("SENDGRID_FROM_EMAIL")
                .unwrap_or_else(|_| "no-reply@sprintboard.local".into()),
            from_name: std::env::var("SENDGRID_FROM_NAME").unwrap_or_else(|_| "Sprintboard".into()),
            queue_capacity: env_or("MAIL_QUEUE_CAPACITY", 100),
            max_attempts: env_or("MAIL_MAX_ATTEMPTS", 3),
        };
        let google = match (
            env_opt("GOOGLE_CLIENT_ID"),
            env_opt("GOOGLE_CLIENT_SECRET"),
            env_opt("GOOGLE_REDIRECT_URL"),
        ) {
            (Some(client_id), Some(client_secret), Some(redirect_url)) => Some(GoogleConfig {
                client_id,
                client_secret,
                redirect_url,
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 8080),
            jwt,
            mail,
            google,
        })
    }
}
