//! Configuration types, built from environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::ConfigError;
use crate::leads::templates::TemplateLinks;

pub const DEFAULT_ADMIN_EMAIL: &str = "admin@crm.com";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
pub const DEFAULT_CALENDLY_API_BASE: &str = "https://api.calendly.com";
/// Top of every hour (the cron crate takes a leading seconds field).
pub const DEFAULT_REMINDER_SCHEDULE: &str = "0 0 * * * *";
/// Upper bound for hour-valued settings (ten years).
pub const MAX_HOURS: i64 = 24 * 365 * 10;

/// Whole-process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_path: PathBuf,
    /// Daily-rolling log files are written here when set.
    pub log_dir: Option<PathBuf>,
    pub admin: AdminConfig,
    /// `None` disables event-reference lookups (bookings proceed without times).
    pub scheduler: Option<SchedulerConfig>,
    pub mail: MailConfig,
    pub reminder: ReminderConfig,
    pub links: TemplateLinks,
}

/// Admin login credentials and session lifetime.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub email: String,
    pub password: SecretString,
    pub session_ttl: chrono::Duration,
}

impl AdminConfig {
    /// Whether the built-in default password is still in use.
    pub fn uses_default_password(&self) -> bool {
        self.password.expose_secret() == DEFAULT_ADMIN_PASSWORD
    }
}

/// External scheduling API access.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Event lookups are only ever sent under this URL.
    pub api_base: Url,
    pub token: SecretString,
}

/// Outbound mail transport.
#[derive(Debug, Clone)]
pub enum MailConfig {
    OneSignal {
        app_id: String,
        api_key: SecretString,
    },
    Smtp(SmtpConfig),
    /// No transport configured: messages are only logged.
    Log,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

/// Reminder sweep settings.
#[derive(Debug, Clone)]
pub struct ReminderConfig {
    pub enabled: bool,
    /// Cron expression (with seconds field) for sweep times.
    pub schedule: String,
    /// Age a guide download must exceed before a reminder is due.
    pub delay: chrono::Duration,
    /// Max reminder sends in flight within one sweep.
    pub max_concurrent: usize,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: DEFAULT_REMINDER_SCHEDULE.to_string(),
            delay: chrono::Duration::hours(24),
            max_concurrent: 4,
        }
    }
}

impl AppConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = parse_or(&var, "PORT", 3000u16)?;
        let database_path = var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/leads.db"));
        let log_dir = var("LOG_DIR").map(PathBuf::from);

        let admin_password =
            var("ADMIN_PASSWORD").unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string());
        let admin = AdminConfig {
            email: var("ADMIN_EMAIL").unwrap_or_else(|| DEFAULT_ADMIN_EMAIL.to_string()),
            password: SecretString::from(admin_password),
            session_ttl: parse_hours(&var, "SESSION_TTL_HOURS", 720)?,
        };

        let scheduler = match var("CALENDLY_PERSONAL_TOKEN") {
            Some(token) => {
                let raw = var("CALENDLY_API_BASE")
                    .unwrap_or_else(|| DEFAULT_CALENDLY_API_BASE.to_string());
                Some(SchedulerConfig {
                    api_base: parse_base_url("CALENDLY_API_BASE", &raw)?,
                    token: SecretString::from(token),
                })
            }
            None => None,
        };

        let mail = match (var("ONESIGNAL_APP_ID"), var("ONESIGNAL_REST_API_KEY"), var("SMTP_HOST")) {
            (Some(app_id), Some(api_key), _) => MailConfig::OneSignal {
                app_id,
                api_key: SecretString::from(api_key),
            },
            (_, _, Some(host)) => {
                let username = var("SMTP_USERNAME").unwrap_or_default();
                let from_address = var("MAIL_FROM")
                    .or_else(|| (!username.is_empty()).then(|| username.clone()))
                    .ok_or_else(|| ConfigError::MissingEnvVar("MAIL_FROM".to_string()))?;
                MailConfig::Smtp(SmtpConfig {
                    host,
                    port: parse_or(&var, "SMTP_PORT", 587u16)?,
                    username,
                    password: SecretString::from(var("SMTP_PASSWORD").unwrap_or_default()),
                    from_address,
                })
            }
            _ => MailConfig::Log,
        };

        let defaults = ReminderConfig::default();
        let schedule = var("REMINDER_SCHEDULE").unwrap_or(defaults.schedule);
        cron::Schedule::from_str(&schedule)
            .map_err(|e| invalid("REMINDER_SCHEDULE", &format!("invalid cron: {e}")))?;
        let delay = parse_hours(&var, "REMINDER_DELAY_HOURS", 24)?;
        let max_concurrent: usize = parse_or(&var, "REMINDER_MAX_CONCURRENT", defaults.max_concurrent)?;
        let reminder = ReminderConfig {
            enabled: parse_or(&var, "REMINDER_ENABLED", defaults.enabled)?,
            schedule,
            delay,
            max_concurrent: max_concurrent.max(1),
        };

        let link_defaults = TemplateLinks::default();
        let booking_page_url = var("BOOKING_PAGE_URL").unwrap_or(link_defaults.booking_page_url);
        Url::parse(&booking_page_url).map_err(|e| invalid("BOOKING_PAGE_URL", &e.to_string()))?;
        let links = TemplateLinks {
            booking_page_url,
            guide_url: var("GUIDE_URL").unwrap_or(link_defaults.guide_url),
        };

        Ok(Self {
            port,
            database_path,
            log_dir,
            admin,
            scheduler,
            mail,
            reminder,
            links,
        })
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| invalid(key, &e.to_string())),
        None => Ok(default),
    }
}

/// Whole hours in `1..=MAX_HOURS`.
fn parse_hours<F>(var: &F, key: &str, default: i64) -> Result<chrono::Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let hours: i64 = parse_or(var, key, default)?;
    if !(1..=MAX_HOURS).contains(&hours) {
        return Err(invalid(key, &format!("must be between 1 and {MAX_HOURS} hours")));
    }
    Ok(chrono::Duration::hours(hours))
}

/// An absolute http(s) URL usable as a path prefix.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| invalid(key, &e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(invalid(key, "must be an http(s) URL"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid(key, "must not carry a query or fragment"));
    }
    Ok(url)
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
