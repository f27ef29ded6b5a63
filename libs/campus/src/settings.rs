//! Service settings
//!
//! Settings come from built-in defaults overlaid with `CAMPUS_*` environment
//! variables. Nested keys use a double underscore, e.g.
//! `CAMPUS_MAIL__RELAY_URL` or `CAMPUS_DIGEST__SCHEDULE`.

use chrono::TimeDelta;
use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use thiserror::Error;

use crate::mail::{AnyMailer, HttpMailer, LogMailer};

/// Minimum cookie key length accepted for signing
pub const MIN_COOKIE_KEY_BYTES: usize = 64;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load settings: {0}")]
    Load(#[from] ConfigError),

    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailSettings {
    /// HTTP relay endpoint; mail is only logged when unset
    pub relay_url: Option<String>,
    pub sender: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DigestSettings {
    /// Cron expression (with seconds) for the daily digest run, in UTC
    pub schedule: String,
    /// Users processed concurrently during a run
    pub concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub bind_address: String,
    /// Key material for signing session cookies
    pub cookie_key: String,
    pub secure_cookies: bool,
    pub session_lifetime_hours: i64,
    pub idle_timeout_minutes: i64,
    pub reset_token_lifetime_minutes: i64,
    pub mail: MailSettings,
    pub digest: DigestSettings,
}

impl Settings {
    /// Load settings for a service listening on `default_bind` unless
    /// `CAMPUS_BIND_ADDRESS` says otherwise
    pub fn load(default_bind: &str) -> Result<Self, SettingsError> {
        let settings: Settings = Config::builder()
            .set_default("bind_address", default_bind)?
            .set_default("cookie_key", "")?
            .set_default("secure_cookies", true)?
            .set_default("session_lifetime_hours", 24)?
            .set_default(
                "idle_timeout_minutes",
                crate::session::DEFAULT_IDLE_TIMEOUT_MINUTES,
            )?
            .set_default("reset_token_lifetime_minutes", 60)?
            .set_default("mail.sender", "no-reply@campus-clubs.local")?
            .set_default("digest.schedule", "0 0 8 * * *")?
            .set_default("digest.concurrency", 4)?
            .add_source(
                Environment::with_prefix("CAMPUS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        let max_idle = crate::session::DEFAULT_IDLE_TIMEOUT_MINUTES;
        if self.idle_timeout_minutes <= 0 || self.idle_timeout_minutes > max_idle {
            return Err(SettingsError::Invalid {
                key: "idle_timeout_minutes",
                reason: format!("must be between 1 and {max_idle}"),
            });
        }
        if self.session_lifetime_hours <= 0 {
            return Err(SettingsError::Invalid {
                key: "session_lifetime_hours",
                reason: "must be positive".to_string(),
            });
        }
        if self.digest.concurrency == 0 {
            return Err(SettingsError::Invalid {
                key: "digest.concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Cookie signing key bytes; services that issue cookies call this at
    /// startup
    pub fn cookie_key_bytes(&self) -> Result<&[u8], SettingsError> {
        let bytes = self.cookie_key.as_bytes();
        if bytes.len() < MIN_COOKIE_KEY_BYTES {
            return Err(SettingsError::Invalid {
                key: "cookie_key",
                reason: format!("needs at least {MIN_COOKIE_KEY_BYTES} bytes"),
            });
        }
        Ok(bytes)
    }

    pub fn idle_timeout(&self) -> TimeDelta {
        TimeDelta::minutes(self.idle_timeout_minutes)
    }

    pub fn session_lifetime(&self) -> TimeDelta {
        TimeDelta::hours(self.session_lifetime_hours)
    }

    pub fn reset_token_lifetime(&self) -> TimeDelta {
        TimeDelta::minutes(self.reset_token_lifetime_minutes)
    }

    pub fn mailer(&self) -> AnyMailer {
        match &self.mail.relay_url {
            Some(url) if !url.is_empty() => AnyMailer::Http(HttpMailer::new(
                url.clone(),
                self.mail.sender.clone(),
                self.mail.api_key.clone(),
            )),
            _ => AnyMailer::Log(LogMailer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        unsafe {
            for key in [
                "CAMPUS_BIND_ADDRESS",
                "CAMPUS_COOKIE_KEY",
                "CAMPUS_IDLE_TIMEOUT_MINUTES",
                "CAMPUS_DIGEST__CONCURRENCY",
                "CAMPUS_DIGEST__SCHEDULE",
                "CAMPUS_MAIL__RELAY_URL",
            ] {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let settings = Settings::load("0.0.0.0:3000").unwrap();
        assert_eq!(settings.bind_address, "0.0.0.0:3000");
        assert_eq!(settings.idle_timeout(), TimeDelta::minutes(15));
        assert_eq!(settings.digest.schedule, "0 0 8 * * *");
        assert_eq!(settings.digest.concurrency, 4);
        assert!(matches!(settings.mailer(), AnyMailer::Log(_)));
        assert!(settings.cookie_key_bytes().is_err());
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        clear_env();
        unsafe {
            std::env::set_var("CAMPUS_BIND_ADDRESS", "127.0.0.1:9000");
            std::env::set_var("CAMPUS_COOKIE_KEY", "k".repeat(64));
            std::env::set_var("CAMPUS_DIGEST__CONCURRENCY", "8");
            std::env::set_var("CAMPUS_MAIL__RELAY_URL", "http://relay.local/send");
        }

        let settings = Settings::load("0.0.0.0:3000").unwrap();
        assert_eq!(settings.bind_address, "127.0.0.1:9000");
        assert_eq!(settings.digest.concurrency, 8);
        assert_eq!(settings.cookie_key_bytes().unwrap().len(), 64);
        assert!(matches!(settings.mailer(), AnyMailer::Http(_)));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_rejects_idle_timeout_out_of_bounds() {
        for minutes in ["0", "16", "120"] {
            clear_env();
            unsafe {
                std::env::set_var("CAMPUS_IDLE_TIMEOUT_MINUTES", minutes);
            }
            assert!(
                matches!(
                    Settings::load("0.0.0.0:3000"),
                    Err(SettingsError::Invalid { key: "idle_timeout_minutes", .. })
                ),
                "{minutes}"
            );
        }

        unsafe {
            std::env::set_var("CAMPUS_IDLE_TIMEOUT_MINUTES", "10");
        }
        let settings = Settings::load("0.0.0.0:3000").unwrap();
        assert_eq!(settings.idle_timeout(), TimeDelta::minutes(10));
        clear_env();
    }
}
