use std::env;
use std::time::Duration;

use crate::moderation::{DEFAULT_API_BASE, DEFAULT_MODEL};

pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variables: {0:?}")]
    Missing(Vec<&'static str>),
    #[error("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} characters long")]
    WeakSecret,
}

#[derive(Clone, Debug)]
pub struct ModerationSettings {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Clone, Debug)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub story_limit: usize,
    pub story_window: Duration,
    pub comment_limit: usize,
    pub comment_window: Duration,
}

/// Process configuration, read once from the environment at startup.
#[derive(Clone, Debug)]
pub struct Settings {
    pub bind_addr: String,
    pub frontend_url: Option<String>,
    pub database_url: Option<String>,
    pub moderation: ModerationSettings,
    pub rate_limit: RateLimitSettings,
    /// Extra `img-src` origins for the CSP, where story media is hosted.
    pub media_hosts: Vec<String>,
    pub enable_hsts: bool,
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn usize_env(name: &str, default: usize) -> usize {
    var(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn dur_env(name: &str, default: u64) -> Duration {
    Duration::from_secs(var(name).and_then(|v| v.parse().ok()).unwrap_or(default))
}

fn bool_env(name: &str, default: bool) -> bool {
    var(name).map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(default)
}

impl RateLimitSettings {
    pub fn from_env() -> Self {
        Self {
            enabled: bool_env("RATE_LIMIT_ENABLED", true),
            story_limit: usize_env("RL_STORY_LIMIT", 5),
            story_window: dur_env("RL_STORY_WINDOW", 3600),
            comment_limit: usize_env("RL_COMMENT_LIMIT", 10),
            comment_window: dur_env("RL_COMMENT_WINDOW", 60),
        }
    }
}

impl Settings {
    /// Reads and validates the environment. `JWT_SECRET` and `MODERATION_API_KEY` are required.
    pub fn from_env() -> Result<Self, ConfigError> {
        let missing: Vec<&'static str> = ["JWT_SECRET", "MODERATION_API_KEY"]
            .into_iter()
            .filter(|name| var(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        if var("JWT_SECRET").map_or(0, |s| s.len()) < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::WeakSecret);
        }

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".into()),
            frontend_url: var("FRONTEND_URL"),
            database_url: var("DATABASE_URL"),
            moderation: ModerationSettings {
                api_base: var("MODERATION_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.into()),
                api_key: var("MODERATION_API_KEY").unwrap_or_default(),
                model: var("MODERATION_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            },
            rate_limit: RateLimitSettings::from_env(),
            media_hosts: var("MEDIA_HOSTS")
                .map(|v| v.split(',').map(|h| h.trim().to_string()).filter(|h| !h.is_empty()).collect())
                .unwrap_or_else(|| vec!["https://picsum.photos".into(), "https://i.pravatar.cc".into()]),
            enable_hsts: bool_env("ENABLE_HSTS", false),
        })
    }
}
