use std::{fmt::Display, str::FromStr};

use tracing::{info, warn};

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_AUTH_SCHEME: &str = "Token";
pub const DEFAULT_NOTICE_TTL_MS: u32 = 4000;
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub auth_scheme: String,
    pub notice_ttl_ms: u32,
    pub log_filter: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            auth_scheme: DEFAULT_AUTH_SCHEME.to_string(),
            notice_ttl_ms: DEFAULT_NOTICE_TTL_MS,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl ClientConfig {
    /// Resolves every setting through `lookup`, falling back to defaults.
    pub fn load(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base_url: String = try_load(&lookup, "TASKDESK_API_BASE_URL", DEFAULT_API_BASE_URL);
        Self {
            api_base_url: base_url.trim_end_matches('/').to_string(),
            auth_scheme: try_load(&lookup, "TASKDESK_AUTH_SCHEME", DEFAULT_AUTH_SCHEME),
            notice_ttl_ms: try_load(&lookup, "TASKDESK_NOTICE_TTL_MS", "4000"),
            log_filter: try_load(&lookup, "TASKDESK_LOG", DEFAULT_LOG_FILTER),
        }
    }
}

fn try_load<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> T
where
    T::Err: Display,
{
    let raw = lookup(key)
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        });

    raw.trim()
        .parse()
        .or_else(|e| {
            warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
            default.parse()
        })
        .map_err(|_| ())
        .expect("Built-in defaults misconfigured!")
}
