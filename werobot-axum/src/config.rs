//! Configuration for the host application and the demo server.
//!
//! `HostConfig` is the key/value store a host application exposes to the
//! binder. `Config` is the process configuration read from environment
//! variables by the `werobot-echo` binary.

use std::collections::BTreeMap;
use std::env;

use tracing::warn;

/// Host config key holding the WeChat token.
pub const TOKEN_KEY: &str = "WEROBOT_TOKEN";

/// Host config key holding the URL rule of the webhook route.
pub const RULE_KEY: &str = "WEROBOT_ROLE";

/// Token used when neither the robot nor the host config supplies one.
///
/// It passes format validation but will never match a real platform signature.
pub const DEFAULT_TOKEN: &str = "none";

/// URL rule used when neither the caller nor the host config supplies one.
pub const DEFAULT_RULE: &str = "/wechat";

/// Endpoint name used when the caller does not supply one.
pub const DEFAULT_ENDPOINT: &str = "werobot";

/// Prefix of environment variables copied into a `HostConfig`.
const ENV_PREFIX: &str = "WEROBOT_";

/// String key/value config store owned by a host application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostConfig {
    values: BTreeMap<String, String>,
}

impl HostConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from every `WEROBOT_*` environment variable.
    pub fn from_env() -> Self {
        let values = env::vars()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Set `key`, returning the previous value if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    /// Return the value of `key`, storing `default` first if the key is absent.
    pub fn get_or_insert(&mut self, key: &str, default: &str) -> &str {
        self.values
            .entry(key.to_string())
            .or_insert_with(|| default.to_string())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

impl<K, V> FromIterator<(K, V)> for HostConfig
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Process configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Endpoint name the robot is registered under
    pub endpoint: String,

    /// Config store handed to the host application
    pub host: HostConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            port: parse_port("PORT", 8080),

            endpoint: env::var("WEROBOT_ENDPOINT")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),

            host: HostConfig::from_env(),
        }
    }
}

fn parse_port(name: &str, default: u16) -> u16 {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse::<u16>() {
        Ok(port) => port,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid port, using default");
            default
        }
    }
}
