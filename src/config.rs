use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_ADMIN_USERS: &str = "admin,datafoundry";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be 'json' or 'pretty', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub aipay_base_url: Option<String>,
    pub aipay_web_url: String,
    pub return_url: String,
    pub aipay_payer_account: Option<String>,
    pub aipay_timeout: Duration,
    pub admin_users: Vec<String>,
    pub allow_negative_balance: bool,
    pub api_server: Option<String>,
    pub static_tokens: String,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Config {
            server_port: parse_or(get("SERVER_PORT"), 3000, "SERVER_PORT")?,
            database_url: get("DATABASE_URL"),
            database_max_connections: parse_or(
                get("DATABASE_MAX_CONNECTIONS"),
                5,
                "DATABASE_MAX_CONNECTIONS",
            )?,
            aipay_base_url: get("JAVA_AIPAY_REQUESTPACKET_URL"),
            aipay_web_url: get("AIPAY_WEB_URL").unwrap_or_default(),
            return_url: get("RETURN_URL").unwrap_or_default(),
            aipay_payer_account: get("AIPAY_PAYER_ACCOUNT"),
            aipay_timeout: Duration::from_secs(parse_or(
                get("AIPAY_TIMEOUT_SECS"),
                30,
                "AIPAY_TIMEOUT_SECS",
            )?),
            admin_users: parse_list(
                &get("ADMIN_USERS").unwrap_or_else(|| DEFAULT_ADMIN_USERS.to_string()),
            ),
            allow_negative_balance: match get("ALLOW_NEGATIVE_BALANCE") {
                Some(raw) => parse_bool(&raw).context("ALLOW_NEGATIVE_BALANCE")?,
                None => true,
            },
            api_server: get("DATAFOUNDRY_API_SERVER"),
            static_tokens: get("AUTH_STATIC_TOKENS").unwrap_or_default(),
            log_format: get("LOG_FORMAT").unwrap_or_default().parse()?,
        })
    }

    /// Postgres URL, required by every command except `serve --in-memory`.
    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set (or run `serve --in-memory`)")
    }

    /// Gateway URL, required by `serve` and `config`.
    pub fn require_aipay_base_url(&self) -> Result<&str> {
        self.aipay_base_url
            .as_deref()
            .context("JAVA_AIPAY_REQUESTPACKET_URL must be set")
    }
}

fn parse_or<T>(raw: Option<String>, default: T, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) => value
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, value)),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got '{}'", other),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("JAVA_AIPAY_REQUESTPACKET_URL", "http://aipay")]).unwrap();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.aipay_timeout, Duration::from_secs(30));
        assert_eq!(config.admin_users, vec!["admin", "datafoundry"]);
        assert!(config.allow_negative_balance);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.database_url.is_none());
        assert!(config.require_database_url().is_err());
    }

    #[test]
    fn test_gateway_url_is_only_required_on_demand() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/charge")]).unwrap();
        assert!(config.aipay_base_url.is_none());
        assert!(config.require_aipay_base_url().is_err());
        assert!(config.require_database_url().is_ok());

        let config = config_from(&[("JAVA_AIPAY_REQUESTPACKET_URL", "http://aipay")]).unwrap();
        assert_eq!(config.require_aipay_base_url().unwrap(), "http://aipay");
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("JAVA_AIPAY_REQUESTPACKET_URL", "http://aipay"),
            ("SERVER_PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/charge"),
            ("ADMIN_USERS", " root , ops ,"),
            ("ALLOW_NEGATIVE_BALANCE", "false"),
            ("LOG_FORMAT", "JSON"),
            ("AIPAY_PAYER_ACCOUNT", "test100"),
        ])
        .unwrap();
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.require_database_url().unwrap(), "postgres://localhost/charge");
        assert_eq!(config.admin_users, vec!["root", "ops"]);
        assert!(!config.allow_negative_balance);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.aipay_payer_account.as_deref(), Some("test100"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(config_from(&[
            ("JAVA_AIPAY_REQUESTPACKET_URL", "http://aipay"),
            ("SERVER_PORT", "not-a-port"),
        ])
        .is_err());
        assert!(config_from(&[
            ("JAVA_AIPAY_REQUESTPACKET_URL", "http://aipay"),
            ("ALLOW_NEGATIVE_BALANCE", "maybe"),
        ])
        .is_err());
    }
}
