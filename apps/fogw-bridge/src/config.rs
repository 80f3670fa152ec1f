use crate::fields::FieldTable;
use crate::units::UnitSystem;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_GATEWAY_HOST: &str = "192.168.0.2";
const DEFAULT_GATEWAY_PORT: u16 = 80;
const DEFAULT_GATEWAY_PATH: &str = "/get_livedata_info";
const DEFAULT_POLL_INTERVAL_SECONDS: f64 = 30.0;
const DEFAULT_TIMEOUT_SECONDS: f64 = 5.0;
const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 10;
const DEFAULT_CHANNEL_CAPACITY: usize = 16;

const CONFIG_PATH_ENV: &str = "FOGW_CONFIG_PATH";

/// Where and how often to poll. Built once from [`Config`], never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEndpoint {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl GatewayEndpoint {
    pub fn url(&self) -> String {
        if self.host.contains(':') {
            format!("http://[{}]:{}{}", self.host, self.port, self.path)
        } else {
            format!("http://{}:{}{}", self.host, self.port, self.path)
        }
    }
}

/// Driver configuration. Deserializable so a host can hand over its own config section;
/// every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    #[serde(alias = "gateway_host")]
    pub host: String,
    pub port: u16,
    pub path: String,
    /// Seconds between cycle starts.
    pub poll_interval: f64,
    /// Seconds before a request is abandoned.
    pub timeout: f64,
    /// Consecutive failed cycles before a hard failure is reported. 0 disables escalation.
    pub max_consecutive_failures: u32,
    pub unit_system: UnitSystem,
    /// Optional JSON field-table override file.
    pub field_table: Option<PathBuf>,
    /// Records buffered between the poller and the host.
    pub channel_capacity: usize,
    /// Driver selector from the host's config section. Not used here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_GATEWAY_HOST.to_string(),
            port: DEFAULT_GATEWAY_PORT,
            path: DEFAULT_GATEWAY_PATH.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL_SECONDS,
            timeout: DEFAULT_TIMEOUT_SECONDS,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            unit_system: UnitSystem::default(),
            field_table: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            driver: None,
        }
    }
}

impl Config {
    /// Defaults, then the JSON file named by `FOGW_CONFIG_PATH` (if any), then `FOGW_*`
    /// environment variables.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Like [`Config::from_env`], but an explicit file takes the place of `FOGW_CONFIG_PATH`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = path
            .map(Path::to_path_buf)
            .or_else(|| env_optional(CONFIG_PATH_ENV).map(PathBuf::from));
        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_with(env_optional)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("FOGW_GATEWAY_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("FOGW_GATEWAY_PORT") {
            self.port = parse_env("FOGW_GATEWAY_PORT", &port)?;
        }
        if let Some(path) = lookup("FOGW_GATEWAY_PATH") {
            self.path = path;
        }
        if let Some(raw) = lookup("FOGW_POLL_INTERVAL_SECONDS") {
            self.poll_interval = parse_env("FOGW_POLL_INTERVAL_SECONDS", &raw)?;
        }
        if let Some(raw) = lookup("FOGW_TIMEOUT_SECONDS") {
            self.timeout = parse_env("FOGW_TIMEOUT_SECONDS", &raw)?;
        }
        if let Some(raw) = lookup("FOGW_MAX_CONSECUTIVE_FAILURES") {
            self.max_consecutive_failures = parse_env("FOGW_MAX_CONSECUTIVE_FAILURES", &raw)?;
        }
        if let Some(raw) = lookup("FOGW_UNIT_SYSTEM") {
            self.unit_system = raw
                .parse()
                .map_err(|err: String| anyhow::anyhow!(err))
                .context("invalid FOGW_UNIT_SYSTEM")?;
        }
        if let Some(path) = lookup("FOGW_FIELD_TABLE") {
            self.field_table = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup("FOGW_CHANNEL_CAPACITY") {
            self.channel_capacity = parse_env("FOGW_CHANNEL_CAPACITY", &raw)?;
        }
        Ok(())
    }

    pub fn endpoint(&self) -> Result<GatewayEndpoint> {
        let (host, port_in_host) = normalize_host(&self.host);
        if host.is_empty() {
            bail!("gateway host is required");
        }
        let port = port_in_host.unwrap_or(self.port);
        if port == 0 {
            bail!("gateway port must be non-zero");
        }

        let poll_interval = positive_seconds("poll_interval", self.poll_interval)?;
        let timeout = positive_seconds("timeout", self.timeout)?;
        if timeout >= poll_interval {
            tracing::warn!(
                timeout_s = self.timeout,
                poll_interval_s = self.poll_interval,
                "request timeout is not shorter than the poll interval; slow polls will delay the schedule"
            );
        }

        let path = self.path.trim();
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        Ok(GatewayEndpoint {
            host,
            port,
            path,
            timeout,
            poll_interval,
        })
    }

    pub fn load_field_table(&self) -> Result<FieldTable> {
        match &self.field_table {
            Some(path) => FieldTable::load(path),
            None => Ok(FieldTable::builtin()),
        }
    }
}

/// Accepts `192.168.0.2`, `http://192.168.0.2/`, `gw.local:8080` or `[fe80::1]:80`.
fn normalize_host(raw: &str) -> (String, Option<u16>) {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.split('/').next().unwrap_or_default();

    if let Some(rest) = trimmed.strip_prefix('[') {
        let Some((host, after)) = rest.split_once(']') else {
            return (trimmed.to_string(), None);
        };
        let port = after.strip_prefix(':').and_then(|p| p.parse::<u16>().ok());
        return (host.to_string(), port);
    }

    match trimmed.split_once(':') {
        Some((host, port)) if !port.contains(':') => match port.parse::<u16>() {
            Ok(port) => (host.to_string(), Some(port)),
            Err(_) => (trimmed.to_string(), None),
        },
        _ => (trimmed.to_string(), None),
    }
}

fn positive_seconds(name: &str, value: f64) -> Result<Duration> {
    if !value.is_finite() || value <= 0.0 {
        bail!("{name} must be a positive number of seconds (got {value})");
    }
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("{name} of {value} seconds is out of range"))
}

fn parse_env<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("invalid {key}"))
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_the_livedata_endpoint() -> Result<()> {
        let endpoint = Config::default().endpoint()?;
        assert_eq!(endpoint.url(), "http://192.168.0.2:80/get_livedata_info");
        assert_eq!(endpoint.poll_interval, Duration::from_secs(30));
        assert_eq!(endpoint.timeout, Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn env_overrides_file_values() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(
            file,
            r#"{{"host": "gw.local", "poll_interval": 16, "unit_system": "us"}}"#
        )?;
        let mut config = Config::from_file(file.path())?;
        assert_eq!(config.host, "gw.local");
        assert_eq!(config.unit_system, UnitSystem::Us);
        assert_eq!(config.max_consecutive_failures, DEFAULT_MAX_CONSECUTIVE_FAILURES);

        config.apply_env_with(lookup(&[
            ("FOGW_POLL_INTERVAL_SECONDS", "2.5"),
            ("FOGW_UNIT_SYSTEM", "metric"),
            ("FOGW_MAX_CONSECUTIVE_FAILURES", "3"),
        ]))?;
        assert_eq!(config.poll_interval, 2.5);
        assert_eq!(config.unit_system, UnitSystem::Metric);
        assert_eq!(config.max_consecutive_failures, 3);
        assert_eq!(config.endpoint()?.poll_interval, Duration::from_millis(2500));
        Ok(())
    }

    #[test]
    fn rejects_bad_env_values() {
        let mut config = Config::default();
        let err = config
            .apply_env_with(lookup(&[("FOGW_GATEWAY_PORT", "eighty")]))
            .unwrap_err();
        assert!(err.to_string().contains("FOGW_GATEWAY_PORT"));

        let err = config
            .apply_env_with(lookup(&[("FOGW_UNIT_SYSTEM", "kelvin")]))
            .unwrap_err();
        assert!(err.to_string().contains("FOGW_UNIT_SYSTEM"));
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        let parsed: Result<Config, _> = serde_json::from_str(r#"{"gateway_hots": "x"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn accepts_the_host_driver_section() -> Result<()> {
        let config: Config = serde_json::from_str(
            r#"{"gateway_host": "192.168.1.40", "driver": "user.fogw", "poll_interval": 16}"#,
        )?;
        assert_eq!(config.host, "192.168.1.40");
        assert_eq!(config.driver.as_deref(), Some("user.fogw"));
        assert_eq!(
            config.endpoint()?.url(),
            "http://192.168.1.40:80/get_livedata_info"
        );
        Ok(())
    }

    #[test]
    fn host_may_carry_scheme_and_port() -> Result<()> {
        let config = Config {
            host: "http://gw.local:8080/".to_string(),
            path: "get_livedata_info".to_string(),
            ..Config::default()
        };
        let endpoint = config.endpoint()?;
        assert_eq!(endpoint.host, "gw.local");
        assert_eq!(endpoint.port, 8080);
        assert_eq!(endpoint.url(), "http://gw.local:8080/get_livedata_info");

        let config = Config {
            host: "[fe80::1]:81".to_string(),
            ..Config::default()
        };
        assert_eq!(
            config.endpoint()?.url(),
            "http://[fe80::1]:81/get_livedata_info"
        );
        Ok(())
    }

    #[test]
    fn rejects_non_positive_durations() {
        for (poll_interval, timeout) in [
            (0.0, 1.0),
            (-5.0, 1.0),
            (10.0, 0.0),
            (f64::NAN, 1.0),
            (1e30, 1.0),
            (10.0, 1e30),
            (f64::MAX, f64::MAX),
        ] {
            let config = Config {
                poll_interval,
                timeout,
                ..Config::default()
            };
            assert!(config.endpoint().is_err(), "{poll_interval}/{timeout}");
        }
        let config = Config {
            host: "  ".to_string(),
            ..Config::default()
        };
        assert!(config.endpoint().is_err());
    }
}
