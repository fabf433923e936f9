//! Configuration for the X-Ray client
//!
//! Configuration is assembled in layers:
//!
//! 1. the embedded defaults (`pmoxray.yaml`)
//! 2. an optional YAML file, looked up as an explicit path, then
//!    `$PMOXRAY_CONFIG`, then `.pmoxray/config.yaml` in the current
//!    directory, then `~/.pmoxray/config.yaml`
//! 3. environment overrides: `PMOXRAY_CONFIG__AUTH__TOKEN=...` sets
//!    `auth.token`
//!
//! # Example
//!
//! ```no_run
//! use pmoxray::XrayConfig;
//!
//! # fn main() -> pmoxray::Result<()> {
//! let config = XrayConfig::from_yaml_str(
//!     r#"
//! endpoint: https://xray.example.com/xray
//! auth:
//!   mode: query_token
//!   token: BQBH98uX
//! "#,
//! )?;
//! assert_eq!(config.carousel.interval_ms, 8000);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};
use tracing::info;
use url::Url;

const DEFAULT_CONFIG: &str = include_str!("pmoxray.yaml");

/// Environment variable naming the configuration file
pub const ENV_CONFIG_PATH: &str = "PMOXRAY_CONFIG";

/// Prefix of environment overrides (`__` separates path segments)
pub const ENV_PREFIX: &str = "PMOXRAY_CONFIG__";

const CONFIG_DIR_NAME: &str = ".pmoxray";
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Leaves whose environment override is always taken verbatim
const STRING_KEYS: &[&str] = &[
    "endpoint",
    "login_url",
    "name",
    "value",
    "param",
    "token",
    "user_agent",
    "placeholder",
];

/// Default cookie carrying the access token
pub const DEFAULT_COOKIE_NAME: &str = "access_token";

/// Default query parameter carrying the access token
pub const DEFAULT_TOKEN_PARAM: &str = "access_token";

/// Top-level configuration block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XrayConfig {
    /// Absolute URL of the event stream
    #[serde(default = "XrayConfig::default_endpoint")]
    pub endpoint: String,
    /// Where the user is sent when the stream reports 401
    #[serde(default = "XrayConfig::default_login_url")]
    pub login_url: String,
    #[serde(default)]
    pub auth: AuthMode,
    #[serde(default)]
    pub carousel: CarouselConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

impl XrayConfig {
    fn default_endpoint() -> String {
        "http://127.0.0.1:5173/xray".to_string()
    }

    fn default_login_url() -> String {
        "/authorize".to_string()
    }

    /// Load the layered configuration
    ///
    /// An explicit `path` must exist; the implicit locations are skipped
    /// when absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        match Self::find_config_file(path) {
            Some(file) => {
                let data = fs::read(&file)?;
                info!(config_file=%file.display(), "Loaded config file");
                let external: Value = serde_yaml::from_slice(&data)?;
                merge_yaml(&mut value, external);
            }
            None => info!("Config file not found, using default embedded config"),
        }

        apply_env_overrides(&mut value, env::vars());
        Self::from_value(value)
    }

    /// Parse a YAML document layered over the embedded defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        let external: Value = serde_yaml::from_str(yaml)?;
        merge_yaml(&mut value, external);
        Self::from_value(value)
    }

    fn from_value(value: Value) -> Result<Self> {
        let config: Self = serde_yaml::from_value(lower_keys(value))?;
        config.validate()?;
        Ok(config)
    }

    fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_PATH) {
            info!(env_var = ENV_CONFIG_PATH, path=%env_path, "Trying to load config from env");
            return Some(PathBuf::from(env_path));
        }

        let local = Path::new(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }

        dirs::home_dir()
            .map(|home| home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        let endpoint = Url::parse(&self.endpoint)?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "endpoint must be http(s), got {}",
                endpoint.scheme()
            )));
        }

        if self.carousel.interval_ms == 0 {
            return Err(Error::config("carousel.interval_ms must be positive"));
        }

        match &self.auth {
            AuthMode::Cookie { name, .. } if name.is_empty() => {
                Err(Error::config("auth.name must not be empty"))
            }
            AuthMode::QueryToken { param, .. } if param.is_empty() => {
                Err(Error::config("auth.param must not be empty"))
            }
            _ => Ok(()),
        }
    }
}

impl Default for XrayConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            login_url: Self::default_login_url(),
            auth: AuthMode::default(),
            carousel: CarouselConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

/// How the access token reaches the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthMode {
    /// No credentials are sent
    Anonymous,
    /// `Cookie: <name>=<value>`
    Cookie {
        #[serde(
            default = "AuthMode::default_cookie_name",
            deserialize_with = "scalar_string"
        )]
        name: String,
        #[serde(default, deserialize_with = "scalar_string")]
        value: String,
    },
    /// `?<param>=<token>` appended to the endpoint
    QueryToken {
        #[serde(
            default = "AuthMode::default_token_param",
            deserialize_with = "scalar_string"
        )]
        param: String,
        #[serde(default, deserialize_with = "scalar_string")]
        token: String,
    },
}

impl AuthMode {
    fn default_cookie_name() -> String {
        DEFAULT_COOKIE_NAME.to_string()
    }

    fn default_token_param() -> String {
        DEFAULT_TOKEN_PARAM.to_string()
    }

    /// Session cookie with the default name
    pub fn cookie(value: impl Into<String>) -> Self {
        Self::Cookie {
            name: Self::default_cookie_name(),
            value: value.into(),
        }
    }

    /// Query-string token with the default parameter name
    pub fn query_token(token: impl Into<String>) -> Self {
        Self::QueryToken {
            param: Self::default_token_param(),
            token: token.into(),
        }
    }

    /// Whether a credential is actually configured
    pub fn has_credentials(&self) -> bool {
        match self {
            Self::Anonymous => false,
            Self::Cookie { value, .. } => !value.is_empty(),
            Self::QueryToken { token, .. } => !token.is_empty(),
        }
    }

    /// Build the request URL for `endpoint`
    pub fn request_url(&self, endpoint: &str) -> Result<Url> {
        let mut url = Url::parse(endpoint)?;
        if let Self::QueryToken { param, token } = self {
            if !token.is_empty() {
                url.query_pairs_mut().append_pair(param, token);
            }
        }
        Ok(url)
    }

    /// `Cookie` header value, if this mode sends one
    pub fn cookie_header(&self) -> Option<String> {
        match self {
            Self::Cookie { name, value } if !value.is_empty() => Some(format!("{name}={value}")),
            _ => None,
        }
    }
}

impl Default for AuthMode {
    fn default() -> Self {
        Self::cookie("")
    }
}

/// Fact carousel tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarouselConfig {
    #[serde(default = "CarouselConfig::default_interval")]
    pub interval_ms: u64,
    /// Text shown when a song has no facts (the slot is cleared otherwise)
    #[serde(default)]
    pub placeholder: Option<String>,
}

impl CarouselConfig {
    const fn default_interval() -> u64 {
        8000
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            interval_ms: Self::default_interval(),
            placeholder: None,
        }
    }
}

/// Connection tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "TransportConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "TransportConfig::default_user_agent")]
    pub user_agent: String,
    /// Reconnect when the stream ends or fails
    #[serde(default = "TransportConfig::default_reconnect")]
    pub reconnect: bool,
    /// Delay before reconnecting, until the server sends `retry:`
    #[serde(default = "TransportConfig::default_retry")]
    pub retry_ms: u64,
}

impl TransportConfig {
    const fn default_connect_timeout() -> u64 {
        30
    }

    fn default_user_agent() -> String {
        "pmoxray/0.1.0".to_string()
    }

    const fn default_reconnect() -> bool {
        true
    }

    const fn default_retry() -> u64 {
        3000
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn retry(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: Self::default_connect_timeout(),
            user_agent: Self::default_user_agent(),
            reconnect: Self::default_reconnect(),
            retry_ms: Self::default_retry(),
        }
    }
}

/// Accept any YAML scalar as a string: an unquoted `token: 12345` is a
/// credential, not a number
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string, found {:?}",
            other
        ))),
    }
}

/// Recursively overlay `overlay` onto `base`
fn merge_yaml(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn apply_env_overrides(config: &mut Value, vars: impl IntoIterator<Item = (String, String)>) {
    for (key, value) in vars {
        if let Some(path) = key.strip_prefix(ENV_PREFIX) {
            let path: Vec<String> = path.split("__").map(str::to_lowercase).collect();
            let value = match path.last() {
                Some(leaf) if STRING_KEYS.contains(&leaf.as_str()) => Value::String(value),
                _ => convert_env_value(&value),
            };
            set_value(config, &path, value);
        }
    }
}

fn set_value(data: &mut Value, path: &[String], value: Value) {
    let Some((key, rest)) = path.split_first() else {
        *data = value;
        return;
    };

    if !data.is_mapping() {
        *data = Value::Mapping(Mapping::new());
    }

    if let Value::Mapping(map) = data {
        let entry = map
            .entry(Value::String(key.clone()))
            .or_insert(Value::Mapping(Mapping::new()));
        set_value(entry, rest, value);
    }
}

fn convert_env_value(value: &str) -> Value {
    serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

fn lower_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| {
                    let key = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    (key, lower_keys(v))
                })
                .collect(),
        ),
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults() {
        let config = XrayConfig::from_yaml_str("{}").unwrap();

        assert_eq!(config, XrayConfig::default());
        assert_eq!(config.carousel.interval(), Duration::from_millis(8000));
        assert_eq!(config.transport.retry(), Duration::from_millis(3000));
        assert!(config.transport.reconnect);
        assert!(!config.auth.has_credentials());
    }

    #[test]
    fn test_query_token_mode() {
        let config = XrayConfig::from_yaml_str(
            "endpoint: http://127.0.0.1:5173/xray\nauth:\n  mode: query_token\n  token: abc123\n",
        )
        .unwrap();

        assert_eq!(config.auth, AuthMode::query_token("abc123"));
        let url = config.auth.request_url(&config.endpoint).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:5173/xray?access_token=abc123");
        assert!(config.auth.cookie_header().is_none());
    }

    #[test]
    fn test_cookie_mode() {
        let auth = AuthMode::Cookie {
            name: "SESSIONID".to_string(),
            value: "s3cr3t".to_string(),
        };

        assert_eq!(auth.cookie_header().as_deref(), Some("SESSIONID=s3cr3t"));
        let url = auth.request_url("https://example.com/xray").unwrap();
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_anonymous_mode() {
        let config = XrayConfig::from_yaml_str("auth:\n  mode: anonymous\n").unwrap();
        assert_eq!(config.auth, AuthMode::Anonymous);
        assert!(config.auth.cookie_header().is_none());
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config =
            XrayConfig::from_yaml_str("carousel:\n  placeholder: No facts yet\n").unwrap();

        assert_eq!(config.carousel.interval_ms, 8000);
        assert_eq!(config.carousel.placeholder.as_deref(), Some("No facts yet"));
    }

    #[test]
    fn test_env_overrides() {
        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG).unwrap();
        apply_env_overrides(
            &mut value,
            vec![
                ("PMOXRAY_CONFIG__CAROUSEL__INTERVAL_MS".to_string(), "2500".to_string()),
                ("PMOXRAY_CONFIG__AUTH__VALUE".to_string(), "tok".to_string()),
                ("UNRELATED".to_string(), "1".to_string()),
            ],
        );
        let config = XrayConfig::from_value(value).unwrap();

        assert_eq!(config.carousel.interval_ms, 2500);
        assert_eq!(config.auth, AuthMode::cookie("tok"));
    }

    #[test]
    fn test_env_override_tokens_stay_strings() {
        for token in ["12345", "true", "null", "1e3", "007"] {
            let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG).unwrap();
            apply_env_overrides(
                &mut value,
                vec![("PMOXRAY_CONFIG__AUTH__VALUE".to_string(), token.to_string())],
            );
            let config = XrayConfig::from_value(value).unwrap();

            assert_eq!(config.auth, AuthMode::cookie(token));
            assert!(config.auth.has_credentials());
        }
    }

    #[test]
    fn test_unquoted_numeric_token_in_file() {
        let config =
            XrayConfig::from_yaml_str("auth:\n  mode: query_token\n  token: 12345\n").unwrap();
        assert_eq!(config.auth, AuthMode::query_token("12345"));

        assert!(XrayConfig::from_yaml_str("auth:\n  mode: cookie\n  value: [1, 2]\n").is_err());
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            XrayConfig::from_yaml_str("carousel:\n  interval_ms: 0\n"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            XrayConfig::from_yaml_str("endpoint: /xray\n"),
            Err(Error::InvalidUrl(_))
        ));
        assert!(matches!(
            XrayConfig::from_yaml_str("endpoint: ftp://example.com/xray\n"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = XrayConfig::load(Some(Path::new("/nonexistent/pmoxray.yaml")));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
