use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::route::DEFAULT_DEADLINE_HOURS;
use crate::editor::APPROVER_SEARCH_LIMIT;

/// Probed in order when no explicit path is given.
const CONFIG_CANDIDATES: [&str; 2] = ["docflow.toml", "config/docflow.toml"];

/// Environment variables layered over the file, keyed by the dotted field
/// they set. When several names map to one field the first set one wins.
pub const ENV_OVERRIDES: [(&str, &[&str]); 8] = [
    ("api.base_url", &["DOCFLOW_API_BASE_URL"]),
    ("api.timeout_secs", &["DOCFLOW_API_TIMEOUT_SECS"]),
    ("auth.token", &["DOCFLOW_AUTH_TOKEN"]),
    ("auth.token_file", &["DOCFLOW_AUTH_TOKEN_FILE"]),
    ("approvals.default_deadline_hours", &["DOCFLOW_APPROVALS_DEFAULT_DEADLINE_HOURS"]),
    ("approvals.approver_search_limit", &["DOCFLOW_APPROVALS_SEARCH_LIMIT"]),
    ("logging.level", &["DOCFLOW_LOGGING_LEVEL", "DOCFLOW_LOG_LEVEL"]),
    ("logging.format", &["DOCFLOW_LOGGING_FORMAT", "DOCFLOW_LOG_FORMAT"]),
];

/// Effective settings: defaults, then the TOML file, then `DOCFLOW_*`
/// variables, then explicit command-line overrides.
#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub approvals: ApprovalsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { base_url: "http://localhost:8000/api".to_owned(), timeout_secs: 30 }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    pub token: Option<SecretString>,
    pub token_file: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ApprovalsConfig {
    pub default_deadline_hours: u32,
    pub approver_search_limit: usize,
}

impl Default for ApprovalsConfig {
    fn default() -> Self {
        Self {
            default_deadline_hours: DEFAULT_DEADLINE_HOURS,
            approver_search_limit: APPROVER_SEARCH_LIMIT,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_owned(), format: LogFormat::Compact }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::Validation(format!(
                "logging.format `{normalized}` is not one of compact|pretty|json"
            ))),
        }
    }
}

/// Values supplied on the command line. They beat every other layer.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub api_base_url: Option<String>,
    pub auth_token: Option<String>,
    pub auth_token_file: Option<PathBuf>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("`{path}` is not valid TOML: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("config file `{0}` does not exist")]
    MissingConfigFile(PathBuf),
    #[error("`${{{var}}}` is referenced in the config file but not set")]
    MissingEnvInterpolation { var: String },
    #[error("`${{` in the config file has no closing brace")]
    UnterminatedInterpolation,
    #[error("{key}={value} cannot be used as an override")]
    InvalidEnvOverride { key: String, value: String },
    #[error("failed to read token file `{path}`: {source}")]
    ReadTokenFile { path: PathBuf, source: std::io::Error },
    #[error("no access token configured; set auth.token, auth.token_file or DOCFLOW_AUTH_TOKEN")]
    MissingToken,
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl AuthConfig {
    /// Returns the inline token when it is non-blank, otherwise the trimmed
    /// contents of `token_file`.
    pub fn resolve_token(&self) -> Result<SecretString, ConfigError> {
        let inline = self.token.as_ref().filter(|token| !token.expose_secret().trim().is_empty());
        if let Some(token) = inline {
            return Ok(token.clone());
        }

        let Some(path) = self.token_file.as_deref() else {
            return Err(ConfigError::MissingToken);
        };
        let contents = fs::read_to_string(path)
            .map_err(|source| ConfigError::ReadTokenFile { path: path.to_path_buf(), source })?;
        match contents.trim() {
            "" => Err(ConfigError::MissingToken),
            token => Ok(SecretString::from(token.to_owned())),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let LoadOptions { config_path, require_file, overrides } = options;

        let mut config = match locate_file(config_path.as_deref()) {
            Some(path) => FileLayer::read(&path)?.into_config(),
            None if require_file => {
                let wanted = config_path.unwrap_or_else(|| PathBuf::from(CONFIG_CANDIDATES[0]));
                return Err(ConfigError::MissingConfigFile(wanted));
            }
            None => Self::default(),
        };

        for (field, names) in ENV_OVERRIDES {
            let found = names
                .iter()
                .find_map(|name| non_blank_env(name).map(|value| (*name, value)));
            if let Some((name, value)) = found {
                config.set_field(field, name, value)?;
            }
        }

        config.apply_cli(overrides);
        config.validate()?;
        Ok(config)
    }

    fn set_field(&mut self, field: &str, source: &str, value: String) -> Result<(), ConfigError> {
        match field {
            "api.base_url" => self.api.base_url = value,
            "api.timeout_secs" => self.api.timeout_secs = parse_override(source, &value)?,
            "auth.token" => self.auth.token = Some(SecretString::from(value)),
            "auth.token_file" => self.auth.token_file = Some(PathBuf::from(value)),
            "approvals.default_deadline_hours" => {
                self.approvals.default_deadline_hours = parse_override(source, &value)?
            }
            "approvals.approver_search_limit" => {
                self.approvals.approver_search_limit = parse_override(source, &value)?
            }
            "logging.level" => self.logging.level = value,
            "logging.format" => self.logging.format = value.parse()?,
            other => return Err(ConfigError::Validation(format!("unknown setting `{other}`"))),
        }
        Ok(())
    }

    fn apply_cli(&mut self, overrides: ConfigOverrides) {
        let ConfigOverrides { api_base_url, auth_token, auth_token_file, log_level } = overrides;
        if let Some(url) = api_base_url {
            self.api.base_url = url;
        }
        if let Some(token) = auth_token {
            self.auth.token = Some(SecretString::from(token));
        }
        if auth_token_file.is_some() {
            self.auth.token_file = auth_token_file;
        }
        if let Some(level) = log_level {
            self.logging.level = level;
        }
    }

    /// Reports the first failing rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.api.base_url.trim();
        let level = self.logging.level.trim().to_ascii_lowercase();
        let rules = [
            (
                base_url.starts_with("http://") || base_url.starts_with("https://"),
                "api.base_url must start with http:// or https://",
            ),
            ((1..=300).contains(&self.api.timeout_secs), "api.timeout_secs must be in range 1..=300"),
            (
                self.approvals.default_deadline_hours > 0,
                "approvals.default_deadline_hours must be greater than zero",
            ),
            (
                (1..=50).contains(&self.approvals.approver_search_limit),
                "approvals.approver_search_limit must be in range 1..=50",
            ),
            (
                matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error"),
                "logging.level must be one of trace|debug|info|warn|error",
            ),
        ];

        match rules.iter().find(|(passed, _)| !passed) {
            Some((_, message)) => Err(ConfigError::Validation((*message).to_owned())),
            None => Ok(()),
        }
    }
}

/// Shape of the TOML file. Missing keys keep their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileLayer {
    api: ApiConfig,
    auth: FileAuth,
    approvals: ApprovalsConfig,
    logging: LoggingConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileAuth {
    token: Option<String>,
    token_file: Option<PathBuf>,
}

impl FileLayer {
    fn read(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
        let expanded = expand_env_references(&raw)?;
        toml::from_str(&expanded)
            .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
    }

    fn into_config(self) -> AppConfig {
        AppConfig {
            api: self.api,
            auth: AuthConfig {
                token: self.auth.token.map(SecretString::from),
                token_file: self.auth.token_file,
            },
            approvals: self.approvals,
            logging: self.logging,
        }
    }
}

/// The file `AppConfig::load` would read, if any.
pub fn locate_file(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => path.exists().then(|| path.to_path_buf()),
        None => CONFIG_CANDIDATES.into_iter().map(PathBuf::from).find(|path| path.exists()),
    }
}

/// Replaces every `${NAME}` with the value of that environment variable.
fn expand_env_references(raw: &str) -> Result<String, ConfigError> {
    let mut expanded = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(open) = rest.find("${") {
        expanded.push_str(&rest[..open]);
        let tail = &rest[open + 2..];
        let close = tail.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let name = &tail[..close];
        let value = env::var(name)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: name.to_owned() })?;
        expanded.push_str(&value);
        rest = &tail[close + 1..];
    }

    expanded.push_str(rest);
    Ok(expanded)
}

fn non_blank_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_override<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::error::Error;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, ENV_OVERRIDES};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const INTERPOLATED_VAR: &str = "TEST_DOCFLOW_TOKEN";

    /// Serializes access to the process environment and leaves no
    /// `DOCFLOW_*` variable behind.
    struct EnvScope {
        _lock: MutexGuard<'static, ()>,
    }

    impl EnvScope {
        fn new() -> Self {
            let lock = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
            clear_env();
            Self { _lock: lock }
        }

        fn set(&self, key: &str, value: &str) -> &Self {
            env::set_var(key, value);
            self
        }
    }

    impl Drop for EnvScope {
        fn drop(&mut self) {
            clear_env();
        }
    }

    fn clear_env() {
        for (_, names) in ENV_OVERRIDES {
            names.iter().for_each(|name| env::remove_var(name));
        }
        env::remove_var(INTERPOLATED_VAR);
    }

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> Result<PathBuf, Box<dyn Error>> {
        let path = dir.path().join(name);
        fs::write(&path, contents)?;
        Ok(path)
    }

    #[test]
    fn defaults_apply_without_file_or_env() -> Result<(), Box<dyn Error>> {
        let _env = EnvScope::new();

        let config = AppConfig::load(LoadOptions::default())?;

        assert_eq!(config.api.base_url, "http://localhost:8000/api");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(matches!(config.auth.resolve_token(), Err(ConfigError::MissingToken)));
        Ok(())
    }

    #[test]
    fn file_values_expand_environment_references() -> Result<(), Box<dyn Error>> {
        let scope = EnvScope::new();
        scope.set(INTERPOLATED_VAR, "header.payload.signature");
        let dir = TempDir::new()?;
        let path = write_file(
            &dir,
            "docflow.toml",
            "[api]\nbase_url = \"https://docs.corp.example/api\"\n\n[auth]\ntoken = \"${TEST_DOCFLOW_TOKEN}\"\n",
        )?;

        let config = AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })?;

        assert_eq!(config.api.base_url, "https://docs.corp.example/api");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.auth.resolve_token()?.expose_secret(), "header.payload.signature");
        Ok(())
    }

    #[test]
    fn unset_or_unterminated_references_fail() -> Result<(), Box<dyn Error>> {
        let _env = EnvScope::new();
        let dir = TempDir::new()?;

        let unset = write_file(&dir, "unset.toml", "[auth]\ntoken = \"${TEST_DOCFLOW_TOKEN}\"\n")?;
        let error = AppConfig::load(LoadOptions { config_path: Some(unset), ..LoadOptions::default() })
            .err();
        assert!(matches!(
            error,
            Some(ConfigError::MissingEnvInterpolation { ref var }) if var == "TEST_DOCFLOW_TOKEN"
        ));

        let open = write_file(&dir, "open.toml", "[auth]\ntoken = \"${TEST_DOCFLOW\"\n")?;
        let error = AppConfig::load(LoadOptions { config_path: Some(open), ..LoadOptions::default() })
            .err();
        assert!(matches!(error, Some(ConfigError::UnterminatedInterpolation)));
        Ok(())
    }

    #[test]
    fn required_file_must_exist() -> Result<(), Box<dyn Error>> {
        let _env = EnvScope::new();
        let dir = TempDir::new()?;
        let missing = dir.path().join("absent.toml");

        let error = AppConfig::load(LoadOptions {
            config_path: Some(missing.clone()),
            require_file: true,
            ..LoadOptions::default()
        })
        .err();

        assert!(matches!(error, Some(ConfigError::MissingConfigFile(ref path)) if *path == missing));
        Ok(())
    }

    #[test]
    fn layers_apply_file_then_env_then_cli() -> Result<(), Box<dyn Error>> {
        let scope = EnvScope::new();
        scope.set("DOCFLOW_API_BASE_URL", "https://from-env.example/api")
            .set("DOCFLOW_APPROVALS_DEFAULT_DEADLINE_HOURS", "72");
        let dir = TempDir::new()?;
        let path = write_file(
            &dir,
            "docflow.toml",
            r#"
[api]
base_url = "https://from-file.example/api"
timeout_secs = 10

[approvals]
default_deadline_hours = 24
approver_search_limit = 5

[logging]
level = "warn"
"#,
        )?;

        let config = AppConfig::load(LoadOptions {
            config_path: Some(path),
            overrides: ConfigOverrides {
                api_base_url: Some("https://from-cli.example/api".to_owned()),
                log_level: Some("debug".to_owned()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })?;

        assert_eq!(config.api.base_url, "https://from-cli.example/api");
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.approvals.default_deadline_hours, 72);
        assert_eq!(config.approvals.approver_search_limit, 5);
        assert_eq!(config.logging.level, "debug");
        Ok(())
    }

    #[test]
    fn short_logging_aliases_are_read() -> Result<(), Box<dyn Error>> {
        let scope = EnvScope::new();
        scope.set("DOCFLOW_LOG_LEVEL", "warn").set("DOCFLOW_LOG_FORMAT", "Pretty");

        let config = AppConfig::load(LoadOptions::default())?;

        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        Ok(())
    }

    #[test]
    fn malformed_numeric_override_names_the_variable() {
        let scope = EnvScope::new();
        scope.set("DOCFLOW_API_TIMEOUT_SECS", "soon");

        let error = AppConfig::load(LoadOptions::default()).err();

        assert!(matches!(
            error,
            Some(ConfigError::InvalidEnvOverride { ref key, ref value })
                if key == "DOCFLOW_API_TIMEOUT_SECS" && value == "soon"
        ));
    }

    #[test]
    fn base_url_without_scheme_is_rejected() {
        let scope = EnvScope::new();
        scope.set("DOCFLOW_API_BASE_URL", "docs.corp.example");

        let error = AppConfig::load(LoadOptions::default()).err();

        assert!(matches!(
            error,
            Some(ConfigError::Validation(ref message)) if message.contains("api.base_url")
        ));
    }

    #[test]
    fn token_file_contents_are_trimmed() -> Result<(), Box<dyn Error>> {
        let _env = EnvScope::new();
        let dir = TempDir::new()?;
        let token_path = write_file(&dir, "token", "  a.b.c\n")?;

        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                auth_token_file: Some(token_path),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })?;

        assert_eq!(config.auth.resolve_token()?.expose_secret(), "a.b.c");
        Ok(())
    }

    #[test]
    fn debug_output_hides_the_token() -> Result<(), Box<dyn Error>> {
        let scope = EnvScope::new();
        scope.set("DOCFLOW_AUTH_TOKEN", "secret-token-value");

        let config = AppConfig::load(LoadOptions::default())?;

        assert!(!format!("{config:?}").contains("secret-token-value"));
        assert_eq!(config.auth.resolve_token()?.expose_secret(), "secret-token-value");
        Ok(())
    }
}
