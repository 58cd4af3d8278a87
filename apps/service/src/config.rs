use std::{env, fmt, fs, io, path, time::Duration};

use serde::{Deserialize, Serialize};
use sitewatch::Target;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: io::Error },
    #[error("failed to write {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: io::Error },
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config path given and neither XDG_CONFIG_HOME nor HOME is set")]
    ConfigPathUnavailable,
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub checker: CheckerConfig,
    pub alert: AlertConfig,
    pub redis: RedisConfig,
    pub notifier: NotifierConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub workers: usize,
    /// Base URL of the target registry; `GET {api_url}/sites` lists the targets
    pub api_url: Option<String>,
    /// Used when no `api_url` is configured
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub cooldown_minutes: u64,
    pub reminders: bool,
    pub shards: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    pub stream: String,
    pub group: String,
    /// Consumer name inside the group, generated per process when unset
    pub consumer: Option<String>,
    /// Approximate upper bound on the stream length
    pub stream_max_len: Option<usize>,
    pub block_ms: usize,
    pub state_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NotifierConfig {
    Telegram {
        bot_token: String,
        chat_id: String,
        #[serde(default = "default_telegram_api")]
        api_base: String,
    },
    Webhook {
        url: String,
    },
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub bind: String,
}

pub fn default_telegram_api() -> String {
    "https://api.telegram.org".into()
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            timeout_secs: 10,
            workers: sitewatch::monitoring::DEFAULT_WORKERS,
            api_url: None,
            targets: Vec::new(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_minutes: sitewatch::alert::DEFAULT_COOLDOWN_MINUTES as u64,
            reminders: true,
            shards: 1,
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".into(),
            stream: "site-checks".into(),
            group: "alert".into(),
            consumer: None,
            stream_max_len: Some(100_000),
            block_ms: 2_000,
            state_ttl_secs: None,
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self::Log
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { enabled: true, bind: "0.0.0.0:9090".into() }
    }
}

impl CheckerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AlertConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_minutes.saturating_mul(60))
    }
}

impl RedisConfig {
    pub fn consumer_name(&self) -> String {
        self.consumer.clone().unwrap_or_else(|| format!("sitewatch-{}", uuid::Uuid::new_v4()))
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/sitewatch/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("sitewatch/config.toml"))
}

/// Hide everything but the edges of a secret
fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "***".into();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{head}***{tail}")
}

/// Replace the password of a URL, if any
pub fn mask_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        Err(_) => raw.to_string(),
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Checker")?;
        write_1(f, "Interval (s)", &self.checker.interval_secs)?;
        write_1(f, "Timeout (s)", &self.checker.timeout_secs)?;
        write_1(f, "Workers", &self.checker.workers)?;
        match &self.checker.api_url {
            Some(api_url) => write_1(f, "Target API", api_url)?,
            None => write_1(f, "Static targets", &self.checker.targets.len())?,
        }

        write_title_1(f, "Alert")?;
        write_1(f, "Cooldown (min)", &self.alert.cooldown_minutes)?;
        write_1(f, "Reminders", &self.alert.reminders)?;
        write_1(f, "Shards", &self.alert.shards)?;

        write_title_1(f, "Redis")?;
        write_1(f, "URL", &mask_url(&self.redis.url))?;
        write_1(f, "Stream", &self.redis.stream)?;
        write_1(f, "Group", &self.redis.group)?;

        write_title_1(f, "Notifier")?;
        match &self.notifier {
            NotifierConfig::Telegram { bot_token, chat_id, api_base } => {
                write_1(f, "Kind", &"telegram")?;
                write_1(f, "API", api_base)?;
                write_1(f, "Bot token", &mask(bot_token))?;
                write_1(f, "Chat", chat_id)?;
            }
            NotifierConfig::Webhook { url } => {
                write_1(f, "Kind", &"webhook")?;
                write_1(f, "URL", &mask_url(url))?;
            }
            NotifierConfig::Log => write_1(f, "Kind", &"log")?,
        }

        write_title_1(f, "Server")?;
        write_1(f, "Enabled", &self.server.enabled)?;
        write_1(f, "Bind Address", &self.server.bind)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/sitewatch/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
            let config: Self = toml::from_str(raw_string.as_str())?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &std::path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| Error::WriteFailed { path: parent.to_path_buf(), source })?;
        }

        std::fs::write(path, config_str)
            .map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), Error> {
        if self.checker.interval_secs == 0 {
            return Err(Error::Invalid("checker.interval_secs must be greater than 0".into()));
        }
        if self.checker.timeout_secs == 0 {
            return Err(Error::Invalid("checker.timeout_secs must be greater than 0".into()));
        }
        if self.checker.workers == 0 {
            return Err(Error::Invalid("checker.workers must be at least 1".into()));
        }
        if self.alert.shards == 0 {
            return Err(Error::Invalid("alert.shards must be at least 1".into()));
        }
        if let Some(api_url) = &self.checker.api_url {
            url::Url::parse(api_url)
                .map_err(|e| Error::Invalid(format!("checker.api_url is not a URL: {e}")))?;
        }
        if let NotifierConfig::Telegram { bot_token, chat_id, .. } = &self.notifier {
            if bot_token.is_empty() || chat_id.is_empty() {
                return Err(Error::Invalid("telegram notifier needs bot_token and chat_id".into()));
            }
        }
        Ok(())
    }
}
