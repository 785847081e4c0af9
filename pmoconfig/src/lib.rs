//! # PMORadio Configuration Module
//!
//! This module provides configuration management for PMORadio, including:
//! - Loading configuration from YAML (or JSON) files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Type-safe getters and setters for configuration values
//!
//! ## Usage
//!
//! ```no_run
//! use pmoconfig::Config;
//!
//! let config = Config::load_config(Some("radio.yaml"))?;
//!
//! let host = config.get_mpd_host();
//! let port = config.get_mpd_port();
//! for station in config.get_stations() {
//!     println!("{} -> {}", station.name, station.uri);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context, Result, anyhow};
use dirs::home_dir;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing::{info, warn};

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("pmoradio.yaml");

const ENV_CONFIG_FILE: &str = "PMORADIO_CONFIG";
const ENV_PREFIX: &str = "PMORADIO_CONFIG__";

const LOCAL_CONFIG_FILE: &str = "pmoradio.yaml";
const HOME_CONFIG_DIR: &str = ".pmoradio";
const HOME_CONFIG_FILE: &str = "config.yaml";

// Default values for configuration
const DEFAULT_MPD_HOST: &str = "localhost";
const DEFAULT_MPD_PORT: u16 = 6600;
const DEFAULT_MPD_TIMEOUT_SECS: u64 = 5;
const DEFAULT_DEBOUNCE_MS: u64 = 300;
const DEFAULT_HEARTBEAT_SECS: u64 = 300;
const DEFAULT_GRACE_PERIOD_MS: u64 = 500;
const DEFAULT_STATUS_POLLING: bool = true;
const DEFAULT_OFF_SWITCH_MODE: &str = "stop";
const DEFAULT_LOG_MIN_LEVEL: &str = "info";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;

/// Macro to generate getter/setter for u64 values with default
macro_rules! impl_u64_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> u64 {
            match self.get_value($path) {
                Ok(Value::Number(n)) if n.is_u64() => n.as_u64().unwrap_or($default),
                Ok(Value::String(s)) => s.trim().parse().unwrap_or_else(|_| {
                    warn!(path = %$path.join("."), value = %s, "Invalid number, using default {}", $default);
                    $default
                }),
                Ok(Value::Null) | Err(_) => $default,
                Ok(other) => {
                    warn!(path = %$path.join("."), value = ?other, "Not a positive number, using default {}", $default);
                    $default
                }
            }
        }

        pub fn $setter(&self, value: u64) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Macro to generate getter/setter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> bool {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => b,
                _ => $default,
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// One preset as written in the `stations` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationConfig {
    #[serde(deserialize_with = "scalar_as_string")]
    pub name: String,
    #[serde(deserialize_with = "scalar_as_string")]
    pub uri: String,
}

/// Accepts any YAML scalar: `name: 1984` is a station name, not an error.
fn scalar_as_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string, got {:?}",
            other
        ))),
    }
}

/// Logging section of the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// A `tracing_subscriber::EnvFilter` directive (`info`, `pmoradio=debug`...).
    pub min_level: String,
    pub enable_console: bool,
    /// Append-mode log file, if any.
    pub file: Option<PathBuf>,
}

/// Configuration manager for PMORadio
///
/// This structure holds the merged configuration tree:
/// - the embedded default document,
/// - overlaid with the external file if one was found,
/// - overlaid with `PMORADIO_CONFIG__*` environment variables.
///
/// The configuration is loaded once at startup and handed explicitly to
/// whatever needs it.
#[derive(Debug)]
pub struct Config {
    path: Option<PathBuf>,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.snapshot();
        Self {
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    /// Finds the configuration file by trying different locations in order
    ///
    /// `env_path` is the value of `PMORADIO_CONFIG`, `local_dir` the
    /// directory searched for `pmoradio.yaml`.
    fn find_config_file(
        explicit: Option<&Path>,
        env_path: Option<String>,
        local_dir: &Path,
        home: Option<PathBuf>,
    ) -> Option<PathBuf> {
        // 1. Try provided file
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        // 2. Try environment variable
        if let Some(env_path) = env_path.filter(|p| !p.trim().is_empty()) {
            info!(env_var = ENV_CONFIG_FILE, path = %env_path, "Trying to load config from env");
            return Some(PathBuf::from(env_path));
        }

        // 3. Try current directory
        let local = local_dir.join(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }

        // 4. Try home directory
        if let Some(home) = home {
            let home_config = home.join(HOME_CONFIG_DIR).join(HOME_CONFIG_FILE);
            if home_config.exists() {
                return Some(home_config);
            }
        }

        None
    }

    /// Loads the configuration
    ///
    /// The file is searched in the following order:
    /// 1. The provided `path` if any
    /// 2. The `PMORADIO_CONFIG` environment variable
    /// 3. `pmoradio.yaml` in the current directory
    /// 4. `~/.pmoradio/config.yaml`
    ///
    /// When no file is found the embedded defaults are used alone. An
    /// explicitly requested file that cannot be read is an error.
    pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let explicit: Option<&Path> = path.as_ref().map(AsRef::as_ref);
        let config_file = Self::find_config_file(
            explicit,
            env::var(ENV_CONFIG_FILE).ok(),
            Path::new("."),
            home_dir(),
        );

        let external = match &config_file {
            Some(file) => {
                let data = fs::read_to_string(file)
                    .with_context(|| format!("Cannot read config file {}", file.display()))?;
                info!(config_file = %file.display(), "Loaded config file");
                Some(parse_document(file, &data)?)
            }
            None => {
                info!("No config file found, using default embedded config");
                None
            }
        };

        Self::from_value(config_file, external)
    }

    /// Builds a configuration from an in-memory YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let external: Value = serde_yaml::from_str(yaml)?;
        Self::from_value(None, Some(external))
    }

    fn from_value(path: Option<PathBuf>, external: Option<Value>) -> Result<Self> {
        let mut default_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        if let Some(external) = external {
            merge_yaml(&mut default_value, &external);
        }
        let mut config_value = Self::lower_keys_value(default_value);

        // Appliquer les overrides depuis les variables d'environnement
        Self::apply_env_overrides(&mut config_value, env::vars());

        Ok(Config {
            path,
            data: Mutex::new(config_value),
        })
    }

    /// Path of the file the configuration was read from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Saves the current configuration back to the file it was loaded from
    pub fn save(&self) -> Result<()> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| anyhow!("Configuration was not loaded from a file"))?;
        let yaml = serde_yaml::to_string(&self.snapshot())?;
        fs::write(path, yaml)?;
        Ok(())
    }

    fn snapshot(&self) -> Value {
        match self.data.lock() {
            Ok(data) => data.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Sets a configuration value at the specified path
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["radio", "debounce_ms"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self
            .data
            .lock()
            .map_err(|_| anyhow!("Configuration lock poisoned"))?;
        Self::set_value_internal(&mut data, path, value)
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    ///
    /// Returns an error if the path doesn't exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self
            .data
            .lock()
            .map_err(|_| anyhow!("Configuration lock poisoned"))?;
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                let key = key.to_lowercase();

                if let Some(next) = map.get(&Value::String(key)) {
                    current = next;
                } else {
                    return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    fn apply_env_overrides<I>(config: &mut Value, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                if let Err(err) = Self::set_value_internal(config, &key_path, yaml_value) {
                    warn!(env_var = %key, "Ignoring environment override: {}", err);
                }
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    if let Value::String(s) = k {
                        new_map.insert(Value::String(s.to_lowercase()), Self::lower_keys_value(v));
                    } else {
                        new_map.insert(k, Self::lower_keys_value(v));
                    }
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    /// Gets the host of the music player daemon
    pub fn get_mpd_host(&self) -> String {
        match self.get_value(&["mpd_host"]) {
            Ok(Value::String(host)) if !host.trim().is_empty() => host.trim().to_string(),
            Ok(Value::Null) | Err(_) => DEFAULT_MPD_HOST.to_string(),
            Ok(other) => {
                warn!(value = ?other, "Invalid mpd_host, using default {}", DEFAULT_MPD_HOST);
                DEFAULT_MPD_HOST.to_string()
            }
        }
    }

    pub fn set_mpd_host(&self, host: &str) -> Result<()> {
        self.set_value(&["mpd_host"], Value::String(host.to_string()))
    }

    /// Gets the port of the music player daemon
    ///
    /// Accepts both a number and a numeric string.
    pub fn get_mpd_port(&self) -> u16 {
        match self.get_value(&["mpd_port"]) {
            Ok(Value::Number(n)) => match n.as_u64().and_then(|p| u16::try_from(p).ok()) {
                Some(port) => port,
                None => {
                    warn!("Invalid MPD port '{}', using default {}", n, DEFAULT_MPD_PORT);
                    DEFAULT_MPD_PORT
                }
            },
            Ok(Value::String(s)) => match s.trim().parse::<u16>() {
                Ok(port) => port,
                Err(_) => {
                    warn!("Invalid MPD port '{}', using default {}", s, DEFAULT_MPD_PORT);
                    DEFAULT_MPD_PORT
                }
            },
            Ok(Value::Null) | Err(_) => DEFAULT_MPD_PORT,
            Ok(_) => {
                warn!(
                    "MPD port not a number or string, using default {}",
                    DEFAULT_MPD_PORT
                );
                DEFAULT_MPD_PORT
            }
        }
    }

    pub fn set_mpd_port(&self, port: u16) -> Result<()> {
        self.set_value(&["mpd_port"], Value::Number(Number::from(port)))
    }

    /// Gets the configured stations, in configuration order
    ///
    /// Entries that are not a `{name, uri}` mapping are skipped with a warning.
    pub fn get_stations(&self) -> Vec<StationConfig> {
        let entries = match self.get_value(&["stations"]) {
            Ok(Value::Sequence(seq)) => seq,
            Ok(Value::Null) | Err(_) => return Vec::new(),
            Ok(other) => {
                warn!(value = ?other, "'stations' is not a list, no station configured");
                return Vec::new();
            }
        };

        entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                match serde_yaml::from_value::<StationConfig>(entry) {
                    Ok(station) => Some(station),
                    Err(err) => {
                        warn!(index, "Skipping invalid station entry: {}", err);
                        None
                    }
                }
            })
            .collect()
    }

    pub fn set_stations(&self, stations: &[StationConfig]) -> Result<()> {
        self.set_value(&["stations"], serde_yaml::to_value(stations)?)
    }

    /// Off switch behaviour: `stop` or `pause_toggle`
    pub fn get_off_switch_mode(&self) -> String {
        match self.get_value(&["radio", "off_switch_mode"]) {
            Ok(Value::String(s)) => s.trim().to_lowercase(),
            _ => DEFAULT_OFF_SWITCH_MODE.to_string(),
        }
    }

    pub fn set_off_switch_mode(&self, mode: &str) -> Result<()> {
        self.set_value(&["radio", "off_switch_mode"], Value::String(mode.to_string()))
    }

    impl_u64_config!(
        get_debounce_ms,
        set_debounce_ms,
        &["radio", "debounce_ms"],
        DEFAULT_DEBOUNCE_MS
    );

    impl_u64_config!(
        get_heartbeat_secs,
        set_heartbeat_secs,
        &["radio", "heartbeat_secs"],
        DEFAULT_HEARTBEAT_SECS
    );

    impl_u64_config!(
        get_grace_period_ms,
        set_grace_period_ms,
        &["radio", "grace_period_ms"],
        DEFAULT_GRACE_PERIOD_MS
    );

    impl_bool_config!(
        get_status_polling,
        set_status_polling,
        &["radio", "status_polling"],
        DEFAULT_STATUS_POLLING
    );

    impl_u64_config!(
        get_mpd_timeout_secs,
        set_mpd_timeout_secs,
        &["mpd_timeout_secs"],
        DEFAULT_MPD_TIMEOUT_SECS
    );

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["logging", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    /// Récupère le niveau de log minimum depuis la configuration
    pub fn get_log_min_level(&self) -> String {
        match self.get_value(&["logging", "min_level"]) {
            Ok(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => DEFAULT_LOG_MIN_LEVEL.to_string(),
        }
    }

    pub fn set_log_min_level(&self, level: &str) -> Result<()> {
        self.set_value(&["logging", "min_level"], Value::String(level.to_string()))
    }

    /// Log file, resolved relative to the configuration file directory
    pub fn get_log_file(&self) -> Option<PathBuf> {
        match self.get_value(&["logging", "file"]) {
            Ok(Value::String(s)) if !s.trim().is_empty() => {
                let file = PathBuf::from(s.trim());
                if file.is_absolute() {
                    return Some(file);
                }
                let base = self
                    .path
                    .as_deref()
                    .and_then(Path::parent)
                    .filter(|dir| !dir.as_os_str().is_empty());
                Some(match base {
                    Some(dir) => dir.join(file),
                    None => file,
                })
            }
            _ => None,
        }
    }

    /// Whole logging section
    pub fn get_logging(&self) -> LoggingConfig {
        LoggingConfig {
            min_level: self.get_log_min_level(),
            enable_console: self.get_log_enable_console(),
            file: self.get_log_file(),
        }
    }
}

fn parse_document(path: &Path, data: &str) -> Result<Value> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        let json: serde_json::Value = serde_json::from_str(data)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?;
        Ok(serde_yaml::to_value(json)?)
    } else {
        serde_yaml::from_str(data).with_context(|| format!("Invalid YAML in {}", path.display()))
    }
}

/// Merges external YAML configuration into default configuration
///
/// This function recursively merges two YAML value trees:
/// - For mappings (objects), it merges keys from external into default
/// - For scalars and sequences, external values replace default values
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(), // pour les scalaires ou séquences, on remplace
    }
}
