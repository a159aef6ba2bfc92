//! Configuration management for shiftgate.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.
//!
//! Missing credentials are not a load failure. A config without a usable
//! access token or base id loads fine and produces an unconfigured gateway;
//! see [`AirtableConfig::credentials`].

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "shiftgate";

/// Default REST endpoint of the tabular store.
pub const DEFAULT_API_URL: &str = "https://api.airtable.com/v0";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables prefixed with `SHIFTGATE_` (`__` separates sections)
/// 2. `AIRTABLE_ACCESS_TOKEN` and `AIRTABLE_BASE_ID`
/// 3. TOML config file at `~/.config/shiftgate/config.toml`
/// 4. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend connection settings.
    pub airtable: AirtableConfig,
    /// Table names.
    pub tables: TablesConfig,
    /// Alert thresholds.
    pub thresholds: ThresholdConfig,
    /// Polling settings.
    pub polling: PollingConfig,
}

/// Backend connection settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirtableConfig {
    /// Personal access token sent as a bearer token.
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    /// Identifier of the base that holds the tables.
    pub base_id: Option<String>,
    /// REST endpoint, without the base id.
    pub api_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Names (or table ids) of the tables the gateway reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TablesConfig {
    /// Shift table.
    pub shifts: String,
    /// Personnel table.
    pub personnel: String,
    /// Process/lot table.
    pub processes: String,
    /// Mass-balance readings table.
    pub mass_balances: String,
    /// Pyrolysis batch table.
    pub batches: String,
    /// Team table used for identity-code lookups.
    pub team: String,
}

/// Temperature thresholds used by the metrics layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Temperatures above this raise a "high temperature" alert.
    pub max_temperature: f64,
    /// Temperatures below this raise a "low temperature" alert.
    pub min_temperature: f64,
    /// Reference temperature for the efficiency score.
    pub optimal_temperature: f64,
}

/// Polling settings for watch mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Seconds between refreshes.
    pub interval_secs: u64,
    /// Mass-balance readings fetched per refresh.
    pub mass_balance_limit: usize,
}

impl Default for AirtableConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            base_id: None,
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: 15,
        }
    }
}

impl std::fmt::Debug for AirtableConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AirtableConfig")
            .field("access_token", &self.access_token.as_deref().map(mask_token))
            .field("base_id", &self.base_id)
            .field("api_url", &self.api_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            shifts: "Turno Pirolisis".to_string(),
            personnel: "Personal".to_string(),
            processes: "Procesos".to_string(),
            mass_balances: "Balances Masa".to_string(),
            batches: "Baches Pirolisis".to_string(),
            team: "Equipo Pirolisis".to_string(),
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            max_temperature: 800.0,
            min_temperature: 300.0,
            optimal_temperature: 400.0,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            mass_balance_limit: 10,
        }
    }
}

/// Usable credentials for the backend.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Bearer token.
    pub access_token: String,
    /// Base identifier.
    pub base_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &mask_token(&self.access_token))
            .field("base_id", &self.base_id)
            .finish()
    }
}

fn placeholder_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)^(your_|<)|_here$|^appx{4,}|^pat[x.]{4,}$").ok())
        .as_ref()
}

/// Check whether a credential value is a template placeholder.
#[must_use]
pub fn is_placeholder(value: &str) -> bool {
    placeholder_pattern().is_some_and(|re| re.is_match(value.trim()))
}

/// Mask a token for logs: first few characters, then an ellipsis.
#[must_use]
pub fn mask_token(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{prefix}...")
}

impl AirtableConfig {
    /// Resolve usable credentials.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` listing every missing or placeholder
    /// value. No network I/O is involved.
    pub fn credentials(&self) -> Result<Credentials> {
        let problems = self.credential_problems();
        if !problems.is_empty() {
            return Err(Error::configuration(problems.join("; ")));
        }
        match (&self.access_token, &self.base_id) {
            (Some(token), Some(base)) => Ok(Credentials {
                access_token: token.trim().to_string(),
                base_id: base.trim().to_string(),
            }),
            _ => Err(Error::internal("credential check passed without values")),
        }
    }

    /// Describe every problem with the configured credentials.
    #[must_use]
    pub fn credential_problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let token = self.access_token.as_deref().map(str::trim).unwrap_or("");
        let base = self.base_id.as_deref().map(str::trim).unwrap_or("");

        if token.is_empty() {
            problems.push("access token is missing".to_string());
        } else if is_placeholder(token) {
            problems.push("access token is still a placeholder value".to_string());
        }

        if base.is_empty() {
            problems.push("base id is missing".to_string());
        } else if is_placeholder(base) {
            problems.push("base id is still a placeholder value".to_string());
        } else if base == token {
            problems.push("base id must differ from the access token".to_string());
        }

        problems
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(
                Env::raw()
                    .only(&["AIRTABLE_ACCESS_TOKEN", "AIRTABLE_BASE_ID"])
                    .map(|key| {
                        key.as_str()
                            .to_ascii_lowercase()
                            .replacen("airtable_", "airtable.", 1)
                            .into()
                    }),
            )
            .merge(Env::prefixed("SHIFTGATE_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// Credentials are deliberately not checked here.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;
        if !(t.max_temperature.is_finite()
            && t.min_temperature.is_finite()
            && t.optimal_temperature.is_finite())
        {
            return Err(Error::ConfigValidation {
                message: "temperature thresholds must be finite numbers".to_string(),
            });
        }

        if t.min_temperature >= t.max_temperature {
            return Err(Error::ConfigValidation {
                message: format!(
                    "min_temperature ({}) must be below max_temperature ({})",
                    t.min_temperature, t.max_temperature
                ),
            });
        }

        if t.optimal_temperature <= 0.0 {
            return Err(Error::ConfigValidation {
                message: "optimal_temperature must be greater than 0".to_string(),
            });
        }

        if self.polling.interval_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "interval_secs must be greater than 0".to_string(),
            });
        }

        if self.airtable.timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "timeout_secs must be greater than 0".to_string(),
            });
        }

        let tables = [
            ("shifts", &self.tables.shifts),
            ("personnel", &self.tables.personnel),
            ("processes", &self.tables.processes),
            ("mass_balances", &self.tables.mass_balances),
            ("batches", &self.tables.batches),
            ("team", &self.tables.team),
        ];
        for (name, value) in tables {
            if value.trim().is_empty() {
                return Err(Error::ConfigValidation {
                    message: format!("table name for {name} cannot be empty"),
                });
            }
        }

        Ok(())
    }

    /// Get the polling interval as a Duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.airtable.access_token.is_none());
        assert!(config.airtable.base_id.is_none());
        assert_eq!(config.airtable.api_url, DEFAULT_API_URL);
        assert_eq!(config.tables.shifts, "Turno Pirolisis");
        assert_eq!(config.tables.personnel, "Personal");
        assert_eq!(config.tables.processes, "Procesos");
    }

    #[test]
    fn test_default_thresholds() {
        let thresholds = ThresholdConfig::default();

        assert!((thresholds.max_temperature - 800.0).abs() < f64::EPSILON);
        assert!((thresholds.min_temperature - 300.0).abs() < f64::EPSILON);
        assert!((thresholds.optimal_temperature - 400.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_default_polling() {
        let polling = PollingConfig::default();
        assert_eq!(polling.interval_secs, 30);
        assert_eq!(polling.mass_balance_limit, 10);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_inverted_thresholds() {
        let mut config = Config::default();
        config.thresholds.min_temperature = 900.0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("min_temperature"));
    }

    #[test]
    fn test_validate_non_finite_threshold() {
        let mut config = Config::default();
        config.thresholds.max_temperature = f64::NAN;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_interval() {
        let mut config = Config::default();
        config.polling.interval_secs = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("interval_secs"));
    }

    #[test]
    fn test_validate_empty_table_name() {
        let mut config = Config::default();
        config.tables.team = "  ".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("team"));
    }

    #[test]
    fn test_missing_credentials_are_not_a_validation_error() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.airtable.credentials().is_err());
    }

    #[test]
    fn test_credentials_missing() {
        let airtable = AirtableConfig::default();
        let problems = airtable.credential_problems();

        assert_eq!(problems.len(), 2);
        let err = airtable.credentials().unwrap_err();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("access token is missing"));
        assert!(err.to_string().contains("base id is missing"));
    }

    #[test]
    fn test_credentials_placeholder_token() {
        let airtable = AirtableConfig {
            access_token: Some("your_airtable_access_token_here".to_string()),
            base_id: Some("appR4nd0mB4se1d".to_string()),
            ..AirtableConfig::default()
        };

        let err = airtable.credentials().unwrap_err().to_string();
        assert!(err.contains("placeholder"));
    }

    #[test]
    fn test_credentials_placeholder_base() {
        let airtable = AirtableConfig {
            access_token: Some("patAbc123.def456".to_string()),
            base_id: Some("appXXXXXXXXXXXXXX".to_string()),
            ..AirtableConfig::default()
        };

        assert!(airtable.credentials().is_err());
    }

    #[test]
    fn test_credentials_base_equal_to_token() {
        let airtable = AirtableConfig {
            access_token: Some("patAbc123.def456".to_string()),
            base_id: Some("patAbc123.def456".to_string()),
            ..AirtableConfig::default()
        };

        let err = airtable.credentials().unwrap_err().to_string();
        assert!(err.contains("must differ"));
    }

    #[test]
    fn test_credentials_valid() {
        let airtable = AirtableConfig {
            access_token: Some(" patAbc123.def456 ".to_string()),
            base_id: Some("appR4nd0mB4se1d".to_string()),
            ..AirtableConfig::default()
        };

        let creds = airtable.credentials().unwrap();
        assert_eq!(creds.access_token, "patAbc123.def456");
        assert_eq!(creds.base_id, "appR4nd0mB4se1d");
    }

    #[test]
    fn test_is_placeholder() {
        assert!(is_placeholder("your_airtable_access_token_here"));
        assert!(is_placeholder("appXXXXXXXXXXXXXX"));
        assert!(is_placeholder("<token>"));
        assert!(!is_placeholder("patAbc123.def456"));
        assert!(!is_placeholder("apprXBBomgiKhVc50"));
    }

    #[test]
    fn test_debug_masks_token() {
        let airtable = AirtableConfig {
            access_token: Some("patSecretSecretSecret".to_string()),
            ..AirtableConfig::default()
        };
        let debug_str = format!("{airtable:?}");
        assert!(!debug_str.contains("patSecretSecretSecret"));
        assert!(debug_str.contains("patSec..."));
    }

    #[test]
    fn test_poll_interval() {
        let config = Config::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_timeout() {
        assert_eq!(AirtableConfig::default().timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("shiftgate"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[tables]
shifts = "Turnos"

[thresholds]
max_temperature = 750.0
"#
        )
        .unwrap();

        let config = Config::load_from(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.tables.shifts, "Turnos");
        assert!((config.thresholds.max_temperature - 750.0).abs() < f64::EPSILON);
        assert!((config.thresholds.min_temperature - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_rejects_invalid_thresholds() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[thresholds]\nmax_temperature = 100.0\nmin_temperature = 200.0"
        )
        .unwrap();

        let result = Config::load_from(Some(file.path().to_path_buf()));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_reads_every_section() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[airtable]
api_url = "http://localhost:8080/v0"
timeout_secs = 5

[tables]
team = "Equipo"

[thresholds]
optimal_temperature = 420.0

[polling]
interval_secs = 10
mass_balance_limit = 3
"#
        )
        .unwrap();

        let config = Config::load_from(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.airtable.api_url, "http://localhost:8080/v0");
        assert_eq!(config.airtable.timeout_secs, 5);
        assert_eq!(config.tables.team, "Equipo");
        assert_eq!(config.tables.shifts, "Turno Pirolisis");
        assert!((config.thresholds.optimal_temperature - 420.0).abs() < f64::EPSILON);
        assert_eq!(config.polling.interval_secs, 10);
        assert_eq!(config.polling.mass_balance_limit, 3);
    }

    #[test]
    fn test_thresholds_serialize() {
        let json = serde_json::to_string(&ThresholdConfig::default()).unwrap();
        assert!(json.contains("max_temperature"));
    }

    #[test]
    fn test_serialize_omits_token() {
        let mut config = Config::default();
        config.airtable.access_token = Some("patSecret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("patSecret"));
    }
}
