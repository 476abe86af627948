//! Layered configuration: compiled defaults, then an optional TOML file, then
//! `SURVEY_X_*` environment variables (`__` separates nested keys, e.g.
//! `SURVEY_X_LEDGER__MIN_BALANCE_LAMPORTS`).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use survey_x_std::account::Programs;
use survey_x_std::{ARCIUM_PROGRAM_ID, DEFAULT_CLUSTER_OFFSET};

use crate::balance::DEFAULT_MIN_BALANCE_LAMPORTS;
use crate::error::ConfigError;
use crate::store::{MemoryMetadataStore, MetadataStore, PostgrestStore};

pub const ENV_PREFIX: &str = "SURVEY_X_";

const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 60;
const DEFAULT_RESULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
const DEFAULT_TABLE: &str = "survey_submissions";
const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_LOG_FILE_PREFIX: &str = "survey-x.log";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub computation: ComputationConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub mxe_program_id: String,
    pub arcium_program_id: String,
    pub cluster_offset: u32,
    pub min_balance_lamports: u64,
    pub confirmation_timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            mxe_program_id: survey_x_std::ID.to_string(),
            arcium_program_id: ARCIUM_PROGRAM_ID.to_string(),
            cluster_offset: DEFAULT_CLUSTER_OFFSET,
            min_balance_lamports: DEFAULT_MIN_BALANCE_LAMPORTS,
            confirmation_timeout_secs: DEFAULT_CONFIRMATION_TIMEOUT_SECS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputationConfig {
    pub result_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for ComputationConfig {
    fn default() -> Self {
        Self {
            result_timeout_secs: DEFAULT_RESULT_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl ComputationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgrest,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            url: None,
            api_key: None,
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

impl StoreConfig {
    pub fn open(&self) -> Result<Arc<dyn MetadataStore>, ConfigError> {
        match self.backend {
            StoreBackend::Memory => Ok(Arc::new(MemoryMetadataStore::new())),
            StoreBackend::Postgrest => {
                let url = self
                    .url
                    .as_deref()
                    .ok_or_else(|| ConfigError::Invalid("store.url is required for postgrest".to_string()))?;
                let api_key = self
                    .api_key
                    .as_deref()
                    .ok_or_else(|| ConfigError::Invalid("store.api_key is required for postgrest".to_string()))?;
                let store = PostgrestStore::new(url, api_key, &self.table)
                    .map_err(|err| ConfigError::Invalid(err.to_string()))?;
                Ok(Arc::new(store))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    /// Daily rolling log files are written here when set.
    pub directory: Option<String>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            directory: None,
            file_prefix: DEFAULT_LOG_FILE_PREFIX.to_string(),
        }
    }
}

/// Resolved coordinator parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub programs: Programs,
    pub min_balance_lamports: u64,
    pub confirmation_timeout: Duration,
    pub result_timeout: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            programs: Programs::default(),
            min_balance_lamports: DEFAULT_MIN_BALANCE_LAMPORTS,
            confirmation_timeout: Duration::from_secs(DEFAULT_CONFIRMATION_TIMEOUT_SECS),
            result_timeout: Duration::from_secs(DEFAULT_RESULT_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Ok(figment(path).extract()?)
    }

    pub fn validate(&self) -> Result<CoordinatorSettings, ConfigError> {
        let mxe_program = parse_pubkey("ledger.mxe_program_id", &self.ledger.mxe_program_id)?;
        let arcium_program = parse_pubkey("ledger.arcium_program_id", &self.ledger.arcium_program_id)?;

        if self.ledger.confirmation_timeout_secs == 0 {
            return Err(ConfigError::Invalid("ledger.confirmation_timeout_secs must be positive".to_string()));
        }
        if self.computation.result_timeout_secs == 0 {
            return Err(ConfigError::Invalid("computation.result_timeout_secs must be positive".to_string()));
        }
        if self.computation.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("computation.poll_interval_ms must be positive".to_string()));
        }
        if self.store.backend == StoreBackend::Postgrest && self.store.url.is_none() {
            return Err(ConfigError::Invalid("store.url is required for postgrest".to_string()));
        }

        Ok(CoordinatorSettings {
            programs: Programs::new(mxe_program, arcium_program, self.ledger.cluster_offset),
            min_balance_lamports: self.ledger.min_balance_lamports,
            confirmation_timeout: Duration::from_secs(self.ledger.confirmation_timeout_secs),
            result_timeout: Duration::from_secs(self.computation.result_timeout_secs),
        })
    }
}

fn figment(path: Option<&Path>) -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
    if let Some(path) = path {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
}

fn parse_pubkey(field: &'static str, value: &str) -> Result<Pubkey, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidPubkey {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn defaults_validate() {
        Jail::expect_with(|_| {
            let config = AppConfig::load(None).map_err(|e| e.to_string())?;
            let settings = config.validate().map_err(|e| e.to_string())?;

            assert_eq!(settings, CoordinatorSettings::default());
            assert_eq!(config.store.backend, StoreBackend::Memory);
            Ok(())
        });
    }

    #[test]
    fn file_then_env_precedence() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "survey-x.toml",
                r#"
                [ledger]
                min_balance_lamports = 1000
                cluster_offset = 7

                [store]
                backend = "postgrest"
                url = "https://project.supabase.co"
                api_key = "anon"
                "#,
            )?;
            jail.set_env("SURVEY_X_LEDGER__MIN_BALANCE_LAMPORTS", "2500");
            jail.set_env("SURVEY_X_COMPUTATION__RESULT_TIMEOUT_SECS", "5");

            let config = AppConfig::load(Some(Path::new("survey-x.toml"))).map_err(|e| e.to_string())?;
            let settings = config.validate().map_err(|e| e.to_string())?;

            assert_eq!(settings.min_balance_lamports, 2500);
            assert_eq!(settings.programs.cluster_offset, 7);
            assert_eq!(settings.result_timeout, Duration::from_secs(5));
            assert_eq!(config.store.backend, StoreBackend::Postgrest);
            assert_eq!(config.store.table, DEFAULT_TABLE);
            Ok(())
        });
    }

    #[test]
    fn invalid_program_id_is_rejected() {
        let mut config = AppConfig::default();
        config.ledger.mxe_program_id = "not-a-pubkey".to_string();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPubkey { field: "ledger.mxe_program_id", .. })
        ));
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let mut config = AppConfig::default();
        config.ledger.confirmation_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig::default();
        config.computation.poll_interval_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn postgrest_store_requires_credentials() {
        let config = StoreConfig {
            backend: StoreBackend::Postgrest,
            url: Some("https://project.supabase.co".to_string()),
            ..StoreConfig::default()
        };

        assert!(matches!(config.open(), Err(ConfigError::Invalid(_))));
        assert!(StoreConfig::default().open().is_ok());
    }
}
