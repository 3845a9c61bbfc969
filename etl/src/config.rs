//! Run configuration.
//!
//! Built explicitly from environment variables (the CLI loads `.env` first
//! and lets flags override). Threshold tables default to the canonical
//! brackets and can be replaced by a JSON file checked against the embedded
//! schema `schemas/thresholds.json`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use sqlx::postgres::PgConnectOptions;

use crate::error::{ConfigError, ConfigResult};
use crate::models::{HdiTier, IncomeCategory, Label};
use crate::transform::Brackets;

pub const DEFAULT_INPUT_DIR: &str = "data/input";
pub const DEFAULT_OUTPUT_DIR: &str = "data/output";
pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 5432;

const THRESHOLDS_SCHEMA: &str = include_str!("../schemas/thresholds.json");

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// =============================================================================
// Thresholds
// =============================================================================

/// Classification brackets for HDI and GDP per capita.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    pub hdi: Brackets<HdiTier>,
    pub income: Brackets<IncomeCategory>,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::canonical()
    }
}

#[derive(Debug, Deserialize)]
struct ThresholdsFile {
    hdi: Option<HashMap<String, f64>>,
    income: Option<HashMap<String, f64>>,
}

impl Thresholds {
    /// HDI `Faible 0, Moyen 0.55, Eleve 0.70, Tres_eleve 0.80`;
    /// income `pauvres 0, moyen_inferieur 5000, moyen_sup 10000, riche 20000`.
    pub fn canonical() -> Self {
        Self {
            hdi: Brackets::from_sorted(vec![
                (HdiTier::Faible, 0.0),
                (HdiTier::Moyen, 0.55),
                (HdiTier::Eleve, 0.70),
                (HdiTier::TresEleve, 0.80),
            ]),
            income: Brackets::from_sorted(vec![
                (IncomeCategory::Pauvres, 0.0),
                (IncomeCategory::MoyenInferieur, 5000.0),
                (IncomeCategory::MoyenSup, 10000.0),
                (IncomeCategory::Riche, 20000.0),
            ]),
        }
    }

    /// Parse a thresholds document. A missing section keeps its canonical
    /// table.
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let document: Value = serde_json::from_str(content)?;
        validate_document(&document)?;

        let file: ThresholdsFile = serde_json::from_value(document)?;
        let mut thresholds = Self::canonical();
        if let Some(table) = file.hdi {
            thresholds.hdi = brackets_from_map("hdi", table)?;
        }
        if let Some(table) = file.income {
            thresholds.income = brackets_from_map("income", table)?;
        }
        Ok(thresholds)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }
}

fn validate_document(document: &Value) -> ConfigResult<()> {
    let schema: Value =
        serde_json::from_str(THRESHOLDS_SCHEMA).expect("Invalid embedded schema");
    let validator = jsonschema::draft7::new(&schema)
        .map_err(|e| ConfigError::Schema(vec![format!("Invalid schema: {}", e)]))?;

    let errors: Vec<String> = validator.iter_errors(document).map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Schema(errors))
    }
}

fn brackets_from_map<L: Label>(
    table: &'static str,
    map: HashMap<String, f64>,
) -> ConfigResult<Brackets<L>> {
    let mut pairs = Vec::with_capacity(map.len());
    for (name, bound) in map {
        let label = L::parse_label(&name).ok_or_else(|| ConfigError::InvalidBrackets {
            table,
            message: format!("unknown label '{}'", name),
        })?;
        pairs.push((label, bound));
    }
    Brackets::from_bounds(table, pairs)
}

// =============================================================================
// ETL configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct EtlConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub thresholds: Thresholds,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            thresholds: Thresholds::canonical(),
        }
    }
}

impl EtlConfig {
    /// `ETL_INPUT_DIR`, `ETL_OUTPUT_DIR`, `ETL_THRESHOLDS`.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let thresholds = match lookup("ETL_THRESHOLDS") {
            Some(path) => Thresholds::from_file(Path::new(&path))?,
            None => Thresholds::canonical(),
        };
        Ok(Self {
            input_dir: lookup("ETL_INPUT_DIR").map_or_else(|| DEFAULT_INPUT_DIR.into(), PathBuf::from),
            output_dir: lookup("ETL_OUTPUT_DIR").map_or_else(|| DEFAULT_OUTPUT_DIR.into(), PathBuf::from),
            thresholds,
        })
    }
}

// =============================================================================
// Database configuration
// =============================================================================

#[derive(Clone)]
pub struct DatabaseConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("user", &self.user)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

impl DatabaseConfig {
    /// `DB_USER`, `DB_PASSWORD`, `DB_NAME` (required), `DB_HOST`, `DB_PORT`.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::MissingVar(name));

        let port = match lookup("DB_PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidVar { name: "DB_PORT", value })?,
            None => DEFAULT_DB_PORT,
        };

        Ok(Self {
            user: required("DB_USER")?,
            password: required("DB_PASSWORD")?,
            host: lookup("DB_HOST").unwrap_or_else(|| DEFAULT_DB_HOST.to_string()),
            port,
            database: required("DB_NAME")?,
        })
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }

    /// `user@host:port/database`, without the password.
    pub fn display_target(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_canonical_tables_are_valid() {
        let canonical = Thresholds::canonical();
        let rebuilt = Brackets::from_bounds("hdi", canonical.hdi.intervals().iter().map(|i| (i.0, i.1)));
        assert_eq!(rebuilt.unwrap(), canonical.hdi);
        let rebuilt = Brackets::from_bounds("income", canonical.income.intervals().iter().map(|i| (i.0, i.1)));
        assert_eq!(rebuilt.unwrap(), canonical.income);
    }

    #[test]
    fn test_thresholds_file_overrides_one_table() {
        let json = r#"{ "hdi": { "Tres_eleve": 0.9, "Faible": 0, "Eleve": 0.75, "Moyen": 0.5 } }"#;
        let thresholds = Thresholds::from_json(json).unwrap();

        assert_eq!(thresholds.hdi.classify(0.5), Some(HdiTier::Moyen));
        assert_eq!(thresholds.hdi.classify(0.85), Some(HdiTier::Eleve));
        assert_eq!(thresholds.income, Thresholds::canonical().income);
    }

    #[test]
    fn test_thresholds_unknown_label_rejected() {
        let json = r#"{ "income": { "pauvres": 0, "moyen_inferieur": 5000, "moyen_sup": 10000, "riche": 20000, "ultra": 1e6 } }"#;
        match Thresholds::from_json(json) {
            Err(ConfigError::Schema(errors)) => assert!(!errors.is_empty()),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_thresholds_missing_label_and_negative_rejected() {
        let missing = r#"{ "hdi": { "Faible": 0, "Moyen": 0.55, "Eleve": 0.7 } }"#;
        assert!(matches!(Thresholds::from_json(missing), Err(ConfigError::Schema(_))));

        let negative = r#"{ "hdi": { "Faible": 0, "Moyen": -0.55, "Eleve": 0.7, "Tres_eleve": 0.8 } }"#;
        assert!(matches!(Thresholds::from_json(negative), Err(ConfigError::Schema(_))));
    }

    #[test]
    fn test_thresholds_lowest_bound_must_be_zero() {
        let json = r#"{ "hdi": { "Faible": 0.1, "Moyen": 0.55, "Eleve": 0.7, "Tres_eleve": 0.8 } }"#;
        assert!(matches!(
            Thresholds::from_json(json),
            Err(ConfigError::InvalidBrackets { table: "hdi", .. })
        ));
    }

    #[test]
    fn test_thresholds_file_unreadable() {
        let err = Thresholds::from_file(Path::new("/nonexistent/thresholds.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Unreadable { .. }));
    }

    #[test]
    fn test_etl_config_defaults_and_overrides() {
        let config = EtlConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.input_dir, PathBuf::from("data/input"));
        assert_eq!(config.output_dir, PathBuf::from("data/output"));

        let config = EtlConfig::from_lookup(lookup_from(&[("ETL_INPUT_DIR", "/srv/raw")])).unwrap();
        assert_eq!(config.input_dir, PathBuf::from("/srv/raw"));
    }

    #[test]
    fn test_etl_config_reads_thresholds_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thresholds.json");
        std::fs::write(
            &path,
            r#"{ "income": { "pauvres": 0, "moyen_inferieur": 1000, "moyen_sup": 2000, "riche": 3000 } }"#,
        )
        .unwrap();

        let path_str = path.to_string_lossy().to_string();
        let config = EtlConfig::from_lookup(lookup_from(&[("ETL_THRESHOLDS", path_str.as_str())])).unwrap();
        assert_eq!(config.thresholds.income.classify(2500.0), Some(IncomeCategory::MoyenSup));
    }

    #[test]
    fn test_database_config() {
        let config = DatabaseConfig::from_lookup(lookup_from(&[
            ("DB_USER", "etl"),
            ("DB_PASSWORD", "secret"),
            ("DB_NAME", "indicators"),
        ]))
        .unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.display_target(), "etl@localhost:5432/indicators");
        assert!(!format!("{:?}", config).contains("secret"));

        let missing = DatabaseConfig::from_lookup(lookup_from(&[("DB_USER", "etl")]));
        assert!(matches!(missing, Err(ConfigError::MissingVar("DB_PASSWORD"))));

        let bad_port = DatabaseConfig::from_lookup(lookup_from(&[
            ("DB_USER", "etl"),
            ("DB_PASSWORD", "secret"),
            ("DB_NAME", "indicators"),
            ("DB_PORT", "postgres"),
        ]));
        assert!(matches!(bad_port, Err(ConfigError::InvalidVar { name: "DB_PORT", .. })));
    }
}
