// ⚙️ Settings - TOML file + environment overrides
//
// Lookup order for the file:
//   1. $FINANCE_DASHBOARD_CONFIG
//   2. ./finance-dashboard.toml
//   3. <config dir>/finance-dashboard/config.toml
// A missing file means defaults. FINANCE_DB and FINANCE_BIND override the
// file values.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "FINANCE_DASHBOARD_CONFIG";
pub const DB_ENV: &str = "FINANCE_DB";
pub const BIND_ENV: &str = "FINANCE_BIND";

const LOCAL_CONFIG: &str = "finance-dashboard.toml";
const APP_DIR: &str = "finance-dashboard";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Address the API server listens on
    pub bind_address: String,

    /// Default tracing filter (RUST_LOG wins when set)
    pub log_filter: String,

    pub import: ImportSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// CSV field delimiter
    pub delimiter: char,

    /// chrono format of date cells; ISO dates are always accepted too
    pub date_format: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_path: default_database_path(),
            bind_address: "127.0.0.1:3000".to_string(),
            log_filter: "info".to_string(),
            import: ImportSettings::default(),
        }
    }
}

impl Default for ImportSettings {
    fn default() -> Self {
        ImportSettings {
            delimiter: ',',
            date_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the first config file found, then apply env overrides
    pub fn load() -> Result<Settings> {
        let mut settings = match config_file() {
            Some(path) => Settings::load_from_file(&path)?,
            None => Settings::default(),
        };
        settings.apply_env_overrides();
        Ok(settings)
    }

    pub fn load_from_file(path: &Path) -> Result<Settings> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let settings = Settings::from_toml(&raw)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(settings)
    }

    pub fn from_toml(raw: &str) -> Result<Settings> {
        let settings: Settings = toml::from_str(raw)?;
        if !settings.import.delimiter.is_ascii() {
            anyhow::bail!("import.delimiter must be a single ASCII character");
        }
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var(DB_ENV) {
            self.database_path = PathBuf::from(path);
        }
        if let Ok(bind) = std::env::var(BIND_ENV) {
            self.bind_address = bind;
        }
    }
}

fn config_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }

    let local = PathBuf::from(LOCAL_CONFIG);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join("config.toml"))
        .filter(|path| path.is_file())
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("finance.db")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_when_fields_missing() {
        let settings = Settings::from_toml("").unwrap();

        assert_eq!(settings.bind_address, "127.0.0.1:3000");
        assert_eq!(settings.import.delimiter, ',');
        assert!(settings.database_path.ends_with("finance.db"));
    }

    #[test]
    fn test_partial_import_section() {
        let settings = Settings::from_toml(
            r#"
            database_path = "/tmp/books.db"

            [import]
            delimiter = ";"
            "#,
        )
        .unwrap();

        assert_eq!(settings.database_path, PathBuf::from("/tmp/books.db"));
        assert_eq!(settings.import.delimiter, ';');
        assert_eq!(settings.import.date_format, "%Y-%m-%d %H:%M:%S");
    }

    #[test]
    fn test_rejects_non_ascii_delimiter() {
        assert!(Settings::from_toml("[import]\ndelimiter = \"§\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bind_address = \"0.0.0.0:8080\"").unwrap();

        let settings = Settings::load_from_file(file.path()).unwrap();
        assert_eq!(settings.bind_address, "0.0.0.0:8080");
    }
}
