use crate::errors::{JournalError, JournalResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DATA_DIR_ENV: &str = "DAYMARK_DATA_DIR";
pub const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_TRAILING_WINDOW_MONTHS: u32 = 4;

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("daymark")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JournalConfig {
    pub data_dir: PathBuf,
    pub database_file: String,
    pub trailing_window_months: u32,
    pub log_filter: String,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: "toy_database.sqlite3".to_string(),
            trailing_window_months: DEFAULT_TRAILING_WINDOW_MONTHS,
            log_filter: "info".to_string(),
        }
    }
}

impl JournalConfig {
    /// Resolves the data directory from `DAYMARK_DATA_DIR` or the platform
    /// default, then reads its config file.
    pub fn load() -> JournalResult<Self> {
        let data_dir = std::env::var_os(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        Self::load_from(&data_dir)
    }

    /// A missing config file yields defaults. `dataDir` always ends up as
    /// `data_dir`, whatever the file says.
    pub fn load_from(data_dir: &Path) -> JournalResult<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let mut config = if path.is_file() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str::<JournalConfig>(&raw)
                .map_err(|err| JournalError::Config(format!("{}: {}", path.display(), err)))?
        } else {
            JournalConfig::default()
        };
        config.data_dir = data_dir.to_path_buf();
        Ok(config)
    }

    pub fn save(&self) -> JournalResult<()> {
        fs::create_dir_all(&self.data_dir)?;
        fs::write(self.data_dir.join(CONFIG_FILE), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Applies a partial JSON update over this config.
    pub fn merged(&self, update: serde_json::Value) -> JournalResult<Self> {
        let mut merged = serde_json::to_value(self)?;
        merge_json(&mut merged, update);
        Ok(serde_json::from_value(merged)?)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(target_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{JournalConfig, CONFIG_FILE, DEFAULT_TRAILING_WINDOW_MONTHS};
    use crate::errors::JournalError;

    #[test]
    fn missing_file_gives_defaults_in_given_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = JournalConfig::load_from(dir.path()).expect("load");
        assert_eq!(config.data_dir, dir.path());
        assert_eq!(config.trailing_window_months, DEFAULT_TRAILING_WINDOW_MONTHS);
        assert_eq!(config.database_path(), dir.path().join("toy_database.sqlite3"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{ "trailingWindowMonths": 6, "dataDir": "/somewhere/else" }"#,
        )
        .expect("write config");

        let config = JournalConfig::load_from(dir.path()).expect("load");
        assert_eq!(config.trailing_window_months, 6);
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.data_dir, dir.path());
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(CONFIG_FILE), "{ not json").expect("write config");
        let error = JournalConfig::load_from(dir.path()).expect_err("malformed");
        assert!(matches!(error, JournalError::Config(_)));
    }

    #[test]
    fn merged_update_and_save_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = JournalConfig::load_from(dir.path()).expect("load");
        let updated = config
            .merged(serde_json::json!({ "logFilter": "debug", "trailingWindowMonths": 2 }))
            .expect("merge");
        assert_eq!(updated.log_filter, "debug");
        assert_eq!(updated.database_file, config.database_file);

        updated.save().expect("save");
        let reloaded = JournalConfig::load_from(dir.path()).expect("reload");
        assert_eq!(reloaded, updated);
    }
}
