use std::path::PathBuf;

use crate::config::EngineConfig;
use crate::error::{Result, StructuraError};

/// Overrides the config file location.
pub const CONFIG_ENV: &str = "STRUCTURA_CONFIG";

/// Get the path to the engine config file.
///
/// `$STRUCTURA_CONFIG` wins over `<config_dir>/structura/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("structura").join("config.toml"))
}

/// Load engine configuration.
///
/// Returns defaults if the config file does not exist.
/// Returns `Err` if the file exists but cannot be read or parsed.
pub fn load_engine_config() -> Result<EngineConfig> {
    match config_path() {
        Some(path) => load_engine_config_from(&path),
        None => Ok(EngineConfig::default()),
    }
}

pub fn load_engine_config_from(path: &std::path::Path) -> Result<EngineConfig> {
    if !path.exists() {
        return Ok(EngineConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| StructuraError::Io {
        context: format!("reading config {}", path.display()),
        source: e,
    })?;

    EngineConfig::from_toml_str(&content).map_err(|e| StructuraError::ConfigParse {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = load_engine_config_from(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn reads_file_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[expand]\nmax_repeat_count = 50\n").unwrap();
        let config = load_engine_config_from(&path).unwrap();
        assert_eq!(config.expand.max_repeat_count, 50);
    }

    #[test]
    fn malformed_file_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "not valid [[ toml").unwrap();
        let err = load_engine_config_from(&path).unwrap_err();
        assert!(matches!(err, StructuraError::ConfigParse { .. }));
    }
}
