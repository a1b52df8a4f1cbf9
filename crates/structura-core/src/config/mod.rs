pub mod user;
pub mod variable;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StructuraError};

pub use user::{config_path, load_engine_config};
pub use variable::{validate_variables, TemplateVariables, ValidationRule, VariableError};

/// Tunables for every pipeline stage. Every field has a default, so an empty
/// config file is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub expand: ExpandConfig,
    pub diff: DiffConfig,
    pub download: DownloadConfig,
    pub scan: ScanConfig,
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpandConfig {
    /// Upper bound on the iteration count of one `repeat` node.
    pub max_repeat_count: u64,
    /// Upper bound on folders and files produced by one expansion, across nested repeats.
    pub max_total_nodes: u64,
}

impl Default for ExpandConfig {
    fn default() -> Self {
        Self {
            max_repeat_count: 10_000,
            max_total_nodes: 100_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    pub context_lines: usize,
    /// Hunks longer than this keep their head and tail around a truncation marker.
    pub max_hunk_lines: usize,
    /// Preview content longer than this many characters is cut off.
    pub max_content_chars: usize,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            context_lines: 3,
            max_hunk_lines: 200,
            max_content_chars: 50_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub timeout_secs: u64,
    /// Extra attempts after the first failure.
    pub retries: u32,
    /// Size of the worker pool used for downloads and generated files.
    pub max_concurrent: usize,
    pub max_bytes: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            retries: 2,
            max_concurrent: 4,
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Glob patterns matched against entry names.
    pub ignore: Vec<String>,
    pub max_file_bytes: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ignore: [".*", "node_modules", "target", "__pycache__", "dist", "build"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_file_bytes: 1024 * 1024,
        }
    }
}

impl ScanConfig {
    pub fn ignore_set(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.ignore {
            let glob = Glob::new(pattern).map_err(|e| StructuraError::GlobPattern {
                pattern: pattern.clone(),
                source: e,
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|e| StructuraError::GlobPattern {
            pattern: self.ignore.join(", "),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.expand.max_repeat_count, 10_000);
        assert_eq!(config.diff.context_lines, 3);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
[download]
retries = 0

[scan]
ignore = ["*.log"]
"#,
        )
        .unwrap();
        assert_eq!(config.download.retries, 0);
        assert_eq!(config.download.timeout_secs, 30);
        assert_eq!(config.scan.ignore, ["*.log"]);
        assert_eq!(config.scan.max_file_bytes, 1024 * 1024);
    }

    #[test]
    fn default_ignore_set_matches_hidden_and_build_dirs() {
        let set = ScanConfig::default().ignore_set().unwrap();
        assert!(set.is_match(".git"));
        assert!(set.is_match("node_modules"));
        assert!(!set.is_match("src"));
    }

    #[test]
    fn invalid_glob_is_reported() {
        let config = ScanConfig {
            ignore: vec!["[".into()],
            ..Default::default()
        };
        assert!(matches!(
            config.ignore_set(),
            Err(StructuraError::GlobPattern { .. })
        ));
    }
}
