//! Batch analysis configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use trimcheck_core::AnalyzerOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported config format `{0}` (expected .toml or .json)")]
    UnsupportedFormat(String),

    #[error("suppressed diagnostic `{0}` is not a code like IL2072")]
    InvalidCode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Skip async bodies and bodies with lambdas, local functions or yields
    pub skip_compiler_generated: bool,
    /// Worker threads; `None` uses one per core
    pub threads: Option<usize>,
    /// Diagnostic codes removed from the report, e.g. `IL2072`
    pub suppressed: Vec<String>,
    /// Stop scheduling units after the first malformed one
    pub fail_fast: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            skip_compiler_generated: true,
            threads: None,
            suppressed: Vec::new(),
            fail_fast: false,
        }
    }
}

impl AnalysisConfig {
    /// Load from a `.toml` or `.json` file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            other => return Err(ConfigError::UnsupportedFormat(other.unwrap_or_default().to_string())),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.suppressed.iter().find(|code| parse_code(code).is_none()) {
            Some(code) => Err(ConfigError::InvalidCode(code.clone())),
            None => Ok(()),
        }
    }

    /// Numeric codes of suppressed diagnostics
    pub fn suppressed_codes(&self) -> Vec<u16> {
        self.suppressed.iter().filter_map(|code| parse_code(code)).collect()
    }

    pub fn analyzer_options(&self) -> AnalyzerOptions {
        AnalyzerOptions {
            skip_compiler_generated: self.skip_compiler_generated,
        }
    }
}

/// Accepts `IL2072` or a bare `2072`
fn parse_code(code: &str) -> Option<u16> {
    let code = code.trim();
    code.strip_prefix("IL").unwrap_or(code).parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert!(config.skip_compiler_generated);
        assert!(!config.fail_fast);
        assert_eq!(config.threads, None);
        assert!(config.analyzer_options().skip_compiler_generated);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AnalysisConfig::from_toml_str("threads = 4\nsuppressed = [\"IL2072\", \"2062\"]\n").unwrap();
        assert_eq!(config.threads, Some(4));
        assert!(config.skip_compiler_generated);
        assert_eq!(config.suppressed_codes(), vec![2072, 2062]);
    }

    #[test]
    fn test_invalid_code_is_rejected() {
        let error = AnalysisConfig::from_toml_str("suppressed = [\"warning\"]").unwrap_err();
        assert!(matches!(error, ConfigError::InvalidCode(code) if code == "warning"));
    }
}
