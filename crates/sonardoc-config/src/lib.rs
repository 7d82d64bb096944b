//! Sonardoc configuration
//!
//! Settings come from `sonardoc.toml` with environment variables taking
//! precedence.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE: &str = "sonardoc.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SonardocConfig {
    /// Text rendering settings
    pub render: RenderConfig,
    /// Stylesheet resolution settings
    pub css: CssConfig,
}

/// Text rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Width of horizontal rules, in characters
    pub rule_width: usize,
    /// Maximum number of `var()` substitution passes
    pub max_var_depth: usize,
    /// Glyph placed before link targets
    pub link_icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CssConfig {
    /// Resolve stylesheets and emit palette commands (default: true)
    pub enabled: bool,
    /// Directory relative stylesheet links resolve against. Defaults to the
    /// directory of the rendered file.
    pub stylesheet_dir: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            rule_width: 40,
            max_var_depth: 8,
            link_icon: "🔗".to_string(),
        }
    }
}

impl Default for CssConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stylesheet_dir: None,
        }
    }
}

fn parse_flag(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}

impl SonardocConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `sonardoc.toml` from the current directory, or defaults if it is
    /// missing or invalid.
    pub fn load_or_default() -> Self {
        Self::load_from_file(CONFIG_FILE).unwrap_or_default()
    }

    /// Environment variables take precedence over file values. Unparsable
    /// numbers are ignored.
    pub fn merge_with_env(&mut self) {
        if let Ok(val) = std::env::var("SONARDOC_RULE_WIDTH")
            && let Ok(width) = val.trim().parse::<usize>()
        {
            self.render.rule_width = width;
        }
        if let Ok(val) = std::env::var("SONARDOC_MAX_VAR_DEPTH")
            && let Ok(depth) = val.trim().parse::<usize>()
        {
            self.render.max_var_depth = depth;
        }
        if let Ok(icon) = std::env::var("SONARDOC_LINK_ICON") {
            self.render.link_icon = icon;
        }

        if let Ok(val) = std::env::var("SONARDOC_CSS") {
            self.css.enabled = parse_flag(&val);
        }
        if let Ok(dir) = std::env::var("SONARDOC_STYLESHEET_DIR") {
            self.css.stylesheet_dir = Some(PathBuf::from(dir));
        }
    }

    /// File (or defaults) first, then environment overrides.
    pub fn load() -> Self {
        let mut config = Self::load_or_default();
        config.merge_with_env();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SonardocConfig::default();
        assert_eq!(config.render.rule_width, 40);
        assert_eq!(config.render.max_var_depth, 8);
        assert_eq!(config.render.link_icon, "🔗");
        assert!(config.css.enabled);
        assert!(config.css.stylesheet_dir.is_none());
    }

    #[test]
    fn test_toml_serialization() {
        let mut config = SonardocConfig::default();
        config.render.rule_width = 72;
        config.css.stylesheet_dir = Some(PathBuf::from("styles"));
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: SonardocConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[render]\nrule_width = 10\n").unwrap();
        let config = SonardocConfig::load_from_file(&path).unwrap();
        assert_eq!(config.render.rule_width, 10);
        assert_eq!(config.render.max_var_depth, 8);
        assert!(config.css.enabled);
    }

    #[test]
    fn test_load_errors_are_typed() {
        let dir = tempfile::tempdir().unwrap();
        let missing = SonardocConfig::load_from_file(dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[render\nrule_width = ").unwrap();
        let parsed = SonardocConfig::load_from_file(&bad);
        assert!(matches!(parsed, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_merge_with_env() {
        unsafe {
            std::env::set_var("SONARDOC_RULE_WIDTH", "12");
            std::env::set_var("SONARDOC_MAX_VAR_DEPTH", "not-a-number");
            std::env::set_var("SONARDOC_CSS", "false");
        }

        let mut config = SonardocConfig::default();
        config.merge_with_env();

        assert_eq!(config.render.rule_width, 12);
        assert_eq!(config.render.max_var_depth, 8);
        assert!(!config.css.enabled);

        unsafe {
            std::env::remove_var("SONARDOC_RULE_WIDTH");
            std::env::remove_var("SONARDOC_MAX_VAR_DEPTH");
            std::env::remove_var("SONARDOC_CSS");
        }
    }

    #[test]
    fn test_load_applies_env_over_defaults() {
        unsafe {
            std::env::set_var("SONARDOC_LINK_ICON", "->");
        }
        let config = SonardocConfig::load();
        assert_eq!(config.render.link_icon, "->");
        unsafe {
            std::env::remove_var("SONARDOC_LINK_ICON");
        }
    }
}
