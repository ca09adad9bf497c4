//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::SiteConfig;
use std::path::Path;

/// Name of the configuration file at the root of every site.
pub const CONFIG_FILE_NAME: &str = "kiln.toml";

/// Loads and validates `kiln.toml` from a site directory.
pub fn load_config(site_dir: &Path) -> Result<SiteConfig, ConfigError> {
    let config_path = site_dir.join(CONFIG_FILE_NAME);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `kiln.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<SiteConfig, ConfigError> {
    let config: SiteConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that directories are set and do not collide.
fn validate_config(config: &SiteConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("output_dir", &config.output_dir),
        ("tmp_dir", &config.tmp_dir),
        ("content_dir", &config.content_dir),
        ("layouts_dir", &config.layouts_dir),
        ("rules_file", &config.rules_file),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{name} must not be empty"
            )));
        }
    }
    if config.output_dir == config.tmp_dir {
        return Err(ConfigError::ValidationError(
            "output_dir and tmp_dir must differ".to_string(),
        ));
    }
    if config.output_dir == config.content_dir {
        return Err(ConfigError::ValidationError(
            "output_dir and content_dir must differ".to_string(),
        ));
    }
    if let Some(bad) = config.text_extensions.iter().find(|e| e.starts_with('.')) {
        return Err(ConfigError::ValidationError(format!(
            "text extension '{bad}' must be given without a leading dot"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::StringPatternType;
    use serde_json::Value;

    #[test]
    fn empty_config_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config, SiteConfig::default());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
title = "My Blog"
base_url = "https://example.com"
output_dir = "public"
tmp_dir = ".kiln"
rules_file = "Rules.toml"
string_pattern_type = "legacy"
text_extensions = ["md", "html"]
strip_index_filenames = false

[author]
name = "Ada"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.output_dir, "public");
        assert_eq!(config.tmp_dir, ".kiln");
        assert_eq!(config.rules_file, "Rules.toml");
        assert_eq!(config.string_pattern_type, StringPatternType::Legacy);
        assert_eq!(config.text_extensions, vec!["md", "html"]);
        assert!(!config.strip_index_filenames);
        assert_eq!(config.site["title"], Value::from("My Blog"));
        assert_eq!(config.site["author"]["name"], Value::from("Ada"));
    }

    #[test]
    fn empty_output_dir_errors() {
        let err = load_config_from_str("output_dir = \"\"").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn colliding_dirs_error() {
        let err = load_config_from_str("output_dir = \"x\"\ntmp_dir = \"x\"").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn dotted_extension_errors() {
        let err = load_config_from_str("text_extensions = [\".md\"]").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn unknown_pattern_type_errors() {
        let err = load_config_from_str("string_pattern_type = \"regex\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "title = \"x\"\n").unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.site["title"], Value::from("x"));
    }

    #[test]
    fn io_error_from_nonexistent_dir() {
        let err = load_config(Path::new("/nonexistent/dir")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
