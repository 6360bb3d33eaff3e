use std::path::Path;

use report_protocol::{AreaQueryMode, DisplayType, TYPENAME_PREFIX};
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};

/// Tunables for the report pipeline, usually read from a TOML file.
///
/// ```toml
/// [sanitize]
/// root_fields = ["organisation"]
///
/// [factory]
/// view_name = "Overview"
/// area_query_mode = "PointsWithin"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub sanitize: SanitizeConfig,
    pub factory: FactoryConfig,
}

/// What the update sanitizer strips before a document goes upstream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SanitizeConfig {
    /// Keys starting with this prefix are removed at every depth
    pub discriminator_prefix: String,

    /// Server-populated relations removed from the report root
    pub root_fields: Vec<String>,

    /// Computed or sharing fields removed from each `layers[]` entry
    pub layer_fields: Vec<String>,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            discriminator_prefix: TYPENAME_PREFIX.to_string(),
            root_fields: vec!["organisation".to_string()],
            layer_fields: vec![
                "isSharedSource".to_string(),
                "sharingPermission".to_string(),
                "sourceData".to_string(),
            ],
        }
    }
}

/// Defaults for freshly created reports
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FactoryConfig {
    /// Name of the single map view a new report starts with
    pub view_name: String,

    pub display_type: DisplayType,

    pub area_query_mode: AreaQueryMode,

    /// How many leading characters of the report id are appended to the slug
    pub slug_id_chars: usize,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            view_name: "Map".to_string(),
            display_type: DisplayType::Properties,
            area_query_mode: AreaQueryMode::Overlapping,
            slug_id_chars: 8,
        }
    }
}

impl ReportConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&raw)?;
        log::debug!("loaded report config from {}", path.display());
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.sanitize.discriminator_prefix.is_empty() {
            return Err(ReportError::invalid_config(
                "sanitize.discriminator_prefix must not be empty",
            ));
        }

        if self.factory.view_name.trim().is_empty() {
            return Err(ReportError::invalid_config(
                "factory.view_name must not be empty",
            ));
        }

        if self.factory.slug_id_chars > 36 {
            return Err(ReportError::invalid_config(format!(
                "factory.slug_id_chars ({}) cannot exceed the id length (36)",
                self.factory.slug_id_chars
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_valid() {
        assert!(ReportConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ReportConfig::from_toml_str(
            r#"
            [factory]
            view_name = "Overview"
            area_query_mode = "PointsWithin"
            "#,
        )
        .unwrap();

        assert_eq!(config.factory.view_name, "Overview");
        assert_eq!(config.factory.area_query_mode, AreaQueryMode::PointsWithin);
        assert_eq!(config.factory.display_type, DisplayType::Properties);
        assert_eq!(config.sanitize, SanitizeConfig::default());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ReportConfig::default();

        config.sanitize.discriminator_prefix.clear();
        assert!(config.validate().is_err());

        config = ReportConfig::default();
        config.factory.view_name = "   ".to_string();
        assert!(config.validate().is_err());

        config = ReportConfig::default();
        config.factory.slug_id_chars = 40;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let err = ReportConfig::from_toml_str("[factory\nview_name = 1").unwrap_err();
        assert!(matches!(err, ReportError::ConfigParse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sanitize]\nroot_fields = [\"organisation\", \"owner\"]").unwrap();

        let config = ReportConfig::load(file.path()).unwrap();
        assert_eq!(config.sanitize.root_fields, vec!["organisation", "owner"]);
        assert_eq!(config.sanitize.discriminator_prefix, "__");
    }
}
