//! Blueprint parsing from TOML / JSON.

use contracts::{PipelineBlueprint, PipelineError};

/// Supported configuration formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Map a file extension to a format
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse blueprint content in the given format
pub fn parse(content: &str, format: ConfigFormat) -> Result<PipelineBlueprint, PipelineError> {
    match format {
        ConfigFormat::Toml => toml::from_str(content)
            .map_err(|e| PipelineError::config_parse(format!("TOML parse error: {e}"))),
        ConfigFormat::Json => serde_json::from_str(content)
            .map_err(|e| PipelineError::config_parse(format!("JSON parse error: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_detection() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("JSON"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }

    #[test]
    fn parse_error_is_config_parse() {
        let result = parse("not { valid", ConfigFormat::Json);
        assert!(matches!(result, Err(PipelineError::ConfigParse { .. })));
    }
}
