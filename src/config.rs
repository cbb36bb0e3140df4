use serde::{Deserialize, Serialize};

use crate::error::{EsgError, Result};

/// Editing session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seed background points automatically when a spectrum is shown
    pub auto_background: bool,
    /// Number of 2θ windows used by the auto-background
    pub auto_background_windows: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_background: false,
            auto_background_windows: 5,
        }
    }
}

impl SessionConfig {
    /// Read settings from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SessionConfig = serde_json::from_str(json)
            .map_err(|e| EsgError::validation(format!("bad session config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("JSON error: {}", e))
    }

    pub fn validate(&self) -> Result<()> {
        if self.auto_background_windows == 0 {
            return Err(EsgError::validation(
                "auto-background needs at least one window",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = SessionConfig::from_json(r#"{"auto_background": true}"#).unwrap();
        assert!(config.auto_background);
        assert_eq!(config.auto_background_windows, 5);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = SessionConfig {
            auto_background: true,
            auto_background_windows: 8,
        };
        assert_eq!(SessionConfig::from_json(&config.to_json()).unwrap(), config);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(SessionConfig::from_json("{").is_err());
        assert!(SessionConfig::from_json(r#"{"auto_background_windows": 0}"#).is_err());
    }
}
