//! General settings shared by rule compilation.

use serde::{Deserialize, Serialize};

/// Separator used between rules when none is configured.
pub const DEFAULT_RSR_SEPARATOR: &str = ";";

/// Environment variable overriding [`Settings::rsr_separator`].
pub const RSR_SEPARATOR_ENV: &str = "RSR_SEPARATOR";

/// Knobs that affect how rule strings are compiled.
///
/// Usually embedded in a larger configuration document as a `"general"`
/// section; every field has a default so the section may be omitted.
///
/// ```
/// use rsrconf::Settings;
///
/// let settings: Settings = serde_json::from_str(r#"{"rsr_separator": "|"}"#).unwrap();
/// assert_eq!(settings.rsr_separator, "|");
/// assert_eq!(Settings::default().rsr_separator, ";");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Separator between the rules of a rule string
    pub rsr_separator: String,
}

impl Settings {
    /// Default settings with overrides taken from the process environment.
    ///
    /// An empty `RSR_SEPARATOR` is ignored, since rules cannot be split on
    /// an empty separator.
    pub fn from_env() -> Self {
        let rsr_separator = std::env::var(RSR_SEPARATOR_ENV)
            .ok()
            .filter(|sep| !sep.is_empty())
            .unwrap_or_else(|| DEFAULT_RSR_SEPARATOR.to_string());
        Self { rsr_separator }
    }

    /// Replace the separator, falling back to the default when empty.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        let separator = separator.into();
        self.rsr_separator = if separator.is_empty() {
            DEFAULT_RSR_SEPARATOR.to_string()
        } else {
            separator
        };
        self
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rsr_separator: DEFAULT_RSR_SEPARATOR.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_from_env() {
        std::env::set_var(RSR_SEPARATOR_ENV, "|");
        assert_eq!(Settings::from_env().rsr_separator, "|");

        std::env::set_var(RSR_SEPARATOR_ENV, "");
        assert_eq!(Settings::from_env().rsr_separator, ";");

        std::env::remove_var(RSR_SEPARATOR_ENV);
        assert_eq!(Settings::from_env().rsr_separator, ";");
    }

    #[test]
    fn test_with_separator() {
        assert_eq!(Settings::default().with_separator("&&").rsr_separator, "&&");
        assert_eq!(Settings::default().with_separator("").rsr_separator, ";");
    }
}
