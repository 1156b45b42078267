use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::consts::{DEFAULT_FIELD, DEFAULT_MAX_CHUNK};
use crate::errors::{CoolerError, Result};

///
/// Reader settings shared by every selector of an open [crate::Cooler].
///
/// All keys are optional in TOML:
///
/// ```toml
/// max_chunk = 10000000
/// default_field = "count"
/// convert_enum = true
/// ```
///
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoolerConfig {
    /// Largest rows x cols rectangle read in one pass by the matrix reader.
    pub max_chunk: u64,
    /// Pixel column used to fill matrices when a query names none.
    pub default_field: String,
    /// Decode enum-coded columns into labels instead of raw integer codes.
    pub convert_enum: bool,
}

impl Default for CoolerConfig {
    fn default() -> Self {
        CoolerConfig {
            max_chunk: DEFAULT_MAX_CHUNK,
            default_field: DEFAULT_FIELD.to_string(),
            convert_enum: true,
        }
    }
}

impl CoolerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: CoolerConfig =
            toml::from_str(s).map_err(|e| CoolerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&s)
    }

    fn validate(&self) -> Result<()> {
        if self.max_chunk == 0 {
            return Err(CoolerError::Config("max_chunk must be positive".to_string()));
        }
        if self.default_field.is_empty() {
            return Err(CoolerError::Config("default_field cannot be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    fn test_empty_toml_gives_defaults() {
        let config = CoolerConfig::from_toml_str("").unwrap();
        assert_eq!(config, CoolerConfig::default());
    }

    #[rstest]
    fn test_partial_toml() {
        let config = CoolerConfig::from_toml_str("max_chunk = 42\nconvert_enum = false").unwrap();
        assert_eq!(config.max_chunk, 42);
        assert_eq!(config.default_field, "count");
        assert!(!config.convert_enum);
    }

    #[rstest]
    #[case("max_chunk = 0")]
    #[case("default_field = \"\"")]
    #[case("chunk = 10")]
    fn test_bad_config(#[case] toml: &str) {
        let res = CoolerConfig::from_toml_str(toml);
        assert!(matches!(res, Err(CoolerError::Config(_))));
    }
}
