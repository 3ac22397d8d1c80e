//! Configuration
//!
//! ```toml
//! [validation]
//! strict = true
//! check_hash = true
//! output = "cli"
//!
//! [detection]
//! min_confidence = 50
//!
//! [export]
//! include_evidence = true
//! include_identity_header = true
//! ```
//!
//! Every key is optional; unknown keys are rejected.

use crate::adapters::SerializeOptions;
use crate::detect::{DEFAULT_MIN_CONFIDENCE, MAX_CONFIDENCE};
use crate::error::ConfigError;
use crate::registry::AdapterRegistry;
use aps_core::{OutputFormat, ValidateOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Top-level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApsConfig {
    pub validation: ValidationConfig,
    pub detection: DetectionConfig,
    pub export: ExportConfig,
}

/// Plan validation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    /// Stop after a schema failure
    pub strict: bool,
    pub check_hash: bool,
    pub output: OutputFormat,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let options = ValidateOptions::default();
        Self {
            strict: options.strict,
            check_hash: options.check_hash,
            output: options.output,
        }
    }
}

/// Format detection settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectionConfig {
    /// Confidence an adapter must reach to be chosen (0-100)
    pub min_confidence: u8,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

/// Export settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub include_evidence: bool,
    pub include_identity_header: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        let options = SerializeOptions::default();
        Self {
            include_evidence: options.include_evidence,
            include_identity_header: options.include_identity_header,
        }
    }
}

impl ApsConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With strict validation
    #[inline]
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.validation.strict = strict;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_check_hash(mut self, check_hash: bool) -> Self {
        self.validation.check_hash = check_hash;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_output(mut self, output: OutputFormat) -> Self {
        self.validation.output = output;
        self
    }

    /// With detection threshold
    #[inline]
    #[must_use]
    pub fn with_min_confidence(mut self, min_confidence: u8) -> Self {
        self.detection.min_confidence = min_confidence;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_include_evidence(mut self, include: bool) -> Self {
        self.export.include_evidence = include;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_include_identity_header(mut self, include: bool) -> Self {
        self.export.include_identity_header = include;
        self
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// Returns error on invalid TOML, unknown keys or out-of-range values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is invalid
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::io_error(path, e))?;
        let config = Self::from_toml_str(&text)?;
        debug!(path = %path.display(), ?config, "configuration loaded");
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns `InvalidValue` for a confidence above the maximum
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.detection.min_confidence > MAX_CONFIDENCE {
            return Err(ConfigError::InvalidValue {
                key: "detection.min_confidence",
                message: format!(
                    "{} exceeds the maximum of {MAX_CONFIDENCE}",
                    self.detection.min_confidence
                ),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn validate_options(&self) -> ValidateOptions {
        ValidateOptions::default()
            .with_strict(self.validation.strict)
            .with_check_hash(self.validation.check_hash)
            .with_output(self.validation.output)
    }

    #[must_use]
    pub fn serialize_options(&self) -> SerializeOptions {
        SerializeOptions {
            include_evidence: self.export.include_evidence,
            include_identity_header: self.export.include_identity_header,
        }
    }

    /// Default adapters with the configured detection threshold
    #[must_use]
    pub fn registry(&self) -> AdapterRegistry {
        AdapterRegistry::with_defaults().with_min_confidence(self.detection.min_confidence)
    }
}
