//! Error types for the adapter layer
//!
//! Adapter entry points report expected failures as values:
//! - Parse (dialect text → plan): [`ParseFailure`] with coded errors
//! - Serialize (plan → dialect text): [`SerializeFailure`] with coded errors
//! - Non-fatal findings travel alongside results as [`AdapterWarning`]s

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

/// Stable adapter error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdapterErrorCode {
    /// No recognizable document title
    MissingTitle,
    /// Declared intent is shorter than the plan minimum
    IntentTooShort,
    /// Plan has no intent to export
    MissingIntent,
    /// A required section is absent (strict structural validation)
    MissingSection,
    /// Plan hash could not be computed
    HashFailed,
    /// No registered adapter recognized the content
    NoAdapterDetected,
    /// Unexpected internal failure
    Internal,
}

impl AdapterErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingTitle => "MISSING_TITLE",
            Self::IntentTooShort => "INTENT_TOO_SHORT",
            Self::MissingIntent => "MISSING_INTENT",
            Self::MissingSection => "MISSING_SECTION",
            Self::HashFailed => "HASH_FAILED",
            Self::NoAdapterDetected => "NO_ADAPTER_DETECTED",
            Self::Internal => "INTERNAL",
        }
    }
}

impl Display for AdapterErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable adapter warning codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCode {
    /// A `[NEEDS CLARIFICATION: ...]` marker is still present
    UnresolvedClarification,
    /// An expected section is absent
    MissingSection,
    /// No tasks, requirements or stories produced any change
    NoProposedChanges,
    /// Plan carries no dialect structures; a minimal document was written
    DialectMetadataMissing,
    /// Proposed changes no longer match the dialect structures
    ChangesDiverged,
    /// Intent was cut to the maximum length
    IntentTruncated,
    /// An evidence annotation belongs to a different plan hash
    StaleEvidence,
}

impl WarningCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnresolvedClarification => "UNRESOLVED_CLARIFICATION",
            Self::MissingSection => "MISSING_SECTION",
            Self::NoProposedChanges => "NO_PROPOSED_CHANGES",
            Self::DialectMetadataMissing => "DIALECT_METADATA_MISSING",
            Self::ChangesDiverged => "CHANGES_DIVERGED",
            Self::IntentTruncated => "INTENT_TRUNCATED",
            Self::StaleEvidence => "STALE_EVIDENCE",
        }
    }
}

impl Display for WarningCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 1-based position in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    /// Location of a byte offset in `text`
    #[must_use]
    pub fn at(text: &str, offset: usize) -> Self {
        let (line, column) = crate::markdown::line_col(text, offset);
        Self { line, column }
    }
}

impl Display for SourceLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A coded adapter error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct AdapterError {
    pub code: AdapterErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl AdapterError {
    pub fn new(code: AdapterErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: None,
        }
    }

    /// Attach a source position
    #[must_use]
    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Wrap an unexpected internal failure
    pub fn internal(err: impl Display) -> Self {
        Self::new(AdapterErrorCode::Internal, err.to_string())
    }
}

/// A non-fatal finding attached to a successful result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterWarning {
    pub code: WarningCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl AdapterWarning {
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: None,
        }
    }

    #[must_use]
    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }
}

impl Display for AdapterWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " (at {location})")?;
        }
        Ok(())
    }
}

fn summarize(errors: &[AdapterError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parsing produced no plan
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("parse failed: {}", summarize(.errors))]
pub struct ParseFailure {
    /// At least one error
    pub errors: Vec<AdapterError>,
    /// Warnings gathered before the failure
    pub warnings: Vec<AdapterWarning>,
}

impl ParseFailure {
    /// Failure with a single error
    pub fn single(code: AdapterErrorCode, message: impl Into<String>) -> Self {
        Self {
            errors: vec![AdapterError::new(code, message)],
            warnings: Vec::new(),
        }
    }

    /// Whether any error carries `code`
    #[must_use]
    pub fn has_code(&self, code: AdapterErrorCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }
}

impl From<AdapterError> for ParseFailure {
    fn from(error: AdapterError) -> Self {
        Self {
            errors: vec![error],
            warnings: Vec::new(),
        }
    }
}

/// Serialization produced no document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("serialize failed: {}", summarize(.errors))]
pub struct SerializeFailure {
    pub errors: Vec<AdapterError>,
}

impl SerializeFailure {
    pub fn single(code: AdapterErrorCode, message: impl Into<String>) -> Self {
        Self {
            errors: vec![AdapterError::new(code, message)],
        }
    }

    #[must_use]
    pub fn has_code(&self, code: AdapterErrorCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }
}

/// Errors managing the adapter registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// An adapter with the same name is already registered
    #[error("adapter already registered: '{0}'")]
    DuplicateAdapter(String),
}

/// Errors loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading the config file
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid TOML or unknown keys
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value outside its allowed range
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

impl ConfigError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_error_display() {
        let err = AdapterError::new(AdapterErrorCode::MissingTitle, "no feature title");
        assert_eq!(err.to_string(), "[MISSING_TITLE] no feature title");
    }

    #[test]
    fn warning_display_with_location() {
        let warning = AdapterWarning::new(WarningCode::UnresolvedClarification, "FR-001")
            .at(SourceLocation { line: 12, column: 5 });
        assert_eq!(
            warning.to_string(),
            "[UNRESOLVED_CLARIFICATION] FR-001 (at 12:5)"
        );
    }

    #[test]
    fn parse_failure_lists_errors() {
        let failure = ParseFailure {
            errors: vec![
                AdapterError::new(AdapterErrorCode::MissingTitle, "a"),
                AdapterError::new(AdapterErrorCode::Internal, "b"),
            ],
            warnings: Vec::new(),
        };
        assert_eq!(
            failure.to_string(),
            "parse failed: [MISSING_TITLE] a; [INTERNAL] b"
        );
        assert!(failure.has_code(AdapterErrorCode::Internal));
    }

    #[test]
    fn codes_serialize_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&AdapterErrorCode::NoAdapterDetected).unwrap(),
            "\"NO_ADAPTER_DETECTED\""
        );
        assert_eq!(
            serde_json::to_string(&WarningCode::ChangesDiverged).unwrap(),
            "\"CHANGES_DIVERGED\""
        );
    }

    #[test]
    fn registry_error_display() {
        let err = RegistryError::DuplicateAdapter("speckit".to_string());
        assert_eq!(err.to_string(), "adapter already registered: 'speckit'");
    }

    #[test]
    fn source_location_from_offset() {
        let text = "# Title\n\nline three";
        assert_eq!(SourceLocation::at(text, 9), SourceLocation { line: 3, column: 1 });
    }
}
