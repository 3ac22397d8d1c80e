//! Plan validation engine
//!
//! Validation never fails with `Err` on bad input: every check returns a
//! report carrying structured [`ValidationIssue`]s.
//!
//! 1. Schema: closed-structure check against the generated JSON Schema
//! 2. Hash: recompute the canonical hash and compare with the stored one

use crate::hash::hash_plan_value;
use crate::plan::Plan;
use crate::schema::compiled_schema;
use jsonschema::error::ValidationErrorKind;
use jsonschema::paths::PathChunk;
use jsonschema::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};
use tracing::{debug, instrument};

/// Path sentinel for issues that concern the whole document
pub const ROOT_PATH: &str = "(root)";

/// Stable issue codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    /// Value has the wrong JSON type
    InvalidType,
    /// Required field is absent
    Required,
    /// String or array below its minimum length
    TooSmall,
    /// String or array above its maximum length
    TooBig,
    /// String does not match its pattern
    PatternMismatch,
    /// String is not in the declared format
    InvalidFormat,
    /// Value differs from a fixed literal
    InvalidLiteral,
    /// Value is not one of the allowed names
    InvalidEnumValue,
    /// Object carries fields the schema does not know
    UnrecognizedKeys,
    /// Stored hash differs from the recomputed one
    HashMismatch,
    /// Hash step did not run
    HashSkipped,
    /// Validator failure unrelated to the input
    Internal,
}

impl IssueCode {
    /// Wire name of the code
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidType => "INVALID_TYPE",
            Self::Required => "REQUIRED",
            Self::TooSmall => "TOO_SMALL",
            Self::TooBig => "TOO_BIG",
            Self::PatternMismatch => "PATTERN_MISMATCH",
            Self::InvalidFormat => "INVALID_FORMAT",
            Self::InvalidLiteral => "INVALID_LITERAL",
            Self::InvalidEnumValue => "INVALID_ENUM_VALUE",
            Self::UnrecognizedKeys => "UNRECOGNIZED_KEYS",
            Self::HashMismatch => "HASH_MISMATCH",
            Self::HashSkipped => "HASH_SKIPPED",
            Self::Internal => "INTERNAL",
        }
    }
}

impl Display for IssueCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Makes the document invalid
    Error,
    /// Reported only
    Warning,
}

/// One validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted field path, or [`ROOT_PATH`]
    pub path: String,
    /// Human-readable description
    pub message: String,
    /// Stable machine-readable code
    pub code: IssueCode,
    /// Error or warning
    pub severity: Severity,
}

impl ValidationIssue {
    /// Create an error-severity issue
    #[must_use]
    pub fn error(path: impl Into<String>, message: impl Into<String>, code: IssueCode) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            code,
            severity: Severity::Error,
        }
    }

    /// Create a warning-severity issue
    #[must_use]
    pub fn warning(path: impl Into<String>, message: impl Into<String>, code: IssueCode) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            code,
            severity: Severity::Warning,
        }
    }

    /// Whether the issue has error severity
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Result of the schema step
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaValidation {
    /// Document matched the schema
    pub valid: bool,
    /// Decoded plan when the document passed
    pub data: Option<Plan>,
    /// Schema findings
    pub issues: Vec<ValidationIssue>,
}

/// Outcome of the hash step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashStatus {
    /// Stored hash matches
    Verified,
    /// Stored hash differs
    Mismatch,
    /// No hash function configured
    Skipped,
}

/// Result of the hash step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashValidation {
    /// Result of the comparison
    pub status: HashStatus,
    /// Hash findings
    pub issues: Vec<ValidationIssue>,
}

impl HashValidation {
    /// Skipped is not a failure
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.status != HashStatus::Mismatch
    }
}

/// How the report is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Structured issues plus a multi-line text report
    #[default]
    Cli,
    /// Structured issues only
    Raw,
}

/// Options for [`PlanValidator::validate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidateOptions {
    /// Stop after a schema failure
    pub strict: bool,
    /// Run the hash step when the schema passed
    pub check_hash: bool,
    /// Report rendering
    pub output: OutputFormat,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            strict: true,
            check_hash: true,
            output: OutputFormat::Cli,
        }
    }
}

impl ValidateOptions {
    /// With strict mode
    #[inline]
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// With or without the hash step
    #[inline]
    #[must_use]
    pub fn with_check_hash(mut self, check_hash: bool) -> Self {
        self.check_hash = check_hash;
        self
    }

    /// With output format
    #[inline]
    #[must_use]
    pub fn with_output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }
}

/// Aggregated validation outcome
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// No error-severity issues
    pub valid: bool,
    /// Schema step passed
    pub schema_valid: bool,
    /// `None` when the hash step did not run
    pub hash_status: Option<HashStatus>,
    /// All findings, schema step first
    pub issues: Vec<ValidationIssue>,
    /// Rendered report for [`OutputFormat::Cli`]
    pub formatted: Option<String>,
    /// Decoded plan when the schema step passed
    pub data: Option<Plan>,
}

impl ValidationReport {
    /// Error-severity issues
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.is_error())
    }

    /// Warning-severity issues
    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| !i.is_error())
    }
}

/// Hash strategy: canonical hash of a plan document
pub type HashFn = fn(&Value) -> String;

/// Validator with an optional hash strategy
///
/// Without a strategy every hash step reports [`HashStatus::Skipped`] with a
/// `HASH_SKIPPED` warning.
#[derive(Debug, Clone, Copy)]
pub struct PlanValidator {
    hash_fn: Option<HashFn>,
}

impl Default for PlanValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanValidator {
    /// Validator using the canonical SHA-256 plan hash
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            hash_fn: Some(hash_plan_value),
        }
    }

    /// Validator with a custom hash strategy
    #[inline]
    #[must_use]
    pub fn with_hash_fn(hash_fn: HashFn) -> Self {
        Self {
            hash_fn: Some(hash_fn),
        }
    }

    /// Validator that skips every hash step
    #[inline]
    #[must_use]
    pub fn without_hashing() -> Self {
        Self { hash_fn: None }
    }

    /// Whether a hash strategy is configured
    #[inline]
    #[must_use]
    pub fn hashes(&self) -> bool {
        self.hash_fn.is_some()
    }

    /// Check the document against the plan schema
    #[instrument(level = "debug", skip_all)]
    pub fn validate_schema(&self, document: &Value) -> SchemaValidation {
        validate_schema(document)
    }

    /// Recompute the hash and compare with the stored `hash` field
    #[instrument(level = "debug", skip_all)]
    pub fn validate_hash(&self, document: &Value) -> HashValidation {
        let Some(hash_fn) = self.hash_fn else {
            debug!("hash validation skipped: no hash strategy configured");
            return HashValidation {
                status: HashStatus::Skipped,
                issues: vec![ValidationIssue::warning(
                    "hash",
                    "Hash validation skipped: no hash function configured",
                    IssueCode::HashSkipped,
                )],
            };
        };

        let stored = document.get("hash").and_then(Value::as_str).unwrap_or("");
        let computed = hash_fn(document);

        if computed == stored {
            HashValidation {
                status: HashStatus::Verified,
                issues: Vec::new(),
            }
        } else {
            debug!(expected = %computed, actual = %stored, "hash mismatch");
            HashValidation {
                status: HashStatus::Mismatch,
                issues: vec![ValidationIssue::error(
                    "hash",
                    format!("Hash mismatch: expected {computed}, got {stored}"),
                    IssueCode::HashMismatch,
                )],
            }
        }
    }

    /// Schema step, then (if requested and the schema passed) hash step
    #[instrument(level = "debug", skip(self, document))]
    pub fn validate(&self, document: &Value, options: &ValidateOptions) -> ValidationReport {
        let schema = self.validate_schema(document);
        let mut issues = schema.issues;
        let mut hash_status = None;

        if options.strict && !schema.valid {
            debug!(issues = issues.len(), "strict validation stopped at schema step");
            return Self::report(false, hash_status, issues, options, schema.data);
        }

        // The hash step only ever runs on a structurally valid document.
        if options.check_hash && schema.valid {
            let hash = self.validate_hash(document);
            hash_status = Some(hash.status);
            issues.extend(hash.issues);
        }

        debug!(schema_valid = schema.valid, issues = issues.len(), "validation complete");
        Self::report(schema.valid, hash_status, issues, options, schema.data)
    }

    fn report(
        schema_valid: bool,
        hash_status: Option<HashStatus>,
        issues: Vec<ValidationIssue>,
        options: &ValidateOptions,
        data: Option<Plan>,
    ) -> ValidationReport {
        let formatted = match options.output {
            OutputFormat::Cli => Some(format_issues(&issues)),
            OutputFormat::Raw => None,
        };
        ValidationReport {
            valid: !issues.iter().any(ValidationIssue::is_error),
            schema_valid,
            hash_status,
            issues,
            formatted,
            data,
        }
    }
}

/// Check a document against the plan schema
pub fn validate_schema(document: &Value) -> SchemaValidation {
    let compiled = match compiled_schema() {
        Ok(compiled) => compiled,
        Err(message) => {
            return SchemaValidation {
                valid: false,
                data: None,
                issues: vec![ValidationIssue::error(
                    ROOT_PATH,
                    format!("Schema unavailable: {message}"),
                    IssueCode::Internal,
                )],
            };
        }
    };

    let issues: Vec<ValidationIssue> = match compiled.validate(document) {
        Ok(()) => Vec::new(),
        Err(errors) => errors.map(|e| issue_from_error(&e)).collect(),
    };

    if !issues.is_empty() {
        return SchemaValidation {
            valid: false,
            data: None,
            issues,
        };
    }

    match serde_json::from_value::<Plan>(document.clone()) {
        Ok(plan) => SchemaValidation {
            valid: true,
            data: Some(plan),
            issues,
        },
        Err(e) => SchemaValidation {
            valid: false,
            data: None,
            issues: vec![ValidationIssue::error(ROOT_PATH, e.to_string(), IssueCode::Internal)],
        },
    }
}

/// Whether the document passes the schema step
#[must_use]
pub fn is_schema_valid(document: &Value) -> bool {
    validate_schema(document).valid
}

/// Validate with the default validator in strict, hash-checking mode
#[must_use]
pub fn validate_aps_plan(document: &Value) -> ValidationReport {
    PlanValidator::new().validate(document, &ValidateOptions::default())
}

/// Render issues as a multi-line report
///
/// One `✗ path: message [CODE]` line per error (`⚠` for warnings), then a
/// summary line.
#[must_use]
pub fn format_issues(issues: &[ValidationIssue]) -> String {
    if issues.is_empty() {
        return "✓ Plan is valid".to_string();
    }

    let mut lines: Vec<String> = issues
        .iter()
        .map(|issue| {
            let marker = if issue.is_error() { '✗' } else { '⚠' };
            format!("{marker} {}: {} [{}]", issue.path, issue.message, issue.code)
        })
        .collect();

    let errors = issues.iter().filter(|i| i.is_error()).count();
    let warnings = issues.len() - errors;
    lines.push(format!("{errors} error(s), {warnings} warning(s)"));
    lines.join("\n")
}

fn dotted_path(chunks: &[PathChunk]) -> String {
    let parts: Vec<String> = chunks
        .iter()
        .map(|chunk| match chunk {
            PathChunk::Property(name) => name.to_string(),
            PathChunk::Index(index) => index.to_string(),
            PathChunk::Keyword(keyword) => (*keyword).to_string(),
        })
        .collect();
    if parts.is_empty() {
        ROOT_PATH.to_string()
    } else {
        parts.join(".")
    }
}

fn join_path(parent: &str, child: &str) -> String {
    if parent == ROOT_PATH {
        child.to_string()
    } else {
        format!("{parent}.{child}")
    }
}

fn issue_from_error(error: &ValidationError<'_>) -> ValidationIssue {
    let chunks: Vec<PathChunk> = error.instance_path.iter().cloned().collect();
    let path = dotted_path(&chunks);

    let (path, message, code) = match &error.kind {
        ValidationErrorKind::MinLength { limit } => (
            path,
            format!("String must contain at least {limit} character(s)"),
            IssueCode::TooSmall,
        ),
        ValidationErrorKind::MaxLength { limit } => (
            path,
            format!("String must contain at most {limit} character(s)"),
            IssueCode::TooBig,
        ),
        ValidationErrorKind::Pattern { pattern } => (
            path,
            format!("String must match pattern {pattern}"),
            IssueCode::PatternMismatch,
        ),
        ValidationErrorKind::Constant { expected_value } => (
            path,
            format!("Invalid literal value, expected {expected_value}"),
            IssueCode::InvalidLiteral,
        ),
        ValidationErrorKind::Enum { options } => (
            path,
            format!("Invalid enum value. Expected one of {options}"),
            IssueCode::InvalidEnumValue,
        ),
        ValidationErrorKind::AdditionalProperties { unexpected } => (
            path,
            format!("Unrecognized key(s) in object: {}", unexpected.join(", ")),
            IssueCode::UnrecognizedKeys,
        ),
        ValidationErrorKind::Required { property } => {
            let name = property
                .as_str()
                .map_or_else(|| property.to_string(), str::to_string);
            (join_path(&path, &name), "Required".to_string(), IssueCode::Required)
        }
        ValidationErrorKind::Type { .. } => (path, error.to_string(), IssueCode::InvalidType),
        ValidationErrorKind::Format { format } => (
            path,
            format!("Invalid {format}"),
            IssueCode::InvalidFormat,
        ),
        ValidationErrorKind::UniqueItems => (
            path,
            "Array items must be unique".to_string(),
            IssueCode::InvalidType,
        ),
        _ => (path, error.to_string(), IssueCode::Internal),
    };

    ValidationIssue::error(path, message, code)
}
