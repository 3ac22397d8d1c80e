//! Format adapters
//!
//! An adapter is the only component that sees both a markdown dialect and
//! the canonical [`Plan`]. It detects its dialect, imports dialect text into
//! a plan, exports a plan back to dialect text and runs a quick structural
//! check without building a plan.
//!
//! Round trip: `parse` → `serialize` → `parse` yields a plan with the same
//! intent, ordered proposed changes and hash.

use crate::detect::DetectionResult;
use crate::error::{AdapterError, AdapterWarning, ParseFailure, SerializeFailure};
use aps_core::{Plan, ProvenanceSource, ValidateOptions};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod bmad;
pub mod evidence;
pub mod mapping;
mod speckit;

pub use bmad::BmadAdapter;
pub use speckit::SpecKitAdapter;

/// Format adapter between one markdown dialect and [`Plan`]
///
/// Implement this trait to add support for a new dialect. Adapters are
/// stateless and shared read-only once registered.
pub trait FormatAdapter: Send + Sync {
    /// Unique registry name
    fn name(&self) -> &str;

    /// One-line human description
    fn description(&self) -> &str;

    /// Format identifiers this adapter answers to
    fn formats(&self) -> &[&str];

    /// File extensions (without dot)
    fn extensions(&self) -> &[&str];

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::default()
    }

    /// Score how likely `content` is in this dialect
    fn detect(&self, content: &str) -> DetectionResult;

    /// Import dialect text as a plan
    ///
    /// # Errors
    /// Returns coded errors when no plan can be built
    fn parse(
        &self,
        content: &str,
        context: &ParseContext,
        options: &ParseOptions,
    ) -> Result<ParsedPlan, ParseFailure>;

    /// Export a plan as dialect text
    ///
    /// # Errors
    /// Returns coded errors when the plan lacks load-bearing data
    fn serialize(
        &self,
        plan: &Plan,
        options: &SerializeOptions,
    ) -> Result<SerializedDocument, SerializeFailure>;

    /// Structural check of raw dialect text
    fn validate(&self, content: &str, options: &ValidateOptions) -> StructuralValidation;

    /// Whether `format` names this adapter's format or extension
    fn supports(&self, format: &str) -> bool {
        let wanted = format.trim().trim_start_matches('.');
        self.formats()
            .iter()
            .chain(self.extensions())
            .any(|known| known.eq_ignore_ascii_case(wanted))
    }

    fn can_import(&self, format: &str) -> bool {
        self.capabilities().import && self.supports(format)
    }

    fn can_export(&self, format: &str) -> bool {
        self.capabilities().export && self.supports(format)
    }
}

/// What an adapter can do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterCapabilities {
    pub import: bool,
    pub export: bool,
    /// Writes evidence annotations on export
    pub evidence_injection: bool,
    /// Export re-imports to an equal plan
    pub round_trip: bool,
}

impl Default for AdapterCapabilities {
    fn default() -> Self {
        Self {
            import: true,
            export: true,
            evidence_injection: true,
            round_trip: true,
        }
    }
}

/// Caller-supplied facts used when importing
///
/// `timestamp` and `plan_id` override the clock and the id generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub source: ProvenanceSource,
    /// Version recorded in provenance
    pub tool_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
}

impl Default for ParseContext {
    fn default() -> Self {
        Self {
            author: None,
            source: ProvenanceSource::default(),
            tool_version: crate::VERSION.to_string(),
            repository: None,
            branch: None,
            commit: None,
            timestamp: None,
            plan_id: None,
        }
    }
}

impl ParseContext {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: ProvenanceSource) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn with_tool_version(mut self, version: impl Into<String>) -> Self {
        self.tool_version = version.into();
        self
    }

    #[must_use]
    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    #[must_use]
    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    /// Fix the clock
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Fix the plan id
    #[must_use]
    pub fn with_plan_id(mut self, plan_id: impl Into<String>) -> Self {
        self.plan_id = Some(plan_id.into());
        self
    }

    /// Context timestamp, or now
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.timestamp.unwrap_or_else(Utc::now)
    }
}

/// Import switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Take id and provenance from an `aps:plan` identity header
    pub preserve_identity: bool,
    /// Restore evidence from an `aps:evidence` annotation
    pub restore_evidence: bool,
    /// Turn BMAD QA gates into evidence records
    pub include_qa_evidence: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            preserve_identity: true,
            restore_evidence: true,
            include_qa_evidence: true,
        }
    }
}

/// Export switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializeOptions {
    /// Append the latest evidence as an annotation
    pub include_evidence: bool,
    /// Prefix the `aps:plan` identity header
    pub include_identity_header: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            include_evidence: true,
            include_identity_header: true,
        }
    }
}

/// Successful import
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPlan {
    pub plan: Plan,
    pub warnings: Vec<AdapterWarning>,
}

/// Successful export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedDocument {
    pub content: String,
    pub warnings: Vec<AdapterWarning>,
}

/// Outcome of [`FormatAdapter::validate`]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StructuralValidation {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<AdapterError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<AdapterWarning>,
}

impl StructuralValidation {
    /// Result from collected findings; valid when there are no errors
    #[must_use]
    pub fn from_findings(errors: Vec<AdapterError>, warnings: Vec<AdapterWarning>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}
