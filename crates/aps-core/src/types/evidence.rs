//! Validation evidence
//!
//! An [`Evidence`] record is an immutable snapshot of one quality-gate run.
//! Plans only ever append evidence; existing entries are never edited.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// Variant docs would turn the schema's string enum into a `oneOf`.
/// Overall outcome of a gate run
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum GateStatus {
    Passed,
    Failed,
    Partial,
}

impl GateStatus {
    /// Wire name of the status
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Partial => "partial",
        }
    }

    /// Derive the overall status from individual check results
    ///
    /// No failures → passed; only failures (ignoring skips) → failed;
    /// anything else → partial.
    #[must_use]
    pub fn from_checks(checks: &[CheckResult]) -> Self {
        let failed = checks
            .iter()
            .filter(|c| c.status == CheckStatus::Failed)
            .count();
        let counted = checks
            .iter()
            .filter(|c| c.status != CheckStatus::Skipped)
            .count();
        let warned = checks.iter().any(|c| c.status == CheckStatus::Warning);

        match failed {
            0 if warned => Self::Partial,
            0 => Self::Passed,
            n if n == counted => Self::Failed,
            _ => Self::Partial,
        }
    }
}

// Variant docs would turn the schema's string enum into a `oneOf`.
/// Outcome of a single check
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Passed,
    Failed,
    Skipped,
    Warning,
}

impl CheckStatus {
    /// Short uppercase label used in text reports
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Passed => "PASS",
            Self::Failed => "FAIL",
            Self::Skipped => "SKIP",
            Self::Warning => "WARN",
        }
    }
}

/// Result of one named check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CheckResult {
    /// Check identifier, such as `lint` or `unit-tests`
    #[schemars(length(min = 1))]
    pub name: String,
    /// Outcome
    pub status: CheckStatus,
    /// When the check ran
    pub timestamp: DateTime<Utc>,
    /// Short human-readable result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Tool-specific structured output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl CheckResult {
    /// Create check result
    #[must_use]
    pub fn new(name: impl Into<String>, status: CheckStatus, timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            status,
            timestamp,
            message: None,
            details: None,
        }
    }

    /// With message
    #[inline]
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// With structured details
    #[inline]
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Snapshot of one validation run against a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Evidence {
    /// Version of the gate that produced the evidence
    #[schemars(length(min = 1))]
    pub gate_version: String,
    /// When the gate run finished
    pub timestamp: DateTime<Utc>,
    /// Aggregate outcome of all checks
    pub overall_status: GateStatus,
    /// Check results in execution order
    pub checks: Vec<CheckResult>,
    /// One-line description of the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Named report locations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<BTreeMap<String, String>>,
}

impl Evidence {
    /// Create evidence with an explicit overall status
    #[must_use]
    pub fn new(
        gate_version: impl Into<String>,
        timestamp: DateTime<Utc>,
        overall_status: GateStatus,
    ) -> Self {
        Self {
            gate_version: gate_version.into(),
            timestamp,
            overall_status,
            checks: Vec::new(),
            summary: None,
            artifacts: None,
        }
    }

    /// Create evidence whose overall status is derived from its checks
    #[must_use]
    pub fn from_checks(
        gate_version: impl Into<String>,
        timestamp: DateTime<Utc>,
        checks: Vec<CheckResult>,
    ) -> Self {
        let overall_status = GateStatus::from_checks(&checks);
        Self {
            checks,
            ..Self::new(gate_version, timestamp, overall_status)
        }
    }

    /// With an additional check
    #[must_use]
    pub fn with_check(mut self, check: CheckResult) -> Self {
        self.checks.push(check);
        self
    }

    /// With summary text
    #[inline]
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// With a named artifact location
    #[must_use]
    pub fn with_artifact(mut self, name: impl Into<String>, location: impl Into<String>) -> Self {
        self.artifacts
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), location.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap()
    }

    fn check(name: &str, status: CheckStatus) -> CheckResult {
        CheckResult::new(name, status, ts())
    }

    #[test]
    fn overall_status_all_passed() {
        let checks = [check("lint", CheckStatus::Passed), check("test", CheckStatus::Skipped)];
        assert_eq!(GateStatus::from_checks(&checks), GateStatus::Passed);
    }

    #[test]
    fn overall_status_all_failed() {
        let checks = [check("lint", CheckStatus::Failed), check("test", CheckStatus::Failed)];
        assert_eq!(GateStatus::from_checks(&checks), GateStatus::Failed);
    }

    #[test]
    fn overall_status_mixed_is_partial() {
        let checks = [check("lint", CheckStatus::Passed), check("test", CheckStatus::Failed)];
        assert_eq!(GateStatus::from_checks(&checks), GateStatus::Partial);

        let warned = [check("lint", CheckStatus::Warning)];
        assert_eq!(GateStatus::from_checks(&warned), GateStatus::Partial);
    }

    #[test]
    fn evidence_builder_keeps_check_order() {
        let evidence = Evidence::new("1.0.0", ts(), GateStatus::Passed)
            .with_check(check("lint", CheckStatus::Passed))
            .with_check(check("test", CheckStatus::Passed))
            .with_artifact("coverage", "reports/coverage.html");

        let names: Vec<_> = evidence.checks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["lint", "test"]);
        assert_eq!(
            evidence.artifacts.as_ref().unwrap()["coverage"],
            "reports/coverage.html"
        );
    }

    #[test]
    fn check_labels() {
        assert_eq!(CheckStatus::Passed.label(), "PASS");
        assert_eq!(CheckStatus::Failed.label(), "FAIL");
    }
}
