//! Declared validations, approval and execution records

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Checks a plan declares as required or optional
///
/// Descriptive only; evidence records carry the actual results.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Validations {
    /// Checks that must pass before approval
    #[serde(default)]
    pub required: Vec<String>,
    /// Checks that are reported but not enforced
    #[serde(default)]
    pub optional: Vec<String>,
    /// Version of the policy set the checks come from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_bundle_version: Option<String>,
}

/// Human sign-off
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Approval {
    /// Whether the plan was approved
    pub approved: bool,
    /// Approver identity
    #[schemars(length(min = 1))]
    pub approved_by: String,
    /// Time of the decision
    pub approved_at: DateTime<Utc>,
    /// Free-text remarks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_notes: Option<String>,
}

// Variant docs would turn the schema's string enum into a `oneOf`.
/// Kind of execution performed against a plan
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionOperation {
    Apply,
    Rollback,
}

// Variant docs would turn the schema's string enum into a `oneOf`.
/// Outcome of an execution
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Partial,
}

/// Record of an apply or rollback operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Execution {
    /// Apply or rollback
    pub operation: ExecutionOperation,
    /// Outcome
    pub status: ExecutionStatus,
    /// When the operation finished
    pub timestamp: DateTime<Utc>,
    /// Operator or automation identity
    #[schemars(length(min = 1))]
    pub executed_by: String,
    /// Paths changed successfully
    #[serde(default)]
    pub changes_applied: Vec<String>,
    /// Paths that failed to change
    #[serde(default)]
    pub changes_failed: Vec<String>,
}

impl Execution {
    /// Derive the status from applied/failed path lists
    #[must_use]
    pub fn status_for(applied: &[String], failed: &[String]) -> ExecutionStatus {
        match (applied.is_empty(), failed.is_empty()) {
            (_, true) => ExecutionStatus::Success,
            (true, false) => ExecutionStatus::Failed,
            (false, false) => ExecutionStatus::Partial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_status_derivation() {
        let some = vec!["a".to_string()];
        let none: Vec<String> = Vec::new();
        assert_eq!(Execution::status_for(&some, &none), ExecutionStatus::Success);
        assert_eq!(Execution::status_for(&none, &some), ExecutionStatus::Failed);
        assert_eq!(Execution::status_for(&some, &some), ExecutionStatus::Partial);
    }

    #[test]
    fn validations_default_lists_are_empty() {
        let v: Validations = serde_json::from_str("{}").unwrap();
        assert!(v.required.is_empty());
        assert!(v.optional.is_empty());
    }
}
