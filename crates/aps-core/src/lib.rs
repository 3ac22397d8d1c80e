//! APS Core
//!
//! Canonical plan documents with deterministic hashing and strict validation.
//!
//! # Core Concepts
//!
//! - [`Plan`]: the canonical plan document (closed structure, append-only evidence)
//! - [`canonicalize`]: deterministic JSON text (sorted keys, ASCII-only escapes)
//! - [`generate_hash`]: SHA-256 over canonical text, 64 lowercase hex
//! - [`PlanValidator`]: schema and hash checks producing structured issues
//!
//! # Example
//!
//! ```rust,ignore
//! use aps_core::{validate_aps_plan, Plan, Provenance, ProvenanceSource};
//!
//! let plan = Plan::builder()
//!     .intent("Add password reset to the login page")
//!     .provenance(Provenance::new(chrono::Utc::now(), ProvenanceSource::Cli, "0.1.0"))
//!     .build()?;
//!
//! let report = validate_aps_plan(&plan.to_value()?);
//! assert!(report.valid);
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

pub mod canonical;
mod error;
pub mod hash;
pub mod ids;
mod plan;
pub mod schema;
pub mod types;
pub mod validation;

pub use canonical::{canonicalize, canonicalize_serializable};
pub use error::PlanError;
pub use hash::{
    generate_hash, hash_plan_value, hash_value, plan_hash_input, verify_hash, ContentDigest,
    HashError, HASH_EXCLUDED_FIELDS,
};
pub use ids::{generate_plan_id, is_valid_hash, is_valid_plan_id, PLAN_ID_PREFIX};
pub use plan::{compute_plan_hash, Plan, PlanBuilder, SCHEMA_VERSION};
pub use schema::plan_json_schema;
pub use types::{
    Approval, Change, ChangeType, CheckResult, CheckStatus, Evidence, Execution,
    ExecutionOperation, ExecutionStatus, GateStatus, Provenance, ProvenanceSource, Validations,
};
pub use validation::{
    format_issues, is_schema_valid, validate_aps_plan, validate_schema, HashStatus,
    HashValidation, IssueCode, OutputFormat, PlanValidator, SchemaValidation, Severity,
    ValidateOptions, ValidationIssue, ValidationReport,
};
