//! Plan Document Types
//!
//! Records that make up a canonical plan:
//! - Change: one unit of proposed modification
//! - Provenance: who/what/when created the plan
//! - Evidence: immutable snapshot of a validation run
//! - Lifecycle: declared validations, approval, executions

pub mod change;
pub mod evidence;
pub mod lifecycle;
pub mod provenance;

// Re-export common types
pub use change::{Change, ChangeType};
pub use evidence::{CheckResult, CheckStatus, Evidence, GateStatus};
pub use lifecycle::{Approval, Execution, ExecutionOperation, ExecutionStatus, Validations};
pub use provenance::{Provenance, ProvenanceSource};
