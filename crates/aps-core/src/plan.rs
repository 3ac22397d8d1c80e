//! The canonical plan document
//!
//! A [`Plan`] is built once (through [`PlanBuilder`] or an adapter) and its
//! hash computed once. Evidence is append-only and excluded from the hash.
//! Recording an approval or an execution yields a new plan version whose
//! hash is recomputed explicitly.

use crate::error::PlanError;
use crate::hash::{hash_plan_value, HashError};
use crate::ids::generate_plan_id;
use crate::types::{Approval, Change, Evidence, Execution, Provenance, Validations};
use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Schema version literal every plan carries
pub const SCHEMA_VERSION: &str = "1.0";

/// Canonical plan document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    /// Plan identifier (`aps-` + 8 lowercase hex)
    #[schemars(regex(pattern = r"^aps-[a-f0-9]{8}$"))]
    pub id: String,

    /// Document format version, always [`SCHEMA_VERSION`]
    #[schemars(schema_with = "schema_version_schema")]
    pub schema_version: String,

    /// SHA-256 of the canonical form without `hash` and `evidence`
    #[schemars(regex(pattern = r"^[a-f0-9]{64}$"))]
    pub hash: String,

    /// What the plan sets out to do
    #[schemars(length(min = 10, max = 500))]
    pub intent: String,

    /// Ordered list of proposed changes
    pub proposed_changes: Vec<Change>,

    /// Where the plan came from
    pub provenance: Provenance,

    /// Gates the plan must pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validations: Option<Validations>,

    /// Append-only; reachable through [`Plan::evidence`] and [`Plan::append_evidence`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    evidence: Option<Vec<Evidence>>,

    /// Recorded sign-off, at most one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval: Option<Approval>,

    /// Apply and rollback history
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executions: Option<Vec<Execution>>,

    /// Free-form labels, kept sorted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,

    /// Open extension map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Value>>,
}

fn schema_version_schema(_gen: &mut SchemaGenerator) -> Schema {
    Schema::Object(SchemaObject {
        instance_type: Some(InstanceType::String.into()),
        const_value: Some(Value::String(SCHEMA_VERSION.to_string())),
        ..SchemaObject::default()
    })
}

/// Hash a plan over its canonical form (without `hash` and `evidence`)
///
/// # Errors
/// Returns error if the plan cannot be serialized to JSON
pub fn compute_plan_hash(plan: &Plan) -> Result<String, HashError> {
    let value = serde_json::to_value(plan)?;
    Ok(hash_plan_value(&value))
}

impl Plan {
    /// Start building a plan
    #[inline]
    #[must_use]
    pub fn builder() -> PlanBuilder {
        PlanBuilder::new()
    }

    /// Parse a plan from JSON text
    ///
    /// Performs serde decoding only; run the validator for schema and hash checks.
    ///
    /// # Errors
    /// Returns error if the text is not a structurally valid plan
    pub fn from_json(text: &str) -> Result<Self, PlanError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Pretty-printed JSON, as written by tooling
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json_pretty(&self) -> Result<String, PlanError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Plan as a JSON value
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_value(&self) -> Result<Value, PlanError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Compute the hash this plan should carry
    ///
    /// # Errors
    /// Returns error if the plan cannot be serialized
    pub fn compute_hash(&self) -> Result<String, PlanError> {
        Ok(compute_plan_hash(self)?)
    }

    /// Recompute and store the hash
    ///
    /// # Errors
    /// Returns error if the plan cannot be serialized
    pub fn rehash(&mut self) -> Result<(), PlanError> {
        self.hash = self.compute_hash()?;
        Ok(())
    }

    /// Whether the stored hash matches the content
    ///
    /// # Errors
    /// Returns error if the plan cannot be serialized
    pub fn verify_hash(&self) -> Result<bool, PlanError> {
        Ok(self.compute_hash()? == self.hash)
    }

    /// Evidence records in append order
    #[must_use]
    pub fn evidence(&self) -> &[Evidence] {
        self.evidence.as_deref().unwrap_or_default()
    }

    /// Most recently appended evidence
    #[must_use]
    pub fn latest_evidence(&self) -> Option<&Evidence> {
        self.evidence().last()
    }

    /// Append an evidence record
    ///
    /// Existing entries are never touched. Evidence is outside the hashed
    /// form, so the hash stays valid.
    pub fn append_evidence(&mut self, evidence: Evidence) {
        self.evidence.get_or_insert_with(Vec::new).push(evidence);
    }

    /// New plan version carrying `approval`
    ///
    /// # Errors
    /// Returns [`PlanError::AlreadyApproved`] if an approval is already recorded
    pub fn with_approval(&self, approval: Approval) -> Result<Self, PlanError> {
        if let Some(existing) = &self.approval {
            return Err(PlanError::AlreadyApproved {
                approved_by: existing.approved_by.clone(),
            });
        }
        let mut next = self.clone();
        next.approval = Some(approval);
        next.rehash()?;
        Ok(next)
    }

    /// New plan version with `execution` appended to its execution log
    ///
    /// # Errors
    /// Returns error if the new version cannot be hashed
    pub fn with_execution(&self, execution: Execution) -> Result<Self, PlanError> {
        let mut next = self.clone();
        next.executions.get_or_insert_with(Vec::new).push(execution);
        next.rehash()?;
        Ok(next)
    }

    /// Metadata entry by key
    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.as_ref().and_then(|m| m.get(key))
    }
}

/// Builder for [`Plan`]
///
/// `build` generates an id when none was supplied and computes the hash.
/// It does not validate field contents; run the validator for that.
#[derive(Debug, Clone, Default)]
pub struct PlanBuilder {
    id: Option<String>,
    intent: Option<String>,
    proposed_changes: Vec<Change>,
    provenance: Option<Provenance>,
    validations: Option<Validations>,
    evidence: Vec<Evidence>,
    approval: Option<Approval>,
    executions: Option<Vec<Execution>>,
    tags: Option<BTreeSet<String>>,
    metadata: Option<BTreeMap<String, Value>>,
}

impl PlanBuilder {
    /// Create empty builder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With an explicit plan id; one is generated otherwise
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// With intent
    #[must_use]
    pub fn intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }

    /// With one more proposed change
    #[must_use]
    pub fn change(mut self, change: Change) -> Self {
        self.proposed_changes.push(change);
        self
    }

    /// With proposed changes appended in order
    #[must_use]
    pub fn changes(mut self, changes: impl IntoIterator<Item = Change>) -> Self {
        self.proposed_changes.extend(changes);
        self
    }

    /// With provenance
    #[must_use]
    pub fn provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    /// With validation gates
    #[must_use]
    pub fn validations(mut self, validations: Validations) -> Self {
        self.validations = Some(validations);
        self
    }

    /// With an evidence record
    #[must_use]
    pub fn evidence(mut self, evidence: Evidence) -> Self {
        self.evidence.push(evidence);
        self
    }

    /// With approval
    #[must_use]
    pub fn approval(mut self, approval: Approval) -> Self {
        self.approval = Some(approval);
        self
    }

    /// With an execution record
    #[must_use]
    pub fn execution(mut self, execution: Execution) -> Self {
        self.executions.get_or_insert_with(Vec::new).push(execution);
        self
    }

    /// With a tag
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.get_or_insert_with(BTreeSet::new).insert(tag.into());
        self
    }

    /// With one metadata entry
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Replace the whole metadata map
    #[must_use]
    pub fn metadata_map(mut self, metadata: BTreeMap<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Assemble the plan and compute its hash
    ///
    /// # Errors
    /// Returns [`PlanError::MissingField`] when intent or provenance is
    /// absent, or a hashing error
    pub fn build(self) -> Result<Plan, PlanError> {
        let intent = self.intent.ok_or(PlanError::MissingField("intent"))?;
        let provenance = self
            .provenance
            .ok_or(PlanError::MissingField("provenance"))?;

        let mut plan = Plan {
            id: self.id.unwrap_or_else(generate_plan_id),
            schema_version: SCHEMA_VERSION.to_string(),
            hash: String::new(),
            intent,
            proposed_changes: self.proposed_changes,
            provenance,
            validations: self.validations,
            evidence: (!self.evidence.is_empty()).then_some(self.evidence),
            approval: self.approval,
            executions: self.executions,
            tags: self.tags,
            metadata: self.metadata,
        };
        plan.rehash()?;
        Ok(plan)
    }
}
