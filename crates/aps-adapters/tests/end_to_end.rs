//! Dialect text through import, validation, evidence and export

use aps_adapters::parsers::speckit::parse_requirements;
use aps_adapters::prelude::*;
use aps_adapters::{BmadAdapter, SpecKitAdapter};
use aps_core::{validate_aps_plan, GateStatus};
use aps_test_utils::{bmad, evidence_at, init_tracing, minimal_plan, parse_context, speckit};
use pretty_assertions::assert_eq;

const AUTHENTICATION: &str = "# Feature: Authentication

## User Scenarios & Testing

### P1: Email login

As a registered user, I want to log in with my email, so that I can reach my dashboard.

**Acceptance Scenarios**:
1. **Given** valid credentials, **When** the user submits, **Then** the dashboard opens
2. **Given** a wrong password, **When** the user submits, **Then** an error is shown

## Requirements

### Functional Requirements

- **FR-001**: System MUST hash passwords [NEEDS CLARIFICATION: which hashing algorithm?]
";

#[test]
fn requirements_parser_reads_scenario_and_clarification() {
    let doc = parse_requirements(AUTHENTICATION).unwrap();

    assert_eq!(doc.scenarios.len(), 1);
    assert_eq!(doc.scenarios[0].priority.as_deref(), Some("P1"));
    assert_eq!(doc.scenarios[0].acceptance_scenarios.len(), 2);

    assert_eq!(doc.functional_requirements.len(), 1);
    let fr = &doc.functional_requirements[0];
    assert!(fr.needs_clarification);
    assert_eq!(fr.clarification_question.as_deref(), Some("which hashing algorithm?"));
}

#[test]
fn imported_plan_passes_core_validation() {
    init_tracing();
    let parsed = SpecKitAdapter::new()
        .parse(AUTHENTICATION, &parse_context(), &ParseOptions::default())
        .unwrap();

    assert_eq!(parsed.warnings.len(), 1);
    assert_eq!(parsed.warnings[0].code, WarningCode::UnresolvedClarification);
    assert_eq!(parsed.warnings[0].location.map(|l| l.line), Some(17));

    let report = validate_aps_plan(&parsed.plan.to_value().unwrap());
    assert!(report.valid, "{:?}", report.issues);
    assert!(report.issues.is_empty());
}

#[test]
fn appended_evidence_is_exported_and_restored() {
    let adapter = SpecKitAdapter::new();
    let mut plan = adapter
        .parse(&speckit::bundle(), &parse_context(), &ParseOptions::default())
        .unwrap()
        .plan;
    let hash = plan.hash.clone();
    plan.append_evidence(evidence_at(5, GateStatus::Failed));
    plan.append_evidence(evidence_at(10, GateStatus::Passed));
    assert_eq!(plan.hash, hash);

    let exported = adapter
        .serialize(&plan, &SerializeOptions::default())
        .unwrap();
    assert_eq!(exported.content.matches("<!-- aps:evidence").count(), 1);
    assert!(exported.content.contains("status: passed"));
    assert!(exported.content.contains(&format!("plan_hash: {hash}")));
    assert!(exported.content.contains("  - [PASS] unit-tests: cargo test"));

    let restored = adapter
        .parse(&exported.content, &parse_context(), &ParseOptions::default())
        .unwrap()
        .plan;
    assert_eq!(restored.evidence().len(), 1);
    assert_eq!(restored.latest_evidence(), plan.latest_evidence());
}

#[test]
fn edited_export_drops_evidence_from_the_old_hash() {
    let adapter = SpecKitAdapter::new();
    let mut plan = adapter
        .parse(&speckit::bundle(), &parse_context(), &ParseOptions::default())
        .unwrap()
        .plan;
    plan.append_evidence(evidence_at(10, GateStatus::Passed));
    let exported = adapter
        .serialize(&plan, &SerializeOptions::default())
        .unwrap();

    let edited = exported
        .content
        .replace("[T001] Create auth module", "[T001] Create session module");
    assert_ne!(edited, exported.content);

    let reimported = adapter
        .parse(&edited, &parse_context(), &ParseOptions::default())
        .unwrap();
    assert_ne!(reimported.plan.hash, plan.hash);
    assert!(reimported.plan.evidence().is_empty());
    let stale: Vec<_> = reimported
        .warnings
        .iter()
        .filter(|w| w.code == WarningCode::StaleEvidence)
        .collect();
    assert_eq!(stale.len(), 1);
    assert!(stale[0].message.contains(&plan.hash));
}

#[test]
fn restored_checks_keep_their_own_timestamps() {
    let adapter = SpecKitAdapter::new();
    let mut plan = adapter
        .parse(&speckit::bundle(), &parse_context(), &ParseOptions::default())
        .unwrap()
        .plan;
    let gate = evidence_at(90, GateStatus::Failed);
    let earlier = evidence_at(0, GateStatus::Passed).checks[0].clone();
    let gate = gate.with_check(earlier.clone().with_details(serde_json::json!({"duration_ms": 812})));
    plan.append_evidence(gate.clone());

    let exported = adapter
        .serialize(&plan, &SerializeOptions::default())
        .unwrap();
    let restored = adapter
        .parse(&exported.content, &parse_context(), &ParseOptions::default())
        .unwrap()
        .plan;

    let latest = restored.latest_evidence().unwrap();
    assert_eq!(latest.checks[1].timestamp, earlier.timestamp);
    assert_ne!(latest.checks[1].timestamp, latest.timestamp);
    assert_eq!(latest, &gate);
}

#[test]
fn evidence_can_be_left_out_of_exports() {
    let mut plan = minimal_plan();
    plan.append_evidence(evidence_at(1, GateStatus::Passed));
    let options = SerializeOptions {
        include_evidence: false,
        ..SerializeOptions::default()
    };
    let exported = BmadAdapter::new().serialize(&plan, &options).unwrap();
    assert!(!exported.content.contains("aps:evidence"));
    assert_eq!(exported.warnings[0].code, WarningCode::DialectMetadataMissing);
}

#[test]
fn plan_exports_to_either_dialect() {
    let plan = BmadAdapter::new()
        .parse(&bmad::bundle(), &parse_context(), &ParseOptions::default())
        .unwrap()
        .plan;

    let as_speckit = SpecKitAdapter::new()
        .serialize(&plan, &SerializeOptions::default())
        .unwrap();
    assert_eq!(as_speckit.warnings[0].code, WarningCode::DialectMetadataMissing);

    let reimported = SpecKitAdapter::new()
        .parse(&as_speckit.content, &ParseContext::new(), &ParseOptions::default())
        .unwrap()
        .plan;
    assert_eq!(reimported.id, plan.id);
    assert_eq!(reimported.intent, plan.intent);
    let paths: Vec<&str> = reimported
        .proposed_changes
        .iter()
        .map(|c| c.path.as_str())
        .collect();
    assert_eq!(paths, ["migrations/002_assignee.sql", "src/notify.rs"]);
}

#[test]
fn blank_intent_cannot_be_exported() {
    let mut plan = minimal_plan();
    plan.intent = "  ".to_string();
    for adapter in [
        &SpecKitAdapter::new() as &dyn FormatAdapter,
        &BmadAdapter::new(),
    ] {
        let failure = adapter
            .serialize(&plan, &SerializeOptions::default())
            .unwrap_err();
        assert!(failure.has_code(AdapterErrorCode::MissingIntent));
    }
}

#[test]
fn short_declared_intent_is_rejected() {
    let text = "# Story 3.1: Tiny\n\n**Intent**: Fix it\n\n## Tasks / Subtasks\n\n- [ ] Fix the thing\n";
    let failure = BmadAdapter::new()
        .parse(text, &parse_context(), &ParseOptions::default())
        .unwrap_err();
    assert!(failure.has_code(AdapterErrorCode::IntentTooShort));
}

#[test]
fn lenient_validation_only_warns() {
    let adapter = BmadAdapter::new();
    let text = "# Story 4.1: Reports\n\n## Status\n\nDraft\n";
    let options = ValidateOptions::default().with_strict(false);
    let result = adapter.validate(text, &options);
    assert!(result.valid);
    assert!(result
        .warnings
        .iter()
        .all(|w| w.code == WarningCode::MissingSection));
}
