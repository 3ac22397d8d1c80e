//! Spec Kit adapter
//!
//! Maps a feature specification, implementation plan and task list onto a
//! plan. Tasks become proposed changes; without tasks, functional
//! requirements do. The parsed documents are kept under
//! `metadata.speckit` and regenerate the markdown on export.

use crate::adapters::mapping::{
    build_plan, change_for, change_line, clarification_warnings, dialect_metadata,
    fallback_title, first_token, missing_section_error, missing_section_warning, resolve_intent,
    same_changes, wrap_document, PlanParts,
};
use crate::adapters::{
    FormatAdapter, ParseContext, ParseOptions, ParsedPlan, SerializeOptions, SerializedDocument,
    StructuralValidation,
};
use crate::detect::{DetectionResult, Detector};
use crate::error::{
    AdapterError, AdapterErrorCode, AdapterWarning, ParseFailure, SerializeFailure, WarningCode,
};
use crate::markdown::strip_aps_comments;
use crate::parsers::speckit::{Phase, SpecKitBundle, Task, TasksDoc};
use aps_core::{Change, Plan, ValidateOptions};
use tracing::{debug, instrument, warn};

/// Format identifier and metadata key
pub const FORMAT: &str = "speckit";

const INDICATORS: [(&str, u8, &str); 10] = [
    (r"(?m)^#\s+Feature(?:\s+Specification)?:", 30, "feature title"),
    (r"(?m)^#\s+Implementation Plan:", 30, "implementation plan title"),
    (r"(?m)^#\s+Tasks:", 30, "tasks title"),
    (r"(?m)^##\s+User Scenarios", 20, "user scenarios"),
    (r"\bFR-\d{3}\b", 15, "functional requirement ids"),
    (r"(?m)^\s*[-*]\s+(?:\[[ xX]\]\s+)?\[?T\d{3}\]?", 15, "task lines"),
    (r"\[NEEDS CLARIFICATION", 10, "clarification markers"),
    (r"(?m)^##\s+Phase\s+\d", 10, "phases"),
    (r"\*\*Feature Branch\*\*", 10, "feature branch"),
    (r"(?m)^##\s+(?:Technical Context|Constitution Check)", 10, "technical context"),
];

const BRANCH_LABELS: [&str; 2] = ["Feature Branch", "Branch"];

/// Adapter for Spec Kit feature documents
#[derive(Debug, Clone)]
pub struct SpecKitAdapter {
    detector: Detector,
}

impl Default for SpecKitAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SpecKitAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            detector: Detector::new(FORMAT, &INDICATORS),
        }
    }
}

/// (document, section) pairs expected but absent
fn missing_sections(bundle: &SpecKitBundle) -> Vec<(&'static str, &'static str)> {
    let mut missing = Vec::new();
    if let Some(doc) = &bundle.requirements {
        if doc.scenarios.is_empty() {
            missing.push(("feature specification", "User Scenarios & Testing"));
        }
        if doc.functional_requirements.is_empty() {
            missing.push(("feature specification", "Functional Requirements"));
        }
    }
    if let Some(doc) = &bundle.implementation {
        if doc.summary.is_none() {
            missing.push(("implementation plan", "Summary"));
        }
        if doc.technical_context.is_empty() {
            missing.push(("implementation plan", "Technical Context"));
        }
    }
    if let Some(doc) = &bundle.tasks {
        if doc.phases.is_empty() {
            missing.push(("task list", "Phase"));
        }
    }
    missing
}

fn declared_intent(bundle: &SpecKitBundle) -> Option<&str> {
    bundle
        .requirements
        .as_ref()
        .and_then(|d| d.declared_intent.as_deref())
        .or_else(|| {
            bundle
                .implementation
                .as_ref()
                .and_then(|d| d.declared_intent.as_deref())
        })
        .or_else(|| bundle.tasks.as_ref().and_then(|d| d.declared_intent.as_deref()))
}

fn narrative(bundle: &SpecKitBundle) -> Vec<String> {
    let summary = bundle
        .implementation
        .as_ref()
        .and_then(|d| d.summary.clone());
    let stories = bundle
        .requirements
        .iter()
        .flat_map(|d| d.scenarios.iter())
        .filter_map(|s| s.story.as_ref().map(|story| story.sentence()));
    summary.into_iter().chain(stories).collect()
}

fn intent(bundle: &SpecKitBundle, warnings: &mut Vec<AdapterWarning>) -> Result<String, AdapterError> {
    let title = bundle.title().unwrap_or_default();
    resolve_intent(
        declared_intent(bundle),
        narrative(bundle),
        format!("Implement feature: {title}"),
        warnings,
    )
}

fn task_change(phase: &Phase, task: &Task) -> Change {
    let description = if task.description.is_empty() {
        task.id.as_str()
    } else {
        task.description.as_str()
    };
    let mut change = change_for(description, format!("tasks/{}", task.id))
        .with_metadata("task_id", task.id.clone())
        .with_metadata("phase", phase.number.clone())
        .with_metadata("parallel", task.parallel);
    if let Some(story) = &task.story {
        change = change.with_metadata("story", story.clone());
    }
    if let Some(completed) = task.completed {
        change = change.with_metadata("completed", completed);
    }
    change
}

/// Proposed changes: tasks in document order, else functional requirements
fn changes(bundle: &SpecKitBundle) -> Vec<Change> {
    let tasks: Vec<Change> = bundle
        .tasks
        .iter()
        .flat_map(TasksDoc::tasks)
        .map(|(phase, task)| task_change(phase, task))
        .collect();
    if !tasks.is_empty() {
        return tasks;
    }

    bundle
        .requirements
        .iter()
        .flat_map(|d| d.functional_requirements.iter())
        .map(|fr| {
            let change = change_for(&fr.text, format!("requirements/{}", fr.id))
                .with_metadata("requirement_id", fr.id.clone());
            if fr.needs_clarification {
                change.with_metadata("needs_clarification", true)
            } else {
                change
            }
        })
        .collect()
}

fn detected_branch(bundle: &SpecKitBundle) -> Option<String> {
    bundle
        .fields()
        .find(|f| BRANCH_LABELS.iter().any(|l| f.label.eq_ignore_ascii_case(l)))
        .and_then(|f| first_token(&f.value))
}

/// Task list built from canonical fields alone
fn minimal_document(plan: &Plan) -> TasksDoc {
    let tasks = plan
        .proposed_changes
        .iter()
        .zip(1u32..)
        .map(|(change, number)| Task {
            id: format!("T{number:03}"),
            number,
            parallel: false,
            story: None,
            description: change_line(change),
            completed: None,
        })
        .collect();
    TasksDoc {
        title: fallback_title(plan),
        phases: vec![Phase {
            number: "1".to_string(),
            name: "Proposed Changes".to_string(),
            tasks,
            ..Phase::default()
        }],
        ..TasksDoc::default()
    }
}

impl FormatAdapter for SpecKitAdapter {
    fn name(&self) -> &str {
        FORMAT
    }

    fn description(&self) -> &str {
        "GitHub Spec Kit feature specification, implementation plan and tasks"
    }

    fn formats(&self) -> &[&str] {
        &["speckit", "spec-kit"]
    }

    fn extensions(&self) -> &[&str] {
        &["md", "markdown"]
    }

    fn detect(&self, content: &str) -> DetectionResult {
        self.detector.detect(content)
    }

    #[instrument(level = "debug", skip_all, fields(format = FORMAT))]
    fn parse(
        &self,
        content: &str,
        context: &ParseContext,
        options: &ParseOptions,
    ) -> Result<ParsedPlan, ParseFailure> {
        let bundle = SpecKitBundle::parse(&strip_aps_comments(content))?;

        let mut warnings = clarification_warnings(content);
        warnings.extend(
            missing_sections(&bundle)
                .into_iter()
                .map(|(doc, section)| missing_section_warning(doc, section)),
        );

        let fail = |error: AdapterError, warnings: &[AdapterWarning]| ParseFailure {
            errors: vec![error],
            warnings: warnings.to_vec(),
        };
        let intent = intent(&bundle, &mut warnings).map_err(|e| fail(e, &warnings))?;
        let dialect = serde_json::to_value(&bundle)
            .map_err(|e| fail(AdapterError::internal(e), &warnings))?;
        debug!(
            requirements = bundle.requirements.is_some(),
            implementation = bundle.implementation.is_some(),
            tasks = bundle.tasks.is_some(),
            "spec kit documents parsed"
        );

        let parts = PlanParts {
            intent,
            changes: changes(&bundle),
            detected_branch: detected_branch(&bundle),
            format: FORMAT,
            dialect,
            evidence: Vec::new(),
        };
        build_plan(content, parts, context, options, warnings)
    }

    #[instrument(level = "debug", skip_all, fields(format = FORMAT, id = %plan.id))]
    fn serialize(
        &self,
        plan: &Plan,
        options: &SerializeOptions,
    ) -> Result<SerializedDocument, SerializeFailure> {
        if plan.intent.trim().is_empty() {
            return Err(SerializeFailure::single(
                AdapterErrorCode::MissingIntent,
                "plan has no intent to write as the feature input",
            ));
        }

        let mut warnings = Vec::new();
        let stored = dialect_metadata(plan, FORMAT)
            .and_then(|value| match serde_json::from_value::<SpecKitBundle>(value.clone()) {
                Ok(bundle) => Some(bundle),
                Err(err) => {
                    warn!(error = %err, "unreadable spec kit metadata");
                    None
                }
            })
            .filter(|bundle| !bundle.is_empty());

        let body = match stored {
            Some(bundle) => {
                if !same_changes(&plan.proposed_changes, &changes(&bundle)) {
                    warnings.push(AdapterWarning::new(
                        WarningCode::ChangesDiverged,
                        "proposed changes differ from the stored tasks; exported documents keep the stored tasks",
                    ));
                }
                bundle.to_markdown(Some(&plan.intent))
            }
            None => {
                warn!("no spec kit metadata, writing a task list from canonical fields");
                warnings.push(AdapterWarning::new(
                    WarningCode::DialectMetadataMissing,
                    "plan has no spec kit metadata; wrote a minimal task list",
                ));
                minimal_document(plan).to_markdown(Some(&plan.intent))
            }
        };

        let content = wrap_document(&body, plan, options)
            .map_err(|e| SerializeFailure { errors: vec![e] })?;
        Ok(SerializedDocument { content, warnings })
    }

    fn validate(&self, content: &str, options: &ValidateOptions) -> StructuralValidation {
        let bundle = match SpecKitBundle::parse(&strip_aps_comments(content)) {
            Ok(bundle) => bundle,
            Err(err) => return StructuralValidation::from_findings(vec![err], Vec::new()),
        };

        let mut errors = Vec::new();
        let mut warnings = clarification_warnings(content);
        if let Err(err) = intent(&bundle, &mut warnings) {
            errors.push(err);
        }
        for (doc, section) in missing_sections(&bundle) {
            if options.strict {
                errors.push(missing_section_error(doc, section));
            } else {
                warnings.push(missing_section_warning(doc, section));
            }
        }
        StructuralValidation::from_findings(errors, warnings)
    }
}
