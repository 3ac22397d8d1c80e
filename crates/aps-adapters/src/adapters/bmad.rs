//! BMAD adapter
//!
//! Maps a PRD, architecture document, story files and QA gates onto a plan.
//! Story tasks become proposed changes; without stories, PRD functional
//! requirements do, and without those, the story outlines of each epic.
//! QA gates with a decision are imported as evidence.

use crate::adapters::mapping::{
    build_plan, change_for, change_line, clarification_warnings, dialect_metadata,
    fallback_title, first_token, infer_change_type, infer_path, missing_section_error,
    missing_section_warning, resolve_intent, same_changes, wrap_document, PlanParts,
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
use crate::parsers::bmad::{BmadBundle, QaGateDoc, StoryDoc, StoryTask};
use aps_core::{Change, CheckResult, CheckStatus, Evidence, Plan, ValidateOptions};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, instrument, warn};

/// Format identifier and metadata key
pub const FORMAT: &str = "bmad";

/// Gate version recorded on evidence imported from QA gates
pub const QA_GATE_VERSION: &str = "bmad-qa-gate/1";

const INDICATORS: [(&str, u8, &str); 11] = [
    (r"(?im)^#\s+.*Product Requirements Document", 35, "prd title"),
    (r"(?im)^#\s+.*Architecture Document", 30, "architecture title"),
    (r"(?m)^#\s+Story\s+\d+\.\d+", 30, "story title"),
    (r"(?im)^#\s+QA\s+Gate", 25, "qa gate title"),
    (r"(?m)^##\s+Epic\s+\d+", 15, "epics"),
    (r"\b(?:FR|NFR)\d+:", 15, "requirement ids"),
    (r"(?m)^##\s+Goals and Background Context", 15, "goals and background"),
    (r"(?m)^##\s+(?:Dev Notes|Tasks\s*/\s*Subtasks)", 10, "story sections"),
    (r"(?m)^##\s+Acceptance Criteria", 10, "acceptance criteria"),
    (r"\*\*As an?\*\*", 10, "user story"),
    (r"(?m)^gate:\s*(?:PASS|CONCERNS|FAIL|WAIVED)\b", 10, "gate decision"),
];

/// Adapter for BMAD planning documents
#[derive(Debug, Clone)]
pub struct BmadAdapter {
    detector: Detector,
}

impl Default for BmadAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl BmadAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            detector: Detector::new(FORMAT, &INDICATORS),
        }
    }
}

/// (document, section) pairs expected but absent
fn missing_sections(bundle: &BmadBundle) -> Vec<(String, &'static str)> {
    let mut missing = Vec::new();
    if let Some(prd) = &bundle.prd {
        if prd.goals.is_empty() && prd.background.is_none() {
            missing.push(("PRD".to_string(), "Goals and Background Context"));
        }
        if prd.functional.is_empty() {
            missing.push(("PRD".to_string(), "Requirements"));
        }
        if prd.epics.is_empty() {
            missing.push(("PRD".to_string(), "Epic List"));
        }
    }
    if let Some(architecture) = &bundle.architecture {
        if architecture.tech_stack.is_empty() {
            missing.push(("architecture document".to_string(), "Tech Stack"));
        }
    }
    for story in &bundle.stories {
        let doc = format!("story {}", story.id);
        if story.story.is_none() {
            missing.push((doc.clone(), "Story"));
        }
        if story.acceptance_criteria.is_empty() {
            missing.push((doc.clone(), "Acceptance Criteria"));
        }
        if story.tasks.is_empty() {
            missing.push((doc, "Tasks / Subtasks"));
        }
    }
    for gate in &bundle.qa_gates {
        if gate.gate.is_none() {
            missing.push((format!("QA gate {}", gate.story), "gate decision"));
        }
    }
    missing
}

fn narrative(bundle: &BmadBundle) -> Vec<String> {
    let mut candidates = Vec::new();
    if let Some(prd) = &bundle.prd {
        candidates.extend(prd.background.clone());
        if !prd.goals.is_empty() {
            candidates.push(prd.goals.join("; "));
        }
    }
    candidates.extend(
        bundle
            .stories
            .iter()
            .filter_map(|s| s.story.as_ref().map(|story| story.sentence())),
    );
    candidates.extend(
        bundle
            .prd
            .iter()
            .flat_map(|prd| prd.epics.iter())
            .filter_map(|epic| epic.goal.clone()),
    );
    candidates
}

fn intent(bundle: &BmadBundle, warnings: &mut Vec<AdapterWarning>) -> Result<String, AdapterError> {
    let title = bundle.title().unwrap_or_default();
    resolve_intent(
        bundle.declared_intent(),
        narrative(bundle),
        format!("Implement feature: {title}"),
        warnings,
    )
}

fn task_change(story: &StoryDoc, index: usize, task: &StoryTask) -> Change {
    let path = infer_path(&task.description)
        .or_else(|| task.subtasks.iter().find_map(|s| infer_path(&s.description)))
        .unwrap_or_else(|| format!("stories/{}/tasks/{}", story.id, index + 1));
    let mut change = Change::new(
        infer_change_type(&task.description),
        path,
        task.description.trim(),
    )
    .with_metadata("story_id", story.id.clone())
    .with_metadata("epic", story.epic)
    .with_metadata("completed", task.completed);
    if !task.acceptance_refs.is_empty() {
        change = change.with_metadata("acceptance_criteria", task.acceptance_refs.clone());
    }
    if !task.subtasks.is_empty() {
        let subtasks: Vec<Value> = task
            .subtasks
            .iter()
            .map(|s| Value::String(s.description.clone()))
            .collect();
        change = change.with_metadata("subtasks", subtasks);
    }
    change
}

/// Proposed changes: story tasks, else PRD requirements, else epic stories
fn changes(bundle: &BmadBundle) -> Vec<Change> {
    let tasks: Vec<Change> = bundle
        .stories
        .iter()
        .flat_map(|story| {
            story
                .tasks
                .iter()
                .enumerate()
                .filter(|(_, task)| !task.description.trim().is_empty())
                .map(move |(i, task)| task_change(story, i, task))
        })
        .collect();
    if !tasks.is_empty() {
        return tasks;
    }

    let Some(prd) = &bundle.prd else {
        return Vec::new();
    };
    if !prd.functional.is_empty() {
        return prd
            .functional
            .iter()
            .map(|fr| {
                change_for(&fr.text, format!("requirements/{}", fr.id))
                    .with_metadata("requirement_id", fr.id.clone())
            })
            .collect();
    }

    prd.epics
        .iter()
        .flat_map(|epic| {
            epic.stories.iter().map(move |outline| {
                let description = if outline.title.is_empty() {
                    format!("Story {}", outline.id)
                } else {
                    outline.title.clone()
                };
                change_for(&description, format!("stories/{}", outline.id))
                    .with_metadata("story_id", outline.id.clone())
                    .with_metadata("epic", epic.number)
            })
        })
        .collect()
}

fn detected_branch(bundle: &BmadBundle) -> Option<String> {
    bundle
        .fields()
        .find(|f| f.label.eq_ignore_ascii_case("Branch"))
        .and_then(|f| first_token(&f.value))
}

/// Evidence for a QA gate that carries a decision
///
/// The gate's `updated` time stamps the record; `fallback` when absent.
#[must_use]
pub fn gate_evidence(gate: &QaGateDoc, fallback: DateTime<Utc>) -> Option<Evidence> {
    let decision = gate.gate?;
    let timestamp = gate
        .updated
        .as_deref()
        .and_then(|u| DateTime::parse_from_rfc3339(u).ok())
        .map_or(fallback, |ts| ts.with_timezone(&Utc));

    let mut check = CheckResult::new(
        format!("qa-gate/{}", gate.story),
        decision.check_status(),
        timestamp,
    );
    if let Some(reason) = &gate.status_reason {
        check = check.with_message(reason.clone());
    }

    let mut evidence = Evidence::new(QA_GATE_VERSION, timestamp, decision.gate_status())
        .with_check(check)
        .with_summary(format!("QA gate {decision} for story {}", gate.story));
    for (i, issue) in gate.top_issues.iter().enumerate() {
        let name = issue
            .id
            .clone()
            .unwrap_or_else(|| format!("issue-{}", i + 1));
        let status = match issue.severity.as_deref() {
            Some(s) if s.eq_ignore_ascii_case("high") => CheckStatus::Failed,
            _ => CheckStatus::Warning,
        };
        evidence = evidence.with_check(
            CheckResult::new(name, status, timestamp).with_message(issue.finding.clone()),
        );
    }
    Some(evidence)
}

/// Story built from canonical fields alone
fn minimal_document(plan: &Plan) -> BmadBundle {
    let tasks = plan
        .proposed_changes
        .iter()
        .map(|change| StoryTask {
            description: change_line(change),
            ..StoryTask::default()
        })
        .collect();
    BmadBundle {
        stories: vec![StoryDoc {
            id: "1.1".to_string(),
            epic: 1,
            number: 1,
            title: fallback_title(plan),
            tasks,
            ..StoryDoc::default()
        }],
        ..BmadBundle::default()
    }
}

impl FormatAdapter for BmadAdapter {
    fn name(&self) -> &str {
        FORMAT
    }

    fn description(&self) -> &str {
        "BMAD method PRD, architecture, story and QA gate documents"
    }

    fn formats(&self) -> &[&str] {
        &["bmad", "bmad-method"]
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
        let bundle = BmadBundle::parse(&strip_aps_comments(content))?;

        let mut warnings = clarification_warnings(content);
        warnings.extend(
            missing_sections(&bundle)
                .iter()
                .map(|(doc, section)| missing_section_warning(doc, section)),
        );

        let fail = |error: AdapterError, warnings: &[AdapterWarning]| ParseFailure {
            errors: vec![error],
            warnings: warnings.to_vec(),
        };
        let intent = intent(&bundle, &mut warnings).map_err(|e| fail(e, &warnings))?;
        let dialect = serde_json::to_value(&bundle)
            .map_err(|e| fail(AdapterError::internal(e), &warnings))?;

        let evidence = if options.include_qa_evidence {
            let now = context.now();
            bundle
                .qa_gates
                .iter()
                .filter_map(|gate| gate_evidence(gate, now))
                .collect()
        } else {
            Vec::new()
        };
        debug!(
            prd = bundle.prd.is_some(),
            architecture = bundle.architecture.is_some(),
            stories = bundle.stories.len(),
            qa_gates = bundle.qa_gates.len(),
            "bmad documents parsed"
        );

        let parts = PlanParts {
            intent,
            changes: changes(&bundle),
            detected_branch: detected_branch(&bundle),
            format: FORMAT,
            dialect,
            evidence,
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
                "plan has no intent to write into the documents",
            ));
        }

        let mut warnings = Vec::new();
        let stored = dialect_metadata(plan, FORMAT)
            .and_then(|value| match serde_json::from_value::<BmadBundle>(value.clone()) {
                Ok(bundle) => Some(bundle),
                Err(err) => {
                    warn!(error = %err, "unreadable bmad metadata");
                    None
                }
            })
            .filter(|bundle| !bundle.is_empty());

        let bundle = match stored {
            Some(bundle) => {
                if !same_changes(&plan.proposed_changes, &changes(&bundle)) {
                    warnings.push(AdapterWarning::new(
                        WarningCode::ChangesDiverged,
                        "proposed changes differ from the stored stories; exported documents keep the stored stories",
                    ));
                }
                bundle
            }
            None => {
                warn!("no bmad metadata, writing a story from canonical fields");
                warnings.push(AdapterWarning::new(
                    WarningCode::DialectMetadataMissing,
                    "plan has no bmad metadata; wrote a minimal story",
                ));
                minimal_document(plan)
            }
        };

        let into_failure = |e: AdapterError| SerializeFailure { errors: vec![e] };
        let body = bundle
            .to_markdown(Some(&plan.intent))
            .map_err(into_failure)?;
        let content = wrap_document(&body, plan, options).map_err(into_failure)?;
        Ok(SerializedDocument { content, warnings })
    }

    fn validate(&self, content: &str, options: &ValidateOptions) -> StructuralValidation {
        let bundle = match BmadBundle::parse(&strip_aps_comments(content)) {
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
                errors.push(missing_section_error(&doc, section));
            } else {
                warnings.push(missing_section_warning(&doc, section));
            }
        }
        StructuralValidation::from_findings(errors, warnings)
    }
}
