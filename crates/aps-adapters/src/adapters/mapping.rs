//! Dialect-independent pieces of the plan mapping
//!
//! Intent resolution, change-type and path inference, provenance assembly,
//! identity headers and the final plan build are shared by every adapter.

use crate::adapters::evidence::{parse_evidence, render_evidence, EvidenceAnnotation};
use crate::adapters::{ParseContext, ParseOptions, ParsedPlan, SerializeOptions};
use crate::error::{
    AdapterError, AdapterErrorCode, AdapterWarning, ParseFailure, SourceLocation, WarningCode,
};
use crate::markdown::{
    aps_comments, clarification_markers, collapse_whitespace, compile, normalize_inline,
    LazyRegex,
};
use aps_core::{
    canonicalize, is_valid_plan_id, Change, ChangeType, Evidence, Plan, PlanError, Provenance,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Shortest intent a plan accepts
pub const MIN_INTENT_CHARS: usize = 10;

/// Longest intent a plan accepts
pub const MAX_INTENT_CHARS: usize = 500;

/// Metadata key naming the dialect a plan was imported from
pub const SOURCE_FORMAT_KEY: &str = "source_format";

/// Annotation kind of identity headers
pub const IDENTITY_KIND: &str = "plan";

static CODE_SPAN: LazyRegex = Lazy::new(|| compile(r"`([^`\n]+)`"));
static BARE_PATH: LazyRegex =
    Lazy::new(|| compile(r"(?:^|[\s(])(?P<path>\.?[\w@.-]*[\w@-]/[\w@./-]*[\w@-](?:\.\w+)?)"));
static FILE_NAME: LazyRegex = Lazy::new(|| compile(r"^[\w@.-]*[\w@-]\.[A-Za-z0-9]{1,8}$"));
static WORD: LazyRegex = Lazy::new(|| compile(r"[a-z][a-z-]*"));
static USER_DESCRIPTION: LazyRegex = Lazy::new(|| compile(r#"(?i)^user\s+description\s*:\s*"#));

const DEPENDENCY_WORDS: [&str; 7] = [
    "dependency",
    "dependencies",
    "package",
    "packages",
    "library",
    "crate",
    "crates",
];
const CONFIG_WORDS: [&str; 4] = ["config", "configure", "configuration", "settings"];

const VERBS: [(&str, ChangeType); 31] = [
    ("run", ChangeType::ScriptExecute),
    ("execute", ChangeType::ScriptExecute),
    ("migrate", ChangeType::ScriptExecute),
    ("seed", ChangeType::ScriptExecute),
    ("deploy", ChangeType::ScriptExecute),
    ("delete", ChangeType::FileDelete),
    ("remove", ChangeType::FileDelete),
    ("drop", ChangeType::FileDelete),
    ("update", ChangeType::FileUpdate),
    ("modify", ChangeType::FileUpdate),
    ("refactor", ChangeType::FileUpdate),
    ("fix", ChangeType::FileUpdate),
    ("change", ChangeType::FileUpdate),
    ("rename", ChangeType::FileUpdate),
    ("extend", ChangeType::FileUpdate),
    ("improve", ChangeType::FileUpdate),
    ("integrate", ChangeType::FileUpdate),
    ("create", ChangeType::FileCreate),
    ("add", ChangeType::FileCreate),
    ("implement", ChangeType::FileCreate),
    ("write", ChangeType::FileCreate),
    ("build", ChangeType::FileCreate),
    ("define", ChangeType::FileCreate),
    ("setup", ChangeType::FileCreate),
    ("set", ChangeType::FileCreate),
    ("initialize", ChangeType::FileCreate),
    ("init", ChangeType::FileCreate),
    ("scaffold", ChangeType::FileCreate),
    ("generate", ChangeType::FileCreate),
    ("design", ChangeType::FileCreate),
    ("introduce", ChangeType::FileCreate),
];

fn words(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    WORD.as_ref().map_or_else(Vec::new, |re| {
        re.find_iter(&lower).map(|m| m.as_str().to_string()).collect()
    })
}

/// Change type implied by a task or requirement description
///
/// Dependency and configuration vocabulary wins over verbs; otherwise the
/// first known verb decides. Unknown wording is a file update.
#[must_use]
pub fn infer_change_type(description: &str) -> ChangeType {
    let words = words(description);
    let has = |set: &[&str]| words.iter().any(|w| set.contains(&w.as_str()));
    let first_verb = words
        .iter()
        .find_map(|w| VERBS.iter().find(|(verb, _)| verb == w).map(|&(_, ty)| ty));

    if has(&DEPENDENCY_WORDS) || has(&["install", "uninstall", "upgrade", "bump"]) {
        return if has(&["remove", "uninstall", "drop", "delete"]) {
            ChangeType::DependencyRemove
        } else if has(&["update", "upgrade", "bump"]) {
            ChangeType::DependencyUpdate
        } else {
            ChangeType::DependencyAdd
        };
    }
    if has(&CONFIG_WORDS) && !matches!(first_verb, Some(ChangeType::FileDelete)) {
        return ChangeType::ConfigUpdate;
    }
    first_verb.unwrap_or(ChangeType::FileUpdate)
}

fn looks_like_path(candidate: &str) -> bool {
    !candidate.contains(char::is_whitespace)
        && !candidate.contains("://")
        && (candidate.contains('/')
            || FILE_NAME.as_ref().is_some_and(|re| re.is_match(candidate)))
}

/// First path-like token in `text`: a code span first, then a bare `a/b` token
#[must_use]
pub fn infer_path(text: &str) -> Option<String> {
    let from_span = CODE_SPAN.as_ref().and_then(|re| {
        re.captures_iter(text)
            .map(|caps| caps[1].trim().to_string())
            .find(|span| looks_like_path(span))
    });
    from_span.or_else(|| {
        BARE_PATH.as_ref().and_then(|re| {
            re.captures_iter(text)
                .map(|caps| {
                    caps["path"]
                        .trim_end_matches(['.', ',', ';', ':', ')'])
                        .to_string()
                })
                .find(|path| !path.contains("://") && !path.starts_with("//"))
        })
    })
}

/// Change for one dialect item; path falls back to `synthetic`
#[must_use]
pub fn change_for(description: &str, synthetic: String) -> Change {
    let description = description.trim();
    Change::new(
        infer_change_type(description),
        infer_path(description).unwrap_or(synthetic),
        description,
    )
}

/// Strip the `User description: "..."` wrapper Spec Kit puts around input
fn unwrap_user_description(text: &str) -> &str {
    let Some(re) = USER_DESCRIPTION.as_ref() else {
        return text;
    };
    let Some(found) = re.find(text) else {
        return text;
    };
    let rest = text[found.end()..].trim();
    rest.strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .unwrap_or(rest)
}

fn clean_intent(text: &str) -> String {
    collapse_whitespace(&normalize_inline(unwrap_user_description(text.trim())))
}

fn truncate_chars(text: &str, max: usize) -> Option<String> {
    text.char_indices()
        .nth(max)
        .map(|(at, _)| text[..at].trim_end().to_string())
}

/// Resolve the plan intent
///
/// An explicitly declared intent is used as written and must meet the
/// minimum length. Otherwise the first narrative candidate of at least the
/// minimum length wins, then `fallback`.
///
/// # Errors
/// Returns `INTENT_TOO_SHORT` when the declared intent is too short
pub fn resolve_intent(
    declared: Option<&str>,
    candidates: impl IntoIterator<Item = String>,
    fallback: String,
    warnings: &mut Vec<AdapterWarning>,
) -> Result<String, AdapterError> {
    let intent = if let Some(declared) = declared {
        let intent = clean_intent(declared);
        if intent.chars().count() < MIN_INTENT_CHARS {
            return Err(AdapterError::new(
                AdapterErrorCode::IntentTooShort,
                format!(
                    "declared intent '{intent}' is shorter than {MIN_INTENT_CHARS} characters"
                ),
            ));
        }
        intent
    } else {
        candidates
            .into_iter()
            .map(|c| clean_intent(&c))
            .find(|c| c.chars().count() >= MIN_INTENT_CHARS)
            .unwrap_or_else(|| clean_intent(&fallback))
    };

    Ok(match truncate_chars(&intent, MAX_INTENT_CHARS) {
        Some(truncated) => {
            warnings.push(AdapterWarning::new(
                WarningCode::IntentTruncated,
                format!("intent cut to {MAX_INTENT_CHARS} characters"),
            ));
            truncated
        }
        None => intent,
    })
}

/// Identity carried across export and re-import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityHeader {
    pub id: String,
    pub provenance: Provenance,
}

impl IdentityHeader {
    #[must_use]
    pub fn of(plan: &Plan) -> Self {
        Self {
            id: plan.id.clone(),
            provenance: plan.provenance.clone(),
        }
    }

    /// `<!-- aps:plan {...} -->` line
    ///
    /// # Errors
    /// Returns error if provenance cannot be encoded
    pub fn render(&self) -> Result<String, AdapterError> {
        let value = serde_json::to_value(self).map_err(AdapterError::internal)?;
        // `--` cannot appear in a comment; JSON only has it inside strings.
        let json = canonicalize(&value).replace("--", "-\\u002d");
        Ok(format!("<!-- aps:{IDENTITY_KIND} {json} -->\n"))
    }

    /// First well-formed identity header in `text`
    #[must_use]
    pub fn find(text: &str) -> Option<Self> {
        aps_comments(text)
            .into_iter()
            .filter(|c| c.kind == IDENTITY_KIND)
            .find_map(|c| match serde_json::from_str::<Self>(&c.body) {
                Ok(header) if is_valid_plan_id(&header.id) => Some(header),
                Ok(header) => {
                    debug!(id = %header.id, "ignoring identity header with malformed id");
                    None
                }
                Err(err) => {
                    debug!(error = %err, "ignoring unreadable identity header");
                    None
                }
            })
    }
}

/// Evidence annotations in `text`, in document order
#[must_use]
pub fn annotated_evidence(text: &str) -> Vec<EvidenceAnnotation> {
    aps_comments(text).iter().filter_map(parse_evidence).collect()
}

/// Append annotated evidence recorded against `plan`'s current hash
///
/// Annotations for another hash, or with none, are dropped with a
/// `STALE_EVIDENCE` warning. Records already on the plan are skipped.
pub fn restore_evidence(plan: &mut Plan, text: &str, warnings: &mut Vec<AdapterWarning>) {
    for annotation in annotated_evidence(text) {
        if annotation.plan_hash.as_deref() != Some(plan.hash.as_str()) {
            debug!(
                recorded = annotation.plan_hash.as_deref().unwrap_or("none"),
                current = %plan.hash,
                "dropping stale evidence"
            );
            warnings.push(AdapterWarning::new(
                WarningCode::StaleEvidence,
                format!(
                    "evidence from {} was recorded against plan hash {}, not {}; not restored",
                    annotation.evidence.timestamp.to_rfc3339(),
                    annotation.plan_hash.as_deref().unwrap_or("(none)"),
                    plan.hash
                ),
            ));
            continue;
        }
        if !plan.evidence().contains(&annotation.evidence) {
            plan.append_evidence(annotation.evidence);
        }
    }
}

/// Provenance for an imported plan
///
/// Context fields first, then detected values such as a feature branch.
#[must_use]
pub fn provenance_from(context: &ParseContext, detected_branch: Option<String>) -> Provenance {
    Provenance {
        timestamp: context.now(),
        source: context.source,
        version: context.tool_version.clone(),
        author: context.author.clone(),
        repository: context.repository.clone(),
        branch: context.branch.clone().or(detected_branch),
        commit: context.commit.clone(),
    }
}

/// First token of a field value, before any `|` or whitespace
#[must_use]
pub fn first_token(value: &str) -> Option<String> {
    value
        .split('|')
        .next()
        .and_then(|v| v.split_whitespace().next())
        .map(|v| v.trim_matches('`').to_string())
        .filter(|v| !v.is_empty())
}

/// One warning per unresolved clarification marker
#[must_use]
pub fn clarification_warnings(text: &str) -> Vec<AdapterWarning> {
    clarification_markers(text)
        .into_iter()
        .map(|(offset, question)| {
            AdapterWarning::new(
                WarningCode::UnresolvedClarification,
                format!("needs clarification: {question}"),
            )
            .at(SourceLocation::at(text, offset))
        })
        .collect()
}

pub fn missing_section_warning(document: &str, section: &str) -> AdapterWarning {
    AdapterWarning::new(
        WarningCode::MissingSection,
        format!("{document} has no '{section}' section"),
    )
}

pub fn missing_section_error(document: &str, section: &str) -> AdapterError {
    AdapterError::new(
        AdapterErrorCode::MissingSection,
        format!("{document} has no '{section}' section"),
    )
}

/// Everything an adapter extracted, ready to become a plan
#[derive(Debug)]
pub struct PlanParts {
    pub intent: String,
    pub changes: Vec<Change>,
    pub detected_branch: Option<String>,
    pub format: &'static str,
    /// Dialect structures stored under the `format` metadata key
    pub dialect: Value,
    pub evidence: Vec<Evidence>,
}

fn plan_error(err: PlanError) -> AdapterError {
    match err {
        PlanError::Hash(_) | PlanError::Serialization(_) => {
            AdapterError::new(AdapterErrorCode::HashFailed, err.to_string())
        }
        PlanError::MissingField(_) | PlanError::AlreadyApproved { .. } => {
            AdapterError::internal(err)
        }
    }
}

/// Assemble the plan and compute its hash
///
/// # Errors
/// Returns `HASH_FAILED` when the plan cannot be hashed
pub fn build_plan(
    content: &str,
    parts: PlanParts,
    context: &ParseContext,
    options: &ParseOptions,
    mut warnings: Vec<AdapterWarning>,
) -> Result<ParsedPlan, ParseFailure> {
    let identity = options
        .preserve_identity
        .then(|| IdentityHeader::find(content))
        .flatten();
    let (id, provenance) = match identity {
        Some(header) => (Some(header.id), header.provenance),
        None => (
            context.plan_id.clone(),
            provenance_from(context, parts.detected_branch),
        ),
    };

    if parts.changes.is_empty() {
        warnings.push(AdapterWarning::new(
            WarningCode::NoProposedChanges,
            "no tasks, requirements or stories produced a proposed change",
        ));
    }

    let mut metadata = BTreeMap::new();
    metadata.insert(
        SOURCE_FORMAT_KEY.to_string(),
        Value::String(parts.format.to_string()),
    );
    metadata.insert(parts.format.to_string(), parts.dialect);

    let mut builder = Plan::builder()
        .intent(parts.intent)
        .changes(parts.changes)
        .provenance(provenance)
        .metadata_map(metadata);
    if let Some(id) = id {
        builder = builder.id(id);
    }
    for record in parts.evidence {
        builder = builder.evidence(record);
    }

    match builder.build() {
        Ok(mut plan) => {
            if options.restore_evidence {
                restore_evidence(&mut plan, content, &mut warnings);
            }
            debug!(
                id = %plan.id,
                format = parts.format,
                changes = plan.proposed_changes.len(),
                warnings = warnings.len(),
                "plan imported"
            );
            Ok(ParsedPlan { plan, warnings })
        }
        Err(err) => Err(ParseFailure {
            errors: vec![plan_error(err)],
            warnings,
        }),
    }
}

/// Dialect structures stored in a plan's metadata under `format`
#[must_use]
pub fn dialect_metadata<'a>(plan: &'a Plan, format: &str) -> Option<&'a Value> {
    let source = plan.metadata_value(SOURCE_FORMAT_KEY)?.as_str()?;
    (source == format)
        .then(|| plan.metadata_value(format))
        .flatten()
}

/// Wrap a rendered dialect body with identity header and evidence block
///
/// # Errors
/// Returns error if the identity header cannot be encoded
pub fn wrap_document(
    body: &str,
    plan: &Plan,
    options: &SerializeOptions,
) -> Result<String, AdapterError> {
    let mut out = String::new();
    if options.include_identity_header {
        out.push_str(&IdentityHeader::of(plan).render()?);
        out.push('\n');
    }
    out.push_str(body.trim_end());
    out.push('\n');
    if options.include_evidence {
        if let Some(evidence) = plan.latest_evidence() {
            out.push('\n');
            out.push_str(&render_evidence(evidence, &plan.hash));
        }
    }
    Ok(out)
}

/// Whether regenerated changes still match the plan's
#[must_use]
pub fn same_changes(plan: &[Change], regenerated: &[Change]) -> bool {
    plan.len() == regenerated.len()
        && plan.iter().zip(regenerated).all(|(a, b)| {
            a.change_type == b.change_type && a.path == b.path && a.description == b.description
        })
}

/// Title for documents generated from canonical fields only
#[must_use]
pub fn fallback_title(plan: &Plan) -> String {
    const WORDS: usize = 8;
    let words: Vec<&str> = plan.intent.split_whitespace().take(WORDS).collect();
    if words.is_empty() {
        plan.id.clone()
    } else {
        words.join(" ").trim_end_matches(['.', ',', ';', ':']).to_string()
    }
}

/// Description line for a change in a generated document
#[must_use]
pub fn change_line(change: &Change) -> String {
    if change.description.contains(&format!("`{}`", change.path)) {
        change.description.clone()
    } else {
        format!("{} in `{}`", change.description, change.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aps_core::ProvenanceSource;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn change_type_from_wording() {
        assert_eq!(
            infer_change_type("Create User model in src/models/user.rs"),
            ChangeType::FileCreate
        );
        assert_eq!(infer_change_type("Refactor login handler"), ChangeType::FileUpdate);
        assert_eq!(infer_change_type("Delete legacy session table"), ChangeType::FileDelete);
        assert_eq!(infer_change_type("Run database migrations"), ChangeType::ScriptExecute);
        assert_eq!(infer_change_type("Add serde dependency"), ChangeType::DependencyAdd);
        assert_eq!(infer_change_type("Upgrade the tokio crate"), ChangeType::DependencyUpdate);
        assert_eq!(infer_change_type("Remove unused packages"), ChangeType::DependencyRemove);
        assert_eq!(infer_change_type("Configure linting rules"), ChangeType::ConfigUpdate);
        assert_eq!(infer_change_type("System MUST hash passwords"), ChangeType::FileUpdate);
    }

    #[test]
    fn path_from_code_span_or_token() {
        assert_eq!(
            infer_path("Create model in `src/models/user.py`").as_deref(),
            Some("src/models/user.py")
        );
        assert_eq!(
            infer_path("Wire `login()` into src/api/auth.rs.").as_deref(),
            Some("src/api/auth.rs")
        );
        assert_eq!(infer_path("Update `Cargo.toml`").as_deref(), Some("Cargo.toml"));
        assert_eq!(infer_path("See https://example.com/docs"), None);
        assert_eq!(infer_path("Users can log in"), None);
    }

    #[test]
    fn synthetic_path_when_none_found() {
        let change = change_for("Users can reset passwords", "requirements/FR-002".to_string());
        assert_eq!(change.path, "requirements/FR-002");
        assert_eq!(change.change_type, ChangeType::FileUpdate);
    }

    #[test]
    fn declared_intent_is_unwrapped() {
        let mut warnings = Vec::new();
        let intent = resolve_intent(
            Some("User description: \"Add   user authentication\""),
            Vec::new(),
            "Implement feature: X".to_string(),
            &mut warnings,
        )
        .unwrap();
        assert_eq!(intent, "Add user authentication");
        assert!(warnings.is_empty());
    }

    #[test]
    fn short_declared_intent_fails() {
        let err = resolve_intent(Some("Auth"), Vec::new(), String::new(), &mut Vec::new())
            .unwrap_err();
        assert_eq!(err.code, AdapterErrorCode::IntentTooShort);
    }

    #[test]
    fn short_candidates_are_skipped() {
        let intent = resolve_intent(
            None,
            vec!["tiny".to_string(), "A longer narrative sentence".to_string()],
            "Implement feature: X".to_string(),
            &mut Vec::new(),
        )
        .unwrap();
        assert_eq!(intent, "A longer narrative sentence");

        let intent =
            resolve_intent(None, Vec::new(), "Implement feature: X".to_string(), &mut Vec::new())
                .unwrap();
        assert_eq!(intent, "Implement feature: X");
    }

    #[test]
    fn long_intent_is_truncated_with_warning() {
        let mut warnings = Vec::new();
        let long = "word ".repeat(200);
        let intent = resolve_intent(Some(&long), Vec::new(), String::new(), &mut warnings).unwrap();
        assert!(intent.chars().count() <= MAX_INTENT_CHARS);
        assert_eq!(warnings[0].code, WarningCode::IntentTruncated);
        let again = resolve_intent(Some(&intent), Vec::new(), String::new(), &mut Vec::new())
            .unwrap();
        assert_eq!(again, intent);
    }

    #[test]
    fn identity_header_round_trips() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap();
        let header = IdentityHeader {
            id: "aps-a1b2c3d4".to_string(),
            provenance: Provenance::new(ts, ProvenanceSource::Cli, "0.1.0")
                .with_branch("001--double-dash"),
        };
        let line = header.render().unwrap();
        assert!(line.starts_with("<!-- aps:plan {"));
        assert_eq!(line.matches("--").count(), 2);
        assert_eq!(IdentityHeader::find(&line), Some(header));
    }

    #[test]
    fn malformed_identity_header_is_ignored() {
        assert_eq!(IdentityHeader::find("<!-- aps:plan {not json} -->"), None);
        assert_eq!(
            IdentityHeader::find(r#"<!-- aps:plan {"id":"bad","provenance":{}} -->"#),
            None
        );
    }

    #[test]
    fn branch_token() {
        assert_eq!(first_token("`001-auth` | **Created**: today").as_deref(), Some("001-auth"));
        assert_eq!(first_token("   "), None);
    }

    #[test]
    fn clarification_positions() {
        let text = "# T\n\n- FR-001: hash [NEEDS CLARIFICATION: which hashing algorithm?]\n";
        let warnings = clarification_warnings(text);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, WarningCode::UnresolvedClarification);
        assert_eq!(warnings[0].location.map(|l| l.line), Some(3));
    }
}
