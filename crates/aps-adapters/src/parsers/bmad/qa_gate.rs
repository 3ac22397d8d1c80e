//! QA gate document (`# QA Gate: 1.1` followed by a fenced YAML gate file)
//!
//! ````text
//! # QA Gate: 1.1
//!
//! ```yaml
//! story: '1.1'
//! gate: CONCERNS
//! status_reason: Missing rate limiting
//! reviewer: Quinn
//! updated: 2025-01-12T10:15:00Z
//! top_issues:
//!   - id: SEC-001
//!     severity: medium
//!     finding: No rate limiting on login
//!     suggested_action: Add a limiter middleware
//! ```
//! ````

use crate::error::AdapterError;
use crate::markdown::{code_blocks, compile, sections_at, Field, LazyRegex};
use crate::parsers::{header_fields, missing_title, write_header};
use aps_core::{CheckStatus, GateStatus};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use tracing::debug;

static TITLE: LazyRegex =
    Lazy::new(|| compile(r"(?i)^QA\s+Gate\b\s*:?\s*(?P<story>\d+\.\d+)?"));

const SCHEMA: u32 = 1;

/// Gate decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GateDecision {
    Pass,
    Concerns,
    Fail,
    Waived,
}

impl GateDecision {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Concerns => "CONCERNS",
            Self::Fail => "FAIL",
            Self::Waived => "WAIVED",
        }
    }

    /// Overall evidence status for this decision
    #[must_use]
    pub const fn gate_status(self) -> GateStatus {
        match self {
            Self::Pass => GateStatus::Passed,
            Self::Fail => GateStatus::Failed,
            Self::Concerns | Self::Waived => GateStatus::Partial,
        }
    }

    /// Status of the single gate check
    #[must_use]
    pub const fn check_status(self) -> CheckStatus {
        match self {
            Self::Pass => CheckStatus::Passed,
            Self::Fail => CheckStatus::Failed,
            Self::Concerns => CheckStatus::Warning,
            Self::Waived => CheckStatus::Skipped,
        }
    }
}

impl Display for GateDecision {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue listed under `top_issues`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QaIssue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default)]
    pub finding: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Waiver {
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
}

/// Parsed QA gate
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QaGateDoc {
    /// Story id, `1.1`
    pub story: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(skip)]
    pub declared_intent: Option<String>,
    /// `None` when the gate file is missing or unreadable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<GateDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<String>,
    /// RFC 3339 timestamp as written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_issues: Vec<QaIssue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiver: Option<Waiver>,
}

/// On-disk gate file layout
#[derive(Debug, Default, Serialize, Deserialize)]
struct GateFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    story: Option<serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gate: Option<GateDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reviewer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    top_issues: Vec<QaIssue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    waiver: Option<Waiver>,
}

fn story_ref(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.trim().to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn is_gate_title(heading: &str) -> bool {
    TITLE.as_ref().is_some_and(|re| re.is_match(heading))
}

/// Parse one QA gate document
///
/// A missing or malformed gate file yields a document without a decision.
pub fn parse_qa_gate(text: &str) -> Result<QaGateDoc, AdapterError> {
    let re = TITLE
        .as_ref()
        .ok_or_else(|| missing_title("QA Gate: <story>"))?;
    let (root, heading_story) = sections_at(text, 1)
        .into_iter()
        .find_map(|s| {
            let story = re
                .captures(&s.heading.text)?
                .name("story")
                .map(|m| m.as_str().to_string());
            Some((s, story))
        })
        .ok_or_else(|| missing_title("QA Gate: <story>"))?;

    let file = code_blocks(root.body)
        .into_iter()
        .find(|b| {
            b.language
                .as_deref()
                .map_or(true, |l| l.eq_ignore_ascii_case("yaml") || l.eq_ignore_ascii_case("yml"))
        })
        .and_then(|block| match serde_yaml::from_str::<GateFile>(&block.body) {
            Ok(file) => Some(file),
            Err(err) => {
                debug!(error = %err, "unreadable QA gate file");
                None
            }
        })
        .unwrap_or_default();

    let story = heading_story
        .or_else(|| file.story.as_ref().and_then(story_ref))
        .ok_or_else(|| missing_title("QA Gate: <story>"))?;
    let (fields, declared_intent) = header_fields(root.body);

    Ok(QaGateDoc {
        story,
        fields,
        declared_intent,
        gate: file.gate,
        status_reason: file.status_reason,
        reviewer: file.reviewer,
        updated: file.updated,
        top_issues: file.top_issues,
        waiver: file.waiver,
    })
}

impl QaGateDoc {
    /// Render as markdown with a fenced YAML gate file
    pub fn to_markdown(&self, intent: Option<&str>) -> Result<String, AdapterError> {
        let file = GateFile {
            schema: Some(SCHEMA),
            story: Some(serde_yaml::Value::String(self.story.clone())),
            gate: self.gate,
            status_reason: self.status_reason.clone(),
            reviewer: self.reviewer.clone(),
            updated: self.updated.clone(),
            top_issues: self.top_issues.clone(),
            waiver: self.waiver.clone(),
        };
        let yaml = serde_yaml::to_string(&file).map_err(AdapterError::internal)?;

        let mut out = String::new();
        write_header(
            &mut out,
            &format!("QA Gate: {}", self.story),
            intent.map(|i| ("Intent", i.to_string())),
            &self.fields,
        );
        out.push_str(&format!("```yaml\n{}\n```\n", yaml.trim_end()));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const GATE: &str = "# QA Gate: 1.1

```yaml
schema: 1
story: '1.1'
gate: CONCERNS
status_reason: Missing rate limiting
reviewer: Quinn
updated: '2025-01-12T10:15:00Z'
top_issues:
  - id: SEC-001
    severity: medium
    finding: No rate limiting on login
    suggested_action: Add a limiter middleware
waiver:
  active: false
```
";

    #[test]
    fn parses_gate_file() {
        let doc = parse_qa_gate(GATE).unwrap();
        assert_eq!(doc.story, "1.1");
        assert_eq!(doc.gate, Some(GateDecision::Concerns));
        assert_eq!(doc.reviewer.as_deref(), Some("Quinn"));
        assert_eq!(doc.updated.as_deref(), Some("2025-01-12T10:15:00Z"));
        assert_eq!(doc.top_issues[0].id.as_deref(), Some("SEC-001"));
        assert_eq!(doc.waiver.as_ref().map(|w| w.active), Some(false));
    }

    #[test]
    fn decision_maps_to_evidence_status() {
        assert_eq!(GateDecision::Pass.gate_status(), GateStatus::Passed);
        assert_eq!(GateDecision::Fail.gate_status(), GateStatus::Failed);
        assert_eq!(GateDecision::Concerns.gate_status(), GateStatus::Partial);
        assert_eq!(GateDecision::Waived.check_status(), CheckStatus::Skipped);
    }

    #[test]
    fn story_from_yaml_when_heading_has_none() {
        let text = "# QA Gate\n\n```yaml\nstory: 2.3\ngate: PASS\n```\n";
        let doc = parse_qa_gate(text).unwrap();
        assert_eq!(doc.story, "2.3");
        assert_eq!(doc.gate, Some(GateDecision::Pass));
    }

    #[test]
    fn malformed_yaml_yields_no_decision() {
        let doc = parse_qa_gate("# QA Gate: 1.4\n\n```yaml\ngate: [unclosed\n```\n").unwrap();
        assert_eq!(doc.story, "1.4");
        assert_eq!(doc.gate, None);
    }

    #[test]
    fn rendered_markdown_reparses_equal() {
        let doc = parse_qa_gate(GATE).unwrap();
        let reparsed = parse_qa_gate(&doc.to_markdown(None).unwrap()).unwrap();
        assert_eq!(reparsed, doc);
    }
}
