//! Evidence annotation blocks
//!
//! Exported markdown carries the most recent evidence as a trailing
//! comment so a reader sees validation provenance inline:
//!
//! ```text
//! <!-- aps:evidence
//! status: partial
//! timestamp: 2025-01-15T10:30:00Z
//! plan_hash: 3f5a...
//! gate_version: 1.0.0
//! checks:
//!   - [PASS] schema: document matches schema
//!   - [FAIL] tests
//! record: {"checks":[...],"gate_version":"1.0.0",...}
//! -->
//! ```
//!
//! The `record` line is the full [`Evidence`] as one line of JSON and is
//! what an import reads. The other lines are for readers; a block without
//! a record is read from them, with checks taking the block timestamp.

use crate::markdown::ApsComment;
use aps_core::{CheckResult, CheckStatus, Evidence, GateStatus};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

/// Annotation kind of evidence blocks
pub const EVIDENCE_KIND: &str = "evidence";

const RECORD_KEY: &str = "record";

// A comment body must never contain the closing marker.
fn comment_safe(text: &str) -> String {
    text.replace("-->", "- ->").replace('\n', " ")
}

// Compact JSON has no raw newlines and `>` only occurs inside strings,
// where the escape decodes back to the same text.
fn record_line(evidence: &Evidence) -> Option<String> {
    match serde_json::to_string(evidence) {
        Ok(json) => Some(json.replace('>', "\\u003e")),
        Err(err) => {
            debug!(error = %err, "evidence record not rendered");
            None
        }
    }
}

/// Render `evidence` for a plan with hash `plan_hash`
#[must_use]
pub fn render_evidence(evidence: &Evidence, plan_hash: &str) -> String {
    let mut out = String::from("<!-- aps:evidence\n");
    out.push_str(&format!("status: {}\n", evidence.overall_status.as_str()));
    out.push_str(&format!(
        "timestamp: {}\n",
        evidence.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    ));
    out.push_str(&format!("plan_hash: {plan_hash}\n"));
    out.push_str(&format!("gate_version: {}\n", comment_safe(&evidence.gate_version)));
    if let Some(summary) = &evidence.summary {
        out.push_str(&format!("summary: {}\n", comment_safe(summary)));
    }
    if !evidence.checks.is_empty() {
        out.push_str("checks:\n");
        for check in &evidence.checks {
            out.push_str(&format!("  - [{}] {}", check.status.label(), comment_safe(&check.name)));
            if let Some(message) = &check.message {
                out.push_str(&format!(": {}", comment_safe(message)));
            }
            out.push('\n');
        }
    }
    if let Some(record) = record_line(evidence) {
        out.push_str(&format!("{RECORD_KEY}: {record}\n"));
    }
    out.push_str("-->\n");
    out
}

/// Evidence read back from an annotation
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceAnnotation {
    /// The restored record
    pub evidence: Evidence,
    /// Hash of the plan the evidence was recorded against
    pub plan_hash: Option<String>,
}

fn gate_status(text: &str) -> Option<GateStatus> {
    match text.trim() {
        "passed" => Some(GateStatus::Passed),
        "failed" => Some(GateStatus::Failed),
        "partial" => Some(GateStatus::Partial),
        _ => None,
    }
}

fn check_status(label: &str) -> Option<CheckStatus> {
    [
        CheckStatus::Passed,
        CheckStatus::Failed,
        CheckStatus::Skipped,
        CheckStatus::Warning,
    ]
    .into_iter()
    .find(|status| status.label() == label)
}

fn parse_check(line: &str, timestamp: DateTime<Utc>) -> Option<CheckResult> {
    let rest = line.trim().strip_prefix("- [")?;
    let (label, rest) = rest.split_once(']')?;
    let status = check_status(label)?;
    let rest = rest.trim();
    let check = match rest.split_once(": ") {
        Some((name, message)) => {
            CheckResult::new(name.trim(), status, timestamp).with_message(message.trim())
        }
        None => CheckResult::new(rest, status, timestamp),
    };
    Some(check)
}

/// Read an `aps:evidence` annotation
///
/// A readable `record` line wins over the summary lines. Returns `None`
/// for other kinds, or when neither a record nor status and timestamp
/// are present.
#[must_use]
pub fn parse_evidence(comment: &ApsComment) -> Option<EvidenceAnnotation> {
    if comment.kind != EVIDENCE_KIND {
        return None;
    }

    let mut status = None;
    let mut timestamp = None;
    let mut plan_hash = None;
    let mut gate_version = None;
    let mut summary = None;
    let mut record = None;
    let mut check_lines = Vec::new();
    let mut in_checks = false;

    for line in comment.body.lines() {
        if in_checks && line.trim_start().starts_with("- [") {
            check_lines.push(line);
            continue;
        }
        in_checks = false;
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "status" => status = gate_status(value),
            "timestamp" => {
                timestamp = DateTime::parse_from_rfc3339(value)
                    .ok()
                    .map(|ts| ts.with_timezone(&Utc));
            }
            "plan_hash" => plan_hash = Some(value.to_string()),
            "gate_version" => gate_version = Some(value.to_string()),
            "summary" => summary = Some(value.to_string()),
            "checks" => in_checks = true,
            RECORD_KEY => match serde_json::from_str::<Evidence>(value) {
                Ok(parsed) => record = Some(parsed),
                Err(err) => debug!(error = %err, "unreadable evidence record"),
            },
            _ => {}
        }
    }

    if let Some(evidence) = record {
        return Some(EvidenceAnnotation {
            evidence,
            plan_hash,
        });
    }

    let (Some(status), Some(timestamp)) = (status, timestamp) else {
        debug!("evidence annotation without status or timestamp");
        return None;
    };
    let checks = check_lines
        .into_iter()
        .filter_map(|line| parse_check(line, timestamp))
        .collect();

    let mut evidence = Evidence::new(
        gate_version.unwrap_or_else(|| "unknown".to_string()),
        timestamp,
        status,
    );
    evidence.checks = checks;
    evidence.summary = summary;
    Some(EvidenceAnnotation {
        evidence,
        plan_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::aps_comments;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap()
    }

    fn sample() -> Evidence {
        Evidence::from_checks(
            "1.0.0",
            ts(),
            vec![
                CheckResult::new("schema", CheckStatus::Passed, ts())
                    .with_message("document matches schema"),
                CheckResult::new("tests", CheckStatus::Failed, ts()),
            ],
        )
    }

    #[test]
    fn renders_status_hash_and_checks() {
        let text = render_evidence(&sample(), "abc123");
        assert!(text.starts_with("<!-- aps:evidence\nstatus: partial\n"));
        assert!(text.contains("plan_hash: abc123\n"));
        assert!(text.contains("  - [PASS] schema: document matches schema\n"));
        assert!(text.contains("  - [FAIL] tests\n"));
        assert!(text.ends_with("-->\n"));
    }

    #[test]
    fn rendered_block_reads_back() {
        let evidence = sample();
        let text = render_evidence(&evidence, "abc123");
        let comments = aps_comments(&text);
        let annotation = parse_evidence(&comments[0]).unwrap();
        assert_eq!(annotation.plan_hash.as_deref(), Some("abc123"));
        assert_eq!(annotation.evidence, evidence);
    }

    #[test]
    fn timestamps_render_in_utc_form() {
        let text = render_evidence(&sample(), "abc123");
        assert!(text.contains("timestamp: 2025-01-15T10:30:00Z\n"));
    }

    #[test]
    fn record_keeps_what_summary_lines_lose() {
        let earlier = Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap();
        let evidence = Evidence::new("1.0.0", ts(), GateStatus::Failed)
            .with_check(
                CheckResult::new("build: release", CheckStatus::Failed, earlier)
                    .with_message("line one\nline two --> three")
                    .with_details(json!({"exit_code": 101, "stderr": "a > b"})),
            )
            .with_summary("failed\nbuild")
            .with_artifact("log", "reports/build.log");

        let text = render_evidence(&evidence, "abc123");
        assert_eq!(text.matches("-->").count(), 1);

        let annotation = parse_evidence(&aps_comments(&text)[0]).unwrap();
        assert_eq!(annotation.evidence.checks[0].timestamp, earlier);
        assert_eq!(annotation.evidence.checks[0].name, "build: release");
        assert_eq!(annotation.evidence, evidence);
    }

    #[test]
    fn block_without_record_reads_summary_lines() {
        let comment = ApsComment {
            kind: EVIDENCE_KIND.to_string(),
            body: "status: passed\ntimestamp: 2025-01-15T10:30:00Z\nplan_hash: h\ngate_version: 2.0.0\nchecks:\n  - [PASS] lint: clean\n".to_string(),
        };
        let annotation = parse_evidence(&comment).unwrap();
        assert_eq!(annotation.plan_hash.as_deref(), Some("h"));
        assert_eq!(annotation.evidence.gate_version, "2.0.0");
        assert_eq!(
            annotation.evidence.checks,
            [CheckResult::new("lint", CheckStatus::Passed, ts()).with_message("clean")]
        );
    }

    #[test]
    fn closing_marker_in_message_is_defused() {
        let evidence = Evidence::new("1.0.0", ts(), GateStatus::Failed).with_check(
            CheckResult::new("lint", CheckStatus::Failed, ts()).with_message("saw --> here"),
        );
        let text = render_evidence(&evidence, "h");
        assert_eq!(text.matches("-->").count(), 1);
    }

    #[test]
    fn other_kinds_are_ignored() {
        let comment = ApsComment {
            kind: "plan".to_string(),
            body: "status: passed".to_string(),
        };
        assert_eq!(parse_evidence(&comment), None);
    }
}
