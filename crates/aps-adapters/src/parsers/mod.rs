//! Dialect parsers
//!
//! Each parser turns the raw text of one document into a typed structure,
//! and each structure renders back to dialect text that re-parses to an
//! equal structure. Structures are serde-serializable so adapters can keep
//! them in a plan's metadata.
//!
//! - [`speckit`]: requirements / implementation plan / tasks triad
//! - [`bmad`]: PRD / architecture / story / QA gate family
//!
//! Parsers are tolerant: a missing optional section yields an empty value.
//! Only a missing recognizable title is a hard failure.

use crate::error::{AdapterError, AdapterErrorCode};
use crate::markdown::{
    bold_fields, heading_matches, is_field_line, is_list_line, label_line, parse_user_story,
    preamble, sections_at, Field, Section, UserStory,
};
use serde::{Deserialize, Serialize};

pub mod bmad;
pub mod speckit;

/// Field labels that carry the plan intent; never kept as metadata
pub const RESERVED_LABELS: [&str; 2] = ["Input", "Intent"];

/// An unrecognized section kept verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraSection {
    pub heading: String,
    pub body: String,
}

/// Header fields of a document body, split into (fields, declared intent)
pub(crate) fn header_fields(body: &str) -> (Vec<Field>, Option<String>) {
    let mut declared = None;
    let fields = bold_fields(preamble(body))
        .into_iter()
        .filter(|field| {
            let reserved = RESERVED_LABELS
                .iter()
                .any(|label| field.label.eq_ignore_ascii_case(label));
            if reserved && declared.is_none() {
                declared = Some(field.value.clone());
            }
            !reserved
        })
        .collect();
    (fields, declared)
}

/// Sections at `level` whose headings match none of `known`
pub(crate) fn extra_sections(
    body: &str,
    level: u8,
    is_known: impl Fn(&Section<'_>) -> bool,
) -> Vec<ExtraSection> {
    sections_at(body, level)
        .into_iter()
        .filter(|section| !is_known(section))
        .map(|section| ExtraSection {
            heading: section.heading.text.clone(),
            body: section.body.trim().to_string(),
        })
        .collect()
}

/// Whether a heading starts with any of `names`
pub(crate) fn matches_any(heading: &str, names: &[&str]) -> bool {
    names.iter().any(|name| heading_matches(heading, name))
}

/// Text after a title prefix, if the heading starts with it
pub(crate) fn title_after<'a>(heading: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    prefixes.iter().find_map(|prefix| {
        heading
            .get(..prefix.len())
            .filter(|head| head.eq_ignore_ascii_case(prefix))
            .map(|_| heading[prefix.len()..].trim())
    })
}

/// User story and fields written before the first label or list line
pub(crate) fn lead_story(body: &str) -> (Option<UserStory>, Vec<Field>) {
    let (fields, story): (Vec<&str>, Vec<&str>) = body
        .lines()
        .take_while(|line| label_line(line).is_none() && !is_list_line(line))
        .partition(|line| is_field_line(line));
    (
        parse_user_story(&story.join("\n")),
        bold_fields(&fields.join("\n")),
    )
}

/// Line content without indentation and bullet marker
pub(crate) fn item_body(line: &str) -> &str {
    let trimmed = line.trim();
    ["- ", "* ", "+ "]
        .iter()
        .find_map(|marker| trimmed.strip_prefix(marker))
        .map_or(trimmed, str::trim_start)
}

/// Write story triad and fields, each block followed by a blank line
pub(crate) fn write_lead_story(out: &mut String, story: Option<&UserStory>, fields: &[Field]) {
    if let Some(story) = story {
        out.push_str(&format!("{}\n\n", story.to_markdown()));
    }
    for field in fields {
        out.push_str(&format!("**{}**: {}\n", field.label, field.value));
    }
    if !fields.is_empty() {
        out.push('\n');
    }
}

pub(crate) fn missing_title(expected: &str) -> AdapterError {
    AdapterError::new(
        AdapterErrorCode::MissingTitle,
        format!("no recognizable title: expected a '# {expected}' heading"),
    )
}

/// Write `# title`, intent line and header fields
pub(crate) fn write_header(
    out: &mut String,
    title: &str,
    intent: Option<(&str, String)>,
    fields: &[Field],
) {
    out.push_str(&format!("# {title}\n\n"));
    if let Some((label, value)) = intent {
        out.push_str(&format!("**{label}**: {value}\n"));
    }
    for field in fields {
        out.push_str(&format!("**{}**: {}\n", field.label, field.value));
    }
    out.push('\n');
}

pub(crate) fn write_extra_sections(out: &mut String, level: u8, extras: &[ExtraSection]) {
    let marker = "#".repeat(usize::from(level));
    for extra in extras {
        out.push_str(&format!("{marker} {}\n\n", extra.heading));
        if !extra.body.is_empty() {
            out.push_str(&format!("{}\n\n", extra.body));
        }
    }
}

pub(crate) fn write_list(out: &mut String, items: &[String]) {
    for item in items {
        out.push_str(&format!("- {item}\n"));
    }
    if !items.is_empty() {
        out.push('\n');
    }
}

pub(crate) fn write_numbered(out: &mut String, items: &[String]) {
    for (i, item) in items.iter().enumerate() {
        out.push_str(&format!("{}. {item}\n", i + 1));
    }
    if !items.is_empty() {
        out.push('\n');
    }
}
