//! Markdown primitives shared by the dialect parsers
//!
//! Headings and fenced code are located with pulldown-cmark; everything else
//! is line-oriented scanning over the raw text so that section bodies stay
//! byte-exact slices of the input.
//!
//! The central primitive is "capture until the next heading of equal or
//! higher level": [`sections`] returns each matching heading together with
//! the body that follows it.

use once_cell::sync::Lazy;
use pulldown_cmark::{CodeBlockKind, Event, Parser as MdParser, Tag, TagEnd};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Lazily compiled pattern; `None` only if the literal is malformed
pub(crate) type LazyRegex = Lazy<Option<Regex>>;

pub(crate) fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(pattern).ok()
}

static BOLD_FIELD: LazyRegex = Lazy::new(|| {
    compile(r"^\s*(?:[-*+]\s+)?\*\*(?P<label>[^*\n]+?)(?::\*\*|\*\*:)[ \t]*(?P<value>.*?)\s*$")
});
static LIST_ITEM: LazyRegex = Lazy::new(|| {
    compile(r"^(?P<indent>[ \t]*)(?P<marker>[-*+]|\d+[.)])[ \t]+(?:\[(?P<check>[ xX])\](?:[ \t]+|$))?(?P<text>.*?)\s*$")
});
static CODE_SPAN: LazyRegex = Lazy::new(|| compile(r"`([^`]*)`"));
static LINK: LazyRegex = Lazy::new(|| compile(r"\[([^\]]+)\]\([^)]*\)"));
static CLARIFICATION: LazyRegex =
    Lazy::new(|| compile(r"\[NEEDS CLARIFICATION:\s*(?P<question>[^\]]+?)\s*\]"));
static APS_COMMENT: LazyRegex = Lazy::new(|| {
    compile(r"(?s)<!--\s*aps:(?P<kind>[a-z][a-z_-]*)(?P<body>.*?)-->[ \t]*(?:\r?\n)?")
});
static STORY_ROLE: LazyRegex = Lazy::new(|| {
    compile(r"(?i)\bas an?\s+(?P<v>.+?)(?:,?\s+i want\b|,?\s+so that\b|$)")
});
static STORY_WANT: LazyRegex =
    Lazy::new(|| compile(r"(?i)\bi want(?:\s+to)?\s+(?P<v>.+?)(?:,?\s+so that\b|$)"));
static STORY_BENEFIT: LazyRegex = Lazy::new(|| compile(r"(?i)\bso that\s+(?P<v>.+?)$"));
static TABLE_SEPARATOR: LazyRegex = Lazy::new(|| compile(r"^:?-+:?$"));

/// One heading located in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// 1 for `#`, 2 for `##`, ...
    pub level: u8,
    /// Plain heading text (inline markup removed)
    pub text: String,
    /// Byte offset of the first heading line
    pub start: usize,
    /// Byte offset just past the heading
    pub body_start: usize,
}

/// All headings in document order
///
/// Lines that merely look like headings inside fenced code or HTML blocks
/// are not headings.
#[must_use]
pub fn outline(text: &str) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut current: Option<Heading> = None;

    for (event, range) in MdParser::new(text).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current = Some(Heading {
                    level: level as u8,
                    text: String::new(),
                    start: line_start(text, range.start),
                    body_start: line_end(text, range.end),
                });
            }
            Event::Text(t) | Event::Code(t) => {
                if let Some(heading) = current.as_mut() {
                    heading.text.push_str(&t);
                }
            }
            Event::SoftBreak => {
                if let Some(heading) = current.as_mut() {
                    heading.text.push(' ');
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(mut heading) = current.take() {
                    heading.text = heading.text.trim().to_string();
                    headings.push(heading);
                }
            }
            _ => {}
        }
    }

    headings
}

fn line_start(text: &str, offset: usize) -> usize {
    text[..offset].rfind('\n').map_or(0, |i| i + 1)
}

fn line_end(text: &str, offset: usize) -> usize {
    if offset > 0 && text.as_bytes().get(offset - 1) == Some(&b'\n') {
        return offset;
    }
    text[offset..]
        .find('\n')
        .map_or(text.len(), |i| offset + i + 1)
}

/// A heading with the body that follows it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section<'a> {
    pub heading: Heading,
    /// Text up to the next heading of equal or higher level
    pub body: &'a str,
}

impl Section<'_> {
    /// Heading text
    #[inline]
    #[must_use]
    pub fn title(&self) -> &str {
        &self.heading.text
    }
}

/// Every section whose heading satisfies `predicate`
pub fn sections<'a>(text: &'a str, predicate: impl Fn(&Heading) -> bool) -> Vec<Section<'a>> {
    let headings = outline(text);
    headings
        .iter()
        .enumerate()
        .filter(|&(_, h)| predicate(h))
        .map(|(i, h)| {
            let end = headings[i + 1..]
                .iter()
                .find(|next| next.level <= h.level)
                .map_or(text.len(), |next| next.start);
            Section {
                heading: h.clone(),
                body: &text[h.body_start.min(end)..end],
            }
        })
        .collect()
}

/// Every section at exactly `level`
#[must_use]
pub fn sections_at(text: &str, level: u8) -> Vec<Section<'_>> {
    sections(text, |h| h.level == level)
}

/// First section at `level` whose heading starts with `name` (case-insensitive)
#[must_use]
pub fn section_named<'a>(text: &'a str, level: u8, name: &str) -> Option<Section<'a>> {
    sections(text, |h| h.level == level && heading_matches(&h.text, name))
        .into_iter()
        .next()
}

/// Case-insensitive prefix match on heading text
#[must_use]
pub fn heading_matches(heading: &str, name: &str) -> bool {
    heading
        .trim()
        .to_lowercase()
        .starts_with(&name.to_lowercase())
}

/// Text before the first heading
#[must_use]
pub fn preamble(text: &str) -> &str {
    outline(text)
        .first()
        .map_or(text, |h| &text[..h.start])
}

/// A `**Label**: value` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub label: String,
    pub value: String,
}

impl Field {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Scan `**Label**: value` (or `**Label:** value`) lines
///
/// Values are normalized with [`normalize_inline`].
#[must_use]
pub fn bold_fields(text: &str) -> Vec<Field> {
    let Some(re) = BOLD_FIELD.as_ref() else {
        return Vec::new();
    };
    text.lines()
        .filter_map(|line| re.captures(line))
        .map(|caps| Field {
            label: caps["label"].trim().to_string(),
            value: normalize_inline(&caps["value"]),
        })
        .collect()
}

/// Whether `line` is a `**Label**: value` field
#[must_use]
pub fn is_field_line(line: &str) -> bool {
    BOLD_FIELD.as_ref().is_some_and(|re| re.is_match(line))
}

/// Unwrap code spans, reduce links to their text, trim
#[must_use]
pub fn normalize_inline(value: &str) -> String {
    let mut out = value.to_string();
    if let Some(re) = CODE_SPAN.as_ref() {
        out = re.replace_all(&out, "$1").into_owned();
    }
    if let Some(re) = LINK.as_ref() {
        out = re.replace_all(&out, "$1").into_owned();
    }
    out.trim().to_string()
}

/// Collapse runs of whitespace to single spaces
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A bullet or numbered list item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    /// Item text with indented continuation lines joined by spaces
    pub text: String,
    /// `Some` for `[ ]` / `[x]` checklist items
    pub checked: Option<bool>,
    /// Leading whitespace width of the marker
    pub indent: usize,
    pub ordered: bool,
}

/// Whether `line` starts a list item
#[must_use]
pub fn is_list_line(line: &str) -> bool {
    LIST_ITEM.as_ref().is_some_and(|re| re.is_match(line))
}

/// List items in document order
///
/// Indented non-item lines continue the previous item; a blank line or a
/// heading ends it.
#[must_use]
pub fn list_items(text: &str) -> Vec<ListItem> {
    let Some(re) = LIST_ITEM.as_ref() else {
        return Vec::new();
    };

    let mut items: Vec<ListItem> = Vec::new();
    let mut open = false;

    for line in text.lines() {
        if let Some(caps) = re.captures(line) {
            let indent = caps["indent"].chars().map(|c| if c == '\t' { 4 } else { 1 }).sum::<usize>();
            items.push(ListItem {
                text: caps["text"].to_string(),
                checked: caps.name("check").map(|c| c.as_str() != " "),
                indent,
                ordered: caps["marker"].starts_with(|c: char| c.is_ascii_digit()),
            });
            open = true;
        } else if line.trim().is_empty() || line.trim_start().starts_with('#') {
            open = false;
        } else if open && line.starts_with([' ', '\t']) {
            if let Some(item) = items.last_mut() {
                item.text.push(' ');
                item.text.push_str(line.trim());
            }
        } else {
            open = false;
        }
    }

    items
}

/// Top-level list items only (the smallest indent present)
#[must_use]
pub fn top_level_items(text: &str) -> Vec<ListItem> {
    let items = list_items(text);
    let min = items.iter().map(|i| i.indent).min().unwrap_or(0);
    items.into_iter().filter(|i| i.indent == min).collect()
}

/// Label of a line that consists only of a label
///
/// `**Acceptance Scenarios**:`, `Edge Cases:` and `#### Edge Cases` all
/// yield their label text.
#[must_use]
pub fn label_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || is_list_line(line) {
        return None;
    }
    let bare = trimmed.trim_start_matches('#').trim();
    let bolded = bare.starts_with("**");
    let label = bare.replace("**", "");
    let label = label.trim().trim_end_matches(':').trim();
    let is_heading = trimmed.starts_with('#');
    let has_colon = bare.trim_end_matches("**").ends_with(':') || bare.ends_with(':');
    if label.is_empty() || !(is_heading || bolded || has_colon) {
        return None;
    }
    // A bold label must wrap the whole line.
    if bolded && !(bare.ends_with("**") || bare.ends_with("**:")) {
        return None;
    }
    Some(label.to_string())
}

/// Items of the list introduced by a label line
///
/// Returns an empty list when the label is absent.
#[must_use]
pub fn labelled_list(text: &str, label: &str) -> Vec<String> {
    let lines: Vec<&str> = text.lines().collect();
    let Some(start) = lines
        .iter()
        .position(|l| label_line(l).is_some_and(|found| found.eq_ignore_ascii_case(label)))
    else {
        return Vec::new();
    };

    let mut block = String::new();
    let mut seen_item = false;
    for line in &lines[start + 1..] {
        let blank = line.trim().is_empty();
        if is_list_line(line) {
            seen_item = true;
        } else if !blank && !(seen_item && line.starts_with([' ', '\t'])) {
            break;
        }
        block.push_str(line);
        block.push('\n');
    }

    top_level_items(&block).into_iter().map(|i| i.text).collect()
}

/// Fenced or indented code block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// First word of the info string
    pub language: Option<String>,
    /// Block content without the trailing newline
    pub body: String,
}

/// Code blocks in document order
#[must_use]
pub fn code_blocks(text: &str) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<CodeBlock> = None;

    for event in MdParser::new(text) {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(str::to_string),
                    CodeBlockKind::Indented => None,
                };
                current = Some(CodeBlock {
                    language,
                    body: String::new(),
                });
            }
            Event::Text(t) => {
                if let Some(block) = current.as_mut() {
                    block.body.push_str(&t);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(mut block) = current.take() {
                    block.body = block.body.trim_end_matches('\n').to_string();
                    blocks.push(block);
                }
            }
            _ => {}
        }
    }

    blocks
}

/// Question of the first `[NEEDS CLARIFICATION: ...]` marker
#[must_use]
pub fn clarification(text: &str) -> Option<String> {
    CLARIFICATION
        .as_ref()?
        .captures(text)
        .map(|caps| caps["question"].trim().to_string())
}

/// Byte offset of the first clarification marker
#[must_use]
pub fn clarification_offset(text: &str) -> Option<usize> {
    CLARIFICATION.as_ref()?.find(text).map(|m| m.start())
}

/// Every clarification marker as (byte offset, question)
#[must_use]
pub fn clarification_markers(text: &str) -> Vec<(usize, String)> {
    let Some(re) = CLARIFICATION.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|caps| {
            let start = caps.get(0)?.start();
            Some((start, caps["question"].trim().to_string()))
        })
        .collect()
}

/// Split a bundle into documents at classified level-1 headings
///
/// Each document runs from its classified H1 to the next classified H1.
/// Text before the first classified H1 is dropped.
pub fn split_documents<K: Copy>(text: &str, classify: impl Fn(&str) -> Option<K>) -> Vec<(K, &str)> {
    let starts: Vec<(K, usize)> = outline(text)
        .into_iter()
        .filter(|h| h.level == 1)
        .filter_map(|h| classify(&h.text).map(|kind| (kind, h.start)))
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(i, &(kind, start))| {
            let end = starts.get(i + 1).map_or(text.len(), |&(_, next)| next);
            (kind, &text[start..end])
        })
        .collect()
}

/// An `<!-- aps:kind ... -->` annotation block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApsComment {
    pub kind: String,
    pub body: String,
}

/// All annotation blocks in document order
#[must_use]
pub fn aps_comments(text: &str) -> Vec<ApsComment> {
    let Some(re) = APS_COMMENT.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(text)
        .map(|caps| ApsComment {
            kind: caps["kind"].to_string(),
            body: caps["body"].trim().to_string(),
        })
        .collect()
}

/// Text with every annotation block removed
#[must_use]
pub fn strip_aps_comments(text: &str) -> String {
    APS_COMMENT
        .as_ref()
        .map_or_else(|| text.to_string(), |re| re.replace_all(text, "").into_owned())
}

/// "As a / I want (to) / So that" triad
///
/// Each part is optional; at least one is present.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserStory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub want: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benefit: Option<String>,
}

impl UserStory {
    /// One-sentence rendering
    #[must_use]
    pub fn sentence(&self) -> String {
        let mut parts = Vec::new();
        if let Some(role) = &self.role {
            parts.push(format!("As a {role}"));
        }
        if let Some(want) = &self.want {
            parts.push(format!("I want to {want}"));
        }
        if let Some(benefit) = &self.benefit {
            parts.push(format!("so that {benefit}"));
        }
        parts.join(", ")
    }

    /// Bold-labelled markdown lines
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut lines = Vec::new();
        if let Some(role) = &self.role {
            lines.push(format!("**As a** {role}"));
        }
        if let Some(want) = &self.want {
            lines.push(format!("**I want to** {want}"));
        }
        if let Some(benefit) = &self.benefit {
            lines.push(format!("**So that** {benefit}"));
        }
        lines.join("\n")
    }
}

/// Extract a user-story triad from free text
#[must_use]
pub fn parse_user_story(text: &str) -> Option<UserStory> {
    let flat = collapse_whitespace(&text.replace("**", ""));
    let grab = |pattern: &LazyRegex| {
        pattern
            .as_ref()
            .and_then(|re| re.captures(&flat))
            .map(|caps| {
                caps["v"]
                    .trim()
                    .trim_end_matches([',', '.', ';'])
                    .trim()
                    .to_string()
            })
            .filter(|v| !v.is_empty())
    };

    let story = UserStory {
        role: grab(&STORY_ROLE),
        want: grab(&STORY_WANT),
        benefit: grab(&STORY_BENEFIT),
    };
    (story.role.is_some() || story.want.is_some() || story.benefit.is_some()).then_some(story)
}

/// Rows of a pipe table, header first, separator rows dropped
#[must_use]
pub fn table_rows(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .map(str::trim)
        .filter(|l| l.starts_with('|'))
        .map(|l| {
            l.trim_matches('|')
                .split('|')
                .map(normalize_inline)
                .collect::<Vec<_>>()
        })
        .filter(|cells| {
            !cells.iter().all(|c| {
                TABLE_SEPARATOR
                    .as_ref()
                    .is_some_and(|re| re.is_match(c))
            })
        })
        .collect()
}

/// 1-based line and column of a byte offset
#[must_use]
pub fn line_col(text: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(text.len());
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map_or(before, |i| &before[i + 1..])
        .chars()
        .count()
        + 1;
    (line, column)
}

/// Split a comma-separated value into trimmed, non-empty parts
#[must_use]
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOC: &str = "# Title\n\nIntro\n\n## First\n\nbody one\n\n### Nested\n\nnested body\n\n## Second\n\nbody two\n";

    #[test]
    fn patterns_compile() {
        for pattern in [
            &BOLD_FIELD,
            &LIST_ITEM,
            &CODE_SPAN,
            &LINK,
            &CLARIFICATION,
            &APS_COMMENT,
            &STORY_ROLE,
            &STORY_WANT,
            &STORY_BENEFIT,
            &TABLE_SEPARATOR,
        ] {
            assert!(pattern.is_some());
        }
    }

    #[test]
    fn outline_levels_and_text() {
        let headings = outline(DOC);
        let summary: Vec<_> = headings.iter().map(|h| (h.level, h.text.as_str())).collect();
        assert_eq!(
            summary,
            [(1, "Title"), (2, "First"), (3, "Nested"), (2, "Second")]
        );
    }

    #[test]
    fn outline_ignores_fenced_code() {
        let text = "# Real\n\n```bash\n# not a heading\n```\n";
        assert_eq!(outline(text).len(), 1);
    }

    #[test]
    fn section_captures_until_sibling() {
        let first = section_named(DOC, 2, "first").unwrap();
        assert!(first.body.contains("nested body"));
        assert!(!first.body.contains("body two"));

        let nested = section_named(DOC, 3, "Nested").unwrap();
        assert_eq!(nested.body.trim(), "nested body");
    }

    #[test]
    fn last_section_runs_to_end() {
        let second = section_named(DOC, 2, "Second").unwrap();
        assert_eq!(second.body.trim(), "body two");
    }

    #[test]
    fn preamble_stops_at_first_heading() {
        let h1 = section_named(DOC, 1, "Title").unwrap();
        assert_eq!(preamble(h1.body).trim(), "Intro");
    }

    #[test]
    fn bold_fields_normalize_values() {
        let text = "**Feature Branch**: `001-auth`\n**Spec:** [spec](spec.md)\n- **Status**: Draft\nplain line\n";
        assert_eq!(
            bold_fields(text),
            [
                Field::new("Feature Branch", "001-auth"),
                Field::new("Spec", "spec"),
                Field::new("Status", "Draft"),
            ]
        );
    }

    #[test]
    fn bold_without_colon_is_not_a_field() {
        assert!(bold_fields("**User**\n**As a** user").is_empty());
    }

    #[test]
    fn list_items_with_continuations() {
        let text = "- first\n  continued\n- [x] done\n1. numbered\n\nnot an item\n";
        let items = list_items(text);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].text, "first continued");
        assert_eq!(items[1].checked, Some(true));
        assert_eq!(items[1].text, "done");
        assert!(items[2].ordered);
    }

    #[test]
    fn bracketed_id_is_not_a_checkbox() {
        let items = list_items("- [T001] Create project\n- [ ] T002 Add tests\n");
        assert_eq!(items[0].checked, None);
        assert_eq!(items[0].text, "[T001] Create project");
        assert_eq!(items[1].checked, Some(false));
        assert_eq!(items[1].text, "T002 Add tests");
    }

    #[test]
    fn labelled_list_collects_following_items() {
        let text = "story text\n\n**Acceptance Scenarios**:\n1. first\n2. second\n\n**Edge Cases**:\n- edge\n\nTrailing paragraph\n";
        assert_eq!(labelled_list(text, "Acceptance Scenarios"), ["first", "second"]);
        assert_eq!(labelled_list(text, "edge cases"), ["edge"]);
        assert!(labelled_list(text, "Missing").is_empty());
    }

    #[test]
    fn label_line_forms() {
        assert_eq!(label_line("**Edge Cases**:").as_deref(), Some("Edge Cases"));
        assert_eq!(label_line("#### Edge Cases").as_deref(), Some("Edge Cases"));
        assert_eq!(label_line("Edge Cases:").as_deref(), Some("Edge Cases"));
        assert_eq!(label_line("**As a** user"), None);
        assert_eq!(label_line("- item:"), None);
    }

    #[test]
    fn code_blocks_with_language() {
        let text = "```text\nsrc/\n  lib.rs\n```\n\n```\nplain\n```\n";
        let blocks = code_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].language.as_deref(), Some("text"));
        assert_eq!(blocks[0].body, "src/\n  lib.rs");
        assert_eq!(blocks[1].language, None);
    }

    #[test]
    fn clarification_marker() {
        let text = "System MUST hash passwords [NEEDS CLARIFICATION: which hashing algorithm?]";
        assert_eq!(clarification(text).as_deref(), Some("which hashing algorithm?"));
        assert_eq!(clarification("nothing here"), None);
    }

    #[test]
    fn every_clarification_marker() {
        let text = "a [NEEDS CLARIFICATION: one?]\nb [NEEDS CLARIFICATION: two?]";
        let markers = clarification_markers(text);
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0], (2, "one?".to_string()));
        assert_eq!(markers[1].1, "two?");
    }

    #[test]
    fn split_documents_at_classified_h1() {
        let text = "preface\n# Alpha\n\na\n\n# Other\n\nstill alpha\n\n# Beta\n\nb\n";
        let docs = split_documents(text, |title| match title {
            "Alpha" => Some(1),
            "Beta" => Some(2),
            _ => None,
        });
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].0, 1);
        assert!(docs[0].1.contains("still alpha"));
        assert_eq!(docs[1].1, "# Beta\n\nb\n");
    }

    #[test]
    fn aps_comments_are_read_and_stripped() {
        let text = "<!-- aps:plan {\"id\":\"aps-00000000\"} -->\n# Title\n<!-- keep me -->\n<!-- aps:evidence\nstatus: passed\n-->\n";
        let comments = aps_comments(text);
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].kind, "plan");
        assert_eq!(comments[0].body, "{\"id\":\"aps-00000000\"}");
        assert_eq!(comments[1].body, "status: passed");
        assert_eq!(strip_aps_comments(text), "# Title\n<!-- keep me -->\n");
    }

    #[test]
    fn user_story_bold_lines() {
        let story = parse_user_story(
            "**As a** registered user\n**I want to** log in with email\n**So that** I can access my account",
        )
        .unwrap();
        assert_eq!(story.role.as_deref(), Some("registered user"));
        assert_eq!(story.want.as_deref(), Some("log in with email"));
        assert_eq!(story.benefit.as_deref(), Some("I can access my account"));
    }

    #[test]
    fn user_story_sentence() {
        let story =
            parse_user_story("As an admin, I want to reset passwords, so that users regain access.")
                .unwrap();
        assert_eq!(story.role.as_deref(), Some("admin"));
        assert_eq!(story.want.as_deref(), Some("reset passwords"));
        assert_eq!(story.benefit.as_deref(), Some("users regain access"));
    }

    #[test]
    fn user_story_markdown_reparses() {
        let story = UserStory {
            role: Some("guest".into()),
            want: Some("browse the catalog".into()),
            benefit: None,
        };
        assert_eq!(parse_user_story(&story.to_markdown()), Some(story));
    }

    #[test]
    fn table_rows_skip_separator() {
        let text = "| Category | Technology |\n|---|:---:|\n| Language | `Rust` |\n";
        assert_eq!(
            table_rows(text),
            [vec!["Category", "Technology"], vec!["Language", "Rust"]]
        );
    }

    #[test]
    fn line_col_positions() {
        let text = "ab\ncd\nef";
        assert_eq!(line_col(text, 0), (1, 1));
        assert_eq!(line_col(text, 4), (2, 2));
    }
}
