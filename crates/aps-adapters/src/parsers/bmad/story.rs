//! Story document (`# Story 1.1: Title`)

use crate::error::AdapterError;
use crate::markdown::{
    compile, list_items, parse_user_story, section_named, sections_at, top_level_items, Field,
    LazyRegex, UserStory,
};
use crate::parsers::{
    extra_sections, header_fields, matches_any, missing_title, write_extra_sections, write_header,
    write_numbered, ExtraSection,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

const KNOWN_SECTIONS: [&str; 5] = ["Status", "Story", "Acceptance Criteria", "Tasks", "Dev Notes"];

static TITLE: LazyRegex = Lazy::new(|| {
    compile(r"^Story\s+(?P<id>(?P<epic>\d+)\.(?P<number>\d+))\s*[:\-–]?\s*(?P<title>.*)$")
});
static AC_REFS: LazyRegex =
    Lazy::new(|| compile(r"\s*\(AC:?\s*(?P<refs>#?\s*\d+(?:\s*,\s*#?\s*\d+)*)\s*\)"));

/// Parsed story document
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoryDoc {
    /// `1.1`
    pub id: String,
    pub epic: u32,
    pub number: u32,
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(skip)]
    pub declared_intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story: Option<UserStory>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptance_criteria: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<StoryTask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_sections: Vec<ExtraSection>,
}

/// Checkbox task of `Tasks / Subtasks`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoryTask {
    pub description: String,
    pub completed: bool,
    /// Acceptance criteria numbers from a trailing `(AC: 1, 2)`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptance_refs: Vec<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<StorySubtask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorySubtask {
    pub description: String,
    pub completed: bool,
}

pub(crate) fn is_story_title(heading: &str) -> bool {
    TITLE.as_ref().is_some_and(|re| re.is_match(heading))
}

/// Parse one story document
pub fn parse_story(text: &str) -> Result<StoryDoc, AdapterError> {
    let re = TITLE
        .as_ref()
        .ok_or_else(|| missing_title("Story <epic>.<n>: <title>"))?;
    let (root, caps) = sections_at(text, 1)
        .into_iter()
        .find_map(|s| {
            let caps = re.captures(&s.heading.text)?;
            let parts = (
                caps["id"].to_string(),
                caps["epic"].parse::<u32>().ok()?,
                caps["number"].parse::<u32>().ok()?,
                caps["title"].trim().to_string(),
            );
            Some((s, parts))
        })
        .ok_or_else(|| missing_title("Story <epic>.<n>: <title>"))?;
    let (id, epic, number, title) = caps;
    let body = root.body;

    let (fields, declared_intent) = header_fields(body);
    let status = section_named(body, 2, "Status").and_then(|s| {
        s.body
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
    });
    let story = section_named(body, 2, "Story").and_then(|s| parse_user_story(s.body));
    let acceptance_criteria = section_named(body, 2, "Acceptance Criteria")
        .map(|s| top_level_items(s.body).into_iter().map(|i| i.text).collect())
        .unwrap_or_default();
    let tasks = section_named(body, 2, "Tasks")
        .map(|s| parse_tasks(s.body))
        .unwrap_or_default();
    let dev_notes = section_named(body, 2, "Dev Notes")
        .map(|s| s.body.trim().to_string())
        .filter(|n| !n.is_empty());

    Ok(StoryDoc {
        id,
        epic,
        number,
        title,
        fields,
        declared_intent,
        status,
        story,
        acceptance_criteria,
        tasks,
        dev_notes,
        extra_sections: extra_sections(body, 2, |s| matches_any(s.title(), &KNOWN_SECTIONS)),
    })
}

/// Split a trailing `(AC: ...)` reference off a task description
fn split_refs(text: &str) -> (String, Vec<u32>) {
    let Some(caps) = AC_REFS.as_ref().and_then(|re| re.captures(text)) else {
        return (text.trim().to_string(), Vec::new());
    };
    let refs = caps["refs"]
        .split(',')
        .filter_map(|r| r.trim().trim_start_matches('#').trim().parse().ok())
        .collect();
    let whole = caps.get(0).map_or(0..0, |m| m.range());
    let mut description = String::with_capacity(text.len());
    description.push_str(&text[..whole.start]);
    description.push_str(&text[whole.end..]);
    (description.trim().to_string(), refs)
}

fn parse_tasks(body: &str) -> Vec<StoryTask> {
    let items = list_items(body);
    let top = items.iter().map(|i| i.indent).min().unwrap_or(0);

    let mut tasks: Vec<StoryTask> = Vec::new();
    for item in items {
        let completed = item.checked.unwrap_or(false);
        if item.indent == top {
            let (description, acceptance_refs) = split_refs(&item.text);
            tasks.push(StoryTask {
                description,
                completed,
                acceptance_refs,
                subtasks: Vec::new(),
            });
        } else if let Some(parent) = tasks.last_mut() {
            parent.subtasks.push(StorySubtask {
                description: item.text.trim().to_string(),
                completed,
            });
        }
    }
    tasks
}

fn checkbox(done: bool) -> &'static str {
    if done {
        "[x]"
    } else {
        "[ ]"
    }
}

impl StoryDoc {
    #[must_use]
    pub fn to_markdown(&self, intent: Option<&str>) -> String {
        let mut out = String::new();
        write_header(
            &mut out,
            &format!("Story {}: {}", self.id, self.title),
            intent.map(|i| ("Intent", i.to_string())),
            &self.fields,
        );

        if let Some(status) = &self.status {
            out.push_str(&format!("## Status\n\n{status}\n\n"));
        }
        if let Some(story) = &self.story {
            out.push_str(&format!("## Story\n\n{}\n\n", story.to_markdown()));
        }
        if !self.acceptance_criteria.is_empty() {
            out.push_str("## Acceptance Criteria\n\n");
            write_numbered(&mut out, &self.acceptance_criteria);
        }
        if !self.tasks.is_empty() {
            out.push_str("## Tasks / Subtasks\n\n");
            for task in &self.tasks {
                out.push_str(&format!("- {} {}", checkbox(task.completed), task.description));
                if !task.acceptance_refs.is_empty() {
                    let refs: Vec<String> =
                        task.acceptance_refs.iter().map(u32::to_string).collect();
                    out.push_str(&format!(" (AC: {})", refs.join(", ")));
                }
                out.push('\n');
                for sub in &task.subtasks {
                    out.push_str(&format!("  - {} {}\n", checkbox(sub.completed), sub.description));
                }
            }
            out.push('\n');
        }
        if let Some(notes) = &self.dev_notes {
            out.push_str(&format!("## Dev Notes\n\n{notes}\n\n"));
        }

        write_extra_sections(&mut out, 2, &self.extra_sections);
        out
    }
}
