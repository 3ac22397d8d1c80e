//! Task list document (`# Tasks: ...`)
//!
//! Task lines take either form:
//!
//! ```text
//! - [T001] [P] [US1] Create project skeleton in src/lib.rs
//! - [ ] T002 [US1] Add login handler
//! ```
//!
//! `[P]` marks a task that may run in parallel, `[USn]` links it to a user
//! story. Markers may appear in any order after the id.

use crate::error::AdapterError;
use crate::markdown::{
    bold_fields, compile, is_list_line, list_items, preamble, section_named, sections, sections_at,
    top_level_items, Field, LazyRegex,
};
use crate::parsers::{
    extra_sections, header_fields, matches_any, missing_title, title_after, write_extra_sections,
    write_header, write_list, ExtraSection,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

pub const TITLE_PREFIXES: [&str; 1] = ["Tasks:"];

const PHASE_LABELS: [&str; 2] = ["Purpose", "Checkpoint"];

static PHASE: LazyRegex = Lazy::new(|| {
    compile(r"^Phase\s+(?P<number>\d+(?:\.\d+)?)\s*[:\-–]?\s*(?P<name>.*)$")
});
static TASK: LazyRegex = Lazy::new(|| {
    compile(r"^(?:\[(?P<bracketed>T\d+)\]|(?P<plain>T\d+))(?:\s+(?P<rest>.*))?$")
});
static STORY_MARKER: LazyRegex = Lazy::new(|| compile(r"^\[(?P<story>US\d+)\]"));
static CHECKPOINT: LazyRegex = Lazy::new(|| {
    compile(r"(?m)^[ \t]*(?:\*\*)?Checkpoint(?:\*\*)?:(?:\*\*)?[ \t]*(?P<value>.*?)[ \t]*$")
});

/// Parsed task list
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TasksDoc {
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(skip)]
    pub declared_intent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phases: Vec<Phase>,
    #[serde(default)]
    pub dependencies: ExecutionOrder,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strategies: Vec<Strategy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_sections: Vec<ExtraSection>,
}

impl TasksDoc {
    /// Every task across phases, in document order
    pub fn tasks(&self) -> impl Iterator<Item = (&Phase, &Task)> {
        self.phases
            .iter()
            .flat_map(|phase| phase.tasks.iter().map(move |task| (phase, task)))
    }
}

/// `## Phase N: Name`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Phase {
    /// Phase number as written (`1`, `3.1`)
    pub number: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<String>,
}

/// One `T001` task line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub number: u32,
    pub parallel: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story: Option<String>,
    pub description: String,
    /// `Some` when written with a checkbox
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl Task {
    /// Parse the text of a list item; `None` if it is not a task
    #[must_use]
    pub fn parse(text: &str, checked: Option<bool>) -> Option<Self> {
        let caps = TASK.as_ref()?.captures(text.trim())?;
        let id = caps
            .name("bracketed")
            .or_else(|| caps.name("plain"))?
            .as_str()
            .to_string();
        let number = id[1..].parse().ok()?;

        let mut rest = caps.name("rest").map_or("", |m| m.as_str()).trim_start();
        let mut parallel = false;
        let mut story = None;
        loop {
            if let Some(after) = rest.strip_prefix("[P]").filter(|_| !parallel) {
                parallel = true;
                rest = after.trim_start();
                continue;
            }
            let marker = STORY_MARKER
                .as_ref()
                .and_then(|re| re.captures(rest))
                .filter(|_| story.is_none());
            if let Some(marker) = marker {
                let len = marker[0].len();
                story = Some(marker["story"].to_string());
                rest = rest[len..].trim_start();
                continue;
            }
            break;
        }

        Some(Self {
            id,
            number,
            parallel,
            story,
            description: rest.trim().to_string(),
            completed: checked,
        })
    }
}

impl Display for Task {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.completed {
            Some(done) => write!(f, "- [{}] {}", if done { "x" } else { " " }, self.id)?,
            None => write!(f, "- [{}]", self.id)?,
        }
        if self.parallel {
            f.write_str(" [P]")?;
        }
        if let Some(story) = &self.story {
            write!(f, " [{story}]")?;
        }
        if !self.description.is_empty() {
            write!(f, " {}", self.description)?;
        }
        Ok(())
    }
}

/// `Dependencies & Execution Order` section
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionOrder {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sequential: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parallel: Vec<String>,
}

impl ExecutionOrder {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequential.is_empty() && self.parallel.is_empty()
    }
}

/// Delivery strategy from `Implementation Strategy`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    /// Empty for text before the first subheading
    pub name: String,
    pub recommended: bool,
    pub body: String,
}

fn is_phase(heading: &str) -> bool {
    PHASE.as_ref().is_some_and(|re| re.is_match(heading))
}

/// Parse one task list document
pub fn parse_tasks(text: &str) -> Result<TasksDoc, AdapterError> {
    let root = sections_at(text, 1)
        .into_iter()
        .find(|s| title_after(s.title(), &TITLE_PREFIXES).is_some())
        .ok_or_else(|| missing_title("Tasks: <title>"))?;
    let title = title_after(root.title(), &TITLE_PREFIXES)
        .unwrap_or_default()
        .to_string();
    let body = root.body;

    let (fields, declared_intent) = header_fields(body);
    let phases = sections(body, |h| h.level == 2 && is_phase(&h.text))
        .into_iter()
        .filter_map(|section| parse_phase(section.title(), section.body))
        .collect();

    let dependencies = section_named(body, 2, "Dependencies")
        .map(|s| parse_dependencies(s.body))
        .unwrap_or_default();
    let strategies = section_named(body, 2, "Implementation Strateg")
        .map(|s| parse_strategies(s.body))
        .unwrap_or_default();

    Ok(TasksDoc {
        title,
        fields,
        declared_intent,
        phases,
        dependencies,
        strategies,
        extra_sections: extra_sections(body, 2, |s| {
            is_phase(s.title()) || matches_any(s.title(), &["Dependencies", "Implementation Strateg"])
        }),
    })
}

fn parse_phase(heading: &str, body: &str) -> Option<Phase> {
    let caps = PHASE.as_ref()?.captures(heading)?;

    let lead: Vec<&str> = body.lines().take_while(|l| !is_list_line(l)).collect();
    let mut purpose = None;
    let mut fields = Vec::new();
    for field in bold_fields(&lead.join("\n")) {
        if field.label.eq_ignore_ascii_case("Purpose") {
            purpose = Some(field.value);
        } else if !PHASE_LABELS.iter().any(|l| field.label.eq_ignore_ascii_case(l)) {
            fields.push(field);
        }
    }

    let tasks = list_items(body)
        .iter()
        .filter_map(|item| Task::parse(&item.text, item.checked))
        .collect();
    let checkpoint = CHECKPOINT
        .as_ref()
        .and_then(|re| re.captures(body))
        .map(|c| c["value"].to_string())
        .filter(|v| !v.is_empty());

    Some(Phase {
        number: caps["number"].to_string(),
        name: caps["name"].trim().to_string(),
        purpose,
        fields,
        tasks,
        checkpoint,
    })
}

fn parse_dependencies(body: &str) -> ExecutionOrder {
    let mut order = ExecutionOrder {
        sequential: item_texts(preamble(body)),
        parallel: Vec::new(),
    };
    for sub in sections_at(body, 3) {
        let items = item_texts(sub.body);
        if matches_any(sub.title(), &["Parallel"]) {
            order.parallel.extend(items);
        } else {
            order.sequential.extend(items);
        }
    }
    order
}

fn parse_strategies(body: &str) -> Vec<Strategy> {
    let mut strategies = Vec::new();
    let lead = preamble(body).trim();
    if !lead.is_empty() {
        strategies.push(Strategy {
            name: String::new(),
            recommended: false,
            body: lead.to_string(),
        });
    }
    strategies.extend(sections_at(body, 3).into_iter().map(|sub| {
        let heading = sub.title();
        let marker = heading.to_ascii_lowercase().find("(recommended)");
        Strategy {
            name: marker.map_or(heading, |at| &heading[..at]).trim().to_string(),
            recommended: marker.is_some(),
            body: sub.body.trim().to_string(),
        }
    }));
    strategies
}

fn item_texts(body: &str) -> Vec<String> {
    top_level_items(body).into_iter().map(|i| i.text).collect()
}

impl TasksDoc {
    /// Render as Spec Kit markdown
    #[must_use]
    pub fn to_markdown(&self, intent: Option<&str>) -> String {
        let mut out = String::new();
        write_header(
            &mut out,
            &format!("Tasks: {}", self.title),
            intent.map(|i| ("Input", i.to_string())),
            &self.fields,
        );

        for phase in &self.phases {
            if phase.name.is_empty() {
                out.push_str(&format!("## Phase {}\n\n", phase.number));
            } else {
                out.push_str(&format!("## Phase {}: {}\n\n", phase.number, phase.name));
            }
            if let Some(purpose) = &phase.purpose {
                out.push_str(&format!("**Purpose**: {purpose}\n"));
            }
            for field in &phase.fields {
                out.push_str(&format!("**{}**: {}\n", field.label, field.value));
            }
            if phase.purpose.is_some() || !phase.fields.is_empty() {
                out.push('\n');
            }
            for task in &phase.tasks {
                out.push_str(&format!("{task}\n"));
            }
            if !phase.tasks.is_empty() {
                out.push('\n');
            }
            if let Some(checkpoint) = &phase.checkpoint {
                out.push_str(&format!("**Checkpoint**: {checkpoint}\n\n"));
            }
        }

        if !self.dependencies.is_empty() {
            out.push_str("## Dependencies & Execution Order\n\n");
            if !self.dependencies.sequential.is_empty() {
                out.push_str("### Sequential Order\n\n");
                write_list(&mut out, &self.dependencies.sequential);
            }
            if !self.dependencies.parallel.is_empty() {
                out.push_str("### Parallel Opportunities\n\n");
                write_list(&mut out, &self.dependencies.parallel);
            }
        }

        if !self.strategies.is_empty() {
            out.push_str("## Implementation Strategy\n\n");
            for strategy in &self.strategies {
                if !strategy.name.is_empty() {
                    let marker = if strategy.recommended { " (Recommended)" } else { "" };
                    out.push_str(&format!("### {}{marker}\n\n", strategy.name));
                }
                if !strategy.body.is_empty() {
                    out.push_str(&format!("{}\n\n", strategy.body));
                }
            }
        }

        write_extra_sections(&mut out, 2, &self.extra_sections);
        out
    }
}
