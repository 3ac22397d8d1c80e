//! Architecture document (`# <Project> Architecture Document`)

use crate::error::AdapterError;
use crate::markdown::{section_named, sections_at, table_rows, Field};
use crate::parsers::{
    extra_sections, header_fields, matches_any, missing_title, write_extra_sections, write_header,
    ExtraSection,
};
use serde::{Deserialize, Serialize};

pub(crate) const MARKER: &str = "Architecture Document";

const COLUMNS: [&str; 5] = ["Category", "Technology", "Version", "Purpose", "Rationale"];

/// Parsed architecture document
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArchitectureDoc {
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(skip)]
    pub declared_intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introduction: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tech_stack: Vec<TechStackEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_sections: Vec<ExtraSection>,
}

/// One row of the technology stack table
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TechStackEntry {
    pub category: String,
    pub technology: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub rationale: String,
}

impl TechStackEntry {
    fn cells(&self) -> [&str; 5] {
        [
            self.category.as_str(),
            self.technology.as_str(),
            self.version.as_str(),
            self.purpose.as_str(),
            self.rationale.as_str(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub body: String,
}

pub(crate) fn architecture_title(heading: &str) -> Option<String> {
    let at = heading
        .to_ascii_lowercase()
        .find(&MARKER.to_ascii_lowercase())?;
    let name = heading[..at].trim();
    Some(if name.is_empty() {
        heading.trim().to_string()
    } else {
        name.to_string()
    })
}

/// Parse one architecture document
pub fn parse_architecture(text: &str) -> Result<ArchitectureDoc, AdapterError> {
    let (root, title) = sections_at(text, 1)
        .into_iter()
        .find_map(|s| architecture_title(s.title()).map(|title| (s, title)))
        .ok_or_else(|| missing_title("<Project> Architecture Document"))?;
    let body = root.body;

    let (fields, declared_intent) = header_fields(body);
    let introduction = section_named(body, 2, "Introduction")
        .map(|s| s.body.trim().to_string())
        .filter(|s| !s.is_empty());
    let tech_stack = section_named(body, 2, "Tech Stack")
        .map(|s| parse_stack(s.body))
        .unwrap_or_default();
    let components = section_named(body, 2, "Components")
        .map(|s| {
            sections_at(s.body, 3)
                .into_iter()
                .map(|c| Component {
                    name: c.title().to_string(),
                    body: c.body.trim().to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ArchitectureDoc {
        title,
        fields,
        declared_intent,
        introduction,
        tech_stack,
        components,
        extra_sections: extra_sections(body, 2, |s| {
            matches_any(s.title(), &["Introduction", "Tech Stack", "Components"])
        }),
    })
}

/// Table rows mapped to columns by header name
fn parse_stack(body: &str) -> Vec<TechStackEntry> {
    let mut rows = table_rows(body).into_iter();
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let column = |name: &str| {
        header
            .iter()
            .position(|h| h.to_lowercase().starts_with(&name.to_lowercase()))
    };
    let index: Vec<Option<usize>> = COLUMNS.iter().map(|c| column(c)).collect();

    rows.map(|row| {
        let cell = |i: usize| {
            index[i]
                .and_then(|at| row.get(at))
                .cloned()
                .unwrap_or_default()
        };
        TechStackEntry {
            category: cell(0),
            technology: cell(1),
            version: cell(2),
            purpose: cell(3),
            rationale: cell(4),
        }
    })
    .filter(|entry| !entry.category.is_empty() || !entry.technology.is_empty())
    .collect()
}

impl ArchitectureDoc {
    #[must_use]
    pub fn to_markdown(&self, intent: Option<&str>) -> String {
        let mut out = String::new();
        let heading = if architecture_title(&self.title).is_some() {
            self.title.clone()
        } else {
            format!("{} {MARKER}", self.title)
        };
        write_header(
            &mut out,
            &heading,
            intent.map(|i| ("Intent", i.to_string())),
            &self.fields,
        );

        if let Some(introduction) = &self.introduction {
            out.push_str(&format!("## Introduction\n\n{introduction}\n\n"));
        }

        if !self.tech_stack.is_empty() {
            out.push_str("## Tech Stack\n\n");
            out.push_str(&format!("| {} |\n", COLUMNS.join(" | ")));
            out.push_str(&format!("|{}\n", "---|".repeat(COLUMNS.len())));
            for entry in &self.tech_stack {
                out.push_str(&format!("| {} |\n", entry.cells().join(" | ")));
            }
            out.push('\n');
        }

        if !self.components.is_empty() {
            out.push_str("## Components\n\n");
            for component in &self.components {
                out.push_str(&format!("### {}\n\n", component.name));
                if !component.body.is_empty() {
                    out.push_str(&format!("{}\n\n", component.body));
                }
            }
        }

        write_extra_sections(&mut out, 2, &self.extra_sections);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ARCH: &str = "# TaskFlow Architecture Document

## Introduction

Service layout for TaskFlow.

## High Level Architecture

Monolith with a job queue.

## Tech Stack

| Category | Technology | Version | Purpose | Rationale |
|----------|------------|---------|---------|-----------|
| Language | Rust | 1.75 | Backend | Safety |
| Database | `PostgreSQL` | 16 | Storage | Familiar |

## Components

### API Server

Handles HTTP.

### Worker

Runs jobs.
";

    #[test]
    fn parses_architecture() {
        let doc = parse_architecture(ARCH).unwrap();
        assert_eq!(doc.title, "TaskFlow");
        assert_eq!(doc.introduction.as_deref(), Some("Service layout for TaskFlow."));
        assert_eq!(doc.tech_stack.len(), 2);
        assert_eq!(doc.tech_stack[1].technology, "PostgreSQL");
        assert_eq!(doc.tech_stack[0].rationale, "Safety");
        assert_eq!(doc.components.len(), 2);
        assert_eq!(doc.components[1].name, "Worker");
        assert_eq!(doc.extra_sections[0].heading, "High Level Architecture");
    }

    #[test]
    fn columns_follow_header_names() {
        let text = "# X Architecture Document\n\n## Tech Stack\n\n| Technology | Category |\n|---|---|\n| Axum | Web |\n";
        let doc = parse_architecture(text).unwrap();
        assert_eq!(doc.tech_stack[0].category, "Web");
        assert_eq!(doc.tech_stack[0].technology, "Axum");
        assert_eq!(doc.tech_stack[0].version, "");
    }

    #[test]
    fn rendered_markdown_reparses_equal() {
        let doc = parse_architecture(ARCH).unwrap();
        let reparsed = parse_architecture(&doc.to_markdown(None)).unwrap();
        assert_eq!(reparsed, doc);
    }
}
