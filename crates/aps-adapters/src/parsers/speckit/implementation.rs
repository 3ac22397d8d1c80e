//! Implementation plan document (`# Implementation Plan: ...`)

use crate::error::AdapterError;
use crate::markdown::{
    bold_fields, code_blocks, compile, is_field_line, is_list_line, list_items, normalize_inline,
    preamble, section_named, sections_at, split_list, table_rows, Field, LazyRegex,
};
use crate::parsers::{
    extra_sections, header_fields, matches_any, missing_title, title_after, write_extra_sections,
    write_header, ExtraSection,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub const TITLE_PREFIXES: [&str; 1] = ["Implementation Plan:"];

const KNOWN_SECTIONS: [&str; 6] = [
    "Summary",
    "Technical Context",
    "Constitution Check",
    "Project Structure",
    "Implementation Details",
    "Complexity Tracking",
];

static CONSTITUTION_CHECK: LazyRegex = Lazy::new(|| {
    compile(r"^\s*(?:[-*+]\s+)?(?P<mark>✅|❌|✓|✗|✔|✘)\s*\*\*(?P<name>[^*]+?)\*\*\s*:?\s*(?P<notes>.*?)\s*$")
});

/// Parsed implementation plan
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImplementationDoc {
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(skip)]
    pub declared_intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub technical_context: TechnicalContext,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constitution_checks: Vec<ConstitutionCheck>,
    #[serde(default)]
    pub project_structure: ProjectStructure,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implementation_details: Vec<DetailBlock>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub complexity: Vec<ComplexityEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_sections: Vec<ExtraSection>,
}

/// Technology choices from the `Technical Context` section
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TechnicalContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub performance_goals: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<String>,
    /// Entries with labels not listed above
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other: Vec<Field>,
}

impl TechnicalContext {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    fn set(&mut self, label: &str, value: String) {
        let key = label.to_lowercase();
        let single = Some(value.clone()).filter(|v| !v.is_empty());
        if key.starts_with("language") {
            self.language = single;
        } else if key.starts_with("primary dependencies") || key.starts_with("dependencies") {
            self.dependencies = split_list(&value);
        } else if key.starts_with("storage") {
            self.storage = single;
        } else if key.starts_with("testing") {
            self.testing = single;
        } else if key.starts_with("target") {
            self.target_platform = single;
        } else if key.starts_with("project type") {
            self.project_type = single;
        } else if key.starts_with("performance") {
            self.performance_goals = split_list(&value);
        } else if key.starts_with("constraints") {
            self.constraints = split_list(&value);
        } else if key.starts_with("scale") {
            self.scale = single;
        } else {
            self.other.push(Field::new(label, value));
        }
    }

    fn write(&self, out: &mut String) {
        let mut line = |label: &str, value: &str| {
            out.push_str(&format!("**{label}**: {value}\n"));
        };
        if let Some(v) = &self.language {
            line("Language/Version", v);
        }
        if !self.dependencies.is_empty() {
            line("Primary Dependencies", &self.dependencies.join(", "));
        }
        if let Some(v) = &self.storage {
            line("Storage", v);
        }
        if let Some(v) = &self.testing {
            line("Testing", v);
        }
        if let Some(v) = &self.target_platform {
            line("Target Platform", v);
        }
        if let Some(v) = &self.project_type {
            line("Project Type", v);
        }
        if !self.performance_goals.is_empty() {
            line("Performance Goals", &self.performance_goals.join(", "));
        }
        if !self.constraints.is_empty() {
            line("Constraints", &self.constraints.join(", "));
        }
        if let Some(v) = &self.scale {
            line("Scale/Scope", v);
        }
        for field in &self.other {
            line(&field.label, &field.value);
        }
    }
}

/// One gate of the constitution check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstitutionCheck {
    pub name: String,
    pub passed: bool,
    /// Marker as written (✅, ❌, ✓, ✗, ...)
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// `Project Structure` section
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectStructure {
    /// Tree of the feature's documentation directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<StructureOption>,
}

impl ProjectStructure {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documentation.is_none() && self.options.is_empty()
    }

    /// The option marked `(Selected)`, or the only option
    #[must_use]
    pub fn selected(&self) -> Option<&StructureOption> {
        self.options
            .iter()
            .find(|o| o.selected)
            .or_else(|| match self.options.as_slice() {
                [only] => Some(only),
                _ => None,
            })
    }
}

/// A candidate source layout
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StructureOption {
    /// Empty for a single unnamed layout
    pub name: String,
    pub selected: bool,
    pub tree: String,
}

/// Free-form block of the `Implementation Details` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailBlock {
    /// Empty for text before the first subheading
    pub heading: String,
    pub body: String,
}

/// Justified deviation from the constitution
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComplexityEntry {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

/// Parse one implementation plan document
pub fn parse_implementation(text: &str) -> Result<ImplementationDoc, AdapterError> {
    let root = sections_at(text, 1)
        .into_iter()
        .find(|s| title_after(s.title(), &TITLE_PREFIXES).is_some())
        .ok_or_else(|| missing_title("Implementation Plan: <title>"))?;
    let title = title_after(root.title(), &TITLE_PREFIXES)
        .unwrap_or_default()
        .to_string();
    let body = root.body;

    let (fields, declared_intent) = header_fields(body);
    let mut doc = ImplementationDoc {
        title,
        fields,
        declared_intent,
        ..ImplementationDoc::default()
    };

    doc.summary = section_named(body, 2, "Summary")
        .map(|s| s.body.trim().to_string())
        .filter(|s| !s.is_empty());

    if let Some(context) = section_named(body, 2, "Technical Context") {
        for (label, value) in context_entries(context.body) {
            doc.technical_context.set(&label, value);
        }
    }

    if let Some(checks) = section_named(body, 2, "Constitution Check") {
        doc.constitution_checks = parse_constitution(checks.body);
    }

    if let Some(structure) = section_named(body, 2, "Project Structure") {
        doc.project_structure = parse_structure(structure.body);
    }

    if let Some(details) = section_named(body, 2, "Implementation Details") {
        doc.implementation_details = parse_details(details.body);
    }

    if let Some(complexity) = section_named(body, 2, "Complexity Tracking") {
        doc.complexity = parse_complexity(complexity.body);
    }

    doc.extra_sections = extra_sections(body, 2, |s| matches_any(s.title(), &KNOWN_SECTIONS));
    Ok(doc)
}

/// `**Label**: value` entries; an empty value takes the bullets that follow
fn context_entries(body: &str) -> Vec<(String, String)> {
    let mut entries: Vec<(String, String)> = Vec::new();
    let mut collecting = false;
    for line in body.lines() {
        if is_field_line(line) {
            let Some(field) = bold_fields(line).into_iter().next() else {
                continue;
            };
            collecting = field.value.is_empty();
            entries.push((field.label, field.value));
        } else if collecting && is_list_line(line) {
            if let (Some(entry), Some(item)) = (entries.last_mut(), list_items(line).pop()) {
                if !entry.1.is_empty() {
                    entry.1.push_str(", ");
                }
                entry.1.push_str(&normalize_inline(&item.text));
            }
        } else if !line.trim().is_empty() {
            collecting = false;
        }
    }
    entries
}

fn parse_constitution(body: &str) -> Vec<ConstitutionCheck> {
    let Some(re) = CONSTITUTION_CHECK.as_ref() else {
        return Vec::new();
    };
    body.lines()
        .filter_map(|line| re.captures(line))
        .map(|caps| {
            let symbol = caps["mark"].to_string();
            ConstitutionCheck {
                name: caps["name"].trim().trim_end_matches(':').trim().to_string(),
                passed: matches!(symbol.as_str(), "✅" | "✓" | "✔"),
                symbol,
                notes: Some(caps["notes"].trim().to_string()).filter(|n| !n.is_empty()),
            }
        })
        .collect()
}

fn first_code(body: &str) -> Option<String> {
    code_blocks(body).into_iter().next().map(|b| b.body)
}

fn parse_structure(body: &str) -> ProjectStructure {
    let mut structure = ProjectStructure::default();
    for sub in sections_at(body, 3) {
        if matches_any(sub.title(), &["Documentation"]) {
            structure.documentation = first_code(sub.body);
        } else if matches_any(sub.title(), &["Source"]) {
            structure.options = parse_options(sub.body);
        }
    }
    if structure.is_empty() {
        structure.options = parse_options(body);
    }
    structure
}

fn parse_options(body: &str) -> Vec<StructureOption> {
    let named: Vec<StructureOption> = sections_at(body, 4)
        .into_iter()
        .map(|option| {
            let heading = option.title();
            let marker = heading.to_ascii_lowercase().find("(selected)");
            StructureOption {
                name: marker.map_or(heading, |at| &heading[..at]).trim().to_string(),
                selected: marker.is_some(),
                tree: first_code(option.body).unwrap_or_default(),
            }
        })
        .collect();
    if !named.is_empty() {
        return named;
    }
    first_code(body)
        .map(|tree| StructureOption {
            name: String::new(),
            selected: false,
            tree,
        })
        .into_iter()
        .collect()
}

fn parse_details(body: &str) -> Vec<DetailBlock> {
    let lead = preamble(body).trim();
    let mut blocks = Vec::new();
    if !lead.is_empty() {
        blocks.push(DetailBlock {
            heading: String::new(),
            body: lead.to_string(),
        });
    }
    blocks.extend(sections_at(body, 3).into_iter().map(|sub| DetailBlock {
        heading: sub.title().to_string(),
        body: sub.body.trim().to_string(),
    }));
    blocks
}

fn parse_complexity(body: &str) -> Vec<ComplexityEntry> {
    let subsections = sections_at(body, 3);
    if subsections.is_empty() {
        // | Violation | Why Needed | Simpler Alternative Rejected Because |
        return table_rows(body)
            .into_iter()
            .skip(1)
            .filter(|row| row.first().is_some_and(|c| !c.is_empty()))
            .map(|row| {
                let cell = |i: usize| row.get(i).cloned().filter(|c| !c.is_empty());
                ComplexityEntry {
                    title: row[0].clone(),
                    problem: cell(1),
                    solution: None,
                    justification: cell(2),
                }
            })
            .collect();
    }

    subsections
        .into_iter()
        .map(|sub| {
            let mut entry = ComplexityEntry {
                title: sub.title().to_string(),
                ..ComplexityEntry::default()
            };
            for field in bold_fields(sub.body) {
                let value = Some(field.value).filter(|v| !v.is_empty());
                match field.label.to_lowercase().as_str() {
                    l if l.starts_with("problem") => entry.problem = value,
                    l if l.starts_with("solution") => entry.solution = value,
                    l if l.starts_with("justification") => entry.justification = value,
                    _ => {}
                }
            }
            entry
        })
        .collect()
}

impl ImplementationDoc {
    /// Render as Spec Kit markdown
    #[must_use]
    pub fn to_markdown(&self, intent: Option<&str>) -> String {
        let mut out = String::new();
        write_header(
            &mut out,
            &format!("Implementation Plan: {}", self.title),
            intent.map(|i| ("Input", i.to_string())),
            &self.fields,
        );

        if let Some(summary) = &self.summary {
            out.push_str(&format!("## Summary\n\n{summary}\n\n"));
        }

        if !self.technical_context.is_empty() {
            out.push_str("## Technical Context\n\n");
            self.technical_context.write(&mut out);
            out.push('\n');
        }

        if !self.constitution_checks.is_empty() {
            out.push_str("## Constitution Check\n\n");
            for check in &self.constitution_checks {
                match &check.notes {
                    Some(notes) => {
                        out.push_str(&format!("- {} **{}**: {notes}\n", check.symbol, check.name));
                    }
                    None => {
                        out.push_str(&format!("- {} **{}**\n", check.symbol, check.name));
                    }
                }
            }
            out.push('\n');
        }

        if !self.project_structure.is_empty() {
            out.push_str("## Project Structure\n\n");
            if let Some(docs) = &self.project_structure.documentation {
                out.push_str(&format!("### Documentation (this feature)\n\n```text\n{docs}\n```\n\n"));
            }
            if !self.project_structure.options.is_empty() {
                out.push_str("### Source Code (repository root)\n\n");
                for option in &self.project_structure.options {
                    if !option.name.is_empty() {
                        let marker = if option.selected { " (Selected)" } else { "" };
                        out.push_str(&format!("#### {}{marker}\n\n", option.name));
                    }
                    out.push_str(&format!("```text\n{}\n```\n\n", option.tree));
                }
            }
        }

        if !self.implementation_details.is_empty() {
            out.push_str("## Implementation Details\n\n");
            for block in &self.implementation_details {
                if !block.heading.is_empty() {
                    out.push_str(&format!("### {}\n\n", block.heading));
                }
                if !block.body.is_empty() {
                    out.push_str(&format!("{}\n\n", block.body));
                }
            }
        }

        if !self.complexity.is_empty() {
            out.push_str("## Complexity Tracking\n\n");
            for entry in &self.complexity {
                out.push_str(&format!("### {}\n\n", entry.title));
                for (label, value) in [
                    ("Problem", &entry.problem),
                    ("Solution", &entry.solution),
                    ("Justification", &entry.justification),
                ] {
                    if let Some(value) = value {
                        out.push_str(&format!("**{label}**: {value}\n"));
                    }
                }
                out.push('\n');
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

    const PLAN: &str = r#"# Implementation Plan: Authentication

**Branch**: `001-auth` | **Date**: 2025-01-10

## Summary

Add email and password login backed by a session store.

## Technical Context

**Language/Version**: Rust 1.75
**Primary Dependencies**: axum, sqlx, argon2
**Storage**: PostgreSQL
**Testing**: cargo test
**Performance Goals**:
- 200 logins per second
- p95 under 50ms
**Scale/Scope**: 10k users

## Constitution Check

- ✅ **Library-First**: auth lives in its own crate
- ❌ **Test-First**: fixtures pending

## Project Structure

### Documentation (this feature)

```text
specs/001-auth/
├── plan.md
└── tasks.md
```

### Source Code (repository root)

#### Option 1: Single project (Selected)

```text
src/
└── auth/
```

#### Option 2: Web application

```text
backend/
frontend/
```

## Complexity Tracking

| Violation | Why Needed | Simpler Alternative Rejected Because |
|-----------|------------|--------------------------------------|
| Extra crate | Isolation | Module coupling |
"#;

    #[test]
    fn parses_plan_sections() {
        let doc = parse_implementation(PLAN).unwrap();
        assert_eq!(doc.title, "Authentication");
        assert_eq!(
            doc.summary.as_deref(),
            Some("Add email and password login backed by a session store.")
        );

        let ctx = &doc.technical_context;
        assert_eq!(ctx.language.as_deref(), Some("Rust 1.75"));
        assert_eq!(ctx.dependencies, ["axum", "sqlx", "argon2"]);
        assert_eq!(ctx.storage.as_deref(), Some("PostgreSQL"));
        assert_eq!(ctx.performance_goals, ["200 logins per second", "p95 under 50ms"]);
        assert_eq!(ctx.scale.as_deref(), Some("10k users"));

        assert_eq!(doc.constitution_checks.len(), 2);
        assert!(doc.constitution_checks[0].passed);
        assert_eq!(doc.constitution_checks[0].name, "Library-First");
        assert!(!doc.constitution_checks[1].passed);

        let structure = &doc.project_structure;
        assert!(structure.documentation.as_deref().unwrap().starts_with("specs/001-auth/"));
        assert_eq!(structure.options.len(), 2);
        let selected = structure.selected().unwrap();
        assert_eq!(selected.name, "Option 1: Single project");
        assert_eq!(selected.tree, "src/\n└── auth/");

        assert_eq!(
            doc.complexity,
            [ComplexityEntry {
                title: "Extra crate".into(),
                problem: Some("Isolation".into()),
                solution: None,
                justification: Some("Module coupling".into()),
            }]
        );
    }

    #[test]
    fn unnamed_structure_option() {
        let text = "# Implementation Plan: X\n\n## Project Structure\n\n```\nsrc/\n```\n";
        let doc = parse_implementation(text).unwrap();
        assert_eq!(doc.project_structure.options.len(), 1);
        assert_eq!(doc.project_structure.options[0].name, "");
        assert_eq!(doc.project_structure.selected().unwrap().tree, "src/");
    }

    #[test]
    fn unknown_context_labels_are_kept() {
        let text = "# Implementation Plan: X\n\n## Technical Context\n\n**Deployment**: Fly.io\n";
        let doc = parse_implementation(text).unwrap();
        assert_eq!(doc.technical_context.other, [Field::new("Deployment", "Fly.io")]);
    }

    #[test]
    fn rendered_markdown_reparses_equal() {
        let mut doc = parse_implementation(PLAN).unwrap();
        doc.implementation_details = vec![
            DetailBlock {
                heading: String::new(),
                body: "Sessions are opaque tokens.".into(),
            },
            DetailBlock {
                heading: "Hashing".into(),
                body: "Argon2id with default params.".into(),
            },
        ];
        let reparsed = parse_implementation(&doc.to_markdown(None)).unwrap();
        assert_eq!(reparsed, doc);
    }
}
