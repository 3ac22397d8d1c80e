//! Requirements document (`# Feature: ...`)

use crate::parsers::{
    extra_sections, header_fields, item_body, lead_story, matches_any, missing_title, title_after,
    write_extra_sections, write_header, write_lead_story, write_list, write_numbered,
    ExtraSection,
};
use crate::error::AdapterError;
use crate::markdown::{
    clarification, compile, labelled_list, list_items, normalize_inline, preamble, section_named,
    sections_at, split_list, top_level_items, Field, LazyRegex, UserStory,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Accepted title prefixes, longest first
pub const TITLE_PREFIXES: [&str; 2] = ["Feature Specification:", "Feature:"];

const KNOWN_SECTIONS: [&str; 4] = ["User Scenarios", "Requirements", "Key Entities", "Success Criteria"];

static PRIORITY_FIRST: LazyRegex =
    Lazy::new(|| compile(r"^(?P<priority>P\d+)\s*[:\-–]\s*(?P<title>.+)$"));
static PRIORITY_LAST: LazyRegex =
    Lazy::new(|| compile(r"^(?P<title>.+?)\s*\(Priority:\s*(?P<priority>P\d+)\)\s*$"));
static REQUIREMENT: LazyRegex = Lazy::new(|| {
    compile(r"^\*{0,2}(?P<id>FR-(?P<number>\d+))\*{0,2}\s*:?\s*\*{0,2}\s*(?P<text>.*)$")
});
static ENTITY_ATTRIBUTE: LazyRegex = Lazy::new(|| {
    compile(r"(?i)^(?:\*\*)?(?P<label>represents|key attributes|attributes|relationships)(?:\*\*)?\s*:\s*(?:\*\*)?\s*(?P<value>.*)$")
});
static ENTITY_NAME: LazyRegex =
    Lazy::new(|| compile(r"^\*\*(?P<name>[^*]+?)\*\*\s*:?\s*(?P<rest>.*)$"));

/// Parsed requirements document
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequirementsDoc {
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    /// Raw `**Input**` value; carried as the plan intent, not as metadata
    #[serde(skip)]
    pub declared_intent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenarios: Vec<UserScenario>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edge_cases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functional_requirements: Vec<FunctionalRequirement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<KeyEntity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub success_criteria: Vec<CriteriaGroup>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_sections: Vec<ExtraSection>,
}

/// A prioritized user scenario
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserScenario {
    /// `P1`, `P2`, ...; absent when the heading carries no priority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story: Option<UserStory>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptance_scenarios: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edge_cases: Vec<String>,
}

/// `FR-001` requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionalRequirement {
    pub id: String,
    pub number: u32,
    /// Requirement text exactly as written
    pub text: String,
    pub needs_clarification: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification_question: Option<String>,
}

impl FunctionalRequirement {
    fn new(id: &str, number: u32, text: &str) -> Self {
        let clarification_question = clarification(text);
        Self {
            id: id.to_string(),
            number,
            text: text.trim().to_string(),
            needs_clarification: clarification_question.is_some(),
            clarification_question,
        }
    }
}

/// Domain entity with its attributes and relationships
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyEntity {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub represents: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_attributes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<String>,
}

/// Success criteria, optionally grouped under a subheading
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CriteriaGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub items: Vec<String>,
}

/// Parse one requirements document
pub fn parse_requirements(text: &str) -> Result<RequirementsDoc, AdapterError> {
    let root = sections_at(text, 1)
        .into_iter()
        .find(|s| title_after(s.title(), &TITLE_PREFIXES).is_some())
        .ok_or_else(|| missing_title("Feature: <title>"))?;
    let title = title_after(root.title(), &TITLE_PREFIXES)
        .unwrap_or_default()
        .to_string();
    let body = root.body;

    let (fields, declared_intent) = header_fields(body);
    let mut doc = RequirementsDoc {
        title,
        fields,
        declared_intent,
        ..RequirementsDoc::default()
    };

    if let Some(scenarios) = section_named(body, 2, "User Scenarios") {
        for sub in sections_at(scenarios.body, 3) {
            if matches_any(sub.title(), &["Edge Cases"]) {
                doc.edge_cases.extend(item_texts(sub.body));
            } else {
                doc.scenarios.push(parse_scenario(sub.title(), sub.body));
            }
        }
    }
    if let Some(edge) = section_named(body, 2, "Edge Cases") {
        doc.edge_cases.extend(item_texts(edge.body));
    }

    if let Some(requirements) = section_named(body, 2, "Requirements") {
        doc.functional_requirements = parse_functional(requirements.body);
        if let Some(entities) = section_named(requirements.body, 3, "Key Entities") {
            doc.entities = parse_entities(entities.body);
        }
    }
    if let Some(entities) = section_named(body, 2, "Key Entities") {
        doc.entities.extend(parse_entities(entities.body));
    }

    if let Some(criteria) = section_named(body, 2, "Success Criteria") {
        doc.success_criteria = parse_criteria(criteria.body);
    }

    doc.extra_sections = extra_sections(body, 2, |s| {
        matches_any(s.title(), &KNOWN_SECTIONS) || matches_any(s.title(), &["Edge Cases"])
    });
    Ok(doc)
}

fn item_texts(body: &str) -> Vec<String> {
    top_level_items(body).into_iter().map(|i| i.text).collect()
}

fn parse_scenario(heading: &str, body: &str) -> UserScenario {
    let (priority, title) = PRIORITY_FIRST
        .as_ref()
        .and_then(|re| re.captures(heading))
        .or_else(|| PRIORITY_LAST.as_ref().and_then(|re| re.captures(heading)))
        .map_or_else(
            || (None, heading.to_string()),
            |caps| (Some(caps["priority"].to_string()), caps["title"].trim().to_string()),
        );
    let (story, fields) = lead_story(body);
    UserScenario {
        priority,
        title,
        story,
        fields,
        acceptance_scenarios: labelled_list(body, "Acceptance Scenarios"),
        edge_cases: labelled_list(body, "Edge Cases"),
    }
}

fn parse_functional(body: &str) -> Vec<FunctionalRequirement> {
    let Some(re) = REQUIREMENT.as_ref() else {
        return Vec::new();
    };
    list_items(body)
        .iter()
        .filter_map(|item| {
            let caps = re.captures(&item.text)?;
            let number = caps["number"].parse().ok()?;
            Some(FunctionalRequirement::new(&caps["id"], number, &caps["text"]))
        })
        .collect()
}

fn parse_entities(body: &str) -> Vec<KeyEntity> {
    let (Some(attribute), Some(name)) = (ENTITY_ATTRIBUTE.as_ref(), ENTITY_NAME.as_ref()) else {
        return Vec::new();
    };

    let mut entities: Vec<KeyEntity> = Vec::new();
    for line in body.lines() {
        let content = item_body(line);
        if let Some(caps) = attribute.captures(content) {
            let Some(entity) = entities.last_mut() else {
                continue;
            };
            let value = normalize_inline(&caps["value"]);
            match caps["label"].to_lowercase().as_str() {
                "represents" => entity.represents = Some(value).filter(|v| !v.is_empty()),
                "relationships" => entity.relationships = split_list(&value),
                _ => entity.key_attributes = split_list(&value),
            }
        } else if let Some(caps) = name.captures(content) {
            let rest = normalize_inline(&caps["rest"]);
            entities.push(KeyEntity {
                name: caps["name"].trim().trim_end_matches(':').trim().to_string(),
                represents: Some(rest).filter(|r| !r.is_empty()),
                ..KeyEntity::default()
            });
        }
    }
    entities
}

fn parse_criteria(body: &str) -> Vec<CriteriaGroup> {
    let mut groups = Vec::new();
    let lead = item_texts(preamble(body));
    if !lead.is_empty() {
        groups.push(CriteriaGroup {
            name: None,
            items: lead,
        });
    }
    groups.extend(sections_at(body, 3).into_iter().map(|sub| CriteriaGroup {
        name: Some(sub.title().to_string()),
        items: item_texts(sub.body),
    }));
    groups
}

impl RequirementsDoc {
    /// Render as Spec Kit markdown
    ///
    /// `intent` is written as the `**Input**` header field.
    #[must_use]
    pub fn to_markdown(&self, intent: Option<&str>) -> String {
        let mut out = String::new();
        write_header(
            &mut out,
            &format!("Feature: {}", self.title),
            intent.map(|i| ("Input", format!("User description: \"{i}\""))),
            &self.fields,
        );

        if !self.scenarios.is_empty() || !self.edge_cases.is_empty() {
            out.push_str("## User Scenarios & Testing\n\n");
            for scenario in &self.scenarios {
                match &scenario.priority {
                    Some(priority) => {
                        out.push_str(&format!("### {priority}: {}\n\n", scenario.title));
                    }
                    None => {
                        out.push_str(&format!("### {}\n\n", scenario.title));
                    }
                }
                write_lead_story(&mut out, scenario.story.as_ref(), &scenario.fields);
                if !scenario.acceptance_scenarios.is_empty() {
                    out.push_str("**Acceptance Scenarios**:\n");
                    write_numbered(&mut out, &scenario.acceptance_scenarios);
                }
                if !scenario.edge_cases.is_empty() {
                    out.push_str("**Edge Cases**:\n");
                    write_list(&mut out, &scenario.edge_cases);
                }
            }
            if !self.edge_cases.is_empty() {
                out.push_str("### Edge Cases\n\n");
                write_list(&mut out, &self.edge_cases);
            }
        }

        if !self.functional_requirements.is_empty() || !self.entities.is_empty() {
            out.push_str("## Requirements\n\n");
            if !self.functional_requirements.is_empty() {
                out.push_str("### Functional Requirements\n\n");
                for fr in &self.functional_requirements {
                    out.push_str(&format!("- **{}**: {}\n", fr.id, fr.text));
                }
                out.push('\n');
            }
            if !self.entities.is_empty() {
                out.push_str("### Key Entities\n\n");
                for entity in &self.entities {
                    write_entity(&mut out, entity);
                }
                out.push('\n');
            }
        }

        if !self.success_criteria.is_empty() {
            out.push_str("## Success Criteria\n\n");
            for group in &self.success_criteria {
                if let Some(name) = &group.name {
                    out.push_str(&format!("### {name}\n\n"));
                }
                write_list(&mut out, &group.items);
            }
        }

        write_extra_sections(&mut out, 2, &self.extra_sections);
        out
    }
}

fn write_entity(out: &mut String, entity: &KeyEntity) {
    out.push_str(&format!("- **{}**\n", entity.name));
    if let Some(represents) = &entity.represents {
        out.push_str(&format!("  - Represents: {represents}\n"));
    }
    if !entity.key_attributes.is_empty() {
        out.push_str(&format!("  - Key Attributes: {}\n", entity.key_attributes.join(", ")));
    }
    if !entity.relationships.is_empty() {
        out.push_str(&format!("  - Relationships: {}\n", entity.relationships.join(", ")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const AUTH: &str = r#"# Feature: Authentication

**Feature Branch**: `001-auth`
**Input**: User description: "Users sign in with email and password"

## User Scenarios & Testing

### P1: Email login

As a registered user, I want to log in with my email, so that I can reach my dashboard.

**Acceptance Scenarios**:
1. **Given** valid credentials, **When** the user submits, **Then** the dashboard opens
2. **Given** a wrong password, **When** the user submits, **Then** an error is shown

## Requirements

### Functional Requirements

- **FR-001**: System MUST hash passwords [NEEDS CLARIFICATION: which hashing algorithm?]
"#;

    #[test]
    fn parses_authentication_feature() {
        let doc = parse_requirements(AUTH).unwrap();
        assert_eq!(doc.title, "Authentication");
        assert_eq!(doc.fields, [Field::new("Feature Branch", "001-auth")]);
        assert_eq!(
            doc.declared_intent.as_deref(),
            Some("User description: \"Users sign in with email and password\"")
        );

        assert_eq!(doc.scenarios.len(), 1);
        let scenario = &doc.scenarios[0];
        assert_eq!(scenario.priority.as_deref(), Some("P1"));
        assert_eq!(scenario.title, "Email login");
        assert_eq!(scenario.acceptance_scenarios.len(), 2);
        assert_eq!(
            scenario.story.as_ref().and_then(|s| s.role.as_deref()),
            Some("registered user")
        );

        assert_eq!(doc.functional_requirements.len(), 1);
        let fr = &doc.functional_requirements[0];
        assert_eq!(fr.id, "FR-001");
        assert_eq!(fr.number, 1);
        assert!(fr.needs_clarification);
        assert_eq!(fr.clarification_question.as_deref(), Some("which hashing algorithm?"));
    }

    #[test]
    fn priority_suffix_heading() {
        let text = "# Feature Specification: Search\n\n## User Scenarios & Testing\n\n### User Story 1 - Find items (Priority: P2)\n\nAs a shopper, I want to search\n";
        let doc = parse_requirements(text).unwrap();
        assert_eq!(doc.title, "Search");
        assert_eq!(doc.scenarios[0].priority.as_deref(), Some("P2"));
        assert_eq!(doc.scenarios[0].title, "User Story 1 - Find items");
    }

    #[test]
    fn entities_and_criteria() {
        let text = "# Feature: Orders\n\n## Requirements\n\n### Key Entities\n\n- **Order**: A customer purchase\n  - Key Attributes: id, total, status\n  - Relationships: Customer, LineItem\n- **Customer**\n\n## Success Criteria\n\n- 95% of orders confirm in 2s\n\n### Quality\n\n- Zero data loss\n";
        let doc = parse_requirements(text).unwrap();
        assert_eq!(
            doc.entities[0],
            KeyEntity {
                name: "Order".into(),
                represents: Some("A customer purchase".into()),
                key_attributes: vec!["id".into(), "total".into(), "status".into()],
                relationships: vec!["Customer".into(), "LineItem".into()],
            }
        );
        assert_eq!(doc.entities[1].name, "Customer");
        assert_eq!(doc.success_criteria.len(), 2);
        assert_eq!(doc.success_criteria[0].name, None);
        assert_eq!(doc.success_criteria[1].name.as_deref(), Some("Quality"));
    }

    #[test]
    fn unknown_sections_are_kept() {
        let text = "# Feature: X\n\n## Review Checklist\n\n- [ ] reviewed\n";
        let doc = parse_requirements(text).unwrap();
        assert_eq!(doc.extra_sections[0].heading, "Review Checklist");
        assert_eq!(doc.extra_sections[0].body, "- [ ] reviewed");
    }

    #[test]
    fn missing_title_fails() {
        let err = parse_requirements("# Something else\n").unwrap_err();
        assert_eq!(err.code, crate::error::AdapterErrorCode::MissingTitle);
    }

    #[test]
    fn rendered_markdown_reparses_equal() {
        let mut doc = parse_requirements(AUTH).unwrap();
        doc.edge_cases.push("Account locked after five attempts".into());
        doc.entities.push(KeyEntity {
            name: "User".into(),
            represents: Some("An account holder".into()),
            key_attributes: vec!["email".into()],
            relationships: Vec::new(),
        });
        let rendered = doc.to_markdown(Some("Users sign in with email and password"));
        let reparsed = parse_requirements(&rendered).unwrap();
        assert_eq!(reparsed, doc);
    }
}
