//! Product requirements document (`# <Project> Product Requirements Document (PRD)`)

use crate::error::AdapterError;
use crate::markdown::{
    clarification, compile, labelled_list, list_items, preamble, section_named, sections,
    sections_at, top_level_items, Field, LazyRegex, UserStory,
};
use crate::parsers::{
    extra_sections, header_fields, lead_story, matches_any, missing_title, write_extra_sections,
    write_header, write_lead_story, write_list, write_numbered, ExtraSection,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub(crate) const MARKER: &str = "Product Requirements Document";

static REQUIREMENT: LazyRegex = Lazy::new(|| {
    compile(r"^\*{0,2}(?P<id>(?P<kind>N?FR)(?P<number>\d+))\*{0,2}\s*:\s*\*{0,2}\s*(?P<text>.*)$")
});
static EPIC: LazyRegex =
    Lazy::new(|| compile(r"^Epic\s+(?P<number>\d+)\s*[:\-–]?\s*(?P<title>.*)$"));
static STORY: LazyRegex =
    Lazy::new(|| compile(r"^Story\s+(?P<id>\d+\.\d+)\s*[:\-–]?\s*(?P<title>.*)$"));

/// Parsed PRD
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrdDoc {
    /// Project name from the title heading
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(skip)]
    pub declared_intent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub goals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functional: Vec<PrdRequirement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub non_functional: Vec<PrdRequirement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub epics: Vec<Epic>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_sections: Vec<ExtraSection>,
}

/// `FR1:` / `NFR1:` requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrdRequirement {
    pub id: String,
    pub number: u32,
    pub text: String,
    pub needs_clarification: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification_question: Option<String>,
}

/// `## Epic N: Title` with its story outlines
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Epic {
    pub number: u32,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stories: Vec<StoryOutline>,
}

/// `### Story N.M: Title` inside an epic
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoryOutline {
    /// `1.1`
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story: Option<UserStory>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptance_criteria: Vec<String>,
}

/// Project name from a PRD heading; `None` if the heading is not a PRD title
pub(crate) fn prd_title(heading: &str) -> Option<String> {
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

fn is_epic(heading: &str) -> bool {
    EPIC.as_ref().is_some_and(|re| re.is_match(heading))
}

/// Parse one PRD
pub fn parse_prd(text: &str) -> Result<PrdDoc, AdapterError> {
    let (root, title) = sections_at(text, 1)
        .into_iter()
        .find_map(|s| prd_title(s.title()).map(|title| (s, title)))
        .ok_or_else(|| missing_title("<Project> Product Requirements Document (PRD)"))?;
    let body = root.body;

    let (fields, declared_intent) = header_fields(body);
    let mut doc = PrdDoc {
        title,
        fields,
        declared_intent,
        ..PrdDoc::default()
    };

    if let Some(goals) = section_named(body, 2, "Goals") {
        doc.goals = section_named(goals.body, 3, "Goals")
            .map_or_else(|| item_texts(preamble(goals.body)), |sub| item_texts(sub.body));
        doc.background = section_named(goals.body, 3, "Background")
            .map(|sub| sub.body.trim().to_string())
            .filter(|b| !b.is_empty());
    }
    if doc.background.is_none() {
        doc.background = section_named(body, 2, "Background")
            .map(|s| s.body.trim().to_string())
            .filter(|b| !b.is_empty());
    }

    if let Some(requirements) = section_named(body, 2, "Requirements") {
        parse_requirements(requirements.body, &mut doc);
    }

    doc.epics = sections(body, |h| h.level == 2 && is_epic(&h.text))
        .into_iter()
        .filter_map(|s| parse_epic(s.title(), s.body))
        .collect();

    doc.extra_sections = extra_sections(body, 2, |s| {
        is_epic(s.title()) || matches_any(s.title(), &["Goals", "Background", "Requirements", "Epic List"])
    });
    Ok(doc)
}

fn item_texts(body: &str) -> Vec<String> {
    top_level_items(body).into_iter().map(|i| i.text).collect()
}

fn parse_requirements(body: &str, doc: &mut PrdDoc) {
    let Some(re) = REQUIREMENT.as_ref() else {
        return;
    };
    for item in list_items(body) {
        let Some(caps) = re.captures(&item.text) else {
            continue;
        };
        let Ok(number) = caps["number"].parse() else {
            continue;
        };
        let text = caps["text"].trim().to_string();
        let clarification_question = clarification(&text);
        let requirement = PrdRequirement {
            id: caps["id"].to_string(),
            number,
            needs_clarification: clarification_question.is_some(),
            clarification_question,
            text,
        };
        if &caps["kind"] == "NFR" {
            doc.non_functional.push(requirement);
        } else {
            doc.functional.push(requirement);
        }
    }
}

fn parse_epic(heading: &str, body: &str) -> Option<Epic> {
    let caps = EPIC.as_ref()?.captures(heading)?;
    let goal = preamble(body).trim();
    let stories = sections_at(body, 3)
        .into_iter()
        .filter_map(|s| {
            let story = STORY.as_ref()?.captures(s.title())?;
            let (user_story, fields) = lead_story(s.body);
            Some(StoryOutline {
                id: story["id"].to_string(),
                title: story["title"].trim().to_string(),
                story: user_story,
                fields,
                acceptance_criteria: labelled_list(s.body, "Acceptance Criteria"),
            })
        })
        .collect();
    Some(Epic {
        number: caps["number"].parse().ok()?,
        title: caps["title"].trim().to_string(),
        goal: Some(goal.to_string()).filter(|g| !g.is_empty()),
        stories,
    })
}

impl PrdDoc {
    /// Render as BMAD markdown; the epic list is derived from the epics
    #[must_use]
    pub fn to_markdown(&self, intent: Option<&str>) -> String {
        let mut out = String::new();
        let heading = if prd_title(&self.title).is_some() {
            self.title.clone()
        } else {
            format!("{} {MARKER} (PRD)", self.title)
        };
        write_header(
            &mut out,
            &heading,
            intent.map(|i| ("Intent", i.to_string())),
            &self.fields,
        );

        if !self.goals.is_empty() || self.background.is_some() {
            out.push_str("## Goals and Background Context\n\n");
            if !self.goals.is_empty() {
                out.push_str("### Goals\n\n");
                write_list(&mut out, &self.goals);
            }
            if let Some(background) = &self.background {
                out.push_str(&format!("### Background Context\n\n{background}\n\n"));
            }
        }

        if !self.functional.is_empty() || !self.non_functional.is_empty() {
            out.push_str("## Requirements\n\n");
            for (heading, requirements) in [
                ("Functional", &self.functional),
                ("Non Functional", &self.non_functional),
            ] {
                if requirements.is_empty() {
                    continue;
                }
                out.push_str(&format!("### {heading}\n\n"));
                for requirement in requirements {
                    out.push_str(&format!("- {}: {}\n", requirement.id, requirement.text));
                }
                out.push('\n');
            }
        }

        if !self.epics.is_empty() {
            out.push_str("## Epic List\n\n");
            let list: Vec<String> = self
                .epics
                .iter()
                .map(|e| format!("Epic {}: {}", e.number, e.title))
                .collect();
            write_numbered(&mut out, &list);

            for epic in &self.epics {
                out.push_str(&format!("## Epic {}: {}\n\n", epic.number, epic.title));
                if let Some(goal) = &epic.goal {
                    out.push_str(&format!("{goal}\n\n"));
                }
                for story in &epic.stories {
                    out.push_str(&format!("### Story {}: {}\n\n", story.id, story.title));
                    write_lead_story(&mut out, story.story.as_ref(), &story.fields);
                    if !story.acceptance_criteria.is_empty() {
                        out.push_str("#### Acceptance Criteria\n\n");
                        write_numbered(&mut out, &story.acceptance_criteria);
                    }
                }
            }
        }

        write_extra_sections(&mut out, 2, &self.extra_sections);
        out
    }
}
