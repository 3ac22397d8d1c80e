//! BMAD document family
//!
//! A BMAD project carries a PRD, an architecture document, story files and
//! QA gate files. A bundle holds at most one PRD and one architecture
//! document, and any number of stories and gates in document order.

mod architecture;
mod prd;
mod qa_gate;
mod story;

pub use architecture::{parse_architecture, ArchitectureDoc, Component, TechStackEntry};
pub use prd::{parse_prd, Epic, PrdDoc, PrdRequirement, StoryOutline};
pub use qa_gate::{parse_qa_gate, GateDecision, QaGateDoc, QaIssue, Waiver};
pub use story::{parse_story, StoryDoc, StorySubtask, StoryTask};

use crate::error::AdapterError;
use crate::markdown::{split_documents, Field};
use crate::parsers::missing_title;
use serde::{Deserialize, Serialize};

/// Kind of a BMAD document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Prd,
    Architecture,
    Story,
    QaGate,
}

/// Classify a level-1 heading
#[must_use]
pub fn classify(heading: &str) -> Option<DocumentKind> {
    if story::is_story_title(heading) {
        Some(DocumentKind::Story)
    } else if qa_gate::is_gate_title(heading) {
        Some(DocumentKind::QaGate)
    } else if prd::prd_title(heading).is_some() {
        Some(DocumentKind::Prd)
    } else if architecture::architecture_title(heading).is_some() {
        Some(DocumentKind::Architecture)
    } else {
        None
    }
}

/// Parsed BMAD documents of one project
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BmadBundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prd: Option<PrdDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<ArchitectureDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stories: Vec<StoryDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qa_gates: Vec<QaGateDoc>,
}

impl BmadBundle {
    /// Parse every recognized document in `text`
    pub fn parse(text: &str) -> Result<Self, AdapterError> {
        let mut bundle = Self::default();
        for (kind, doc) in split_documents(text, classify) {
            match kind {
                DocumentKind::Prd if bundle.prd.is_none() => bundle.prd = Some(parse_prd(doc)?),
                DocumentKind::Architecture if bundle.architecture.is_none() => {
                    bundle.architecture = Some(parse_architecture(doc)?);
                }
                DocumentKind::Story => bundle.stories.push(parse_story(doc)?),
                DocumentKind::QaGate => bundle.qa_gates.push(parse_qa_gate(doc)?),
                _ => {}
            }
        }
        if bundle.is_empty() {
            return Err(missing_title("<Project> Product Requirements Document (PRD)"));
        }
        Ok(bundle)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prd.is_none()
            && self.architecture.is_none()
            && self.stories.is_empty()
            && self.qa_gates.is_empty()
    }

    /// Project or story title, from the first document present
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.prd
            .as_ref()
            .map(|d| d.title.as_str())
            .or_else(|| self.architecture.as_ref().map(|d| d.title.as_str()))
            .or_else(|| self.stories.first().map(|s| s.title.as_str()))
            .or_else(|| self.qa_gates.first().map(|g| g.story.as_str()))
    }

    /// Declared intent of the first document that has one
    #[must_use]
    pub fn declared_intent(&self) -> Option<&str> {
        self.prd
            .as_ref()
            .and_then(|d| d.declared_intent.as_deref())
            .or_else(|| {
                self.architecture
                    .as_ref()
                    .and_then(|d| d.declared_intent.as_deref())
            })
            .or_else(|| self.stories.iter().find_map(|s| s.declared_intent.as_deref()))
            .or_else(|| self.qa_gates.iter().find_map(|g| g.declared_intent.as_deref()))
    }

    /// Header fields of every document, in document order
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.prd
            .iter()
            .flat_map(|d| d.fields.iter())
            .chain(self.architecture.iter().flat_map(|d| d.fields.iter()))
            .chain(self.stories.iter().flat_map(|d| d.fields.iter()))
            .chain(self.qa_gates.iter().flat_map(|d| d.fields.iter()))
    }

    /// Render every document; `intent` goes into the first one
    pub fn to_markdown(&self, intent: Option<&str>) -> Result<String, AdapterError> {
        let mut parts = Vec::new();
        let mut intent = intent;
        if let Some(doc) = &self.prd {
            parts.push(doc.to_markdown(intent.take()));
        }
        if let Some(doc) = &self.architecture {
            parts.push(doc.to_markdown(intent.take()));
        }
        for doc in &self.stories {
            parts.push(doc.to_markdown(intent.take()));
        }
        for doc in &self.qa_gates {
            parts.push(doc.to_markdown(intent.take())?);
        }
        Ok(parts.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_headings() {
        assert_eq!(
            classify("TaskFlow Product Requirements Document (PRD)"),
            Some(DocumentKind::Prd)
        );
        assert_eq!(
            classify("TaskFlow Architecture Document"),
            Some(DocumentKind::Architecture)
        );
        assert_eq!(classify("Story 1.1: Create tasks"), Some(DocumentKind::Story));
        assert_eq!(classify("QA Gate: 1.1"), Some(DocumentKind::QaGate));
        assert_eq!(classify("Release notes"), None);
    }

    #[test]
    fn bundle_keeps_every_story() {
        let text = "# Story 1.1: A\n\n## Status\n\nDone\n\n# Story 1.2: B\n\n## Status\n\nDraft\n\n# QA Gate: 1.1\n\n```yaml\ngate: PASS\n```\n";
        let bundle = BmadBundle::parse(text).unwrap();
        assert_eq!(bundle.stories.len(), 2);
        assert_eq!(bundle.stories[1].status.as_deref(), Some("Draft"));
        assert_eq!(bundle.qa_gates.len(), 1);
        assert_eq!(bundle.title(), Some("A"));
    }

    #[test]
    fn intent_is_written_once() {
        let bundle = BmadBundle::parse("# Story 1.1: A\n\n# Story 1.2: B\n").unwrap();
        let text = bundle.to_markdown(Some("Deliver the first two stories")).unwrap();
        assert_eq!(text.matches("**Intent**").count(), 1);
        let reparsed = BmadBundle::parse(&text).unwrap();
        assert_eq!(reparsed.declared_intent(), Some("Deliver the first two stories"));
    }

    #[test]
    fn empty_text_fails() {
        assert!(BmadBundle::parse("just prose").is_err());
    }
}
