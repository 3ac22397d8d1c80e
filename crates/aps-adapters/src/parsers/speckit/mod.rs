//! Spec Kit document triad
//!
//! A feature is described by up to three documents, each opened by its own
//! level-1 heading:
//!
//! - `# Feature: ...` requirements ([`RequirementsDoc`])
//! - `# Implementation Plan: ...` ([`ImplementationDoc`])
//! - `# Tasks: ...` ([`TasksDoc`])
//!
//! A bundle holds whichever of the three are present. When a kind appears
//! more than once, the first document of that kind wins.

mod implementation;
mod requirements;
mod tasks;

pub use implementation::{
    parse_implementation, ComplexityEntry, ConstitutionCheck, DetailBlock, ImplementationDoc,
    ProjectStructure, StructureOption, TechnicalContext,
};
pub use requirements::{
    parse_requirements, CriteriaGroup, FunctionalRequirement, KeyEntity, RequirementsDoc,
    UserScenario,
};
pub use tasks::{parse_tasks, ExecutionOrder, Phase, Strategy, Task, TasksDoc};

use crate::error::AdapterError;
use crate::markdown::split_documents;
use crate::parsers::{missing_title, title_after};
use serde::{Deserialize, Serialize};

/// Kind of a Spec Kit document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Requirements,
    Implementation,
    Tasks,
}

/// Classify a level-1 heading
#[must_use]
pub fn classify(heading: &str) -> Option<DocumentKind> {
    if title_after(heading, &requirements::TITLE_PREFIXES).is_some() {
        Some(DocumentKind::Requirements)
    } else if title_after(heading, &implementation::TITLE_PREFIXES).is_some() {
        Some(DocumentKind::Implementation)
    } else if title_after(heading, &tasks::TITLE_PREFIXES).is_some() {
        Some(DocumentKind::Tasks)
    } else {
        None
    }
}

/// Parsed Spec Kit documents of one feature
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpecKitBundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<RequirementsDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<ImplementationDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<TasksDoc>,
}

impl SpecKitBundle {
    /// Parse every recognized document in `text`
    pub fn parse(text: &str) -> Result<Self, AdapterError> {
        let mut bundle = Self::default();
        for (kind, doc) in split_documents(text, classify) {
            match kind {
                DocumentKind::Requirements if bundle.requirements.is_none() => {
                    bundle.requirements = Some(parse_requirements(doc)?);
                }
                DocumentKind::Implementation if bundle.implementation.is_none() => {
                    bundle.implementation = Some(parse_implementation(doc)?);
                }
                DocumentKind::Tasks if bundle.tasks.is_none() => {
                    bundle.tasks = Some(parse_tasks(doc)?);
                }
                _ => {}
            }
        }
        if bundle.is_empty() {
            return Err(missing_title("Feature: <title>"));
        }
        Ok(bundle)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requirements.is_none() && self.implementation.is_none() && self.tasks.is_none()
    }

    /// Feature title, from the first document present
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.requirements
            .as_ref()
            .map(|d| d.title.as_str())
            .or_else(|| self.implementation.as_ref().map(|d| d.title.as_str()))
            .or_else(|| self.tasks.as_ref().map(|d| d.title.as_str()))
    }

    /// Header fields of every document, in document order
    pub fn fields(&self) -> impl Iterator<Item = &crate::markdown::Field> {
        self.requirements
            .iter()
            .flat_map(|d| d.fields.iter())
            .chain(self.implementation.iter().flat_map(|d| d.fields.iter()))
            .chain(self.tasks.iter().flat_map(|d| d.fields.iter()))
    }

    /// Render every document; `intent` goes into the first one
    #[must_use]
    pub fn to_markdown(&self, intent: Option<&str>) -> String {
        let mut parts = Vec::new();
        let mut intent = intent;
        if let Some(doc) = &self.requirements {
            parts.push(doc.to_markdown(intent.take()));
        }
        if let Some(doc) = &self.implementation {
            parts.push(doc.to_markdown(intent.take()));
        }
        if let Some(doc) = &self.tasks {
            parts.push(doc.to_markdown(intent.take()));
        }
        parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_headings() {
        assert_eq!(classify("Feature: Auth"), Some(DocumentKind::Requirements));
        assert_eq!(
            classify("Feature Specification: Auth"),
            Some(DocumentKind::Requirements)
        );
        assert_eq!(
            classify("Implementation Plan: Auth"),
            Some(DocumentKind::Implementation)
        );
        assert_eq!(classify("Tasks: Auth"), Some(DocumentKind::Tasks));
        assert_eq!(classify("Auth"), None);
    }

    #[test]
    fn bundle_collects_all_documents() {
        let text = "# Feature: Auth\n\n## Requirements\n\n- **FR-001**: Log in\n\n# Implementation Plan: Auth\n\n## Summary\n\nDo it.\n\n# Tasks: Auth\n\n## Phase 1: Setup\n\n- [T001] Init\n";
        let bundle = SpecKitBundle::parse(text).unwrap();
        assert_eq!(bundle.title(), Some("Auth"));
        assert_eq!(
            bundle.requirements.as_ref().unwrap().functional_requirements.len(),
            1
        );
        assert_eq!(
            bundle.implementation.as_ref().unwrap().summary.as_deref(),
            Some("Do it.")
        );
        assert_eq!(bundle.tasks.as_ref().unwrap().phases[0].tasks.len(), 1);
    }

    #[test]
    fn tasks_only_bundle() {
        let bundle = SpecKitBundle::parse("# Tasks: Solo\n\n## Phase 1: Setup\n\n- [T001] Init\n").unwrap();
        assert!(bundle.requirements.is_none());
        assert_eq!(bundle.title(), Some("Solo"));
    }

    #[test]
    fn unrecognized_text_fails() {
        assert!(SpecKitBundle::parse("# Notes\n\nnothing\n").is_err());
    }

    #[test]
    fn intent_is_written_once() {
        let bundle = SpecKitBundle::parse("# Implementation Plan: A\n\n# Tasks: A\n").unwrap();
        let text = bundle.to_markdown(Some("Ship the auth feature today"));
        assert_eq!(text.matches("**Input**").count(), 1);
        let reparsed = SpecKitBundle::parse(&text).unwrap();
        assert_eq!(
            reparsed.implementation.unwrap().declared_intent.as_deref(),
            Some("Ship the auth feature today")
        );
    }
}
