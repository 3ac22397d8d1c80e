//! APS Adapters
//!
//! Bidirectional conversion between markdown planning dialects and the
//! canonical [`aps_core::Plan`].
//!
//! # Core Operations
//!
//! - **Detect**: score content against each dialect's indicators
//! - **Import**: parse dialect documents into a hashed plan
//! - **Export**: regenerate dialect text with identity header and evidence
//!
//! # Architecture
//!
//! ```text
//! markdown → FormatDetector → FormatAdapter::parse → Plan
//!                                                     │
//! markdown ← evidence block ← FormatAdapter::serialize ┘
//!             AdapterRegistry (speckit, bmad, ...)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use aps_adapters::prelude::*;
//!
//! let registry = AdapterRegistry::with_defaults();
//! let parsed = registry.import(&text, &ParseContext::new(), &ParseOptions::default())?;
//! let adapter = registry.get("speckit").unwrap();
//! let exported = adapter.serialize(&parsed.plan, &SerializeOptions::default())?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod adapters;
pub mod config;
pub mod detect;
pub mod error;
pub mod markdown;
pub mod parsers;
pub mod registry;

pub use adapters::{
    AdapterCapabilities, BmadAdapter, FormatAdapter, ParseContext, ParseOptions, ParsedPlan,
    SerializeOptions, SerializedDocument, SpecKitAdapter, StructuralValidation,
};
pub use config::ApsConfig;
pub use detect::{DetectionResult, Detector, DEFAULT_MIN_CONFIDENCE};
pub use error::{
    AdapterError, AdapterErrorCode, AdapterWarning, ConfigError, ParseFailure, RegistryError,
    SerializeFailure, WarningCode,
};
pub use registry::{AdapterRegistry, DetectedAdapter};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for importing and exporting plans
    pub use crate::adapters::{
        FormatAdapter, ParseContext, ParseOptions, ParsedPlan, SerializeOptions,
        SerializedDocument,
    };
    pub use crate::config::ApsConfig;
    pub use crate::error::{AdapterErrorCode, ParseFailure, SerializeFailure, WarningCode};
    pub use crate::registry::AdapterRegistry;
    pub use aps_core::{Plan, ValidateOptions};
}

#[cfg(test)]
mod integration_tests {
    use super::prelude::*;

    #[test]
    fn default_registry_routes_by_content() {
        let registry = AdapterRegistry::with_defaults();
        let speckit = "# Feature Specification: Export\n\n## Requirements\n\n- **FR-001**: System MUST export reports as CSV\n";
        let bmad = "# Story 1.1: Export\n\n## Tasks / Subtasks\n\n- [ ] Add CSV writer\n";

        let found = registry.detect_adapter(speckit, 0).unwrap();
        assert_eq!(found.adapter.name(), "speckit");
        let found = registry.detect_adapter(bmad, 0).unwrap();
        assert_eq!(found.adapter.name(), "bmad");
    }

    #[test]
    fn version_is_set() {
        assert!(!crate::VERSION.is_empty());
    }

    #[test]
    fn import_then_export() {
        let registry = AdapterRegistry::with_defaults();
        let text = "# Story 1.1: Export reports\n\n## Story\n\n**As a** manager,\n**I want** to export reports,\n**so that** I can share them\n\n## Acceptance Criteria\n\n1. CSV download works\n\n## Tasks / Subtasks\n\n- [ ] Add CSV writer in `src/export.rs` (AC: 1)\n";
        let parsed = registry
            .import(text, &ParseContext::new(), &ParseOptions::default())
            .unwrap();
        let adapter = registry.get("bmad").unwrap();
        let exported = adapter
            .serialize(&parsed.plan, &SerializeOptions::default())
            .unwrap();
        assert!(exported.content.starts_with("<!-- aps:plan "));
        assert!(exported.content.contains("- [ ] Add CSV writer in `src/export.rs` (AC: 1)"));
    }
}
