//! Adapter registry
//!
//! Holds format adapters by name and picks one for a piece of content. A
//! registry is populated once through `&mut self` and then shared read-only.

use crate::adapters::{
    BmadAdapter, FormatAdapter, ParseContext, ParseOptions, ParsedPlan, SpecKitAdapter,
};
use crate::detect::{DetectionResult, DEFAULT_MIN_CONFIDENCE};
use crate::error::{AdapterErrorCode, ParseFailure, RegistryError};
use std::fmt;
use tracing::{debug, instrument};

/// Adapter chosen for some content, with its detection result
pub struct DetectedAdapter<'a> {
    pub adapter: &'a dyn FormatAdapter,
    pub detection: DetectionResult,
}

impl fmt::Debug for DetectedAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectedAdapter")
            .field("adapter", &self.adapter.name())
            .field("detection", &self.detection)
            .finish()
    }
}

/// Registered format adapters, in registration order
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn FormatAdapter>>,
    min_confidence: u8,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapter_count", &self.adapters.len())
            .field("adapters", &self.names())
            .field("min_confidence", &self.min_confidence)
            .finish()
    }
}

impl AdapterRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            adapters: Vec::new(),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }

    /// Registry with the Spec Kit and BMAD adapters
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.adapters.push(Box::new(SpecKitAdapter::new()));
        registry.adapters.push(Box::new(BmadAdapter::new()));
        registry
    }

    /// Threshold used by [`import`](Self::import)
    #[must_use]
    pub fn with_min_confidence(mut self, min_confidence: u8) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    #[inline]
    #[must_use]
    pub fn min_confidence(&self) -> u8 {
        self.min_confidence
    }

    /// Register an adapter
    ///
    /// # Errors
    /// Returns error if an adapter with the same name is registered
    pub fn register<A: FormatAdapter + 'static>(&mut self, adapter: A) -> Result<(), RegistryError> {
        if self.get(adapter.name()).is_some() {
            return Err(RegistryError::DuplicateAdapter(adapter.name().to_string()));
        }
        debug!(adapter = adapter.name(), "adapter registered");
        self.adapters.push(Box::new(adapter));
        Ok(())
    }

    /// Remove an adapter by name; `false` when none was registered
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.adapters.len();
        self.adapters.retain(|a| a.name() != name);
        before != self.adapters.len()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn FormatAdapter> {
        self.adapters
            .iter()
            .find(|a| a.name() == name)
            .map(|a| &**a)
    }

    /// Adapter with the strictly highest confidence at or above `min_confidence`
    ///
    /// On equal scores the adapter registered first wins.
    #[must_use]
    pub fn detect_adapter(&self, content: &str, min_confidence: u8) -> Option<DetectedAdapter<'_>> {
        let mut best: Option<DetectedAdapter<'_>> = None;
        for adapter in &self.adapters {
            let detection = adapter.detect(content);
            debug!(
                adapter = adapter.name(),
                confidence = detection.confidence,
                "detection score"
            );
            if detection.confidence < min_confidence {
                continue;
            }
            if best
                .as_ref()
                .map_or(true, |b| detection.confidence > b.detection.confidence)
            {
                best = Some(DetectedAdapter {
                    adapter: &**adapter,
                    detection,
                });
            }
        }
        best
    }

    /// Every adapter's detection, highest confidence first
    ///
    /// Equal scores keep registration order.
    #[must_use]
    pub fn detect_all(&self, content: &str) -> Vec<DetectedAdapter<'_>> {
        let mut all: Vec<DetectedAdapter<'_>> = self
            .adapters
            .iter()
            .map(|adapter| DetectedAdapter {
                adapter: &**adapter,
                detection: adapter.detect(content),
            })
            .collect();
        all.sort_by(|a, b| b.detection.confidence.cmp(&a.detection.confidence));
        all
    }

    /// First adapter answering to `format` (name, format id or extension)
    #[must_use]
    pub fn adapter_for_format(&self, format: &str) -> Option<&dyn FormatAdapter> {
        self.adapters
            .iter()
            .find(|a| a.supports(format))
            .map(|a| &**a)
    }

    /// Adapters able to import `format`
    #[must_use]
    pub fn import_adapters(&self, format: &str) -> Vec<&dyn FormatAdapter> {
        self.adapters
            .iter()
            .filter(|a| a.can_import(format))
            .map(|a| &**a)
            .collect()
    }

    /// Adapters able to export `format`
    #[must_use]
    pub fn export_adapters(&self, format: &str) -> Vec<&dyn FormatAdapter> {
        self.adapters
            .iter()
            .filter(|a| a.can_export(format))
            .map(|a| &**a)
            .collect()
    }

    #[must_use]
    pub fn is_format_supported(&self, format: &str) -> bool {
        self.adapter_for_format(format).is_some()
    }

    /// Registered names, in registration order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Detect the dialect of `content` and import it
    ///
    /// # Errors
    /// Returns `NO_ADAPTER_DETECTED` when no adapter reaches the threshold,
    /// otherwise the chosen adapter's parse errors
    #[instrument(level = "debug", skip_all)]
    pub fn import(
        &self,
        content: &str,
        context: &ParseContext,
        options: &ParseOptions,
    ) -> Result<ParsedPlan, ParseFailure> {
        let Some(found) = self.detect_adapter(content, self.min_confidence) else {
            return Err(ParseFailure::single(
                AdapterErrorCode::NoAdapterDetected,
                format!(
                    "no registered adapter reached {} confidence (adapters: {})",
                    self.min_confidence,
                    self.names().join(", ")
                ),
            ));
        };
        debug!(
            adapter = found.adapter.name(),
            confidence = found.detection.confidence,
            "importing"
        );
        found.adapter.parse(content, context, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{SerializeOptions, SerializedDocument, StructuralValidation};
    use crate::error::SerializeFailure;
    use aps_core::{Plan, ValidateOptions};
    use proptest::prelude::*;

    struct Fixed {
        name: &'static str,
        confidence: u8,
    }

    impl FormatAdapter for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "fixed score"
        }

        fn formats(&self) -> &[&str] {
            std::slice::from_ref(&self.name)
        }

        fn extensions(&self) -> &[&str] {
            &["md"]
        }

        fn detect(&self, _content: &str) -> DetectionResult {
            DetectionResult::with_confidence(self.name, self.confidence, DEFAULT_MIN_CONFIDENCE)
        }

        fn parse(
            &self,
            _content: &str,
            _context: &ParseContext,
            _options: &ParseOptions,
        ) -> Result<ParsedPlan, ParseFailure> {
            Err(ParseFailure::single(AdapterErrorCode::Internal, self.name))
        }

        fn serialize(
            &self,
            _plan: &Plan,
            _options: &SerializeOptions,
        ) -> Result<SerializedDocument, SerializeFailure> {
            Err(SerializeFailure::single(AdapterErrorCode::Internal, self.name))
        }

        fn validate(&self, _content: &str, _options: &ValidateOptions) -> StructuralValidation {
            StructuralValidation::default()
        }
    }

    fn fixed(name: &'static str, confidence: u8) -> Fixed {
        Fixed { name, confidence }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = AdapterRegistry::new();
        registry.register(fixed("a", 10)).unwrap();
        let err = registry.register(fixed("a", 20)).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateAdapter(name) if name == "a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unregister_reports_presence() {
        let mut registry = AdapterRegistry::new();
        registry.register(fixed("a", 10)).unwrap();
        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        assert!(registry.is_empty());
    }

    #[test]
    fn highest_confidence_wins() {
        let mut registry = AdapterRegistry::new();
        registry.register(fixed("low", 60)).unwrap();
        registry.register(fixed("high", 90)).unwrap();
        let found = registry.detect_adapter("anything", 50).unwrap();
        assert_eq!(found.adapter.name(), "high");
        assert_eq!(found.detection.confidence, 90);
    }

    #[test]
    fn ties_go_to_first_registered() {
        let mut registry = AdapterRegistry::new();
        registry.register(fixed("first", 70)).unwrap();
        registry.register(fixed("second", 70)).unwrap();
        let found = registry.detect_adapter("anything", 50).unwrap();
        assert_eq!(found.adapter.name(), "first");

        let all = registry.detect_all("anything");
        let names: Vec<&str> = all.iter().map(|d| d.adapter.name()).collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[test]
    fn threshold_filters_weak_matches() {
        let mut registry = AdapterRegistry::new();
        registry.register(fixed("weak", 40)).unwrap();
        assert!(registry.detect_adapter("anything", 50).is_none());
        assert!(registry.detect_adapter("anything", 40).is_some());
    }

    #[test]
    fn import_without_match_is_coded() {
        let mut registry = AdapterRegistry::new();
        registry.register(fixed("weak", 10)).unwrap();
        let failure = registry
            .import("text", &ParseContext::new(), &ParseOptions::default())
            .unwrap_err();
        assert!(failure.has_code(AdapterErrorCode::NoAdapterDetected));
    }

    #[test]
    fn format_lookup() {
        let registry = AdapterRegistry::with_defaults();
        assert_eq!(registry.names(), ["speckit", "bmad"]);
        assert_eq!(registry.adapter_for_format("Spec-Kit").unwrap().name(), "speckit");
        assert_eq!(registry.adapter_for_format("bmad").unwrap().name(), "bmad");
        assert!(registry.is_format_supported(".md"));
        assert!(!registry.is_format_supported("docx"));
        assert_eq!(registry.import_adapters("md").len(), 2);
        assert_eq!(registry.export_adapters("bmad").len(), 1);
    }

    #[test]
    fn debug_lists_names() {
        let text = format!("{:?}", AdapterRegistry::with_defaults());
        assert!(text.contains("adapter_count: 2"));
        assert!(text.contains("speckit"));
    }

    proptest! {
        #[test]
        fn detect_all_is_sorted_descending(scores in proptest::collection::vec(0u8..=100, 1..6)) {
            const NAMES: [&str; 6] = ["a", "b", "c", "d", "e", "f"];
            let mut registry = AdapterRegistry::new();
            for (name, score) in NAMES.iter().zip(&scores) {
                registry.register(fixed(*name, *score)).unwrap();
            }
            let all = registry.detect_all("x");
            prop_assert!(all
                .windows(2)
                .all(|w| w[0].detection.confidence >= w[1].detection.confidence));

            let best = registry.detect_adapter("x", 0).unwrap();
            let max = scores.iter().copied().max().unwrap();
            prop_assert_eq!(best.detection.confidence, max);
        }
    }
}
