//! Plan provenance

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Variant docs would turn the schema's string enum into a `oneOf`.
/// Origin classification of a plan
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProvenanceSource {
    // Interactive tool
    Cli,
    // Programmatic API
    #[default]
    Api,
    // Automation pipeline
    Ci,
    // Hand-authored
    Manual,
}

impl ProvenanceSource {
    /// Wire name of the source
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cli => "cli",
            Self::Api => "api",
            Self::Ci => "ci",
            Self::Manual => "manual",
        }
    }
}

/// Who, what, when and where created a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Provenance {
    /// Creation time (RFC 3339, UTC)
    pub timestamp: DateTime<Utc>,
    /// Origin classification
    pub source: ProvenanceSource,
    /// Version of the creating tool
    #[schemars(length(min = 1))]
    pub version: String,
    /// Person or service that authored the plan
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Source repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    /// Branch the plan targets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Commit the plan was written against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

impl Provenance {
    /// Create provenance with required fields
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, source: ProvenanceSource, version: impl Into<String>) -> Self {
        Self {
            timestamp,
            source,
            version: version.into(),
            author: None,
            repository: None,
            branch: None,
            commit: None,
        }
    }

    /// With author
    #[inline]
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// With repository
    #[inline]
    #[must_use]
    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    /// With branch
    #[inline]
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// With commit
    #[inline]
    #[must_use]
    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn timestamp_serializes_as_rfc3339_utc() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap();
        let provenance = Provenance::new(ts, ProvenanceSource::Cli, "0.1.0").with_author("dev");
        let value = serde_json::to_value(&provenance).unwrap();
        assert_eq!(
            value,
            json!({
                "timestamp": "2025-01-15T10:30:00Z",
                "source": "cli",
                "version": "0.1.0",
                "author": "dev"
            })
        );
    }

    #[test]
    fn source_wire_names() {
        for source in [
            ProvenanceSource::Cli,
            ProvenanceSource::Api,
            ProvenanceSource::Ci,
            ProvenanceSource::Manual,
        ] {
            assert_eq!(serde_json::to_value(source).unwrap(), json!(source.as_str()));
        }
    }
}
