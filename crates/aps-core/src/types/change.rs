//! Proposed change records

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

// Variant docs would turn the schema's string enum into a `oneOf`.
/// Category of a proposed change
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    // Create a new file
    FileCreate,
    // Modify an existing file
    FileUpdate,
    // Delete a file
    FileDelete,
    // Add a dependency
    DependencyAdd,
    // Change a dependency version
    DependencyUpdate,
    // Remove a dependency
    DependencyRemove,
    // Change configuration
    ConfigUpdate,
    // Run a script or command
    ScriptExecute,
}

impl ChangeType {
    /// Every change type, in declaration order
    pub const ALL: [ChangeType; 8] = [
        Self::FileCreate,
        Self::FileUpdate,
        Self::FileDelete,
        Self::DependencyAdd,
        Self::DependencyUpdate,
        Self::DependencyRemove,
        Self::ConfigUpdate,
        Self::ScriptExecute,
    ];

    /// Wire name of the change type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FileCreate => "file_create",
            Self::FileUpdate => "file_update",
            Self::FileDelete => "file_delete",
            Self::DependencyAdd => "dependency_add",
            Self::DependencyUpdate => "dependency_update",
            Self::DependencyRemove => "dependency_remove",
            Self::ConfigUpdate => "config_update",
            Self::ScriptExecute => "script_execute",
        }
    }

    /// Whether the change targets a dependency manifest entry
    #[must_use]
    pub const fn is_dependency(self) -> bool {
        matches!(
            self,
            Self::DependencyAdd | Self::DependencyUpdate | Self::DependencyRemove
        )
    }
}

impl Display for ChangeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of proposed modification
///
/// `content` and `diff` are independent optional payloads; either, both, or
/// neither may be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Change {
    /// Change category
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    /// Target resource
    #[schemars(length(min = 1))]
    pub path: String,
    /// Human-readable description
    #[schemars(length(min = 1))]
    pub description: String,
    /// Full payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Incremental payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    /// Free-form extension data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Value>>,
}

impl Change {
    /// Create change without payload
    #[must_use]
    pub fn new(
        change_type: ChangeType,
        path: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            change_type,
            path: path.into(),
            description: description.into(),
            content: None,
            diff: None,
            metadata: None,
        }
    }

    /// With full content payload
    #[inline]
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// With diff payload
    #[inline]
    #[must_use]
    pub fn with_diff(mut self, diff: impl Into<String>) -> Self {
        self.diff = Some(diff.into());
        self
    }

    /// With one metadata entry
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}
