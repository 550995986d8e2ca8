//! Per-kind selector configuration
//!
//! Selectors are the declarative filter parameters for one resource kind.
//! Every field is optional; an absent field means "not declared". Empty
//! strings and zero thresholds are treated as absent as well.
//!
//! Both snake_case keys and the camelCase spellings used by integration
//! configs are accepted:
//!
//! ```yaml
//! selector:
//!   namePrefix: team-
//!   visibility: public
//! ```

use serde::{Deserialize, Serialize};

use super::severity::Severity;

/// Project visibility as exposed by Harbor's `public` flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSelector {
    /// Sent to Harbor as the `public` query parameter
    pub visibility: Option<Visibility>,

    #[serde(alias = "namePrefix")]
    pub name_prefix: Option<String>,

    /// Must match at the start of the project name
    #[serde(alias = "nameRegex")]
    pub name_regex: Option<String>,

    /// Sent to Harbor as the `owner` query parameter
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSelector {
    #[serde(alias = "adminOnly")]
    pub admin_only: bool,

    /// Domain without the `@`
    #[serde(alias = "emailDomain")]
    pub email_domain: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositorySelector {
    /// Restrict the traversal to one project
    #[serde(alias = "projectName")]
    pub project_name: Option<String>,

    /// Substring of the full `<project>/<repository>` name
    #[serde(alias = "nameContains")]
    pub name_contains: Option<String>,

    /// Prefix of the repository name without its project
    #[serde(alias = "nameStartsWith")]
    pub name_starts_with: Option<String>,

    #[serde(alias = "minArtifactCount")]
    pub min_artifact_count: Option<u64>,

    #[serde(alias = "minPullCount")]
    pub min_pull_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSelector {
    /// Together with `repository_name`, restricts the traversal to one repository
    #[serde(alias = "projectName")]
    pub project_name: Option<String>,

    #[serde(alias = "repositoryName")]
    pub repository_name: Option<String>,

    /// Any tag must match at its start
    #[serde(alias = "tagPattern")]
    pub tag_pattern: Option<String>,

    /// ISO-8601 lower bound on push time
    #[serde(alias = "createdSince")]
    pub created_since: Option<String>,

    #[serde(alias = "mediaType")]
    pub media_type: Option<String>,

    #[serde(alias = "withScanResults")]
    pub with_scan_results: bool,

    #[serde(alias = "minSeverity")]
    pub min_severity: Option<Severity>,

    #[serde(alias = "maxSizeMb")]
    pub max_size_mb: Option<u64>,
}

impl ArtifactSelector {
    /// Whether the listing must ask Harbor to embed scan overviews
    pub fn needs_scan_overview(&self) -> bool {
        self.with_scan_results || self.min_severity.is_some()
    }

    /// The fixed `(project, repository)` scope, if both are declared
    pub fn scope(&self) -> Option<(&str, &str)> {
        match (declared(&self.project_name), declared(&self.repository_name)) {
            (Some(project), Some(repository)) => Some((project, repository)),
            _ => None,
        }
    }
}

impl RepositorySelector {
    /// The fixed project scope, if declared
    pub fn scope(&self) -> Option<&str> {
        declared(&self.project_name)
    }
}

/// A string option counts as declared only when non-empty
pub(crate) fn declared(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// A numeric threshold counts as declared only when non-zero
pub(crate) fn declared_min(value: Option<u64>) -> Option<u64> {
    value.filter(|v| *v > 0)
}
