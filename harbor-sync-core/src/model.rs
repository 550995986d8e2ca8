//! Harbor catalog records
//!
//! Records are typed views over the JSON Harbor returns. Fields the engine
//! does not interpret are kept in `extra` so the host platform's mapping still
//! sees the complete upstream object.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A Harbor project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,

    /// Project metadata; Harbor encodes flags such as `public` as strings
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Project {
    /// Whether the project is publicly readable
    pub fn is_public(&self) -> bool {
        match self.metadata.get("public") {
            Some(Value::String(flag)) => flag.eq_ignore_ascii_case("true"),
            Some(Value::Bool(flag)) => *flag,
            _ => false,
        }
    }
}

/// A repository inside a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    /// Full name, usually `<project>/<repository>`
    #[serde(default)]
    pub name: String,

    /// Owning project, stamped during traversal
    #[serde(default)]
    pub project_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_count: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_count: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Repository {
    /// Repository name without its project prefix
    pub fn short_name(&self) -> &str {
        last_path_segment(&self.name)
    }
}

/// A tag attached to an artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub name: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One scanner's report inside an artifact's scan overview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Severity label to finding count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Map<String, Value>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ScanReport {
    /// Numeric `(severity, count)` pairs of the summary.
    ///
    /// Harbor v2 nests the per-severity counts one level deeper
    /// (`summary.summary`) next to `total`/`fixable`; those nested pairs are
    /// included as well.
    pub fn severity_counts(&self) -> Vec<(&str, u64)> {
        let Some(summary) = &self.summary else {
            return Vec::new();
        };

        let mut counts = Vec::new();
        for (label, value) in summary {
            match value {
                Value::Object(nested) => {
                    for (nested_label, nested_value) in nested {
                        if let Some(count) = nested_value.as_u64() {
                            counts.push((nested_label.as_str(), count));
                        }
                    }
                }
                other => {
                    if let Some(count) = other.as_u64() {
                        counts.push((label.as_str(), count));
                    }
                }
            }
        }
        counts
    }
}

/// An artifact (image, chart, ...) inside a repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Identity within the owning repository
    #[serde(default)]
    pub digest: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    /// Size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_time: Option<String>,

    /// Owning project, stamped during traversal
    #[serde(default)]
    pub project_name: String,

    /// Owning repository, stamped during traversal
    #[serde(default)]
    pub repository_name: String,

    /// Harbor sends `null` for untagged artifacts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,

    /// Scanner identifier to report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_overview: Option<BTreeMap<String, ScanReport>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Artifact {
    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().flatten().map(|tag| tag.name.as_str())
    }

    pub fn has_scan_overview(&self) -> bool {
        self.scan_overview
            .as_ref()
            .is_some_and(|overview| !overview.is_empty())
    }

    /// Attach the owning project and repository names
    pub fn stamp(&mut self, project_name: &str, repository_name: &str) {
        self.project_name = project_name.to_string();
        self.repository_name = repository_name.to_string();
    }
}

/// A Harbor user account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub username: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default)]
    pub sysadmin_flag: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Deterministic ordering key for records inside one batch.
///
/// Keys are `(timestamp, secondary)` compared as plain strings; an absent
/// timestamp is the empty string and therefore sorts first.
pub trait Ordered {
    fn order_key(&self) -> (&str, &str);
}

impl Ordered for Project {
    fn order_key(&self) -> (&str, &str) {
        (self.creation_time.as_deref().unwrap_or(""), &self.name)
    }
}

impl Ordered for User {
    fn order_key(&self) -> (&str, &str) {
        (self.creation_time.as_deref().unwrap_or(""), &self.username)
    }
}

impl Ordered for Repository {
    fn order_key(&self) -> (&str, &str) {
        (self.creation_time.as_deref().unwrap_or(""), &self.name)
    }
}

impl Ordered for Artifact {
    fn order_key(&self) -> (&str, &str) {
        (self.push_time.as_deref().unwrap_or(""), &self.digest)
    }
}

/// Sort a batch in place by [`Ordered::order_key`]
pub fn sort_batch<T: Ordered>(records: &mut [T]) {
    records.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
}

/// Last `/`-separated segment of a repository path
pub fn last_path_segment(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Any record the engine can emit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Entity {
    Project(Project),
    User(User),
    Repository(Repository),
    Artifact(Artifact),
}

impl From<Project> for Entity {
    fn from(project: Project) -> Self {
        Entity::Project(project)
    }
}

impl From<User> for Entity {
    fn from(user: User) -> Self {
        Entity::User(user)
    }
}

impl From<Repository> for Entity {
    fn from(repository: Repository) -> Self {
        Entity::Repository(repository)
    }
}

impl From<Artifact> for Entity {
    fn from(artifact: Artifact) -> Self {
        Entity::Artifact(artifact)
    }
}
