//! Harbor webhook payloads
//!
//! ```json
//! {
//!   "type": "PUSH_ARTIFACT",
//!   "occur_at": 1680000000,
//!   "operator": "admin",
//!   "event_data": {
//!     "resources": [{"digest": "sha256:...", "tag": "latest", "resource_url": "..."}],
//!     "repository": {"name": "nginx", "namespace": "library", "repo_full_name": "library/nginx"}
//!   }
//! }
//! ```

use serde::Deserialize;

use crate::model::last_path_segment;

/// Event categories the interpreter acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ArtifactPushed,
    ArtifactDeleted,
    ScanCompleted,
    RepositoryDeleted,
    ProjectDeleted,
}

impl EventKind {
    /// Classify an event type string by substring marker
    pub fn classify(event_type: &str) -> Option<Self> {
        const MARKERS: [(&str, EventKind); 5] = [
            ("PUSH_ARTIFACT", EventKind::ArtifactPushed),
            ("DELETE_ARTIFACT", EventKind::ArtifactDeleted),
            ("SCANNING_COMPLETED", EventKind::ScanCompleted),
            ("DELETE_REPOSITORY", EventKind::RepositoryDeleted),
            ("DELETE_PROJECT", EventKind::ProjectDeleted),
        ];

        MARKERS
            .iter()
            .find(|(marker, _)| event_type.contains(marker))
            .map(|(_, kind)| *kind)
    }

    /// Deletions resolve to nothing; the next full resync drops the entity
    pub fn is_delete(self) -> bool {
        matches!(
            self,
            EventKind::ArtifactDeleted | EventKind::RepositoryDeleted | EventKind::ProjectDeleted
        )
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventKind::ArtifactPushed => "artifact push",
            EventKind::ArtifactDeleted => "artifact delete",
            EventKind::ScanCompleted => "scan completed",
            EventKind::RepositoryDeleted => "repository delete",
            EventKind::ProjectDeleted => "project delete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type", default)]
    pub event_type: String,

    #[serde(default)]
    pub occur_at: Option<i64>,

    #[serde(default)]
    pub operator: Option<String>,

    #[serde(default)]
    pub event_data: EventData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub repository: Option<EventRepository>,

    #[serde(default)]
    pub resources: Vec<EventResource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventRepository {
    #[serde(default)]
    pub name: Option<String>,

    /// Owning project
    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub repo_full_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventResource {
    #[serde(default)]
    pub digest: Option<String>,

    #[serde(default)]
    pub tag: Option<String>,

    #[serde(default)]
    pub resource_url: Option<String>,
}

impl WebhookEvent {
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::classify(&self.event_type)
    }

    /// `(project, repository)` named by the event, repository reduced to its
    /// last path segment
    pub fn target(&self) -> Option<(&str, &str)> {
        let repository = self.event_data.repository.as_ref()?;
        let project = repository.namespace.as_deref().filter(|p| !p.is_empty())?;
        let name = last_path_segment(repository.name.as_deref()?);
        if name.is_empty() {
            return None;
        }
        Some((project, name))
    }

    /// Digests of the affected resources, in order, without duplicates
    pub fn digests(&self) -> Vec<&str> {
        let mut digests: Vec<&str> = Vec::new();
        for digest in self
            .event_data
            .resources
            .iter()
            .filter_map(|r| r.digest.as_deref())
            .filter(|d| !d.is_empty())
        {
            if !digests.contains(&digest) {
                digests.push(digest);
            }
        }
        digests
    }
}
