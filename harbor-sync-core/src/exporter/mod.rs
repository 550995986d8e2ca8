//! Catalog exporters
//!
//! One exporter per resource kind, each producing a stream of batches from a
//! selector. Every batch is internally sorted by `(timestamp, name|digest)`;
//! there is no ordering across batches.
//!
//! # Traversal shapes
//!
//! ```text
//! single scope   Paginator ── page ──▶ stamp + sort ──▶ batch
//!
//! all scope      phase 1: enumerate parents (sequential, to exhaustion)
//!                phase 2: for each chunk of `batch_size` parents
//!                           ├─ branch ─┐
//!                           ├─ branch ─┼─ (≤ concurrency permits)
//!                           └─ branch ─┘
//!                         join ──▶ concat + sort ──▶ batch (if non-empty)
//! ```
//!
//! Failures never escape a stream: a failed page or branch is logged and
//! contributes nothing.

mod artifact;
mod fanout;
mod project;
mod repository;
mod user;

pub use artifact::{ArtifactExporter, RepositoryRef};
pub(crate) use artifact::collect_artifacts;
pub use fanout::{drain_logged, merge_batch, run_branches, BranchOutcome};
pub use project::ProjectExporter;
pub use repository::RepositoryExporter;
pub use user::UserExporter;

use futures::future;
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::client::HarborApi;
use crate::error::HarborError;
use crate::filter::{ArtifactSelector, ProjectSelector, RepositorySelector, UserSelector};
use crate::model::{sort_batch, Entity, Ordered};
use crate::pagination::{Page, PAGE_SIZE};

/// Batch sizes and concurrency caps for the traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncLimits {
    pub page_size: usize,

    /// Projects per all-scope repository batch
    pub repository_batch_size: usize,

    /// Concurrent project branches during repository traversal
    pub repository_concurrency: usize,

    /// Repositories per all-scope artifact batch
    pub artifact_batch_size: usize,

    /// Concurrent repository branches during artifact traversal
    pub artifact_concurrency: usize,
}

impl Default for SyncLimits {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            repository_batch_size: 10,
            repository_concurrency: 5,
            artifact_batch_size: 5,
            artifact_concurrency: 3,
        }
    }
}

impl SyncLimits {
    /// Replace zero values with 1 so chunking and semaphores stay usable
    pub fn clamped(self) -> Self {
        Self {
            page_size: self.page_size.max(1),
            repository_batch_size: self.repository_batch_size.max(1),
            repository_concurrency: self.repository_concurrency.max(1),
            artifact_batch_size: self.artifact_batch_size.max(1),
            artifact_concurrency: self.artifact_concurrency.max(1),
        }
    }
}

/// The resource kinds the engine can export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "harbor-project", alias = "project")]
    Project,
    #[serde(rename = "harbor-user", alias = "user")]
    User,
    #[serde(rename = "harbor-repository", alias = "repository")]
    Repository,
    #[serde(rename = "harbor-artifact", alias = "artifact")]
    Artifact,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Project,
        ResourceKind::User,
        ResourceKind::Repository,
        ResourceKind::Artifact,
    ];

    /// Identifier used in integration configs
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Project => "harbor-project",
            ResourceKind::User => "harbor-user",
            ResourceKind::Repository => "harbor-repository",
            ResourceKind::Artifact => "harbor-artifact",
        }
    }

    /// Parse either the integration identifier or the bare kind name
    pub fn parse(value: &str) -> Option<Self> {
        let bare = value.strip_prefix("harbor-").unwrap_or(value);
        match bare {
            "project" => Some(ResourceKind::Project),
            "user" => Some(ResourceKind::User),
            "repository" => Some(ResourceKind::Repository),
            "artifact" => Some(ResourceKind::Artifact),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A selector tagged with its resource kind
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceSelector {
    Project(ProjectSelector),
    User(UserSelector),
    Repository(RepositorySelector),
    Artifact(ArtifactSelector),
}

impl ResourceSelector {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSelector::Project(_) => ResourceKind::Project,
            ResourceSelector::User(_) => ResourceKind::User,
            ResourceSelector::Repository(_) => ResourceKind::Repository,
            ResourceSelector::Artifact(_) => ResourceKind::Artifact,
        }
    }

    /// A selector with nothing declared
    pub fn default_for(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Project => ResourceSelector::Project(ProjectSelector::default()),
            ResourceKind::User => ResourceSelector::User(UserSelector::default()),
            ResourceKind::Repository => {
                ResourceSelector::Repository(RepositorySelector::default())
            }
            ResourceKind::Artifact => ResourceSelector::Artifact(ArtifactSelector::default()),
        }
    }
}

/// Shared capability of every exporter: produce batches from a selector
pub trait Exporter {
    type Selector;
    type Record: Into<Entity> + Send;

    fn kind(&self) -> ResourceKind;

    fn batches<'a>(&'a self, selector: &Self::Selector) -> BoxStream<'a, Vec<Self::Record>>;
}

/// Turn a page stream into sorted, stamped batches.
///
/// Empty batches are skipped; a page error is logged and ends the stream.
pub(crate) fn page_batches<'a, T, F>(
    pages: BoxStream<'a, Result<Page<T>, HarborError>>,
    what: String,
    mut stamp: F,
) -> BoxStream<'a, Vec<T>>
where
    T: Ordered + Send + 'a,
    F: FnMut(&mut T) + Send + 'a,
{
    pages
        .filter_map(move |page| {
            let batch = match page {
                Ok(page) => {
                    let mut records = page.records;
                    records.iter_mut().for_each(&mut stamp);
                    sort_batch(&mut records);
                    if records.is_empty() {
                        None
                    } else {
                        info!("Yielding {} {}", records.len(), what);
                        Some(records)
                    }
                }
                Err(e) => {
                    fanout::log_fetch_failure(&what, &e);
                    None
                }
            };
            future::ready(batch)
        })
        .boxed()
}

fn into_entities<'a, T>(batches: BoxStream<'a, Vec<T>>) -> BoxStream<'a, Vec<Entity>>
where
    T: Into<Entity> + Send + 'a,
{
    batches
        .map(|batch| batch.into_iter().map(Into::into).collect())
        .boxed()
}

/// Entry point for the host platform: one stream of batches per kind
#[derive(Clone)]
pub struct CatalogSync {
    api: Arc<dyn HarborApi>,
    limits: SyncLimits,
}

impl CatalogSync {
    pub fn new(api: Arc<dyn HarborApi>) -> Self {
        Self::with_limits(api, SyncLimits::default())
    }

    pub fn with_limits(api: Arc<dyn HarborApi>, limits: SyncLimits) -> Self {
        Self {
            api,
            limits: limits.clamped(),
        }
    }

    pub fn limits(&self) -> SyncLimits {
        self.limits
    }

    pub fn projects(
        &self,
        selector: &ProjectSelector,
    ) -> BoxStream<'_, Vec<crate::model::Project>> {
        ProjectExporter::new(self.api.as_ref(), self.limits).into_batches(selector)
    }

    pub fn users(&self, selector: &UserSelector) -> BoxStream<'_, Vec<crate::model::User>> {
        UserExporter::new(self.api.as_ref(), self.limits).into_batches(selector)
    }

    pub fn repositories(
        &self,
        selector: &RepositorySelector,
    ) -> BoxStream<'_, Vec<crate::model::Repository>> {
        RepositoryExporter::new(self.api.as_ref(), self.limits).into_batches(selector)
    }

    pub fn artifacts(
        &self,
        selector: &ArtifactSelector,
    ) -> BoxStream<'_, Vec<crate::model::Artifact>> {
        ArtifactExporter::new(self.api.as_ref(), self.limits).into_batches(selector)
    }

    /// Dispatch on the selector's kind
    pub fn export(&self, selector: &ResourceSelector) -> BoxStream<'_, Vec<Entity>> {
        info!("Starting Harbor {} export", selector.kind());
        match selector {
            ResourceSelector::Project(s) => into_entities(self.projects(s)),
            ResourceSelector::User(s) => into_entities(self.users(s)),
            ResourceSelector::Repository(s) => into_entities(self.repositories(s)),
            ResourceSelector::Artifact(s) => into_entities(self.artifacts(s)),
        }
    }
}
