use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::info;

use super::fanout::{drain_logged, log_fetch_failure, merge_batch, run_branches};
use super::repository::collect_repositories;
use super::{page_batches, Exporter, ResourceKind, SyncLimits};
use crate::client::HarborApi;
use crate::error::HarborError;
use crate::filter::{ArtifactFilter, ArtifactSelector, ProjectFilter, RepositoryFilter};
use crate::model::Artifact;
use crate::pagination::{ArtifactPages, Paginator, ProjectPages};

/// A repository to walk during the all-scope artifact traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    pub project_name: String,

    /// Repository path below the project, as used in artifact URLs
    pub repository_name: String,
}

impl RepositoryRef {
    /// Build from a full repository name such as `library/nginx`
    pub fn new(project_name: &str, full_name: &str) -> Self {
        let repository_name = full_name
            .strip_prefix(project_name)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(full_name);
        Self {
            project_name: project_name.to_string(),
            repository_name: repository_name.to_string(),
        }
    }
}

impl std::fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.project_name, self.repository_name)
    }
}

/// Artifacts of one repository, or of every repository in bounded batches
#[derive(Clone, Copy)]
pub struct ArtifactExporter<'a> {
    api: &'a dyn HarborApi,
    limits: SyncLimits,
}

impl<'a> ArtifactExporter<'a> {
    pub fn new(api: &'a dyn HarborApi, limits: SyncLimits) -> Self {
        Self {
            api,
            limits: limits.clamped(),
        }
    }

    pub fn into_batches(self, selector: &ArtifactSelector) -> BoxStream<'a, Vec<Artifact>> {
        let filter = Arc::new(ArtifactFilter::new(selector));
        match selector.scope() {
            Some((project_name, repository_name)) => self.single_repository(
                RepositoryRef {
                    project_name: project_name.to_string(),
                    repository_name: repository_name.to_string(),
                },
                filter,
            ),
            None => self.all_repositories(filter),
        }
    }

    fn single_repository(
        self,
        target: RepositoryRef,
        filter: Arc<ArtifactFilter>,
    ) -> BoxStream<'a, Vec<Artifact>> {
        let source = ArtifactPages {
            api: self.api,
            project_name: target.project_name.clone(),
            repository_name: target.repository_name.clone(),
            filter,
        };
        let pages = Paginator::with_page_size(source, self.limits.page_size).into_stream();
        let what = format!("artifacts for {target}");
        page_batches(pages, what, move |artifact: &mut Artifact| {
            artifact.stamp(&target.project_name, &target.repository_name);
        })
    }

    fn all_repositories(self, filter: Arc<ArtifactFilter>) -> BoxStream<'a, Vec<Artifact>> {
        let Self { api, limits } = self;
        let semaphore = Arc::new(Semaphore::new(limits.artifact_concurrency));

        stream::once(enumerate_repositories(api, limits.page_size))
            .flat_map(move |refs| {
                let batches: Vec<Vec<RepositoryRef>> = refs
                    .chunks(limits.artifact_batch_size)
                    .map(<[RepositoryRef]>::to_vec)
                    .collect();
                stream::iter(batches)
            })
            .then(move |batch| {
                let filter = Arc::clone(&filter);
                let semaphore = Arc::clone(&semaphore);
                async move {
                    artifact_batch(api, batch, filter, &semaphore, limits.page_size).await
                }
            })
            .filter(|batch| future::ready(!batch.is_empty()))
            .boxed()
    }
}

/// Phase 1: every (project, repository) pair, walked sequentially.
///
/// A project whose repositories cannot be listed is skipped.
async fn enumerate_repositories(api: &dyn HarborApi, page_size: usize) -> Vec<RepositoryRef> {
    let source = ProjectPages {
        api,
        filter: Arc::new(ProjectFilter::default()),
    };
    let projects = drain_logged(Paginator::with_page_size(source, page_size), "projects").await;

    let accept_all = Arc::new(RepositoryFilter::accept_all());
    let mut refs = Vec::new();
    for project in &projects {
        match collect_repositories(api, &project.name, Arc::clone(&accept_all), page_size).await {
            Ok(repositories) => refs.extend(
                repositories
                    .iter()
                    .map(|repo| RepositoryRef::new(&project.name, &repo.name)),
            ),
            Err(e) => {
                log_fetch_failure(&format!("repositories for project {}", project.name), &e);
            }
        }
    }

    info!(
        "Found {} repositories across {} projects to scan for artifacts",
        refs.len(),
        projects.len()
    );
    refs
}

/// All artifacts of one repository, stamped with its owners
pub(crate) async fn collect_artifacts(
    api: &dyn HarborApi,
    target: &RepositoryRef,
    filter: Arc<ArtifactFilter>,
    page_size: usize,
) -> Result<Vec<Artifact>, HarborError> {
    let source = ArtifactPages {
        api,
        project_name: target.project_name.clone(),
        repository_name: target.repository_name.clone(),
        filter,
    };
    let mut artifacts = Paginator::with_page_size(source, page_size)
        .collect_all()
        .await?;
    for artifact in &mut artifacts {
        artifact.stamp(&target.project_name, &target.repository_name);
    }
    Ok(artifacts)
}

/// Phase 2: one batch of repositories fanned out under the semaphore
async fn artifact_batch(
    api: &dyn HarborApi,
    refs: Vec<RepositoryRef>,
    filter: Arc<ArtifactFilter>,
    semaphore: &Semaphore,
    page_size: usize,
) -> Vec<Artifact> {
    let outcomes = run_branches(
        refs,
        semaphore,
        RepositoryRef::to_string,
        |target| {
            let filter = Arc::clone(&filter);
            async move { collect_artifacts(api, &target, filter, page_size).await }
        },
    )
    .await;

    let batch = merge_batch(outcomes, "artifacts");
    if !batch.is_empty() {
        info!("Yielding {} artifacts from batch", batch.len());
    }
    batch
}

impl Exporter for ArtifactExporter<'_> {
    type Selector = ArtifactSelector;
    type Record = Artifact;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Artifact
    }

    fn batches<'s>(&'s self, selector: &ArtifactSelector) -> BoxStream<'s, Vec<Artifact>> {
        (*self).into_batches(selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_ref_strips_project_prefix() {
        let r = RepositoryRef::new("library", "library/nginx");
        assert_eq!(r.repository_name, "nginx");

        let nested = RepositoryRef::new("library", "library/team/api");
        assert_eq!(nested.repository_name, "team/api");
        assert_eq!(nested.to_string(), "library/team/api");
    }

    #[test]
    fn test_repository_ref_without_prefix() {
        let r = RepositoryRef::new("library", "nginx");
        assert_eq!(r.repository_name, "nginx");

        // Only a whole project segment is stripped
        let r = RepositoryRef::new("lib", "library/nginx");
        assert_eq!(r.repository_name, "library/nginx");
    }
}
