use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::info;

use super::fanout::{drain_logged, merge_batch, run_branches};
use super::{page_batches, Exporter, ResourceKind, SyncLimits};
use crate::client::HarborApi;
use crate::error::HarborError;
use crate::filter::{ProjectFilter, RepositoryFilter, RepositorySelector};
use crate::model::{Project, Repository};
use crate::pagination::{Paginator, ProjectPages, RepositoryPages};

/// Repositories of one project, or of every project in bounded batches
#[derive(Clone, Copy)]
pub struct RepositoryExporter<'a> {
    api: &'a dyn HarborApi,
    limits: SyncLimits,
}

impl<'a> RepositoryExporter<'a> {
    pub fn new(api: &'a dyn HarborApi, limits: SyncLimits) -> Self {
        Self {
            api,
            limits: limits.clamped(),
        }
    }

    pub fn into_batches(self, selector: &RepositorySelector) -> BoxStream<'a, Vec<Repository>> {
        let filter = Arc::new(RepositoryFilter::new(selector));
        match selector.scope() {
            Some(project_name) => self.single_project(project_name.to_string(), filter),
            None => self.all_projects(filter),
        }
    }

    fn single_project(
        self,
        project_name: String,
        filter: Arc<RepositoryFilter>,
    ) -> BoxStream<'a, Vec<Repository>> {
        let source = RepositoryPages {
            api: self.api,
            project_name: project_name.clone(),
            filter,
        };
        let pages = Paginator::with_page_size(source, self.limits.page_size).into_stream();
        let what = format!("repositories for project {project_name}");
        page_batches(pages, what, move |repo: &mut Repository| {
            repo.project_name = project_name.clone();
        })
    }

    fn all_projects(self, filter: Arc<RepositoryFilter>) -> BoxStream<'a, Vec<Repository>> {
        let Self { api, limits } = self;
        let semaphore = Arc::new(Semaphore::new(limits.repository_concurrency));

        stream::once(enumerate_projects(api, limits.page_size))
            .flat_map(move |projects| {
                let batches: Vec<Vec<Project>> = projects
                    .chunks(limits.repository_batch_size)
                    .map(<[Project]>::to_vec)
                    .collect();
                stream::iter(batches)
            })
            .then(move |batch| {
                let filter = Arc::clone(&filter);
                let semaphore = Arc::clone(&semaphore);
                async move {
                    repository_batch(api, batch, filter, &semaphore, limits.page_size).await
                }
            })
            .filter(|batch| future::ready(!batch.is_empty()))
            .boxed()
    }
}

/// Phase 1: every project, unfiltered
async fn enumerate_projects(api: &dyn HarborApi, page_size: usize) -> Vec<Project> {
    let source = ProjectPages {
        api,
        filter: Arc::new(ProjectFilter::default()),
    };
    let projects = drain_logged(Paginator::with_page_size(source, page_size), "projects").await;
    info!("Found {} projects to scan for repositories", projects.len());
    projects
}

/// All repositories of one project, stamped with its name
pub(crate) async fn collect_repositories(
    api: &dyn HarborApi,
    project_name: &str,
    filter: Arc<RepositoryFilter>,
    page_size: usize,
) -> Result<Vec<Repository>, HarborError> {
    let source = RepositoryPages {
        api,
        project_name: project_name.to_string(),
        filter,
    };
    let mut repositories = Paginator::with_page_size(source, page_size)
        .collect_all()
        .await?;
    for repo in &mut repositories {
        repo.project_name = project_name.to_string();
    }
    Ok(repositories)
}

/// Phase 2: one batch of projects fanned out under the semaphore
async fn repository_batch(
    api: &dyn HarborApi,
    projects: Vec<Project>,
    filter: Arc<RepositoryFilter>,
    semaphore: &Semaphore,
    page_size: usize,
) -> Vec<Repository> {
    let outcomes = run_branches(
        projects,
        semaphore,
        |project| project.name.clone(),
        |project| {
            let filter = Arc::clone(&filter);
            async move { collect_repositories(api, &project.name, filter, page_size).await }
        },
    )
    .await;

    let batch = merge_batch(outcomes, "repositories");
    if !batch.is_empty() {
        info!("Yielding {} repositories from batch", batch.len());
    }
    batch
}

impl Exporter for RepositoryExporter<'_> {
    type Selector = RepositorySelector;
    type Record = Repository;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Repository
    }

    fn batches<'s>(&'s self, selector: &RepositorySelector) -> BoxStream<'s, Vec<Repository>> {
        (*self).into_batches(selector)
    }
}
