use futures::stream::BoxStream;
use std::sync::Arc;

use super::{page_batches, Exporter, ResourceKind, SyncLimits};
use crate::client::HarborApi;
use crate::filter::{ProjectFilter, ProjectSelector};
use crate::model::Project;
use crate::pagination::{Paginator, ProjectPages};

/// Projects, one sorted batch per page
#[derive(Clone, Copy)]
pub struct ProjectExporter<'a> {
    api: &'a dyn HarborApi,
    limits: SyncLimits,
}

impl<'a> ProjectExporter<'a> {
    pub fn new(api: &'a dyn HarborApi, limits: SyncLimits) -> Self {
        Self {
            api,
            limits: limits.clamped(),
        }
    }

    pub fn into_batches(self, selector: &ProjectSelector) -> BoxStream<'a, Vec<Project>> {
        let source = ProjectPages {
            api: self.api,
            filter: Arc::new(ProjectFilter::new(selector)),
        };
        let pages = Paginator::with_page_size(source, self.limits.page_size).into_stream();
        page_batches(pages, "projects".to_string(), |_| {})
    }
}

impl Exporter for ProjectExporter<'_> {
    type Selector = ProjectSelector;
    type Record = Project;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Project
    }

    fn batches<'s>(&'s self, selector: &ProjectSelector) -> BoxStream<'s, Vec<Project>> {
        (*self).into_batches(selector)
    }
}
