use futures::stream::BoxStream;
use std::sync::Arc;

use super::{page_batches, Exporter, ResourceKind, SyncLimits};
use crate::client::HarborApi;
use crate::filter::{UserFilter, UserSelector};
use crate::model::User;
use crate::pagination::{Paginator, UserPages};

/// Users, one sorted batch per page
#[derive(Clone, Copy)]
pub struct UserExporter<'a> {
    api: &'a dyn HarborApi,
    limits: SyncLimits,
}

impl<'a> UserExporter<'a> {
    pub fn new(api: &'a dyn HarborApi, limits: SyncLimits) -> Self {
        Self {
            api,
            limits: limits.clamped(),
        }
    }

    pub fn into_batches(self, selector: &UserSelector) -> BoxStream<'a, Vec<User>> {
        let source = UserPages {
            api: self.api,
            filter: Arc::new(UserFilter::new(selector)),
        };
        let pages = Paginator::with_page_size(source, self.limits.page_size).into_stream();
        page_batches(pages, "users".to_string(), |_| {})
    }
}

impl Exporter for UserExporter<'_> {
    type Selector = UserSelector;
    type Record = User;

    fn kind(&self) -> ResourceKind {
        ResourceKind::User
    }

    fn batches<'s>(&'s self, selector: &UserSelector) -> BoxStream<'s, Vec<User>> {
        (*self).into_batches(selector)
    }
}
