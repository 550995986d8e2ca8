//! Paginated fetching
//!
//! A [`Paginator`] walks one endpoint page by page, strictly sequentially,
//! starting at page 1. Every raw page is filtered before it is handed out.
//! The walk ends after the first raw page shorter than the page size, or
//! after an empty raw page (which is not handed out). Termination looks at the
//! raw length only, so a page whose records are all filtered out does not
//! stop the walk early.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tracing::debug;

use crate::client::HarborApi;
use crate::error::HarborError;
use crate::filter::{ArtifactFilter, ProjectFilter, RecordFilter, RepositoryFilter, UserFilter};
use crate::model::{Artifact, Project, Repository, User};

/// Harbor page size used for every listing
pub const PAGE_SIZE: usize = 100;

/// One endpoint plus its fixed path parameters and record filter
#[async_trait]
pub trait PageSource: Send + Sync {
    type Record: Send;

    /// Fetch one raw page
    async fn fetch(&self, page: u32, page_size: usize) -> Result<Vec<Self::Record>, HarborError>;

    /// Record predicate applied to each raw page
    fn keep(&self, record: &Self::Record) -> bool;

    /// Human-readable endpoint label for logs
    fn describe(&self) -> String;
}

/// A filtered page together with its raw size
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub index: u32,
    pub raw_len: usize,
    pub records: Vec<T>,
}

/// Lazy cursor over the pages of one [`PageSource`]
pub struct Paginator<S> {
    source: S,
    page_size: usize,
    next_page: Option<u32>,
}

impl<S: PageSource> Paginator<S> {
    pub fn new(source: S) -> Self {
        Self::with_page_size(source, PAGE_SIZE)
    }

    pub fn with_page_size(source: S, page_size: usize) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
            next_page: Some(1),
        }
    }

    /// Fetch and filter the next page; `None` once the listing is exhausted.
    ///
    /// An error ends the walk: the error is returned once and subsequent calls
    /// return `None`.
    pub async fn next_page(&mut self) -> Option<Result<Page<S::Record>, HarborError>> {
        let index = self.next_page?;

        let raw = match self.source.fetch(index, self.page_size).await {
            Ok(raw) => raw,
            Err(e) => {
                self.next_page = None;
                return Some(Err(e));
            }
        };

        let raw_len = raw.len();
        debug!(
            "Fetched page {} of {}: {} raw records",
            index,
            self.source.describe(),
            raw_len
        );

        if raw_len == 0 {
            self.next_page = None;
            return None;
        }

        self.next_page = if raw_len < self.page_size {
            None
        } else {
            Some(index + 1)
        };

        let records = raw.into_iter().filter(|r| self.source.keep(r)).collect();
        Some(Ok(Page {
            index,
            raw_len,
            records,
        }))
    }

    /// Drive the cursor to exhaustion, concatenating every filtered page
    pub async fn collect_all(mut self) -> Result<Vec<S::Record>, HarborError> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await {
            all.extend(page?.records);
        }
        Ok(all)
    }

    /// Turn the cursor into a stream of pages
    pub fn into_stream<'a>(self) -> BoxStream<'a, Result<Page<S::Record>, HarborError>>
    where
        S: 'a,
    {
        stream::unfold(self, |mut paginator| async move {
            paginator
                .next_page()
                .await
                .map(|page| (page, paginator))
        })
        .boxed()
    }
}

/// All projects visible to the client
pub struct ProjectPages<'a> {
    pub api: &'a dyn HarborApi,
    pub filter: Arc<ProjectFilter>,
}

#[async_trait]
impl PageSource for ProjectPages<'_> {
    type Record = Project;

    async fn fetch(&self, page: u32, page_size: usize) -> Result<Vec<Project>, HarborError> {
        self.api
            .list_projects(page, page_size, self.filter.query())
            .await
    }

    fn keep(&self, record: &Project) -> bool {
        self.filter.matches(record)
    }

    fn describe(&self) -> String {
        "projects".to_string()
    }
}

/// All users
pub struct UserPages<'a> {
    pub api: &'a dyn HarborApi,
    pub filter: Arc<UserFilter>,
}

#[async_trait]
impl PageSource for UserPages<'_> {
    type Record = User;

    async fn fetch(&self, page: u32, page_size: usize) -> Result<Vec<User>, HarborError> {
        self.api.list_users(page, page_size).await
    }

    fn keep(&self, record: &User) -> bool {
        self.filter.matches(record)
    }

    fn describe(&self) -> String {
        "users".to_string()
    }
}

/// Repositories of one project
pub struct RepositoryPages<'a> {
    pub api: &'a dyn HarborApi,
    pub project_name: String,
    pub filter: Arc<RepositoryFilter>,
}

#[async_trait]
impl PageSource for RepositoryPages<'_> {
    type Record = Repository;

    async fn fetch(&self, page: u32, page_size: usize) -> Result<Vec<Repository>, HarborError> {
        self.api
            .list_repositories(&self.project_name, page, page_size)
            .await
    }

    fn keep(&self, record: &Repository) -> bool {
        self.filter.matches(record)
    }

    fn describe(&self) -> String {
        format!("repositories of {}", self.project_name)
    }
}

/// Artifacts of one repository
pub struct ArtifactPages<'a> {
    pub api: &'a dyn HarborApi,
    pub project_name: String,
    pub repository_name: String,
    pub filter: Arc<ArtifactFilter>,
}

#[async_trait]
impl PageSource for ArtifactPages<'_> {
    type Record = Artifact;

    async fn fetch(&self, page: u32, page_size: usize) -> Result<Vec<Artifact>, HarborError> {
        self.api
            .list_artifacts(
                &self.project_name,
                &self.repository_name,
                page,
                page_size,
                self.filter.query(),
            )
            .await
    }

    fn keep(&self, record: &Artifact) -> bool {
        self.filter.matches(record)
    }

    fn describe(&self) -> String {
        format!("artifacts of {}/{}", self.project_name, self.repository_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Serves `total` sequential integers, `page_size` at a time
    struct Numbers {
        total: usize,
        calls: AtomicU32,
        keep_even_only: bool,
        fail_on_page: Option<u32>,
    }

    impl Numbers {
        fn new(total: usize) -> Self {
            Self {
                total,
                calls: AtomicU32::new(0),
                keep_even_only: false,
                fail_on_page: None,
            }
        }
    }

    #[async_trait]
    impl PageSource for Numbers {
        type Record = usize;

        async fn fetch(&self, page: u32, page_size: usize) -> Result<Vec<usize>, HarborError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_page == Some(page) {
                return Err(HarborError::Other("boom".to_string()));
            }
            let start = (page as usize - 1) * page_size;
            let end = (start + page_size).min(self.total);
            Ok((start.min(end)..end).collect())
        }

        fn keep(&self, record: &usize) -> bool {
            !self.keep_even_only || record % 2 == 0
        }

        fn describe(&self) -> String {
            "numbers".to_string()
        }
    }

    async fn walk(source: Numbers, page_size: usize) -> (Vec<Page<usize>>, u32) {
        let mut paginator = Paginator::with_page_size(source, page_size);
        let mut pages = Vec::new();
        while let Some(page) = paginator.next_page().await {
            pages.push(page.unwrap());
        }
        let calls = paginator.source.calls.load(Ordering::SeqCst);
        (pages, calls)
    }

    #[tokio::test]
    async fn test_short_last_page_stops_walk() {
        let (pages, calls) = walk(Numbers::new(25), 10).await;
        assert_eq!(pages.len(), 3);
        assert_eq!(calls, 3);
        assert_eq!(pages[2].raw_len, 5);
        assert_eq!(pages.iter().map(|p| p.index).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_exact_multiple_needs_one_empty_fetch() {
        let (pages, calls) = walk(Numbers::new(20), 10).await;
        assert_eq!(pages.len(), 2);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_empty_listing() {
        let (pages, calls) = walk(Numbers::new(0), 10).await;
        assert!(pages.is_empty());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_fully_filtered_page_does_not_stop_walk() {
        let mut source = Numbers::new(12);
        source.keep_even_only = true;
        // Page size 1: every odd page filters down to nothing
        let (pages, calls) = walk(source, 1).await;
        assert_eq!(calls, 13);
        assert_eq!(pages.len(), 12);
        assert!(pages[1].records.is_empty());
        assert_eq!(pages[2].records, vec![2]);
    }

    #[tokio::test]
    async fn test_error_ends_walk() {
        let mut source = Numbers::new(50);
        source.fail_on_page = Some(2);
        let mut paginator = Paginator::with_page_size(source, 10);
        assert!(paginator.next_page().await.unwrap().is_ok());
        assert!(paginator.next_page().await.unwrap().is_err());
        assert!(paginator.next_page().await.is_none());
    }

    #[tokio::test]
    async fn test_collect_all_concatenates_filtered_pages() {
        let mut source = Numbers::new(7);
        source.keep_even_only = true;
        let all = Paginator::with_page_size(source, 3).collect_all().await.unwrap();
        assert_eq!(all, vec![0, 2, 4, 6]);
    }

    #[tokio::test]
    async fn test_stream_yields_same_pages() {
        let pages: Vec<_> = Paginator::with_page_size(Numbers::new(5), 2)
            .into_stream()
            .collect()
            .await;
        assert_eq!(pages.len(), 3);
        assert!(pages.iter().all(Result::is_ok));
    }

    #[test]
    fn test_page_count_property() {
        // ceil(N / P) non-empty raw pages for a range of sizes
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        for page_size in [1usize, 3, 10] {
            for total in [0usize, 1, 9, 10, 11, 30] {
                let (pages, calls) = runtime.block_on(walk(Numbers::new(total), page_size));
                let expected = total.div_ceil(page_size);
                assert_eq!(pages.len(), expected, "N={total} P={page_size}");
                let extra = if total % page_size == 0 { 1 } else { 0 };
                assert_eq!(calls as usize, expected + extra, "N={total} P={page_size}");
            }
        }
    }
}
