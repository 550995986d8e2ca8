//! Harbor API access
//!
//! The engine only sees the [`HarborApi`] trait: one listing call per resource
//! kind, each returning a single raw page. [`HarborClient`] implements it over
//! the Harbor v2.0 REST API; tests substitute in-memory fakes.

mod http;

pub use http::{HarborClient, API_PREFIX, DEFAULT_TIMEOUT_SECONDS};

use async_trait::async_trait;

use crate::error::HarborError;
use crate::model::{Artifact, Project, Repository, User};

/// Transport-level parameters for the project listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectQuery {
    /// Sent as `public=<bool>` when set
    pub public: Option<bool>,

    /// Sent as `owner=<name>` when set
    pub owner: Option<String>,
}

/// Transport-level parameters for the artifact listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArtifactQuery {
    /// Ask Harbor to embed `scan_overview` in every artifact
    pub with_scan_overview: bool,
}

/// One call per resource kind; each returns the raw records of one page.
///
/// An empty page signals a possible end of the listing. Implementations raise
/// on any non-success response.
#[async_trait]
pub trait HarborApi: Send + Sync {
    async fn list_projects(
        &self,
        page: u32,
        page_size: usize,
        query: &ProjectQuery,
    ) -> Result<Vec<Project>, HarborError>;

    async fn list_users(&self, page: u32, page_size: usize) -> Result<Vec<User>, HarborError>;

    async fn list_repositories(
        &self,
        project_name: &str,
        page: u32,
        page_size: usize,
    ) -> Result<Vec<Repository>, HarborError>;

    async fn list_artifacts(
        &self,
        project_name: &str,
        repository_name: &str,
        page: u32,
        page_size: usize,
        query: &ArtifactQuery,
    ) -> Result<Vec<Artifact>, HarborError>;
}
