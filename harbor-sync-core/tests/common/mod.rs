//! Shared helpers for the integration tests
//!
//! [`FakeHarbor`] is an in-memory [`HarborApi`] that pages its fixtures,
//! records every call, tracks how many listings are in flight and can be told
//! to fail for chosen projects or repositories.

#![allow(dead_code)]

use async_trait::async_trait;
use harbor_sync_core::client::{ArtifactQuery, HarborApi, ProjectQuery};
use harbor_sync_core::error::HarborError;
use harbor_sync_core::model::{Artifact, Project, Repository, User};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// One recorded listing call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Projects { page: u32, query: ProjectQuery },
    Users { page: u32 },
    Repositories { project: String, page: u32 },
    Artifacts { project: String, repository: String, page: u32, scan_overview: bool },
}

#[derive(Default)]
pub struct FakeHarbor {
    projects: Vec<Project>,
    users: Vec<User>,
    repositories: BTreeMap<String, Vec<Repository>>,
    artifacts: BTreeMap<(String, String), Vec<Artifact>>,
    failing_projects: BTreeSet<String>,
    failing_repositories: BTreeSet<(String, String)>,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeHarbor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, project: Project) -> Self {
        self.projects.push(project);
        self
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.users.push(user);
        self
    }

    /// Repositories are listed under `project` with Harbor's full names
    pub fn with_repository(mut self, project: &str, repository: Repository) -> Self {
        self.repositories
            .entry(project.to_string())
            .or_default()
            .push(repository);
        self
    }

    pub fn with_artifact(mut self, project: &str, repository: &str, artifact: Artifact) -> Self {
        self.artifacts
            .entry((project.to_string(), repository.to_string()))
            .or_default()
            .push(artifact);
        self
    }

    /// Listing this project's repositories fails
    pub fn failing_project(mut self, project: &str) -> Self {
        self.failing_projects.insert(project.to_string());
        self
    }

    /// Listing this repository's artifacts fails
    pub fn failing_repository(mut self, project: &str, repository: &str) -> Self {
        self.failing_repositories
            .insert((project.to_string(), repository.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of listings observed in flight at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    /// Hold the listing open across a yield so concurrent branches overlap
    async fn in_flight<T>(
        &self,
        result: Result<Vec<T>, HarborError>,
    ) -> Result<Vec<T>, HarborError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn page_of<T: Clone>(records: &[T], page: u32, page_size: usize) -> Vec<T> {
    let start = (page.saturating_sub(1) as usize).saturating_mul(page_size);
    records.iter().skip(start).take(page_size).cloned().collect()
}

fn failure(what: String) -> HarborError {
    HarborError::Status {
        status: 500,
        url: what,
        body: "internal error".to_string(),
    }
}

#[async_trait]
impl HarborApi for FakeHarbor {
    async fn list_projects(
        &self,
        page: u32,
        page_size: usize,
        query: &ProjectQuery,
    ) -> Result<Vec<Project>, HarborError> {
        self.record(Call::Projects {
            page,
            query: query.clone(),
        });
        Ok(page_of(&self.projects, page, page_size))
    }

    async fn list_users(&self, page: u32, page_size: usize) -> Result<Vec<User>, HarborError> {
        self.record(Call::Users { page });
        Ok(page_of(&self.users, page, page_size))
    }

    async fn list_repositories(
        &self,
        project_name: &str,
        page: u32,
        page_size: usize,
    ) -> Result<Vec<Repository>, HarborError> {
        self.record(Call::Repositories {
            project: project_name.to_string(),
            page,
        });
        let result = if self.failing_projects.contains(project_name) {
            Err(failure(format!("projects/{project_name}/repositories")))
        } else {
            let repositories = self
                .repositories
                .get(project_name)
                .map(Vec::as_slice)
                .unwrap_or_default();
            Ok(page_of(repositories, page, page_size))
        };
        self.in_flight(result).await
    }

    async fn list_artifacts(
        &self,
        project_name: &str,
        repository_name: &str,
        page: u32,
        page_size: usize,
        query: &ArtifactQuery,
    ) -> Result<Vec<Artifact>, HarborError> {
        self.record(Call::Artifacts {
            project: project_name.to_string(),
            repository: repository_name.to_string(),
            page,
            scan_overview: query.with_scan_overview,
        });
        let key = (project_name.to_string(), repository_name.to_string());
        let result = if self.failing_repositories.contains(&key) {
            Err(failure(format!(
                "projects/{project_name}/repositories/{repository_name}/artifacts"
            )))
        } else {
            let artifacts = self.artifacts.get(&key).map(Vec::as_slice).unwrap_or_default();
            Ok(page_of(artifacts, page, page_size))
        };
        self.in_flight(result).await
    }
}

pub fn project(name: &str, creation_time: &str, public: bool) -> Project {
    serde_json::from_value(json!({
        "project_id": 1,
        "name": name,
        "creation_time": creation_time,
        "metadata": {"public": if public { "true" } else { "false" }}
    }))
    .unwrap()
}

pub fn user(username: &str, email: &str, admin: bool) -> User {
    serde_json::from_value(json!({
        "username": username,
        "email": email,
        "sysadmin_flag": admin,
        "creation_time": "2024-01-01T00:00:00Z"
    }))
    .unwrap()
}

/// `full_name` is Harbor's `<project>/<repository>` form
pub fn repository(full_name: &str, creation_time: &str, artifacts: u64, pulls: u64) -> Repository {
    serde_json::from_value(json!({
        "name": full_name,
        "creation_time": creation_time,
        "artifact_count": artifacts,
        "pull_count": pulls
    }))
    .unwrap()
}

pub fn artifact(digest: &str, push_time: &str, tags: &[&str]) -> Artifact {
    let tags: Vec<_> = tags.iter().map(|t| json!({"name": t})).collect();
    serde_json::from_value(json!({
        "digest": digest,
        "push_time": push_time,
        "media_type": "application/vnd.oci.image.manifest.v1+json",
        "size": 1024,
        "tags": tags
    }))
    .unwrap()
}

pub fn scanned_artifact(digest: &str, push_time: &str, summary: serde_json::Value) -> Artifact {
    serde_json::from_value(json!({
        "digest": digest,
        "push_time": push_time,
        "scan_overview": {
            "application/vnd.security.vulnerability.report; version=1.1": {"summary": summary}
        }
    }))
    .unwrap()
}
