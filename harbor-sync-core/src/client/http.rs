//! reqwest-backed Harbor client
//!
//! Plain authenticated GETs against `/api/v2.0/`. No retries; a non-success
//! status becomes [`HarborError::Status`].

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ArtifactQuery, HarborApi, ProjectQuery};
use crate::error::HarborError;
use crate::model::{Artifact, Project, Repository, User};

/// Path prefix of the Harbor v2 REST API
pub const API_PREFIX: &str = "api/v2.0";

/// Request timeout used when the configuration does not set one
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Harbor REST client using HTTP basic authentication
#[derive(Clone)]
pub struct HarborClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl std::fmt::Debug for HarborClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarborClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl HarborClient {
    /// Create a client with the default request timeout
    pub fn new(base_url: &str, username: &str, password: &str) -> Result<Self, HarborError> {
        Self::with_timeout(
            base_url,
            username,
            password,
            Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        )
    }

    pub fn with_timeout(
        base_url: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, HarborError> {
        let base_url = base_url.trim_end_matches('/');
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(HarborError::InvalidBaseUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("harbor-sync/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|source| HarborError::Request {
                url: base_url.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL of an API endpoint
    fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            API_PREFIX,
            endpoint.trim_start_matches('/')
        )
    }

    fn request(&self, endpoint: &str, params: &[(&str, String)]) -> reqwest::RequestBuilder {
        self.client
            .get(self.endpoint_url(endpoint))
            .basic_auth(&self.username, Some(&self.password))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .query(params)
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, HarborError> {
        let url = self.endpoint_url(endpoint);
        debug!("GET {} {:?}", url, params);

        let response = self
            .request(endpoint, params)
            .send()
            .await
            .map_err(|source| HarborError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Harbor API error: {} - {}", status, body);
            return Err(HarborError::Status {
                status: status.as_u16(),
                url,
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| HarborError::Request {
                url: url.clone(),
                source,
            })?;

        serde_json::from_str(&body).map_err(|source| HarborError::Decode { url, source })
    }
}

fn page_params(page: u32, page_size: usize) -> Vec<(&'static str, String)> {
    vec![("page", page.to_string()), ("page_size", page_size.to_string())]
}

fn project_params(
    page: u32,
    page_size: usize,
    query: &ProjectQuery,
) -> Vec<(&'static str, String)> {
    let mut params = page_params(page, page_size);
    if let Some(public) = query.public {
        params.push(("public", public.to_string()));
    }
    if let Some(owner) = &query.owner {
        params.push(("owner", owner.clone()));
    }
    params
}

fn artifact_params(
    page: u32,
    page_size: usize,
    query: &ArtifactQuery,
) -> Vec<(&'static str, String)> {
    let mut params = page_params(page, page_size);
    if query.with_scan_overview {
        params.push(("with_scan_overview", "true".to_string()));
    }
    params
}

/// Nested repository names travel as a single path segment
fn encode_repository_name(repository_name: &str) -> String {
    repository_name.replace('/', "%2F")
}

fn artifacts_endpoint(project_name: &str, repository_name: &str) -> String {
    format!(
        "projects/{}/repositories/{}/artifacts",
        project_name,
        encode_repository_name(repository_name)
    )
}

#[async_trait]
impl HarborApi for HarborClient {
    async fn list_projects(
        &self,
        page: u32,
        page_size: usize,
        query: &ProjectQuery,
    ) -> Result<Vec<Project>, HarborError> {
        self.get_list("projects", &project_params(page, page_size, query))
            .await
    }

    async fn list_users(&self, page: u32, page_size: usize) -> Result<Vec<User>, HarborError> {
        self.get_list("users", &page_params(page, page_size)).await
    }

    async fn list_repositories(
        &self,
        project_name: &str,
        page: u32,
        page_size: usize,
    ) -> Result<Vec<Repository>, HarborError> {
        self.get_list(
            &format!("projects/{project_name}/repositories"),
            &page_params(page, page_size),
        )
        .await
    }

    async fn list_artifacts(
        &self,
        project_name: &str,
        repository_name: &str,
        page: u32,
        page_size: usize,
        query: &ArtifactQuery,
    ) -> Result<Vec<Artifact>, HarborError> {
        self.get_list(
            &artifacts_endpoint(project_name, repository_name),
            &artifact_params(page, page_size, query),
        )
        .await
    }
}
