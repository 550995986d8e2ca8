//! Integration configuration
//!
//! Loaded from a YAML file, then overridden from the environment:
//!
//! ```yaml
//! harborUrl: https://harbor.example.com
//! harborUsername: robot$sync
//! harborPassword: secret
//! webhookSecret: shh
//! limits:
//!   artifactConcurrency: 2
//! resources:
//!   - kind: harbor-artifact
//!     selector: { minSeverity: high }
//! ```
//!
//! | Variable                | Overrides        |
//! |-------------------------|------------------|
//! | `HARBOR_URL`            | `harborUrl`      |
//! | `HARBOR_USERNAME`       | `harborUsername` |
//! | `HARBOR_PASSWORD`       | `harborPassword` |
//! | `HARBOR_WEBHOOK_SECRET` | `webhookSecret`  |

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::client::{HarborClient, DEFAULT_TIMEOUT_SECONDS};
use crate::exporter::{CatalogSync, ResourceKind, ResourceSelector, SyncLimits};
use crate::webhook::WebhookProcessor;

pub const ENV_URL: &str = "HARBOR_URL";
pub const ENV_USERNAME: &str = "HARBOR_USERNAME";
pub const ENV_PASSWORD: &str = "HARBOR_PASSWORD";
pub const ENV_WEBHOOK_SECRET: &str = "HARBOR_WEBHOOK_SECRET";

/// One `resources` entry; the selector is decoded lazily per kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub kind: String,

    #[serde(default)]
    pub selector: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarborConfig {
    #[serde(default, alias = "harbor_url")]
    pub harbor_url: Option<String>,

    #[serde(default, alias = "harbor_username")]
    pub harbor_username: String,

    #[serde(default, alias = "harbor_password")]
    pub harbor_password: String,

    /// Shared secret for webhook signatures; unset disables verification
    #[serde(default, alias = "webhook_secret")]
    pub webhook_secret: Option<String>,

    #[serde(default = "default_timeout", alias = "timeout_seconds")]
    pub timeout_seconds: u64,

    #[serde(default)]
    pub limits: SyncLimits,

    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl Default for HarborConfig {
    fn default() -> Self {
        Self {
            harbor_url: None,
            harbor_username: String::new(),
            harbor_password: String::new(),
            webhook_secret: None,
            timeout_seconds: default_timeout(),
            limits: SyncLimits::default(),
            resources: Vec::new(),
        }
    }
}

impl HarborConfig {
    /// Read a YAML file and apply environment overrides
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config = Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.apply_env_overrides();
        debug!("Loaded Harbor configuration from {}", path.display());
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self =
            serde_yaml_ng::from_str(content).context("Invalid Harbor configuration")?;
        for resource in &config.resources {
            if ResourceKind::parse(&resource.kind).is_none() {
                warn!("Ignoring resource with unknown kind '{}'", resource.kind);
            }
        }
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = env_value(ENV_URL) {
            self.harbor_url = Some(url);
        }
        if let Some(username) = env_value(ENV_USERNAME) {
            self.harbor_username = username;
        }
        if let Some(password) = env_value(ENV_PASSWORD) {
            self.harbor_password = password;
        }
        if let Some(secret) = env_value(ENV_WEBHOOK_SECRET) {
            self.webhook_secret = Some(secret);
        }
    }

    /// First configured selector for `kind`, or one with nothing declared
    pub fn selector(&self, kind: ResourceKind) -> Result<ResourceSelector> {
        let Some(resource) = self
            .resources
            .iter()
            .find(|r| ResourceKind::parse(&r.kind) == Some(kind))
        else {
            return Ok(ResourceSelector::default_for(kind));
        };

        // An absent `selector:` key deserializes as null
        let value = if resource.selector.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            resource.selector.clone()
        };

        let context = || format!("Invalid selector for {kind}");
        let selector = match kind {
            ResourceKind::Project => {
                ResourceSelector::Project(serde_json::from_value(value).with_context(context)?)
            }
            ResourceKind::User => {
                ResourceSelector::User(serde_json::from_value(value).with_context(context)?)
            }
            ResourceKind::Repository => {
                ResourceSelector::Repository(serde_json::from_value(value).with_context(context)?)
            }
            ResourceKind::Artifact => {
                ResourceSelector::Artifact(serde_json::from_value(value).with_context(context)?)
            }
        };
        Ok(selector)
    }

    pub fn sync_limits(&self) -> SyncLimits {
        self.limits.clamped()
    }

    pub fn client(&self) -> Result<HarborClient> {
        let url = self
            .harbor_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .with_context(|| format!("Harbor URL is not configured (set harborUrl or {ENV_URL})"))?;

        HarborClient::with_timeout(
            url,
            &self.harbor_username,
            &self.harbor_password,
            Duration::from_secs(self.timeout_seconds.max(1)),
        )
        .context("Failed to create Harbor client")
    }

    pub fn catalog_sync(&self) -> Result<CatalogSync> {
        Ok(CatalogSync::with_limits(
            Arc::new(self.client()?),
            self.sync_limits(),
        ))
    }

    pub fn webhook_processor(&self) -> Result<WebhookProcessor> {
        Ok(
            WebhookProcessor::new(Arc::new(self.client()?), self.webhook_secret.clone())
                .with_page_size(self.sync_limits().page_size),
        )
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}
