//! Webhook event interpreter
//!
//! Turns one Harbor webhook delivery into the artifacts it affects:
//!
//! ```text
//! received ─▶ authenticated ─▶ classified ─▶ resolved ─▶ emitted
//! ```
//!
//! Nothing is kept between deliveries. Every failure ends in an empty result
//! and a log entry; the processor itself never returns an error.

mod event;
mod signature;

pub use event::{EventData, EventKind, EventRepository, EventResource, WebhookEvent};
pub use signature::{compute_signature, verify_signature, SIGNATURE_HEADER};

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::client::HarborApi;
use crate::exporter::{collect_artifacts, RepositoryRef};
use crate::filter::ArtifactFilter;
use crate::model::{Artifact, Entity};
use crate::pagination::PAGE_SIZE;

/// Raw webhook delivery: headers plus the exact body bytes that were signed
#[derive(Debug, Clone, Default)]
pub struct WebhookRequest {
    headers: BTreeMap<String, String>,
    body: Vec<u8>,
}

impl WebhookRequest {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Add a header; names are matched case-insensitively
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// What happened to one delivery
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// Signature missing or wrong
    Rejected,

    /// Body is not a usable Harbor event
    Malformed,

    /// Event type the interpreter does not act on
    Ignored { event_type: String },

    /// Deletions carry no entities
    Deleted(EventKind),

    /// Artifacts matched by digest, stamped with their owners
    Resolved {
        kind: EventKind,
        artifacts: Vec<Artifact>,
    },

    /// Re-fetching the repository failed
    Failed(EventKind),
}

impl WebhookOutcome {
    pub fn into_entities(self) -> Vec<Entity> {
        match self {
            WebhookOutcome::Resolved { artifacts, .. } => {
                artifacts.into_iter().map(Entity::from).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Stateless interpreter bound to one Harbor instance
#[derive(Clone)]
pub struct WebhookProcessor {
    api: Arc<dyn HarborApi>,
    secret: Option<String>,
    page_size: usize,
}

impl WebhookProcessor {
    /// An empty secret disables verification
    pub fn new(api: Arc<dyn HarborApi>, secret: Option<String>) -> Self {
        Self {
            api,
            secret: secret.filter(|s| !s.is_empty()),
            page_size: PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub async fn process(&self, request: &WebhookRequest) -> WebhookOutcome {
        if !self.authenticate(request) {
            return WebhookOutcome::Rejected;
        }

        let event: WebhookEvent = match serde_json::from_slice(request.body()) {
            Ok(event) => event,
            Err(e) => {
                warn!("Malformed webhook payload: {}", e);
                return WebhookOutcome::Malformed;
            }
        };

        let Some(kind) = event.kind() else {
            debug!("Ignoring webhook event type '{}'", event.event_type);
            return WebhookOutcome::Ignored {
                event_type: event.event_type,
            };
        };

        if kind.is_delete() {
            info!("Received {} event; nothing to resolve", kind);
            return WebhookOutcome::Deleted(kind);
        }

        self.resolve(kind, &event).await
    }

    fn authenticate(&self, request: &WebhookRequest) -> bool {
        let Some(secret) = &self.secret else {
            return true;
        };
        match request.header(SIGNATURE_HEADER) {
            Some(value) if verify_signature(secret, request.body(), value) => true,
            Some(_) => {
                warn!("Webhook signature mismatch; dropping event");
                false
            }
            None => {
                warn!("Webhook is missing the {} header; dropping event", SIGNATURE_HEADER);
                false
            }
        }
    }

    async fn resolve(&self, kind: EventKind, event: &WebhookEvent) -> WebhookOutcome {
        let Some((project_name, repository_name)) = event.target() else {
            warn!("{} event does not name a project and repository", kind);
            return WebhookOutcome::Malformed;
        };

        let digests = event.digests();
        if digests.is_empty() {
            info!("{} event for {}/{} lists no digests", kind, project_name, repository_name);
            return WebhookOutcome::Resolved {
                kind,
                artifacts: Vec::new(),
            };
        }

        let target = RepositoryRef {
            project_name: project_name.to_string(),
            repository_name: repository_name.to_string(),
        };
        let filter = Arc::new(ArtifactFilter::accept_all(
            kind == EventKind::ScanCompleted,
        ));

        let listed =
            match collect_artifacts(self.api.as_ref(), &target, filter, self.page_size).await {
                Ok(listed) => listed,
                Err(e) => {
                    error!("Failed to resolve {} event for {}: {}", kind, target, e);
                    return WebhookOutcome::Failed(kind);
                }
            };

        let mut by_digest: BTreeMap<&str, &Artifact> = BTreeMap::new();
        for artifact in &listed {
            by_digest.entry(artifact.digest.as_str()).or_insert(artifact);
        }

        let artifacts: Vec<Artifact> = digests
            .iter()
            .filter_map(|digest| {
                let found = by_digest.get(digest).map(|a| (*a).clone());
                if found.is_none() {
                    debug!("Digest {} no longer present in {}", digest, target);
                }
                found
            })
            .collect();

        info!(
            "Resolved {} of {} artifacts for {} event in {}",
            artifacts.len(),
            digests.len(),
            kind,
            target
        );
        WebhookOutcome::Resolved { kind, artifacts }
    }
}
