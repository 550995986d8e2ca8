//! Harbor catalog synchronization
//!
//! Streams Harbor projects, users, repositories and artifacts in sorted
//! batches for an external catalog, and turns Harbor webhook deliveries into
//! incremental artifact updates.

pub mod client;
pub mod config;
pub mod error;
pub mod exporter;
pub mod filter;
pub mod model;
pub mod pagination;
pub mod webhook;

pub use client::{HarborApi, HarborClient};
pub use config::HarborConfig;
pub use error::HarborError;
pub use exporter::{CatalogSync, ResourceKind, ResourceSelector, SyncLimits};
pub use model::Entity;
pub use webhook::{WebhookOutcome, WebhookProcessor, WebhookRequest};
