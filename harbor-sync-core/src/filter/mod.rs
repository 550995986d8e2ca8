//! Filter pipeline
//!
//! Selectors are compiled once per run into filters. A compiled filter splits
//! into a transport part (query parameters and hints handed to [`HarborApi`])
//! and a record predicate evaluated on every fetched record. All declared
//! predicates of a kind must pass.
//!
//! Malformed input never fails a run: an invalid regex or `created_since`
//! value is logged when compiled and then excludes every record it is
//! evaluated against.
//!
//! [`HarborApi`]: crate::client::HarborApi

mod selector;
mod severity;

pub use selector::{
    ArtifactSelector, ProjectSelector, RepositorySelector, UserSelector, Visibility,
};
pub use severity::{meets_threshold, Severity};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use tracing::warn;

use crate::client::{ArtifactQuery, ProjectQuery};
use crate::model::{Artifact, Project, Repository, User};
use selector::{declared, declared_min};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Predicate over one fetched record
pub trait RecordFilter<T>: Send + Sync {
    fn matches(&self, record: &T) -> bool;

    /// Keep only matching records, preserving their order
    fn apply(&self, records: Vec<T>) -> Vec<T> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

/// A regex evaluated with match-at-start semantics
#[derive(Debug, Clone)]
enum StartPattern {
    Valid(Regex),
    Invalid,
}

impl StartPattern {
    fn compile(source: &str, field: &str) -> Self {
        match Regex::new(&format!("^(?:{source})")) {
            Ok(regex) => StartPattern::Valid(regex),
            Err(e) => {
                warn!("Invalid {} pattern '{}': {}; no record will match", field, source, e);
                StartPattern::Invalid
            }
        }
    }

    fn matches_start(&self, text: &str) -> bool {
        match self {
            StartPattern::Valid(regex) => regex.is_match(text),
            StartPattern::Invalid => false,
        }
    }
}

/// Parse an ISO-8601 timestamp as UTC.
///
/// A trailing `Z` is rewritten to `+00:00` first. Timestamps without an
/// offset (and bare dates) are read as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let normalized = match value.strip_suffix('Z').or_else(|| value.strip_suffix('z')) {
        Some(stripped) => format!("{stripped}+00:00"),
        None => value.to_string(),
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Compiled project filter
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    query: ProjectQuery,
    name_prefix: Option<String>,
    name_regex: Option<StartPattern>,
}

impl ProjectFilter {
    pub fn new(selector: &ProjectSelector) -> Self {
        Self {
            query: ProjectQuery {
                public: selector.visibility.map(|v| v == Visibility::Public),
                owner: declared(&selector.owner).map(str::to_string),
            },
            name_prefix: declared(&selector.name_prefix).map(str::to_string),
            name_regex: declared(&selector.name_regex)
                .map(|source| StartPattern::compile(source, "name_regex")),
        }
    }

    pub fn query(&self) -> &ProjectQuery {
        &self.query
    }
}

impl RecordFilter<Project> for ProjectFilter {
    fn matches(&self, project: &Project) -> bool {
        if let Some(prefix) = &self.name_prefix {
            if !project.name.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(pattern) = &self.name_regex {
            if !pattern.matches_start(&project.name) {
                return false;
            }
        }
        true
    }
}

/// Compiled user filter
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    admin_only: bool,
    email_suffix: Option<String>,
}

impl UserFilter {
    pub fn new(selector: &UserSelector) -> Self {
        Self {
            admin_only: selector.admin_only,
            email_suffix: declared(&selector.email_domain).map(|domain| format!("@{domain}")),
        }
    }
}

impl RecordFilter<User> for UserFilter {
    fn matches(&self, user: &User) -> bool {
        if self.admin_only && !user.sysadmin_flag {
            return false;
        }
        if let Some(suffix) = &self.email_suffix {
            let email = user.email.as_deref().unwrap_or("");
            if !email.ends_with(suffix.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Compiled repository filter
#[derive(Debug, Clone, Default)]
pub struct RepositoryFilter {
    name_contains: Option<String>,
    name_starts_with: Option<String>,
    min_artifact_count: Option<u64>,
    min_pull_count: Option<u64>,
}

impl RepositoryFilter {
    pub fn new(selector: &RepositorySelector) -> Self {
        Self {
            name_contains: declared(&selector.name_contains).map(str::to_string),
            name_starts_with: declared(&selector.name_starts_with).map(str::to_string),
            min_artifact_count: declared_min(selector.min_artifact_count),
            min_pull_count: declared_min(selector.min_pull_count),
        }
    }

    /// A filter that keeps every repository
    pub fn accept_all() -> Self {
        Self::default()
    }
}

impl RecordFilter<Repository> for RepositoryFilter {
    fn matches(&self, repository: &Repository) -> bool {
        if let Some(needle) = &self.name_contains {
            if !repository.name.contains(needle.as_str()) {
                return false;
            }
        }
        // Prefix applies to the short name, substring to the full name.
        if let Some(prefix) = &self.name_starts_with {
            if !repository.short_name().starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(min) = self.min_artifact_count {
            if repository.artifact_count.unwrap_or(0) < min {
                return false;
            }
        }
        if let Some(min) = self.min_pull_count {
            if repository.pull_count.unwrap_or(0) < min {
                return false;
            }
        }
        true
    }
}

/// `created_since` threshold after compilation
#[derive(Debug, Clone, Copy)]
enum Since {
    At(DateTime<Utc>),
    Unparseable,
}

/// Compiled artifact filter
#[derive(Debug, Clone, Default)]
pub struct ArtifactFilter {
    query: ArtifactQuery,
    tag_pattern: Option<StartPattern>,
    created_since: Option<Since>,
    media_type: Option<String>,
    max_size_bytes: Option<u64>,
    with_scan_results: bool,
    min_severity: Option<Severity>,
}

impl ArtifactFilter {
    pub fn new(selector: &ArtifactSelector) -> Self {
        let created_since = declared(&selector.created_since).map(|raw| {
            parse_timestamp(raw).map_or_else(
                || {
                    warn!("Unparseable created_since '{}'; no artifact will match", raw);
                    Since::Unparseable
                },
                Since::At,
            )
        });

        Self {
            query: ArtifactQuery {
                with_scan_overview: selector.needs_scan_overview(),
            },
            tag_pattern: declared(&selector.tag_pattern)
                .map(|source| StartPattern::compile(source, "tag_pattern")),
            created_since,
            media_type: declared(&selector.media_type).map(str::to_string),
            max_size_bytes: declared_min(selector.max_size_mb)
                .map(|mb| mb.saturating_mul(BYTES_PER_MB)),
            with_scan_results: selector.with_scan_results,
            min_severity: selector.min_severity,
        }
    }

    /// A filter that keeps every artifact, optionally asking for scan data
    pub fn accept_all(with_scan_overview: bool) -> Self {
        Self {
            query: ArtifactQuery { with_scan_overview },
            ..Self::default()
        }
    }

    pub fn query(&self) -> &ArtifactQuery {
        &self.query
    }

    fn pushed_since(&self, artifact: &Artifact) -> bool {
        match self.created_since {
            None => true,
            Some(Since::Unparseable) => false,
            Some(Since::At(threshold)) => artifact
                .push_time
                .as_deref()
                .and_then(parse_timestamp)
                .is_some_and(|pushed| pushed >= threshold),
        }
    }
}

impl RecordFilter<Artifact> for ArtifactFilter {
    fn matches(&self, artifact: &Artifact) -> bool {
        if !self.pushed_since(artifact) {
            return false;
        }
        if let Some(media_type) = &self.media_type {
            if artifact.media_type.as_deref() != Some(media_type.as_str()) {
                return false;
            }
        }
        if let Some(max_bytes) = self.max_size_bytes {
            if artifact.size.unwrap_or(0) > max_bytes {
                return false;
            }
        }
        if let Some(pattern) = &self.tag_pattern {
            if !artifact.tag_names().any(|tag| pattern.matches_start(tag)) {
                return false;
            }
        }
        if self.with_scan_results && !artifact.has_scan_overview() {
            return false;
        }
        if let Some(threshold) = self.min_severity {
            if !meets_threshold(artifact.scan_overview.as_ref(), threshold) {
                return false;
            }
        }
        true
    }
}
