//! Webhook deliveries resolved against the in-memory Harbor

mod common;

use common::{artifact, init_test_logging, scanned_artifact, Call, FakeHarbor};
use harbor_sync_core::model::Entity;
use harbor_sync_core::webhook::{
    compute_signature, EventKind, WebhookOutcome, WebhookProcessor, WebhookRequest,
    SIGNATURE_HEADER,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

const DAY_1: &str = "2024-01-01T00:00:00Z";
const DAY_2: &str = "2024-01-02T00:00:00Z";
const DAY_3: &str = "2024-01-03T00:00:00Z";

fn harbor() -> Arc<FakeHarbor> {
    Arc::new(
        FakeHarbor::new()
            .with_artifact("library", "nginx", artifact("sha256:old", DAY_1, &["1.24"]))
            .with_artifact("library", "nginx", artifact("sha256:new", DAY_2, &["1.25"]))
            .with_artifact(
                "library",
                "nginx",
                scanned_artifact("sha256:scanned", DAY_3, json!({"critical": 2})),
            ),
    )
}

fn event(event_type: &str, digests: &[&str]) -> Vec<u8> {
    let resources: Vec<_> = digests
        .iter()
        .map(|d| {
            json!({
                "digest": d,
                "tag": "latest",
                "resource_url": format!("harbor.example.com/library/nginx@{d}")
            })
        })
        .collect();
    serde_json::to_vec(&json!({
        "type": event_type,
        "occur_at": 1704067200,
        "operator": "admin",
        "event_data": {
            "resources": resources,
            "repository": {
                "name": "nginx",
                "namespace": "library",
                "repo_full_name": "library/nginx"
            }
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn test_signed_push_resolves_artifact() {
    init_test_logging();
    let fake = harbor();
    let processor = WebhookProcessor::new(fake.clone(), Some("topsecret".to_string()));
    let body = event("PUSH_ARTIFACT", &["sha256:new"]);
    let request = WebhookRequest::new(body.clone()).with_header(
        "X-Harbor-Signature",
        format!("sha256={}", compute_signature("topsecret", &body)),
    );

    let entities = processor.process(&request).await.into_entities();

    assert_eq!(entities.len(), 1);
    let Entity::Artifact(found) = &entities[0] else {
        panic!("expected an artifact");
    };
    assert_eq!(found.digest, "sha256:new");
    assert_eq!(found.project_name, "library");
    assert_eq!(found.repository_name, "nginx");
    assert_eq!(
        fake.calls(),
        vec![Call::Artifacts {
            project: "library".to_string(),
            repository: "nginx".to_string(),
            page: 1,
            scan_overview: false,
        }]
    );
}

#[tokio::test]
async fn test_tampered_body_rejected_without_fetching() {
    init_test_logging();
    let fake = harbor();
    let processor = WebhookProcessor::new(fake.clone(), Some("topsecret".to_string()));
    let body = event("PUSH_ARTIFACT", &["sha256:new"]);
    let signature = compute_signature("topsecret", &body);
    let tampered = event("PUSH_ARTIFACT", &["sha256:old"]);

    let request = WebhookRequest::new(tampered).with_header(SIGNATURE_HEADER, signature);
    let outcome = processor.process(&request).await;

    assert_eq!(outcome, WebhookOutcome::Rejected);
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn test_scan_completed_requests_overview() {
    init_test_logging();
    let fake = harbor();
    let processor = WebhookProcessor::new(fake.clone(), None);

    let outcome = processor
        .process(&WebhookRequest::new(event("SCANNING_COMPLETED", &["sha256:scanned"])))
        .await;

    let WebhookOutcome::Resolved { kind, artifacts } = outcome else {
        panic!("expected a resolved outcome");
    };
    assert_eq!(kind, EventKind::ScanCompleted);
    assert_eq!(artifacts.len(), 1);
    assert!(artifacts[0].has_scan_overview());
    assert!(matches!(
        fake.calls()[0],
        Call::Artifacts { scan_overview: true, .. }
    ));
}

#[tokio::test]
async fn test_multiple_and_missing_digests() {
    init_test_logging();
    let processor = WebhookProcessor::new(harbor(), None);

    let entities = processor
        .process(&WebhookRequest::new(event(
            "PUSH_ARTIFACT",
            &["sha256:old", "sha256:gone", "sha256:new", "sha256:old"],
        )))
        .await
        .into_entities();

    let digests: Vec<_> = entities
        .iter()
        .map(|e| match e {
            Entity::Artifact(a) => a.digest.as_str(),
            _ => panic!("expected artifacts only"),
        })
        .collect();
    assert_eq!(digests, vec!["sha256:old", "sha256:new"]);
}

#[tokio::test]
async fn test_deletes_never_fetch() {
    init_test_logging();
    let fake = harbor();
    let processor = WebhookProcessor::new(fake.clone(), None);

    for event_type in ["DELETE_ARTIFACT", "DELETE_REPOSITORY", "DELETE_PROJECT"] {
        let outcome = processor
            .process(&WebhookRequest::new(event(event_type, &["sha256:old"])))
            .await;
        assert!(matches!(outcome, WebhookOutcome::Deleted(_)));
        assert!(outcome.into_entities().is_empty());
    }
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn test_repository_failure_is_empty() {
    init_test_logging();
    let fake = Arc::new(FakeHarbor::new().failing_repository("library", "nginx"));
    let processor = WebhookProcessor::new(fake, None);

    let outcome = processor
        .process(&WebhookRequest::new(event("PUSH_ARTIFACT", &["sha256:new"])))
        .await;

    assert_eq!(outcome, WebhookOutcome::Failed(EventKind::ArtifactPushed));
}
