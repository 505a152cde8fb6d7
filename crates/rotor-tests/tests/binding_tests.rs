//! Provisioning client and binding rotation against a mock provisioning API.

use chrono::{DateTime, Duration, Utc};
use pretty_assertions::assert_eq;
use rotor_binding::rotator::{BINDING_ID_KEY, EXPIRES_AT_KEY, KUBECONFIG_KEY};
use rotor_binding::{BindingRotator, BindingService, BindingServiceError};
use rotor_core::{Binding, FixedClock, RotationPolicy};
use rotor_tests::{CreatedBinding, KUBECONFIG_TEMPLATE, ProvisioningMock, new_binding_id};
use serde_json::json;
use std::sync::Arc;

const ENVIRONMENT: &str = "env-1";

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

#[tokio::test]
async fn test_list_bindings() {
    let mock = ProvisioningMock::start().await;
    mock.mock_list(ENVIRONMENT, &["a", "b"]).await;

    let listed = mock.client().list_bindings(ENVIRONMENT).await.unwrap();

    let ids: Vec<_> = listed.into_iter().map(|b| b.binding_id).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test]
async fn test_create_binding_uses_location_header() {
    let mock = ProvisioningMock::start().await;
    let expires_at = now() + Duration::minutes(75);
    mock.mock_create(
        ENVIRONMENT,
        4_500,
        CreatedBinding {
            id: "from-body",
            expires_at,
            kubeconfig: KUBECONFIG_TEMPLATE,
            location: Some("from-location"),
        },
    )
    .await;

    let issued = mock.client().create_binding(ENVIRONMENT, 4_500).await.unwrap();

    assert_eq!(issued.id, "from-location");
    assert_eq!(issued.expires_at, expires_at);
    assert_eq!(issued.kubeconfig, KUBECONFIG_TEMPLATE);
}

#[tokio::test]
async fn test_create_binding_uses_body_id() {
    let mock = ProvisioningMock::start().await;
    let id = new_binding_id();
    mock.mock_create(
        ENVIRONMENT,
        60,
        CreatedBinding {
            id: &id,
            expires_at: now(),
            kubeconfig: "",
            location: None,
        },
    )
    .await;

    let issued = mock.client().create_binding(ENVIRONMENT, 60).await.unwrap();

    assert_eq!(issued.id, id);
}

#[tokio::test]
async fn test_create_binding_surfaces_api_error() {
    let mock = ProvisioningMock::start().await;
    mock.mock_error(
        "POST",
        ENVIRONMENT,
        409,
        json!({ "error": { "message": "binding quota exceeded", "code": 30004 } }),
    )
    .await;

    let err = mock.client().create_binding(ENVIRONMENT, 60).await.unwrap_err();

    match err {
        BindingServiceError::Api { status, message } => {
            assert_eq!(status, 409);
            assert_eq!(message, "binding quota exceeded, Code 30004");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_delete_binding_statuses() {
    let mock = ProvisioningMock::start().await;
    mock.mock_delete(ENVIRONMENT, "gone", 404).await;
    mock.mock_delete(ENVIRONMENT, "live", 204).await;
    mock.mock_delete(ENVIRONMENT, "broken", 500).await;
    let client = mock.client();

    assert!(client.delete_binding(ENVIRONMENT, "live").await.is_ok());
    assert!(
        client
            .delete_binding(ENVIRONMENT, "gone")
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert!(matches!(
        client.delete_binding(ENVIRONMENT, "broken").await,
        Err(BindingServiceError::Api { status: 500, .. })
    ));
}

#[tokio::test]
async fn test_rotator_replaces_rotated_binding() {
    let mock = ProvisioningMock::start().await;
    let rotated = Binding::issued(
        "rotated",
        now() - Duration::minutes(61),
        now() + Duration::minutes(14),
    );
    let vanished = Binding::issued("vanished", now(), now() + Duration::hours(1));
    let issued_expiry = now() + Duration::minutes(75);

    mock.mock_list(ENVIRONMENT, &["rotated"]).await;
    mock.mock_create(
        ENVIRONMENT,
        4_500,
        CreatedBinding {
            id: "issued",
            expires_at: issued_expiry,
            kubeconfig: KUBECONFIG_TEMPLATE,
            location: None,
        },
    )
    .await;

    let rotator = BindingRotator::new(
        Arc::new(mock.client()),
        RotationPolicy::default(),
        Arc::new(FixedClock::new(now())),
        ENVIRONMENT,
    );
    let outcome = rotator.rotate(vec![rotated.clone(), vanished]).await.unwrap();

    assert_eq!(
        outcome.bindings,
        vec![
            Binding {
                is_active: false,
                ..rotated
            },
            Binding::issued("issued", now(), issued_expiry),
        ]
    );
    let details = outcome.connection_details.expect("a binding was issued");
    assert_eq!(details[BINDING_ID_KEY], b"issued".to_vec());
    assert_eq!(details[EXPIRES_AT_KEY], issued_expiry.to_rfc3339().into_bytes());
    assert_eq!(details[KUBECONFIG_KEY], KUBECONFIG_TEMPLATE.as_bytes().to_vec());
}

#[tokio::test]
async fn test_rotator_keeps_active_binding() {
    let mock = ProvisioningMock::start().await;
    let active = Binding::issued("active", now() - Duration::minutes(5), now() + Duration::hours(1));
    mock.mock_list(ENVIRONMENT, &["active"]).await;

    let rotator = BindingRotator::new(
        Arc::new(mock.client()),
        RotationPolicy::default(),
        Arc::new(FixedClock::new(now())),
        ENVIRONMENT,
    );
    let outcome = rotator.rotate(vec![active.clone()]).await.unwrap();

    assert_eq!(outcome.bindings, vec![active]);
    assert!(outcome.connection_details.is_none());
}

#[tokio::test]
async fn test_rotator_teardown() {
    let mock = ProvisioningMock::start().await;
    mock.mock_delete(ENVIRONMENT, "gone", 404).await;
    mock.mock_delete(ENVIRONMENT, "live", 200).await;

    let rotator = BindingRotator::new(
        Arc::new(mock.client()),
        RotationPolicy::default(),
        Arc::new(FixedClock::new(now())),
        ENVIRONMENT,
    );
    let bindings = vec![
        Binding::issued("gone", now(), now() + Duration::hours(1)),
        Binding::issued("live", now(), now() + Duration::hours(1)),
    ];

    rotator.teardown(&bindings).await.unwrap();
}
