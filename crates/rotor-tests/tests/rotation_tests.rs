//! Login, judge and kubeconfig injection working on the same token.

use chrono::{DateTime, Duration};
use rotor_auth::RotationJudge;
use rotor_core::FixedClock;
use rotor_kubeconfig::{GenerateConfig, KubeconfigInjector};
use rotor_tests::{FakeIdp, IdTokenFixture, KUBECONFIG_TEMPLATE};
use serde_yaml::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_logged_in_token_lands_in_kubeconfig() {
    let idp = FakeIdp::start().await;
    let login = idp.login().await.unwrap();
    let tokens = login.do_login(&CancellationToken::new()).await.unwrap();

    let injector = KubeconfigInjector::new();
    let result = injector
        .generate(
            KUBECONFIG_TEMPLATE.as_bytes(),
            tokens.id_token.as_bytes(),
            &GenerateConfig::new(),
        )
        .unwrap();

    let generated: Value = serde_yaml::from_slice(&result.generated_kubeconfig).unwrap();
    assert_eq!(
        generated["users"][0]["user"]["token"].as_str(),
        Some(tokens.id_token.as_str())
    );
    assert!(generated["users"][0]["user"].get("exec").is_none());
    assert_eq!(result.server_url, "https://api.shoot.example:443");

    let remembered =
        KubeconfigInjector::with_hashes(result.source_kubeconfig_hash, result.source_token_hash);
    assert!(remembered.is_up_to_date(KUBECONFIG_TEMPLATE.as_bytes(), tokens.id_token.as_bytes()));

    let refreshed = login.refresh(&tokens.refresh_token).await.unwrap();
    assert!(
        !remembered.is_up_to_date(KUBECONFIG_TEMPLATE.as_bytes(), refreshed.id_token.as_bytes())
    );
}

#[test]
fn test_judge_schedules_rotation_at_two_thirds() {
    let issued_at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    let token = IdTokenFixture::issued("https://idp.example", issued_at, Duration::hours(3)).encode();
    let expires_at = issued_at + Duration::hours(3);

    let before = Arc::new(FixedClock::new(expires_at - Duration::hours(1) - Duration::seconds(1)));
    let judge = RotationJudge::with_clock(&token, before.clone()).unwrap();
    let duration = judge.estimate_rotation_duration().unwrap();
    assert_eq!(duration, Duration::hours(1));
    assert!(!judge.is_in_renew_period(duration));

    before.advance(Duration::seconds(1));
    assert!(judge.is_in_renew_period(duration));

    let status = judge.status();
    assert_eq!(status.issuer.as_deref(), Some("https://idp.example"));
    assert_eq!(status.rotation_not_before, Some(expires_at - Duration::hours(1)));
}
