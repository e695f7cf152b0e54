mod common;

use chrono::TimeDelta;
use common::{Harness, SWITCH_HREF};
use futures::future::join_all;
use tether_api::{
    context::ApiContext,
    enrollment::{EnrollmentError, enroll},
};
use tether_common::params::PairAgentRequest;
use tether_db::{
    SqliteStorage,
    models::RemainingUses,
    storage::{AgentStore, CreatePairingKeyParams, PairingKeyStore},
};
use tether_pce::PceError;

fn request(name: &str, key: &str) -> PairAgentRequest {
    PairAgentRequest {
        agent_name: Some(name.into()),
        pairing_key: Some(key.into()),
    }
}

#[tokio::test]
async fn test_single_use_key() {
    let h = Harness::new().await;
    h.controller.add_workload("web01", false);
    h.controller.add_workload("web02", false);
    let key = h.pairing_key(RemainingUses::Finite(1), None).await;

    let agent = enroll(&h.ctx, request("web01", &key.key)).await.unwrap();
    assert_eq!(agent.name, "web01");
    assert_eq!(agent.workload_ref, "/orgs/1/workloads/web01");
    assert_eq!(agent.credential.len(), 64);
    assert_eq!(h.remaining_uses(&key.key).await, RemainingUses::Finite(0));

    let err = enroll(&h.ctx, request("web02", &key.key)).await.unwrap_err();
    assert!(matches!(err, EnrollmentError::KeyExhausted));
    assert_eq!(err.to_string(), "Pairing key has no uses left");
    assert!(!AgentStore::name_exists(&*h.db, "web02").await.unwrap());
}

#[tokio::test]
async fn test_unlimited_key_is_never_charged() {
    let h = Harness::new().await;
    let key = h.pairing_key(RemainingUses::Unlimited, None).await;

    for name in ["web01", "web02", "web03"] {
        h.controller.add_workload(name, false);
        enroll(&h.ctx, request(name, &key.key)).await.unwrap();
    }

    assert_eq!(h.remaining_uses(&key.key).await, RemainingUses::Unlimited);
    assert_eq!(AgentStore::list(&*h.db).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_missing_fields() {
    let h = Harness::new().await;

    let err = enroll(&h.ctx, PairAgentRequest::default()).await.unwrap_err();
    assert_eq!(err.to_string(), "Agent name not provided");

    let err = enroll(
        &h.ctx,
        PairAgentRequest {
            agent_name: Some("web01".into()),
            pairing_key: Some("   ".into()),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "Pairing key not provided");
}

#[tokio::test]
async fn test_agent_name_is_matched_as_sent() {
    let h = Harness::new().await;
    h.controller.add_workload("web01", false);
    let key = h.pairing_key(RemainingUses::Finite(1), None).await;

    let err = enroll(&h.ctx, request("  web01  ", &key.key))
        .await
        .unwrap_err();
    assert!(matches!(err, EnrollmentError::WorkloadNotFound));
    assert!(!AgentStore::name_exists(&*h.db, "web01").await.unwrap());
    assert_eq!(h.remaining_uses(&key.key).await, RemainingUses::Finite(1));
}

#[tokio::test]
async fn test_duplicate_name_rejected_before_key_checks() {
    let h = Harness::new().await;
    h.controller.add_workload("web01", false);
    let key = h.pairing_key(RemainingUses::Finite(5), None).await;

    enroll(&h.ctx, request("web01", &key.key)).await.unwrap();

    // even with a bogus key the name conflict wins
    let err = enroll(&h.ctx, request("web01", "bogus")).await.unwrap_err();
    assert!(matches!(err, EnrollmentError::NameTaken));
    assert_eq!(h.remaining_uses(&key.key).await, RemainingUses::Finite(4));
}

#[tokio::test]
async fn test_unknown_key() {
    let h = Harness::new().await;
    h.controller.add_workload("web01", false);

    let err = enroll(&h.ctx, request("web01", "nope")).await.unwrap_err();
    assert_eq!(err.to_string(), "Pairing key does not exist");
}

#[tokio::test]
async fn test_expired_key_with_uses_left() {
    let h = Harness::new().await;
    h.controller.add_workload("web01", false);

    let key = PairingKeyStore::create(
        &*h.db,
        CreatePairingKeyParams {
            valid_for: Some(TimeDelta::zero()),
            remaining_uses: RemainingUses::Finite(10),
            target_switch_ref: None,
        },
    )
    .await
    .unwrap();

    let err = enroll(&h.ctx, request("web01", &key.key)).await.unwrap_err();
    assert!(matches!(err, EnrollmentError::KeyExpired));
    assert_eq!(h.remaining_uses(&key.key).await, RemainingUses::Finite(10));
}

#[tokio::test]
async fn test_workload_resolution() {
    let h = Harness::new().await;
    let key = h.pairing_key(RemainingUses::Unlimited, None).await;

    let err = enroll(&h.ctx, request("ghost", &key.key)).await.unwrap_err();
    assert!(matches!(err, EnrollmentError::WorkloadNotFound));

    // already managed by a VEN
    h.controller.add_workload("managed01", true);
    let err = enroll(&h.ctx, request("managed01", &key.key)).await.unwrap_err();
    assert!(matches!(err, EnrollmentError::WorkloadNotFound));

    h.controller.add_workload("dup", false);
    h.controller.add_workload("dup", false);
    let err = enroll(&h.ctx, request("dup", &key.key)).await.unwrap_err();
    assert!(matches!(err, EnrollmentError::AmbiguousWorkload));

    assert!(AgentStore::list(&*h.db).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_switch_bound_key_binds_workload() {
    let h = Harness::new().await;
    let workload = h.controller.add_workload("web01", false);
    h.controller.add_switch(SWITCH_HREF, "tor-1");
    let key = h.pairing_key(RemainingUses::Finite(2), Some(SWITCH_HREF)).await;

    enroll(&h.ctx, request("web01", &key.key)).await.unwrap();

    assert_eq!(
        h.controller.bindings(),
        vec![(workload, SWITCH_HREF.to_string())]
    );
    assert_eq!(h.remaining_uses(&key.key).await, RemainingUses::Finite(1));
}

#[tokio::test]
async fn test_already_bound_workload_is_rejected() {
    let h = Harness::new().await;
    let workload = h.controller.add_workload("web01", false);
    h.controller.add_switch(SWITCH_HREF, "tor-1");
    h.controller.add_binding(&workload, SWITCH_HREF);
    let key = h.pairing_key(RemainingUses::Finite(2), Some(SWITCH_HREF)).await;

    let err = enroll(&h.ctx, request("web01", &key.key)).await.unwrap_err();
    assert_eq!(err.to_string(), "Workload is already bound to the target switch");

    assert!(AgentStore::list(&*h.db).await.unwrap().is_empty());
    assert_eq!(h.remaining_uses(&key.key).await, RemainingUses::Finite(2));
}

#[tokio::test]
async fn test_missing_target_switch() {
    let h = Harness::new().await;
    h.controller.add_workload("web01", false);
    let key = h
        .pairing_key(RemainingUses::Finite(1), Some("/orgs/1/network_devices/404"))
        .await;

    let err = enroll(&h.ctx, request("web01", &key.key)).await.unwrap_err();
    assert!(matches!(err, EnrollmentError::SwitchNotFound));
    assert_eq!(h.remaining_uses(&key.key).await, RemainingUses::Finite(1));
}

#[tokio::test]
async fn test_controller_failure_commits_nothing() {
    let h = Harness::new().await;
    h.controller.add_workload("web01", false);
    h.controller.time_out();
    let key = h.pairing_key(RemainingUses::Finite(1), None).await;

    let err = enroll(&h.ctx, request("web01", &key.key)).await.unwrap_err();
    assert!(matches!(err, EnrollmentError::Controller(PceError::Timeout)));
    assert_eq!(h.remaining_uses(&key.key).await, RemainingUses::Finite(1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_enrollments_respect_use_count() {
    let dir = tempfile::tempdir().unwrap();
    let db = SqliteStorage::create(dir.path().join("tether.sqlite3"), 4)
        .await
        .unwrap();
    let h = Harness::with_storage(db);

    let names: Vec<String> = (0..10).map(|i| format!("web{i:02}")).collect();
    for name in &names {
        h.controller.add_workload(name, false);
    }
    let key = h.pairing_key(RemainingUses::Finite(4), None).await;

    let attempts = names.iter().map(|name| {
        let ctx: ApiContext = h.ctx.clone();
        let req = request(name, &key.key);
        tokio::spawn(async move { enroll(&ctx, req).await })
    });

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 4);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, EnrollmentError::KeyExhausted))
    );
    assert_eq!(AgentStore::list(&*h.db).await.unwrap().len(), 4);
    assert_eq!(h.remaining_uses(&key.key).await, RemainingUses::Finite(0));
}
