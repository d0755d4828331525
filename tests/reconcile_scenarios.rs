//! # Reconciliation Scenario Tests
//!
//! Drive the reconciler end to end against the in-memory store.
//!
//! These tests verify:
//! - Creation, update and deletion of ArgoCD cluster secrets
//! - Validation errors surface without writes
//! - Idempotence and ownership safety
//! - Take-along label pruning
//! - Dry-run and namespaced names

mod common;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use capi2argo_controller::config::ControllerConfig;
use capi2argo_controller::constants::{
    ARGO_SECRET_TYPE_LABEL, IGNORE_CLUSTER_LABEL, OWNED_LABEL, SOURCE_SECRET_NAMESPACE_LABEL,
    SOURCE_SECRET_NAME_LABEL, TAKEN_FROM_PREFIX, TAKE_ALONG_PREFIX,
};
use capi2argo_controller::controller::argo::ArgoConfig;
use capi2argo_controller::controller::kubeconfig::CredentialError;
use capi2argo_controller::controller::reconciler::{
    reconcile_credential, CredentialRef, ReconcileOutcome, ReconcilerError,
};
use capi2argo_controller::observability::metrics;
use common::*;
use k8s_openapi::ByteString;

const ARGO_NAMESPACE: &str = "argocd";
const ARGO_NAME: &str = "cluster-workload-1";

fn credential() -> CredentialRef {
    CredentialRef::new(CLUSTER_NAMESPACE, format!("{CLUSTER_NAME}-kubeconfig"))
}

fn gc_config() -> ControllerConfig {
    ControllerConfig {
        enable_garbage_collection: true,
        ..ControllerConfig::default()
    }
}

fn create(namespace: &str, name: &str) -> Write {
    Write::Create {
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

fn replace(namespace: &str, name: &str) -> Write {
    Write::Replace {
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

fn delete(namespace: &str, name: &str) -> Write {
    Write::Delete {
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

/// Seed the store with the default kubeconfig secret and its `Cluster`
fn seeded_store(cluster_labels: &[(&str, &str)]) -> std::sync::Arc<MemoryStore> {
    let store = MemoryStore::new();
    store.put_secret(default_kubeconfig_secret());
    store.put_cluster(cluster(CLUSTER_NAME, cluster_labels));
    store
}

#[tokio::test]
async fn test_creates_argo_secret_for_new_cluster() {
    let store = seeded_store(&[]);
    let ctx = reconciler(&store, ControllerConfig::default());
    let created_before = metrics::argocd_secrets_created();

    let outcome = reconcile_credential(&ctx, &credential()).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Created);
    assert_eq!(store.writes(), vec![create(ARGO_NAMESPACE, ARGO_NAME)]);
    assert!(metrics::argocd_secrets_created() > created_before);

    let argo = store.secret(ARGO_NAMESPACE, ARGO_NAME).unwrap();
    assert_eq!(label(&argo, OWNED_LABEL), Some("true"));
    assert_eq!(label(&argo, ARGO_SECRET_TYPE_LABEL), Some("cluster"));
    assert_eq!(
        label(&argo, SOURCE_SECRET_NAME_LABEL),
        Some("workload-1-kubeconfig")
    );
    assert_eq!(label(&argo, SOURCE_SECRET_NAMESPACE_LABEL), Some("clusters"));
    assert_eq!(data_str(&argo, "name"), CLUSTER_NAME);
    assert_eq!(data_str(&argo, "server"), SERVER);
}

#[tokio::test]
async fn test_wrong_secret_type_is_rejected_without_writes() {
    let store = MemoryStore::new();
    store.put_secret(kubeconfig_secret(
        CLUSTER_NAME,
        "foo/bar",
        &kubeconfig_yaml(&[(CLUSTER_NAME, SERVER)], &cert_user()),
    ));
    store.put_cluster(cluster(CLUSTER_NAME, &[]));
    let ctx = reconciler(&store, ControllerConfig::default());

    let err = reconcile_credential(&ctx, &credential()).await.unwrap_err();

    assert!(matches!(
        err,
        ReconcilerError::Credential(CredentialError::WrongSecretType { ref secret_type })
            if secret_type == "foo/bar"
    ));
    assert!(!err.is_retryable());
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn test_validation_errors_are_distinguishable() {
    let store = MemoryStore::new();
    let mut missing_key = default_kubeconfig_secret();
    missing_key.data = Some(
        [("other".to_string(), ByteString(Vec::new()))]
            .into_iter()
            .collect(),
    );
    store.put_secret(missing_key);
    let ctx = reconciler(&store, ControllerConfig::default());

    let err = reconcile_credential(&ctx, &credential()).await.unwrap_err();
    assert!(matches!(
        err,
        ReconcilerError::Credential(CredentialError::WrongSecretKey)
    ));

    store.put_secret(kubeconfig_secret(
        CLUSTER_NAME,
        "cluster.x-k8s.io/secret",
        "apiVersion: v1\nkind: Config\nclusters: []\nusers: []\n",
    ));
    let err = reconcile_credential(&ctx, &credential()).await.unwrap_err();
    assert!(matches!(
        err,
        ReconcilerError::Credential(CredentialError::InvalidKubeConfig { .. })
    ));
    assert!(!err.is_retryable());
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn test_stale_server_is_rewritten_in_one_update() {
    let store = seeded_store(&[]);
    let ctx = reconciler(&store, ControllerConfig::default());
    reconcile_credential(&ctx, &credential()).await.unwrap();

    let mut drifted = store.secret(ARGO_NAMESPACE, ARGO_NAME).unwrap();
    let original_config = data_str(&drifted, "config");
    drifted.data.as_mut().unwrap().insert(
        "server".to_string(),
        ByteString(b"https://old.example:6443".to_vec()),
    );
    store.put_secret(drifted);
    let updated_before = metrics::argocd_secrets_updated();

    let outcome = reconcile_credential(&ctx, &credential()).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Updated);
    assert_eq!(
        store.writes(),
        vec![
            create(ARGO_NAMESPACE, ARGO_NAME),
            replace(ARGO_NAMESPACE, ARGO_NAME)
        ]
    );
    assert!(metrics::argocd_secrets_updated() > updated_before);

    let argo = store.secret(ARGO_NAMESPACE, ARGO_NAME).unwrap();
    assert_eq!(data_str(&argo, "server"), SERVER);
    assert_eq!(data_str(&argo, "config"), original_config);
    assert_eq!(data_str(&argo, "name"), CLUSTER_NAME);
}

#[tokio::test]
async fn test_missing_source_without_garbage_collection_is_a_no_op() {
    let store = seeded_store(&[]);
    let ctx = reconciler(&store, ControllerConfig::default());
    reconcile_credential(&ctx, &credential()).await.unwrap();
    store.remove_secret(CLUSTER_NAMESPACE, "workload-1-kubeconfig");

    let outcome = reconcile_credential(&ctx, &credential()).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::NothingToDelete);
    assert_eq!(store.writes(), vec![create(ARGO_NAMESPACE, ARGO_NAME)]);
    assert!(store.secret(ARGO_NAMESPACE, ARGO_NAME).is_some());
}

#[tokio::test]
async fn test_missing_source_with_garbage_collection_deletes_target() {
    let store = seeded_store(&[]);
    let ctx = reconciler(&store, gc_config());
    reconcile_credential(&ctx, &credential()).await.unwrap();
    store.remove_secret(CLUSTER_NAMESPACE, "workload-1-kubeconfig");
    let deleted_before = metrics::argocd_secrets_deleted();

    let outcome = reconcile_credential(&ctx, &credential()).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Deleted);
    assert_eq!(
        store.writes(),
        vec![
            create(ARGO_NAMESPACE, ARGO_NAME),
            delete(ARGO_NAMESPACE, ARGO_NAME)
        ]
    );
    assert!(metrics::argocd_secrets_deleted() > deleted_before);

    // Nothing left to collect on the next pass
    let outcome = reconcile_credential(&ctx, &credential()).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::NothingToDelete);
    assert_eq!(store.writes().len(), 2);
}

#[tokio::test]
async fn test_second_pass_issues_no_writes() {
    let store = seeded_store(&[
        (format!("{TAKE_ALONG_PREFIX}env").as_str(), ""),
        ("env", "prod"),
    ]);
    let ctx = reconciler(&store, ControllerConfig::default());

    assert_eq!(
        reconcile_credential(&ctx, &credential()).await.unwrap(),
        ReconcileOutcome::Created
    );
    assert_eq!(
        reconcile_credential(&ctx, &credential()).await.unwrap(),
        ReconcileOutcome::InSync
    );
    assert_eq!(store.writes().len(), 1);
}

#[tokio::test]
async fn test_unowned_target_is_never_touched() {
    let store = seeded_store(&[]);
    let mut foreign = k8s_openapi::api::core::v1::Secret::default();
    foreign.metadata.name = Some(ARGO_NAME.to_string());
    foreign.metadata.namespace = Some(ARGO_NAMESPACE.to_string());
    foreign.metadata.labels = Some(
        [
            (
                SOURCE_SECRET_NAME_LABEL.to_string(),
                "workload-1-kubeconfig".to_string(),
            ),
            (
                SOURCE_SECRET_NAMESPACE_LABEL.to_string(),
                CLUSTER_NAMESPACE.to_string(),
            ),
        ]
        .into_iter()
        .collect(),
    );
    foreign.data = Some(
        [("server".to_string(), ByteString(b"https://manual:6443".to_vec()))]
            .into_iter()
            .collect(),
    );
    store.put_secret(foreign.clone());
    let ctx = reconciler(&store, gc_config());

    let outcome = reconcile_credential(&ctx, &credential()).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Unmanaged);

    // Garbage collection leaves it alone too
    store.remove_secret(CLUSTER_NAMESPACE, "workload-1-kubeconfig");
    let outcome = reconcile_credential(&ctx, &credential()).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::NothingToDelete);

    assert!(store.writes().is_empty());
    assert_eq!(store.secret(ARGO_NAMESPACE, ARGO_NAME), Some(foreign));
}

#[tokio::test]
async fn test_removed_take_along_request_prunes_label_and_marker() {
    let take_along_env = format!("{TAKE_ALONG_PREFIX}env");
    let taken_from_env = format!("{TAKEN_FROM_PREFIX}env");
    let store = seeded_store(&[
        (take_along_env.as_str(), ""),
        ("env", "prod"),
        ("team", "a"),
    ]);
    let ctx = reconciler(&store, ControllerConfig::default());
    reconcile_credential(&ctx, &credential()).await.unwrap();

    let mut argo = store.secret(ARGO_NAMESPACE, ARGO_NAME).unwrap();
    assert_eq!(label(&argo, "env"), Some("prod"));
    assert_eq!(label(&argo, &taken_from_env), Some(""));
    assert_eq!(label(&argo, "team"), None);

    // A label added by hand must survive pruning
    argo.metadata
        .labels
        .as_mut()
        .unwrap()
        .insert("manual".to_string(), "yes".to_string());
    store.put_secret(argo);

    store.put_cluster(cluster(CLUSTER_NAME, &[("env", "prod"), ("team", "a")]));
    let outcome = reconcile_credential(&ctx, &credential()).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Updated);
    let argo = store.secret(ARGO_NAMESPACE, ARGO_NAME).unwrap();
    assert_eq!(label(&argo, "env"), None);
    assert_eq!(label(&argo, &taken_from_env), None);
    assert_eq!(label(&argo, "manual"), Some("yes"));
    assert_eq!(label(&argo, OWNED_LABEL), Some("true"));
    assert_eq!(
        label(&argo, SOURCE_SECRET_NAME_LABEL),
        Some("workload-1-kubeconfig")
    );
}

#[tokio::test]
async fn test_missing_take_along_label_is_skipped() {
    let take_along_region = format!("{TAKE_ALONG_PREFIX}region");
    let store = seeded_store(&[(take_along_region.as_str(), "")]);
    let ctx = reconciler(&store, ControllerConfig::default());

    let outcome = reconcile_credential(&ctx, &credential()).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Created);
    let argo = store.secret(ARGO_NAMESPACE, ARGO_NAME).unwrap();
    assert_eq!(label(&argo, "region"), None);
    assert_eq!(label(&argo, &format!("{TAKEN_FROM_PREFIX}region")), None);
}

#[tokio::test]
async fn test_auto_label_copy_skips_reserved_labels() {
    let store = seeded_store(&[
        ("env", "prod"),
        ("cluster.x-k8s.io/cluster-name", CLUSTER_NAME),
        ("kubernetes.io/os", "linux"),
    ]);
    let config = ControllerConfig {
        enable_auto_label_copy: true,
        ..ControllerConfig::default()
    };
    let ctx = reconciler(&store, config);

    reconcile_credential(&ctx, &credential()).await.unwrap();

    let argo = store.secret(ARGO_NAMESPACE, ARGO_NAME).unwrap();
    assert_eq!(label(&argo, "env"), Some("prod"));
    assert_eq!(label(&argo, "cluster.x-k8s.io/cluster-name"), None);
    assert_eq!(label(&argo, "kubernetes.io/os"), None);
}

#[tokio::test]
async fn test_auto_label_copy_keeps_argocd_delivery_marker() {
    let store = seeded_store(&[
        ("env", "prod"),
        (ARGO_SECRET_TYPE_LABEL, "repository"),
        ("argocd.argoproj.io/instance", "platform"),
    ]);
    let config = ControllerConfig {
        enable_auto_label_copy: true,
        ..ControllerConfig::default()
    };
    let ctx = reconciler(&store, config);

    reconcile_credential(&ctx, &credential()).await.unwrap();
    let argo = store.secret(ARGO_NAMESPACE, ARGO_NAME).unwrap();
    assert_eq!(label(&argo, ARGO_SECRET_TYPE_LABEL), Some("cluster"));
    assert_eq!(label(&argo, "argocd.argoproj.io/instance"), None);
    assert_eq!(label(&argo, "env"), Some("prod"));

    // The next pass finds nothing to correct
    assert_eq!(
        reconcile_credential(&ctx, &credential()).await.unwrap(),
        ReconcileOutcome::InSync
    );
    assert_eq!(store.writes().len(), 1);
}

#[tokio::test]
async fn test_config_round_trips_client_certificate() {
    let store = seeded_store(&[]);
    let ctx = reconciler(&store, ControllerConfig::default());
    reconcile_credential(&ctx, &credential()).await.unwrap();

    let argo = store.secret(ARGO_NAMESPACE, ARGO_NAME).unwrap();
    let config: ArgoConfig = serde_json::from_str(&data_str(&argo, "config")).unwrap();
    let tls = config.tls_client_config.unwrap();

    assert_eq!(config.bearer_token, None);
    assert_eq!(STANDARD.decode(tls.ca_data.unwrap()).unwrap(), b"ca-data");
    assert_eq!(STANDARD.decode(tls.cert_data.unwrap()).unwrap(), b"cert-data");
    assert_eq!(STANDARD.decode(tls.key_data.unwrap()).unwrap(), b"key-data");
}

#[tokio::test]
async fn test_config_round_trips_bearer_token() {
    let store = MemoryStore::new();
    store.put_secret(kubeconfig_secret(
        CLUSTER_NAME,
        "cluster.x-k8s.io/secret",
        &kubeconfig_yaml(&[(CLUSTER_NAME, SERVER)], &token_user("s3cr3t")),
    ));
    store.put_cluster(cluster(CLUSTER_NAME, &[]));
    let ctx = reconciler(&store, ControllerConfig::default());
    reconcile_credential(&ctx, &credential()).await.unwrap();

    let argo = store.secret(ARGO_NAMESPACE, ARGO_NAME).unwrap();
    let raw = data_str(&argo, "config");
    let config: ArgoConfig = serde_json::from_str(&raw).unwrap();

    assert_eq!(config.bearer_token.as_deref(), Some("s3cr3t"));
    let tls = config.tls_client_config.unwrap();
    assert_eq!(STANDARD.decode(tls.ca_data.unwrap()).unwrap(), b"ca-data");
    assert!(!raw.contains("certData"));
    assert!(!raw.contains("keyData"));
}

#[tokio::test]
async fn test_only_first_kubeconfig_cluster_is_used() {
    let store = MemoryStore::new();
    store.put_secret(kubeconfig_secret(
        CLUSTER_NAME,
        "cluster.x-k8s.io/secret",
        &kubeconfig_yaml(
            &[
                (CLUSTER_NAME, SERVER),
                ("other", "https://10.0.0.99:6443"),
            ],
            &cert_user(),
        ),
    ));
    store.put_cluster(cluster(CLUSTER_NAME, &[]));
    let ctx = reconciler(&store, ControllerConfig::default());

    reconcile_credential(&ctx, &credential()).await.unwrap();

    let argo = store.secret(ARGO_NAMESPACE, ARGO_NAME).unwrap();
    assert_eq!(data_str(&argo, "name"), CLUSTER_NAME);
    assert_eq!(data_str(&argo, "server"), SERVER);
}

#[tokio::test]
async fn test_missing_cluster_deletes_target_without_garbage_collection() {
    let store = seeded_store(&[]);
    let ctx = reconciler(&store, ControllerConfig::default());
    reconcile_credential(&ctx, &credential()).await.unwrap();

    let orphaned = MemoryStore::new();
    orphaned.put_secret(default_kubeconfig_secret());
    orphaned.put_secret(store.secret(ARGO_NAMESPACE, ARGO_NAME).unwrap());
    let ctx = reconciler(&orphaned, ControllerConfig::default());

    let outcome = reconcile_credential(&ctx, &credential()).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Deleted);
    assert_eq!(orphaned.writes(), vec![delete(ARGO_NAMESPACE, ARGO_NAME)]);
}

#[tokio::test]
async fn test_ignored_cluster_leaves_existing_target_alone() {
    let store = seeded_store(&[]);
    let ctx = reconciler(&store, ControllerConfig::default());
    reconcile_credential(&ctx, &credential()).await.unwrap();

    let mut drifted = store.secret(ARGO_NAMESPACE, ARGO_NAME).unwrap();
    drifted.data.as_mut().unwrap().insert(
        "server".to_string(),
        ByteString(b"https://old.example:6443".to_vec()),
    );
    store.put_secret(drifted.clone());
    store.put_cluster(cluster(CLUSTER_NAME, &[(IGNORE_CLUSTER_LABEL, "")]));

    let outcome = reconcile_credential(&ctx, &credential()).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Ignored);
    assert_eq!(store.writes().len(), 1);
    assert_eq!(store.secret(ARGO_NAMESPACE, ARGO_NAME), Some(drifted));
}

#[tokio::test]
async fn test_namespaced_names_prefix_name_and_payload() {
    let store = seeded_store(&[]);
    let config = ControllerConfig {
        enable_namespaced_names: true,
        ..ControllerConfig::default()
    };
    let ctx = reconciler(&store, config);

    reconcile_credential(&ctx, &credential()).await.unwrap();

    let name = "cluster-clusters-workload-1";
    assert_eq!(store.writes(), vec![create(ARGO_NAMESPACE, name)]);
    let argo = store.secret(ARGO_NAMESPACE, name).unwrap();
    assert_eq!(data_str(&argo, "name"), "clusters-workload-1");
}

#[tokio::test]
async fn test_custom_argo_namespace() {
    let store = seeded_store(&[]);
    let config = ControllerConfig {
        argo_namespace: "gitops".to_string(),
        ..ControllerConfig::default()
    };
    let ctx = reconciler(&store, config);

    reconcile_credential(&ctx, &credential()).await.unwrap();

    assert_eq!(store.writes(), vec![create("gitops", ARGO_NAME)]);
}

#[tokio::test]
async fn test_dry_run_issues_no_writes() {
    let store = seeded_store(&[]);
    let config = ControllerConfig {
        dry_run: true,
        enable_garbage_collection: true,
        ..ControllerConfig::default()
    };
    let ctx = reconciler(&store, config);

    let outcome = reconcile_credential(&ctx, &credential()).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Created);
    assert!(store.secret(ARGO_NAMESPACE, ARGO_NAME).is_none());

    // Seed a real target, then drop the source: the delete is only logged
    let live = reconciler(&store, ControllerConfig::default());
    reconcile_credential(&live, &credential()).await.unwrap();
    store.remove_secret(CLUSTER_NAMESPACE, "workload-1-kubeconfig");

    let outcome = reconcile_credential(&ctx, &credential()).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Deleted);
    assert_eq!(store.writes(), vec![create(ARGO_NAMESPACE, ARGO_NAME)]);
    assert!(store.secret(ARGO_NAMESPACE, ARGO_NAME).is_some());
}

#[tokio::test]
async fn test_unwatched_secrets_are_skipped() {
    let store = seeded_store(&[]);
    let config = ControllerConfig {
        allowed_namespaces: ["tenant-a".to_string()].into_iter().collect(),
        ..ControllerConfig::default()
    };
    let ctx = reconciler(&store, config);

    let outcome = reconcile_credential(&ctx, &credential()).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Skipped);

    let ctx = reconciler(&store, ControllerConfig::default());
    let user = CredentialRef::new(CLUSTER_NAMESPACE, "workload-1-user-kubeconfig");
    let outcome = reconcile_credential(&ctx, &user).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Skipped);

    assert!(store.writes().is_empty());
}
