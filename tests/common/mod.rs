//! Common test utilities for reconciliation tests
//!
//! Provides an in-memory [`ClusterStore`] that records every write and can
//! fail chosen calls with an API error, plus builders for kubeconfig secrets
//! and CAPI `Cluster`s.

#![allow(dead_code, reason = "not every test file uses every helper")]

use async_trait::async_trait;
use capi2argo_controller::config::ControllerConfig;
use capi2argo_controller::constants::{
    CAPI_CLUSTER_NAME_LABEL, CAPI_SECRET_TYPE, KUBECONFIG_DATA_KEY,
};
use capi2argo_controller::controller::reconciler::Reconciler;
use capi2argo_controller::controller::store::{ClusterStore, StoreError};
use capi2argo_controller::crd::{Cluster, ClusterSpec};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub const CLUSTER_NAMESPACE: &str = "clusters";
pub const CLUSTER_NAME: &str = "workload-1";
pub const SERVER: &str = "https://10.0.0.10:6443";

pub const CA: &str = "Y2EtZGF0YQ==";
pub const CERT: &str = "Y2VydC1kYXRh";
pub const KEY: &str = "a2V5LWRhdGE=";

/// A write issued against the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Create { namespace: String, name: String },
    Replace { namespace: String, name: String },
    Delete { namespace: String, name: String },
}

/// A store call that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    GetSecret,
    ListSecrets,
    CreateSecret,
    ReplaceSecret,
    DeleteSecret,
    GetCluster,
}

type Key = (String, String);

/// In-memory object store
#[derive(Debug, Default)]
pub struct MemoryStore {
    secrets: Mutex<BTreeMap<Key, Secret>>,
    clusters: Mutex<BTreeMap<Key, Cluster>>,
    writes: Mutex<Vec<Write>>,
    failures: Mutex<Vec<(Op, Option<String>)>>,
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

/// A 500 from the API server
pub fn server_error() -> StoreError {
    StoreError::Kube(kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: "etcdserver: request timed out".to_string(),
        reason: "InternalError".to_string(),
        code: 500,
    }))
}

fn not_found(kind: &'static str, namespace: &str, name: &str) -> StoreError {
    StoreError::NotFound {
        kind,
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed a secret without recording a write
    pub fn put_secret(&self, secret: Secret) {
        let namespace = secret.metadata.namespace.clone().unwrap_or_default();
        let name = secret.metadata.name.clone().unwrap_or_default();
        self.secrets
            .lock()
            .unwrap()
            .insert(key(&namespace, &name), secret);
    }

    pub fn remove_secret(&self, namespace: &str, name: &str) {
        self.secrets.lock().unwrap().remove(&key(namespace, name));
    }

    pub fn put_cluster(&self, cluster: Cluster) {
        let namespace = cluster.metadata.namespace.clone().unwrap_or_default();
        let name = cluster.metadata.name.clone().unwrap_or_default();
        self.clusters
            .lock()
            .unwrap()
            .insert(key(&namespace, &name), cluster);
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.secrets
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    /// Fail the next `op` call with a server error
    ///
    /// With `name`, only a call for that object name fails.
    pub fn fail_next(&self, op: Op, name: Option<&str>) {
        self.failures
            .lock()
            .unwrap()
            .push((op, name.map(str::to_string)));
    }

    fn record(&self, write: Write) {
        self.writes.lock().unwrap().push(write);
    }

    /// Consume a pending failure matching the call
    fn injected(&self, op: Op, name: Option<&str>) -> Result<(), StoreError> {
        let mut failures = self.failures.lock().unwrap();
        let pending = failures.iter().position(|(failing_op, failing_name)| {
            *failing_op == op
                && failing_name
                    .as_deref()
                    .is_none_or(|failing| Some(failing) == name)
        });
        match pending {
            Some(index) => {
                failures.remove(index);
                Err(server_error())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ClusterStore for MemoryStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, StoreError> {
        self.injected(Op::GetSecret, Some(name))?;
        self.secret(namespace, name)
            .ok_or_else(|| not_found("Secret", namespace, name))
    }

    async fn list_secrets(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Secret>, StoreError> {
        self.injected(Op::ListSecrets, None)?;
        let secrets = self.secrets.lock().unwrap();
        Ok(secrets
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .filter(|(_, secret)| {
                let existing = secret.metadata.labels.clone().unwrap_or_default();
                labels.iter().all(|(k, v)| existing.get(k) == Some(v))
            })
            .map(|(_, secret)| secret.clone())
            .collect())
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, StoreError> {
        let name = secret.metadata.name.clone().unwrap_or_default();
        self.injected(Op::CreateSecret, Some(&name))?;
        self.record(Write::Create {
            namespace: namespace.to_string(),
            name: name.clone(),
        });
        let mut stored = secret.clone();
        stored.metadata.namespace = Some(namespace.to_string());
        self.secrets
            .lock()
            .unwrap()
            .insert(key(namespace, &name), stored.clone());
        Ok(stored)
    }

    async fn replace_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, StoreError> {
        let name = secret.metadata.name.clone().unwrap_or_default();
        self.injected(Op::ReplaceSecret, Some(&name))?;
        let mut secrets = self.secrets.lock().unwrap();
        if !secrets.contains_key(&key(namespace, &name)) {
            return Err(not_found("Secret", namespace, &name));
        }
        self.record(Write::Replace {
            namespace: namespace.to_string(),
            name: name.clone(),
        });
        secrets.insert(key(namespace, &name), secret.clone());
        Ok(secret.clone())
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.injected(Op::DeleteSecret, Some(name))?;
        let removed = self.secrets.lock().unwrap().remove(&key(namespace, name));
        if removed.is_none() {
            return Err(not_found("Secret", namespace, name));
        }
        self.record(Write::Delete {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        Ok(())
    }

    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Cluster, StoreError> {
        self.injected(Op::GetCluster, Some(name))?;
        self.clusters
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| not_found("Cluster", namespace, name))
    }
}

pub fn reconciler(store: &Arc<MemoryStore>, config: ControllerConfig) -> Reconciler {
    let shared: Arc<MemoryStore> = Arc::clone(store);
    Reconciler::new(shared, Arc::new(config))
}

pub fn kubeconfig_yaml(cluster_entries: &[(&str, &str)], user: &str) -> String {
    let clusters: String = cluster_entries
        .iter()
        .map(|(name, server)| {
            format!(
                "- name: {name}\n  cluster:\n    certificate-authority-data: {CA}\n    server: {server}\n"
            )
        })
        .collect();
    format!(
        "apiVersion: v1\nkind: Config\nclusters:\n{clusters}users:\n- name: admin\n  user:\n{user}\n"
    )
}

pub fn cert_user() -> String {
    format!("    client-certificate-data: {CERT}\n    client-key-data: {KEY}")
}

pub fn token_user(token: &str) -> String {
    format!("    token: {token}")
}

/// A Cluster API kubeconfig secret for `cluster_name` holding `payload`
pub fn kubeconfig_secret(cluster_name: &str, secret_type: &str, payload: &str) -> Secret {
    let mut secret = Secret::default();
    secret.metadata.name = Some(format!("{cluster_name}-kubeconfig"));
    secret.metadata.namespace = Some(CLUSTER_NAMESPACE.to_string());
    secret.metadata.labels = Some(BTreeMap::from([(
        CAPI_CLUSTER_NAME_LABEL.to_string(),
        cluster_name.to_string(),
    )]));
    secret.type_ = Some(secret_type.to_string());
    secret.data = Some(BTreeMap::from([(
        KUBECONFIG_DATA_KEY.to_string(),
        ByteString(payload.as_bytes().to_vec()),
    )]));
    secret
}

/// The kubeconfig secret for [`CLUSTER_NAME`] with a client certificate
pub fn default_kubeconfig_secret() -> Secret {
    kubeconfig_secret(
        CLUSTER_NAME,
        CAPI_SECRET_TYPE,
        &kubeconfig_yaml(&[(CLUSTER_NAME, SERVER)], &cert_user()),
    )
}

pub fn cluster(name: &str, labels: &[(&str, &str)]) -> Cluster {
    let mut cluster = Cluster::new(name, ClusterSpec::default());
    cluster.metadata.namespace = Some(CLUSTER_NAMESPACE.to_string());
    cluster.metadata.labels = Some(
        labels
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
    );
    cluster
}

pub fn data_str(secret: &Secret, key: &str) -> String {
    let bytes = secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(|value| value.0.clone())
        .unwrap_or_default();
    String::from_utf8(bytes).unwrap()
}

pub fn label<'a>(secret: &'a Secret, key: &str) -> Option<&'a str> {
    secret
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(key))
        .map(String::as_str)
}
