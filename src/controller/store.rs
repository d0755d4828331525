//! # Object Store
//!
//! The reconciler only talks to the cluster through [`ClusterStore`], so it can
//! be driven against a real API server ([`KubeStore`]) or an in-memory fake.

use crate::crd::Cluster;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::Client;
use std::collections::BTreeMap;
use thiserror::Error;

/// Object store failures
///
/// `NotFound` is decided from the API status code, never from message text.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    fn from_kube(error: kube::Error, kind: &'static str, namespace: &str, name: &str) -> Self {
        match error {
            kube::Error::Api(api_err) if api_err.code == 404 => StoreError::NotFound {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            other => StoreError::Kube(other),
        }
    }
}

/// Render labels as an equality-based label selector
#[must_use]
pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Reads and writes the reconciler needs
#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, StoreError>;

    /// Secrets in `namespace` carrying every label in `labels`
    async fn list_secrets(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Secret>, StoreError>;

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, StoreError>;

    /// Replace the whole secret, guarded by its `resourceVersion`
    async fn replace_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, StoreError>;

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Cluster, StoreError>;
}

/// [`ClusterStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, StoreError> {
        self.secrets(namespace)
            .get(name)
            .await
            .map_err(|e| StoreError::from_kube(e, "Secret", namespace, name))
    }

    async fn list_secrets(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Secret>, StoreError> {
        let params = ListParams::default().labels(&label_selector(labels));
        let list = self.secrets(namespace).list(&params).await?;
        Ok(list.items)
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, StoreError> {
        Ok(self
            .secrets(namespace)
            .create(&PostParams::default(), secret)
            .await?)
    }

    async fn replace_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, StoreError> {
        let name = secret.metadata.name.clone().unwrap_or_default();
        self.secrets(namespace)
            .replace(&name, &PostParams::default(), secret)
            .await
            .map_err(|e| StoreError::from_kube(e, "Secret", namespace, &name))
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.secrets(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_kube(e, "Secret", namespace, name))
    }

    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Cluster, StoreError> {
        let clusters: Api<Cluster> = Api::namespaced(self.client.clone(), namespace);
        clusters
            .get(name)
            .await
            .map_err(|e| StoreError::from_kube(e, "Cluster", namespace, name))
    }
}
