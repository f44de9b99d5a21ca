//! Collaborators the reconciler reads from and writes to, plus their Kubernetes implementations.

use crate::{
    error::{
        ReconcileError,
        Result,
    },
    resources::{
        GlobalDNS,
        MultiClusterApp,
    },
};
use async_trait::async_trait;
use k8s_openapi::api::{
    core::v1::Namespace,
    networking::v1::Ingress,
};
use kube::{
    api::{
        ListParams,
        PostParams,
    },
    runtime::reflector::ObjectRef,
    Api,
    ResourceExt as _,
};
use std::collections::BTreeSet;

#[async_trait]
pub trait MultiClusterAppLookup: Send + Sync {
    /// Fails with [`ReconcileError::NotFound`] if the app does not exist.
    async fn get_multi_cluster_app(&self, namespace: &str, name: &str) -> Result<MultiClusterApp>;
}

#[async_trait]
pub trait IngressLister: Send + Sync {
    async fn list_ingresses(&self, namespace: &str, params: &ListParams) -> Result<Vec<Ingress>>;
}

#[async_trait]
pub trait NamespaceLister: Send + Sync {
    async fn list_namespaces(&self, params: &ListParams) -> Result<Vec<Namespace>>;
}

#[async_trait]
pub trait GlobalDnsStore: Send + Sync {
    async fn get_record(&self, key: &ObjectRef<GlobalDNS>) -> Result<Option<GlobalDNS>>;

    /// Persists the record's status. Fails with [`ReconcileError::Conflict`] if the record changed since it was read.
    async fn update_record(&self, record: &GlobalDNS) -> Result<GlobalDNS>;
}

/// Folds the per-cluster endpoints of a record into its published endpoint list.
pub trait EndpointMerger: Send + Sync {
    fn recompute(&self, record: &mut GlobalDNS);
}

/// Publishes the union of all clusters' endpoints, visiting clusters in key order and keeping the first occurrence
/// of every endpoint.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnionMerger;

impl EndpointMerger for UnionMerger {
    fn recompute(&self, record: &mut GlobalDNS) {
        let status = record.status.get_or_insert_with(Default::default);
        let mut seen = BTreeSet::new();
        let endpoints = status
            .cluster_endpoints
            .iter()
            .flat_map(|clusters| clusters.values())
            .flatten()
            .filter(|endpoint| seen.insert(endpoint.as_str()))
            .cloned()
            .collect();
        status.endpoints = Some(endpoints);
    }
}

/// GlobalDNS is namespaced, a key or record without a namespace cannot be addressed.
fn record_namespace<'a>(name: &str, namespace: Option<&'a str>) -> Result<&'a str> {
    namespace.ok_or_else(|| ReconcileError::MissingNamespace { name: name.to_string() })
}

pub(crate) fn display_key(record: &GlobalDNS) -> String {
    match record.namespace() {
        Some(ns) => format!("{ns}/{}", record.name_any()),
        None => record.name_any(),
    }
}

/// Reads and writes cluster state through the Kubernetes API.
#[derive(Clone)]
pub struct KubeCluster {
    client: kube::Client,
}

impl KubeCluster {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MultiClusterAppLookup for KubeCluster {
    async fn get_multi_cluster_app(&self, namespace: &str, name: &str) -> Result<MultiClusterApp> {
        let api = Api::<MultiClusterApp>::namespaced(self.client.clone(), namespace);
        match api.get_opt(name).await {
            Ok(Some(app)) => Ok(app),
            Ok(None) => Err(ReconcileError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
            Err(source) => Err(ReconcileError::Lookup {
                namespace: namespace.to_string(),
                name: name.to_string(),
                source,
            }),
        }
    }
}

#[async_trait]
impl IngressLister for KubeCluster {
    async fn list_ingresses(&self, namespace: &str, params: &ListParams) -> Result<Vec<Ingress>> {
        let ingresses = Api::<Ingress>::namespaced(self.client.clone(), namespace)
            .list(params)
            .await
            .map_err(|source| ReconcileError::List {
                kind: "ingresses",
                source,
            })?;
        Ok(ingresses.items)
    }
}

#[async_trait]
impl NamespaceLister for KubeCluster {
    async fn list_namespaces(&self, params: &ListParams) -> Result<Vec<Namespace>> {
        let namespaces = Api::<Namespace>::all(self.client.clone())
            .list(params)
            .await
            .map_err(|source| ReconcileError::List {
                kind: "namespaces",
                source,
            })?;
        Ok(namespaces.items)
    }
}

#[async_trait]
impl GlobalDnsStore for KubeCluster {
    async fn get_record(&self, key: &ObjectRef<GlobalDNS>) -> Result<Option<GlobalDNS>> {
        let ns = record_namespace(&key.name, key.namespace.as_deref())?;
        let api = Api::<GlobalDNS>::namespaced(self.client.clone(), ns);
        Ok(api.get_opt(&key.name).await?)
    }

    async fn update_record(&self, record: &GlobalDNS) -> Result<GlobalDNS> {
        let name = record.name_any();
        let ns = record_namespace(&name, record.metadata.namespace.as_deref())?;
        let api = Api::<GlobalDNS>::namespaced(self.client.clone(), ns);
        let body = serde_json::to_vec(record).map_err(kube::Error::SerdeError)?;
        api.replace_status(&name, &PostParams::default(), body)
            .await
            .map_err(|source| match source {
                kube::Error::Api(ref response) if response.code == 409 => ReconcileError::Conflict {
                    key: display_key(record),
                    source,
                },
                source => ReconcileError::Write {
                    key: display_key(record),
                    source,
                },
            })
    }
}
