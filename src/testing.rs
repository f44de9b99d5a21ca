//! In-memory collaborators and fixtures shared by the unit tests.

use crate::{
    cluster::{
        display_key,
        EndpointMerger,
        GlobalDnsStore,
        IngressLister,
        MultiClusterAppLookup,
        NamespaceLister,
        UnionMerger,
    },
    error::{
        ReconcileError,
        Result,
    },
    reconcile::{
        Collaborators,
        Reconciler,
        Settings,
    },
    resources::{
        GlobalDNS,
        GlobalDNSSpec,
        MultiClusterApp,
        MultiClusterAppSpec,
        Target,
        DEFAULT_GLOBAL_NAMESPACE,
        DEFAULT_HOSTNAME_ANNOTATION,
        DEFAULT_PROJECT_LABEL,
    },
};
use async_trait::async_trait;
use k8s_openapi::api::{
    core::v1::Namespace,
    networking::v1::{
        Ingress,
        IngressLoadBalancerIngress,
        IngressLoadBalancerStatus,
        IngressStatus,
    },
};
use kube::{
    api::{
        ListParams,
        ObjectMeta,
    },
    runtime::reflector::ObjectRef,
    ResourceExt as _,
};
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{
            AtomicBool,
            AtomicUsize,
            Ordering,
        },
        Arc,
        Mutex,
    },
};

pub(crate) const CLUSTER: &str = "c1";
pub(crate) const ANNOTATION: &str = DEFAULT_HOSTNAME_ANNOTATION;

pub(crate) fn api_error(code: u16) -> kube::Error {
    kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("injected failure {code}"),
        reason: "Injected".to_string(),
        code,
    })
}

pub(crate) fn record(name: &str, fqdn: &str, app: Option<&str>, projects: Option<&[&str]>) -> GlobalDNS {
    let mut record = GlobalDNS::new(
        name,
        GlobalDNSSpec {
            fqdn: fqdn.to_string(),
            multi_cluster_app_name: app.map(str::to_string),
            project_names: projects.map(|projects| projects.iter().map(|p| p.to_string()).collect()),
        },
    );
    record.metadata.namespace = Some(DEFAULT_GLOBAL_NAMESPACE.to_string());
    record.metadata.resource_version = Some("1".to_string());
    record
}

pub(crate) fn app(name: &str, targets: &[(&str, &str)]) -> MultiClusterApp {
    let mut app = MultiClusterApp::new(
        name,
        MultiClusterAppSpec {
            targets: targets
                .iter()
                .map(|(project_name, app_name)| Target {
                    project_name: project_name.to_string(),
                    app_name: app_name.to_string(),
                })
                .collect(),
        },
    );
    app.metadata.namespace = Some(DEFAULT_GLOBAL_NAMESPACE.to_string());
    app
}

pub(crate) fn namespace(name: &str, project: Option<&str>) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: project.map(|project| BTreeMap::from([(DEFAULT_PROJECT_LABEL.to_string(), project.to_string())])),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// An ingress whose load balancer reports `endpoints`, as IPs where they parse and hostnames otherwise.
pub(crate) fn ingress(namespace: &str, name: &str, fqdn: Option<&str>, endpoints: &[&str]) -> Ingress {
    let entries = endpoints
        .iter()
        .map(|endpoint| {
            if endpoint.parse::<std::net::IpAddr>().is_ok() {
                IngressLoadBalancerIngress {
                    ip: Some(endpoint.to_string()),
                    ..Default::default()
                }
            } else {
                IngressLoadBalancerIngress {
                    hostname: Some(endpoint.to_string()),
                    ..Default::default()
                }
            }
        })
        .collect();
    Ingress {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            annotations: fqdn.map(|fqdn| BTreeMap::from([(ANNOTATION.to_string(), fqdn.to_string())])),
            ..Default::default()
        },
        status: Some(IngressStatus {
            load_balancer: Some(IngressLoadBalancerStatus { ingress: Some(entries) }),
        }),
        ..Default::default()
    }
}

#[derive(Default)]
pub(crate) struct FakeCluster {
    pub apps: Mutex<Vec<MultiClusterApp>>,
    pub namespaces: Mutex<Vec<Namespace>>,
    pub ingresses: Mutex<Vec<Ingress>>,
    pub records: Mutex<Vec<GlobalDNS>>,
    pub fail_namespace_list: AtomicBool,
    /// Listing ingresses in this namespace fails.
    pub fail_ingress_list_in: Mutex<Option<String>>,
    pub fail_app_lookup: AtomicBool,
    pub conflict_on_update: AtomicBool,
    pub fail_update: AtomicBool,
    /// Namespaces ingresses were listed in, in call order.
    pub listed: Mutex<Vec<String>>,
    pub writes: Mutex<Vec<GlobalDNS>>,
    pub merges: AtomicUsize,
    pub reads: AtomicUsize,
}

impl FakeCluster {
    pub fn add_ingress(&self, ingress: Ingress) {
        self.ingresses.lock().unwrap().push(ingress);
    }

    pub fn add_namespace(&self, namespace: Namespace) {
        self.namespaces.lock().unwrap().push(namespace);
    }

    pub fn add_app(&self, app: MultiClusterApp) {
        self.apps.lock().unwrap().push(app);
    }

    pub fn add_record(&self, record: GlobalDNS) {
        self.records.lock().unwrap().push(record);
    }

    pub fn stored(&self, name: &str) -> GlobalDNS {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|record| record.name_any() == name)
            .cloned()
            .expect("record is stored")
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn merge_count(&self) -> usize {
        self.merges.load(Ordering::SeqCst)
    }

    pub fn listed_namespaces(&self) -> Vec<String> {
        self.listed.lock().unwrap().clone()
    }
}

#[async_trait]
impl MultiClusterAppLookup for FakeCluster {
    async fn get_multi_cluster_app(&self, namespace: &str, name: &str) -> Result<MultiClusterApp> {
        if self.fail_app_lookup.load(Ordering::SeqCst) {
            return Err(ReconcileError::Lookup {
                namespace: namespace.to_string(),
                name: name.to_string(),
                source: api_error(503),
            });
        }
        self.apps
            .lock()
            .unwrap()
            .iter()
            .find(|app| app.namespace().as_deref() == Some(namespace) && app.name_any() == name)
            .cloned()
            .ok_or_else(|| ReconcileError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }
}

#[async_trait]
impl IngressLister for FakeCluster {
    async fn list_ingresses(&self, namespace: &str, _params: &ListParams) -> Result<Vec<Ingress>> {
        self.listed.lock().unwrap().push(namespace.to_string());
        if self.fail_ingress_list_in.lock().unwrap().as_deref() == Some(namespace) {
            return Err(ReconcileError::List {
                kind: "ingresses",
                source: api_error(500),
            });
        }
        Ok(self
            .ingresses
            .lock()
            .unwrap()
            .iter()
            .filter(|ingress| ingress.namespace().as_deref() == Some(namespace))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NamespaceLister for FakeCluster {
    async fn list_namespaces(&self, _params: &ListParams) -> Result<Vec<Namespace>> {
        if self.fail_namespace_list.load(Ordering::SeqCst) {
            return Err(ReconcileError::List {
                kind: "namespaces",
                source: api_error(500),
            });
        }
        Ok(self.namespaces.lock().unwrap().clone())
    }
}

#[async_trait]
impl GlobalDnsStore for FakeCluster {
    async fn get_record(&self, key: &ObjectRef<GlobalDNS>) -> Result<Option<GlobalDNS>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|record| record.name_any() == key.name && record.namespace() == key.namespace)
            .cloned())
    }

    async fn update_record(&self, record: &GlobalDNS) -> Result<GlobalDNS> {
        if self.conflict_on_update.load(Ordering::SeqCst) {
            return Err(ReconcileError::Conflict {
                key: display_key(record),
                source: api_error(409),
            });
        }
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(ReconcileError::Write {
                key: display_key(record),
                source: api_error(500),
            });
        }
        self.writes.lock().unwrap().push(record.clone());
        let mut records = self.records.lock().unwrap();
        records.retain(|stored| stored.name_any() != record.name_any());
        records.push(record.clone());
        Ok(record.clone())
    }
}

impl EndpointMerger for FakeCluster {
    fn recompute(&self, record: &mut GlobalDNS) {
        self.merges.fetch_add(1, Ordering::SeqCst);
        UnionMerger.recompute(record);
    }
}

pub(crate) fn settings() -> Settings {
    Settings::new(CLUSTER)
}

pub(crate) fn reconciler(cluster: &Arc<FakeCluster>) -> Reconciler {
    Reconciler::new(
        settings(),
        Collaborators {
            apps: cluster.clone(),
            ingresses: cluster.clone(),
            namespaces: cluster.clone(),
            store: cluster.clone(),
            merger: cluster.clone(),
        },
    )
}
