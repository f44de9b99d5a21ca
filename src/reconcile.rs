use crate::{
    cluster::{
        display_key,
        EndpointMerger,
        GlobalDnsStore,
        IngressLister,
        KubeCluster,
        MultiClusterAppLookup,
        NamespaceLister,
        UnionMerger,
    },
    error::Result,
    ingresses::endpoints_for_fqdn,
    refs::{
        multi_cluster_app_name,
        same_project,
        ProjectRef,
    },
    resources::{
        GlobalDNS,
        ResolutionMode,
        DEFAULT_GLOBAL_NAMESPACE,
        DEFAULT_HOSTNAME_ANNOTATION,
        DEFAULT_PROJECT_LABEL,
    },
};
use k8s_openapi::api::networking::v1::Ingress;
use kube::{
    api::ListParams,
    runtime::reflector::ObjectRef,
    ResourceExt as _,
};
use std::{
    collections::HashMap,
    sync::Arc,
};
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Id of the cluster this controller runs in. Only its entry of `status.clusterEndpoints` is written.
    pub cluster_name: String,
    pub global_namespace: String,
    pub hostname_annotation: String,
    pub project_label: String,
}

impl Settings {
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            global_namespace: DEFAULT_GLOBAL_NAMESPACE.to_string(),
            hostname_annotation: DEFAULT_HOSTNAME_ANNOTATION.to_string(),
            project_label: DEFAULT_PROJECT_LABEL.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct Collaborators {
    pub apps: Arc<dyn MultiClusterAppLookup>,
    pub ingresses: Arc<dyn IngressLister>,
    pub namespaces: Arc<dyn NamespaceLister>,
    pub store: Arc<dyn GlobalDnsStore>,
    pub merger: Arc<dyn EndpointMerger>,
}

impl Collaborators {
    /// Everything backed by the Kubernetes API, merged with [`UnionMerger`].
    pub fn kube(client: kube::Client) -> Self {
        let cluster = Arc::new(KubeCluster::new(client));
        Self {
            apps: cluster.clone(),
            ingresses: cluster.clone(),
            namespaces: cluster.clone(),
            store: cluster,
            merger: Arc::new(UnionMerger),
        }
    }
}

/// Keeps this cluster's entry of GlobalDNS `status.clusterEndpoints` in line with the ingresses in scope.
pub struct Reconciler {
    settings: Settings,
    collaborators: Collaborators,
}

impl Reconciler {
    pub fn new(settings: Settings, collaborators: Collaborators) -> Self {
        Self {
            settings,
            collaborators,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Reconciles the record behind `key`. Returns the persisted record if this cluster's endpoints changed.
    ///
    /// A record that no longer exists is not an error.
    #[instrument(level = "debug", skip(self), fields(cluster = %self.settings.cluster_name))]
    pub async fn reconcile(&self, key: &ObjectRef<GlobalDNS>) -> Result<Option<GlobalDNS>> {
        let Some(record) = self.collaborators.store.get_record(key).await? else {
            debug!("GlobalDNS {key} is gone, nothing to do");
            return Ok(None);
        };
        self.sync(&record).await
    }

    /// Like [`Reconciler::reconcile`] for a record that was already read.
    pub async fn sync(&self, record: &GlobalDNS) -> Result<Option<GlobalDNS>> {
        let key = display_key(record);
        if record.is_deleted() {
            debug!("GlobalDNS {key} is being deleted, skipping");
            return Ok(None);
        }

        let ingresses = match record.spec.resolution_mode() {
            ResolutionMode::MultiClusterApp(reference) => self.ingresses_for_multi_cluster_app(reference).await?,
            ResolutionMode::ProjectList(projects) => self.ingresses_for_projects(projects).await?,
            ResolutionMode::None => {
                debug!("GlobalDNS {key} names neither a multi-cluster app nor projects, skipping");
                return Ok(None);
            }
        };

        let endpoints = endpoints_for_fqdn(&ingresses, &self.settings.hostname_annotation, &record.spec.fqdn);
        debug!(
            ingresses = ingresses.len(),
            ?endpoints,
            "endpoints for GlobalDNS {key} in cluster {}",
            self.settings.cluster_name
        );

        self.refresh_cluster_endpoints(record, endpoints).await
    }

    /// Ingresses in the namespaces of the app's targets that live in this cluster.
    async fn ingresses_for_multi_cluster_app(&self, reference: &str) -> Result<Vec<Ingress>> {
        let name = multi_cluster_app_name(reference)?;
        let app = self
            .collaborators
            .apps
            .get_multi_cluster_app(&self.settings.global_namespace, name)
            .await?;

        let mut app_namespaces = Vec::new();
        for target in &app.spec.targets {
            let project: ProjectRef = target.project_name.parse()?;
            if project.in_cluster(&self.settings.cluster_name) {
                app_namespaces.push(target.app_name.as_str());
            }
        }
        trace!(app = %app.name_any(), ?app_namespaces, "multi-cluster app targets in this cluster");

        let mut ingresses = Vec::new();
        for ns in app_namespaces {
            ingresses.extend(self.list_ingresses(ns).await?);
        }
        Ok(ingresses)
    }

    /// Ingresses in every namespace that belongs to one of the listed projects of this cluster.
    async fn ingresses_for_projects(&self, projects: &[String]) -> Result<Vec<Ingress>> {
        let namespaces = self
            .collaborators
            .namespaces
            .list_namespaces(&ListParams::default())
            .await?;

        let projects = projects
            .iter()
            .map(|project| project.parse::<ProjectRef>())
            .collect::<Result<Vec<_>>>()?;

        let mut ingresses = Vec::new();
        for project in projects {
            if !project.in_cluster(&self.settings.cluster_name) {
                continue;
            }
            let project_namespaces = namespaces.iter().filter(|ns| {
                ns.labels()
                    .get(&self.settings.project_label)
                    .is_some_and(|label| same_project(label, &project.project))
            });
            for ns in project_namespaces {
                ingresses.extend(self.list_ingresses(&ns.name_any()).await?);
            }
        }
        Ok(ingresses)
    }

    async fn list_ingresses(&self, ns: &str) -> Result<Vec<Ingress>> {
        self.collaborators
            .ingresses
            .list_ingresses(ns, &ListParams::default())
            .await
    }

    /// Writes `endpoints` as this cluster's contribution if they differ from what is stored.
    async fn refresh_cluster_endpoints(&self, record: &GlobalDNS, endpoints: Vec<String>) -> Result<Option<GlobalDNS>> {
        let cluster = &self.settings.cluster_name;
        let key = display_key(record);

        if !endpoints_differ(record.cluster_endpoints(cluster), &endpoints) {
            debug!("endpoints of GlobalDNS {key} in cluster {cluster} are up to date");
            return Ok(None);
        }

        let mut updated = record.clone();
        updated
            .status
            .get_or_insert_with(Default::default)
            .cluster_endpoints
            .get_or_insert_with(Default::default)
            .insert(cluster.clone(), endpoints.clone());
        self.collaborators.merger.recompute(&mut updated);

        info!(?endpoints, "updating endpoints of GlobalDNS {key} for cluster {cluster}");
        let persisted = self.collaborators.store.update_record(&updated).await?;
        Ok(Some(persisted))
    }
}

/// Two endpoint lists are the same if they hold the same values the same number of times, in any order.
pub fn endpoints_differ(stored: &[String], computed: &[String]) -> bool {
    if stored.len() != computed.len() {
        return true;
    }
    let mut counts: HashMap<&str, isize> = HashMap::new();
    for endpoint in stored {
        *counts.entry(endpoint.as_str()).or_default() += 1;
    }
    for endpoint in computed {
        *counts.entry(endpoint.as_str()).or_default() -= 1;
    }
    counts.values().any(|count| *count != 0)
}
