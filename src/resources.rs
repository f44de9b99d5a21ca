use kube::CustomResource;
use schemars::JsonSchema;
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;

/// Namespace holding cluster-independent objects such as multi-cluster apps.
pub const DEFAULT_GLOBAL_NAMESPACE: &str = "global-data";

/// Ingress annotation naming the GlobalDNS fqdn the ingress should be published under.
pub const DEFAULT_HOSTNAME_ANNOTATION: &str = "globaldns.multicluster.io/hostname";

/// Namespace label naming the project the namespace belongs to.
pub const DEFAULT_PROJECT_LABEL: &str = "field.cattle.io/projectId";

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "globaldns.multicluster.io",
    version = "v1alpha1",
    kind = "GlobalDNS",
    shortname = "gdns",
    plural = "globaldnses",
    status = "GlobalDNSStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct GlobalDNSSpec {
    /// The fully qualified name to publish (e.g. app.example.com)
    pub fqdn: String,
    /// Multi-cluster app whose targets define the scope, as `name` or `namespace:name`.
    /// Takes precedence over `projectNames`.
    pub multi_cluster_app_name: Option<String>,
    /// Projects defining the scope, each as `clusterID:projectID`.
    pub project_names: Option<Vec<String>>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GlobalDNSStatus {
    /// Endpoints contributed by each cluster, keyed by cluster id.
    pub cluster_endpoints: Option<BTreeMap<String, Vec<String>>>,
    /// Merged endpoints of all clusters.
    pub endpoints: Option<Vec<String>>,
}

/// How a record selects the ingresses it publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMode<'a> {
    MultiClusterApp(&'a str),
    ProjectList(&'a [String]),
    None,
}

impl GlobalDNSSpec {
    pub fn resolution_mode(&self) -> ResolutionMode<'_> {
        match (self.multi_cluster_app_name.as_deref(), self.project_names.as_deref()) {
            (Some(app), _) if !app.is_empty() => ResolutionMode::MultiClusterApp(app),
            (_, Some(projects)) if !projects.is_empty() => ResolutionMode::ProjectList(projects),
            _ => ResolutionMode::None,
        }
    }
}

impl GlobalDNS {
    pub fn is_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Endpoints currently stored for `cluster`, empty if there are none.
    pub fn cluster_endpoints(&self, cluster: &str) -> &[String] {
        self.status
            .as_ref()
            .and_then(|status| status.cluster_endpoints.as_ref())
            .and_then(|endpoints| endpoints.get(cluster))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "globaldns.multicluster.io",
    version = "v1alpha1",
    kind = "MultiClusterApp",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MultiClusterAppSpec {
    #[serde(default)]
    pub targets: Vec<Target>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// Project the app is deployed into, as `clusterID:projectID`.
    pub project_name: String,
    /// Name of the app, which is also the namespace its workloads live in.
    pub app_name: String,
}
