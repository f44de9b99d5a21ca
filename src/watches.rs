//! Maps changes of related objects back to the GlobalDNS records that need another reconcile.

use crate::{
    ingresses::load_balancer_endpoints,
    reconcile::Settings,
    refs::{
        multi_cluster_app_name,
        ProjectRef,
    },
    resources::{
        GlobalDNS,
        MultiClusterApp,
        ResolutionMode,
    },
};
use k8s_openapi::api::{
    core::v1::Namespace,
    networking::v1::Ingress,
};
use kube::{
    runtime::reflector::ObjectRef,
    ResourceExt as _,
};
use std::sync::Arc;

/// Records whose fqdn the ingress is annotated with, plus records that currently publish one of the ingress's
/// endpoints for this cluster. The second set catches an ingress whose annotation was removed or changed, since only
/// its new state is seen here.
pub fn records_for_ingress(
    records: &[Arc<GlobalDNS>],
    settings: &Settings,
    ingress: &Ingress,
) -> Vec<ObjectRef<GlobalDNS>> {
    let fqdn = ingress.annotations().get(&settings.hostname_annotation);
    let endpoints = load_balancer_endpoints(ingress);
    records
        .iter()
        .filter(|record| {
            fqdn.is_some_and(|fqdn| &record.spec.fqdn == fqdn)
                || record
                    .cluster_endpoints(&settings.cluster_name)
                    .iter()
                    .any(|published| endpoints.contains(published))
        })
        .map(|record| ObjectRef::from_obj(record.as_ref()))
        .collect()
}

/// Every project-scoped record listing a project of this cluster. The namespace's previous project label is not
/// known, so a relabel away from a project must requeue that project's records too.
pub fn records_for_namespace(
    records: &[Arc<GlobalDNS>],
    settings: &Settings,
    _namespace: &Namespace,
) -> Vec<ObjectRef<GlobalDNS>> {
    records
        .iter()
        .filter(|record| match record.spec.resolution_mode() {
            ResolutionMode::ProjectList(projects) => projects
                .iter()
                .filter_map(|reference| reference.parse::<ProjectRef>().ok())
                .any(|reference| reference.in_cluster(&settings.cluster_name)),
            _ => false,
        })
        .map(|record| ObjectRef::from_obj(record.as_ref()))
        .collect()
}

/// Records scoped to the multi-cluster app.
pub fn records_for_multi_cluster_app(
    records: &[Arc<GlobalDNS>],
    settings: &Settings,
    app: &MultiClusterApp,
) -> Vec<ObjectRef<GlobalDNS>> {
    if app.namespace().as_deref() != Some(settings.global_namespace.as_str()) {
        return Vec::new();
    }
    let name = app.name_any();
    records
        .iter()
        .filter(|record| match record.spec.resolution_mode() {
            ResolutionMode::MultiClusterApp(reference) => multi_cluster_app_name(reference).is_ok_and(|r| r == name),
            _ => false,
        })
        .map(|record| ObjectRef::from_obj(record.as_ref()))
        .collect()
}
