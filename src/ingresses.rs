use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt as _;

/// Endpoints reported in an ingress' load balancer status, in status order.
///
/// An entry contributes its IP when set, otherwise its hostname. Entries with neither are skipped.
pub fn load_balancer_endpoints(ingress: &Ingress) -> Vec<String> {
    let Some(entries) = ingress
        .status
        .as_ref()
        .and_then(|status| status.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
    else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let ip = entry.ip.as_deref().filter(|ip| !ip.is_empty());
            let hostname = entry.hostname.as_deref().filter(|hostname| !hostname.is_empty());
            ip.or(hostname).map(str::to_string)
        })
        .collect()
}

/// True if the ingress is annotated to be published under `fqdn`.
pub fn targets_fqdn(ingress: &Ingress, annotation: &str, fqdn: &str) -> bool {
    ingress.annotations().get(annotation).map(String::as_str) == Some(fqdn)
}

/// Collects the endpoints of every ingress annotated with `fqdn`.
///
/// Order follows the ingress order and then the status order. Duplicates are kept.
pub fn endpoints_for_fqdn<'a>(
    ingresses: impl IntoIterator<Item = &'a Ingress>,
    annotation: &str,
    fqdn: &str,
) -> Vec<String> {
    let mut endpoints = Vec::new();
    for ingress in ingresses {
        if !targets_fqdn(ingress, annotation, fqdn) {
            continue;
        }
        let found = load_balancer_endpoints(ingress);
        trace!(
            ingress = %ingress.name_any(),
            namespace = ?ingress.namespace(),
            ?found,
            "ingress endpoints"
        );
        endpoints.extend(found);
    }
    endpoints
}
