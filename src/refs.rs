//! Parsing of the `clusterID:projectID` composite identifiers used by GlobalDNS project lists and
//! multi-cluster app targets.

use crate::error::{
    ReconcileError,
    Result,
};
use std::{
    fmt,
    str::FromStr,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRef {
    pub cluster: String,
    pub project: String,
}

impl ProjectRef {
    pub fn in_cluster(&self, cluster: &str) -> bool {
        self.cluster == cluster
    }
}

impl FromStr for ProjectRef {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self> {
        let (cluster, project) = split_pair(s)?;
        Ok(ProjectRef {
            cluster: cluster.to_string(),
            project: project.to_string(),
        })
    }
}

impl fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.cluster, self.project)
    }
}

/// Name of the multi-cluster app referenced by a GlobalDNS. Accepts `name` or `namespace:name`.
pub fn multi_cluster_app_name(reference: &str) -> Result<&str> {
    if !reference.contains(':') {
        return Ok(reference);
    }
    let (_, name) = split_pair(reference)?;
    Ok(name)
}

/// Project ids compare case-insensitively. They are label values and therefore ASCII.
pub fn same_project(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn split_pair(s: &str) -> Result<(&str, &str)> {
    let mut parts = s.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(first), Some(second), None) if !first.is_empty() && !second.is_empty() => Ok((first, second)),
        _ => Err(ReconcileError::malformed(s)),
    }
}
