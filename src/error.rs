use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("malformed reference {reference:?}, expected two non-empty parts separated by ':'")]
    MalformedReference { reference: String },

    #[error("multi-cluster app {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    #[error("unable to look up multi-cluster app {namespace}/{name}: {source}")]
    Lookup {
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("unable to list {kind}: {source}")]
    List {
        kind: &'static str,
        #[source]
        source: kube::Error,
    },

    #[error("conflict updating GlobalDNS {key}: {source}")]
    Conflict {
        key: String,
        #[source]
        source: kube::Error,
    },

    #[error("unable to update GlobalDNS {key}: {source}")]
    Write {
        key: String,
        #[source]
        source: kube::Error,
    },

    #[error("GlobalDNS {name} has no namespace")]
    MissingNamespace { name: String },

    #[error(transparent)]
    Kube(#[from] kube::Error),
}

impl ReconcileError {
    pub fn malformed(reference: impl ToString) -> Self {
        ReconcileError::MalformedReference {
            reference: reference.to_string(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconcileError::Conflict { .. })
    }
}

pub type Result<T, E = ReconcileError> = std::result::Result<T, E>;
