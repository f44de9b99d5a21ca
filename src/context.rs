use crate::reconcile::Reconciler;
use std::time::Duration;

/// Holds state shared by the controller's reconcile and error policy.
pub struct Context {
    pub reconciler: Reconciler,
    /// Requeue delay after a successful reconcile.
    pub resync_interval: Duration,
    /// Requeue delay after a failed reconcile.
    pub retry_interval: Duration,
}
