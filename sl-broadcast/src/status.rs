use async_trait::async_trait;
use sl_core::prelude::*;
use tracing::*;

#[cfg(test)]
use mockall::automock;

// The deployment service owns deployment status; when a pod view changes the group nudges it to
// re-reconcile so the dashboard's status column catches up.  The service itself lives in the rest
// of the control plane, so all the core knows is this interface.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StatusSync: Send + Sync {
    async fn sync_deployment_status(&self, cluster: &str, namespace: &str, deployment: &str) -> EmptyResult;
}

// Stand-in used when the core runs without the rest of the control plane wired up.
pub struct LogOnlyStatusSync;

#[async_trait]
impl StatusSync for LogOnlyStatusSync {
    async fn sync_deployment_status(&self, cluster: &str, namespace: &str, deployment: &str) -> EmptyResult {
        debug!("deployment status re-sync requested for {cluster}/{namespace}/{deployment}");
        Ok(())
    }
}
