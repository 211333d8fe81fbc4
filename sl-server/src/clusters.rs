use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use kube::config::{
    KubeConfigOptions,
    Kubeconfig,
};
use sl_broadcast::ClientSource;
use sl_core::errors::*;
use tracing::*;

use crate::config::{
    ClusterConfig,
    ServerConfig,
};

// Cluster name -> kube client, built on first use and cached for the life of the process.  The
// async lock is held across client construction, which is fine: construction happens once per
// cluster and everything after that is a map hit.
pub struct ClusterPool {
    config: Arc<ServerConfig>,
    clients: tokio::sync::Mutex<HashMap<String, kube::Client>>,
}

impl ClusterPool {
    pub fn new(config: Arc<ServerConfig>) -> ClusterPool {
        ClusterPool { config, clients: tokio::sync::Mutex::new(HashMap::new()) }
    }
}

#[async_trait]
impl ClientSource for ClusterPool {
    async fn client_for(&self, cluster: &str) -> anyhow::Result<kube::Client> {
        let Some(cluster_config) = self.config.clusters.get(cluster) else {
            bail!("no such cluster configured: {cluster}");
        };

        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(cluster) {
            return Ok(client.clone());
        }

        info!("building kube client for cluster {cluster}");
        let client = build_client(cluster_config).await?;
        clients.insert(cluster.into(), client.clone());
        Ok(client)
    }
}

async fn build_client(cluster_config: &ClusterConfig) -> anyhow::Result<kube::Client> {
    let kube_config = match &cluster_config.kubeconfig_path {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)?;
            let options = KubeConfigOptions {
                context: cluster_config.context.clone(),
                ..Default::default()
            };
            kube::Config::from_custom_kubeconfig(kubeconfig, &options).await?
        },
        None => kube::Config::infer().await?,
    };
    Ok(kube::Client::try_from(kube_config)?)
}
