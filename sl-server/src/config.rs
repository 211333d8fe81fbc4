use std::collections::HashMap;
use std::fs::File;

use serde::{
    Deserialize,
    Serialize,
};

fn default_namespace() -> String {
    "default".into()
}

// One entry per cluster this server may stream from.  With no kubeconfig path the in-cluster /
// environment config is used, which is the common single-cluster deployment.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    pub kubeconfig_path: Option<String>,
    pub context: Option<String>,

    // Where this cluster's managed deployments live when the request doesn't say otherwise
    #[serde(default = "default_namespace")]
    pub default_namespace: String,
}

// What a bearer token is allowed to see.  `clusters: None` grants view on every configured
// cluster; an explicit list restricts it.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrants {
    pub user: String,
    pub clusters: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default)]
    pub clusters: HashMap<String, ClusterConfig>,

    #[serde(default)]
    pub tokens: HashMap<String, TokenGrants>,
}

impl ServerConfig {
    pub fn load(filename: &str) -> anyhow::Result<ServerConfig> {
        Ok(serde_yaml::from_reader(File::open(filename)?)?)
    }
}
