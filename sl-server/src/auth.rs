use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{
    header,
    HeaderMap,
};
use thiserror::Error;

use crate::config::ServerConfig;

// The caller's identity as presented on the stream request: the same bearer token the REST API
// uses, taken from the Authorization header or (for browser websocket clients, which can't set
// headers) the `token` query parameter.
#[derive(Clone, Debug, Default)]
pub struct Identity {
    pub token: Option<String>,
}

impl Identity {
    pub fn from_parts(headers: &HeaderMap, query_token: Option<&str>) -> Identity {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string)
            .or_else(|| query_token.map(str::to_string));
        Identity { token }
    }
}

// The two refusals a stream request can get; both are terminal (one error frame, then close).
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("cluster not found: {0}")]
    NotFound(String),

    #[error("access denied: cannot view cluster {0}")]
    Denied(String),
}

// Answers "may this identity view this cluster"; never partially authorizes.  The rest of the
// control plane owns users/organizations/memberships, so the server's own impl is config-backed.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize_view(&self, identity: &Identity, cluster: &str) -> Result<(), AuthError>;
}

pub struct StaticAuthorizer {
    config: Arc<ServerConfig>,
}

impl StaticAuthorizer {
    pub fn new(config: Arc<ServerConfig>) -> StaticAuthorizer {
        StaticAuthorizer { config }
    }
}

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn authorize_view(&self, identity: &Identity, cluster: &str) -> Result<(), AuthError> {
        if !self.config.clusters.contains_key(cluster) {
            return Err(AuthError::NotFound(cluster.into()));
        }

        let grants = identity
            .token
            .as_ref()
            .and_then(|token| self.config.tokens.get(token))
            .ok_or_else(|| AuthError::Denied(cluster.into()))?;

        match &grants.clusters {
            None => Ok(()),
            Some(allowed) if allowed.iter().any(|c| c == cluster) => Ok(()),
            Some(_) => Err(AuthError::Denied(cluster.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    fn test_config() -> Arc<ServerConfig> {
        let config_yml = "
---
clusters:
  k1: {}
  k2: {}
tokens:
  alice-token:
    user: alice
    clusters:
      - k1
  bob-token:
    user: bob
";
        Arc::new(serde_yaml::from_str(config_yml).unwrap())
    }

    fn bearer(token: &str) -> Identity {
        Identity { token: Some(token.into()) }
    }

    #[rstest]
    #[case::granted_cluster("alice-token", "k1", true)]
    #[case::ungranted_cluster("alice-token", "k2", false)]
    #[case::all_clusters("bob-token", "k2", true)]
    #[case::unknown_token("eve-token", "k1", false)]
    #[tokio::test]
    async fn test_authorize_view(#[case] token: &str, #[case] cluster: &str, #[case] allowed: bool) {
        let authorizer = StaticAuthorizer::new(test_config());
        let res = authorizer.authorize_view(&bearer(token), cluster).await;
        assert_eq!(res.is_ok(), allowed);
        if !allowed {
            assert!(matches!(res, Err(AuthError::Denied(_))));
        }
    }

    #[rstest]
    #[tokio::test]
    async fn test_unknown_cluster_is_not_found() {
        let authorizer = StaticAuthorizer::new(test_config());
        let res = authorizer.authorize_view(&bearer("alice-token"), "nope").await;
        assert!(matches!(res, Err(AuthError::NotFound(_))));
    }

    #[rstest]
    #[tokio::test]
    async fn test_anonymous_is_denied() {
        let authorizer = StaticAuthorizer::new(test_config());
        let res = authorizer.authorize_view(&Identity::default(), "k1").await;
        assert!(matches!(res, Err(AuthError::Denied(_))));
    }

    #[rstest]
    fn test_identity_prefers_header_over_query() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer header-token".parse().unwrap());
        let identity = Identity::from_parts(&headers, Some("query-token"));
        assert_eq!(identity.token.as_deref(), Some("header-token"));

        let identity = Identity::from_parts(&HeaderMap::new(), Some("query-token"));
        assert_eq!(identity.token.as_deref(), Some("query-token"));
    }
}
