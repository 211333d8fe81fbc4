use std::fmt;

use sl_core::k8s::Selector;
use sl_core::prelude::*;

// A Subject is the identity of one live view: either "the pods of a managed deployment" or "the
// pods matching a label selector in some cluster/namespace".  Everything downstream (group
// registry key, informer key, pod predicate) derives from it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Subject {
    Deployment {
        cluster: String,
        namespace: String,
        name: String,
    },
    Selector {
        cluster: String,
        namespace: String,
        selector: Selector,
    },
}

impl Subject {
    pub fn cluster(&self) -> &str {
        match self {
            Subject::Deployment { cluster, .. } | Subject::Selector { cluster, .. } => cluster,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            Subject::Deployment { namespace, .. } | Subject::Selector { namespace, .. } => namespace,
        }
    }

    // The pod predicate MUST be deterministic: the same pod always gives the same answer for the
    // same subject, no matter which task asks.
    pub fn matches(&self, pod: &corev1::Pod) -> bool {
        match self {
            Subject::Deployment { name, .. } => pod.labels().get(DEPLOYMENT_LABEL_KEY) == Some(name),
            Subject::Selector { selector, .. } => selector.matches(pod.labels()),
        }
    }

    pub fn is_deployment(&self) -> bool {
        matches!(self, Subject::Deployment { .. })
    }
}

// The display form doubles as the broadcast-group map key, so it has to be injective: two
// different subjects must never render the same string.
impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Deployment { cluster, namespace, name } => {
                write!(f, "deployment/{cluster}/{namespace}/{name}")
            },
            Subject::Selector { cluster, namespace, selector } => {
                write!(f, "selector/{cluster}/{namespace}/{selector}")
            },
        }
    }
}
