mod pod_ext;
mod selector;

pub use pod_ext::*;
pub use selector::*;

use crate::prelude::*;

pub trait KubeResourceExt {
    fn namespaced_name(&self) -> String;
}

impl<T: kube::Resource> KubeResourceExt for T {
    fn namespaced_name(&self) -> String {
        match self.namespace() {
            Some(ns) => format!("{}/{}", ns, self.name_any()),
            None => self.name_any().clone(),
        }
    }
}

pub trait PodExt {
    fn is_ready(&self) -> bool;
}

#[cfg(test)]
mod tests;
