use super::*;
use crate::prelude::*;

const READY_CONDITION: &str = "Ready";

impl PodExt for corev1::Pod {
    // A pod is ready iff its Ready condition is True; a pod with no status or no conditions has
    // simply not gotten that far yet.
    fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.conditions.as_ref())
            .map(|conds| conds.iter().any(|c| c.type_ == READY_CONDITION && c.status == "True"))
            .unwrap_or(false)
    }
}
