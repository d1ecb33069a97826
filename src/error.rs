use thiserror::Error;

/// Errors raised while deciding where to place a single pod.
///
/// Every variant except [`SchedulerError::Startup`] is caught at the
/// orchestrator boundary, logged, and causes that event to be skipped —
/// none of these ever abort the watch loop itself.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("stateful set {name} not found in namespace {namespace}")]
    StatefulSetNotFound { name: String, namespace: String },

    #[error("pod name {0:?} does not end in a numeric ordinal")]
    OrdinalUnparseable(String),

    #[error("no nodes survived scheduling for pod {pod}: {reason}")]
    UnschedulableNodes { pod: String, reason: String },

    /// Never propagated: a term naming an unsupported topology key or
    /// match operator is logged at this variant's `Display` and the term
    /// is treated as not-applying (pod affinity) or unsatisfiable (node
    /// affinity), not as a reason to abort the decision.
    #[error("misconfigured affinity rule: {0}")]
    MisconfiguredAffinity(String),

    #[error("volumes could not be allocated for pod {pod}: {reason}")]
    UnschedulableVolumes { pod: String, reason: String },

    #[error("API call failed after {attempts} attempts: {source}")]
    Transient {
        attempts: u32,
        #[source]
        source: kube::Error,
    },

    #[error("orchestrator API error: {0}")]
    Api(#[from] kube::Error),

    #[error("pod watch stream error: {0}")]
    Watch(String),

    #[error("startup failed: {0}")]
    Startup(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
