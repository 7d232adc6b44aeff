use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("SerializationError: {0}")]
    SerializationError(#[source] serde_json::Error),

    #[error("YamlError: {0}")]
    YamlError(#[source] serde_yaml::Error),

    #[error("Kube Error: {0}")]
    KubeError(#[source] kube::Error),

    #[error("Kubeconfig Error: {0}")]
    KubeconfigError(#[source] kube::config::KubeconfigError),

    #[error("InferConfigError: {0}")]
    InferConfigError(#[source] kube::config::InferConfigError),

    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("no contender found for application {namespace}/{name}")]
    ContenderNotFound { namespace: String, name: String },

    #[error("release {namespace}/{name} has no {label} label")]
    MissingAppLabel {
        namespace: String,
        name: String,
        label: &'static str,
    },

    #[error("InvalidParameters: {0}")]
    InvalidParameters(String),

    #[error("{}", .0.join(", "))]
    Aggregate(Vec<String>),
}
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Whether the error came from the resource store rather than from a decision
    pub fn is_io(&self) -> bool {
        matches!(self, Error::KubeError(_) | Error::NotFound { .. })
    }
}

/// Log integrations
pub mod telemetry;
