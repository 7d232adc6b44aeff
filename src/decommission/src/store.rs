use crate::model::{Application, Release};
use controller_core::{Error, Result};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    api::{Api, DeleteParams, ListParams, Patch, PatchParams, ResourceExt},
    client::Client,
};
use serde_json::{json, Map, Value};
use tracing::debug;

/// Access to the releases and applications of the management cluster.
///
/// Calls are made one at a time; implementations must be Send + Sync so the
/// store can sit behind an `Arc` in the run context.
#[async_trait]
pub trait ReleaseStore: Send + Sync {
    async fn list_namespaces(&self) -> Result<Vec<String>>;

    /// Releases of `namespace`, optionally narrowed by a label selector such as `shipper-app=frontend`
    async fn list_releases(&self, namespace: &str, label_selector: Option<&str>) -> Result<Vec<Release>>;

    async fn get_application(&self, namespace: &str, name: &str) -> Result<Application>;

    async fn list_applications(&self, namespace: &str) -> Result<Vec<Application>>;

    /// Persists the annotations of `release`
    async fn update_release(&self, release: &Release) -> Result<()>;

    async fn delete_release(&self, namespace: &str, name: &str) -> Result<()>;
}

/// `ReleaseStore` backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn releases(&self, namespace: &str) -> Api<Release> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn applications(&self, namespace: &str) -> Api<Application> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Merge patch carrying the annotations of `release`.
///
/// The resource version rides along so that a concurrent change makes the
/// write fail instead of being silently overwritten.
fn annotations_patch(release: &Release) -> Value {
    let mut metadata = Map::new();
    metadata.insert("annotations".to_string(), json!(release.annotations()));
    if let Some(resource_version) = release.resource_version() {
        metadata.insert("resourceVersion".to_string(), Value::String(resource_version));
    }
    json!({ "metadata": metadata })
}

#[async_trait]
impl ReleaseStore for KubeStore {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let namespaces = namespaces
            .list(&ListParams::default())
            .await
            .map_err(Error::KubeError)?;
        Ok(namespaces.items.iter().map(ResourceExt::name_any).collect())
    }

    async fn list_releases(&self, namespace: &str, label_selector: Option<&str>) -> Result<Vec<Release>> {
        let mut list_params = ListParams::default();
        if let Some(label_selector) = label_selector {
            list_params = list_params.labels(label_selector);
        }
        let releases = self
            .releases(namespace)
            .list(&list_params)
            .await
            .map_err(Error::KubeError)?;
        debug!("Listed {} releases in {}", releases.items.len(), namespace);
        Ok(releases.items)
    }

    async fn get_application(&self, namespace: &str, name: &str) -> Result<Application> {
        match self.applications(namespace).get(name).await {
            Ok(app) => Ok(app),
            Err(kube::Error::Api(err)) if err.code == 404 => Err(Error::NotFound {
                kind: "application",
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
            Err(err) => Err(Error::KubeError(err)),
        }
    }

    async fn list_applications(&self, namespace: &str) -> Result<Vec<Application>> {
        let apps = self
            .applications(namespace)
            .list(&ListParams::default())
            .await
            .map_err(Error::KubeError)?;
        Ok(apps.items)
    }

    async fn update_release(&self, release: &Release) -> Result<()> {
        let Some(namespace) = release.namespace() else {
            return Err(Error::InvalidParameters(format!(
                "release {} has no namespace",
                release.name_any()
            )));
        };
        let patch = Patch::Merge(annotations_patch(release));
        self.releases(&namespace)
            .patch(&release.name_any(), &PatchParams::default(), &patch)
            .await
            .map_err(Error::KubeError)?;
        Ok(())
    }

    async fn delete_release(&self, namespace: &str, name: &str) -> Result<()> {
        self.releases(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(Error::KubeError)?;
        Ok(())
    }
}
