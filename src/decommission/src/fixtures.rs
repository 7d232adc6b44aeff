//! Helper methods only available for tests
use crate::model::{
    Application, ApplicationSpec, Release, ReleaseSpec, APP_LABEL, RELEASE_CLUSTERS_ANNOTATION,
    RELEASE_GENERATION_ANNOTATION,
};
use crate::store::ReleaseStore;
use controller_core::{Error, Result};

use assert_json_diff::assert_json_include;
use async_trait::async_trait;
use http::{Request, Response};
use hyper::{body::to_bytes, Body};
use kube::{Client, ResourceExt};
use serde_json::json;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

pub struct ReleaseBuilder {
    release: Release,
}

/// A release with no labels or annotations
pub fn release(namespace: &str, name: &str) -> ReleaseBuilder {
    let mut release = Release::new(name, ReleaseSpec::default());
    release.metadata.namespace = Some(namespace.to_string());
    ReleaseBuilder { release }
}

impl ReleaseBuilder {
    pub fn app(mut self, app: &str) -> Self {
        self.release
            .labels_mut()
            .insert(APP_LABEL.to_string(), app.to_string());
        self
    }

    pub fn generation(mut self, generation: i64) -> Self {
        self.release
            .annotations_mut()
            .insert(RELEASE_GENERATION_ANNOTATION.to_string(), generation.to_string());
        self
    }

    pub fn clusters(mut self, record: &str) -> Self {
        self.release
            .annotations_mut()
            .insert(RELEASE_CLUSTERS_ANNOTATION.to_string(), record.to_string());
        self
    }

    pub fn build(self) -> Release {
        self.release
    }
}

pub fn application(namespace: &str, name: &str) -> Application {
    let mut app = Application::new(name, ApplicationSpec::default());
    app.metadata.namespace = Some(namespace.to_string());
    app
}

/// Counts of store calls, for assertions
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OperationCounts {
    pub lists: usize,
    pub gets: usize,
    pub updates: usize,
    pub deletes: usize,
}

#[derive(Default)]
struct MemoryState {
    namespaces: BTreeSet<String>,
    releases: Vec<Release>,
    applications: Vec<Application>,
    failing_namespaces: bool,
    failing_lists: HashSet<String>,
    failing_updates: HashSet<String>,
    failing_deletes: HashSet<String>,
    operations: OperationCounts,
}

/// In-memory `ReleaseStore`; clones share state so tests can inspect it after a run
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

fn injected(what: &str, name: &str) -> Error {
    Error::InvalidParameters(format!("injected {what} failure for {name}"))
}

fn matches_selector(release: &Release, selector: &str) -> bool {
    selector
        .split(',')
        .filter_map(|requirement| requirement.split_once('='))
        .all(|(key, value)| release.labels().get(key.trim()).map(String::as_str) == Some(value.trim()))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_release(self, release: Release) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.namespaces.insert(release.namespace().unwrap());
            state.releases.push(release);
        }
        self
    }

    pub fn with_application(self, app: Application) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.namespaces.insert(app.namespace().unwrap());
            state.applications.push(app);
        }
        self
    }

    pub fn failing_namespaces(self) -> Self {
        self.state.lock().unwrap().failing_namespaces = true;
        self
    }

    /// Listing releases or applications of `namespace` fails
    pub fn failing_list(self, namespace: &str) -> Self {
        self.state.lock().unwrap().failing_lists.insert(namespace.to_string());
        self
    }

    pub fn failing_update(self, name: &str) -> Self {
        self.state.lock().unwrap().failing_updates.insert(name.to_string());
        self
    }

    pub fn failing_delete(self, name: &str) -> Self {
        self.state.lock().unwrap().failing_deletes.insert(name.to_string());
        self
    }

    /// All releases, ordered by namespace then name
    pub fn releases(&self) -> Vec<Release> {
        let mut releases = self.state.lock().unwrap().releases.clone();
        releases.sort_by_key(|release| release.reference());
        releases
    }

    pub fn release(&self, namespace: &str, name: &str) -> Option<Release> {
        self.state
            .lock()
            .unwrap()
            .releases
            .iter()
            .find(|release| release.namespace().as_deref() == Some(namespace) && release.name_any() == name)
            .cloned()
    }

    pub fn operation_counts(&self) -> OperationCounts {
        self.state.lock().unwrap().operations.clone()
    }

    pub fn reset_counts(&self) {
        self.state.lock().unwrap().operations = OperationCounts::default();
    }
}

#[async_trait]
impl ReleaseStore for MemoryStore {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        state.operations.lists += 1;
        if state.failing_namespaces {
            return Err(injected("namespace list", "cluster"));
        }
        Ok(state.namespaces.iter().cloned().collect())
    }

    async fn list_releases(&self, namespace: &str, label_selector: Option<&str>) -> Result<Vec<Release>> {
        let mut state = self.state.lock().unwrap();
        state.operations.lists += 1;
        if state.failing_lists.contains(namespace) {
            return Err(injected("list", namespace));
        }
        Ok(state
            .releases
            .iter()
            .filter(|release| release.namespace().as_deref() == Some(namespace))
            .filter(|release| label_selector.map_or(true, |selector| matches_selector(release, selector)))
            .cloned()
            .collect())
    }

    async fn get_application(&self, namespace: &str, name: &str) -> Result<Application> {
        let mut state = self.state.lock().unwrap();
        state.operations.gets += 1;
        state
            .applications
            .iter()
            .find(|app| app.namespace().as_deref() == Some(namespace) && app.name_any() == name)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: "application",
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn list_applications(&self, namespace: &str) -> Result<Vec<Application>> {
        let mut state = self.state.lock().unwrap();
        state.operations.lists += 1;
        if state.failing_lists.contains(namespace) {
            return Err(injected("list", namespace));
        }
        Ok(state
            .applications
            .iter()
            .filter(|app| app.namespace().as_deref() == Some(namespace))
            .cloned()
            .collect())
    }

    async fn update_release(&self, release: &Release) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.operations.updates += 1;
        let name = release.name_any();
        if state.failing_updates.contains(&name) {
            return Err(injected("update", &name));
        }
        let reference = release.reference();
        let Some(stored) = state
            .releases
            .iter_mut()
            .find(|stored| stored.reference() == reference)
        else {
            return Err(Error::NotFound {
                kind: "release",
                namespace: reference.namespace,
                name: reference.name,
            });
        };
        stored.metadata.annotations = release.metadata.annotations.clone();
        Ok(())
    }

    async fn delete_release(&self, namespace: &str, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.operations.deletes += 1;
        if state.failing_deletes.contains(name) {
            return Err(injected("delete", name));
        }
        let before = state.releases.len();
        state
            .releases
            .retain(|release| !(release.namespace().as_deref() == Some(namespace) && release.name_any() == name));
        if state.releases.len() == before {
            return Err(Error::NotFound {
                kind: "release",
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

// We wrap tower_test::mock::Handle
type ApiServerHandle = tower_test::mock::Handle<Request<Body>, Response<Body>>;
pub struct ApiServerVerifier(ApiServerHandle);

/// Scenarios we test for in ApiServerVerifier
pub enum Scenario {
    NamespaceList(Vec<String>),
    ReleaseList {
        namespace: String,
        label_selector: Option<String>,
        releases: Vec<Release>,
    },
    /// expects a merge patch of the release's annotations
    AnnotationPatch(Release),
    ReleaseDelete(Release),
    ApplicationMissing {
        namespace: String,
        name: String,
    },
}

pub async fn timeout_after_1s(handle: tokio::task::JoinHandle<()>) {
    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .expect("timeout on mock apiserver")
        .expect("scenario succeeded")
}

fn json_response(status: http::StatusCode, body: &serde_json::Value) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn releases_path(namespace: &str) -> String {
    format!("/apis/shipper.booking.com/v1alpha1/namespaces/{namespace}/releases")
}

impl ApiServerVerifier {
    /// A kube client talking to a verifier instead of an apiserver
    pub fn new() -> (Client, Self) {
        let (mock_service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
        let client = Client::new(mock_service, "default");
        (client, Self(handle))
    }

    /// Tests only get to run specific scenarios that has matching handlers
    ///
    /// NB: If the test is calling more than one request, the scenario must
    /// handle all of them or the client call will hang.
    pub fn run(self, scenario: Scenario) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            match scenario {
                Scenario::NamespaceList(names) => self.handle_namespace_list(names).await,
                Scenario::ReleaseList {
                    namespace,
                    label_selector,
                    releases,
                } => self.handle_release_list(namespace, label_selector, releases).await,
                Scenario::AnnotationPatch(release) => self.handle_annotation_patch(release).await,
                Scenario::ReleaseDelete(release) => self.handle_release_delete(release).await,
                Scenario::ApplicationMissing { namespace, name } => {
                    self.handle_application_missing(namespace, name).await
                }
            }
        })
    }

    async fn handle_namespace_list(mut self, names: Vec<String>) {
        let (request, send) = self.0.next_request().await.expect("service not called");
        assert_eq!(request.method(), http::Method::GET);
        assert_eq!(request.uri().path(), "/api/v1/namespaces");
        let items: Vec<_> = names
            .iter()
            .map(|name| json!({ "apiVersion": "v1", "kind": "Namespace", "metadata": { "name": name } }))
            .collect();
        let list = json!({
            "apiVersion": "v1",
            "kind": "NamespaceList",
            "metadata": {},
            "items": items,
        });
        send.send_response(json_response(http::StatusCode::OK, &list));
    }

    async fn handle_release_list(mut self, namespace: String, label_selector: Option<String>, releases: Vec<Release>) {
        let (request, send) = self.0.next_request().await.expect("service not called");
        assert_eq!(request.method(), http::Method::GET);
        assert_eq!(request.uri().path(), releases_path(&namespace));
        let query = request.uri().query().unwrap_or_default().to_string();
        if let Some(label_selector) = label_selector {
            let encoded = label_selector.replace('=', "%3D");
            assert!(query.contains(&format!("labelSelector={encoded}")), "query: {query}");
        } else {
            assert!(!query.contains("labelSelector"), "query: {query}");
        }
        let list = json!({
            "apiVersion": "shipper.booking.com/v1alpha1",
            "kind": "ReleaseList",
            "metadata": {},
            "items": releases,
        });
        send.send_response(json_response(http::StatusCode::OK, &list));
    }

    async fn handle_annotation_patch(mut self, release: Release) {
        let (request, send) = self.0.next_request().await.expect("service not called");
        assert_eq!(request.method(), http::Method::PATCH);
        assert_eq!(
            request.uri().path(),
            format!("{}/{}", releases_path(&release.namespace().unwrap()), release.name_any())
        );
        assert_eq!(
            request.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "application/merge-patch+json"
        );
        let req_body = to_bytes(request.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&req_body).expect("patch object is json");
        let expected = json!({
            "metadata": {
                "annotations": release.annotations(),
                "resourceVersion": release.resource_version(),
            }
        });
        assert_json_include!(actual: body, expected: expected);
        let response = serde_json::to_value(&release).unwrap();
        send.send_response(json_response(http::StatusCode::OK, &response));
    }

    async fn handle_release_delete(mut self, release: Release) {
        let (request, send) = self.0.next_request().await.expect("service not called");
        assert_eq!(request.method(), http::Method::DELETE);
        assert_eq!(
            request.uri().path(),
            format!("{}/{}", releases_path(&release.namespace().unwrap()), release.name_any())
        );
        let response = serde_json::to_value(&release).unwrap();
        send.send_response(json_response(http::StatusCode::OK, &response));
    }

    async fn handle_application_missing(mut self, namespace: String, name: String) {
        let (request, send) = self.0.next_request().await.expect("service not called");
        assert_eq!(request.method(), http::Method::GET);
        assert_eq!(
            request.uri().path(),
            format!("/apis/shipper.booking.com/v1alpha1/namespaces/{namespace}/applications/{name}")
        );
        let status = json!({
            "apiVersion": "v1",
            "kind": "Status",
            "metadata": {},
            "status": "Failure",
            "message": format!("applications.shipper.booking.com \"{name}\" not found"),
            "reason": "NotFound",
            "code": 404,
        });
        send.send_response(json_response(http::StatusCode::NOT_FOUND, &status));
    }
}

#[cfg(test)]
mod tests {
    use super::{application, release, MemoryStore};
    use crate::store::ReleaseStore;

    #[tokio::test]
    async fn memory_store_filters_by_label_selector() {
        let store = MemoryStore::new()
            .with_application(application("web", "frontend"))
            .with_release(release("web", "frontend-0").app("frontend").build())
            .with_release(release("web", "backend-0").app("backend").build())
            .with_release(release("api", "frontend-0").app("frontend").build());
        let releases = store
            .list_releases("web", Some("shipper-app=frontend"))
            .await
            .unwrap();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].reference().to_string(), "web/frontend-0");
        assert_eq!(store.list_namespaces().await.unwrap(), vec!["api", "web"]);
    }

    #[tokio::test]
    async fn memory_store_failure_injection() {
        let store = MemoryStore::new()
            .with_release(release("web", "frontend-0").build())
            .failing_delete("frontend-0");
        assert!(store.delete_release("web", "frontend-0").await.is_err());
        assert_eq!(store.releases().len(), 1);
        assert_eq!(store.operation_counts().deletes, 1);
    }
}
