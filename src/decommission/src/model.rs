use kube::{CustomResource, ResourceExt};
use schemars::{
    gen::SchemaGenerator,
    schema::{InstanceType, Schema, SchemaObject},
    JsonSchema,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Label tying a release to the application that owns it
pub static APP_LABEL: &str = "shipper-app";
/// Comma-joined, sorted list of the clusters a release is scheduled on
pub static RELEASE_CLUSTERS_ANNOTATION: &str = "shipper.booking.com/release.clusters";
pub static RELEASE_GENERATION_ANNOTATION: &str = "shipper.booking.com/release.generation";

fn preserve_unknown_fields(_: &mut SchemaGenerator) -> Schema {
    let mut schema = SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        ..Default::default()
    };
    schema
        .extensions
        .insert("x-kubernetes-preserve-unknown-fields".to_string(), true.into());
    Schema::Object(schema)
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegionRequirement {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regions: Option<Vec<RegionRequirement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<String>>,
}

/// Chart, values and strategy a release rolls out, as authored on the application
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    #[serde(default)]
    pub cluster_requirements: ClusterRequirements,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub chart: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub values: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub strategy: Option<serde_json::Value>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub ty: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A single rollout of an application onto a set of clusters.
///
/// Which clusters it landed on is recorded in the `RELEASE_CLUSTERS_ANNOTATION`
/// annotation and its position in the application's history in
/// `RELEASE_GENERATION_ANNOTATION`.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[kube(
    kind = "Release",
    group = "shipper.booking.com",
    version = "v1alpha1",
    namespaced
)]
#[kube(status = "ReleaseStatus", shortname = "rel")]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSpec {
    #[serde(default)]
    pub target_step: i32,
    #[serde(default)]
    pub environment: Environment,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AchievedStep {
    pub step: i32,
    pub name: String,
}

/// The status object of `Release`
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achieved_step: Option<AchievedStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
}

/// An application owns a history of releases, one of which is its contender.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[kube(
    kind = "Application",
    group = "shipper.booking.com",
    version = "v1alpha1",
    namespaced
)]
#[kube(status = "ApplicationStatus", shortname = "app")]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_history_limit: Option<i32>,
    #[serde(default)]
    pub template: Environment,
}

/// The status object of `Application`
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatus {
    /// Names of the application's releases, oldest first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
}

/// Namespace and name of a release, as reported by the audit commands
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct OutputRelease {
    pub namespace: String,
    pub name: String,
}

impl fmt::Display for OutputRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Splits a scheduling record into cluster names, dropping blanks and duplicates.
pub fn parse_clusters(record: &str) -> BTreeSet<String> {
    record
        .split(',')
        .map(str::trim)
        .filter(|cluster| !cluster.is_empty())
        .map(str::to_string)
        .collect()
}

impl Release {
    pub fn app_name(&self) -> Option<&str> {
        self.labels().get(APP_LABEL).map(String::as_str)
    }

    /// `None` when the annotation is missing or not an integer
    pub fn generation(&self) -> Option<i64> {
        self.annotations()
            .get(RELEASE_GENERATION_ANNOTATION)
            .and_then(|generation| generation.trim().parse().ok())
    }

    /// Raw value of the scheduling record
    pub fn recorded_clusters(&self) -> Option<&str> {
        self.annotations()
            .get(RELEASE_CLUSTERS_ANNOTATION)
            .map(String::as_str)
    }

    pub fn selected_clusters(&self) -> BTreeSet<String> {
        self.recorded_clusters().map(parse_clusters).unwrap_or_default()
    }

    pub fn set_recorded_clusters(&mut self, record: String) {
        self.annotations_mut()
            .insert(RELEASE_CLUSTERS_ANNOTATION.to_string(), record);
    }

    pub fn reference(&self) -> OutputRelease {
        OutputRelease {
            namespace: self.namespace().unwrap_or_default(),
            name: self.name_any(),
        }
    }
}
