use crate::constants::{
    ANNOTATION_DESCRIPTION, ANNOTATION_DISPLAY_NAME, ANNOTATION_NODE_SELECTOR,
    PROJECT_PHASE_TERMINATING,
};
use crate::meta::named;
use crate::ObjectExt;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::TypeMeta;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// An OpenShift project. Every project is backed by a namespace of the same name and every
/// namespace the caller may see is listed as a project. The `CustomResource` derive produces the
/// `Project` struct which represents the object in the `project.openshift.io/v1` API.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "project.openshift.io",
    kind = "Project",
    plural = "projects",
    singular = "project",
    status = "ProjectStatus",
    version = "v1",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    /// Finalizers of the backing namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalizers: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatus {
    /// `Active` or `Terminating`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl Project {
    /// A project carrying the given annotations.
    pub fn with_annotations<I, K, V>(name: &str, annotations: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut project = Project::new(name, ProjectSpec::default());
        project.metadata.annotations = Some(
            annotations
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        project
    }

    pub fn display_name(&self) -> Option<&str> {
        self.annotation(ANNOTATION_DISPLAY_NAME)
    }

    pub fn node_selector(&self) -> Option<&str> {
        self.annotation(ANNOTATION_NODE_SELECTOR)
    }

    /// Returns `true` while the backing namespace is being torn down.
    pub fn is_terminating(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|status| status.phase.as_deref())
            == Some(PROJECT_PHASE_TERMINATING)
    }
}

/// A request to self-provision a project. The server answers with the created [`Project`].
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRequest {
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

openshift_object!(
    ProjectRequest,
    group = "project.openshift.io",
    version = "v1",
    kind = "ProjectRequest",
    plural = "projectrequests",
    scope = ClusterResourceScope,
);

impl ProjectRequest {
    pub fn new(name: &str) -> Self {
        Self {
            types: Some(Self::type_meta()),
            metadata: named(name),
            ..Default::default()
        }
    }
}

/// Reads the display name and description annotations a project request turns into.
pub fn project_annotations(metadata: &ObjectMeta) -> (Option<&str>, Option<&str>) {
    let lookup = |key: &str| {
        metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(key))
            .map(String::as_str)
    };
    (lookup(ANNOTATION_DISPLAY_NAME), lookup(ANNOTATION_DESCRIPTION))
}
