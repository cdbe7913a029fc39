use serde::{Deserialize, Serialize};

/// The path resource access reviews are posted to.
pub const RESOURCE_ACCESS_REVIEW_PATH: &str =
    "/apis/authorization.openshift.io/v1/resourceaccessreviews";

/// Describes a request made against the API, as evaluated by the authorizer.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub verb: String,
    #[serde(default, rename = "resourceAPIGroup")]
    pub resource_api_group: String,
    #[serde(default, rename = "resourceAPIVersion")]
    pub resource_api_version: String,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub resource_name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default, rename = "isNonResourceURL")]
    pub is_non_resource_url: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
}

impl Action {
    pub fn new(namespace: &str, verb: &str, resource: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            verb: verb.to_string(),
            resource: resource.to_string(),
            ..Default::default()
        }
    }
}

/// Asks which users and groups may perform `action`. This is a virtual object: it is posted and
/// answered with a [`ResourceAccessReviewResponse`], never stored.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAccessReview {
    pub api_version: String,
    pub kind: String,
    #[serde(flatten)]
    pub action: Action,
}

impl ResourceAccessReview {
    pub fn new(action: Action) -> Self {
        Self {
            api_version: "authorization.openshift.io/v1".to_string(),
            kind: "ResourceAccessReview".to_string(),
            action,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAccessReviewResponse {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub users: Option<Vec<String>>,
    #[serde(default)]
    pub groups: Option<Vec<String>>,
    /// Errors the authorizer hit while resolving bindings, e.g. a binding to a missing role. The
    /// server spells the field `evalutionError`.
    #[serde(
        default,
        rename = "evalutionError",
        alias = "evaluationError",
        skip_serializing_if = "String::is_empty"
    )]
    pub evaluation_error: String,
}

impl ResourceAccessReviewResponse {
    pub fn users(&self) -> &[String] {
        self.users.as_deref().unwrap_or_default()
    }

    pub fn groups(&self) -> &[String] {
        self.groups.as_deref().unwrap_or_default()
    }
}
