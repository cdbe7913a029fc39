/// Helper macro to avoid retyping the base domain-like name used by OpenShift annotations. When
/// given no parameters, this returns the base name. When given a string literal parameter it adds
/// `/parameter` to the end.
macro_rules! openshift_io {
    () => {
        "openshift.io"
    };
    ($s:literal) => {
        concat!(openshift_io!(), "/", $s)
    };
}

// Annotation keys
pub const ANNOTATION_DISPLAY_NAME: &str = openshift_io!("display-name");
pub const ANNOTATION_DESCRIPTION: &str = openshift_io!("description");
pub const ANNOTATION_REQUESTER: &str = openshift_io!("requester");
pub const ANNOTATION_NODE_SELECTOR: &str = openshift_io!("node-selector");
/// Set to `"true"` on an image stream or image stream tag to have registries without an explicit
/// port resolved to port 80 when checked against the registry whitelist.
pub const ANNOTATION_INSECURE_REPOSITORY: &str = openshift_io!("image.insecureRepository");

// Subject kinds
pub const USER_KIND: &str = "User";
pub const GROUP_KIND: &str = "Group";
pub const SERVICE_ACCOUNT_KIND: &str = "ServiceAccount";

// Well known groups and namespaces
pub const CLUSTER_ADMIN_GROUP: &str = "system:cluster-admins";
pub const OPENSHIFT_NAMESPACE: &str = "openshift";
pub const OPENSHIFT_INFRA_NAMESPACE: &str = "openshift-infra";
pub const DEFAULT_NAMESPACE: &str = "default";

// Role kinds understood by the RBAC API
pub const ROLE_KIND: &str = "Role";
pub const CLUSTER_ROLE_KIND: &str = "ClusterRole";
pub const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

// Token scopes
pub const SCOPE_USER_FULL: &str = "user:full";
pub const SCOPE_USER_INFO: &str = "user:info";
pub const SCOPE_USER_LIST_PROJECTS: &str = "user:list-projects";
pub const SCOPE_USER_LIST_SCOPED_PROJECTS: &str = "user:list-scoped-projects";
pub const SCOPE_CLUSTER_ROLE_INDICATOR: &str = "role:";
pub const SCOPE_ALL_NAMESPACES: &str = "*";

// OAuth
pub const INTEGRATION_OAUTH_CLIENT: &str = "test-integration-client";
pub const OAUTH_TOKEN_REDIRECT_URI: &str = "https://localhost:8443/oauth/token/implicit";
pub const OAUTH_MIN_TOKEN_LENGTH: usize = 32;
pub const OAUTH_TOKEN_EXPIRES_IN: i64 = 86400;

// Project phases
pub const PROJECT_PHASE_ACTIVE: &str = "Active";
pub const PROJECT_PHASE_TERMINATING: &str = "Terminating";

// Image stream tag references
pub const IMAGE_STREAM_TAG_KIND: &str = "ImageStreamTag";
pub const IMAGE_STREAM_IMAGE_KIND: &str = "ImageStreamImage";
pub const DOCKER_IMAGE_KIND: &str = "DockerImage";

/// Builds a scope limiting a token to the permissions of the cluster role `role` within
/// `namespace`. Pass [`SCOPE_ALL_NAMESPACES`] to cover every namespace.
pub fn cluster_role_scope(role: &str, namespace: &str) -> String {
    format!("{}{}:{}", SCOPE_CLUSTER_ROLE_INDICATOR, role, namespace)
}

#[test]
fn openshift_io_constants_macro_test() {
    assert_eq!("openshift.io", openshift_io!());
    assert_eq!("openshift.io/display-name", ANNOTATION_DISPLAY_NAME);
    assert_eq!(
        "openshift.io/image.insecureRepository",
        ANNOTATION_INSECURE_REPOSITORY
    );
    assert_eq!("openshift.io/foo", openshift_io!("foo"));
}

#[test]
fn cluster_role_scope_test() {
    assert_eq!("role:view:one", cluster_role_scope("view", "one"));
    assert_eq!(
        "role:view:*",
        cluster_role_scope("view", SCOPE_ALL_NAMESPACES)
    );
}
