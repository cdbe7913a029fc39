/// Implements `k8s_openapi::Resource` and `k8s_openapi::Metadata` for an OpenShift API object that
/// does not follow the `spec`/`status` layout expected by the `CustomResource` derive. `kube-rs`
/// provides `kube::Resource` for anything implementing these two traits.
///
/// The type must have a `metadata: ObjectMeta` field.
macro_rules! openshift_object {
    (
        $ty:ident,
        group = $group:literal,
        version = $version:literal,
        kind = $kind:literal,
        plural = $plural:literal,
        scope = $scope:ident $(,)?
    ) => {
        impl k8s_openapi::Resource for $ty {
            const API_VERSION: &'static str = concat!($group, "/", $version);
            const GROUP: &'static str = $group;
            const KIND: &'static str = $kind;
            const VERSION: &'static str = $version;
            const URL_PATH_SEGMENT: &'static str = $plural;
            type Scope = k8s_openapi::$scope;
        }

        impl k8s_openapi::Metadata for $ty {
            type Ty = k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

            fn metadata(&self) -> &Self::Ty {
                &self.metadata
            }

            fn metadata_mut(&mut self) -> &mut Self::Ty {
                &mut self.metadata
            }
        }

        impl $ty {
            /// The `apiVersion` and `kind` sent with this object.
            pub fn type_meta() -> kube::core::TypeMeta {
                kube::core::TypeMeta {
                    api_version: <Self as k8s_openapi::Resource>::API_VERSION.to_string(),
                    kind: <Self as k8s_openapi::Resource>::KIND.to_string(),
                }
            }
        }
    };
}

/// Creates `ObjectMeta` with only the name set.
pub(crate) fn named(name: &str) -> k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
    k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
        name: Some(name.to_string()),
        ..Default::default()
    }
}
