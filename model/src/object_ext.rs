use crate::error::{self, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Serialize;
use snafu::ResultExt;

/// Provides some conveniences for querying a `kube-rs` object.
pub trait ObjectExt {
    /// Returns this objects `ObjectMeta` information (i.e. the `metadata` field).
    fn object_meta(&self) -> &ObjectMeta;

    /// Returns the object.metadata.name field, unwrapping a potential `None` with `""`. In
    /// practice, an object's name cannot be missing once the server has accepted it, so we do
    /// away with the `Option` for convenience. This is named `object_name` to avoid confusion with
    /// `ResourceExt`.
    fn object_name(&self) -> &str {
        self.object_meta().name.as_deref().unwrap_or("")
    }

    /// Returns the object.metadata.resourceVersion field or `""`.
    fn object_resource_version(&self) -> &str {
        self.object_meta().resource_version.as_deref().unwrap_or("")
    }

    /// Returns the object.metadata.uid field or `""`.
    fn object_uid(&self) -> &str {
        self.object_meta().uid.as_deref().unwrap_or("")
    }

    /// Looks up a single annotation.
    fn annotation(&self, key: &str) -> Option<&str> {
        self.object_meta()
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(key))
            .map(String::as_str)
    }

    /// Returns this object's YAML representation as a String.
    fn to_yaml(&self) -> Result<String>;
}

impl<K> ObjectExt for K
where
    K: kube::Resource + Serialize,
{
    fn object_meta(&self) -> &ObjectMeta {
        self.meta()
    }

    fn to_yaml(&self) -> Result<String> {
        Ok(
            serde_yaml::to_string(self).context(error::YamlSerializationSnafu {
                what: self.object_name().to_string(),
            })?,
        )
    }
}
