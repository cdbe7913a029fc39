use crate::constants::{DOCKER_IMAGE_KIND, IMAGE_STREAM_IMAGE_KIND, IMAGE_STREAM_TAG_KIND};
use crate::error::{self, Result};
use crate::meta::named;
use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::core::TypeMeta;
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};
use std::collections::BTreeMap;

/// The schema version of [`DockerImage`] metadata stored on an [`Image`].
pub const DOCKER_IMAGE_METADATA_VERSION: &str = "1.0";

/// A digest with a one layer image behind it, useful for mappings that must name a real-looking
/// image.
pub const BASE_IMAGE_WITH_1_LAYER_DIGEST: &str =
    "sha256:77371f61c054608a4bb1a96b99f9be69f0868340f5c924ecd8813172f7cf853d";

/// An image stream maps tags to images. The `CustomResource` derive produces the `ImageStream`
/// struct which represents the object in the `image.openshift.io/v1` API.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "image.openshift.io",
    kind = "ImageStream",
    namespaced,
    plural = "imagestreams",
    singular = "imagestream",
    status = "ImageStreamStatus",
    version = "v1",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ImageStreamSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_policy: Option<ImageLookupPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_image_repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<TagReference>>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLookupPolicy {
    #[serde(default)]
    pub local: bool,
}

/// A tag in the spec of an image stream, pointing at another tag, image or external image.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagReference {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ObjectReference>,
    #[serde(default)]
    pub reference: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_policy: Option<TagImportPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_policy: Option<TagReferencePolicy>,
}

impl TagReference {
    /// A tag reference whose source is another tag of the same stream.
    pub fn from_tag(tag: &str) -> Self {
        Self {
            from: Some(ObjectReference {
                kind: Some(IMAGE_STREAM_TAG_KIND.to_string()),
                name: Some(tag.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// A tag reference pulling an external image by pull spec.
    pub fn from_docker_image(pull_spec: &str) -> Self {
        Self {
            from: Some(ObjectReference {
                kind: Some(DOCKER_IMAGE_KIND.to_string()),
                name: Some(pull_spec.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// The name of the object this tag points at, if any.
    pub fn from_name(&self) -> Option<&str> {
        self.from.as_ref().and_then(|from| from.name.as_deref())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagImportPolicy {
    #[serde(default)]
    pub insecure: bool,
    #[serde(default)]
    pub scheduled: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct TagReferencePolicy {
    #[serde(rename = "type", default)]
    pub type_: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStreamStatus {
    #[serde(default)]
    pub docker_image_repository: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_docker_image_repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<NamedTagEventList>>,
}

/// The history of images a tag has pointed at, newest first.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedTagEventList {
    pub tag: String,
    #[serde(default)]
    pub items: Option<Vec<TagEvent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<TagEventCondition>>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<Time>,
    #[serde(default)]
    pub docker_image_reference: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub generation: i64,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagEventCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub generation: i64,
}

impl ImageStream {
    /// Finds the spec tag named `tag`.
    pub fn spec_tag(&self, tag: &str) -> Option<&TagReference> {
        self.spec
            .tags
            .as_ref()
            .and_then(|tags| tags.iter().find(|t| t.name == tag))
    }

    /// Replaces the spec tag with the same name as `tag`, or appends `tag` if there is none.
    pub fn upsert_spec_tag(&mut self, tag: TagReference) {
        let tags = self.spec.tags.get_or_insert_with(Vec::new);
        match tags.iter_mut().find(|t| t.name == tag.name) {
            Some(existing) => *existing = tag,
            None => tags.push(tag),
        }
    }

    pub fn remove_spec_tag(&mut self, tag: &str) -> Option<TagReference> {
        let tags = self.spec.tags.as_mut()?;
        let index = tags.iter().position(|t| t.name == tag)?;
        Some(tags.remove(index))
    }

    /// Finds the status history for `tag`.
    pub fn status_tag(&self, tag: &str) -> Option<&NamedTagEventList> {
        self.status
            .as_ref()
            .and_then(|status| status.tags.as_ref())
            .and_then(|tags| tags.iter().find(|t| t.tag == tag))
    }
}

/// An immutable image known to the cluster, named by its digest.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_image_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_image_metadata: Option<DockerImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_image_metadata_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_image_manifest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_image_layers: Option<Vec<ImageLayer>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_image_manifest_media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_image_config: Option<String>,
}

openshift_object!(
    Image,
    group = "image.openshift.io",
    version = "v1",
    kind = "Image",
    plural = "images",
    scope = ClusterResourceScope,
);

impl Image {
    pub fn new(name: &str) -> Self {
        Self {
            types: Some(Self::type_meta()),
            metadata: named(name),
            ..Default::default()
        }
    }

    pub fn with_reference(name: &str, docker_image_reference: &str) -> Self {
        Self {
            docker_image_reference: Some(docker_image_reference.to_string()),
            ..Self::new(name)
        }
    }

    /// Attaches docker metadata, stamping the schema version the server expects.
    pub fn with_metadata(mut self, metadata: DockerImage) -> Self {
        self.docker_image_metadata = Some(metadata);
        self.docker_image_metadata_version = Some(DOCKER_IMAGE_METADATA_VERSION.to_string());
        self
    }

    pub fn docker_image_reference(&self) -> &str {
        self.docker_image_reference.as_deref().unwrap_or("")
    }

    /// Returns `true` if the server stored or returned the image's raw config.
    pub fn has_docker_image_config(&self) -> bool {
        self.docker_image_config
            .as_ref()
            .map(|config| !config.is_empty())
            .unwrap_or(false)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLayer {
    pub name: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub media_type: String,
}

/// Docker image metadata in the `1.0` schema. Field names are capitalized on the wire.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DockerImage {
    #[serde(rename = "kind", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "apiVersion", default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_config: Option<DockerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<DockerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}

impl DockerImage {
    pub fn with_config(config: DockerConfig) -> Self {
        Self {
            kind: Some(DOCKER_IMAGE_KIND.to_string()),
            api_version: Some(DOCKER_IMAGE_METADATA_VERSION.to_string()),
            config: Some(config),
            ..Default::default()
        }
    }
}

/// The runtime configuration of a docker image.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DockerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domainname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

impl DockerConfig {
    /// The JSON form stored in `Image.dockerImageConfig`.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self).context(error::JsonSerializationSnafu {
            what: "docker image config",
        })?)
    }
}

/// Records that `tag` of the stream named in the metadata points at `image`. Creating a mapping
/// creates the image if it does not exist yet; an existing image is never modified.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStreamMapping {
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub image: Image,
    #[serde(default)]
    pub tag: String,
}

openshift_object!(
    ImageStreamMapping,
    group = "image.openshift.io",
    version = "v1",
    kind = "ImageStreamMapping",
    plural = "imagestreammappings",
    scope = NamespaceResourceScope,
);

impl ImageStreamMapping {
    pub fn new(stream: &str, tag: &str, image: Image) -> Self {
        Self {
            types: Some(Self::type_meta()),
            metadata: named(stream),
            image,
            tag: tag.to_string(),
        }
    }
}

/// A single tag of an image stream, named `<stream>:<tag>`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStreamTag {
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<TagReference>,
    #[serde(default)]
    pub generation: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_policy: Option<ImageLookupPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<TagEventCondition>>,
    #[serde(default)]
    pub image: Image,
}

openshift_object!(
    ImageStreamTag,
    group = "image.openshift.io",
    version = "v1",
    kind = "ImageStreamTag",
    plural = "imagestreamtags",
    scope = NamespaceResourceScope,
);

impl ImageStreamTag {
    /// An image stream tag for `stream:tag` with the given spec tag.
    pub fn new(stream: &str, tag: &str, reference: TagReference) -> Self {
        Self {
            types: Some(Self::type_meta()),
            metadata: named(&join_image_stream_tag(stream, tag)),
            tag: Some(reference),
            ..Default::default()
        }
    }
}

/// An image as seen through an image stream, named `<stream>@<digest>`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStreamImage {
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub image: Image,
}

openshift_object!(
    ImageStreamImage,
    group = "image.openshift.io",
    version = "v1",
    kind = "ImageStreamImage",
    plural = "imagestreamimages",
    scope = NamespaceResourceScope,
);

/// Joins a stream name and tag into an image stream tag name.
pub fn join_image_stream_tag(stream: &str, tag: &str) -> String {
    format!("{}:{}", stream, tag)
}

/// Splits an image stream tag name into stream name and tag.
pub fn split_image_stream_tag(name: &str) -> Result<(&str, &str)> {
    let (stream, tag) = name
        .split_once(':')
        .filter(|(stream, tag)| !stream.is_empty() && !tag.is_empty() && !tag.contains(':'))
        .context(error::InvalidNameSnafu {
            kind: IMAGE_STREAM_TAG_KIND,
            name,
            expected: "<stream>:<tag>",
        })?;
    Ok((stream, tag))
}

/// Joins a stream name and image digest into an image stream image name.
pub fn join_image_stream_image(stream: &str, id: &str) -> String {
    format!("{}@{}", stream, id)
}

/// Splits an image stream image name into stream name and image digest.
pub fn split_image_stream_image(name: &str) -> Result<(&str, &str)> {
    let (stream, id) = name
        .split_once('@')
        .filter(|(stream, id)| !stream.is_empty() && !id.is_empty())
        .context(error::InvalidNameSnafu {
            kind: IMAGE_STREAM_IMAGE_KIND,
            name,
            expected: "<stream>@<digest>",
        })?;
    Ok((stream, id))
}
