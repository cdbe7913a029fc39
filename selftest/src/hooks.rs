use crate::poll::retry_on_conflict;
use k8s_openapi::api::core::v1::ReplicationController;
use kube::Client;
use log::info;
use model::apps::LifecycleHook;
use model::clients::{self, AllowNotFound, ObjectClient};
use model::{split_image_stream_tag, ImageStreamTag, TagReference};
use snafu::{OptionExt, ResultExt, Snafu};

pub type Result<T> = std::result::Result<T, HookError>;

#[derive(Debug, Snafu)]
pub enum HookError {
    #[snafu(display(
        "Unable to find container '{}' in replication controller '{}'",
        container,
        rc
    ))]
    UnknownContainer { container: String, rc: String },

    #[snafu(display("Invalid tag image target: {}", source))]
    InvalidTarget { source: model::Error },

    #[snafu(display("Unable to tag image into '{}': {}", target, source))]
    TagUpdate {
        target: String,
        source: clients::Error,
    },
}

/// One resolved tag-images action: point `stream:tag` in `namespace` at `image`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TagAction {
    pub namespace: String,
    pub stream: String,
    pub tag: String,
    pub image: String,
}

/// Runs the image tagging part of deployment lifecycle hooks.
pub struct HookExecutor {
    client: Client,
}

impl HookExecutor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Tags the image of each named container of `rc` into the hook's target image stream tags.
    /// Targets without a namespace use the namespace of `rc`. Missing streams and tags are created.
    pub async fn execute(&self, hook: &LifecycleHook, rc: &ReplicationController) -> Result<()> {
        for action in resolve_tag_actions(hook, rc)? {
            self.tag_image(&action).await?;
            info!(
                "tagged {}/{}:{} as {}",
                action.namespace, action.stream, action.tag, action.image
            );
        }
        Ok(())
    }

    async fn tag_image(&self, action: &TagAction) -> Result<()> {
        let target = format!("{}/{}:{}", action.namespace, action.stream, action.tag);
        let tags =
            &ObjectClient::<ImageStreamTag>::namespaced(self.client.clone(), &action.namespace);
        let name = &model::join_image_stream_tag(&action.stream, &action.tag);
        retry_on_conflict(&target, move || async move {
            match tags.get(name).await.allow_not_found()? {
                Some(mut existing) => {
                    existing.tag = Some(tag_reference(action));
                    tags.replace(&existing).await
                }
                None => {
                    let mut new_tag =
                        ImageStreamTag::new(&action.stream, &action.tag, tag_reference(action));
                    new_tag.metadata.namespace = Some(action.namespace.clone());
                    tags.create(&new_tag).await
                }
            }
        })
        .await
        .context(TagUpdateSnafu { target })?;
        Ok(())
    }
}

fn tag_reference(action: &TagAction) -> TagReference {
    TagReference {
        name: action.tag.clone(),
        ..TagReference::from_docker_image(&action.image)
    }
}

/// Resolves the hook's tag-images actions against the containers of `rc`.
pub fn resolve_tag_actions(
    hook: &LifecycleHook,
    rc: &ReplicationController,
) -> Result<Vec<TagAction>> {
    let rc_name = rc.metadata.name.as_deref().unwrap_or_default();
    let rc_namespace = rc.metadata.namespace.as_deref().unwrap_or_default();
    let containers = rc
        .spec
        .as_ref()
        .and_then(|spec| spec.template.as_ref())
        .and_then(|template| template.spec.as_ref())
        .map(|pod| pod.containers.as_slice())
        .unwrap_or_default();

    hook.tag_images
        .iter()
        .flatten()
        .map(|action| -> Result<TagAction> {
            let image = containers
                .iter()
                .find(|c| c.name == action.container_name)
                .and_then(|c| c.image.clone())
                .context(UnknownContainerSnafu {
                    container: &action.container_name,
                    rc: rc_name,
                })?;
            let to_name = action.to.name.as_deref().unwrap_or_default();
            let (stream, tag) = split_image_stream_tag(to_name).context(InvalidTargetSnafu)?;
            let namespace = action
                .to
                .namespace
                .as_deref()
                .filter(|ns| !ns.is_empty())
                .unwrap_or(rc_namespace);
            Ok(TagAction {
                namespace: namespace.to_string(),
                stream: stream.to_string(),
                tag: tag.to_string(),
                image,
            })
        })
        .collect()
}
