/*!

This library provides typed models of the OpenShift API objects exercised by the integration
suites, and clients for working with them.

!*/

#![deny(
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::panicking_unwrap,
    clippy::unwrap_in_result,
    clippy::unwrap_used
)]

#[macro_use]
mod meta;

pub use apps::{
    DeploymentConfig, DeploymentConfigSpec, DeploymentConfigStatus, DeploymentStrategy,
    DeploymentStrategyType, DeploymentTriggerPolicy, DeploymentTriggerType, LifecycleHook,
    LifecycleHookFailurePolicy, RollingDeploymentStrategyParams, TagImageHook,
};
pub use authorization::{
    Action, ResourceAccessReview, ResourceAccessReviewResponse, RESOURCE_ACCESS_REVIEW_PATH,
};
pub use error::{Error, Result};
pub use image::{
    join_image_stream_image, join_image_stream_tag, split_image_stream_image,
    split_image_stream_tag, DockerConfig, DockerImage, Image, ImageStream, ImageStreamImage,
    ImageStreamMapping, ImageStreamSpec, ImageStreamStatus, ImageStreamTag, TagReference,
};
pub use oauth::{GrantHandlerType, OAuthAccessToken, OAuthClient};
pub use object_ext::ObjectExt;
pub use project::{project_annotations, Project, ProjectRequest, ProjectSpec, ProjectStatus};
pub use user::{Group, User};

pub mod apps;
mod authorization;
pub mod clients;
pub mod constants;
mod error;
pub mod image;
mod oauth;
mod object_ext;
mod project;
mod user;
