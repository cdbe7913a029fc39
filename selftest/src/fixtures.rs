use k8s_openapi::api::core::v1::{
    Container, PodSecurityContext, PodSpec, PodTemplateSpec, ResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use maplit::btreemap;
use model::apps::{
    DeploymentConfig, DeploymentConfigSpec, DeploymentStrategyType, DeploymentTriggerPolicy,
    RollingDeploymentStrategyParams,
};
use model::{ImageStream, ImageStreamSpec};

/// The name of the image stream returned by [`mock_image_stream`].
pub const MOCK_IMAGE_STREAM: &str = "test";

/// A deployment config with only the fields a client must provide: a selector and a template with
/// one container.
pub fn minimal_dc(name: &str, generation: i64) -> DeploymentConfig {
    let mut dc = DeploymentConfig::new(
        name,
        DeploymentConfigSpec {
            selector: Some(btreemap! { "app".to_string() => name.to_string() }),
            template: Some(PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(btreemap! { "app".to_string() => name.to_string() }),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: "a".to_string(),
                        image: Some(" ".to_string()),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            }),
            ..Default::default()
        },
    );
    dc.metadata.generation = (generation != 0).then_some(generation);
    dc
}

/// Applies the defaults the server fills into a [`minimal_dc`].
pub fn set_essential_defaults(dc: &mut DeploymentConfig) {
    let twenty_five_percent = IntOrString::String("25%".to_string());
    let strategy = &mut dc.spec.strategy;
    strategy.type_ = Some(DeploymentStrategyType::Rolling);
    strategy.rolling_params = Some(RollingDeploymentStrategyParams {
        interval_seconds: Some(1),
        update_period_seconds: Some(1),
        timeout_seconds: Some(600),
        max_unavailable: Some(twenty_five_percent.clone()),
        max_surge: Some(twenty_five_percent),
        ..Default::default()
    });
    strategy.resources = Some(ResourceRequirements::default());
    strategy.active_deadline_seconds = Some(21600);
    dc.spec.triggers = Some(vec![DeploymentTriggerPolicy::config_change()]);

    if let Some(pod) = dc
        .spec
        .template
        .as_mut()
        .and_then(|template| template.spec.as_mut())
    {
        if let Some(container) = pod.containers.first_mut() {
            container.termination_message_path = Some("/dev/termination-log".to_string());
            container.termination_message_policy = Some("File".to_string());
            container.image_pull_policy = Some("IfNotPresent".to_string());
            container.resources = Some(ResourceRequirements::default());
        }
        pod.security_context = Some(PodSecurityContext::default());
        pod.restart_policy = Some("Always".to_string());
        pod.termination_grace_period_seconds = Some(30);
        pod.dns_policy = Some("ClusterFirst".to_string());
        pod.host_network = None;
        pod.host_pid = None;
        pod.host_ipc = None;
        pod.scheduler_name = Some("default-scheduler".to_string());
    }
}

/// Clears the fields the server sets on every object so a created object can be compared with an
/// expected one.
pub fn clear_transient(dc: &mut DeploymentConfig) {
    let metadata = &mut dc.metadata;
    metadata.namespace = None;
    metadata.self_link = None;
    metadata.uid = None;
    metadata.resource_version = None;
    metadata.creation_timestamp = None;
    metadata.managed_fields = None;
    dc.status = None;
}

/// An empty image stream named [`MOCK_IMAGE_STREAM`].
pub fn mock_image_stream() -> ImageStream {
    ImageStream::new(MOCK_IMAGE_STREAM, ImageStreamSpec::default())
}
