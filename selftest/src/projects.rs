use crate::poll::poll_immediate;
use crate::users::{client_for_user, UserClient};
use crate::Cluster;
use anyhow::{format_err, Context, Result};
use k8s_openapi::api::authorization::v1::{
    ResourceAttributes, SelfSubjectAccessReview, SelfSubjectAccessReviewSpec,
};
use kube::Resource;
use log::info;
use model::clients::{post_for, ObjectClient};
use model::{Project, ProjectRequest};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long a new project owner may wait for their permissions to show up.
const POLICY_TIMEOUT: Duration = Duration::from_secs(30);

/// How long `has_exactly_these_projects` waits for the listing to match.
const PROJECT_LIST_TIMEOUT: Duration = Duration::from_secs(10);

/// Requests the project `name` as `admin_user` (creating the user if needed), then waits until the
/// user may create pods in it. Returns the user's client.
pub async fn create_new_project(
    cluster: &Cluster,
    name: &str,
    admin_user: &str,
) -> Result<UserClient> {
    let user = client_for_user(cluster, admin_user).await?;
    let path = ProjectRequest::url_path(&(), None);
    let project: Project = post_for(&user.client, &path, &ProjectRequest::new(name))
        .await
        .with_context(|| format!("user '{}' unable to request project '{}'", admin_user, name))?;
    cluster.track(name);
    info!(
        "created project '{}' for '{}' (uid {})",
        name,
        admin_user,
        project.metadata.uid.as_deref().unwrap_or_default()
    );
    wait_for_policy_update(&user, name, "create", "pods").await?;
    Ok(user)
}

/// Polls self subject access reviews until `user` may `verb` the `resource` in `namespace`.
pub async fn wait_for_policy_update(
    user: &UserClient,
    namespace: &str,
    verb: &str,
    resource: &str,
) -> Result<()> {
    let reviews = ObjectClient::<SelfSubjectAccessReview>::cluster(user.client.clone());
    let review = SelfSubjectAccessReview {
        spec: SelfSubjectAccessReviewSpec {
            resource_attributes: Some(ResourceAttributes {
                namespace: Some(namespace.to_string()),
                verb: Some(verb.to_string()),
                resource: Some(resource.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        },
        ..Default::default()
    };
    let (reviews, review) = (&reviews, &review);
    poll_immediate(POLL_INTERVAL, POLICY_TIMEOUT, move || async move {
        let response = reviews.create(review).await?;
        Ok::<_, model::clients::Error>(response.status.map_or(false, |status| status.allowed))
    })
    .await
    .with_context(|| {
        format!(
            "user '{}' never allowed to {} {} in '{}'",
            user.username(),
            verb,
            resource,
            namespace
        )
    })
}

/// Polls until the projects visible through `projects` are exactly `expected`.
pub async fn has_exactly_these_projects<I, S>(
    projects: &ObjectClient<Project>,
    expected: I,
) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let expected: BTreeSet<String> = expected.into_iter().map(Into::into).collect();
    let last_mismatch = &RefCell::new(None);
    let expected_ref = &expected;
    let result = poll_immediate(POLL_INTERVAL, PROJECT_LIST_TIMEOUT, move || async move {
        let actual = project_names(&projects.list().await?);
        if &actual == expected_ref {
            return Ok(true);
        }
        *last_mismatch.borrow_mut() =
            Some(format!("expected {:?}, got {:?}", expected_ref, actual));
        Ok::<_, model::clients::Error>(false)
    })
    .await;
    result.map_err(|e| {
        format_err!(
            "has_exactly_these_projects failed with {} and {}",
            e,
            last_mismatch.borrow().as_deref().unwrap_or("no listing")
        )
    })
}

/// The names of `projects` as a set.
pub fn project_names(projects: &[Project]) -> BTreeSet<String> {
    projects
        .iter()
        .filter_map(|project| project.metadata.name.clone())
        .collect()
}
