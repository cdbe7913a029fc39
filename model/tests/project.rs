#![cfg(feature = "integ")]
//! Projects and namespaces, project watches and project visibility. Each test uses its own users
//! and project names so the tests can share a cluster.

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::rbac::v1::ClusterRole;
use kube::api::{Api, DeleteParams, PostParams};
use kube::core::ObjectMeta;
use model::clients::{post_for, ObjectClient};
use model::constants::{
    cluster_role_scope, ANNOTATION_DISPLAY_NAME, ANNOTATION_NODE_SELECTOR, CLUSTER_ROLE_KIND,
    SCOPE_ALL_NAMESPACES, SCOPE_USER_LIST_SCOPED_PROJECTS,
};
use model::{
    Action, ObjectExt, Project, ResourceAccessReview, ResourceAccessReviewResponse,
    RESOURCE_ACCESS_REVIEW_PATH,
};
use selftest::projects::{create_new_project, has_exactly_these_projects, project_names};
use selftest::{
    client_for_user, poll_immediate, scoped_client_for_user, Cluster, RoleModification,
    WatchStart, Watcher,
};
use std::time::Duration;

fn projects_api(client: &kube::Client) -> Api<Project> {
    Api::all(client.clone())
}

#[tokio::test]
async fn project_is_namespace() {
    let cluster = Cluster::new().await.unwrap();
    let admin = cluster.admin_client();
    let projects = ObjectClient::<Project>::cluster(admin.clone());
    let namespaces = ObjectClient::<Namespace>::cluster(admin.clone());

    let namespace = cluster
        .create_namespace(&format!("{}-plain", Cluster::test_namespace()))
        .await
        .unwrap();
    let project = projects.get(namespace.object_name()).await.unwrap();
    assert_eq!(project.object_name(), namespace.object_name());

    let project = Project::with_annotations(
        "new-project",
        [
            (ANNOTATION_DISPLAY_NAME, "Hello World"),
            (ANNOTATION_NODE_SELECTOR, "env=test"),
        ],
    );
    let created = projects.create(&project).await.unwrap();
    cluster.track(created.object_name());
    let namespace = namespaces.get(created.object_name()).await.unwrap();
    assert_eq!(project.object_name(), namespace.object_name());
    assert_eq!(
        project.annotation(ANNOTATION_DISPLAY_NAME),
        namespace.annotation(ANNOTATION_DISPLAY_NAME)
    );
    assert_eq!(
        project.annotation(ANNOTATION_NODE_SELECTOR),
        namespace.annotation(ANNOTATION_NODE_SELECTOR)
    );

    cluster.cleanup().await.unwrap();
}

#[tokio::test]
async fn cleanup_keeps_existing_namespaces() {
    let cluster = Cluster::new().await.unwrap();
    let namespaces = ObjectClient::<Namespace>::cluster(cluster.admin_client());
    let name = format!("{}-preexisting", Cluster::test_namespace());

    // Created behind the harness's back, so it belongs to somebody else.
    let existing = Namespace {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            ..Default::default()
        },
        ..Default::default()
    };
    namespaces.create(&existing).await.unwrap();

    let returned = cluster.create_namespace(&name).await.unwrap();
    assert_eq!(returned.object_name(), name);
    cluster.cleanup().await.unwrap();

    let survivor = namespaces.get(&name).await.unwrap();
    assert!(survivor.metadata.deletion_timestamp.is_none(), "{:?}", survivor);

    namespaces.delete(&name).await.unwrap();
    namespaces
        .wait_for_deletion(&name, Duration::from_secs(120))
        .await
        .unwrap();
}

#[tokio::test]
async fn project_watch() {
    let cluster = Cluster::new().await.unwrap();
    let bob = client_for_user(&cluster, "watch-bob").await.unwrap();
    let bob_projects = projects_api(&bob.client);
    let mut watch = Watcher::start(&bob_projects, WatchStart::Now)
        .await
        .unwrap();

    create_new_project(&cluster, "watch-ns-01", "watch-bob")
        .await
        .unwrap();
    watch.wait_for_add("watch-ns-01").await.unwrap();

    // Access granted and revoked through a role binding shows up as add and delete.
    let joe = create_new_project(&cluster, "watch-ns-02", "watch-joe")
        .await
        .unwrap();
    let add_bob = RoleModification::namespaced("watch-ns-02", "edit")
        .role_kind(CLUSTER_ROLE_KIND)
        .users(["watch-bob"]);
    add_bob.add_role(&joe.client).await.unwrap();
    watch.wait_for_add("watch-ns-02").await.unwrap();
    add_bob.remove_role(&joe.client).await.unwrap();
    watch.wait_for_delete("watch-ns-02").await.unwrap();

    create_new_project(&cluster, "watch-ns-03", "watch-bob")
        .await
        .unwrap();
    watch.wait_for_add("watch-ns-03").await.unwrap();
    bob_projects
        .delete("watch-ns-03", &DeleteParams::default())
        .await
        .unwrap();
    watch.wait_for_delete("watch-ns-03").await.unwrap();

    let mut beginning = Watcher::start(&bob_projects, WatchStart::Beginning)
        .await
        .unwrap();
    beginning.wait_for_add("watch-ns-01").await.unwrap();

    let mut from_now = Watcher::start(&bob_projects, WatchStart::Now)
        .await
        .unwrap();
    from_now.wait_for_no_event("").await.unwrap();

    cluster.cleanup().await.unwrap();
}

#[tokio::test]
async fn project_watch_with_field_selector() {
    const SELECTOR: &str = "metadata.name=selector-ns-01";
    let cluster = Cluster::new().await.unwrap();
    let bob = client_for_user(&cluster, "selector-bob").await.unwrap();
    let bob_projects = projects_api(&bob.client);
    let mut watch = Watcher::start_with(&bob_projects, WatchStart::Now, Some(SELECTOR))
        .await
        .unwrap();

    create_new_project(&cluster, "selector-ns-01", "selector-bob")
        .await
        .unwrap();
    watch.wait_for_add("selector-ns-01").await.unwrap();

    // Only the selected project may produce events.
    create_new_project(&cluster, "selector-ns-03", "selector-bob")
        .await
        .unwrap();
    watch.wait_for_no_event("selector-ns-01").await.unwrap();
    bob_projects
        .delete("selector-ns-03", &DeleteParams::default())
        .await
        .unwrap();
    watch.wait_for_no_event("selector-ns-01").await.unwrap();

    let mut beginning = Watcher::start_with(&bob_projects, WatchStart::Beginning, Some(SELECTOR))
        .await
        .unwrap();
    beginning.wait_for_add("selector-ns-01").await.unwrap();

    let mut from_now = Watcher::start_with(&bob_projects, WatchStart::Now, Some(SELECTOR))
        .await
        .unwrap();
    from_now.wait_for_no_event("selector-ns-01").await.unwrap();

    cluster.cleanup().await.unwrap();
}

#[tokio::test]
async fn scoped_project_access() {
    const USER: &str = "scoped-bob";
    let cluster = Cluster::new().await.unwrap();
    let full_bob = client_for_user(&cluster, USER).await.unwrap();
    let scoped = |namespaces: &[&str]| {
        let mut scopes = vec![SCOPE_USER_LIST_SCOPED_PROJECTS.to_string()];
        scopes.extend(namespaces.iter().map(|ns| cluster_role_scope("view", ns)));
        scopes
    };
    let one_two = scoped_client_for_user(&cluster, USER, &scoped(&["scoped-one", "scoped-two"]))
        .await
        .unwrap();
    let two_three =
        scoped_client_for_user(&cluster, USER, &scoped(&["scoped-two", "scoped-three"]))
            .await
            .unwrap();
    let all = scoped_client_for_user(&cluster, USER, &scoped(&[SCOPE_ALL_NAMESPACES]))
        .await
        .unwrap();

    let mut one_two_watch = Watcher::start(&projects_api(&one_two.client), WatchStart::Now)
        .await
        .unwrap();
    let mut two_three_watch = Watcher::start(&projects_api(&two_three.client), WatchStart::Now)
        .await
        .unwrap();
    let mut all_watch = Watcher::start(&projects_api(&all.client), WatchStart::Now)
        .await
        .unwrap();

    create_new_project(&cluster, "scoped-one", USER).await.unwrap();
    all_watch.wait_for_only_add("scoped-one").await.unwrap();
    one_two_watch.wait_for_only_add("scoped-one").await.unwrap();

    create_new_project(&cluster, "scoped-two", USER).await.unwrap();
    all_watch.wait_for_only_add("scoped-two").await.unwrap();
    one_two_watch.wait_for_only_add("scoped-two").await.unwrap();
    two_three_watch.wait_for_only_add("scoped-two").await.unwrap();

    create_new_project(&cluster, "scoped-three", USER)
        .await
        .unwrap();
    all_watch.wait_for_only_add("scoped-three").await.unwrap();
    two_three_watch
        .wait_for_only_add("scoped-three")
        .await
        .unwrap();

    create_new_project(&cluster, "scoped-four", USER).await.unwrap();
    all_watch.wait_for_only_add("scoped-four").await.unwrap();

    has_exactly_these_projects(
        &ObjectClient::cluster(one_two.client.clone()),
        ["scoped-one", "scoped-two"],
    )
    .await
    .unwrap();
    has_exactly_these_projects(
        &ObjectClient::cluster(two_three.client.clone()),
        ["scoped-two", "scoped-three"],
    )
    .await
    .unwrap();
    has_exactly_these_projects(
        &ObjectClient::cluster(all.client.clone()),
        ["scoped-one", "scoped-two", "scoped-three", "scoped-four"],
    )
    .await
    .unwrap();

    let full_projects = ObjectClient::<Project>::cluster(full_bob.client.clone());
    full_projects.delete("scoped-four").await.unwrap();
    all_watch.wait_for_only_delete("scoped-four").await.unwrap();

    full_projects.delete("scoped-three").await.unwrap();
    all_watch.wait_for_only_delete("scoped-three").await.unwrap();
    two_three_watch
        .wait_for_only_delete("scoped-three")
        .await
        .unwrap();

    full_projects.delete("scoped-two").await.unwrap();
    all_watch.wait_for_only_delete("scoped-two").await.unwrap();
    one_two_watch.wait_for_only_delete("scoped-two").await.unwrap();
    two_three_watch
        .wait_for_only_delete("scoped-two")
        .await
        .unwrap();

    full_projects.delete("scoped-one").await.unwrap();
    all_watch.wait_for_only_delete("scoped-one").await.unwrap();
    one_two_watch.wait_for_only_delete("scoped-one").await.unwrap();

    cluster.cleanup().await.unwrap();
}

#[tokio::test]
async fn invalid_role_refs() {
    const ROLE: &str = "missing-role";
    let cluster = Cluster::new().await.unwrap();
    let admin = cluster.admin_client();

    let bob = create_new_project(&cluster, "rolerefs-foo", "rolerefs-bob")
        .await
        .unwrap();
    let alice = create_new_project(&cluster, "rolerefs-bar", "rolerefs-alice")
        .await
        .unwrap();

    let roles: Api<ClusterRole> = Api::all(admin.clone());
    roles
        .create(
            &PostParams::default(),
            &ClusterRole {
                metadata: ObjectMeta {
                    name: Some(ROLE.to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .await
        .unwrap();
    for binding_namespace in [Some("rolerefs-foo"), Some("rolerefs-bar"), None] {
        let modification = match binding_namespace {
            Some(namespace) => RoleModification::namespaced(namespace, ROLE),
            None => RoleModification::cluster(ROLE),
        };
        modification
            .role_kind(CLUSTER_ROLE_KIND)
            .users(["someuser"])
            .add_role(&admin)
            .await
            .unwrap();
    }
    // Orphan the bindings.
    roles.delete(ROLE, &DeleteParams::default()).await.unwrap();

    let admin_ref = &admin;
    poll_immediate(
        Duration::from_millis(100),
        Duration::from_secs(10),
        move || async move {
            for namespace in ["rolerefs-foo", "rolerefs-bar", ""] {
                let review = ResourceAccessReview::new(Action::new(namespace, "get", "pods"));
                let response: ResourceAccessReviewResponse =
                    post_for(admin_ref, RESOURCE_ACCESS_REVIEW_PATH, &review).await?;
                if response.evaluation_error.is_empty() {
                    return Ok(false);
                }
            }
            Ok::<_, model::clients::Error>(true)
        },
    )
    .await
    .unwrap();

    // The broken bindings must not hide anybody's projects.
    has_exactly_these_projects(&ObjectClient::cluster(bob.client.clone()), ["rolerefs-foo"])
        .await
        .unwrap();
    has_exactly_these_projects(&ObjectClient::cluster(alice.client.clone()), ["rolerefs-bar"])
        .await
        .unwrap();
    let all = project_names(
        &ObjectClient::<Project>::cluster(admin.clone())
            .list()
            .await
            .unwrap(),
    );
    for expected in [
        "rolerefs-foo",
        "rolerefs-bar",
        "openshift-infra",
        "openshift",
        "default",
    ] {
        assert!(all.contains(expected), "missing {} in {:?}", expected, all);
    }

    // Remove the orphaned cluster role binding so later runs start clean.
    RoleModification::cluster(ROLE)
        .role_kind(CLUSTER_ROLE_KIND)
        .users(["someuser"])
        .remove_role(&admin)
        .await
        .unwrap();
    cluster.cleanup().await.unwrap();
}
