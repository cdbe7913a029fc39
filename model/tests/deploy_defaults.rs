#![cfg(feature = "integ")]
//! Server-side defaulting of deployment configs.

use model::apps::DeploymentConfig;
use model::clients::ObjectClient;
use selftest::fixtures::{clear_transient, minimal_dc, set_essential_defaults};
use selftest::Cluster;

const NON_DEFAULT_REVISION_HISTORY_LIMIT: i32 = 52;

/// The history limit the `apps.openshift.io` group fills in when none is given.
const DEFAULT_REVISION_HISTORY_LIMIT: i32 = 10;

#[tokio::test]
async fn deployment_config_defaults() {
    let cluster = Cluster::new().await.unwrap();
    let namespace = format!("{}-deploy", Cluster::test_namespace());
    cluster.create_namespace(&namespace).await.unwrap();
    let dcs = ObjectClient::<DeploymentConfig>::namespaced(cluster.admin_client(), &namespace);

    let cases = [
        ("test-apps-01", None, DEFAULT_REVISION_HISTORY_LIMIT),
        (
            "test-apps-02",
            Some(NON_DEFAULT_REVISION_HISTORY_LIMIT),
            NON_DEFAULT_REVISION_HISTORY_LIMIT,
        ),
    ];
    for (name, requested_limit, expected_limit) in cases {
        let mut dc = minimal_dc(name, 0);
        dc.spec.revision_history_limit = requested_limit;

        let mut expected = minimal_dc(name, 1);
        set_essential_defaults(&mut expected);
        expected.spec.revision_history_limit = Some(expected_limit);

        let mut created = dcs.create(&dc).await.unwrap();
        clear_transient(&mut created);
        assert_eq!(
            created,
            expected,
            "{} differs from expected output:\n{}\n{}",
            name,
            serde_yaml::to_string(&created).unwrap(),
            serde_yaml::to_string(&expected).unwrap()
        );
    }

    cluster.cleanup().await.unwrap();
}
