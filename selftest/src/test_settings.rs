use serde::Deserialize;
use std::path::Path;

/// Test settings provides a way to send arguments into the Rust tests using environment variables.
pub(crate) struct TestSettings {}

impl TestSettings {
    /// The kubeconfig used to reach the cluster as a cluster admin. `None` means the default
    /// kubeconfig resolution of `kube-rs` (`KUBECONFIG`, then `~/.kube/config`).
    pub(crate) fn kubeconfig_path() -> Option<&'static Path> {
        TEST_SETTINGS.kubeconfig_path.as_deref().map(Path::new)
    }

    /// The kubeconfig context to use, if not the current one.
    pub(crate) fn context() -> Option<&'static str> {
        TEST_SETTINGS.context.as_deref()
    }

    /// The namespace tests use when they do not create their own project.
    pub(crate) fn namespace() -> &'static str {
        TEST_SETTINGS.namespace.as_str()
    }

    /// The CA bundle that signed the API server's serving certificate.
    pub(crate) fn serving_ca_file() -> Option<&'static Path> {
        TEST_SETTINGS.serving_ca_file.as_deref().map(Path::new)
    }

    /// A directory holding the request-header client CA the API server trusts, as written by
    /// `certs::create_ca`.
    pub(crate) fn front_proxy_ca_dir() -> Option<&'static Path> {
        TEST_SETTINGS.front_proxy_ca_dir.as_deref().map(Path::new)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename = "SCREAMING_SNAKE_CASE")]
struct Inner {
    /// # Example
    ///
    /// ```text
    /// ORIGIN_INTEG_KUBECONFIG_PATH=/wherever/admin.kubeconfig
    /// ```
    kubeconfig_path: Option<String>,

    context: Option<String>,

    /// Defaults to `integration`.
    #[serde(default = "namespace")]
    namespace: String,

    serving_ca_file: Option<String>,

    front_proxy_ca_dir: Option<String>,
}

lazy_static::lazy_static! {
    static ref TEST_SETTINGS: Inner =
        envy::prefixed("ORIGIN_INTEG_")
            .from_env::<Inner>()
            .expect("Error parsing TestSettings environment variables");
}

/// We need this to provide a default for serde.
fn namespace() -> String {
    String::from("integration")
}
