use crate::test_settings::TestSettings;
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Namespace;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use log::{debug, info, warn};
use model::clients::{AllowAlreadyExists, AllowNotFound, ObjectClient};
use std::convert::TryFrom;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// How long `cleanup` waits for each namespace to be gone.
const NAMESPACE_DELETION_TIMEOUT: Duration = Duration::from_secs(120);

/// A connection to a running cluster as a cluster admin. Namespaces and projects created through
/// the `Cluster` are recorded and removed by [`Cluster::cleanup`].
pub struct Cluster {
    config: Config,
    client: Client,
    created: Created,
}

/// Names of the namespaces to remove on cleanup, in the order they were recorded. A poisoned lock
/// is recovered.
#[derive(Debug, Default)]
struct Created(Mutex<Vec<String>>);

impl Created {
    fn record(&self, name: &str) {
        let mut names = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Cluster {
    /// Connects using the kubeconfig and context given by the `ORIGIN_INTEG_` settings.
    pub async fn new() -> Result<Self> {
        crate::init_logger();
        let options = KubeConfigOptions {
            context: TestSettings::context().map(String::from),
            ..Default::default()
        };
        let config = match TestSettings::kubeconfig_path() {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .with_context(|| format!("unable to read kubeconfig '{}'", path.display()))?;
                Config::from_custom_kubeconfig(kubeconfig, &options).await?
            }
            None => Config::from_kubeconfig(&options).await?,
        };
        Self::from_config(config)
    }

    /// Connects using the current context of the kubeconfig at `path`.
    pub async fn from_kubeconfig(path: &Path) -> Result<Self> {
        crate::init_logger();
        let kubeconfig = Kubeconfig::read_from(path)
            .with_context(|| format!("unable to read kubeconfig '{}'", path.display()))?;
        let config =
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
        Self::from_config(config)
    }

    fn from_config(config: Config) -> Result<Self> {
        info!("using cluster at '{}'", config.cluster_url);
        let client = Client::try_from(config.clone())?;
        Ok(Self {
            config,
            client,
            created: Created::default(),
        })
    }

    /// A client authenticating as the cluster admin.
    pub fn admin_client(&self) -> Client {
        self.client.clone()
    }

    /// The cluster admin's connection settings. Clients for other users start from a copy of
    /// this with the credentials replaced.
    pub fn admin_config(&self) -> &Config {
        &self.config
    }

    /// The namespace tests use when they do not create their own project.
    pub fn test_namespace() -> &'static str {
        TestSettings::namespace()
    }

    /// The CA bundle of the API server's serving certificate, from `ORIGIN_INTEG_SERVING_CA_FILE`.
    pub fn serving_ca_file() -> Option<&'static Path> {
        TestSettings::serving_ca_file()
    }

    /// The directory of the request-header client CA, from `ORIGIN_INTEG_FRONT_PROXY_CA_DIR`.
    pub fn front_proxy_ca_dir() -> Option<&'static Path> {
        TestSettings::front_proxy_ca_dir()
    }

    /// Creates a namespace. An existing namespace of the same name is returned as is and is not
    /// removed by `cleanup`.
    pub async fn create_namespace(&self, name: &str) -> Result<Namespace> {
        let namespaces = ObjectClient::<Namespace>::cluster(self.admin_client());
        let namespace = Namespace {
            metadata: kube::core::ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        match namespaces.create(&namespace).await.allow_already_exists()? {
            Some(created) => {
                self.track(name);
                Ok(created)
            }
            None => {
                debug!("namespace '{}' already exists", name);
                Ok(namespaces.get(name).await?)
            }
        }
    }

    /// Records a namespace (or project) for removal by `cleanup`.
    pub fn track(&self, name: &str) {
        self.created.record(name);
    }

    /// Deletes every namespace created through this `Cluster` and waits for each to be gone. Every
    /// namespace is waited on; the first one still present at its deadline is reported.
    pub async fn cleanup(&self) -> Result<()> {
        let names = self.created.take();
        let namespaces = ObjectClient::<Namespace>::cluster(self.admin_client());
        for name in &names {
            debug!("cleaning up namespace '{}'", name);
            namespaces.delete(name).await.allow_not_found()?;
        }
        let mut first_error = None;
        for name in &names {
            if let Err(e) = namespaces
                .wait_for_deletion(name, NAMESPACE_DELETION_TIMEOUT)
                .await
            {
                warn!("{}", e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e).context("namespaces remain after cleanup"),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn records_each_name_once() {
        let created = Created::default();
        created.record("ns-a");
        created.record("ns-b");
        created.record("ns-a");
        assert_eq!(created.take(), vec!["ns-a", "ns-b"]);
        assert!(created.take().is_empty());
    }

    #[test]
    fn poisoned_lock_keeps_names() {
        let created = Arc::new(Created::default());
        created.record("ns-a");
        let poisoner = Arc::clone(&created);
        let panicked = thread::spawn(move || {
            let _guard = poisoner.0.lock().unwrap();
            panic!("test failed while holding the lock");
        })
        .join();
        assert!(panicked.is_err());
        assert!(created.0.is_poisoned());

        created.record("ns-b");
        assert_eq!(created.take(), vec!["ns-a", "ns-b"]);
    }
}
