use crate::clients::error::{self, Result};
use crate::clients::HttpStatusCode;
use core::fmt::Debug;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client, Resource};
use log::{debug, trace};
use serde::de::DeserializeOwned;
use serde::Serialize;
use snafu::{ensure, ResultExt};
use std::borrow::Cow;
use std::time::Duration;
use tokio::time::Instant;

/// Interval between GETs while waiting for an object to disappear.
const DELETION_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// A typed client for a single kind of object. The underlying `Api` is scoped either to the whole
/// cluster or to one namespace.
///
/// # Example
///
/// ```
///# use model::clients::ObjectClient;
///# use model::Project;
///# async fn no_run(k8s_client: kube::Client) {
/// let projects = ObjectClient::<Project>::cluster(k8s_client);
/// let project = projects.get("my-project").await.unwrap();
///# }
/// ```
#[derive(Clone)]
pub struct ObjectClient<K> {
    api: Api<K>,
}

impl<K> ObjectClient<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Serialize + Debug,
{
    /// A client that is not restricted to a namespace. For namespaced kinds, `list` returns the
    /// objects of every namespace the caller may see.
    pub fn cluster(k8s_client: Client) -> Self {
        Self::from_api(Api::all(k8s_client))
    }

    pub fn namespaced(k8s_client: Client, namespace: &str) -> Self
    where
        K: Resource<Scope = NamespaceResourceScope>,
    {
        Self::from_api(Api::namespaced(k8s_client, namespace))
    }

    pub fn from_api(api: Api<K>) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &Api<K> {
        &self.api
    }

    pub fn kind(&self) -> Cow<'static, str> {
        K::kind(&())
    }

    pub async fn get<S>(&self, name: S) -> Result<K>
    where
        S: AsRef<str>,
    {
        Ok(self
            .api
            .get(name.as_ref())
            .await
            .context(error::KubeApiCallForSnafu {
                operation: format!("get {}", self.kind()),
                name: name.as_ref(),
            })?)
    }

    /// Returns `None` instead of an error when the object does not exist.
    pub async fn get_opt<S>(&self, name: S) -> Result<Option<K>>
    where
        S: AsRef<str>,
    {
        Ok(self
            .api
            .get_opt(name.as_ref())
            .await
            .context(error::KubeApiCallForSnafu {
                operation: format!("get {}", self.kind()),
                name: name.as_ref(),
            })?)
    }

    pub async fn list(&self) -> Result<Vec<K>> {
        self.list_with(&ListParams::default()).await
    }

    pub async fn list_with(&self, params: &ListParams) -> Result<Vec<K>> {
        Ok(self
            .api
            .list(params)
            .await
            .context(error::KubeApiCallSnafu {
                method: "list",
                what: K::plural(&()).into_owned(),
            })?
            .items)
    }

    pub async fn create(&self, object: &K) -> Result<K> {
        trace!(
            "creating {} '{}'",
            self.kind(),
            object.meta().name.as_deref().unwrap_or("")
        );
        Ok(self
            .api
            .create(&PostParams::default(), object)
            .await
            .context(error::KubeApiCallSnafu {
                method: "create",
                what: self.kind(),
            })?)
    }

    /// Replaces the object with the same name. The object's resource version must be current or
    /// the server answers with a conflict.
    pub async fn replace(&self, object: &K) -> Result<K> {
        let name = object.meta().name.clone().unwrap_or_default();
        Ok(self
            .api
            .replace(&name, &PostParams::default(), object)
            .await
            .context(error::KubeApiCallForSnafu {
                operation: format!("replace {}", self.kind()),
                name: &name,
            })?)
    }

    /// Requests deletion. Returns the object if the server has not finished deleting it yet, e.g.
    /// because finalizers are pending.
    pub async fn delete<S>(&self, name: S) -> Result<Option<K>>
    where
        S: AsRef<str>,
    {
        debug!("deleting {} '{}'", self.kind(), name.as_ref());
        Ok(self
            .api
            .delete(name.as_ref(), &DeleteParams::default())
            .await
            .context(error::KubeApiCallForSnafu {
                operation: format!("delete {}", self.kind()),
                name: name.as_ref(),
            })?
            .map_left(Some)
            .map_right(|_| None)
            .into_inner())
    }

    /// Loop until `get(name)` returns `StatusCode::NOT_FOUND` or `timeout` elapses.
    pub async fn wait_for_deletion<S>(&self, name: S, timeout: Duration) -> Result<()>
    where
        S: AsRef<str>,
    {
        let name: &str = name.as_ref();
        let start = Instant::now();
        loop {
            if let Err(err) = self.api.get(name).await {
                if err.is_not_found() {
                    return Ok(());
                }
            }
            ensure!(
                start.elapsed() < timeout,
                error::DeletionTimeoutSnafu {
                    kind: self.kind(),
                    name,
                    timeout,
                }
            );
            tokio::time::sleep(DELETION_POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use http::{Request, Response};
    use hyper::Body;
    use k8s_openapi::api::core::v1::Namespace;
    use serde_json::json;
    use tower_test::mock::Handle;

    /// Answers every GET of a namespace with the object for the first `present_for` requests and
    /// with `404 Not Found` afterwards.
    fn serve_namespace(mut handle: Handle<Request<Body>, Response<Body>>, present_for: usize) {
        tokio::spawn(async move {
            let mut served = 0;
            while let Some((request, send)) = handle.next_request().await {
                assert_eq!(request.uri().path(), "/api/v1/namespaces/doomed");
                let response = if served < present_for {
                    let body = json!({
                        "apiVersion": "v1",
                        "kind": "Namespace",
                        "metadata": { "name": "doomed" },
                        "status": { "phase": "Terminating" },
                    });
                    Response::new(Body::from(body.to_string()))
                } else {
                    let body = json!({
                        "kind": "Status",
                        "apiVersion": "v1",
                        "status": "Failure",
                        "message": "namespaces \"doomed\" not found",
                        "reason": "NotFound",
                        "code": 404,
                    });
                    Response::builder()
                        .status(404)
                        .body(Body::from(body.to_string()))
                        .unwrap()
                };
                served += 1;
                send.send_response(response);
            }
        });
    }

    fn namespaces(present_for: usize) -> ObjectClient<Namespace> {
        let (service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
        serve_namespace(handle, present_for);
        ObjectClient::cluster(Client::new(service, "default"))
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_deletion_returns_once_gone() {
        let start = Instant::now();
        namespaces(2)
            .wait_for_deletion("doomed", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(start.elapsed(), DELETION_POLL_INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_deletion_times_out() {
        let start = Instant::now();
        let err = namespaces(usize::MAX)
            .wait_for_deletion("doomed", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("was not deleted within"), "{}", err);
        // Polls at 0s, 2s, 4s and 6s; the last one is past the deadline.
        assert_eq!(start.elapsed(), DELETION_POLL_INTERVAL * 3);
    }
}
