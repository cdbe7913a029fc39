use crate::clients::error::{self, Result};
use kube::Client;
use log::trace;
use serde::de::DeserializeOwned;
use serde::Serialize;
use snafu::ResultExt;

/// POSTs `body` to the API `path` and decodes the response as `R`. Several OpenShift endpoints
/// answer with a different type than they accept: a `ProjectRequest` creates a `Project`, an
/// `ImageStreamMapping` returns a `Status` and a `ResourceAccessReview` returns a
/// `ResourceAccessReviewResponse`. The `Api<K>` methods cannot express that.
pub async fn post_for<B, R>(k8s_client: &Client, path: &str, body: &B) -> Result<R>
where
    B: Serialize,
    R: DeserializeOwned,
{
    trace!("posting to '{}'", path);
    let data = serde_json::to_vec(body).context(error::SerdeSnafu { what: path })?;
    let request = http::Request::post(path)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(data)
        .context(error::RequestBuildSnafu { path })?;
    Ok(k8s_client
        .request::<R>(request)
        .await
        .context(error::KubeApiCallForSnafu {
            operation: "post",
            name: path,
        })?)
}
