/*!

Typed clients over the OpenShift and Kubernetes objects exercised by the integration suites.

!*/

mod allow;
mod error;
mod http_status_code;
mod object_client;
mod request;

pub use allow::{AllowAlreadyExists, AllowNotFound};
pub use error::{Error, Result};
pub use http_status_code::{HttpStatusCode, StatusCode};
pub use object_client::ObjectClient;
pub use request::post_for;
