use crate::clients::{HttpStatusCode, StatusCode};
use snafu::Snafu;
use std::time::Duration;

/// The `Result` type returned by `clients`.
pub type Result<T> = std::result::Result<T, Error>;

/// The public error type returned by `clients`.
#[derive(Debug, Snafu)]
pub struct Error(InnerError);

/// The private error type returned by `clients`.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub(crate) enum InnerError {
    #[snafu(display("Error serializing object '{}': {}", what, source))]
    Serde {
        what: String,
        source: serde_json::Error,
    },

    #[snafu(display("Unable to build request for '{}': {}", path, source))]
    RequestBuild { path: String, source: http::Error },

    #[snafu(display("Unable to {} {}: {}", method, what, source))]
    KubeApiCall {
        method: String,
        what: String,
        source: kube::Error,
    },

    #[snafu(display("Unable to {} for '{}': {}", operation, name, source))]
    KubeApiCallFor {
        /// What we were trying to do, e.g. 'create project request'.
        operation: String,
        /// The name of the object or API path we were trying to do this for.
        name: String,
        /// The error from kube-rs.
        source: kube::Error,
    },

    #[snafu(display("{} '{}' was not deleted within {:?}", kind, name, timeout))]
    DeletionTimeout {
        kind: String,
        name: String,
        timeout: Duration,
    },
}

impl HttpStatusCode for InnerError {
    fn status_code(&self) -> Option<StatusCode> {
        match self {
            InnerError::Serde { .. }
            | InnerError::RequestBuild { .. }
            | InnerError::DeletionTimeout { .. } => None,
            InnerError::KubeApiCall { source: e, .. } => e.status_code(),
            InnerError::KubeApiCallFor { source: e, .. } => e.status_code(),
        }
    }

    fn api_reason(&self) -> Option<&str> {
        match self {
            InnerError::KubeApiCall { source: e, .. }
            | InnerError::KubeApiCallFor { source: e, .. } => e.api_reason(),
            _ => None,
        }
    }
}

impl HttpStatusCode for Error {
    fn status_code(&self) -> Option<StatusCode> {
        self.0.status_code()
    }

    fn api_reason(&self) -> Option<&str> {
        self.0.api_reason()
    }
}
