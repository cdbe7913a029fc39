pub use http::StatusCode;
use kube::Error;

pub trait HttpStatusCode {
    fn status_code(&self) -> Option<StatusCode>;

    fn is_status_code(&self, status_code: StatusCode) -> bool {
        self.status_code()
            .map(|some| some == status_code)
            .unwrap_or_default()
    }

    /// The machine readable reason the API server gave for a failure, e.g. `AlreadyExists`.
    fn api_reason(&self) -> Option<&str> {
        None
    }

    fn is_not_found(&self) -> bool {
        self.is_status_code(StatusCode::NOT_FOUND)
    }

    fn is_conflict(&self) -> bool {
        self.is_status_code(StatusCode::CONFLICT)
    }

    fn is_forbidden(&self) -> bool {
        self.is_status_code(StatusCode::FORBIDDEN)
    }

    /// A create collided with an existing object. The server answers `409` for both this and
    /// optimistic concurrency failures, so the reason is checked when it is available.
    fn is_already_exists(&self) -> bool {
        self.is_conflict() && self.api_reason().map_or(true, |r| r == "AlreadyExists")
    }
}

impl HttpStatusCode for kube::Error {
    fn status_code(&self) -> Option<StatusCode> {
        if let Error::Api(error_response) = self {
            StatusCode::from_u16(error_response.code).ok()
        } else {
            None
        }
    }

    fn api_reason(&self) -> Option<&str> {
        if let Error::Api(error_response) = self {
            Some(error_response.reason.as_str())
        } else {
            None
        }
    }
}

impl<T, E> HttpStatusCode for std::result::Result<T, E>
where
    E: HttpStatusCode,
{
    fn status_code(&self) -> Option<StatusCode> {
        self.as_ref().err().and_then(|e| e.status_code())
    }

    fn api_reason(&self) -> Option<&str> {
        self.as_ref().err().and_then(|e| e.api_reason())
    }
}
