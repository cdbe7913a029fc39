use crate::clients::HttpStatusCode;

/// Turns a `404` failure into `Ok(None)`.
pub trait AllowNotFound<T, E> {
    fn allow_not_found(self) -> Result<Option<T>, E>;
}

impl<T, E> AllowNotFound<T, E> for Result<T, E>
where
    E: HttpStatusCode,
{
    fn allow_not_found(self) -> Result<Option<T>, E> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Turns an `AlreadyExists` failure into `Ok(None)`. Fixtures use this to make creation
/// idempotent.
pub trait AllowAlreadyExists<T, E> {
    fn allow_already_exists(self) -> Result<Option<T>, E>;
}

impl<T, E> AllowAlreadyExists<T, E> for Result<T, E>
where
    E: HttpStatusCode,
{
    fn allow_already_exists(self) -> Result<Option<T>, E> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_already_exists() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use kube::error::ErrorResponse;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: String::new(),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn not_found_is_none() {
        let result: Result<u8, kube::Error> = Err(api_error(404, "NotFound"));
        assert_eq!(result.allow_not_found().unwrap(), None);
        let result: Result<u8, kube::Error> = Ok(7);
        assert_eq!(result.allow_not_found().unwrap(), Some(7));
        let result: Result<u8, kube::Error> = Err(api_error(403, "Forbidden"));
        assert!(result.allow_not_found().is_err());
    }

    #[test]
    fn already_exists_is_none() {
        let result: Result<u8, kube::Error> = Err(api_error(409, "AlreadyExists"));
        assert_eq!(result.allow_already_exists().unwrap(), None);
        let result: Result<u8, kube::Error> = Err(api_error(409, "Conflict"));
        assert!(result.allow_already_exists().is_err());
    }
}
