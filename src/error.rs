//! Errors handlers can return that map onto a specific HTTP response.
use failure::Fail;
use http::StatusCode;

#[derive(Debug, Fail, PartialEq)]
pub enum BlogError {
    /// The requested resource doesn't exist or is hidden from the viewer
    #[fail(display = "Page not found")]
    NotFound,
    /// The action requires a logged in user
    #[fail(display = "You need to log in to do that")]
    LoginRequired,
    /// The acting user isn't allowed to perform the action
    #[fail(display = "Permission denied")]
    Forbidden,
    /// The request couldn't be understood
    #[fail(display = "Bad request: {}", _0)]
    BadRequest(String),
}

/// Picks the status code for an error returned by a handler.
pub fn status_of(error: &failure::Error) -> StatusCode {
    if let Some(error) = error.downcast_ref::<BlogError>() {
        return match error {
            BlogError::NotFound => StatusCode::NOT_FOUND,
            BlogError::LoginRequired => StatusCode::SEE_OTHER,
            BlogError::Forbidden => StatusCode::FORBIDDEN,
            BlogError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
    }
    if let Some(diesel::result::Error::NotFound) = error.downcast_ref::<diesel::result::Error>() {
        return StatusCode::NOT_FOUND;
    }
    if error.downcast_ref::<serde_urlencoded::de::Error>().is_some()
        || error.downcast_ref::<serde_json::Error>().is_some()
    {
        return StatusCode::BAD_REQUEST;
    }
    StatusCode::INTERNAL_SERVER_ERROR
}
