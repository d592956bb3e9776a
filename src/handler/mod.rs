use askama::Template;
use futures::{future, Future, Stream};
use gotham::{
    handler::{HandlerFuture, IntoHandlerError},
    helpers::http::response::{create_response, create_temporary_redirect},
    state::{FromState, State},
};
use http::{
    header::{self, HeaderValue},
    Response, StatusCode,
};
use hyper::Body;

use std::borrow::Cow;

use crate::{
    document::TemplateExt,
    error::{self, BlogError},
    user::Session,
};

pub mod categories;
pub mod posts;
pub mod rss;
pub mod users;

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate<'a> {
    session: Option<&'a Session>,
    status: u16,
    error: String,
}

/// Creates a `HandlerFuture` that runs the given function
pub fn body_handler<F>(mut state: State, op: F) -> Box<HandlerFuture>
where
    F: FnOnce(&State, Vec<u8>) -> Response<Body> + Send + 'static,
{
    let f = Body::take_from(&mut state)
        .concat2()
        .then(|result| match result {
            Ok(body) => {
                let response = op(&state, body.to_vec());
                future::ok((state, response))
            }
            Err(e) => future::err((state, e.into_handler_error())),
        });

    Box::new(f)
}

/// Redirects with "303 See Other", so the browser follows up with a GET.
pub fn redirect(state: &State, location: impl Into<Cow<'static, str>>) -> Response<Body> {
    let mut response = create_temporary_redirect(state, location);
    *response.status_mut() = StatusCode::SEE_OTHER;
    response
}

pub fn error_response(state: &State, error: failure::Error) -> Response<Body> {
    let status = error::status_of(&error);
    if error.downcast_ref::<BlogError>() == Some(&BlogError::LoginRequired) {
        return redirect(state, "/login");
    }
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        log::error!("Request failed: {}", error);
    }
    let template = ErrorTemplate {
        session: Session::try_borrow_from(state),
        status: status.as_u16(),
        error: error.to_string(),
    };
    template.to_response_with(state, status)
}

/// Replaces the body of a 404 response with the error page.
pub fn not_found(state: &State, response: &mut Response<Body>) {
    let template = ErrorTemplate {
        session: Session::try_borrow_from(state),
        status: StatusCode::NOT_FOUND.as_u16(),
        error: BlogError::NotFound.to_string(),
    };
    match template.render() {
        Ok(page) => {
            *response.body_mut() = page.into();
            let headers = response.headers_mut();
            headers.remove(header::CONTENT_LENGTH);
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            );
        }
        Err(e) => log::error!("Template error: {}", e),
    }
}

pub fn response(state: &State, result: Result<Response<Body>, failure::Error>) -> Response<Body> {
    match result {
        Ok(response) => response,
        Err(error) => error_response(state, error),
    }
}

/// Creates a JSON response
pub fn json<T: serde::Serialize>(
    state: &State,
    value: &T,
) -> Result<Response<Body>, failure::Error> {
    let content = serde_json::to_string(value)?;
    Ok(create_response(
        state,
        StatusCode::OK,
        mime::APPLICATION_JSON,
        content,
    ))
}

#[macro_export]
macro_rules! handler {
    ($handler_fn:path) => {
        |state| {
            let r = crate::handler::response(&state, $handler_fn(&state));
            (state, r)
        }
    };
}

#[macro_export]
macro_rules! body_handler {
    ($handler_fn:path) => {
        |state| {
            crate::handler::body_handler(state, |state, post| {
                crate::handler::response(&state, $handler_fn(state, post))
            })
        }
    };
}
