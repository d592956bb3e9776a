use gotham::{
    helpers::http::response::{create_empty_response, create_response},
    state::State,
};
use hyper::{Body, Response, StatusCode};
use mime::APPLICATION_JSON as JSON;

use crate::{
    db::DbConnection,
    error::BlogError,
    user::{self, Login, NewUser},
};

pub fn create(state: &State, post: Vec<u8>) -> Result<Response<Body>, failure::Error> {
    let connection = &DbConnection::from_state(state)?;

    let user: NewUser = serde_json::from_slice(&post)?;
    user.validate().map_err(BlogError::BadRequest)?;
    if user::exists(connection, &user.id)? {
        return Err(BlogError::BadRequest(format!("username '{}' is taken", user.id)).into());
    }

    user::create(connection, user)?;
    Ok(create_empty_response(state, StatusCode::OK))
}

pub fn login(state: &State, post: Vec<u8>) -> Result<Response<Body>, failure::Error> {
    let connection = &DbConnection::from_state(state)?;

    let login: Login = serde_json::from_slice(&post)?;
    let response = match login.login(connection)? {
        Some(session) => create_response(
            state,
            StatusCode::OK,
            JSON,
            serde_json::to_string(&session)?,
        ),
        None => create_empty_response(state, StatusCode::FORBIDDEN),
    };
    Ok(response)
}
